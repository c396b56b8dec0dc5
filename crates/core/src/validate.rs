//! Schema validation: raw bundle JSON to a typed [`Bundle`].
//!
//! Validation is fail-fast. The first structural problem found is
//! returned as `INVALID_SCHEMA`, an unknown operator as
//! `INVALID_OPERATOR`, and a bad answer id as `INVALID_QUESTION_ID`.
//! Variables are checked in lexicographic id order, so the reported
//! error is the same on every run.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::bundle::{Bundle, Metadata, VariableDefinition};
use crate::error::EngineError;
use crate::expr::{Branch, Expression, ExpressionInput};

/// The set of valid answer ids: `prefix` followed by an index in
/// `min_index..=max_index` (e.g. `Q1`..`Q95`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnswerDomain {
    pub prefix: String,
    pub min_index: u32,
    pub max_index: u32,
}

impl Default for AnswerDomain {
    fn default() -> Self {
        AnswerDomain {
            prefix: "Q".to_string(),
            min_index: 1,
            max_index: 95,
        }
    }
}

impl AnswerDomain {
    /// Index of an id shaped like `<prefix><digits>`, regardless of range.
    fn index_of(&self, id: &str) -> Option<u64> {
        let digits = id.strip_prefix(self.prefix.as_str())?;
        if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        // Absurdly long digit strings are out of range, not a parse error.
        Some(digits.parse::<u64>().unwrap_or(u64::MAX))
    }

    /// Whether `id` has the answer-id shape. Used to classify legacy
    /// `{"source": ...}` inputs.
    pub fn looks_like_answer(&self, id: &str) -> bool {
        self.index_of(id).is_some()
    }

    /// Whether `id` is a valid answer id (shape and range).
    pub fn contains(&self, id: &str) -> bool {
        self.index_of(id).is_some_and(|idx| {
            idx >= u64::from(self.min_index) && idx <= u64::from(self.max_index)
        })
    }
}

/// Validate a raw bundle using the default answer domain.
pub fn validate(raw: &Value) -> Result<Bundle, EngineError> {
    validate_bundle(raw, &AnswerDomain::default())
}

/// Validate the structure of a raw bundle.
///
/// `domain` is only used to classify legacy `{"source": id}` inputs;
/// range checks happen in [`validate_answer_references`].
pub fn validate_bundle(raw: &Value, domain: &AnswerDomain) -> Result<Bundle, EngineError> {
    let obj = raw
        .as_object()
        .ok_or_else(|| EngineError::schema("bundle must be an object"))?;

    let version_id = match obj.get("version_id") {
        Some(Value::String(s)) if !s.trim().is_empty() => s.clone(),
        Some(Value::String(_)) => {
            return Err(EngineError::schema("version_id must not be empty"));
        }
        _ => return Err(EngineError::schema("version_id must be a string")),
    };

    if let Some(key) = unknown_key(obj, BUNDLE_FIELDS) {
        return Err(EngineError::schema(format!("unknown bundle field '{}'", key)));
    }

    let metadata = match obj.get("metadata") {
        None | Some(Value::Null) => Metadata::default(),
        Some(Value::Object(m)) => parse_metadata(m)?,
        Some(_) => return Err(EngineError::schema("metadata must be an object")),
    };

    let raw_vars = obj
        .get("variables")
        .and_then(Value::as_object)
        .ok_or_else(|| EngineError::schema("variables must be an object map"))?;

    // Sorted so the first reported error does not depend on input key order.
    let sorted: BTreeMap<&String, &Value> = raw_vars.iter().collect();
    let mut variables = BTreeMap::new();
    for (var_id, def) in sorted {
        if var_id.is_empty() {
            return Err(EngineError::schema("variable ids must not be empty"));
        }
        let parser = ExprParser { var_id, domain };
        variables.insert(var_id.clone(), parser.definition(def)?);
    }

    Ok(Bundle {
        version_id,
        metadata,
        variables,
    })
}

/// Reject answer references outside the domain's pattern or index range.
pub fn validate_answer_references(
    bundle: &Bundle,
    domain: &AnswerDomain,
) -> Result<(), EngineError> {
    for def in bundle.variables.values() {
        if let Some(bad) = def
            .expression
            .answer_refs()
            .into_iter()
            .find(|id| !domain.contains(id))
        {
            return Err(EngineError::InvalidQuestionId {
                question_id: bad.to_string(),
            });
        }
    }
    Ok(())
}

/// Reject answer payload keys outside the answer domain.
pub fn validate_answers(
    answers: &BTreeMap<String, f64>,
    domain: &AnswerDomain,
) -> Result<(), EngineError> {
    match answers.keys().find(|id| !domain.contains(id)) {
        Some(bad) => Err(EngineError::InvalidQuestionId {
            question_id: bad.clone(),
        }),
        None => Ok(()),
    }
}

fn parse_metadata(m: &Map<String, Value>) -> Result<Metadata, EngineError> {
    let mut meta = Metadata::default();
    for (key, value) in m {
        match key.as_str() {
            "created_at" | "description" => {
                let s = value.as_str().ok_or_else(|| {
                    EngineError::schema(format!("metadata.{} must be a string", key))
                })?;
                if key == "created_at" {
                    meta.created_at = Some(s.to_string());
                } else {
                    meta.description = Some(s.to_string());
                }
            }
            _ => {
                meta.extra.insert(key.clone(), value.clone());
            }
        }
    }
    Ok(meta)
}

const BUNDLE_FIELDS: &[&str] = &["version_id", "metadata", "variables"];
const DEFINITION_FIELDS: &[&str] = &["type", "expression"];

/// Keys an expression node may carry, by operator. `None` for unknown operators.
fn operand_fields(op: &str) -> Option<&'static [&'static str]> {
    let fields: &'static [&'static str] = match op {
        "sum" | "multiply" | "divide" | "min" | "max" => &["op", "inputs"],
        "weighted_sum" => &["op", "inputs", "weights"],
        "scale" => &["op", "inputs", "factor", "min", "max", "to"],
        "normalize" => &["op", "inputs", "min", "max"],
        "equals" | "gt" | "lt" => &["op", "left", "right"],
        "if" => &["op", "condition", "then", "else"],
        "map" => &["op", "input", "inputs", "table", "default"],
        _ => return None,
    };
    Some(fields)
}

/// First key of `obj` (in sorted order) outside `allowed`.
///
/// Unknown keys are rejected rather than dropped: a dropped key would
/// never reach the version hash.
fn unknown_key<'a>(obj: &'a Map<String, Value>, allowed: &[&str]) -> Option<&'a str> {
    obj.keys()
        .map(String::as_str)
        .find(|k| !allowed.contains(k))
}

/// Per-variable expression parser; carries context for error messages.
struct ExprParser<'a> {
    var_id: &'a str,
    domain: &'a AnswerDomain,
}

impl ExprParser<'_> {
    fn err(&self, msg: impl std::fmt::Display) -> EngineError {
        EngineError::schema(format!("variable '{}': {}", self.var_id, msg))
    }

    fn definition(&self, def: &Value) -> Result<VariableDefinition, EngineError> {
        let def = def
            .as_object()
            .ok_or_else(|| self.err("definition must be an object"))?;
        if let Some(key) = unknown_key(def, DEFINITION_FIELDS) {
            return Err(self.err(format!("unknown field '{}'", key)));
        }

        match def.get("type").and_then(Value::as_str) {
            Some("rule") => {}
            Some(other) => return Err(self.err(format!("invalid type '{}'", other))),
            None => return Err(self.err("missing type")),
        }

        let expr = match def.get("expression") {
            Some(e @ Value::Object(_)) => e,
            _ => return Err(self.err("must have an expression object")),
        };
        Ok(VariableDefinition::rule(self.expression(expr, "expression")?))
    }

    fn expression(&self, v: &Value, path: &str) -> Result<Expression, EngineError> {
        let obj = v
            .as_object()
            .ok_or_else(|| self.err(format!("{} must be an object", path)))?;

        let op = match obj.get("op") {
            Some(Value::String(op)) => op.as_str(),
            Some(other) => {
                return Err(EngineError::InvalidOperator {
                    operator: other.to_string(),
                })
            }
            None => return Err(self.err(format!("{}.op is missing", path))),
        };
        let allowed = operand_fields(op).ok_or_else(|| EngineError::InvalidOperator {
            operator: op.to_string(),
        })?;
        if let Some(key) = unknown_key(obj, allowed) {
            return Err(self.err(format!("{}: unknown field '{}' for op '{}'", path, key, op)));
        }
        let expr = match op {
            "sum" => Expression::Sum {
                inputs: self.inputs(obj, path)?,
            },
            "weighted_sum" => Expression::WeightedSum {
                inputs: self.inputs(obj, path)?,
                weights: self.numbers(obj, "weights", path)?,
            },
            "multiply" => Expression::Multiply {
                inputs: self.inputs(obj, path)?,
            },
            "divide" => Expression::Divide {
                inputs: self.inputs(obj, path)?,
            },
            "min" => Expression::Min {
                inputs: self.inputs(obj, path)?,
            },
            "max" => Expression::Max {
                inputs: self.inputs(obj, path)?,
            },
            "scale" => Expression::Scale {
                inputs: self.inputs(obj, path)?,
                factor: self.opt_number(obj, "factor", path)?,
                min: self.opt_number(obj, "min", path)?,
                max: self.opt_number(obj, "max", path)?,
                to: self.opt_number(obj, "to", path)?,
            },
            "normalize" => Expression::Normalize {
                inputs: self.inputs(obj, path)?,
                min: self.opt_number(obj, "min", path)?,
                max: self.opt_number(obj, "max", path)?,
            },
            "equals" | "gt" | "lt" => {
                let left = self.required_input(obj, "left", path)?;
                let right = self.required_input(obj, "right", path)?;
                match op {
                    "equals" => Expression::Equals { left, right },
                    "gt" => Expression::Gt { left, right },
                    _ => Expression::Lt { left, right },
                }
            }
            "if" => {
                let cond_path = format!("{}.condition", path);
                let condition = match obj.get("condition") {
                    Some(c) => self.expression(c, &cond_path)?,
                    None => return Err(self.err(format!("{} is missing", cond_path))),
                };
                Expression::If {
                    condition: Box::new(condition),
                    then: self.branch(obj.get("then"), &format!("{}.then", path))?,
                    otherwise: self.branch(obj.get("else"), &format!("{}.else", path))?,
                }
            }
            "map" => Expression::Map {
                input: self.map_input(obj, path)?,
                table: self.table(obj, path)?,
                default: self.opt_number(obj, "default", path)?,
            },
            other => {
                return Err(EngineError::InvalidOperator {
                    operator: other.to_string(),
                })
            }
        };
        Ok(expr)
    }

    fn input(&self, v: &Value, path: &str) -> Result<ExpressionInput, EngineError> {
        if let Some(n) = v.as_f64() {
            return Ok(ExpressionInput::Literal(n));
        }
        let obj = v.as_object().ok_or_else(|| {
            self.err(format!(
                "{} must be a number or an object with literal, answer, variable or source",
                path
            ))
        })?;

        if obj.len() != 1 {
            return Err(self.err(format!(
                "{} must have exactly one of literal, answer, variable or source",
                path
            )));
        }

        if let Some(lit) = obj.get("literal") {
            return lit
                .as_f64()
                .map(ExpressionInput::Literal)
                .ok_or_else(|| self.err(format!("{}.literal must be a number", path)));
        }
        if let Some(id) = obj.get("answer") {
            return self
                .ref_id(id, path, "answer")
                .map(ExpressionInput::Answer);
        }
        if let Some(id) = obj.get("variable") {
            return self
                .ref_id(id, path, "variable")
                .map(ExpressionInput::Variable);
        }
        if let Some(id) = obj.get("source") {
            let id = self.ref_id(id, path, "source")?;
            return Ok(if self.domain.looks_like_answer(&id) {
                ExpressionInput::Answer(id)
            } else {
                ExpressionInput::Variable(id)
            });
        }
        Err(self.err(format!(
            "{} must have one of literal, answer, variable or source",
            path
        )))
    }

    fn ref_id(&self, v: &Value, path: &str, key: &str) -> Result<String, EngineError> {
        match v.as_str() {
            Some(s) if !s.is_empty() => Ok(s.to_string()),
            _ => Err(self.err(format!("{}.{} must be a non-empty string", path, key))),
        }
    }

    fn inputs(
        &self,
        obj: &Map<String, Value>,
        path: &str,
    ) -> Result<Vec<ExpressionInput>, EngineError> {
        match obj.get("inputs") {
            None | Some(Value::Null) => Ok(Vec::new()),
            Some(Value::Array(items)) => items
                .iter()
                .enumerate()
                .map(|(i, item)| self.input(item, &format!("{}.inputs[{}]", path, i)))
                .collect(),
            Some(_) => Err(self.err(format!("{}.inputs must be an array", path))),
        }
    }

    fn required_input(
        &self,
        obj: &Map<String, Value>,
        key: &str,
        path: &str,
    ) -> Result<ExpressionInput, EngineError> {
        let field_path = format!("{}.{}", path, key);
        match obj.get(key) {
            Some(v) => self.input(v, &field_path),
            None => Err(self.err(format!("{} is missing", field_path))),
        }
    }

    fn numbers(
        &self,
        obj: &Map<String, Value>,
        key: &str,
        path: &str,
    ) -> Result<Vec<f64>, EngineError> {
        match obj.get(key) {
            None | Some(Value::Null) => Ok(Vec::new()),
            Some(Value::Array(items)) => items
                .iter()
                .map(|n| {
                    n.as_f64().ok_or_else(|| {
                        self.err(format!("{}.{} must contain only numbers", path, key))
                    })
                })
                .collect(),
            Some(_) => Err(self.err(format!("{}.{} must be an array of numbers", path, key))),
        }
    }

    fn opt_number(
        &self,
        obj: &Map<String, Value>,
        key: &str,
        path: &str,
    ) -> Result<Option<f64>, EngineError> {
        match obj.get(key) {
            None | Some(Value::Null) => Ok(None),
            Some(v) => v
                .as_f64()
                .map(Some)
                .ok_or_else(|| self.err(format!("{}.{} must be a number", path, key))),
        }
    }

    fn branch(&self, v: Option<&Value>, path: &str) -> Result<Option<Branch>, EngineError> {
        match v {
            None | Some(Value::Null) => Ok(None),
            Some(v) if v.get("op").is_some() => Ok(Some(Branch::Expression(Box::new(
                self.expression(v, path)?,
            )))),
            Some(v) => Ok(Some(Branch::Input(self.input(v, path)?))),
        }
    }

    /// `map` reads `input`; a single-element `inputs` array is accepted too.
    fn map_input(
        &self,
        obj: &Map<String, Value>,
        path: &str,
    ) -> Result<ExpressionInput, EngineError> {
        if let Some(v) = obj.get("input") {
            return self.input(v, &format!("{}.input", path));
        }
        match obj.get("inputs").and_then(Value::as_array) {
            Some(items) if items.len() == 1 => self.input(&items[0], &format!("{}.inputs[0]", path)),
            _ => Err(self.err(format!("{}.input is missing", path))),
        }
    }

    fn table(
        &self,
        obj: &Map<String, Value>,
        path: &str,
    ) -> Result<BTreeMap<String, f64>, EngineError> {
        match obj.get("table") {
            None | Some(Value::Null) => Ok(BTreeMap::new()),
            Some(Value::Object(entries)) => entries
                .iter()
                .map(|(k, v)| {
                    v.as_f64().map(|n| (k.clone(), n)).ok_or_else(|| {
                        self.err(format!("{}.table['{}'] must be a number", path, k))
                    })
                })
                .collect(),
            Some(_) => Err(self.err(format!("{}.table must be an object", path))),
        }
    }
}
