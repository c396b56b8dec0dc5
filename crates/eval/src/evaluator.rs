//! Expression evaluation over already-resolved values.

use std::collections::BTreeMap;
use std::fmt;

use tally_core::{Branch, Expression, ExpressionInput};

/// Values visible to an expression: the submitted answers and every
/// variable computed so far.
#[derive(Debug, Clone, Copy)]
pub struct EvalContext<'a> {
    pub answers: &'a BTreeMap<String, f64>,
    pub variables: &'a BTreeMap<String, f64>,
}

/// Evaluation errors.
#[derive(Debug, Clone, PartialEq)]
pub enum EvalError {
    MissingAnswer {
        answer_id: String,
    },
    MissingVariable {
        variable: String,
    },
    /// Wrong number of operands for an operator.
    Arity {
        op: &'static str,
        expected: &'static str,
        got: usize,
    },
    LengthMismatch {
        inputs: usize,
        weights: usize,
    },
    DivisionByZero,
    /// `min == max` in a scale or normalize.
    DegenerateRange {
        op: &'static str,
        bound: f64,
    },
    MissingScaleParameters,
    MissingBranch {
        branch: &'static str,
    },
    Unmapped {
        key: String,
    },
}

impl fmt::Display for EvalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EvalError::MissingAnswer { answer_id } => {
                write!(f, "missing answer: {}", answer_id)
            }
            EvalError::MissingVariable { variable } => {
                write!(f, "variable not yet computed: {}", variable)
            }
            EvalError::Arity { op, expected, got } => {
                write!(f, "{} expects {} input(s), got {}", op, expected, got)
            }
            EvalError::LengthMismatch { inputs, weights } => {
                write!(
                    f,
                    "weighted_sum has {} input(s) but {} weight(s)",
                    inputs, weights
                )
            }
            EvalError::DivisionByZero => write!(f, "division by zero"),
            EvalError::DegenerateRange { op, bound } => {
                write!(f, "{} range is empty: min and max are both {}", op, bound)
            }
            EvalError::MissingScaleParameters => {
                write!(f, "scale needs either min and max, or factor")
            }
            EvalError::MissingBranch { branch } => {
                write!(f, "if selected the '{}' branch, which is missing", branch)
            }
            EvalError::Unmapped { key } => {
                write!(f, "map has no entry for '{}' and no default", key)
            }
        }
    }
}

impl std::error::Error for EvalError {}

/// Dereference one input.
pub fn resolve_input(ctx: &EvalContext<'_>, input: &ExpressionInput) -> Result<f64, EvalError> {
    match input {
        ExpressionInput::Literal(n) => Ok(*n),
        ExpressionInput::Answer(id) => {
            ctx.answers
                .get(id)
                .copied()
                .ok_or_else(|| EvalError::MissingAnswer {
                    answer_id: id.clone(),
                })
        }
        ExpressionInput::Variable(id) => {
            ctx.variables
                .get(id)
                .copied()
                .ok_or_else(|| EvalError::MissingVariable {
                    variable: id.clone(),
                })
        }
    }
}

fn resolve_all(ctx: &EvalContext<'_>, inputs: &[ExpressionInput]) -> Result<Vec<f64>, EvalError> {
    inputs.iter().map(|i| resolve_input(ctx, i)).collect()
}

fn single(
    ctx: &EvalContext<'_>,
    op: &'static str,
    inputs: &[ExpressionInput],
) -> Result<f64, EvalError> {
    match inputs {
        [only] => resolve_input(ctx, only),
        _ => Err(EvalError::Arity {
            op,
            expected: "exactly 1",
            got: inputs.len(),
        }),
    }
}

fn rescale(op: &'static str, v: f64, min: f64, max: f64) -> Result<f64, EvalError> {
    if min == max {
        return Err(EvalError::DegenerateRange { op, bound: min });
    }
    Ok((v - min) / (max - min))
}

fn truth(b: bool) -> f64 {
    if b {
        1.0
    } else {
        0.0
    }
}

/// Evaluate one expression node.
///
/// Operands are resolved in declaration order and combined with plain
/// IEEE-754 arithmetic, so the same context always yields the same bits.
pub fn evaluate(ctx: &EvalContext<'_>, expr: &Expression) -> Result<f64, EvalError> {
    match expr {
        Expression::Sum { inputs } => inputs
            .iter()
            .try_fold(0.0, |acc, i| Ok(acc + resolve_input(ctx, i)?)),
        Expression::WeightedSum { inputs, weights } => {
            if inputs.len() != weights.len() {
                return Err(EvalError::LengthMismatch {
                    inputs: inputs.len(),
                    weights: weights.len(),
                });
            }
            inputs
                .iter()
                .zip(weights)
                .try_fold(0.0, |acc, (i, w)| Ok(acc + resolve_input(ctx, i)? * w))
        }
        Expression::Multiply { inputs } => {
            if inputs.len() < 2 {
                return Err(EvalError::Arity {
                    op: "multiply",
                    expected: "at least 2",
                    got: inputs.len(),
                });
            }
            inputs
                .iter()
                .try_fold(1.0, |acc, i| Ok(acc * resolve_input(ctx, i)?))
        }
        Expression::Divide { inputs } => match inputs.as_slice() {
            [a, b] => {
                let a = resolve_input(ctx, a)?;
                let b = resolve_input(ctx, b)?;
                if b == 0.0 {
                    return Err(EvalError::DivisionByZero);
                }
                Ok(a / b)
            }
            _ => Err(EvalError::Arity {
                op: "divide",
                expected: "exactly 2",
                got: inputs.len(),
            }),
        },
        Expression::Min { inputs } => extremum(ctx, "min", inputs, f64::min),
        Expression::Max { inputs } => extremum(ctx, "max", inputs, f64::max),
        Expression::Scale {
            inputs,
            factor,
            min,
            max,
            to,
        } => {
            let v = single(ctx, "scale", inputs)?;
            match (min, max, factor) {
                (Some(min), Some(max), _) => {
                    Ok(rescale("scale", v, *min, *max)? * to.unwrap_or(1.0))
                }
                (_, _, Some(factor)) => Ok(v * factor),
                _ => Err(EvalError::MissingScaleParameters),
            }
        }
        Expression::Normalize { inputs, min, max } => {
            let v = single(ctx, "normalize", inputs)?;
            rescale("normalize", v, min.unwrap_or(0.0), max.unwrap_or(10.0))
        }
        Expression::Equals { left, right } => {
            let (l, r) = (resolve_input(ctx, left)?, resolve_input(ctx, right)?);
            Ok(truth(l == r))
        }
        Expression::Gt { left, right } => {
            let (l, r) = (resolve_input(ctx, left)?, resolve_input(ctx, right)?);
            Ok(truth(l > r))
        }
        Expression::Lt { left, right } => {
            let (l, r) = (resolve_input(ctx, left)?, resolve_input(ctx, right)?);
            Ok(truth(l < r))
        }
        Expression::If {
            condition,
            then,
            otherwise,
        } => {
            let (selected, name) = if evaluate(ctx, condition)? != 0.0 {
                (then, "then")
            } else {
                (otherwise, "else")
            };
            match selected {
                Some(Branch::Expression(e)) => evaluate(ctx, e),
                Some(Branch::Input(i)) => resolve_input(ctx, i),
                None => Err(EvalError::MissingBranch { branch: name }),
            }
        }
        Expression::Map {
            input,
            table,
            default,
        } => {
            let key = map_key(resolve_input(ctx, input)?);
            table
                .get(&key)
                .copied()
                .or(*default)
                .ok_or(EvalError::Unmapped { key })
        }
    }
}

fn extremum(
    ctx: &EvalContext<'_>,
    op: &'static str,
    inputs: &[ExpressionInput],
    pick: fn(f64, f64) -> f64,
) -> Result<f64, EvalError> {
    let values = resolve_all(ctx, inputs)?;
    values
        .into_iter()
        .reduce(pick)
        .ok_or(EvalError::Arity {
            op,
            expected: "at least 1",
            got: 0,
        })
}

/// Text form of a number used to look it up in a `map` table.
///
/// Integral values print without a fraction (`3.0` -> `"3"`). Magnitudes
/// at or above `1e21` or below `1e-6` switch to exponent form with a signed
/// exponent (`"1e+21"`, `"1.5e-7"`), so table keys written that way match.
pub fn map_key(v: f64) -> String {
    if v == 0.0 {
        // Covers -0.0 as well.
        return "0".to_string();
    }
    if v.is_infinite() {
        return if v > 0.0 { "Infinity" } else { "-Infinity" }.to_string();
    }
    let magnitude = v.abs();
    if magnitude >= 1e21 || magnitude < 1e-6 {
        // LowerExp gives the shortest digits but an unsigned positive exponent.
        let exp = format!("{:e}", v);
        return match exp.split_once('e') {
            Some((mantissa, power)) if !power.starts_with('-') => {
                format!("{}e+{}", mantissa, power)
            }
            _ => exp,
        };
    }
    format!("{}", v)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn answers() -> BTreeMap<String, f64> {
        [("Q1", 5.0), ("Q2", 5.0), ("Q3", 0.0), ("Q4", 2.5)]
            .into_iter()
            .map(|(k, v)| (k.to_string(), v))
            .collect()
    }

    /// Parse a single expression through the validator.
    fn expr(e: serde_json::Value) -> Expression {
        let bundle = tally_core::validate(&json!({
            "version_id": "t",
            "variables": { "x": { "type": "rule", "expression": e } }
        }))
        .unwrap();
        bundle.variables["x"].expression.clone()
    }

    fn eval(e: serde_json::Value) -> Result<f64, EvalError> {
        let answers = answers();
        let variables: BTreeMap<String, f64> = [("prior".to_string(), 10.0)].into_iter().collect();
        let ctx = EvalContext {
            answers: &answers,
            variables: &variables,
        };
        evaluate(&ctx, &expr(e))
    }

    #[test]
    fn sum_and_scale() {
        assert_eq!(
            eval(json!({ "op": "sum", "inputs": [{ "answer": "Q1" }, { "answer": "Q2" }] })),
            Ok(10.0)
        );
        assert_eq!(
            eval(json!({ "op": "scale", "inputs": [{ "variable": "prior" }], "min": 0, "max": 20, "to": 100 })),
            Ok(50.0)
        );
        assert_eq!(
            eval(json!({ "op": "scale", "inputs": [{ "variable": "prior" }], "factor": 0.5 })),
            Ok(5.0)
        );
    }

    #[test]
    fn empty_sum_is_zero() {
        assert_eq!(eval(json!({ "op": "sum", "inputs": [] })), Ok(0.0));
    }

    #[test]
    fn weighted_sum() {
        assert_eq!(
            eval(json!({ "op": "weighted_sum", "inputs": [{ "answer": "Q1" }, { "answer": "Q4" }], "weights": [2, 4] })),
            Ok(20.0)
        );
        assert_eq!(
            eval(json!({ "op": "weighted_sum", "inputs": [{ "answer": "Q1" }], "weights": [1, 2] })),
            Err(EvalError::LengthMismatch {
                inputs: 1,
                weights: 2
            })
        );
    }

    #[test]
    fn multiply_needs_two() {
        assert_eq!(
            eval(json!({ "op": "multiply", "inputs": [{ "answer": "Q1" }, { "literal": 3 }] })),
            Ok(15.0)
        );
        assert!(matches!(
            eval(json!({ "op": "multiply", "inputs": [{ "answer": "Q1" }] })),
            Err(EvalError::Arity { op: "multiply", got: 1, .. })
        ));
    }

    #[test]
    fn divide() {
        assert_eq!(
            eval(json!({ "op": "divide", "inputs": [{ "literal": 10 }, { "answer": "Q4" }] })),
            Ok(4.0)
        );
        assert_eq!(
            eval(json!({ "op": "divide", "inputs": [{ "literal": 10 }, { "literal": 0 }] })),
            Err(EvalError::DivisionByZero)
        );
        assert_eq!(
            eval(json!({ "op": "divide", "inputs": [{ "literal": 10 }, { "literal": -0.0 }] })),
            Err(EvalError::DivisionByZero)
        );
        assert!(matches!(
            eval(json!({ "op": "divide", "inputs": [{ "literal": 10 }] })),
            Err(EvalError::Arity { op: "divide", .. })
        ));
    }

    #[test]
    fn min_max() {
        let inputs = json!([{ "answer": "Q1" }, { "answer": "Q3" }, { "answer": "Q4" }]);
        assert_eq!(eval(json!({ "op": "min", "inputs": inputs })), Ok(0.0));
        assert_eq!(eval(json!({ "op": "max", "inputs": inputs })), Ok(5.0));
        assert!(matches!(
            eval(json!({ "op": "max", "inputs": [] })),
            Err(EvalError::Arity { op: "max", got: 0, .. })
        ));
    }

    #[test]
    fn degenerate_ranges_fail() {
        assert_eq!(
            eval(json!({ "op": "scale", "inputs": [{ "answer": "Q1" }], "min": 3, "max": 3 })),
            Err(EvalError::DegenerateRange {
                op: "scale",
                bound: 3.0
            })
        );
        assert_eq!(
            eval(json!({ "op": "normalize", "inputs": [{ "answer": "Q1" }], "min": 4, "max": 4 })),
            Err(EvalError::DegenerateRange {
                op: "normalize",
                bound: 4.0
            })
        );
    }

    #[test]
    fn scale_without_parameters_fails() {
        assert_eq!(
            eval(json!({ "op": "scale", "inputs": [{ "answer": "Q1" }] })),
            Err(EvalError::MissingScaleParameters)
        );
        // A lone min is not a range; factor wins.
        assert_eq!(
            eval(json!({ "op": "scale", "inputs": [{ "answer": "Q1" }], "min": 1, "factor": 2 })),
            Ok(10.0)
        );
    }

    #[test]
    fn normalize_defaults_to_zero_ten() {
        assert_eq!(
            eval(json!({ "op": "normalize", "inputs": [{ "answer": "Q1" }] })),
            Ok(0.5)
        );
    }

    #[test]
    fn comparisons_are_zero_or_one() {
        assert_eq!(
            eval(json!({ "op": "equals", "left": { "answer": "Q1" }, "right": { "answer": "Q2" } })),
            Ok(1.0)
        );
        assert_eq!(
            eval(json!({ "op": "gt", "left": { "answer": "Q3" }, "right": { "literal": 1 } })),
            Ok(0.0)
        );
        assert_eq!(
            eval(json!({ "op": "lt", "left": { "answer": "Q3" }, "right": { "literal": 1 } })),
            Ok(1.0)
        );
    }

    #[test]
    fn if_selects_branch() {
        let e = |cond: serde_json::Value| {
            json!({
                "op": "if",
                "condition": cond,
                "then": { "op": "sum", "inputs": [{ "answer": "Q1" }, { "literal": 1 }] },
                "else": { "literal": -1 }
            })
        };
        assert_eq!(
            eval(e(json!({ "op": "gt", "left": { "answer": "Q1" }, "right": { "literal": 3 } }))),
            Ok(6.0)
        );
        assert_eq!(
            eval(e(json!({ "op": "lt", "left": { "answer": "Q1" }, "right": { "literal": 3 } }))),
            Ok(-1.0)
        );
        // Any nonzero condition value selects `then`.
        assert_eq!(
            eval(e(json!({ "op": "sum", "inputs": [{ "literal": -0.5 }] }))),
            Ok(6.0)
        );
    }

    #[test]
    fn if_with_missing_selected_branch_fails() {
        assert_eq!(
            eval(json!({
                "op": "if",
                "condition": { "op": "equals", "left": { "literal": 1 }, "right": { "literal": 2 } },
                "then": { "literal": 1 }
            })),
            Err(EvalError::MissingBranch { branch: "else" })
        );
    }

    #[test]
    fn map_lookup_and_default() {
        let table = json!({ "0": 10, "5": 50, "2.5": 25 });
        assert_eq!(
            eval(json!({ "op": "map", "input": { "answer": "Q1" }, "table": table })),
            Ok(50.0)
        );
        assert_eq!(
            eval(json!({ "op": "map", "input": { "answer": "Q4" }, "table": table })),
            Ok(25.0)
        );
        assert_eq!(
            eval(json!({ "op": "map", "input": { "literal": 7 }, "table": table, "default": -1 })),
            Ok(-1.0)
        );
        assert_eq!(
            eval(json!({ "op": "map", "input": { "literal": 7 }, "table": table })),
            Err(EvalError::Unmapped { key: "7".into() })
        );
    }

    #[test]
    fn map_key_forms() {
        assert_eq!(map_key(3.0), "3");
        assert_eq!(map_key(-0.0), "0");
        assert_eq!(map_key(2.5), "2.5");
        assert_eq!(map_key(-4.0), "-4");
        assert_eq!(map_key(f64::INFINITY), "Infinity");
        assert_eq!(map_key(1e21), "1e+21");
        assert_eq!(map_key(-2.5e22), "-2.5e+22");
        assert_eq!(map_key(1.5e-7), "1.5e-7");
        assert_eq!(map_key(1e20), "100000000000000000000");
        assert_eq!(map_key(0.000001), "0.000001");
    }

    #[test]
    fn missing_values_are_typed() {
        assert_eq!(
            eval(json!({ "op": "sum", "inputs": [{ "answer": "Q9" }] })),
            Err(EvalError::MissingAnswer {
                answer_id: "Q9".into()
            })
        );
        assert_eq!(
            eval(json!({ "op": "sum", "inputs": [{ "variable": "later" }] })),
            Err(EvalError::MissingVariable {
                variable: "later".into()
            })
        );
    }

    #[test]
    fn messages_are_readable() {
        assert_eq!(EvalError::DivisionByZero.to_string(), "division by zero");
        assert_eq!(
            EvalError::Unmapped { key: "7".into() }.to_string(),
            "map has no entry for '7' and no default"
        );
    }
}
