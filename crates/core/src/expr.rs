//! Expression tree of the scoring language.
//!
//! The language is closed: every operator is a variant of [`Expression`],
//! and every operand that reads a value is an [`ExpressionInput`]. Answer
//! and variable references are distinct variants, so nothing downstream of
//! validation ever has to guess what an identifier refers to.

use std::collections::BTreeMap;

use serde::Serialize;

/// Operator names accepted in the `op` field, in declaration order.
pub const OPERATORS: [&str; 13] = [
    "sum",
    "weighted_sum",
    "multiply",
    "divide",
    "min",
    "max",
    "scale",
    "normalize",
    "equals",
    "gt",
    "lt",
    "if",
    "map",
];

/// A value source for an operator.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExpressionInput {
    /// A number written directly in the bundle.
    Literal(f64),
    /// An answer supplied with the execution request (e.g. `Q12`).
    Answer(String),
    /// Another variable of the same bundle.
    Variable(String),
}

/// One arm of an `if` expression.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Branch {
    Expression(Box<Expression>),
    Input(ExpressionInput),
}

/// A single operator node.
///
/// Serializes to the canonical wire form (`{"op": "...", ...}`) used for
/// hashing and for returning stored bundles.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Expression {
    Sum {
        inputs: Vec<ExpressionInput>,
    },
    WeightedSum {
        inputs: Vec<ExpressionInput>,
        weights: Vec<f64>,
    },
    Multiply {
        inputs: Vec<ExpressionInput>,
    },
    Divide {
        inputs: Vec<ExpressionInput>,
    },
    Min {
        inputs: Vec<ExpressionInput>,
    },
    Max {
        inputs: Vec<ExpressionInput>,
    },
    /// Either a range rescale (`min`/`max`/`to`) or a plain `factor`.
    Scale {
        inputs: Vec<ExpressionInput>,
        #[serde(skip_serializing_if = "Option::is_none")]
        factor: Option<f64>,
        #[serde(skip_serializing_if = "Option::is_none")]
        min: Option<f64>,
        #[serde(skip_serializing_if = "Option::is_none")]
        max: Option<f64>,
        #[serde(skip_serializing_if = "Option::is_none")]
        to: Option<f64>,
    },
    Normalize {
        inputs: Vec<ExpressionInput>,
        #[serde(skip_serializing_if = "Option::is_none")]
        min: Option<f64>,
        #[serde(skip_serializing_if = "Option::is_none")]
        max: Option<f64>,
    },
    Equals {
        left: ExpressionInput,
        right: ExpressionInput,
    },
    Gt {
        left: ExpressionInput,
        right: ExpressionInput,
    },
    Lt {
        left: ExpressionInput,
        right: ExpressionInput,
    },
    If {
        condition: Box<Expression>,
        #[serde(skip_serializing_if = "Option::is_none")]
        then: Option<Branch>,
        #[serde(rename = "else", skip_serializing_if = "Option::is_none")]
        otherwise: Option<Branch>,
    },
    Map {
        input: ExpressionInput,
        table: BTreeMap<String, f64>,
        #[serde(skip_serializing_if = "Option::is_none")]
        default: Option<f64>,
    },
}

impl Expression {
    /// The wire name of this node's operator.
    pub fn op_name(&self) -> &'static str {
        match self {
            Expression::Sum { .. } => "sum",
            Expression::WeightedSum { .. } => "weighted_sum",
            Expression::Multiply { .. } => "multiply",
            Expression::Divide { .. } => "divide",
            Expression::Min { .. } => "min",
            Expression::Max { .. } => "max",
            Expression::Scale { .. } => "scale",
            Expression::Normalize { .. } => "normalize",
            Expression::Equals { .. } => "equals",
            Expression::Gt { .. } => "gt",
            Expression::Lt { .. } => "lt",
            Expression::If { .. } => "if",
            Expression::Map { .. } => "map",
        }
    }

    /// Collect every input in this tree, depth-first in declaration order.
    pub fn collect_inputs<'a>(&'a self, out: &mut Vec<&'a ExpressionInput>) {
        match self {
            Expression::Sum { inputs }
            | Expression::WeightedSum { inputs, .. }
            | Expression::Multiply { inputs }
            | Expression::Divide { inputs }
            | Expression::Min { inputs }
            | Expression::Max { inputs }
            | Expression::Scale { inputs, .. }
            | Expression::Normalize { inputs, .. } => out.extend(inputs.iter()),
            Expression::Equals { left, right }
            | Expression::Gt { left, right }
            | Expression::Lt { left, right } => {
                out.push(left);
                out.push(right);
            }
            Expression::If {
                condition,
                then,
                otherwise,
            } => {
                condition.collect_inputs(out);
                for branch in [then, otherwise].into_iter().flatten() {
                    match branch {
                        Branch::Expression(e) => e.collect_inputs(out),
                        Branch::Input(i) => out.push(i),
                    }
                }
            }
            Expression::Map { input, .. } => out.push(input),
        }
    }

    /// Variable ids referenced anywhere in this tree, in first-seen order, deduplicated.
    pub fn variable_refs(&self) -> Vec<&str> {
        let mut inputs = Vec::new();
        self.collect_inputs(&mut inputs);
        let mut refs: Vec<&str> = Vec::new();
        for input in inputs {
            if let ExpressionInput::Variable(id) = input {
                if !refs.contains(&id.as_str()) {
                    refs.push(id.as_str());
                }
            }
        }
        refs
    }

    /// Answer ids referenced anywhere in this tree, in first-seen order (may repeat).
    pub fn answer_refs(&self) -> Vec<&str> {
        let mut inputs = Vec::new();
        self.collect_inputs(&mut inputs);
        inputs
            .into_iter()
            .filter_map(|i| match i {
                ExpressionInput::Answer(id) => Some(id.as_str()),
                _ => None,
            })
            .collect()
    }
}
