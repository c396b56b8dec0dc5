//! Scoring bundle: a versioned set of rule-based variable definitions.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::expr::Expression;

/// Descriptive bundle metadata.
///
/// Keys other than `created_at` and `description` are kept verbatim in
/// `extra` so that they take part in the version hash.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Metadata {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

/// Kind of a variable definition. Only rules exist today.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VariableKind {
    Rule,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VariableDefinition {
    #[serde(rename = "type")]
    pub kind: VariableKind,
    pub expression: Expression,
}

impl VariableDefinition {
    pub fn rule(expression: Expression) -> Self {
        VariableDefinition {
            kind: VariableKind::Rule,
            expression,
        }
    }
}

/// A validated scoring bundle.
///
/// Obtained from [`crate::validate::validate`]; never mutated after
/// upload. A content change needs a new `version_id`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Bundle {
    pub version_id: String,
    pub metadata: Metadata,
    pub variables: BTreeMap<String, VariableDefinition>,
}

impl Bundle {
    pub fn variable(&self, id: &str) -> Option<&VariableDefinition> {
        self.variables.get(id)
    }

    /// Canonical JSON value of this bundle (explicit input tags, sorted keys).
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}
