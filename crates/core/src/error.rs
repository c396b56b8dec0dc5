use serde::{Deserialize, Serialize};

/// Every failure the engine reports, in its wire form.
///
/// Serializes as an internally tagged object, e.g.
/// `{"error": "MISSING_VARIABLE", "variable": "v_x", "referenced_by": "v_total"}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, thiserror::Error)]
#[serde(tag = "error", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EngineError {
    /// The listed variables could not be ordered; they contain at least one cycle.
    #[error("cycle detected among variables: {}", .path.join(", "))]
    CycleDetected { path: Vec<String> },

    #[error("variable '{referenced_by}' references undeclared variable '{variable}'")]
    MissingVariable {
        variable: String,
        referenced_by: String,
    },

    #[error("invalid operator: {operator}")]
    InvalidOperator { operator: String },

    #[error("invalid schema: {details}")]
    InvalidSchema { details: String },

    #[error("invalid question id: {question_id}")]
    InvalidQuestionId { question_id: String },

    /// Evaluation stopped at `variable` (the last one attempted).
    #[error("execution error{}: {details}", .variable.as_deref().map(|v| format!(" in '{}'", v)).unwrap_or_default())]
    ExecutionError {
        details: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        variable: Option<String>,
    },

    #[error("scoring version not found: {version_id}")]
    VersionNotFound { version_id: String },

    /// Re-upload of a version that has already been locked.
    #[error("scoring version is locked: {version_id}")]
    VersionLocked { version_id: String },

    /// Upload of different content under an existing version id.
    #[error("scoring version '{version_id}' already exists with hash {existing_hash}")]
    VersionConflict {
        version_id: String,
        existing_hash: String,
    },

    #[error("store failure: {details}")]
    StoreFailure { details: String },
}

/// Coarse error classes, each with its own retry policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorClass {
    /// Malformed bundle structure. Fix the bundle.
    Schema,
    /// Cycles and dangling references. Fix the bundle.
    Graph,
    /// Failure attributable to one answer payload. Retry with corrected input.
    Evaluation,
    /// Store boundary. Retry policy belongs to the caller.
    Store,
}

impl EngineError {
    pub fn class(&self) -> ErrorClass {
        match self {
            EngineError::InvalidSchema { .. }
            | EngineError::InvalidOperator { .. }
            | EngineError::InvalidQuestionId { .. } => ErrorClass::Schema,
            EngineError::CycleDetected { .. } | EngineError::MissingVariable { .. } => {
                ErrorClass::Graph
            }
            EngineError::ExecutionError { .. } => ErrorClass::Evaluation,
            EngineError::VersionNotFound { .. }
            | EngineError::VersionLocked { .. }
            | EngineError::VersionConflict { .. }
            | EngineError::StoreFailure { .. } => ErrorClass::Store,
        }
    }

    /// The wire tag (`"CYCLE_DETECTED"`, ...).
    pub fn code(&self) -> &'static str {
        match self {
            EngineError::CycleDetected { .. } => "CYCLE_DETECTED",
            EngineError::MissingVariable { .. } => "MISSING_VARIABLE",
            EngineError::InvalidOperator { .. } => "INVALID_OPERATOR",
            EngineError::InvalidSchema { .. } => "INVALID_SCHEMA",
            EngineError::InvalidQuestionId { .. } => "INVALID_QUESTION_ID",
            EngineError::ExecutionError { .. } => "EXECUTION_ERROR",
            EngineError::VersionNotFound { .. } => "VERSION_NOT_FOUND",
            EngineError::VersionLocked { .. } => "VERSION_LOCKED",
            EngineError::VersionConflict { .. } => "VERSION_CONFLICT",
            EngineError::StoreFailure { .. } => "STORE_FAILURE",
        }
    }

    pub(crate) fn schema(details: impl Into<String>) -> Self {
        EngineError::InvalidSchema {
            details: details.into(),
        }
    }

    pub fn to_json_value(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_else(|_| serde_json::json!({ "error": self.code() }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_form_is_tagged() {
        let err = EngineError::MissingVariable {
            variable: "v_x".into(),
            referenced_by: "v_total".into(),
        };
        assert_eq!(
            err.to_json_value(),
            serde_json::json!({
                "error": "MISSING_VARIABLE",
                "variable": "v_x",
                "referenced_by": "v_total"
            })
        );
    }

    #[test]
    fn execution_error_without_variable_omits_field() {
        let err = EngineError::ExecutionError {
            details: "division by zero".into(),
            variable: None,
        };
        assert_eq!(
            err.to_json_value(),
            serde_json::json!({"error": "EXECUTION_ERROR", "details": "division by zero"})
        );
        assert_eq!(err.to_string(), "execution error: division by zero");
    }

    #[test]
    fn code_matches_serde_tag() {
        let errs = [
            EngineError::CycleDetected { path: vec!["A".into()] },
            EngineError::InvalidQuestionId {
                question_id: "Q0".into(),
            },
            EngineError::VersionLocked {
                version_id: "v1".into(),
            },
            EngineError::VersionConflict {
                version_id: "v1".into(),
                existing_hash: "sha256-abc".into(),
            },
        ];
        for e in errs {
            assert_eq!(e.to_json_value()["error"], e.code());
        }
    }

    #[test]
    fn classes() {
        assert_eq!(
            EngineError::CycleDetected { path: vec![] }.class(),
            ErrorClass::Graph
        );
        assert_eq!(
            EngineError::VersionNotFound {
                version_id: "x".into()
            }
            .class(),
            ErrorClass::Store
        );
    }
}
