//! Execution inputs and outputs.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::graph::DagSnapshot;

/// Answers submitted for one scoring run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnswersPayload {
    pub user_id: String,
    pub answers: BTreeMap<String, f64>,
}

impl AnswersPayload {
    pub fn new(user_id: impl Into<String>) -> Self {
        AnswersPayload {
            user_id: user_id.into(),
            answers: BTreeMap::new(),
        }
    }

    pub fn with_answer(mut self, id: impl Into<String>, value: f64) -> Self {
        self.answers.insert(id.into(), value);
        self
    }
}

/// The full, auditable outcome of a successful run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub version_id: String,
    pub version_hash: String,
    pub variables: BTreeMap<String, f64>,
    /// Variable ids in the order they were computed.
    pub execution_trace: Vec<String>,
    pub dag: DagSnapshot,
}
