use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tally_core::{Bundle, DependencyGraph, ExecutionResult};

/// A validated scoring version as held by the backend.
///
/// The graph and hash are computed once at upload and stored alongside the
/// bundle, so every execution of the version sees the same artifacts.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StoredVersion {
    pub bundle: Bundle,
    pub version_hash: String,
    pub graph: DependencyGraph,
    pub locked: bool,
}

impl StoredVersion {
    /// A fresh, unlocked version.
    pub fn new(bundle: Bundle, version_hash: String, graph: DependencyGraph) -> Self {
        StoredVersion {
            bundle,
            version_hash,
            graph,
            locked: false,
        }
    }

    pub fn version_id(&self) -> &str {
        &self.bundle.version_id
    }

    pub fn summary(&self) -> VersionSummary {
        VersionSummary {
            version_id: self.bundle.version_id.clone(),
            version_hash: self.version_hash.clone(),
            locked: self.locked,
            variable_count: self.bundle.variables.len(),
        }
    }
}

/// Listing entry for a stored version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionSummary {
    pub version_id: String,
    pub version_hash: String,
    pub locked: bool,
    pub variable_count: usize,
}

/// A persisted scoring run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionRecord {
    pub id: String,
    pub version_id: String,
    pub version_hash: String,
    pub user_id: String,
    pub answers: BTreeMap<String, f64>,
    pub result: ExecutionResult,
    /// RFC 3339 timestamp string.
    pub executed_at: String,
}
