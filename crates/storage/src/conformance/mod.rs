//! Conformance test suite for `VersionStore` implementations.
//!
//! Any backend can run this suite to check that it honours the store
//! contract:
//!
//! - **Put**: round-trip, idempotent re-put, conflicting content, listing order
//! - **Lock**: one-way and idempotent, locked versions reject replacement
//! - **Executions**: append-only records, insertion order, unknown versions
//! - **Error handling**: correct error variants and fields
//! - **Concurrency**: racing writers leave the store consistent
//!
//! # Usage
//!
//! Backend crates call [`run_conformance_suite`] with a factory function that
//! creates a fresh, empty store for each test:
//!
//! ```ignore
//! use tally_storage::conformance::run_conformance_suite;
//!
//! #[tokio::test]
//! async fn sqlite_conformance() {
//!     let report = run_conformance_suite(|| async {
//!         create_test_sqlite_store().await
//!     }).await;
//!     assert!(report.failed == 0, "{report}");
//! }
//! ```

mod concurrent;
mod error;
mod executions;
mod lock;
mod put;

use std::fmt;
use std::future::Future;

use serde_json::json;
use tally_core::{build_graph, validate, version_hash, ExecutionResult};

use crate::record::{ExecutionRecord, StoredVersion};
use crate::VersionStore;

/// Result of a single conformance test.
#[derive(Debug, Clone)]
pub struct TestResult {
    /// Test category (e.g. "put", "lock", "executions").
    pub category: String,
    /// Test name (e.g. "put_then_get_returns_same_version").
    pub name: String,
    pub passed: bool,
    /// Error message if the test failed.
    pub message: Option<String>,
}

impl TestResult {
    fn pass(category: &str, name: &str) -> Self {
        Self {
            category: category.to_string(),
            name: name.to_string(),
            passed: true,
            message: None,
        }
    }

    fn fail(category: &str, name: &str, msg: String) -> Self {
        Self {
            category: category.to_string(),
            name: name.to_string(),
            passed: false,
            message: Some(msg),
        }
    }

    fn from_result(category: &str, name: &str, result: Result<(), String>) -> Self {
        match result {
            Ok(()) => Self::pass(category, name),
            Err(msg) => Self::fail(category, name, msg),
        }
    }
}

/// Aggregated report from a full conformance suite run.
#[derive(Debug, Clone)]
pub struct ConformanceReport {
    pub results: Vec<TestResult>,
    pub passed: usize,
    pub failed: usize,
    pub total: usize,
}

impl fmt::Display for ConformanceReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Conformance: {}/{} passed ({} failed)",
            self.passed, self.total, self.failed
        )?;
        for r in &self.results {
            if !r.passed {
                writeln!(
                    f,
                    "  FAIL [{}/{}]: {}",
                    r.category,
                    r.name,
                    r.message.as_deref().unwrap_or("(no message)")
                )?;
            }
        }
        Ok(())
    }
}

/// Run the full conformance suite against a store.
///
/// The `factory` function is called once per test to create a fresh, empty
/// store, ensuring test isolation.
pub async fn run_conformance_suite<S, F, Fut>(factory: F) -> ConformanceReport
where
    S: VersionStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let mut results = Vec::new();

    results.extend(put::run_put_tests(&factory).await);
    results.extend(lock::run_lock_tests(&factory).await);
    results.extend(executions::run_execution_tests(&factory).await);
    results.extend(error::run_error_tests(&factory).await);
    results.extend(concurrent::run_concurrent_tests(&factory).await);

    let passed = results.iter().filter(|r| r.passed).count();
    let total = results.len();

    ConformanceReport {
        results,
        passed,
        failed: total - passed,
        total,
    }
}

// ── Helpers: record constructors with sensible defaults ──────────────────────

/// A small two-variable version. `description` lets tests produce distinct
/// content (and hash) under the same id.
fn make_version(version_id: &str, description: &str) -> Result<StoredVersion, String> {
    let raw = json!({
        "version_id": version_id,
        "metadata": { "description": description },
        "variables": {
            "v_sum": { "type": "rule", "expression": {
                "op": "sum", "inputs": [{ "answer": "Q1" }, { "answer": "Q2" }]
            }},
            "v_scaled": { "type": "rule", "expression": {
                "op": "scale", "inputs": [{ "variable": "v_sum" }], "min": 0, "max": 20, "to": 100
            }}
        }
    });
    let bundle = validate(&raw).map_err(|e| format!("validate: {e}"))?;
    let graph = build_graph(&bundle).map_err(|e| format!("graph: {e}"))?;
    let hash = version_hash(&bundle);
    Ok(StoredVersion::new(bundle, hash, graph))
}

fn make_execution(id: &str, version: &StoredVersion, user_id: &str) -> ExecutionRecord {
    let answers = [("Q1".to_string(), 5.0), ("Q2".to_string(), 5.0)]
        .into_iter()
        .collect();
    let variables = [("v_scaled".to_string(), 50.0), ("v_sum".to_string(), 10.0)]
        .into_iter()
        .collect();
    ExecutionRecord {
        id: id.to_string(),
        version_id: version.version_id().to_string(),
        version_hash: version.version_hash.clone(),
        user_id: user_id.to_string(),
        answers,
        result: ExecutionResult {
            version_id: version.version_id().to_string(),
            version_hash: version.version_hash.clone(),
            variables,
            execution_trace: version.graph.topo_order.clone(),
            dag: version.graph.snapshot(),
        },
        executed_at: "2025-01-01T00:00:00Z".to_string(),
    }
}
