//! Preparation and execution of scoring bundles.
//!
//! `prepare` turns a raw bundle into the artifacts that are stored with a
//! version; `execute` runs one set of answers through them.

use std::collections::BTreeMap;

use serde_json::Value;
use tally_core::{
    build_graph, validate_answer_references, validate_bundle, version_hash, AnswerDomain,
    AnswersPayload, Bundle, DependencyGraph, EngineError, ExecutionResult,
};

use crate::evaluator::{evaluate, EvalContext};

/// A validated bundle with its graph and version hash.
#[derive(Debug, Clone, PartialEq)]
pub struct Prepared {
    pub bundle: Bundle,
    pub graph: DependencyGraph,
    pub version_hash: String,
}

/// Validate, build the graph and hash, stopping at the first error.
pub fn prepare(raw: &Value, domain: &AnswerDomain) -> Result<Prepared, EngineError> {
    let bundle = validate_bundle(raw, domain)?;
    validate_answer_references(&bundle, domain)?;
    let graph = build_graph(&bundle)?;
    let version_hash = version_hash(&bundle);
    log::debug!(
        "prepared '{}' ({} variables, hash {})",
        bundle.version_id,
        bundle.variables.len(),
        version_hash
    );
    Ok(Prepared {
        bundle,
        graph,
        version_hash,
    })
}

/// Compute every variable in topological order.
///
/// All-or-nothing: the first evaluation failure aborts the run and is
/// reported as `EXECUTION_ERROR` naming the variable being computed.
pub fn execute(
    bundle: &Bundle,
    graph: &DependencyGraph,
    version_hash: &str,
    payload: &AnswersPayload,
) -> Result<ExecutionResult, EngineError> {
    let mut variables: BTreeMap<String, f64> = BTreeMap::new();
    let mut execution_trace = Vec::with_capacity(graph.topo_order.len());

    for var_id in &graph.topo_order {
        let def = bundle
            .variable(var_id)
            .ok_or_else(|| EngineError::ExecutionError {
                details: "variable is not defined in the bundle".to_string(),
                variable: Some(var_id.clone()),
            })?;
        let ctx = EvalContext {
            answers: &payload.answers,
            variables: &variables,
        };
        let value = evaluate(&ctx, &def.expression).map_err(|e| {
            log::warn!(
                "execution of '{}' failed at '{}': {}",
                bundle.version_id,
                var_id,
                e
            );
            EngineError::ExecutionError {
                details: e.to_string(),
                variable: Some(var_id.clone()),
            }
        })?;
        log::debug!("{} = {}", var_id, value);
        variables.insert(var_id.clone(), value);
        execution_trace.push(var_id.clone());
    }

    Ok(ExecutionResult {
        version_id: bundle.version_id.clone(),
        version_hash: version_hash.to_string(),
        variables,
        execution_trace,
        dag: graph.snapshot(),
    })
}

/// A prepared bundle that can be run repeatedly.
#[derive(Debug, Clone)]
pub struct ScoringEngine {
    prepared: Prepared,
}

impl ScoringEngine {
    pub fn new(raw: &Value, domain: &AnswerDomain) -> Result<Self, EngineError> {
        Ok(ScoringEngine {
            prepared: prepare(raw, domain)?,
        })
    }

    /// Wrap artifacts that were prepared earlier, e.g. loaded from a store.
    pub fn from_prepared(prepared: Prepared) -> Self {
        ScoringEngine { prepared }
    }

    pub fn bundle(&self) -> &Bundle {
        &self.prepared.bundle
    }

    pub fn graph(&self) -> &DependencyGraph {
        &self.prepared.graph
    }

    pub fn version_hash(&self) -> &str {
        &self.prepared.version_hash
    }

    pub fn run(&self, payload: &AnswersPayload) -> Result<ExecutionResult, EngineError> {
        execute(
            &self.prepared.bundle,
            &self.prepared.graph,
            &self.prepared.version_hash,
            payload,
        )
    }

    pub fn into_prepared(self) -> Prepared {
        self.prepared
    }
}
