//! Variable dependency graph.
//!
//! Edges run from the referenced variable to the variable that uses it.
//! The topological order is Kahn's algorithm over a sorted frontier, so
//! ties always break lexicographically and the order depends only on the
//! bundle's content.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::bundle::Bundle;
use crate::error::EngineError;

/// A dependency edge: `to` reads the value of `from`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Edge {
    pub from: String,
    pub to: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependencyGraph {
    /// All variable ids, sorted.
    pub nodes: Vec<String>,
    pub edges: Vec<Edge>,
    #[serde(alias = "topoOrder")]
    pub topo_order: Vec<String>,
    /// `layers[d]` holds the variables at depth `d`, in topological order.
    pub layers: Vec<Vec<String>>,
}

/// The part of a graph that is published with execution results.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DagSnapshot {
    pub nodes: Vec<String>,
    pub edges: Vec<Edge>,
    pub layers: Vec<Vec<String>>,
}

impl DependencyGraph {
    pub fn snapshot(&self) -> DagSnapshot {
        DagSnapshot {
            nodes: self.nodes.clone(),
            edges: self.edges.clone(),
            layers: self.layers.clone(),
        }
    }

    /// Variables that `var` reads directly.
    pub fn dependencies_of(&self, var: &str) -> Vec<&str> {
        self.edges
            .iter()
            .filter(|e| e.to == var)
            .map(|e| e.from.as_str())
            .collect()
    }

    /// Variables that read `var` directly.
    pub fn dependents_of(&self, var: &str) -> Vec<&str> {
        self.edges
            .iter()
            .filter(|e| e.from == var)
            .map(|e| e.to.as_str())
            .collect()
    }

    pub fn depth_of(&self, var: &str) -> Option<usize> {
        self.layers
            .iter()
            .position(|layer| layer.iter().any(|v| v == var))
    }
}

/// Build the dependency graph of a validated bundle.
///
/// Fails with `MISSING_VARIABLE` on the first reference (walking variables
/// in sorted order) to an undeclared variable, and with `CYCLE_DETECTED`
/// listing every variable that could not be ordered.
pub fn build(bundle: &Bundle) -> Result<DependencyGraph, EngineError> {
    let nodes: Vec<String> = bundle.variables.keys().cloned().collect();

    let mut successors: BTreeMap<&str, BTreeSet<&str>> = BTreeMap::new();
    let mut predecessors: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
    let mut indegree: BTreeMap<&str, usize> = BTreeMap::new();
    for id in &nodes {
        successors.insert(id, BTreeSet::new());
        predecessors.insert(id, Vec::new());
        indegree.insert(id, 0);
    }

    let mut edges = Vec::new();
    for (var_id, def) in &bundle.variables {
        for target in def.expression.variable_refs() {
            let Some(succ) = successors.get_mut(target) else {
                return Err(EngineError::MissingVariable {
                    variable: target.to_string(),
                    referenced_by: var_id.clone(),
                });
            };
            if succ.insert(var_id.as_str()) {
                edges.push(Edge {
                    from: target.to_string(),
                    to: var_id.clone(),
                });
                if let Some(preds) = predecessors.get_mut(var_id.as_str()) {
                    preds.push(target);
                }
                if let Some(d) = indegree.get_mut(var_id.as_str()) {
                    *d += 1;
                }
            }
        }
    }

    // Kahn's algorithm; the BTreeSet frontier always yields the smallest id.
    let mut frontier: BTreeSet<&str> = indegree
        .iter()
        .filter(|(_, &d)| d == 0)
        .map(|(&id, _)| id)
        .collect();
    let mut topo_order: Vec<String> = Vec::with_capacity(nodes.len());
    while let Some(node) = frontier.pop_first() {
        topo_order.push(node.to_string());
        for &next in successors.get(node).into_iter().flatten() {
            if let Some(d) = indegree.get_mut(next) {
                *d -= 1;
                if *d == 0 {
                    frontier.insert(next);
                }
            }
        }
    }

    if topo_order.len() < nodes.len() {
        let ordered: BTreeSet<&str> = topo_order.iter().map(String::as_str).collect();
        let path: Vec<String> = nodes
            .iter()
            .filter(|n| !ordered.contains(n.as_str()))
            .cloned()
            .collect();
        log::debug!("cycle detected in bundle '{}': {:?}", bundle.version_id, path);
        return Err(EngineError::CycleDetected { path });
    }

    let mut depth: BTreeMap<&str, usize> = BTreeMap::new();
    let mut layers: Vec<Vec<String>> = Vec::new();
    for node in &topo_order {
        let d = predecessors
            .get(node.as_str())
            .into_iter()
            .flatten()
            .filter_map(|p| depth.get(p))
            .map(|pd| pd + 1)
            .max()
            .unwrap_or(0);
        depth.insert(node, d);
        if layers.len() <= d {
            layers.resize_with(d + 1, Vec::new);
        }
        layers[d].push(node.clone());
    }

    log::debug!(
        "built dependency graph for '{}': {} nodes, {} edges, {} layers",
        bundle.version_id,
        nodes.len(),
        edges.len(),
        layers.len()
    );

    Ok(DependencyGraph {
        nodes,
        edges,
        topo_order,
        layers,
    })
}
