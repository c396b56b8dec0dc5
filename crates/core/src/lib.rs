//! tally-core: scoring bundle model and the pure preparation pipeline.
//!
//! A raw bundle goes through three steps before it can be executed:
//!
//! 1. [`validate_bundle()`] / [`validate_answer_references()`] -- structure
//!    and answer ids, producing a typed [`Bundle`]
//! 2. [`build_graph()`] -- dependency graph, cycle detection, deterministic
//!    topological order and depth layers
//! 3. [`version_hash()`] -- canonical SHA-256 fingerprint
//!
//! Evaluation lives in `tally-eval`; persistence behind the `tally-storage`
//! trait.

pub mod bundle;
pub mod error;
pub mod execution;
pub mod expr;
pub mod graph;
pub mod hash;
pub mod validate;

pub use bundle::{Bundle, Metadata, VariableDefinition, VariableKind};
pub use error::{EngineError, ErrorClass};
pub use execution::{AnswersPayload, ExecutionResult};
pub use expr::{Branch, Expression, ExpressionInput, OPERATORS};
pub use graph::{DagSnapshot, DependencyGraph, Edge};
pub use validate::{
    validate, validate_answer_references, validate_answers, validate_bundle, AnswerDomain,
};

pub use graph::build as build_graph;
pub use hash::{hash as version_hash, structural_hash};
