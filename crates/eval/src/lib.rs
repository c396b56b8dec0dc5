//! tally-eval: expression evaluation, bundle execution and the scoring
//! service that ties the engine to a version store.
//!
//! The evaluator only ever sees values that are already resolved; ordering
//! comes from the dependency graph built in `tally-core`.

pub mod engine;
pub mod evaluator;
pub mod service;

pub use engine::{execute, prepare, Prepared, ScoringEngine};
pub use evaluator::{evaluate, map_key, resolve_input, EvalContext, EvalError};
pub use service::{ScoringService, UploadReceipt};
