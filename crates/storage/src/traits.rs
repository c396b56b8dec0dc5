use async_trait::async_trait;

use crate::error::StoreError;
use crate::record::{ExecutionRecord, StoredVersion, VersionSummary};

/// Persistence for scoring versions and their executions.
///
/// ## Versions
///
/// `put` stores a new version unlocked. A stored version never changes
/// content: putting an existing id with the same hash is a no-op, with a
/// different hash it fails with `StoreError::Conflict`, and putting a locked
/// id always fails with `StoreError::Locked`. Failed puts change nothing.
/// `lock` is one-way and idempotent.
///
/// ## Executions
///
/// Execution records are append-only and listed in insertion order.
/// Recording against an unknown version fails with `StoreError::NotFound`.
///
/// ## Thread Safety
///
/// Implementations must be `Send + Sync + 'static` to be used in axum
/// application state and across async task boundaries.
#[async_trait]
pub trait VersionStore: Send + Sync + 'static {
    /// Store a new version. Existing ids are never overwritten.
    async fn put(&self, version: StoredVersion) -> Result<(), StoreError>;

    /// Mark a version locked. Returns `StoreError::NotFound` for unknown ids.
    async fn lock(&self, version_id: &str) -> Result<(), StoreError>;

    /// Fetch a version. Returns `StoreError::NotFound` for unknown ids.
    async fn get(&self, version_id: &str) -> Result<StoredVersion, StoreError>;

    /// All stored versions, ordered by version id.
    async fn list(&self) -> Result<Vec<VersionSummary>, StoreError>;

    /// Append an execution record for an existing version.
    async fn record_execution(&self, record: ExecutionRecord) -> Result<(), StoreError>;

    /// Execution records for a version, oldest first.
    ///
    /// Returns `StoreError::NotFound` for unknown ids.
    async fn list_executions(&self, version_id: &str)
        -> Result<Vec<ExecutionRecord>, StoreError>;
}
