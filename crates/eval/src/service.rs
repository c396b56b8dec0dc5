//! Upload, lock and scoring against a version store.

use serde::Serialize;
use serde_json::Value;
use tally_core::{
    structural_hash, validate_answers, AnswerDomain, AnswersPayload, DagSnapshot, EngineError,
    ExecutionResult,
};
use tally_storage::{ExecutionRecord, StoredVersion, VersionStore, VersionSummary};

use crate::engine::{execute, prepare};

/// What an upload returns.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UploadReceipt {
    pub version_id: String,
    pub version_hash: String,
    pub structural_hash: String,
    pub dag: DagSnapshot,
}

/// Scoring operations over an injected store.
///
/// Every operation is a pure engine step plus at most one store read and
/// one store write.
pub struct ScoringService<S> {
    store: S,
    domain: AnswerDomain,
}

impl<S: VersionStore> ScoringService<S> {
    pub fn new(store: S) -> Self {
        Self::with_domain(store, AnswerDomain::default())
    }

    pub fn with_domain(store: S, domain: AnswerDomain) -> Self {
        ScoringService { store, domain }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn domain(&self) -> &AnswerDomain {
        &self.domain
    }

    /// Prepare a raw bundle and store it unlocked.
    ///
    /// Re-uploading identical content is accepted. Different content under
    /// a stored id fails with `VERSION_CONFLICT`, a locked id with
    /// `VERSION_LOCKED`.
    pub async fn upload(&self, raw: &Value) -> Result<UploadReceipt, EngineError> {
        let prepared = prepare(raw, &self.domain)?;
        let receipt = UploadReceipt {
            version_id: prepared.bundle.version_id.clone(),
            version_hash: prepared.version_hash.clone(),
            structural_hash: structural_hash(&prepared.bundle),
            dag: prepared.graph.snapshot(),
        };
        self.store
            .put(StoredVersion::new(
                prepared.bundle,
                prepared.version_hash,
                prepared.graph,
            ))
            .await?;
        log::info!(
            "uploaded scoring version '{}' ({})",
            receipt.version_id,
            receipt.version_hash
        );
        Ok(receipt)
    }

    pub async fn lock(&self, version_id: &str) -> Result<(), EngineError> {
        self.store.lock(version_id).await?;
        log::info!("locked scoring version '{}'", version_id);
        Ok(())
    }

    pub async fn version(&self, version_id: &str) -> Result<StoredVersion, EngineError> {
        Ok(self.store.get(version_id).await?)
    }

    pub async fn dag(&self, version_id: &str) -> Result<DagSnapshot, EngineError> {
        Ok(self.store.get(version_id).await?.graph.snapshot())
    }

    pub async fn list(&self) -> Result<Vec<VersionSummary>, EngineError> {
        Ok(self.store.list().await?)
    }

    /// Score one set of answers and persist the run.
    pub async fn score(
        &self,
        version_id: &str,
        payload: &AnswersPayload,
    ) -> Result<ExecutionResult, EngineError> {
        validate_answers(&payload.answers, &self.domain)?;
        let stored = self.store.get(version_id).await?;
        let result = execute(
            &stored.bundle,
            &stored.graph,
            &stored.version_hash,
            payload,
        )?;

        let record = ExecutionRecord {
            id: new_execution_id(),
            version_id: version_id.to_string(),
            version_hash: stored.version_hash.clone(),
            user_id: payload.user_id.clone(),
            answers: payload.answers.clone(),
            result: result.clone(),
            executed_at: now_rfc3339(),
        };
        let execution_id = record.id.clone();
        self.store.record_execution(record).await?;
        log::info!(
            "scored '{}' for user '{}' (execution {})",
            version_id,
            payload.user_id,
            execution_id
        );
        Ok(result)
    }

    pub async fn executions(&self, version_id: &str) -> Result<Vec<ExecutionRecord>, EngineError> {
        Ok(self.store.list_executions(version_id).await?)
    }
}

fn new_execution_id() -> String {
    format!("exec-{:016x}", rand::random::<u64>())
}

fn now_rfc3339() -> String {
    time::OffsetDateTime::now_utc()
        .format(&time::format_description::well_known::Rfc3339)
        .unwrap_or_else(|_| "unknown".to_string())
}
