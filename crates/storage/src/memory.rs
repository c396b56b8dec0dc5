//! In-memory `VersionStore`.

use std::collections::BTreeMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::error::StoreError;
use crate::record::{ExecutionRecord, StoredVersion, VersionSummary};
use crate::traits::VersionStore;

#[derive(Debug, Default)]
struct Tables {
    versions: BTreeMap<String, StoredVersion>,
    executions: BTreeMap<String, Vec<ExecutionRecord>>,
}

/// A process-local store. Contents are lost when it is dropped.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn not_found(version_id: &str) -> StoreError {
    StoreError::NotFound {
        version_id: version_id.to_string(),
    }
}

#[async_trait]
impl VersionStore for MemoryStore {
    async fn put(&self, mut version: StoredVersion) -> Result<(), StoreError> {
        let mut tables = self.tables.write().await;
        let id = version.version_id().to_string();
        if let Some(existing) = tables.versions.get(&id) {
            if existing.locked {
                return Err(StoreError::Locked { version_id: id });
            }
            if existing.version_hash != version.version_hash {
                return Err(StoreError::Conflict {
                    version_id: id,
                    existing_hash: existing.version_hash.clone(),
                });
            }
            log::debug!("scoring version '{}' already stored, unchanged", id);
            return Ok(());
        }
        version.locked = false;
        log::debug!("storing scoring version '{}' ({})", id, version.version_hash);
        tables.versions.insert(id, version);
        Ok(())
    }

    async fn lock(&self, version_id: &str) -> Result<(), StoreError> {
        let mut tables = self.tables.write().await;
        let version = tables
            .versions
            .get_mut(version_id)
            .ok_or_else(|| not_found(version_id))?;
        version.locked = true;
        Ok(())
    }

    async fn get(&self, version_id: &str) -> Result<StoredVersion, StoreError> {
        let tables = self.tables.read().await;
        tables
            .versions
            .get(version_id)
            .cloned()
            .ok_or_else(|| not_found(version_id))
    }

    async fn list(&self) -> Result<Vec<VersionSummary>, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables.versions.values().map(StoredVersion::summary).collect())
    }

    async fn record_execution(&self, record: ExecutionRecord) -> Result<(), StoreError> {
        let mut tables = self.tables.write().await;
        if !tables.versions.contains_key(&record.version_id) {
            return Err(not_found(&record.version_id));
        }
        tables
            .executions
            .entry(record.version_id.clone())
            .or_default()
            .push(record);
        Ok(())
    }

    async fn list_executions(
        &self,
        version_id: &str,
    ) -> Result<Vec<ExecutionRecord>, StoreError> {
        let tables = self.tables.read().await;
        if !tables.versions.contains_key(version_id) {
            return Err(not_found(version_id));
        }
        Ok(tables
            .executions
            .get(version_id)
            .cloned()
            .unwrap_or_default())
    }
}
