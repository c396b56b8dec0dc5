use tally_core::EngineError;

/// All errors that can be returned by a VersionStore implementation.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum StoreError {
    /// No version stored under this id.
    #[error("scoring version not found: {version_id}")]
    NotFound { version_id: String },

    /// The version is locked; its content can no longer change.
    #[error("scoring version is locked: {version_id}")]
    Locked { version_id: String },

    /// The id is already stored with different content.
    #[error("scoring version '{version_id}' already exists with hash {existing_hash}")]
    Conflict {
        version_id: String,
        existing_hash: String,
    },

    /// A backend-specific storage error (DB connection, serialization, etc.).
    #[error("storage backend error: {0}")]
    Backend(String),
}

impl From<StoreError> for EngineError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound { version_id } => EngineError::VersionNotFound { version_id },
            StoreError::Locked { version_id } => EngineError::VersionLocked { version_id },
            StoreError::Conflict {
                version_id,
                existing_hash,
            } => EngineError::VersionConflict {
                version_id,
                existing_hash,
            },
            StoreError::Backend(details) => EngineError::StoreFailure { details },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn converts_to_engine_codes() {
        let cases = [
            (
                StoreError::NotFound {
                    version_id: "v1".into(),
                },
                "VERSION_NOT_FOUND",
            ),
            (
                StoreError::Locked {
                    version_id: "v1".into(),
                },
                "VERSION_LOCKED",
            ),
            (
                StoreError::Conflict {
                    version_id: "v1".into(),
                    existing_hash: "sha256-abc".into(),
                },
                "VERSION_CONFLICT",
            ),
            (StoreError::Backend("disk full".into()), "STORE_FAILURE"),
        ];
        for (err, code) in cases {
            assert_eq!(EngineError::from(err).code(), code);
        }
    }
}
