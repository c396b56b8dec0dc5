//! HTTP route handlers for scoring versions and executions.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use tally_core::{AnswersPayload, EngineError};

use super::json_error;
use super::state::AppState;

/// HTTP status for an engine error.
pub(crate) fn status_for(err: &EngineError) -> StatusCode {
    match err {
        EngineError::VersionNotFound { .. } => StatusCode::NOT_FOUND,
        EngineError::VersionLocked { .. } | EngineError::VersionConflict { .. } => {
            StatusCode::CONFLICT
        }
        EngineError::StoreFailure { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        _ => StatusCode::BAD_REQUEST,
    }
}

/// Engine errors are returned as their tagged JSON payload.
fn engine_error(err: EngineError) -> Response {
    let status = status_for(&err);
    if status.is_server_error() {
        log::error!("{}", err);
    } else {
        log::info!("request rejected: {}", err);
    }
    (status, Json(err.to_json_value())).into_response()
}

/// Fallback handler for unmatched routes.
pub(crate) async fn handle_not_found() -> impl IntoResponse {
    json_error(StatusCode::NOT_FOUND, "not found")
}

/// GET /health
pub(crate) async fn handle_health() -> impl IntoResponse {
    let response = serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    });
    (StatusCode::OK, Json(response))
}

/// GET /scoring-versions
pub(crate) async fn handle_list_versions(State(state): State<Arc<AppState>>) -> Response {
    match state.service.list().await {
        Ok(versions) => {
            (StatusCode::OK, Json(serde_json::json!({ "versions": versions }))).into_response()
        }
        Err(e) => engine_error(e),
    }
}

/// POST /scoring-versions
pub(crate) async fn handle_upload(
    State(state): State<Arc<AppState>>,
    Json(bundle): Json<serde_json::Value>,
) -> Response {
    match state.service.upload(&bundle).await {
        Ok(receipt) => {
            let response = serde_json::json!({
                "ok": true,
                "version_id": receipt.version_id,
                "version_hash": receipt.version_hash,
                "structural_hash": receipt.structural_hash,
                "dag": receipt.dag,
            });
            (StatusCode::OK, Json(response)).into_response()
        }
        Err(e) => engine_error(e),
    }
}

/// GET /scoring-versions/{id}
pub(crate) async fn handle_get_version(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Response {
    match state.service.version(&id).await {
        Ok(version) => (StatusCode::OK, Json(version)).into_response(),
        Err(e) => engine_error(e),
    }
}

/// POST /scoring-versions/{id}/lock
pub(crate) async fn handle_lock(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Response {
    match state.service.lock(&id).await {
        Ok(()) => {
            let response = serde_json::json!({ "ok": true, "version_id": id });
            (StatusCode::OK, Json(response)).into_response()
        }
        Err(e) => engine_error(e),
    }
}

/// GET /scoring-versions/{id}/dag
pub(crate) async fn handle_dag(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Response {
    match state.service.dag(&id).await {
        Ok(dag) => (StatusCode::OK, Json(dag)).into_response(),
        Err(e) => engine_error(e),
    }
}

/// GET /scoring-versions/{id}/executions
pub(crate) async fn handle_executions(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Response {
    match state.service.executions(&id).await {
        Ok(executions) => (
            StatusCode::OK,
            Json(serde_json::json!({ "executions": executions })),
        )
            .into_response(),
        Err(e) => engine_error(e),
    }
}

/// POST /score/{id}
pub(crate) async fn handle_score(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(payload): Json<AnswersPayload>,
) -> Response {
    match state.service.score(&id, &payload).await {
        Ok(result) => (StatusCode::OK, Json(result)).into_response(),
        Err(e) => engine_error(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_errors_map_to_distinct_statuses() {
        let id = || "v1".to_string();
        assert_eq!(
            status_for(&EngineError::VersionNotFound { version_id: id() }),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            status_for(&EngineError::VersionLocked { version_id: id() }),
            StatusCode::CONFLICT
        );
        assert_eq!(
            status_for(&EngineError::VersionConflict {
                version_id: id(),
                existing_hash: "sha256-abc".into(),
            }),
            StatusCode::CONFLICT
        );
        assert_eq!(
            status_for(&EngineError::StoreFailure {
                details: "down".into()
            }),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            status_for(&EngineError::CycleDetected {
                path: vec!["a".into()]
            }),
            StatusCode::BAD_REQUEST
        );
    }
}
