//! `tally serve` -- HTTP JSON API over an in-memory version store.
//!
//! Security features:
//! - CORS headers on all responses (permissive for local dev)
//! - Per-IP rate limiting (default: 60 req/min, configurable)
//! - Optional API key authentication via TALLY_API_KEY env var
//!
//! Endpoints:
//! - GET  /health                              - Server status (exempt from auth)
//! - GET  /scoring-versions                    - List stored versions
//! - POST /scoring-versions                    - Upload a bundle
//! - GET  /scoring-versions/{id}               - Stored bundle, graph, hash and lock state
//! - POST /scoring-versions/{id}/lock          - Lock a version
//! - GET  /scoring-versions/{id}/dag           - Dependency graph snapshot
//! - GET  /scoring-versions/{id}/executions    - Recorded runs
//! - POST /score/{id}                          - Score an answers payload
//!
//! All responses use Content-Type: application/json.

mod handlers;
mod middleware;
mod state;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::DefaultBodyLimit;
use axum::http::{Method, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{middleware as axum_middleware, Json, Router};
use tally_eval::ScoringService;
use tally_storage::MemoryStore;
use tower_http::cors::{Any, CorsLayer};

use self::handlers::{
    handle_dag, handle_executions, handle_get_version, handle_health, handle_list_versions,
    handle_lock, handle_not_found, handle_score, handle_upload,
};
use self::middleware::{auth_middleware, rate_limit_middleware};
use self::state::{AppState, RateLimiter};
use crate::config::Config;

/// Maximum request body size: 10 MB.
const MAX_BODY_SIZE: usize = 10 * 1024 * 1024;

/// Construct a JSON error response with the given status code and message.
fn json_error(status: StatusCode, message: &str) -> impl IntoResponse {
    (status, Json(serde_json::json!({"error": message})))
}

fn router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers(Any);

    Router::new()
        .route("/health", get(handle_health))
        .route(
            "/scoring-versions",
            get(handle_list_versions).post(handle_upload),
        )
        .route("/scoring-versions/{id}", get(handle_get_version))
        .route("/scoring-versions/{id}/lock", post(handle_lock))
        .route("/scoring-versions/{id}/dag", get(handle_dag))
        .route("/scoring-versions/{id}/executions", get(handle_executions))
        .route("/score/{id}", post(handle_score))
        .fallback(handle_not_found)
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ))
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            rate_limit_middleware,
        ))
        .layer(cors)
        .layer(DefaultBodyLimit::max(MAX_BODY_SIZE))
        .with_state(state)
}

/// Upload bundle files before the server starts accepting requests.
///
/// A bundle that fails to load is reported and skipped.
async fn preload(service: &ScoringService<MemoryStore>, paths: &[PathBuf]) {
    for path in paths {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| e.to_string())
            .and_then(|s| {
                serde_json::from_str::<serde_json::Value>(&s).map_err(|e| e.to_string())
            });
        let raw = match raw {
            Ok(v) => v,
            Err(e) => {
                eprintln!("Warning: failed to read {}: {}", path.display(), e);
                continue;
            }
        };
        match service.upload(&raw).await {
            Ok(receipt) => eprintln!(
                "Loaded scoring version: {} (from {})",
                receipt.version_id,
                path.display()
            ),
            Err(e) => eprintln!("Warning: failed to load {}: {}", path.display(), e),
        }
    }
}

/// Start the HTTP server on the given port, optionally pre-loading bundles.
///
/// Security:
/// - CORS: Permissive (`Any` origin) for local dev; tighten for production.
/// - Rate limit: Per-IP, from config or `TALLY_RATE_LIMIT` (default 60 req/min).
/// - API key: If `TALLY_API_KEY` env var is set, all endpoints except /health require auth.
pub async fn start_server(
    port: u16,
    bundle_paths: Vec<PathBuf>,
    config: Config,
) -> Result<(), Box<dyn std::error::Error>> {
    let service = ScoringService::with_domain(MemoryStore::new(), config.answers);
    preload(&service, &bundle_paths).await;

    let server = config.server.with_env_overrides();
    let api_key = std::env::var("TALLY_API_KEY")
        .ok()
        .filter(|k| !k.is_empty());

    if api_key.is_some() {
        eprintln!("API key authentication enabled");
    }
    eprintln!(
        "Rate limit: {} requests per {}s per IP",
        server.rate_limit, server.rate_limit_window_secs
    );

    let state = Arc::new(AppState {
        service,
        rate_limiter: RateLimiter::new(
            server.rate_limit,
            Duration::from_secs(server.rate_limit_window_secs),
        ),
        api_key,
    });

    let addr = format!("0.0.0.0:{}", port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    eprintln!("Tally scoring engine listening on http://{}", addr);
    log::info!("listening on {}", addr);
    axum::serve(
        listener,
        router(state).into_make_service_with_connect_info::<std::net::SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    eprintln!("\nServer shut down.");
    Ok(())
}

/// Wait for a shutdown signal (Ctrl+C).
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        log::warn!("failed to install Ctrl+C handler: {}", e);
        std::future::pending::<()>().await;
    }
    eprintln!("\nReceived shutdown signal...");
}
