use std::time::Duration;

use archytex_core::timeout::with_timeout;
use axum::extract::State;
use axum::{routing::get, Json, Router};
use serde::Serialize;

use crate::state::AppState;

/// Deadline for each dependency check.
const CHECK_TIMEOUT: Duration = Duration::from_secs(2);

/// Health check response payload.
#[derive(Serialize)]
pub struct HealthResponse {
    /// `ok` when every dependency answered, otherwise `degraded`.
    pub status: &'static str,
    /// Crate version from Cargo.toml.
    pub version: &'static str,
    pub document_store_healthy: bool,
    pub side_store_healthy: bool,
    pub queue_healthy: bool,
    /// Open WebSocket connections.
    pub live_connections: usize,
}

/// GET /health -- returns service and dependency health.
async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let (document_store, side_store, queue) = tokio::join!(
        with_timeout(CHECK_TIMEOUT, "document store health", state.store.health_check()),
        with_timeout(CHECK_TIMEOUT, "side store health", state.side_store.health_check()),
        with_timeout(CHECK_TIMEOUT, "queue health", state.queue.health_check()),
    );
    let document_store_healthy = document_store.is_ok();
    let side_store_healthy = side_store.is_ok();
    let queue_healthy = queue.is_ok();

    let status = if document_store_healthy && side_store_healthy && queue_healthy {
        "ok"
    } else {
        "degraded"
    };

    Json(HealthResponse {
        status,
        version: env!("CARGO_PKG_VERSION"),
        document_store_healthy,
        side_store_healthy,
        queue_healthy,
        live_connections: state.ws_manager.connection_count().await,
    })
}

/// Mount health check routes (root level, not under `/api`).
pub fn router() -> Router<AppState> {
    Router::new().route("/health", get(health_check))
}
