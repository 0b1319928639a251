use axum::{extract::Extension, http::StatusCode, Json};
use serde::Serialize;

use crate::server::app::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    status: String,
    active_sessions: usize,
}

/// Health check endpoint
///
/// Returns 200 OK while the workspace root exists, 503 Service Unavailable
/// otherwise (no session could be allocated).
pub async fn health_handler(
    Extension(state): Extension<AppState>,
) -> (StatusCode, Json<HealthResponse>) {
    let is_healthy = tokio::fs::metadata(state.deps.workspaces.path())
        .await
        .map(|meta| meta.is_dir())
        .unwrap_or(false);

    let (status_code, status) = if is_healthy {
        (StatusCode::OK, "healthy")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "unhealthy")
    };

    (
        status_code,
        Json(HealthResponse {
            status: status.to_string(),
            active_sessions: state.deps.active_sessions.count(),
        }),
    )
}
