//! Health endpoints.

use std::sync::Arc;

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde_json::json;

use crate::state::AppState;

/// `GET /health/live`
pub async fn liveness() -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}

/// `GET /health/ready` - ready once the configured bucket is reachable.
pub async fn readiness(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    match state.store.bucket_exists().await {
        Ok(true) => (StatusCode::OK, Json(json!({ "status": "ready" }))),
        Ok(false) => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({ "status": "bucket missing" })),
        ),
        Err(err) => {
            tracing::warn!(error = %err, "Readiness check failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({ "status": "store unreachable" })),
            )
        }
    }
}
