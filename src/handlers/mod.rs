//! HTTP request handlers

pub mod transcribe;

use axum::http::StatusCode;
use axum::Json;

/// Public health check. No authentication, no admission accounting.
pub async fn health_check() -> (StatusCode, Json<serde_json::Value>) {
    (
        StatusCode::OK,
        Json(serde_json::json!({ "status": "ok", "service": "scribe-gateway" })),
    )
}
