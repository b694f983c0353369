use axum::{http::StatusCode, response::IntoResponse, Json};
use serde_json::json;

pub const LIVENESS_TEXT: &str = "MIQ backend is running.";

/// Plain-text banner for humans and uptime pingers.
pub async fn root() -> &'static str {
    LIVENESS_TEXT
}

/// Liveness probe: always returns 200 to indicate the process is running.
pub async fn healthz() -> impl IntoResponse {
    (StatusCode::OK, Json(json!({"ok": true})))
}
