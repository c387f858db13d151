use axum::Json;
use serde_json::{json, Value};

/// Root health payload; kept dependency-free so it answers even when the
/// database is struggling.
pub async fn health() -> Json<Value> {
    Json(json!({
        "message": "shades-api up",
        "time": chrono::Utc::now().to_rfc3339(),
    }))
}
