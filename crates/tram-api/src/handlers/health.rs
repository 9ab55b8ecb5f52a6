use axum::Json;
use serde_json::{json, Value};

/// Liveness probe; touches neither the database nor storage.
pub async fn health() -> Json<Value> {
    Json(json!({ "status": "alive" }))
}
