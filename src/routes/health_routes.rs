//! Health check endpoints.

use crate::state::AppState;
use axum::{extract::State, routing::get, Json, Router};
use serde_json::{json, Value};

/// Registers health check routes.
pub fn routes() -> Router<AppState> {
    Router::new().route("/health", get(health_check))
}

/// Liveness check. Reports whether messages can be persisted, but a
/// disabled store does not make the service unhealthy.
async fn health_check(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "store": if state.store.is_enabled() { "enabled" } else { "disabled" },
    }))
}
