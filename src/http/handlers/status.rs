//! Status and root endpoint handlers

use crate::http::handlers::AppState;
use axum::{extract::State, Json};
use serde_json::{json, Value};

/// GET / (and HEAD /) - liveness, used by readiness probes
pub async fn root(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "name": "regboot",
        "version": crate::VERSION,
        "uptime_seconds": state.uptime_seconds(),
    }))
}

/// GET /-/ping - npm ping
pub async fn ping() -> Json<Value> {
    Json(json!({}))
}
