use axum::{extract::State, Json};
use serde_json::{json, Value};
use std::sync::Arc;

use crate::app::AppState;

/// GET /health: liveness probe, returns server metadata.
pub async fn health_handler(State(state): State<Arc<AppState>>) -> Json<Value> {
    match state.jobs.len() {
        Ok(pending) => Json(json!({
            "status": "ok",
            "version": env!("CARGO_PKG_VERSION"),
            "pending_jobs": pending,
        })),
        Err(_) => Json(json!({
            "status": "degraded",
            "version": env!("CARGO_PKG_VERSION"),
            "pending_jobs": null,
        })),
    }
}
