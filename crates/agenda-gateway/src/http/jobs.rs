use std::sync::Arc;

use agenda_core::EventId;
use axum::{extract::State, Json};
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::app::AppState;
use crate::auth::Caller;
use crate::http::error::ApiError;

#[derive(Debug, Serialize)]
pub struct PendingJob {
    pub event_id: EventId,
    pub fire_at: DateTime<Utc>,
}

/// GET /v1/jobs: the caller's pending reminders, next first.
pub async fn list_jobs(
    State(state): State<Arc<AppState>>,
    Caller(owner_id): Caller,
) -> Result<Json<Vec<PendingJob>>, ApiError> {
    let pending = state
        .events
        .pending_for(owner_id)?
        .into_iter()
        .map(|(event_id, fire_at)| PendingJob { event_id, fire_at })
        .collect();
    Ok(Json(pending))
}
