//! Event CRUD, scoped to the caller. Another owner's event is always a 404.

use std::sync::Arc;

use agenda_core::{EventId, OwnerId};
use agenda_events::{Event, NewEvent, ScheduledAt};
use axum::{
    extract::{FromRequestParts, Path, State},
    http::{request::Parts, StatusCode},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::app::AppState;
use crate::auth::Caller;
use crate::http::error::ApiError;

/// `{id}` path segment. A non-integer id is a JSON `INVALID_PARAMS` error
/// rather than axum's plain-text rejection.
#[derive(Debug, Clone, Copy)]
pub struct EventPath(pub EventId);

impl<S: Send + Sync> FromRequestParts<S> for EventPath {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Path(id) = Path::<i64>::from_request_parts(parts, state)
            .await
            .map_err(|rejection| ApiError::invalid(rejection.body_text()))?;
        Ok(EventPath(EventId(id)))
    }
}

/// Request body for POST and PUT. PUT replaces every field.
#[derive(Debug, Deserialize)]
pub struct EventBody {
    pub title: String,
    #[serde(default)]
    pub description: String,
    /// `YYYY-MM-DD`.
    #[serde(default)]
    pub date: Option<String>,
    /// `HH:MM`; empty or absent means no reminder.
    #[serde(default)]
    pub time: Option<String>,
}

impl EventBody {
    fn into_new_event(self) -> Result<NewEvent, ApiError> {
        let date = self.date.filter(|d| !d.trim().is_empty());
        let time = self.time.filter(|t| !t.trim().is_empty());
        let scheduled_at = match (date, time) {
            (Some(date), time) => Some(ScheduledAt::parse(&date, time.as_deref())?),
            (None, Some(_)) => return Err(ApiError::invalid("time given without a date")),
            (None, None) => None,
        };
        Ok(NewEvent::new(self.title, self.description, scheduled_at))
    }
}

#[derive(Debug, Serialize)]
pub struct EventView {
    pub id: EventId,
    pub owner_id: OwnerId,
    pub title: String,
    pub description: String,
    pub date: Option<String>,
    pub time: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl From<Event> for EventView {
    fn from(event: Event) -> Self {
        let date = event
            .scheduled_at
            .map(|s| s.date.format("%Y-%m-%d").to_string());
        let time = event
            .scheduled_at
            .and_then(|s| s.time)
            .map(|t| t.format("%H:%M").to_string());
        Self {
            id: event.id,
            owner_id: event.owner_id,
            title: event.title,
            description: event.description,
            date,
            time,
            created_at: event.created_at,
            updated_at: event.updated_at,
        }
    }
}

/// GET /v1/events: the caller's events, earliest first.
pub async fn list_events(
    State(state): State<Arc<AppState>>,
    Caller(owner_id): Caller,
) -> Result<Json<Vec<EventView>>, ApiError> {
    let events = state.events.list(owner_id)?;
    Ok(Json(events.into_iter().map(EventView::from).collect()))
}

/// POST /v1/events
pub async fn create_event(
    State(state): State<Arc<AppState>>,
    Caller(owner_id): Caller,
    Json(body): Json<EventBody>,
) -> Result<(StatusCode, Json<EventView>), ApiError> {
    let created = state.events.create(owner_id, body.into_new_event()?)?;
    Ok((StatusCode::CREATED, Json(created.into())))
}

/// GET /v1/events/{id}
pub async fn get_event(
    State(state): State<Arc<AppState>>,
    Caller(owner_id): Caller,
    EventPath(id): EventPath,
) -> Result<Json<EventView>, ApiError> {
    let event = state.events.get(id, owner_id)?;
    Ok(Json(event.into()))
}

/// PUT /v1/events/{id}
pub async fn update_event(
    State(state): State<Arc<AppState>>,
    Caller(owner_id): Caller,
    EventPath(id): EventPath,
    Json(body): Json<EventBody>,
) -> Result<Json<EventView>, ApiError> {
    let updated = state
        .events
        .update(id, owner_id, body.into_new_event()?)?;
    Ok(Json(updated.into()))
}

/// DELETE /v1/events/{id}
pub async fn delete_event(
    State(state): State<Arc<AppState>>,
    Caller(owner_id): Caller,
    EventPath(id): EventPath,
) -> Result<Json<Value>, ApiError> {
    state.events.delete(id, owner_id)?;
    Ok(Json(json!({ "status": "success" })))
}
