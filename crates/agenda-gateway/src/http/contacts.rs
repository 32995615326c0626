use std::sync::Arc;

use agenda_users::Contact;
use axum::{extract::State, Json};
use serde::Deserialize;
use tracing::info;

use crate::app::AppState;
use crate::auth::Caller;
use crate::http::error::ApiError;

#[derive(Debug, Deserialize)]
pub struct ContactBody {
    #[serde(default)]
    pub name: String,
    pub email: String,
}

/// GET /v1/me
pub async fn get_contact(
    State(state): State<Arc<AppState>>,
    Caller(owner_id): Caller,
) -> Result<Json<Contact>, ApiError> {
    state
        .users
        .get(owner_id)?
        .map(Json)
        .ok_or_else(|| ApiError::not_found(format!("no contact for owner {owner_id}")))
}

/// PUT /v1/me: set where reminders go. Pending reminders are rescheduled
/// with the new address.
pub async fn put_contact(
    State(state): State<Arc<AppState>>,
    Caller(owner_id): Caller,
    Json(body): Json<ContactBody>,
) -> Result<Json<Contact>, ApiError> {
    let contact = state.users.upsert(owner_id, &body.name, &body.email)?;
    let pending = state.events.refresh_owner(owner_id)?;
    info!(owner_id = %owner_id, pending, "contact updated");
    Ok(Json(contact))
}
