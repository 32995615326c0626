//! Caller identity. Authentication happens upstream; the proxy in front of
//! the gateway forwards the signed-in user's id in `X-User-Id`.

use agenda_core::OwnerId;
use axum::{extract::FromRequestParts, http::request::Parts};

use crate::http::error::ApiError;

pub const USER_ID_HEADER: &str = "x-user-id";

/// The authenticated owner making the request.
#[derive(Debug, Clone, Copy)]
pub struct Caller(pub OwnerId);

impl<S: Send + Sync> FromRequestParts<S> for Caller {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let raw = parts
            .headers
            .get(USER_ID_HEADER)
            .ok_or_else(|| ApiError::unauthorized("missing X-User-Id header"))?;
        raw.to_str()
            .ok()
            .and_then(|v| v.parse::<OwnerId>().ok())
            .map(Caller)
            .ok_or_else(|| ApiError::unauthorized("X-User-Id must be an integer"))
    }
}
