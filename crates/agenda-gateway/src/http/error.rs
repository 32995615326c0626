//! JSON error responses: `{"error": CODE, "message": text}`.

use agenda_core::RecipientError;
use agenda_events::EventError;
use agenda_scheduler::{ReconcileError, ServiceError};
use agenda_users::UserError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use tracing::error;

#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub code: &'static str,
    pub message: String,
}

impl ApiError {
    fn new(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            code,
            message: message.into(),
        }
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, "UNAUTHORIZED", message)
    }

    pub fn invalid(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "INVALID_PARAMS", message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, "NOT_FOUND", message)
    }

    fn internal(err: &dyn std::fmt::Display) -> Self {
        error!(error = %err, "request failed");
        Self::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            "INTERNAL_ERROR",
            "internal error",
        )
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(json!({ "error": self.code, "message": self.message })),
        )
            .into_response()
    }
}

impl From<EventError> for ApiError {
    fn from(err: EventError) -> Self {
        match err {
            EventError::NotFound { .. } => Self::not_found(err.to_string()),
            EventError::Duplicate { .. } => {
                Self::new(StatusCode::CONFLICT, "DUPLICATE", err.to_string())
            }
            EventError::Invalid(msg) => Self::invalid(msg),
            EventError::Database(_) => Self::internal(&err),
        }
    }
}

impl From<ServiceError> for ApiError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::Event(e) => e.into(),
            ServiceError::Reconcile(e) => {
                let status = match e {
                    ReconcileError::NoRecipient(RecipientError::Missing(_)) => {
                        StatusCode::UNPROCESSABLE_ENTITY
                    }
                    _ => StatusCode::SERVICE_UNAVAILABLE,
                };
                Self::new(status, "RECONCILE_FAILED", e.to_string())
            }
        }
    }
}

impl From<UserError> for ApiError {
    fn from(err: UserError) -> Self {
        match err {
            UserError::Invalid(msg) => Self::invalid(msg),
            UserError::DatabaseError(_) => Self::internal(&err),
        }
    }
}
