use agenda_core::{EventId, OwnerId};
use thiserror::Error;

/// Errors that can occur during event store operations.
#[derive(Debug, Error)]
pub enum EventError {
    /// No event with this id exists for this owner. Also returned when the
    /// event exists but belongs to someone else.
    #[error("event not found: {id}")]
    NotFound { id: EventId },

    /// The owner already has an event with the same title at the same slot.
    #[error("duplicate event for owner {owner_id}: {title}")]
    Duplicate { owner_id: OwnerId, title: String },

    /// The submitted fields are unusable (empty title, unparsable date, ...).
    #[error("invalid event: {0}")]
    Invalid(String),

    /// A SQLite operation failed.
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),
}

pub type Result<T> = std::result::Result<T, EventError>;
