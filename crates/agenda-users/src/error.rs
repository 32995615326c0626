use thiserror::Error;

/// All contact-layer errors. Kept separate from the event errors so the
/// gateway can map them without coupling layers.
#[derive(Debug, Error)]
pub enum UserError {
    #[error("Invalid contact: {0}")]
    Invalid(String),

    #[error("Database error: {0}")]
    DatabaseError(#[from] rusqlite::Error),
}

pub type Result<T> = std::result::Result<T, UserError>;
