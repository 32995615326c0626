//! Notification payload and recipient lookup, shared between the scheduler
//! and the contact directory.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::OwnerId;

/// What gets handed to the notification sender when a job fires.
///
/// Captured when the job is scheduled; later edits to the event produce a new
/// job rather than mutating this snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    /// Email address of the event owner.
    pub recipient: String,
    pub subject: String,
    pub body: String,
}

#[derive(Debug, Error)]
pub enum RecipientError {
    /// The owner has no contact address on file.
    #[error("no contact address for owner {0}")]
    Missing(OwnerId),

    /// The directory backing the lookup failed.
    #[error("recipient lookup failed: {0}")]
    Lookup(String),
}

/// Resolves the address notifications for an owner are delivered to.
pub trait RecipientResolver: Send + Sync {
    fn recipient_for(&self, owner_id: OwnerId) -> Result<String, RecipientError>;
}
