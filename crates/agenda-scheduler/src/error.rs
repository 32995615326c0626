use agenda_core::RecipientError;
use agenda_events::EventError;
use thiserror::Error;

/// The job table's lock was poisoned by a panicking holder.
#[derive(Debug, Clone, Copy, Error)]
#[error("job table unavailable: lock poisoned")]
pub struct JobTableError;

/// Errors that end or prevent a scheduler run.
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// The clock could not be read. The supervisor restarts the loop.
    #[error("timer fault: {0}")]
    TimerFault(String),

    #[error(transparent)]
    JobTable(#[from] JobTableError),

    /// Listing events for a rebuild failed.
    #[error("event store error: {0}")]
    Store(#[from] EventError),

    /// Rebuilding the job table from the store failed.
    #[error("rebuild failed: {0}")]
    Rebuild(#[from] ReconcileError),
}

pub type Result<T> = std::result::Result<T, SchedulerError>;

/// Why the job table could not be brought in line with an event.
#[derive(Debug, Error)]
pub enum ReconcileError {
    /// The owner has no address to notify.
    #[error("cannot schedule reminder: {0}")]
    NoRecipient(#[from] RecipientError),

    #[error(transparent)]
    JobTable(#[from] JobTableError),

    #[error("clock unavailable: {0}")]
    Clock(String),
}

/// Errors returned to callers of the event service.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error(transparent)]
    Event(#[from] EventError),

    /// The store write was undone because the matching job could not be
    /// scheduled.
    #[error(transparent)]
    Reconcile(#[from] ReconcileError),
}

/// A notification could not be handed to the transport.
#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("invalid address '{address}': {reason}")]
    InvalidAddress { address: String, reason: String },

    #[error("could not build message: {0}")]
    Build(String),

    #[error("transport error: {0}")]
    Transport(String),
}
