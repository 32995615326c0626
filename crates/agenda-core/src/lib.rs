pub mod config;
pub mod error;
pub mod notification;
pub mod types;

pub use error::{AgendaError, Result};
pub use notification::{Notification, RecipientError, RecipientResolver};
pub use types::{EventId, OwnerId};
