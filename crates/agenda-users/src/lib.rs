//! Contact directory: who an owner is and where their reminders go.

pub mod db;
pub mod directory;
pub mod error;
pub mod types;

pub use directory::UserDirectory;
pub use error::{Result, UserError};
pub use types::Contact;
