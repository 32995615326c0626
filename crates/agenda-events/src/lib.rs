//! `agenda-events`: the event store.
//!
//! Events are persisted to a SQLite `events` table. Every read and write is
//! scoped by owner; asking for somebody else's event is indistinguishable
//! from asking for one that does not exist.

pub mod db;
pub mod error;
pub mod store;
pub mod types;

pub use error::{EventError, Result};
pub use store::{EventStore, SqliteEventStore};
pub use types::{Event, NewEvent, ScheduledAt};
