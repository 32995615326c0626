use std::sync::Mutex;

use agenda_core::{EventId, OwnerId};
use rusqlite::{types::Type, Connection, ErrorCode, OptionalExtension};
use tracing::{debug, info, instrument};

use crate::db::init_db;
use crate::error::{EventError, Result};
use crate::types::{Event, NewEvent, ScheduledAt};

/// Durable, owner-scoped storage for events.
///
/// Implementations never touch notification jobs; callers run the
/// reconciliation step after every successful mutation.
pub trait EventStore: Send + Sync {
    /// Insert a new event. Fails with `Duplicate` when the owner already has
    /// an event with the same title at the same slot.
    fn create(&self, owner_id: OwnerId, event: &NewEvent) -> Result<Event>;

    /// Replace every editable field of an existing event.
    fn update(&self, id: EventId, owner_id: OwnerId, event: &NewEvent) -> Result<Event>;

    /// Delete an event and return the row as it was.
    fn delete(&self, id: EventId, owner_id: OwnerId) -> Result<Event>;

    fn get(&self, id: EventId, owner_id: OwnerId) -> Result<Event>;

    /// All events of one owner, earliest slot first, ties broken by id.
    /// Undated events come last; a missing time sorts as midnight.
    fn list(&self, owner_id: OwnerId) -> Result<Vec<Event>>;

    /// Every event of every owner. Used to rebuild pending notifications.
    fn list_all(&self) -> Result<Vec<Event>>;
}

const EVENT_COLUMNS: &str =
    "id, owner_id, title, description, date, time, created_at, updated_at";

const ORDER_BY_SLOT: &str =
    "ORDER BY date IS NULL, date, IFNULL(time, '00:00:00'), id";

/// SQLite-backed event store.
///
/// Wraps a single connection in a `Mutex`; every operation is one short
/// critical section.
pub struct SqliteEventStore {
    db: Mutex<Connection>,
}

impl SqliteEventStore {
    /// Wrap an open connection, creating the schema if needed.
    pub fn new(conn: Connection) -> Result<Self> {
        init_db(&conn)?;
        Ok(Self {
            db: Mutex::new(conn),
        })
    }
}

impl EventStore for SqliteEventStore {
    #[instrument(skip(self, event), fields(owner_id = %owner_id, title = %event.title))]
    fn create(&self, owner_id: OwnerId, event: &NewEvent) -> Result<Event> {
        event.validate()?;
        let now = chrono::Utc::now().to_rfc3339();
        let (date, time) = slot_columns(event.scheduled_at.as_ref());

        let db = self.db.lock().unwrap();
        db.execute(
            "INSERT INTO events
             (owner_id, title, description, date, time, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)",
            rusqlite::params![
                owner_id.get(),
                event.title,
                event.description,
                date,
                time,
                now
            ],
        )
        .map_err(|e| map_constraint(e, owner_id, &event.title))?;

        let id = EventId(db.last_insert_rowid());
        info!(event_id = %id, "event created");
        select_one(&db, id, owner_id)?.ok_or(EventError::NotFound { id })
    }

    #[instrument(skip(self, event), fields(event_id = %id, owner_id = %owner_id))]
    fn update(&self, id: EventId, owner_id: OwnerId, event: &NewEvent) -> Result<Event> {
        event.validate()?;
        let now = chrono::Utc::now().to_rfc3339();
        let (date, time) = slot_columns(event.scheduled_at.as_ref());

        let db = self.db.lock().unwrap();
        let rows_changed = db
            .execute(
                "UPDATE events
                 SET title = ?1, description = ?2, date = ?3, time = ?4, updated_at = ?5
                 WHERE id = ?6 AND owner_id = ?7",
                rusqlite::params![
                    event.title,
                    event.description,
                    date,
                    time,
                    now,
                    id.get(),
                    owner_id.get()
                ],
            )
            .map_err(|e| map_constraint(e, owner_id, &event.title))?;
        if rows_changed == 0 {
            return Err(EventError::NotFound { id });
        }

        debug!("event updated");
        select_one(&db, id, owner_id)?.ok_or(EventError::NotFound { id })
    }

    #[instrument(skip(self), fields(event_id = %id, owner_id = %owner_id))]
    fn delete(&self, id: EventId, owner_id: OwnerId) -> Result<Event> {
        let db = self.db.lock().unwrap();
        let event = select_one(&db, id, owner_id)?.ok_or(EventError::NotFound { id })?;
        db.execute(
            "DELETE FROM events WHERE id = ?1 AND owner_id = ?2",
            rusqlite::params![id.get(), owner_id.get()],
        )?;
        info!("event deleted");
        Ok(event)
    }

    #[instrument(skip(self), fields(event_id = %id, owner_id = %owner_id))]
    fn get(&self, id: EventId, owner_id: OwnerId) -> Result<Event> {
        let db = self.db.lock().unwrap();
        select_one(&db, id, owner_id)?.ok_or(EventError::NotFound { id })
    }

    #[instrument(skip(self), fields(owner_id = %owner_id))]
    fn list(&self, owner_id: OwnerId) -> Result<Vec<Event>> {
        let db = self.db.lock().unwrap();
        let mut stmt = db.prepare(&format!(
            "SELECT {EVENT_COLUMNS} FROM events WHERE owner_id = ?1 {ORDER_BY_SLOT}"
        ))?;
        let rows = stmt.query_map(rusqlite::params![owner_id.get()], row_to_event)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    fn list_all(&self) -> Result<Vec<Event>> {
        let db = self.db.lock().unwrap();
        let mut stmt = db.prepare(&format!("SELECT {EVENT_COLUMNS} FROM events {ORDER_BY_SLOT}"))?;
        let rows = stmt.query_map([], row_to_event)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }
}

fn select_one(db: &Connection, id: EventId, owner_id: OwnerId) -> Result<Option<Event>> {
    let event = db
        .query_row(
            &format!("SELECT {EVENT_COLUMNS} FROM events WHERE id = ?1 AND owner_id = ?2"),
            rusqlite::params![id.get(), owner_id.get()],
            row_to_event,
        )
        .optional()?;
    Ok(event)
}

fn slot_columns(slot: Option<&ScheduledAt>) -> (Option<String>, Option<String>) {
    match slot {
        Some(at) => (Some(at.date_column()), at.time_column()),
        None => (None, None),
    }
}

/// Unique-index violations become `Duplicate`; everything else stays a
/// database error.
fn map_constraint(err: rusqlite::Error, owner_id: OwnerId, title: &str) -> EventError {
    match err {
        rusqlite::Error::SqliteFailure(ref e, _) if e.code == ErrorCode::ConstraintViolation => {
            EventError::Duplicate {
                owner_id,
                title: title.to_string(),
            }
        }
        other => EventError::Database(other),
    }
}

/// Map a SQLite row (column order from `EVENT_COLUMNS`) to an `Event`.
fn row_to_event(row: &rusqlite::Row<'_>) -> rusqlite::Result<Event> {
    let date: Option<String> = row.get(4)?;
    let time: Option<String> = row.get(5)?;
    let scheduled_at = date
        .map(|d| ScheduledAt::from_columns(&d, time.as_deref()))
        .transpose()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(4, Type::Text, Box::new(e)))?;

    Ok(Event {
        id: EventId(row.get(0)?),
        owner_id: OwnerId(row.get(1)?),
        title: row.get(2)?,
        description: row.get(3)?,
        scheduled_at,
        created_at: row.get(6)?,
        updated_at: row.get(7)?,
    })
}
