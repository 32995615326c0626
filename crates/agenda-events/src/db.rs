use rusqlite::Connection;

use crate::error::Result;

/// Initialise the events table and its indexes.
///
/// Safe to call on every startup: `IF NOT EXISTS` throughout.
pub fn init_db(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS events (
            id          INTEGER PRIMARY KEY AUTOINCREMENT,
            owner_id    INTEGER NOT NULL,
            title       TEXT    NOT NULL,
            description TEXT    NOT NULL DEFAULT '',
            date        TEXT,               -- YYYY-MM-DD or NULL
            time        TEXT,               -- HH:MM:SS or NULL (no notification)
            created_at  TEXT    NOT NULL,
            updated_at  TEXT    NOT NULL
        );

        -- One event per (owner, title, slot): rejects double submissions.
        -- IFNULL so that two undated events with the same title also collide.
        CREATE UNIQUE INDEX IF NOT EXISTS idx_events_dedupe
            ON events (owner_id, title, IFNULL(date, ''), IFNULL(time, ''));

        CREATE INDEX IF NOT EXISTS idx_events_owner
            ON events (owner_id, date, time);",
    )?;
    Ok(())
}
