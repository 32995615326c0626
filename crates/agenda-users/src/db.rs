use agenda_core::OwnerId;
use rusqlite::{Connection, Result};

use crate::types::Contact;

pub(crate) const CONTACT_SELECT_SQL: &str =
    "SELECT owner_id, display_name, email, created_at, updated_at
     FROM users WHERE owner_id = ?1";

/// Map a SELECT row (column order from CONTACT_SELECT_SQL) to a Contact.
pub(crate) fn row_to_contact(row: &rusqlite::Row<'_>) -> rusqlite::Result<Contact> {
    Ok(Contact {
        owner_id: OwnerId(row.get(0)?),
        display_name: row.get(1)?,
        email: row.get(2)?,
        created_at: row.get(3)?,
        updated_at: row.get(4)?,
    })
}

/// Initialise the users table. Safe to call on every startup.
pub fn init_db(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS users (
            owner_id     INTEGER PRIMARY KEY NOT NULL,
            display_name TEXT NOT NULL DEFAULT '',
            email        TEXT NOT NULL,
            created_at   TEXT NOT NULL,
            updated_at   TEXT NOT NULL
        );",
    )
}
