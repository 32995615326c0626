use std::sync::Mutex;

use agenda_core::{OwnerId, RecipientError, RecipientResolver};
use rusqlite::{Connection, OptionalExtension};
use tracing::{debug, info, instrument};

use crate::db::{init_db, row_to_contact, CONTACT_SELECT_SQL};
use crate::error::{Result, UserError};
use crate::types::Contact;

/// Owner id → contact details, backed by SQLite.
///
/// Registration lives elsewhere; this directory only records the display
/// name and mailbox an owner wants reminders sent to.
pub struct UserDirectory {
    db: Mutex<Connection>,
}

impl UserDirectory {
    pub fn new(conn: Connection) -> Result<Self> {
        init_db(&conn)?;
        Ok(Self {
            db: Mutex::new(conn),
        })
    }

    /// Create or replace the contact for `owner_id`.
    #[instrument(skip(self, display_name, email), fields(owner_id = %owner_id))]
    pub fn upsert(&self, owner_id: OwnerId, display_name: &str, email: &str) -> Result<Contact> {
        let email = email.trim();
        validate_email(email)?;
        let now = chrono::Utc::now().to_rfc3339();

        let conn = self.db.lock().unwrap();
        conn.execute(
            "INSERT INTO users (owner_id, display_name, email, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?4)
             ON CONFLICT(owner_id) DO UPDATE SET
                display_name = excluded.display_name,
                email        = excluded.email,
                updated_at   = excluded.updated_at",
            rusqlite::params![owner_id.get(), display_name.trim(), email, now],
        )?;
        info!("contact saved");

        let contact = conn.query_row(
            CONTACT_SELECT_SQL,
            rusqlite::params![owner_id.get()],
            row_to_contact,
        )?;
        Ok(contact)
    }

    /// Look up a contact. Missing is `Ok(None)`; callers decide whether
    /// that is exceptional.
    pub fn get(&self, owner_id: OwnerId) -> Result<Option<Contact>> {
        let conn = self.db.lock().unwrap();
        let contact = conn
            .query_row(
                CONTACT_SELECT_SQL,
                rusqlite::params![owner_id.get()],
                row_to_contact,
            )
            .optional()?;
        Ok(contact)
    }
}

impl RecipientResolver for UserDirectory {
    fn recipient_for(&self, owner_id: OwnerId) -> std::result::Result<String, RecipientError> {
        match self.get(owner_id) {
            Ok(Some(contact)) => Ok(contact.email),
            Ok(None) => {
                debug!(owner_id = %owner_id, "no contact on file");
                Err(RecipientError::Missing(owner_id))
            }
            Err(e) => Err(RecipientError::Lookup(e.to_string())),
        }
    }
}

fn validate_email(email: &str) -> Result<()> {
    let valid = match email.split_once('@') {
        Some((local, domain)) => !local.is_empty() && !domain.is_empty(),
        None => false,
    };
    if !valid || email.chars().any(char::is_whitespace) {
        return Err(UserError::Invalid(format!("not an email address: '{email}'")));
    }
    Ok(())
}
