use agenda_core::OwnerId;
use serde::{Deserialize, Serialize};

/// Where an owner's reminders are delivered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contact {
    pub owner_id: OwnerId,
    pub display_name: String,
    pub email: String,
    pub created_at: String,
    pub updated_at: String,
}
