use agenda_core::{EventId, OwnerId};
use chrono::{DateTime, NaiveDate, NaiveTime, TimeZone, Timelike, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{EventError, Result};

pub(crate) const DATE_FORMAT: &str = "%Y-%m-%d";
pub(crate) const TIME_FORMAT: &str = "%H:%M:%S";

/// When an event takes place: a calendar date and, optionally, a time of day.
///
/// Only events with a time of day produce a notification. The value is taken
/// as UTC; no zone conversion happens anywhere in the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduledAt {
    pub date: NaiveDate,
    pub time: Option<NaiveTime>,
}

impl ScheduledAt {
    pub fn new(date: NaiveDate, time: Option<NaiveTime>) -> Self {
        Self { date, time }
    }

    /// Build from a UTC instant, truncated to whole seconds.
    pub fn at(instant: DateTime<Utc>) -> Self {
        let naive = instant.naive_utc();
        Self {
            date: naive.date(),
            time: naive.time().with_nanosecond(0),
        }
    }

    /// Parse the wire form: `YYYY-MM-DD` plus an optional `HH:MM` or
    /// `HH:MM:SS`. A blank time means "no time of day".
    pub fn parse(date: &str, time: Option<&str>) -> Result<Self> {
        let date = NaiveDate::parse_from_str(date.trim(), DATE_FORMAT)
            .map_err(|e| EventError::Invalid(format!("date '{date}': {e}")))?;

        let time = match time.map(str::trim) {
            None | Some("") => None,
            Some(t) => Some(
                NaiveTime::parse_from_str(t, "%H:%M")
                    .or_else(|_| NaiveTime::parse_from_str(t, TIME_FORMAT))
                    .map_err(|e| EventError::Invalid(format!("time '{t}': {e}")))?,
            ),
        };

        Ok(Self { date, time })
    }

    /// The instant a notification is due, if this slot has a time of day.
    pub fn fire_at(&self) -> Option<DateTime<Utc>> {
        let time = self.time?;
        Utc.from_local_datetime(&self.date.and_time(time)).single()
    }

    pub(crate) fn date_column(&self) -> String {
        self.date.format(DATE_FORMAT).to_string()
    }

    pub(crate) fn time_column(&self) -> Option<String> {
        self.time.map(|t| t.format(TIME_FORMAT).to_string())
    }

    pub(crate) fn from_columns(date: &str, time: Option<&str>) -> chrono::ParseResult<Self> {
        let date = NaiveDate::parse_from_str(date, DATE_FORMAT)?;
        let time = time
            .map(|t| NaiveTime::parse_from_str(t, TIME_FORMAT))
            .transpose()?;
        Ok(Self { date, time })
    }
}

/// Fields a caller supplies when creating or editing an event.
///
/// Edits replace every field, mirroring the edit form which always submits
/// the whole record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewEvent {
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub scheduled_at: Option<ScheduledAt>,
}

impl NewEvent {
    pub fn new(
        title: impl Into<String>,
        description: impl Into<String>,
        scheduled_at: Option<ScheduledAt>,
    ) -> Self {
        Self {
            title: title.into(),
            description: description.into(),
            scheduled_at,
        }
    }

    /// Reject submissions the store should never see.
    pub fn validate(&self) -> Result<()> {
        if self.title.trim().is_empty() {
            return Err(EventError::Invalid("title must not be empty".into()));
        }
        Ok(())
    }
}

/// A persisted calendar event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    pub id: EventId,
    pub owner_id: OwnerId,
    pub title: String,
    pub description: String,
    pub scheduled_at: Option<ScheduledAt>,
    /// RFC3339 creation timestamp.
    pub created_at: String,
    /// RFC3339 timestamp of the last edit.
    pub updated_at: String,
}

impl Event {
    /// When this event's notification is due, if it has one.
    pub fn fire_at(&self) -> Option<DateTime<Utc>> {
        self.scheduled_at.as_ref().and_then(ScheduledAt::fire_at)
    }

    /// The editable fields of this event, e.g. to restore them after a
    /// failed edit.
    pub fn to_new_event(&self) -> NewEvent {
        NewEvent {
            title: self.title.clone(),
            description: self.description.clone(),
            scheduled_at: self.scheduled_at,
        }
    }
}
