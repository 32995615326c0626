use agenda_core::{EventId, Notification, OwnerId};
use agenda_events::Event;
use chrono::{DateTime, Utc};
use serde::Serialize;

/// A pending reminder for one event.
///
/// The payload is a snapshot taken when the job was scheduled. Edits to the
/// event replace the whole job instead of touching it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Job {
    pub event_id: EventId,
    pub owner_id: OwnerId,
    pub fire_at: DateTime<Utc>,
    pub payload: Notification,
}

impl Job {
    /// Build the job for `event`, or `None` when the event has no time of day.
    pub fn for_event(event: &Event, recipient: impl Into<String>) -> Option<Self> {
        let fire_at = event.fire_at()?;
        Some(Self {
            event_id: event.id,
            owner_id: event.owner_id,
            fire_at,
            payload: reminder(recipient.into(), &event.title, &event.description),
        })
    }
}

/// Subject and body of the reminder mail.
pub fn reminder(recipient: String, title: &str, description: &str) -> Notification {
    let mut body = format!("Your event '{title}' is happening now!");
    let description = description.trim();
    if !description.is_empty() {
        body.push_str("\n\n");
        body.push_str(description);
    }
    Notification {
        recipient,
        subject: format!("Reminder: {title}"),
        body,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use agenda_events::ScheduledAt;
    use chrono::TimeZone;

    fn event(time: Option<&str>, description: &str) -> Event {
        Event {
            id: EventId(1),
            owner_id: OwnerId(2),
            title: "Standup".into(),
            description: description.into(),
            scheduled_at: Some(ScheduledAt::parse("2026-10-19", time).unwrap()),
            created_at: String::new(),
            updated_at: String::new(),
        }
    }

    #[test]
    fn job_snapshots_event() {
        let job = Job::for_event(&event(Some("09:00"), ""), "a@example.com").unwrap();
        assert_eq!(job.event_id, EventId(1));
        assert_eq!(job.owner_id, OwnerId(2));
        assert_eq!(job.fire_at, Utc.with_ymd_and_hms(2026, 10, 19, 9, 0, 0).unwrap());
        assert_eq!(job.payload.recipient, "a@example.com");
        assert_eq!(job.payload.subject, "Reminder: Standup");
        assert_eq!(job.payload.body, "Your event 'Standup' is happening now!");
    }

    #[test]
    fn description_becomes_second_paragraph() {
        let job = Job::for_event(&event(Some("09:00"), "Room 4"), "a@example.com").unwrap();
        assert_eq!(
            job.payload.body,
            "Your event 'Standup' is happening now!\n\nRoom 4"
        );
    }

    #[test]
    fn no_time_of_day_means_no_job() {
        assert!(Job::for_event(&event(None, ""), "a@example.com").is_none());
    }
}
