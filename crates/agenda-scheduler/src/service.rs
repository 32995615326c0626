use std::sync::{Arc, Mutex, PoisonError};

use agenda_core::{EventId, OwnerId};
use agenda_events::{Event, EventStore, NewEvent};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use tracing::{error, info, instrument, warn};

use crate::error::{ReconcileError, ServiceError};
use crate::reconciler::Reconciler;

type Result<T> = std::result::Result<T, ServiceError>;

/// Entry point for every event mutation.
///
/// Each mutation writes the store and reconciles the job table before it
/// returns. Mutations for one owner are serialised; a failed reconciliation
/// is undone in the store so the two never disagree.
pub struct EventService {
    store: Arc<dyn EventStore>,
    reconciler: Arc<Reconciler>,
    owner_locks: DashMap<OwnerId, Arc<Mutex<()>>>,
}

impl EventService {
    pub fn new(store: Arc<dyn EventStore>, reconciler: Arc<Reconciler>) -> Self {
        Self {
            store,
            reconciler,
            owner_locks: DashMap::new(),
        }
    }

    pub fn store(&self) -> &Arc<dyn EventStore> {
        &self.store
    }

    pub fn reconciler(&self) -> &Arc<Reconciler> {
        &self.reconciler
    }

    fn owner_lock(&self, owner_id: OwnerId) -> Arc<Mutex<()>> {
        self.owner_locks.entry(owner_id).or_default().clone()
    }

    #[instrument(skip(self, event), fields(owner_id = %owner_id))]
    pub fn create(&self, owner_id: OwnerId, event: NewEvent) -> Result<Event> {
        event.validate()?;
        let _gate = self.reconciler.mutation_guard();
        let lock = self.owner_lock(owner_id);
        let _owner = lock.lock().unwrap_or_else(PoisonError::into_inner);

        let created = self.store.create(owner_id, &event)?;
        if let Err(e) = self.reconciler.on_create(&created) {
            warn!(event_id = %created.id, error = %e, "reminder not scheduled; undoing create");
            if let Err(undo) = self.store.delete(created.id, owner_id) {
                error!(event_id = %created.id, error = %undo, "could not undo create");
            }
            return Err(e.into());
        }

        info!(event_id = %created.id, "event created");
        Ok(created)
    }

    #[instrument(skip(self, event), fields(event_id = %id, owner_id = %owner_id))]
    pub fn update(&self, id: EventId, owner_id: OwnerId, event: NewEvent) -> Result<Event> {
        event.validate()?;
        let _gate = self.reconciler.mutation_guard();
        let lock = self.owner_lock(owner_id);
        let _owner = lock.lock().unwrap_or_else(PoisonError::into_inner);

        // Ownership check first: another owner's event must stay untouched.
        let previous = self.store.get(id, owner_id)?;
        // Cancel before committing so the old payload can never fire after
        // the new data is stored.
        let old_job = self.reconciler.cancel(id)?;

        let updated = match self.store.update(id, owner_id, &event) {
            Ok(updated) => updated,
            Err(e) => {
                self.reconciler.restore(old_job);
                return Err(e.into());
            }
        };

        if let Err(e) = self.reconciler.on_create(&updated) {
            warn!(error = %e, "reminder not rescheduled; restoring previous event");
            if let Err(undo) = self.store.update(id, owner_id, &previous.to_new_event()) {
                error!(error = %undo, "could not restore previous event");
            }
            self.reconciler.restore(old_job);
            return Err(e.into());
        }

        info!("event updated");
        Ok(updated)
    }

    #[instrument(skip(self), fields(event_id = %id, owner_id = %owner_id))]
    pub fn delete(&self, id: EventId, owner_id: OwnerId) -> Result<Event> {
        let _gate = self.reconciler.mutation_guard();
        let lock = self.owner_lock(owner_id);
        let _owner = lock.lock().unwrap_or_else(PoisonError::into_inner);

        self.store.get(id, owner_id)?;
        let old_job = self.reconciler.cancel(id)?;
        match self.store.delete(id, owner_id) {
            Ok(deleted) => {
                info!("event deleted");
                Ok(deleted)
            }
            Err(e) => {
                self.reconciler.restore(old_job);
                Err(e.into())
            }
        }
    }

    pub fn get(&self, id: EventId, owner_id: OwnerId) -> Result<Event> {
        Ok(self.store.get(id, owner_id)?)
    }

    pub fn list(&self, owner_id: OwnerId) -> Result<Vec<Event>> {
        Ok(self.store.list(owner_id)?)
    }

    /// Re-run the update rule for every event of `owner_id`, e.g. after their
    /// contact address changed. Returns how many jobs are now pending for them.
    ///
    /// All jobs are planned before any is swapped in, so a failure leaves the
    /// owner's pending jobs as they were.
    #[instrument(skip(self), fields(owner_id = %owner_id))]
    pub fn refresh_owner(&self, owner_id: OwnerId) -> Result<usize> {
        let _gate = self.reconciler.mutation_guard();
        let lock = self.owner_lock(owner_id);
        let _owner = lock.lock().unwrap_or_else(PoisonError::into_inner);

        let planned = self
            .store
            .list(owner_id)?
            .iter()
            .map(|event| Ok((event.id, self.reconciler.plan(event)?)))
            .collect::<std::result::Result<Vec<_>, ReconcileError>>()?;

        let mut scheduled = 0;
        for (event_id, job) in planned {
            scheduled += usize::from(job.is_some());
            self.reconciler.apply(event_id, job)?;
        }
        info!(scheduled, "pending reminders refreshed");
        Ok(scheduled)
    }

    /// Pending `(event_id, fire_at)` pairs for one owner, in firing order.
    pub fn pending_for(&self, owner_id: OwnerId) -> Result<Vec<(EventId, DateTime<Utc>)>> {
        Ok(self
            .reconciler
            .jobs()
            .peek_pending_for(owner_id)
            .map_err(ReconcileError::from)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::job_table::JobTable;
    use agenda_core::{RecipientError, RecipientResolver};
    use agenda_events::{EventError, ScheduledAt, SqliteEventStore};
    use chrono::{Duration, TimeZone};
    use rusqlite::Connection;
    use std::collections::HashMap;

    /// Owners 1 and 2 have addresses; everyone else has none.
    struct Directory(Mutex<HashMap<OwnerId, String>>);

    impl RecipientResolver for Directory {
        fn recipient_for(&self, owner_id: OwnerId) -> std::result::Result<String, RecipientError> {
            self.0
                .lock()
                .unwrap()
                .get(&owner_id)
                .cloned()
                .ok_or(RecipientError::Missing(owner_id))
        }
    }

    struct Fixture {
        service: EventService,
        jobs: Arc<JobTable>,
        directory: Arc<Directory>,
        clock: Arc<ManualClock>,
    }

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, 18, 12, 0, 0).unwrap()
    }

    fn fixture() -> Fixture {
        let store = Arc::new(SqliteEventStore::new(Connection::open_in_memory().unwrap()).unwrap());
        let jobs = Arc::new(JobTable::new());
        let directory = Arc::new(Directory(Mutex::new(HashMap::from([
            (OwnerId(1), "one@example.com".to_string()),
            (OwnerId(2), "two@example.com".to_string()),
        ]))));
        let clock = Arc::new(ManualClock::new(t0()));
        let reconciler = Arc::new(Reconciler::new(jobs.clone(), directory.clone(), clock.clone()));
        Fixture {
            service: EventService::new(store, reconciler),
            jobs,
            directory,
            clock,
        }
    }

    fn at(offset: Duration) -> Option<ScheduledAt> {
        Some(ScheduledAt::at(t0() + offset))
    }

    #[test]
    fn create_schedules_future_event() {
        let f = fixture();
        let event = f
            .service
            .create(OwnerId(1), NewEvent::new("Standup", "", at(Duration::minutes(30))))
            .unwrap();
        assert_eq!(
            f.service.pending_for(OwnerId(1)).unwrap(),
            vec![(event.id, t0() + Duration::minutes(30))]
        );
    }

    #[test]
    fn create_in_past_or_without_time_schedules_nothing() {
        let f = fixture();
        f.service
            .create(OwnerId(1), NewEvent::new("Yesterday", "", at(Duration::days(-1))))
            .unwrap();
        f.service
            .create(OwnerId(1), NewEvent::new("Someday", "", None))
            .unwrap();
        assert!(f.jobs.is_empty().unwrap());
        assert_eq!(f.service.list(OwnerId(1)).unwrap().len(), 2);
    }

    #[test]
    fn update_replaces_job_and_payload() {
        let f = fixture();
        let event = f
            .service
            .create(OwnerId(1), NewEvent::new("Lunch", "", at(Duration::hours(1))))
            .unwrap();
        f.service
            .update(
                event.id,
                OwnerId(1),
                NewEvent::new("Late lunch", "", at(Duration::hours(2))),
            )
            .unwrap();

        let job = f.jobs.get(event.id).unwrap().unwrap();
        assert_eq!(job.fire_at, t0() + Duration::hours(2));
        assert_eq!(job.payload.subject, "Reminder: Late lunch");
        assert_eq!(f.jobs.len().unwrap(), 1);
    }

    #[test]
    fn update_into_past_cancels() {
        let f = fixture();
        let event = f
            .service
            .create(OwnerId(1), NewEvent::new("Lunch", "", at(Duration::hours(1))))
            .unwrap();
        f.service
            .update(event.id, OwnerId(1), NewEvent::new("Lunch", "", at(Duration::hours(-1))))
            .unwrap();
        assert!(f.jobs.is_empty().unwrap());
    }

    #[test]
    fn delete_cancels_job() {
        let f = fixture();
        let event = f
            .service
            .create(OwnerId(1), NewEvent::new("Gym", "", at(Duration::hours(1))))
            .unwrap();
        f.service.delete(event.id, OwnerId(1)).unwrap();
        assert!(f.jobs.is_empty().unwrap());
        assert!(matches!(
            f.service.get(event.id, OwnerId(1)),
            Err(ServiceError::Event(EventError::NotFound { .. }))
        ));
    }

    #[test]
    fn other_owner_cannot_touch_job() {
        let f = fixture();
        let event = f
            .service
            .create(OwnerId(1), NewEvent::new("Private", "", at(Duration::hours(1))))
            .unwrap();

        assert!(matches!(
            f.service.delete(event.id, OwnerId(2)),
            Err(ServiceError::Event(EventError::NotFound { .. }))
        ));
        assert!(matches!(
            f.service.update(event.id, OwnerId(2), NewEvent::new("Mine now", "", None)),
            Err(ServiceError::Event(EventError::NotFound { .. }))
        ));
        assert!(f.jobs.get(event.id).unwrap().is_some());
        assert!(f.service.pending_for(OwnerId(2)).unwrap().is_empty());
    }

    #[test]
    fn failed_reconcile_undoes_create() {
        let f = fixture();
        let err = f
            .service
            .create(OwnerId(3), NewEvent::new("Orphan", "", at(Duration::hours(1))))
            .unwrap_err();
        assert!(matches!(err, ServiceError::Reconcile(ReconcileError::NoRecipient(_))));
        assert!(f.service.list(OwnerId(3)).unwrap().is_empty());
        assert!(f.jobs.is_empty().unwrap());
    }

    #[test]
    fn failed_reconcile_restores_previous_update() {
        let f = fixture();
        let event = f
            .service
            .create(OwnerId(1), NewEvent::new("Review", "v1", at(Duration::hours(1))))
            .unwrap();

        // Owner loses their address between the create and the edit.
        f.directory.0.lock().unwrap().remove(&OwnerId(1));
        let err = f
            .service
            .update(event.id, OwnerId(1), NewEvent::new("Review", "v2", at(Duration::hours(3))))
            .unwrap_err();
        assert!(matches!(err, ServiceError::Reconcile(ReconcileError::NoRecipient(_))));

        let stored = f.service.get(event.id, OwnerId(1)).unwrap();
        assert_eq!(stored.description, "v1");
        assert_eq!(stored.scheduled_at, event.scheduled_at);
        let job = f.jobs.get(event.id).unwrap().unwrap();
        assert_eq!(job.fire_at, t0() + Duration::hours(1));
    }

    #[test]
    fn duplicate_create_keeps_single_job() {
        let f = fixture();
        let draft = NewEvent::new("Dentist", "", at(Duration::hours(4)));
        f.service.create(OwnerId(1), draft.clone()).unwrap();
        assert!(matches!(
            f.service.create(OwnerId(1), draft),
            Err(ServiceError::Event(EventError::Duplicate { .. }))
        ));
        assert_eq!(f.jobs.len().unwrap(), 1);
    }

    #[test]
    fn refresh_owner_picks_up_new_address() {
        let f = fixture();
        let event = f
            .service
            .create(OwnerId(1), NewEvent::new("Standup", "", at(Duration::hours(1))))
            .unwrap();
        f.directory
            .0
            .lock()
            .unwrap()
            .insert(OwnerId(1), "new@example.com".to_string());

        assert_eq!(f.service.refresh_owner(OwnerId(1)).unwrap(), 1);
        let job = f.jobs.get(event.id).unwrap().unwrap();
        assert_eq!(job.payload.recipient, "new@example.com");
    }

    #[test]
    fn invalid_event_never_reaches_store() {
        let f = fixture();
        assert!(matches!(
            f.service.create(OwnerId(1), NewEvent::new("  ", "", None)),
            Err(ServiceError::Event(EventError::Invalid(_)))
        ));
        assert!(f.service.list(OwnerId(1)).unwrap().is_empty());
    }

    #[test]
    fn refresh_owner_clock_fault_keeps_pending_jobs() {
        let f = fixture();
        let first = f
            .service
            .create(OwnerId(1), NewEvent::new("Standup", "", at(Duration::hours(1))))
            .unwrap();
        let second = f
            .service
            .create(OwnerId(1), NewEvent::new("Retro", "", at(Duration::hours(2))))
            .unwrap();
        f.directory
            .0
            .lock()
            .unwrap()
            .insert(OwnerId(1), "new@example.com".to_string());

        f.clock.fail_next();
        let err = f.service.refresh_owner(OwnerId(1)).unwrap_err();
        assert!(matches!(err, ServiceError::Reconcile(ReconcileError::Clock(_))));

        for event in [&first, &second] {
            let job = f.jobs.get(event.id).unwrap().expect("future event keeps its job");
            assert_eq!(job.payload.recipient, "one@example.com");
        }
    }

    #[test]
    fn refresh_owner_without_address_keeps_pending_jobs() {
        let f = fixture();
        let event = f
            .service
            .create(OwnerId(1), NewEvent::new("Standup", "", at(Duration::hours(1))))
            .unwrap();
        f.directory.0.lock().unwrap().remove(&OwnerId(1));

        assert!(matches!(
            f.service.refresh_owner(OwnerId(1)),
            Err(ServiceError::Reconcile(ReconcileError::NoRecipient(_)))
        ));
        assert_eq!(
            f.service.pending_for(OwnerId(1)).unwrap(),
            vec![(event.id, t0() + Duration::hours(1))]
        );
    }
}
