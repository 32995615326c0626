use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard};

use agenda_core::{EventId, RecipientResolver};
use agenda_events::{Event, EventStore};
use chrono::{DateTime, Utc};
use tracing::{debug, info, instrument, warn};

use crate::clock::Clock;
use crate::error::{ReconcileError, Result as SchedulerResult};
use crate::job_table::JobTable;
use crate::types::Job;

type Result<T> = std::result::Result<T, ReconcileError>;

/// Keeps the job table consistent with event mutations.
///
/// Invariant after every call returns: an event whose time of day lies at or
/// after "now" has exactly one job, every other event has none.
pub struct Reconciler {
    jobs: Arc<JobTable>,
    recipients: Arc<dyn RecipientResolver>,
    clock: Arc<dyn Clock>,
    /// Mutations hold the read side; a rebuild holds the write side while it
    /// lists the store and swaps the table.
    rebuild_gate: RwLock<()>,
}

impl Reconciler {
    pub fn new(
        jobs: Arc<JobTable>,
        recipients: Arc<dyn RecipientResolver>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            jobs,
            recipients,
            clock,
            rebuild_gate: RwLock::new(()),
        }
    }

    pub fn jobs(&self) -> &Arc<JobTable> {
        &self.jobs
    }

    /// Block rebuilds for as long as the guard lives.
    pub(crate) fn mutation_guard(&self) -> RwLockReadGuard<'_, ()> {
        // The gate protects no data, so a poisoned lock is still usable.
        self.rebuild_gate
            .read()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn now(&self) -> Result<DateTime<Utc>> {
        self.clock
            .now()
            .map_err(|e| ReconcileError::Clock(e.to_string()))
    }

    /// Create rule without side effects: the job `event` should have, if any.
    pub(crate) fn plan(&self, event: &Event) -> Result<Option<Job>> {
        let Some(fire_at) = event.fire_at() else {
            debug!("no time of day; nothing to schedule");
            return Ok(None);
        };
        if fire_at < self.now()? {
            debug!(%fire_at, "time already passed; nothing to schedule");
            return Ok(None);
        }

        let recipient = self.recipients.recipient_for(event.owner_id)?;
        Ok(Job::for_event(event, recipient))
    }

    /// Create rule: schedule a job if the event's time is now or later.
    /// Returns the job that was put, if any.
    #[instrument(skip(self, event), fields(event_id = %event.id))]
    pub fn on_create(&self, event: &Event) -> Result<Option<Job>> {
        let job = self.plan(event)?;
        if let Some(job) = &job {
            self.jobs.put(job.clone())?;
        }
        Ok(job)
    }

    /// Update rule: cancel whatever is pending, then re-run the create rule.
    pub fn on_update(&self, event: &Event) -> Result<Option<Job>> {
        self.jobs.remove(event.id)?;
        self.on_create(event)
    }

    /// Delete rule. A missing job is not an error.
    pub fn on_delete(&self, event_id: EventId) -> Result<()> {
        self.jobs.remove(event_id)?;
        Ok(())
    }

    /// Remove and return the pending job so it can be restored later.
    pub(crate) fn cancel(&self, event_id: EventId) -> Result<Option<Job>> {
        Ok(self.jobs.remove(event_id)?)
    }

    /// Put back a job taken by [`cancel`](Self::cancel).
    pub(crate) fn restore(&self, job: Option<Job>) {
        let Some(job) = job else { return };
        let event_id = job.event_id;
        if let Err(e) = self.jobs.put(job) {
            warn!(event_id = %event_id, error = %e, "could not restore cancelled job");
        }
    }

    /// Swap whatever is pending for `event_id` for a job from [`plan`](Self::plan).
    pub(crate) fn apply(&self, event_id: EventId, job: Option<Job>) -> Result<()> {
        self.jobs.remove(event_id)?;
        if let Some(job) = job {
            self.jobs.put(job)?;
        }
        Ok(())
    }

    /// Replace the whole table with jobs for every future event in `events`.
    ///
    /// Only times strictly after now count here: a job due exactly now may
    /// already have been popped by the run that failed. Events whose owner has
    /// no reachable recipient are skipped with a warning. Returns the number
    /// of jobs scheduled.
    pub fn rebuild_from_store(&self, events: &[Event]) -> Result<usize> {
        let now = self.now()?;
        let mut jobs = Vec::new();
        for event in events {
            let Some(fire_at) = event.fire_at() else {
                continue;
            };
            if fire_at <= now {
                continue;
            }
            match self.recipients.recipient_for(event.owner_id) {
                Ok(recipient) => jobs.extend(Job::for_event(event, recipient)),
                Err(e) => {
                    warn!(event_id = %event.id, owner_id = %event.owner_id, error = %e, "skipping reminder");
                }
            }
        }
        Ok(self.jobs.replace_all(jobs)?)
    }

    /// List the store and rebuild, excluding concurrent mutations.
    pub fn rebuild(&self, store: &dyn EventStore) -> SchedulerResult<usize> {
        let _gate = self
            .rebuild_gate
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        let events = store.list_all()?;
        let scheduled = self.rebuild_from_store(&events)?;
        info!(events = events.len(), scheduled, "job table rebuilt from store");
        Ok(scheduled)
    }
}
