use std::collections::{BTreeSet, HashMap};
use std::sync::{Mutex, MutexGuard};

use agenda_core::{EventId, OwnerId};
use chrono::{DateTime, Utc};
use tokio::sync::futures::Notified;
use tokio::sync::Notify;
use tracing::debug;

use crate::error::JobTableError;
use crate::types::Job;

type Result<T> = std::result::Result<T, JobTableError>;

#[derive(Default)]
struct Inner {
    jobs: HashMap<EventId, Job>,
    /// Firing order. Always holds exactly one entry per job in `jobs`.
    by_fire_at: BTreeSet<(DateTime<Utc>, EventId)>,
}

impl Inner {
    fn insert(&mut self, job: Job) -> Option<Job> {
        let replaced = self.take(job.event_id);
        self.by_fire_at.insert((job.fire_at, job.event_id));
        self.jobs.insert(job.event_id, job);
        replaced
    }

    fn take(&mut self, event_id: EventId) -> Option<Job> {
        let job = self.jobs.remove(&event_id)?;
        self.by_fire_at.remove(&(job.fire_at, event_id));
        Some(job)
    }
}

/// Pending reminders keyed by event id, at most one per event.
///
/// Request handlers and the scheduler loop share one table. Every operation
/// takes the single lock once, so a `put` or `remove` that completes before a
/// `pop_due` starts is always seen by it.
#[derive(Default)]
pub struct JobTable {
    inner: Mutex<Inner>,
    changed: Notify,
}

impl JobTable {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, Inner>> {
        self.inner.lock().map_err(|_| JobTableError)
    }

    /// For operations that overwrite the whole state: whatever a panicking
    /// holder left behind is discarded, so the poison can be cleared.
    fn lock_for_reset(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|poisoned| {
            self.inner.clear_poison();
            poisoned.into_inner()
        })
    }

    /// Insert a job, replacing any job for the same event. Returns the
    /// replaced job.
    pub fn put(&self, job: Job) -> Result<Option<Job>> {
        let event_id = job.event_id;
        let fire_at = job.fire_at;
        let replaced = self.lock()?.insert(job);
        debug!(event_id = %event_id, %fire_at, replaced = replaced.is_some(), "job scheduled");
        self.wake();
        Ok(replaced)
    }

    /// Cancel the job for an event. `None` if there was none.
    pub fn remove(&self, event_id: EventId) -> Result<Option<Job>> {
        let removed = self.lock()?.take(event_id);
        if removed.is_some() {
            debug!(event_id = %event_id, "job cancelled");
            self.wake();
        }
        Ok(removed)
    }

    /// Remove and return every job due at `now`, earliest first, ties by
    /// event id.
    pub fn pop_due(&self, now: DateTime<Utc>) -> Result<Vec<Job>> {
        let mut inner = self.lock()?;
        let mut due = Vec::new();
        while let Some(&(fire_at, event_id)) = inner.by_fire_at.first() {
            if fire_at > now {
                break;
            }
            inner.by_fire_at.pop_first();
            if let Some(job) = inner.jobs.remove(&event_id) {
                due.push(job);
            }
        }
        Ok(due)
    }

    /// `(event_id, fire_at)` of every pending job, in firing order.
    pub fn peek_pending(&self) -> Result<Vec<(EventId, DateTime<Utc>)>> {
        let inner = self.lock()?;
        Ok(inner
            .by_fire_at
            .iter()
            .map(|&(fire_at, event_id)| (event_id, fire_at))
            .collect())
    }

    /// Like [`peek_pending`](Self::peek_pending), restricted to one owner.
    pub fn peek_pending_for(&self, owner_id: OwnerId) -> Result<Vec<(EventId, DateTime<Utc>)>> {
        let inner = self.lock()?;
        Ok(inner
            .by_fire_at
            .iter()
            .filter(|(_, event_id)| {
                inner
                    .jobs
                    .get(event_id)
                    .is_some_and(|job| job.owner_id == owner_id)
            })
            .map(|&(fire_at, event_id)| (event_id, fire_at))
            .collect())
    }

    pub fn get(&self, event_id: EventId) -> Result<Option<Job>> {
        Ok(self.lock()?.jobs.get(&event_id).cloned())
    }

    pub fn next_fire_at(&self) -> Result<Option<DateTime<Utc>>> {
        Ok(self.lock()?.by_fire_at.first().map(|&(fire_at, _)| fire_at))
    }

    pub fn len(&self) -> Result<usize> {
        Ok(self.lock()?.jobs.len())
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.lock()?.jobs.is_empty())
    }

    /// Swap the whole table for `jobs`. Later entries win on duplicate ids.
    /// Also recovers a poisoned table.
    pub fn replace_all(&self, jobs: impl IntoIterator<Item = Job>) -> Result<usize> {
        let mut fresh = Inner::default();
        for job in jobs {
            fresh.insert(job);
        }
        let count = fresh.jobs.len();
        *self.lock_for_reset() = fresh;
        self.wake();
        Ok(count)
    }

    /// Discard every pending job without firing it. Returns how many there were.
    pub fn clear(&self) -> Result<usize> {
        let mut inner = self.lock_for_reset();
        let count = inner.jobs.len();
        *inner = Inner::default();
        drop(inner);
        self.wake();
        Ok(count)
    }

    /// Interrupt the scheduler's idle wait.
    pub fn wake(&self) {
        // notify_one stores a permit, so a wake sent while the loop is busy
        // is seen by its next wait.
        self.changed.notify_one();
    }

    /// Resolves on the next [`wake`](Self::wake).
    pub fn notified(&self) -> Notified<'_> {
        self.changed.notified()
    }

    #[cfg(test)]
    fn poison(&self) {
        let _ = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _guard = self.inner.lock().unwrap();
            panic!("poison the job table");
        }));
    }
}
