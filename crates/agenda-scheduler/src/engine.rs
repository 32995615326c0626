use std::sync::Arc;
use std::time::Duration;

use agenda_core::config::SchedulerConfig;
use chrono::{DateTime, Utc};
use tokio::sync::{watch, Semaphore};
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use crate::clock::Clock;
use crate::error::Result;
use crate::job_table::JobTable;
use crate::sender::NotificationSender;
use crate::types::Job;

/// Fires due jobs from the job table.
///
/// One logical timer: the loop idles until the earliest pending job, the poll
/// interval, a job table change or shutdown, whichever comes first. Due jobs
/// are popped (removed) before delivery, so each one is attempted at most once.
pub struct Scheduler {
    jobs: Arc<JobTable>,
    sender: Arc<dyn NotificationSender>,
    clock: Arc<dyn Clock>,
    poll_interval: Duration,
    max_concurrent_deliveries: usize,
}

impl Scheduler {
    pub fn new(
        jobs: Arc<JobTable>,
        sender: Arc<dyn NotificationSender>,
        clock: Arc<dyn Clock>,
        config: &SchedulerConfig,
    ) -> Self {
        Self {
            jobs,
            sender,
            clock,
            poll_interval: Duration::from_secs(config.poll_interval_secs.max(1)),
            max_concurrent_deliveries: config.max_concurrent_deliveries.max(1),
        }
    }

    /// Main loop. Returns `Ok(())` once `shutdown` flips to `true` (or its
    /// sender is dropped) and every delivery already started has finished.
    /// A clock or job table failure ends the loop with an error.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) -> Result<()> {
        info!(
            poll_interval_secs = self.poll_interval.as_secs(),
            workers = self.max_concurrent_deliveries,
            "scheduler loop started"
        );
        let permits = Arc::new(Semaphore::new(self.max_concurrent_deliveries));
        let mut deliveries = JoinSet::new();

        let outcome = loop {
            if *shutdown.borrow() {
                break Ok(());
            }

            let now = match self.clock.now() {
                Ok(now) => now,
                Err(e) => break Err(e),
            };
            let due = match self.jobs.pop_due(now) {
                Ok(due) => due,
                Err(e) => break Err(e.into()),
            };

            for job in due {
                // Blocks the loop while every worker is busy.
                let Ok(permit) = permits.clone().acquire_owned().await else {
                    break;
                };
                let sender = self.sender.clone();
                deliveries.spawn(async move {
                    let _permit = permit;
                    deliver(sender.as_ref(), job).await;
                });
            }
            while let Some(finished) = deliveries.try_join_next() {
                log_join(finished);
            }

            let idle = match self.idle_for(now) {
                Ok(idle) => idle,
                Err(e) => break Err(e),
            };
            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break Ok(());
                    }
                }
                _ = self.jobs.notified() => {}
                _ = tokio::time::sleep(idle) => {}
            }
        };

        if !deliveries.is_empty() {
            info!(in_flight = deliveries.len(), "waiting for in-flight deliveries");
        }
        while let Some(finished) = deliveries.join_next().await {
            log_join(finished);
        }

        match &outcome {
            Ok(()) => info!("scheduler loop stopped"),
            Err(e) => error!(error = %e, "scheduler loop faulted"),
        }
        outcome
    }

    /// Discard every pending job without firing it. Returns the count.
    /// Nothing is lost for good: the next startup rebuilds from the store.
    pub fn drain(&self) -> Result<usize> {
        let discarded = self.jobs.clear()?;
        info!(discarded, "job table drained");
        Ok(discarded)
    }

    /// Time until the earliest pending job, capped at the poll interval.
    fn idle_for(&self, now: DateTime<Utc>) -> Result<Duration> {
        let idle = match self.jobs.next_fire_at()? {
            Some(next) => (next - now)
                .to_std()
                .unwrap_or(Duration::ZERO)
                .min(self.poll_interval),
            None => self.poll_interval,
        };
        Ok(idle)
    }
}

async fn deliver(sender: &dyn NotificationSender, job: Job) {
    let Job {
        event_id,
        fire_at,
        payload,
        ..
    } = job;
    debug!(event_id = %event_id, %fire_at, "firing reminder");
    match sender
        .send(&payload.recipient, &payload.subject, &payload.body)
        .await
    {
        Ok(()) => info!(event_id = %event_id, recipient = %payload.recipient, "reminder delivered"),
        Err(e) => warn!(event_id = %event_id, error = %e, "reminder delivery failed; not retried"),
    }
}

fn log_join(finished: std::result::Result<(), tokio::task::JoinError>) {
    if let Err(e) = finished {
        error!(error = %e, "delivery task panicked");
    }
}
