use std::sync::Arc;
use std::time::Duration;

use agenda_core::config::SchedulerConfig;
use agenda_events::EventStore;
use tokio::sync::watch;
use tracing::{error, info};

use crate::engine::Scheduler;
use crate::reconciler::Reconciler;

/// Owns the scheduler loop: rebuild, run, and on failure back off and start
/// over from a fresh rebuild.
pub struct Supervisor {
    store: Arc<dyn EventStore>,
    reconciler: Arc<Reconciler>,
    scheduler: Arc<Scheduler>,
    restart_backoff: Duration,
}

impl Supervisor {
    pub fn new(
        store: Arc<dyn EventStore>,
        reconciler: Arc<Reconciler>,
        scheduler: Arc<Scheduler>,
        config: &SchedulerConfig,
    ) -> Self {
        Self {
            store,
            reconciler,
            scheduler,
            restart_backoff: Duration::from_millis(config.restart_backoff_ms),
        }
    }

    /// Run until `shutdown` flips to `true`.
    pub async fn supervise(&self, mut shutdown: watch::Receiver<bool>) {
        let mut restarts: u64 = 0;
        loop {
            if *shutdown.borrow() {
                break;
            }

            let outcome = match self.reconciler.rebuild(self.store.as_ref()) {
                Ok(_) => self.scheduler.run(shutdown.clone()).await,
                Err(e) => Err(e),
            };

            match outcome {
                Ok(()) => break,
                Err(e) => {
                    restarts += 1;
                    error!(
                        error = %e,
                        restarts,
                        backoff_ms = self.restart_backoff.as_millis() as u64,
                        "scheduler failed; restarting after backoff"
                    );
                    tokio::select! {
                        changed = shutdown.changed() => {
                            if changed.is_err() {
                                break;
                            }
                        }
                        _ = tokio::time::sleep(self.restart_backoff) => {}
                    }
                }
            }
        }
        info!(restarts, "scheduler supervisor stopped");
    }
}
