use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};

use chrono::{DateTime, Duration, Utc};

use crate::error::{Result, SchedulerError};

/// Source of "now" for scheduling decisions.
///
/// Fallible so that a broken time source ends the scheduler loop with a
/// `TimerFault` instead of firing reminders at the wrong moment.
pub trait Clock: Send + Sync {
    fn now(&self) -> Result<DateTime<Utc>>;
}

/// Wall clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Result<DateTime<Utc>> {
        let since_epoch = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_err(|e| SchedulerError::TimerFault(format!("system clock before epoch: {e}")))?;
        let secs = i64::try_from(since_epoch.as_secs())
            .map_err(|e| SchedulerError::TimerFault(e.to_string()))?;
        DateTime::from_timestamp(secs, since_epoch.subsec_nanos())
            .ok_or_else(|| SchedulerError::TimerFault("system clock out of range".into()))
    }
}

/// Clock that only moves when told to. Can also be told to fail once.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
    fail_next: AtomicBool,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(start),
            fail_next: AtomicBool::new(false),
        }
    }

    pub fn set(&self, to: DateTime<Utc>) {
        *self.now.lock().unwrap() = to;
    }

    pub fn advance(&self, by: Duration) {
        *self.now.lock().unwrap() += by;
    }

    /// Make the next `now()` call return a `TimerFault`.
    pub fn fail_next(&self) {
        self.fail_next.store(true, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Result<DateTime<Utc>> {
        if self.fail_next.swap(false, Ordering::SeqCst) {
            return Err(SchedulerError::TimerFault("injected clock failure".into()));
        }
        Ok(*self.now.lock().unwrap())
    }
}
