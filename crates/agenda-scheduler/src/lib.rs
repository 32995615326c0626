//! `agenda-scheduler`: turns calendar events into reminder notifications.
//!
//! # Overview
//!
//! Pending reminders live in an in-memory [`job_table::JobTable`], one job per
//! event with a future time of day. Every event mutation goes through the
//! [`service::EventService`], which writes the store and then asks the
//! [`reconciler::Reconciler`] to bring the table back in line before the call
//! returns. The [`engine::Scheduler`] loop pops due jobs and hands each one to
//! a [`sender::NotificationSender`] exactly once.
//!
//! The table is not persisted. The [`supervisor::Supervisor`] rebuilds it from
//! the event store at startup and after every loop fault.
//!
//! | Event change                    | Job table effect              |
//! |---------------------------------|-------------------------------|
//! | created with a future time      | one job added                 |
//! | edited                          | old job removed, rule re-run  |
//! | time moved to the past / cleared| job removed, nothing added    |
//! | deleted                         | job removed                   |

pub mod clock;
pub mod engine;
pub mod error;
pub mod job_table;
pub mod reconciler;
pub mod sender;
pub mod service;
pub mod supervisor;
pub mod types;

pub use clock::{Clock, ManualClock, SystemClock};
pub use engine::Scheduler;
pub use error::{DeliveryError, JobTableError, ReconcileError, Result, SchedulerError, ServiceError};
pub use job_table::JobTable;
pub use reconciler::Reconciler;
pub use sender::{LogSender, NotificationSender, SmtpSender};
pub use service::EventService;
pub use supervisor::Supervisor;
pub use types::Job;
