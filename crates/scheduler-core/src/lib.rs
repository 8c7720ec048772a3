//! Data model, cron recurrence calculator, and trigger state machine for
//! the scheduling engine core.
//!
//! This crate has no runtime loop of its own — it is the pure, synchronous
//! half of the scheduler: parsing cron expressions, computing fire times,
//! and advancing trigger state. The firing loop, registry, and listener
//! dispatch that drive these types at runtime live in `scheduler-engine`.
//!
//! # Main types
//!
//! - [`error::SchedulerError`] — Unified error enum for the scheduling engine.
//! - [`key::Key`] — `(name, group)` identity shared by jobs and triggers.
//! - [`job::JobDetail`] — The work a trigger fires.
//! - [`cron::CronExpression`] — A parsed seven-field cron expression.
//! - [`trigger::Trigger`] — A trigger and its recurrence state.
//! - [`calendar::Calendar`] — An inclusion predicate chained onto a trigger.
//! - [`misfire::MisfireInstruction`] — How a missed fire time is handled.

pub mod calendar;
pub mod cron;
pub mod error;
pub mod job;
pub mod key;
pub mod misfire;
pub mod trigger;

pub use calendar::Calendar;
pub use error::{SchedulerError, SchedulerResult};
pub use job::JobDetail;
pub use key::{JobKey, Key, TriggerKey};
pub use misfire::MisfireInstruction;
pub use trigger::{Trigger, TriggerHeader, TriggerKind, TriggerState};
