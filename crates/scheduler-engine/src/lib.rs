//! Registry, firing loop, and public scheduler API built on top of
//! `scheduler-core`.
//!
//! This crate is the runtime half of the scheduling engine: the
//! synchronous data model and cron math live in `scheduler-core`, while
//! this crate owns the shared mutable state (the [`registry::JobStore`]),
//! the background tasks that drive it ([`firing_loop`],
//! [`misfire_handler`]), ordered listener dispatch ([`listener`]), and the
//! client-facing facade ([`scheduler::Scheduler`]).
//!
//! # Main types
//!
//! - [`Scheduler`] — The public scheduling engine: lifecycle, registration,
//!   pause/resume, introspection, calendars, listeners, interruption.
//! - [`JobStore`] — The in-memory registry backing a scheduler.
//! - [`WorkSubmission`] — The seam a host application implements to
//!   actually execute jobs.
//! - [`TriggerListener`], [`JobListener`], [`SchedulerListener`] —
//!   Lifecycle observation hooks.

/// The dedicated scheduling task.
pub mod firing_loop;
/// Ordered listener dispatch.
pub mod listener;
/// The misfire-scanning task.
pub mod misfire_handler;
/// The shared in-memory registry.
pub mod registry;
/// The public scheduler facade.
pub mod scheduler;
/// The work-submission interface the firing loop consumes.
pub mod worker;

pub use listener::{FireDecision, JobListener, ListenerRegistry, SchedulerListener, TriggerListener};
pub use registry::{FiredRecord, JobStore};
pub use scheduler::{Scheduler, SchedulerConfig, SchedulerMetadata};
pub use worker::{FiringContext, JobResult, JobResultInstruction, WorkSubmission};
