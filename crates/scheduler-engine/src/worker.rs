//! The work-submission interface the firing loop consumes.
//!
//! The core never runs job code itself — that is the "concrete worker
//! thread pool" the specification calls an external collaborator. This
//! module defines the seam: [`WorkSubmission`] is the trait a host
//! application implements to actually execute a [`scheduler_core::JobDetail`].

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use scheduler_core::{JobDetail, Trigger};
use uuid::Uuid;

/// Snapshot handed to a worker when a trigger fires: everything it needs
/// to run the job, plus the timing data used to detect misfires after the
/// fact.
#[derive(Debug, Clone)]
pub struct FiringContext {
    pub trigger: Trigger,
    pub job: JobDetail,
    pub scheduled_fire_time: DateTime<Utc>,
    pub actual_fire_time: DateTime<Utc>,
    pub fire_instance_id: Uuid,
}

/// Instruction a job result carries back to the registry, governing what
/// happens to the trigger that fired it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobResultInstruction {
    /// No special action.
    Noop,
    /// Re-execute the job immediately.
    ReExecuteJob,
    /// Remove the trigger that fired this execution.
    DeleteTrigger,
    /// Mark the trigger that fired this execution complete.
    SetTriggerComplete,
    /// Mark every trigger of this job complete.
    SetAllJobTriggersComplete,
}

/// Outcome of a job execution.
#[derive(Debug, Clone)]
pub struct JobResult {
    pub instruction: JobResultInstruction,
    /// Present if the job raised an error; does not by itself change
    /// `instruction` — callers can combine the two as needed.
    pub error: Option<String>,
}

impl JobResult {
    pub fn ok() -> Self {
        Self {
            instruction: JobResultInstruction::Noop,
            error: None,
        }
    }

    pub fn with_instruction(instruction: JobResultInstruction) -> Self {
        Self {
            instruction,
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            instruction: JobResultInstruction::Noop,
            error: Some(error.into()),
        }
    }
}

/// The external collaborator that actually runs a job. Implementations own
/// their own thread/task pool and backpressure signal; the firing loop
/// waits for availability (see `crate::firing_loop`) before acquiring more
/// triggers.
#[async_trait]
pub trait WorkSubmission: Send + Sync {
    /// Run the job described by `ctx` to completion and report its result.
    async fn submit(&self, ctx: FiringContext) -> JobResult;

    /// Whether the pool has capacity to accept another submission right
    /// now. The firing loop polls this before acquiring the next batch.
    async fn has_capacity(&self) -> bool {
        true
    }

    /// Request interruption of a currently-executing job, if the
    /// implementation supports it. Returns whether the request was
    /// honored.
    async fn interrupt(&self, _fire_instance_id: Uuid) -> bool {
        false
    }
}
