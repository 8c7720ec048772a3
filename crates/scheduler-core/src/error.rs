use thiserror::Error;

/// A convenience `Result` alias using [`SchedulerError`].
pub type SchedulerResult<T> = Result<T, SchedulerError>;

/// Top-level error taxonomy surfaced to clients of the scheduling engine.
///
/// Each variant corresponds to one of the error kinds named in the core's
/// error handling design: keyed insertion conflicts, missing references,
/// validation failures, and state errors. A misfire is never represented
/// here — it is a scheduled event, not an error.
#[derive(Error, Debug)]
pub enum SchedulerError {
    /// A keyed insertion (`store_job`, `store_trigger`) was attempted
    /// without `replace` and the key already exists.
    #[error("object already exists: {0}")]
    ObjectAlreadyExists(String),

    /// The in-memory or persistent store failed to read or write.
    #[error("job persistence error: {0}")]
    JobPersistenceError(String),

    /// A referenced key (job, trigger, or calendar) was not found.
    #[error("object not found: {0}")]
    ObjectNotFound(String),

    /// A trigger's recurrence yields no future fire time at validation time.
    #[error("trigger does not fire: {0}")]
    TriggerDoesNotFire(String),

    /// A trigger field or cron expression failed validation.
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// An interrupt was requested for a job that is not interruptible, or
    /// the interrupt itself failed.
    #[error("unable to interrupt job: {0}")]
    UnableToInterruptJob(String),

    /// The operation requires the scheduler to be in a different lifecycle
    /// state (running, standby, or shut down) than it currently is.
    #[error("scheduler state error: {0}")]
    SchedulerStateError(String),
}

impl From<crate::cron::CronParseError> for SchedulerError {
    fn from(e: crate::cron::CronParseError) -> Self {
        SchedulerError::InvalidConfiguration(e.to_string())
    }
}
