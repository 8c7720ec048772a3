use crate::key::JobKey;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A unit of work the scheduler dispatches when one of its triggers fires.
///
/// `JobDetail` itself carries no executable code — `job_class` is an
/// opaque identifier a `JobFactory` (an external collaborator) resolves
/// into a runnable instance. The scheduler core only needs the identity
/// and the flags that govern its lifecycle and concurrency.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobDetail {
    key: JobKey,
    /// Opaque identifier resolved by a `JobFactory`.
    pub job_class: String,
    /// If false, the job is deleted once no trigger references it.
    pub durable: bool,
    /// If true, concurrent executions of this job's key are forbidden;
    /// a trigger whose job is already executing moves to `BLOCKED`.
    pub stateful: bool,
    /// Excluded from persistence backends. The core treats volatile and
    /// non-volatile jobs identically; persistence is an external concern.
    pub volatile: bool,
    /// Whether a running instance of this job can honor an `interrupt`
    /// request. A non-interruptible job rejects `interrupt` with
    /// `UnableToInterruptJob`.
    pub interruptible: bool,
    /// Arbitrary job data, analogous to Quartz's `JobDataMap`.
    #[serde(default)]
    pub data: HashMap<String, serde_json::Value>,
}

impl JobDetail {
    /// Create a new, non-durable, non-stateful, non-volatile job.
    pub fn new(key: JobKey, job_class: impl Into<String>) -> Self {
        Self {
            key,
            job_class: job_class.into(),
            durable: false,
            stateful: false,
            volatile: false,
            interruptible: false,
            data: HashMap::new(),
        }
    }

    /// This job's key.
    pub fn key(&self) -> &JobKey {
        &self.key
    }

    /// Builder: mark durable.
    pub fn durable(mut self, durable: bool) -> Self {
        self.durable = durable;
        self
    }

    /// Builder: mark stateful.
    pub fn stateful(mut self, stateful: bool) -> Self {
        self.stateful = stateful;
        self
    }

    /// Builder: mark volatile.
    pub fn volatile(mut self, volatile: bool) -> Self {
        self.volatile = volatile;
        self
    }

    /// Builder: mark interruptible.
    pub fn interruptible(mut self, interruptible: bool) -> Self {
        self.interruptible = interruptible;
        self
    }

    /// Builder: attach a data entry.
    pub fn with_data(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.data.insert(key.into(), value.into());
        self
    }

    /// Read a string value from the data map.
    pub fn get_string(&self, key: &str) -> Option<&str> {
        self.data.get(key).and_then(|v| v.as_str())
    }

    /// Read an integer value from the data map.
    pub fn get_i64(&self, key: &str) -> Option<i64> {
        self.data.get(key).and_then(|v| v.as_i64())
    }

    /// Read a boolean value from the data map.
    pub fn get_bool(&self, key: &str) -> Option<bool> {
        self.data.get(key).and_then(|v| v.as_bool())
    }
}
