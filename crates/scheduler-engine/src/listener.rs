//! Ordered listener dispatch for job, trigger, and scheduler lifecycle
//! events.
//!
//! Each listener kind is modeled as a tagged registration scope rather
//! than an inheritance hierarchy: a listener is either global (applies to
//! every job/trigger) or named (applies only to the specific key it was
//! registered against). Dispatch always runs globals before named
//! listeners, synchronously on the firing loop, so callers can rely on
//! ordering.

use crate::worker::{FiringContext, JobResult};
use async_trait::async_trait;
use scheduler_core::{JobKey, Trigger, TriggerKey};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::warn;

/// Whether trigger listeners allow a fire to proceed to job execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FireDecision {
    Proceed,
    Veto,
}

#[async_trait]
pub trait TriggerListener: Send + Sync {
    fn name(&self) -> &str;
    async fn trigger_fired(&self, _trigger: &Trigger) {}
    async fn trigger_misfired(&self, _trigger: &Trigger) {}
    async fn trigger_complete(&self, _trigger: &Trigger, _result: &JobResult) {}
    /// Return `true` to veto execution of the job this trigger fired.
    async fn vetoes_execution(&self, _trigger: &Trigger) -> bool {
        false
    }
}

#[async_trait]
pub trait JobListener: Send + Sync {
    fn name(&self) -> &str;
    async fn job_to_be_executed(&self, _ctx: &FiringContext) {}
    async fn job_execution_vetoed(&self, _ctx: &FiringContext) {}
    async fn job_was_executed(&self, _ctx: &FiringContext, _result: &JobResult) {}
}

#[async_trait]
pub trait SchedulerListener: Send + Sync {
    fn name(&self) -> &str;
    async fn scheduler_started(&self) {}
    async fn scheduler_in_standby(&self) {}
    async fn scheduler_shutdown(&self) {}
    async fn scheduler_error(&self, _message: &str) {}
}

/// The global-list-plus-named-map registry for all three listener kinds.
pub struct ListenerRegistry {
    global_triggers: RwLock<Vec<Arc<dyn TriggerListener>>>,
    named_triggers: RwLock<HashMap<TriggerKey, Vec<Arc<dyn TriggerListener>>>>,
    global_jobs: RwLock<Vec<Arc<dyn JobListener>>>,
    named_jobs: RwLock<HashMap<JobKey, Vec<Arc<dyn JobListener>>>>,
    schedulers: RwLock<Vec<Arc<dyn SchedulerListener>>>,
}

impl ListenerRegistry {
    pub fn new() -> Self {
        Self {
            global_triggers: RwLock::new(Vec::new()),
            named_triggers: RwLock::new(HashMap::new()),
            global_jobs: RwLock::new(Vec::new()),
            named_jobs: RwLock::new(HashMap::new()),
            schedulers: RwLock::new(Vec::new()),
        }
    }

    pub async fn add_global_trigger_listener(&self, listener: Arc<dyn TriggerListener>) {
        self.global_triggers.write().await.push(listener);
    }

    pub async fn add_trigger_listener(&self, key: TriggerKey, listener: Arc<dyn TriggerListener>) {
        self.named_triggers.write().await.entry(key).or_default().push(listener);
    }

    pub async fn remove_trigger_listener(&self, name: &str) -> bool {
        let mut removed = remove_by_name(&mut *self.global_triggers.write().await, name);
        for list in self.named_triggers.write().await.values_mut() {
            removed |= remove_by_name(list, name);
        }
        removed
    }

    pub async fn add_global_job_listener(&self, listener: Arc<dyn JobListener>) {
        self.global_jobs.write().await.push(listener);
    }

    pub async fn add_job_listener(&self, key: JobKey, listener: Arc<dyn JobListener>) {
        self.named_jobs.write().await.entry(key).or_default().push(listener);
    }

    pub async fn remove_job_listener(&self, name: &str) -> bool {
        let mut removed = remove_by_name(&mut *self.global_jobs.write().await, name);
        for list in self.named_jobs.write().await.values_mut() {
            removed |= remove_by_name(list, name);
        }
        removed
    }

    pub async fn add_scheduler_listener(&self, listener: Arc<dyn SchedulerListener>) {
        self.schedulers.write().await.push(listener);
    }

    pub async fn remove_scheduler_listener(&self, name: &str) -> bool {
        remove_by_name(&mut *self.schedulers.write().await, name)
    }

    pub async fn dispatch_trigger_fired(&self, trigger: &Trigger) -> FireDecision {
        let mut veto = false;
        for l in self.global_triggers.read().await.iter() {
            veto |= l.vetoes_execution(trigger).await;
            l.trigger_fired(trigger).await;
        }
        if let Some(named) = self.named_triggers.read().await.get(&trigger.header.key) {
            for l in named {
                veto |= l.vetoes_execution(trigger).await;
                l.trigger_fired(trigger).await;
            }
        }
        if veto {
            FireDecision::Veto
        } else {
            FireDecision::Proceed
        }
    }

    pub async fn dispatch_trigger_misfired(&self, trigger: &Trigger) {
        for l in self.global_triggers.read().await.iter() {
            l.trigger_misfired(trigger).await;
        }
        if let Some(named) = self.named_triggers.read().await.get(&trigger.header.key) {
            for l in named {
                l.trigger_misfired(trigger).await;
            }
        }
    }

    pub async fn dispatch_trigger_complete(&self, trigger: &Trigger, result: &JobResult) {
        for l in self.global_triggers.read().await.iter() {
            l.trigger_complete(trigger, result).await;
        }
        if let Some(named) = self.named_triggers.read().await.get(&trigger.header.key) {
            for l in named {
                l.trigger_complete(trigger, result).await;
            }
        }
    }

    pub async fn dispatch_job_to_be_executed(&self, ctx: &FiringContext) {
        for l in self.global_jobs.read().await.iter() {
            l.job_to_be_executed(ctx).await;
        }
        if let Some(named) = self.named_jobs.read().await.get(ctx.job.key()) {
            for l in named {
                l.job_to_be_executed(ctx).await;
            }
        }
    }

    pub async fn dispatch_job_execution_vetoed(&self, ctx: &FiringContext) {
        for l in self.global_jobs.read().await.iter() {
            l.job_execution_vetoed(ctx).await;
        }
        if let Some(named) = self.named_jobs.read().await.get(ctx.job.key()) {
            for l in named {
                l.job_execution_vetoed(ctx).await;
            }
        }
    }

    pub async fn dispatch_job_was_executed(&self, ctx: &FiringContext, result: &JobResult) {
        for l in self.global_jobs.read().await.iter() {
            l.job_was_executed(ctx, result).await;
        }
        if let Some(named) = self.named_jobs.read().await.get(ctx.job.key()) {
            for l in named {
                l.job_was_executed(ctx, result).await;
            }
        }
    }

    pub async fn dispatch_scheduler_started(&self) {
        for l in self.schedulers.read().await.iter() {
            l.scheduler_started().await;
        }
    }

    pub async fn dispatch_scheduler_in_standby(&self) {
        for l in self.schedulers.read().await.iter() {
            l.scheduler_in_standby().await;
        }
    }

    pub async fn dispatch_scheduler_shutdown(&self) {
        for l in self.schedulers.read().await.iter() {
            l.scheduler_shutdown().await;
        }
    }

    /// Report an error caught inside the firing loop or a listener. Logged
    /// regardless of whether any scheduler listener is registered — per
    /// the error-handling design, a listener failure never tears down the
    /// scheduler.
    pub async fn dispatch_scheduler_error(&self, message: &str) {
        warn!(message, "scheduler error reported to listeners");
        for l in self.schedulers.read().await.iter() {
            l.scheduler_error(message).await;
        }
    }
}

impl Default for ListenerRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn remove_by_name<T: ?Sized>(list: &mut Vec<Arc<T>>, name: &str) -> bool
where
    T: NamedListener,
{
    let before = list.len();
    list.retain(|l| l.name() != name);
    list.len() != before
}

trait NamedListener {
    fn name(&self) -> &str;
}

impl NamedListener for dyn TriggerListener {
    fn name(&self) -> &str {
        TriggerListener::name(self)
    }
}

impl NamedListener for dyn JobListener {
    fn name(&self) -> &str {
        JobListener::name(self)
    }
}

impl NamedListener for dyn SchedulerListener {
    fn name(&self) -> &str {
        SchedulerListener::name(self)
    }
}
