//! The public scheduler facade.
//!
//! `Scheduler` owns the registry and listener registry, spawns the firing
//! loop and misfire handler as background tasks, and exposes the client
//! API the rest of the crate's contract is built around. It holds no
//! scheduling logic itself — that lives in [`crate::registry`],
//! [`crate::firing_loop`], and [`crate::misfire_handler`].

use crate::firing_loop::{self, FiringLoopConfig};
use crate::listener::{JobListener, ListenerRegistry, SchedulerListener, TriggerListener};
use crate::misfire_handler;
use crate::registry::JobStore;
use crate::worker::{JobResult, WorkSubmission};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use scheduler_core::{
    Calendar, JobDetail, JobKey, MisfireInstruction, SchedulerError, SchedulerResult, Trigger,
    TriggerKey, TriggerState,
};
use scheduler_core::key::{FAILED_OVER_JOBS_GROUP, MANUAL_TRIGGER_GROUP, RECOVERING_JOBS_GROUP};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration as StdDuration;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::info;
use uuid::Uuid;

/// Runtime knobs a host application can tune when constructing a
/// [`Scheduler`]. Mirrors the defaults named in the firing-loop and
/// misfire-handler contracts.
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    pub scheduler_name: String,
    pub idle_wait_time: chrono::Duration,
    pub batch_size: usize,
    pub misfire_threshold: chrono::Duration,
    pub misfire_scan_interval: StdDuration,
    /// How long an acquisition reservation may sit without reaching
    /// `trigger_fired` before the startup recovery pass treats it as
    /// abandoned by a crashed firing loop pass and releases it.
    pub acquire_lease: chrono::Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            scheduler_name: "DefaultScheduler".to_string(),
            idle_wait_time: chrono::Duration::seconds(30),
            batch_size: 1,
            misfire_threshold: chrono::Duration::seconds(60),
            misfire_scan_interval: StdDuration::from_secs(60),
            acquire_lease: chrono::Duration::minutes(5),
        }
    }
}

/// Reserved trigger/job group names a client must not use directly.
const RESERVED_GROUPS: [&str; 3] = [MANUAL_TRIGGER_GROUP, RECOVERING_JOBS_GROUP, FAILED_OVER_JOBS_GROUP];

fn reject_reserved_group(group: &str) -> SchedulerResult<()> {
    if RESERVED_GROUPS.contains(&group) {
        Err(SchedulerError::InvalidConfiguration(format!(
            "group '{group}' is reserved for internal use"
        )))
    } else {
        Ok(())
    }
}

/// A snapshot of scheduler identity and lifecycle state, returned by
/// `get_metadata()`.
#[derive(Debug, Clone)]
pub struct SchedulerMetadata {
    pub scheduler_name: String,
    pub instance_id: Uuid,
    pub is_in_standby: bool,
    pub is_shutdown: bool,
}

/// Deletes an ad-hoc `trigger_job` trigger once it completes. Registered
/// globally at construction rather than threading a one-off cleanup signal
/// through the firing loop.
struct ManualTriggerCleanup {
    store: Arc<JobStore>,
}

#[async_trait]
impl TriggerListener for ManualTriggerCleanup {
    fn name(&self) -> &str {
        "__manual_trigger_cleanup"
    }

    async fn trigger_complete(&self, trigger: &Trigger, _result: &JobResult) {
        if trigger.header.key.group() == MANUAL_TRIGGER_GROUP {
            self.store.remove_trigger(&trigger.header.key).await;
        }
    }
}

/// The job scheduling engine: owns the registry and drives the firing loop
/// and misfire handler as background tasks for as long as it is running.
pub struct Scheduler {
    name: String,
    instance_id: Uuid,
    store: Arc<JobStore>,
    listeners: Arc<ListenerRegistry>,
    worker: Arc<dyn WorkSubmission>,
    config: SchedulerConfig,
    standby: Arc<AtomicBool>,
    shutdown: Arc<AtomicBool>,
    wake: Arc<Notify>,
    tasks: std::sync::Mutex<Vec<JoinHandle<()>>>,
}

impl Scheduler {
    /// Builds a scheduler in standby. Call [`Scheduler::start`] to begin
    /// firing triggers.
    pub fn new(worker: Arc<dyn WorkSubmission>, config: SchedulerConfig) -> Self {
        let store = Arc::new(JobStore::new());
        let listeners = Arc::new(ListenerRegistry::new());
        Self {
            name: config.scheduler_name.clone(),
            instance_id: Uuid::new_v4(),
            store,
            listeners,
            worker,
            config,
            standby: Arc::new(AtomicBool::new(true)),
            shutdown: Arc::new(AtomicBool::new(false)),
            wake: Arc::new(Notify::new()),
            tasks: std::sync::Mutex::new(Vec::new()),
        }
    }

    // -- identity --------------------------------------------------------

    pub fn scheduler_name(&self) -> &str {
        &self.name
    }

    pub fn instance_id(&self) -> Uuid {
        self.instance_id
    }

    pub fn get_metadata(&self) -> SchedulerMetadata {
        SchedulerMetadata {
            scheduler_name: self.name.clone(),
            instance_id: self.instance_id,
            is_in_standby: self.is_in_standby(),
            is_shutdown: self.is_shutdown(),
        }
    }

    // -- lifecycle ---------------------------------------------------------

    /// Registers the internal ad-hoc-trigger cleanup listener, then spawns
    /// the firing loop and misfire handler and releases standby.
    pub async fn start(&self) -> SchedulerResult<()> {
        if self.shutdown.load(Ordering::SeqCst) {
            return Err(SchedulerError::SchedulerStateError(
                "scheduler has been shut down and cannot be restarted".to_string(),
            ));
        }

        self.listeners
            .add_global_trigger_listener(Arc::new(ManualTriggerCleanup {
                store: self.store.clone(),
            }))
            .await;

        let recovered = self
            .store
            .recover_stale_acquisitions(Utc::now(), self.config.acquire_lease)
            .await;
        for trigger in &recovered {
            self.listeners.dispatch_trigger_misfired(trigger).await;
        }
        if !recovered.is_empty() {
            info!(count = recovered.len(), "startup recovery pass released stale acquisitions");
        }

        let mut tasks = self.tasks.lock().unwrap();
        if tasks.is_empty() {
            tasks.push(tokio::spawn(firing_loop::run(
                self.store.clone(),
                self.listeners.clone(),
                self.worker.clone(),
                FiringLoopConfig {
                    idle_wait_time: self.config.idle_wait_time,
                    batch_size: self.config.batch_size,
                },
                self.standby.clone(),
                self.shutdown.clone(),
                self.wake.clone(),
            )));
            tasks.push(tokio::spawn(misfire_handler::run(
                self.store.clone(),
                self.listeners.clone(),
                self.config.misfire_threshold,
                self.config.misfire_scan_interval,
                self.shutdown.clone(),
            )));
        }
        drop(tasks);

        self.standby.store(false, Ordering::SeqCst);
        self.wake.notify_waiters();
        self.listeners.dispatch_scheduler_started().await;
        info!(scheduler = %self.name, "scheduler started");
        Ok(())
    }

    /// Suspends acquisition without stopping the background tasks.
    pub async fn standby(&self) {
        self.standby.store(true, Ordering::SeqCst);
        self.listeners.dispatch_scheduler_in_standby().await;
    }

    pub fn is_in_standby(&self) -> bool {
        self.standby.load(Ordering::SeqCst) && !self.shutdown.load(Ordering::SeqCst)
    }

    pub fn is_shutdown(&self) -> bool {
        self.shutdown.load(Ordering::SeqCst)
    }

    /// Terminal shutdown: signals the background tasks to stop, requests
    /// interruption of interruptible executing jobs, and optionally waits
    /// for all currently-executing jobs to finish. A shut-down scheduler
    /// cannot be restarted.
    pub async fn shutdown(&self, wait_for_jobs: bool) {
        self.shutdown.store(true, Ordering::SeqCst);
        self.wake.notify_waiters();

        for job in self.store.get_currently_executing_jobs().await {
            if job.interruptible {
                if let Err(e) = self.interrupt(job.key()).await {
                    tracing::warn!(job = %job.key(), error = %e, "failed to interrupt job during shutdown");
                }
            }
        }

        self.listeners.dispatch_scheduler_shutdown().await;

        if wait_for_jobs {
            while !self.store.get_currently_executing_jobs().await.is_empty() {
                tokio::time::sleep(StdDuration::from_millis(25)).await;
            }
        }

        let handles: Vec<JoinHandle<()>> = std::mem::take(&mut *self.tasks.lock().unwrap());
        for handle in handles {
            handle.abort();
        }
    }

    // -- job and trigger registration --------------------------------------

    /// Stores `detail` and `trigger` together, returning the trigger's
    /// first fire time.
    pub async fn schedule_job(&self, detail: JobDetail, trigger: Trigger) -> SchedulerResult<DateTime<Utc>> {
        reject_reserved_group(trigger.header.key.group())?;
        let first_fire = trigger
            .header
            .next_fire_time
            .ok_or_else(|| SchedulerError::TriggerDoesNotFire(trigger.header.key.to_string()))?;
        self.store.store_job(detail, false).await?;
        self.store.store_trigger(trigger, false).await?;
        self.wake.notify_waiters();
        Ok(first_fire)
    }

    /// Attaches `trigger` to a job that must already exist.
    pub async fn schedule_trigger_for_existing_job(&self, trigger: Trigger) -> SchedulerResult<DateTime<Utc>> {
        reject_reserved_group(trigger.header.key.group())?;
        let first_fire = trigger
            .header
            .next_fire_time
            .ok_or_else(|| SchedulerError::TriggerDoesNotFire(trigger.header.key.to_string()))?;
        self.store.store_trigger(trigger, false).await?;
        self.wake.notify_waiters();
        Ok(first_fire)
    }

    pub async fn add_job(&self, detail: JobDetail, replace: bool) -> SchedulerResult<()> {
        reject_reserved_group(detail.key().group())?;
        self.store.store_job(detail, replace).await
    }

    pub async fn delete_job(&self, key: &JobKey) -> bool {
        self.store.remove_job(key).await
    }

    pub async fn unschedule_trigger(&self, key: &TriggerKey) -> bool {
        self.store.remove_trigger(key).await
    }

    pub async fn reschedule_trigger(&self, key: &TriggerKey, new: Trigger) -> SchedulerResult<Option<DateTime<Utc>>> {
        let next = new.header.next_fire_time;
        self.store.replace_trigger(key, new).await?;
        self.wake.notify_waiters();
        Ok(next)
    }

    /// Fires `key` once, immediately, via a self-cleaning ad-hoc trigger in
    /// the reserved `MANUAL_TRIGGER` group.
    pub async fn trigger_job(
        &self,
        key: &JobKey,
        data: Option<std::collections::HashMap<String, serde_json::Value>>,
        volatile: bool,
    ) -> SchedulerResult<()> {
        let mut detail = self
            .store
            .get_job_detail(key)
            .await
            .ok_or_else(|| SchedulerError::ObjectNotFound(key.to_string()))?;
        if let Some(data) = data {
            detail.data = data;
        }
        detail.volatile = volatile;
        self.store.store_job(detail.clone(), true).await?;

        let trigger_key = TriggerKey::new(format!("manual-{}", Uuid::new_v4()), MANUAL_TRIGGER_GROUP);
        let trigger = Trigger::new_simple(
            trigger_key,
            key.clone(),
            Utc::now(),
            None,
            scheduler_core::trigger::RepeatCount::Finite(0),
            chrono::Duration::zero(),
            MisfireInstruction::FireNow,
        )?;
        self.store.store_trigger(trigger, false).await?;
        self.wake.notify_waiters();
        Ok(())
    }

    // -- pause / resume ------------------------------------------------------

    pub async fn pause_job(&self, key: &JobKey) {
        self.store.pause_job(key).await;
    }

    pub async fn pause_job_group(&self, group: &str) {
        self.store.pause_job_group(group).await;
    }

    pub async fn pause_trigger(&self, key: &TriggerKey) {
        self.store.pause_trigger(key).await;
    }

    pub async fn pause_trigger_group(&self, group: &str) {
        self.store.pause_group(group).await;
    }

    pub async fn pause_all(&self) {
        self.store.pause_all().await;
    }

    pub async fn resume_job(&self, key: &JobKey) {
        self.store.resume_job(key, Utc::now()).await;
        self.wake.notify_waiters();
    }

    pub async fn resume_job_group(&self, group: &str) {
        self.store.resume_job_group(group, Utc::now()).await;
        self.wake.notify_waiters();
    }

    pub async fn resume_trigger(&self, key: &TriggerKey) {
        self.store.resume_trigger(key, Utc::now()).await;
        self.wake.notify_waiters();
    }

    pub async fn resume_trigger_group(&self, group: &str) {
        self.store.resume_group(group, Utc::now()).await;
        self.wake.notify_waiters();
    }

    pub async fn resume_all(&self) {
        self.store.resume_all(Utc::now()).await;
        self.wake.notify_waiters();
    }

    // -- introspection -------------------------------------------------------

    pub async fn job_group_names(&self) -> Vec<String> {
        self.store.job_group_names().await
    }

    pub async fn trigger_group_names(&self) -> Vec<String> {
        self.store.trigger_group_names().await
    }

    pub async fn paused_trigger_groups(&self) -> Vec<String> {
        self.store.paused_trigger_groups().await
    }

    pub async fn calendar_names(&self) -> Vec<String> {
        self.store.calendar_names().await
    }

    pub async fn get_job_names(&self, group: &str) -> Vec<JobKey> {
        self.store.get_job_names(group).await
    }

    pub async fn get_trigger_names(&self, group: &str) -> Vec<TriggerKey> {
        self.store.get_trigger_names(group).await
    }

    pub async fn get_triggers_of_job(&self, key: &JobKey) -> Vec<Trigger> {
        self.store.get_triggers_of_job(key).await
    }

    pub async fn get_job_detail(&self, key: &JobKey) -> Option<JobDetail> {
        self.store.get_job_detail(key).await
    }

    pub async fn get_trigger(&self, key: &TriggerKey) -> Option<Trigger> {
        self.store.get_trigger(key).await
    }

    pub async fn get_trigger_state(&self, key: &TriggerKey) -> TriggerState {
        self.store.get_trigger_state(key).await
    }

    pub async fn get_currently_executing_jobs(&self) -> Vec<JobDetail> {
        self.store.get_currently_executing_jobs().await
    }

    // -- calendars -------------------------------------------------------

    pub async fn add_calendar(
        &self,
        name: impl Into<String>,
        calendar: Calendar,
        replace: bool,
        update_triggers: bool,
    ) -> SchedulerResult<()> {
        self.store.add_calendar(name, calendar, replace, update_triggers).await
    }

    pub async fn delete_calendar(&self, name: &str) -> SchedulerResult<bool> {
        self.store.delete_calendar(name).await
    }

    pub async fn get_calendar(&self, name: &str) -> Option<Calendar> {
        self.store.get_calendar(name).await
    }

    // -- listeners -------------------------------------------------------

    pub async fn add_global_trigger_listener(&self, listener: Arc<dyn TriggerListener>) {
        self.listeners.add_global_trigger_listener(listener).await;
    }

    pub async fn add_trigger_listener(&self, key: TriggerKey, listener: Arc<dyn TriggerListener>) {
        self.listeners.add_trigger_listener(key, listener).await;
    }

    pub async fn remove_trigger_listener(&self, name: &str) -> bool {
        self.listeners.remove_trigger_listener(name).await
    }

    pub async fn add_global_job_listener(&self, listener: Arc<dyn JobListener>) {
        self.listeners.add_global_job_listener(listener).await;
    }

    pub async fn add_job_listener(&self, key: JobKey, listener: Arc<dyn JobListener>) {
        self.listeners.add_job_listener(key, listener).await;
    }

    pub async fn remove_job_listener(&self, name: &str) -> bool {
        self.listeners.remove_job_listener(name).await
    }

    pub async fn add_scheduler_listener(&self, listener: Arc<dyn SchedulerListener>) {
        self.listeners.add_scheduler_listener(listener).await;
    }

    pub async fn remove_scheduler_listener(&self, name: &str) -> bool {
        self.listeners.remove_scheduler_listener(name).await
    }

    // -- interruption -------------------------------------------------------

    /// Requests interruption of a currently-executing job. Fails with
    /// `UnableToInterruptJob` if the job isn't executing, isn't marked
    /// interruptible, or the worker declined the request.
    pub async fn interrupt(&self, key: &JobKey) -> SchedulerResult<bool> {
        let job = self
            .store
            .get_job_detail(key)
            .await
            .ok_or_else(|| SchedulerError::ObjectNotFound(key.to_string()))?;
        if !job.interruptible {
            return Err(SchedulerError::UnableToInterruptJob(format!(
                "job {key} does not declare itself interruptible"
            )));
        }
        let record = self
            .store
            .get_executing_record(key)
            .await
            .ok_or_else(|| SchedulerError::UnableToInterruptJob(format!("job {key} is not currently executing")))?;
        Ok(self.worker.interrupt(record.fire_instance_id).await)
    }
}
