//! The dedicated scheduling task.
//!
//! A single `tokio::spawn`ed loop that acquires due triggers from the
//! registry, waits for their fire time, hands them to the worker pool, and
//! reports completion back. It is the only task that calls
//! `acquire_next_triggers` — acquisition is the serialization point
//! everything else (misfire scanning, client pause/resume calls) defers to.

use crate::listener::{FireDecision, ListenerRegistry};
use crate::registry::JobStore;
use crate::worker::{FiringContext, JobResult, JobResultInstruction, WorkSubmission};
use chrono::Utc;
use scheduler_core::Trigger;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration as StdDuration;
use tokio::sync::Notify;
use tracing::{debug, warn};

/// Shared knobs the firing loop and misfire handler both read.
pub struct FiringLoopConfig {
    pub idle_wait_time: chrono::Duration,
    pub batch_size: usize,
}

impl Default for FiringLoopConfig {
    fn default() -> Self {
        Self {
            idle_wait_time: chrono::Duration::seconds(30),
            batch_size: 1,
        }
    }
}

/// Runs until `shutdown` is set. Honors `standby` by skipping acquisition
/// entirely and sleeping on `wake`, so pausing the scheduler never spins.
pub async fn run(
    store: Arc<JobStore>,
    listeners: Arc<ListenerRegistry>,
    worker: Arc<dyn WorkSubmission>,
    config: FiringLoopConfig,
    standby: Arc<AtomicBool>,
    shutdown: Arc<AtomicBool>,
    wake: Arc<Notify>,
) {
    loop {
        if shutdown.load(Ordering::SeqCst) {
            break;
        }
        if standby.load(Ordering::SeqCst) {
            wait_or_wake(&wake, StdDuration::from_millis(200)).await;
            continue;
        }

        while !worker.has_capacity().await {
            if shutdown.load(Ordering::SeqCst) {
                return;
            }
            wait_or_wake(&wake, StdDuration::from_millis(50)).await;
        }

        let now = Utc::now();
        let window = now + config.idle_wait_time;
        let batch = store.acquire_next_triggers(window, config.batch_size).await;

        if batch.is_empty() {
            wait_or_wake(&wake, config.idle_wait_time.to_std().unwrap_or(StdDuration::from_secs(30))).await;
            continue;
        }

        for trigger in batch {
            if shutdown.load(Ordering::SeqCst) {
                store.release_trigger(&trigger.header.key).await;
                continue;
            }
            if standby.load(Ordering::SeqCst) {
                store.release_trigger(&trigger.header.key).await;
                continue;
            }

            if let Some(fire_at) = trigger.header.next_fire_time {
                let wait = (fire_at - Utc::now()).to_std().unwrap_or_default();
                if wait > StdDuration::ZERO {
                    wait_or_wake(&wake, wait).await;
                }
            }

            fire_one(&store, &listeners, worker.as_ref(), trigger).await;
        }
    }
}

async fn wait_or_wake(wake: &Notify, timeout: StdDuration) {
    let _ = tokio::time::timeout(timeout, wake.notified()).await;
}

/// Dispatches one acquired trigger through listener notification, the
/// worker, and back to `trigger_complete`.
async fn fire_one(
    store: &JobStore,
    listeners: &ListenerRegistry,
    worker: &dyn WorkSubmission,
    trigger: Trigger,
) {
    let key = trigger.header.key.clone();
    let Some(job) = store.get_job_detail(&trigger.header.job_key).await else {
        warn!(trigger = %key, "acquired trigger references a missing job; releasing");
        store.release_trigger(&key).await;
        return;
    };

    let actual_fire_time = Utc::now();
    let decision = listeners.dispatch_trigger_fired(&trigger).await;

    let Some(record) = store.trigger_fired(&key, actual_fire_time).await else {
        debug!(trigger = %key, "stateful job already executing; deferring fire");
        return;
    };

    let ctx = FiringContext {
        trigger: trigger.clone(),
        job,
        scheduled_fire_time: record.scheduled_fire_time,
        actual_fire_time,
        fire_instance_id: record.fire_instance_id,
    };

    if decision == FireDecision::Veto {
        listeners.dispatch_job_execution_vetoed(&ctx).await;
        let result = JobResult::with_instruction(JobResultInstruction::Noop);
        store.trigger_complete(&record, result.instruction).await;
        listeners.dispatch_trigger_complete(&trigger, &result).await;
        return;
    }

    listeners.dispatch_job_to_be_executed(&ctx).await;
    let result = worker.submit(ctx.clone()).await;
    listeners.dispatch_job_was_executed(&ctx, &result).await;
    store.trigger_complete(&record, result.instruction).await;
    listeners.dispatch_trigger_complete(&trigger, &result).await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::worker::JobResult;
    use async_trait::async_trait;
    use scheduler_core::{JobDetail, Key, MisfireInstruction};

    struct Immediate;

    #[async_trait]
    impl WorkSubmission for Immediate {
        async fn submit(&self, _ctx: FiringContext) -> JobResult {
            JobResult::ok()
        }
    }

    #[tokio::test]
    async fn fire_one_completes_a_one_shot_trigger() {
        let store = JobStore::new();
        let listeners = ListenerRegistry::new();
        let job_key = Key::with_default_group("j1");
        store.store_job(JobDetail::new(job_key.clone(), "demo::Job"), false).await.unwrap();
        let trigger = Trigger::new_simple(
            Key::with_default_group("t1"),
            job_key.clone(),
            Utc::now(),
            None,
            scheduler_core::trigger::RepeatCount::Finite(0),
            chrono::Duration::zero(),
            MisfireInstruction::SmartPolicy,
        )
        .unwrap();
        store.store_trigger(trigger.clone(), false).await.unwrap();

        fire_one(&store, &listeners, &Immediate, trigger.clone()).await;

        assert_eq!(
            store.get_trigger_state(&trigger.header.key).await,
            scheduler_core::TriggerState::Complete
        );
    }
}
