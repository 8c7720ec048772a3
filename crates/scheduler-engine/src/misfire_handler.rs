//! The misfire-scanning task.
//!
//! Runs on its own timer, independent of the firing loop, looking for
//! NORMAL triggers overdue by more than the configured threshold. Applying
//! a trigger's misfire instruction and notifying listeners both happen
//! here; the firing loop never sees a trigger in this intermediate state
//! because `scan_and_handle_misfires` only touches unacquired triggers.

use crate::listener::ListenerRegistry;
use crate::registry::JobStore;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration as StdDuration;
use tracing::debug;

/// Runs until `shutdown` is set, scanning every `interval`.
pub async fn run(
    store: Arc<JobStore>,
    listeners: Arc<ListenerRegistry>,
    threshold: chrono::Duration,
    interval: StdDuration,
    shutdown: Arc<AtomicBool>,
) {
    let mut ticker = tokio::time::interval(interval);
    loop {
        ticker.tick().await;
        if shutdown.load(Ordering::SeqCst) {
            break;
        }
        let misfired = store.scan_and_handle_misfires(chrono::Utc::now(), threshold).await;
        if !misfired.is_empty() {
            debug!(count = misfired.len(), "misfire handler rewrote overdue triggers");
        }
        for trigger in &misfired {
            listeners.dispatch_trigger_misfired(trigger).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scheduler_core::{JobDetail, Key, MisfireInstruction, Trigger, TriggerState};

    #[tokio::test]
    async fn scan_rewrites_overdue_trigger_and_notifies() {
        let store = Arc::new(JobStore::new());
        let listeners = Arc::new(ListenerRegistry::new());
        let job_key = Key::with_default_group("j1");
        store.store_job(JobDetail::new(job_key.clone(), "demo::Job"), false).await.unwrap();
        let overdue_start = chrono::Utc::now() - chrono::Duration::minutes(10);
        let trigger = Trigger::new_simple(
            Key::with_default_group("t1"),
            job_key,
            overdue_start,
            None,
            scheduler_core::trigger::RepeatCount::Finite(0),
            chrono::Duration::zero(),
            MisfireInstruction::FireOnceNow,
        )
        .unwrap();
        store.store_trigger(trigger.clone(), false).await.unwrap();

        let misfired = store.scan_and_handle_misfires(chrono::Utc::now(), chrono::Duration::seconds(1)).await;
        assert_eq!(misfired.len(), 1);
        for trigger in &misfired {
            listeners.dispatch_trigger_misfired(trigger).await;
        }

        let state = store.get_trigger_state(&trigger.header.key).await;
        assert!(state == TriggerState::Normal || state == TriggerState::Complete);
    }
}
