//! End-to-end scenario tests exercising the registry and listener dispatch
//! together, without spinning up the real background tasks (which sleep on
//! wall-clock time unsuitable for a deterministic test run).

use chrono::{Duration, Utc};
use scheduler_core::trigger::RepeatCount;
use scheduler_core::{JobDetail, Key, MisfireInstruction, Trigger, TriggerState};
use scheduler_engine::registry::JobStore;
use scheduler_engine::worker::JobResultInstruction;
use scheduler_engine::ListenerRegistry;

fn job(name: &str) -> JobDetail {
    JobDetail::new(Key::with_default_group(name), "demo::Job")
}

/// Scenario C: a simple trigger repeating every 5 minutes misses 7 fires
/// while the scheduler is "down"; DO_NOTHING must skip them all and land
/// strictly after the recovery instant, on the next 5-minute boundary.
#[tokio::test]
async fn scenario_c_misfire_do_nothing_skips_missed_fires() {
    let store = JobStore::new();
    let t0 = Utc::now();
    store.store_job(job("j1"), false).await.unwrap();
    let trigger = Trigger::new_simple(
        Key::with_default_group("t1"),
        Key::with_default_group("j1"),
        t0,
        None,
        RepeatCount::Indefinite,
        Duration::minutes(5),
        MisfireInstruction::DoNothing,
    )
    .unwrap();
    store.store_trigger(trigger.clone(), false).await.unwrap();

    let recovery = t0 + Duration::minutes(35);
    let misfired = store.scan_and_handle_misfires(recovery, Duration::seconds(60)).await;
    assert_eq!(misfired.len(), 1);
    let next = misfired[0].header.next_fire_time.unwrap();
    assert!(next > recovery);
    assert_eq!(
        (next - t0).num_seconds() % Duration::minutes(5).num_seconds(),
        0,
        "next fire must land on a 5-minute boundary from start"
    );
}

/// Scenario D: pausing a group stops acquisition; triggers paused while
/// overdue still receive misfire notification once resumed, and the next
/// firing lands near the resume instant rather than replaying every missed
/// second.
#[tokio::test]
async fn scenario_d_pause_then_resume_notifies_and_catches_up() {
    let store = JobStore::new();
    let listeners = ListenerRegistry::new();
    let t0 = Utc::now();
    store.store_job(job("j1"), false).await.unwrap();
    let trigger = Trigger::new_simple(
        Key::new("t1", "ticking"),
        Key::with_default_group("j1"),
        t0,
        None,
        RepeatCount::Indefinite,
        Duration::seconds(1),
        MisfireInstruction::SmartPolicy,
    )
    .unwrap();
    store.store_trigger(trigger.clone(), false).await.unwrap();

    // Simulate firings #1-#3 completing, then pause the group.
    for _ in 0..3 {
        let acquired = store.acquire_next_triggers(Utc::now() + Duration::seconds(1), 10).await;
        let acquired = acquired.first().cloned();
        if let Some(a) = acquired {
            let record = store.trigger_fired(&a.header.key, a.header.next_fire_time.unwrap()).await.unwrap();
            store.trigger_complete(&record, JobResultInstruction::Noop).await;
        }
    }
    store.pause_group("ticking").await;
    assert_eq!(store.get_trigger_state(&Key::new("t1", "ticking")).await, TriggerState::Paused);

    // Time passes well beyond the resume point while paused; no acquisition
    // should happen since the trigger is PAUSED, not NORMAL.
    let resume_at = t0 + Duration::seconds(10);
    let during_pause = store.acquire_next_triggers(resume_at, 10).await;
    assert!(during_pause.is_empty());

    store.resume_group("ticking", resume_at).await;
    let misfired = store.scan_and_handle_misfires(resume_at, Duration::seconds(60)).await;
    for t in &misfired {
        listeners.dispatch_trigger_misfired(t).await;
    }

    let resumed = store.get_trigger(&Key::new("t1", "ticking")).await.unwrap();
    assert_eq!(resumed.header.state, TriggerState::Normal);
    let next = resumed.header.next_fire_time.unwrap();
    assert!((next - resume_at) <= Duration::seconds(60));
}

/// Scenario E: a stateful job with two overlapping-interval triggers must
/// never have two firings executing at once; the second trigger is BLOCKED
/// until the first's execution completes.
#[tokio::test]
async fn scenario_e_stateful_job_serializes_overlapping_triggers() {
    let store = JobStore::new();
    store.store_job(job("j1").stateful(true), false).await.unwrap();
    let t0 = Utc::now();
    let t1 = Trigger::new_simple(
        Key::with_default_group("t1"),
        Key::with_default_group("j1"),
        t0,
        None,
        RepeatCount::Indefinite,
        Duration::seconds(1),
        MisfireInstruction::SmartPolicy,
    )
    .unwrap();
    let t2 = Trigger::new_simple(
        Key::with_default_group("t2"),
        Key::with_default_group("j1"),
        t0 + Duration::milliseconds(500),
        None,
        RepeatCount::Indefinite,
        Duration::seconds(1),
        MisfireInstruction::SmartPolicy,
    )
    .unwrap();
    store.store_trigger(t1.clone(), false).await.unwrap();
    store.store_trigger(t2.clone(), false).await.unwrap();

    let acquired = store.acquire_next_triggers(t0 + Duration::seconds(5), 10).await;
    let first = acquired
        .iter()
        .min_by_key(|t| t.header.next_fire_time)
        .cloned()
        .unwrap();
    let record = store.trigger_fired(&first.header.key, first.header.next_fire_time.unwrap()).await.unwrap();

    let other_key = if first.header.key.name() == "t1" {
        Key::with_default_group("t2")
    } else {
        Key::with_default_group("t1")
    };
    assert_eq!(store.get_trigger_state(&other_key).await, TriggerState::Blocked);
    assert_eq!(store.get_currently_executing_jobs().await.len(), 1);

    // A second acquisition attempt for the same job must not double-fire it.
    let second_attempt = store.trigger_fired(&other_key, Utc::now()).await;
    assert!(second_attempt.is_none());

    store.trigger_complete(&record, JobResultInstruction::Noop).await;
    assert_eq!(store.get_trigger_state(&other_key).await, TriggerState::Normal);
    assert!(store.get_currently_executing_jobs().await.is_empty());
}

/// Scenario F: a durable job with no triggers persists in the registry and
/// can still be fired ad hoc; once made non-durable and its last trigger is
/// removed, the job is removed too.
#[tokio::test]
async fn scenario_f_durable_job_survives_without_triggers() {
    let store = JobStore::new();
    store.store_job(job("backup").durable(true), false).await.unwrap();
    assert!(store.get_job_detail(&Key::with_default_group("backup")).await.is_some());

    // Ad hoc firing attaches a one-shot trigger to the existing durable job.
    let trigger = Trigger::new_simple(
        Key::new("manual-1", scheduler_core::key::MANUAL_TRIGGER_GROUP),
        Key::with_default_group("backup"),
        Utc::now(),
        None,
        RepeatCount::Finite(0),
        Duration::zero(),
        MisfireInstruction::FireNow,
    )
    .unwrap();
    store.store_trigger(trigger.clone(), false).await.unwrap();
    assert!(store.get_trigger(&trigger.header.key).await.is_some());

    // Mark non-durable, then remove its only trigger: the job must go too.
    let mut detail = store.get_job_detail(&Key::with_default_group("backup")).await.unwrap();
    detail.durable = false;
    store.store_job(detail, true).await.unwrap();
    store.remove_trigger(&trigger.header.key).await;
    assert!(store.get_job_detail(&Key::with_default_group("backup")).await.is_none());
}
