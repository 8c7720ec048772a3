//! The in-memory job store: the single piece of shared mutable state the
//! firing loop, misfire handler, and public API all serialize through.
//!
//! One `tokio::sync::RwLock` guards the whole structure, mirroring how an
//! in-memory `JobStore` implementation is expected to behave per the
//! registry contract — a persistent implementation would instead use
//! transactions spanning acquire-and-mark, but the external shape is the
//! same.

use crate::worker::JobResultInstruction;
use chrono::{DateTime, Utc};
use scheduler_core::key::RECOVERING_JOBS_GROUP;
use scheduler_core::{Calendar, JobDetail, JobKey, SchedulerError, SchedulerResult, Trigger, TriggerKey, TriggerState};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

/// A snapshot taken when a trigger is handed to the firing loop: the
/// "FiredTrigger" transient record from the registry contract.
#[derive(Debug, Clone)]
pub struct FiredRecord {
    pub trigger_key: TriggerKey,
    pub job_key: JobKey,
    pub scheduled_fire_time: DateTime<Utc>,
    pub actual_fire_time: DateTime<Utc>,
    pub fire_instance_id: Uuid,
}

#[derive(Default)]
struct State {
    jobs: HashMap<JobKey, JobDetail>,
    triggers: HashMap<TriggerKey, Trigger>,
    triggers_by_job: HashMap<JobKey, HashSet<TriggerKey>>,
    calendars: HashMap<String, Calendar>,
    paused_trigger_groups: HashSet<String>,
    pause_all: bool,
    /// Trigger key to the instant it was acquired, so a startup recovery
    /// pass can tell a reservation left behind by a crashed loop pass apart
    /// from one genuinely in flight.
    acquired: HashMap<TriggerKey, DateTime<Utc>>,
    executing: HashMap<JobKey, FiredRecord>,
}

/// The registry: keyed storage of jobs, triggers, and calendars, plus the
/// pause sets and acquisition bookkeeping the firing loop depends on.
pub struct JobStore {
    state: Arc<RwLock<State>>,
}

impl JobStore {
    pub fn new() -> Self {
        Self {
            state: Arc::new(RwLock::new(State::default())),
        }
    }

    pub async fn store_job(&self, detail: JobDetail, replace: bool) -> SchedulerResult<()> {
        let mut state = self.state.write().await;
        let key = detail.key().clone();
        if state.jobs.contains_key(&key) && !replace {
            return Err(SchedulerError::ObjectAlreadyExists(key.to_string()));
        }
        state.triggers_by_job.entry(key.clone()).or_default();
        state.jobs.insert(key, detail);
        Ok(())
    }

    pub async fn store_trigger(&self, mut trigger: Trigger, replace: bool) -> SchedulerResult<()> {
        let mut state = self.state.write().await;
        let key = trigger.header.key.clone();
        if state.triggers.contains_key(&key) && !replace {
            return Err(SchedulerError::ObjectAlreadyExists(key.to_string()));
        }
        if !state.jobs.contains_key(&trigger.header.job_key) {
            return Err(SchedulerError::ObjectNotFound(format!(
                "job {} referenced by trigger {key} does not exist",
                trigger.header.job_key
            )));
        }
        if state.pause_all || state.paused_trigger_groups.contains(key.group()) {
            trigger.header.state = trigger.header.state.paused();
        }
        state
            .triggers_by_job
            .entry(trigger.header.job_key.clone())
            .or_default()
            .insert(key.clone());
        state.triggers.insert(key, trigger);
        Ok(())
    }

    /// Removes the job and every trigger referencing it. Returns whether
    /// the job was present.
    pub async fn remove_job(&self, key: &JobKey) -> bool {
        let mut state = self.state.write().await;
        let Some(trigger_keys) = state.triggers_by_job.remove(key) else {
            return false;
        };
        for tk in trigger_keys {
            state.triggers.remove(&tk);
        }
        state.jobs.remove(key).is_some()
    }

    /// Removes a trigger; if its job becomes orphaned and non-durable, the
    /// job is removed too. Returns whether the trigger was present.
    pub async fn remove_trigger(&self, key: &TriggerKey) -> bool {
        let mut state = self.state.write().await;
        let Some(trigger) = state.triggers.remove(key) else {
            return false;
        };
        let job_key = trigger.header.job_key.clone();
        if let Some(set) = state.triggers_by_job.get_mut(&job_key) {
            set.remove(key);
            let orphaned = set.is_empty();
            if orphaned {
                let durable = state.jobs.get(&job_key).map(|j| j.durable).unwrap_or(false);
                if !durable {
                    state.triggers_by_job.remove(&job_key);
                    state.jobs.remove(&job_key);
                }
            }
        }
        true
    }

    /// Atomically swaps a trigger for a new one with the same job key.
    pub async fn replace_trigger(&self, key: &TriggerKey, new: Trigger) -> SchedulerResult<()> {
        let mut state = self.state.write().await;
        let Some(old) = state.triggers.get(key) else {
            return Err(SchedulerError::ObjectNotFound(key.to_string()));
        };
        if old.header.job_key != new.header.job_key {
            return Err(SchedulerError::InvalidConfiguration(
                "replacement trigger must reference the same job".to_string(),
            ));
        }
        state.triggers.insert(key.clone(), new);
        Ok(())
    }

    pub async fn get_trigger_state(&self, key: &TriggerKey) -> TriggerState {
        let state = self.state.read().await;
        state.triggers.get(key).map(|t| t.header.state).unwrap_or(TriggerState::None)
    }

    pub async fn get_job_detail(&self, key: &JobKey) -> Option<JobDetail> {
        self.state.read().await.jobs.get(key).cloned()
    }

    pub async fn get_trigger(&self, key: &TriggerKey) -> Option<Trigger> {
        self.state.read().await.triggers.get(key).cloned()
    }

    pub async fn get_triggers_of_job(&self, key: &JobKey) -> Vec<Trigger> {
        let state = self.state.read().await;
        state
            .triggers_by_job
            .get(key)
            .into_iter()
            .flatten()
            .filter_map(|tk| state.triggers.get(tk).cloned())
            .collect()
    }

    pub async fn job_group_names(&self) -> Vec<String> {
        let state = self.state.read().await;
        let mut groups: HashSet<&str> = state.jobs.keys().map(|k| k.group()).collect();
        let mut out: Vec<String> = groups.drain().map(str::to_string).collect();
        out.sort();
        out
    }

    pub async fn trigger_group_names(&self) -> Vec<String> {
        let state = self.state.read().await;
        let mut groups: HashSet<&str> = state.triggers.keys().map(|k| k.group()).collect();
        let mut out: Vec<String> = groups.drain().map(str::to_string).collect();
        out.sort();
        out
    }

    pub async fn get_job_names(&self, group: &str) -> Vec<JobKey> {
        let state = self.state.read().await;
        state.jobs.keys().filter(|k| k.group() == group).cloned().collect()
    }

    pub async fn get_trigger_names(&self, group: &str) -> Vec<TriggerKey> {
        let state = self.state.read().await;
        state.triggers.keys().filter(|k| k.group() == group).cloned().collect()
    }

    pub async fn paused_trigger_groups(&self) -> Vec<String> {
        self.state.read().await.paused_trigger_groups.iter().cloned().collect()
    }

    pub async fn calendar_names(&self) -> Vec<String> {
        self.state.read().await.calendars.keys().cloned().collect()
    }

    pub async fn add_calendar(
        &self,
        name: impl Into<String>,
        calendar: Calendar,
        replace: bool,
        update_triggers: bool,
    ) -> SchedulerResult<()> {
        let name = name.into();
        let mut state = self.state.write().await;
        if state.calendars.contains_key(&name) && !replace {
            return Err(SchedulerError::ObjectAlreadyExists(name));
        }
        state.calendars.insert(name.clone(), calendar.clone());
        if update_triggers {
            for t in state.triggers.values_mut() {
                if t.header.calendar_name.as_deref() == Some(name.as_str()) {
                    t.apply_calendar(Some(&calendar));
                }
            }
        }
        Ok(())
    }

    /// Deletes a calendar; refuses if any trigger still references it.
    pub async fn delete_calendar(&self, name: &str) -> SchedulerResult<bool> {
        let mut state = self.state.write().await;
        let in_use = state.triggers.values().any(|t| t.header.calendar_name.as_deref() == Some(name));
        if in_use {
            return Err(SchedulerError::InvalidConfiguration(format!(
                "calendar '{name}' is still referenced by a trigger"
            )));
        }
        Ok(state.calendars.remove(name).is_some())
    }

    pub async fn get_calendar(&self, name: &str) -> Option<Calendar> {
        self.state.read().await.calendars.get(name).cloned()
    }

    /// The in-flight fire record for a job currently executing, if any.
    pub async fn get_executing_record(&self, key: &JobKey) -> Option<FiredRecord> {
        self.state.read().await.executing.get(key).cloned()
    }

    pub async fn pause_trigger(&self, key: &TriggerKey) {
        let mut state = self.state.write().await;
        if let Some(t) = state.triggers.get_mut(key) {
            t.header.state = t.header.state.paused();
        }
    }

    pub async fn pause_group(&self, group: &str) {
        let mut state = self.state.write().await;
        state.paused_trigger_groups.insert(group.to_string());
        for t in state.triggers.values_mut().filter(|t| t.header.key.group() == group) {
            t.header.state = t.header.state.paused();
        }
    }

    pub async fn pause_job(&self, key: &JobKey) {
        let mut state = self.state.write().await;
        let keys: Vec<TriggerKey> = state.triggers_by_job.get(key).into_iter().flatten().cloned().collect();
        for tk in keys {
            if let Some(t) = state.triggers.get_mut(&tk) {
                t.header.state = t.header.state.paused();
            }
        }
    }

    pub async fn pause_job_group(&self, group: &str) {
        let mut state = self.state.write().await;
        let job_keys: Vec<JobKey> = state.jobs.keys().filter(|k| k.group() == group).cloned().collect();
        for jk in job_keys {
            let keys: Vec<TriggerKey> = state.triggers_by_job.get(&jk).into_iter().flatten().cloned().collect();
            for tk in keys {
                if let Some(t) = state.triggers.get_mut(&tk) {
                    t.header.state = t.header.state.paused();
                }
            }
        }
    }

    pub async fn pause_all(&self) {
        let mut state = self.state.write().await;
        state.pause_all = true;
        for t in state.triggers.values_mut() {
            t.header.state = t.header.state.paused();
        }
    }

    pub async fn resume_trigger(&self, key: &TriggerKey, now: DateTime<Utc>) {
        let mut state = self.state.write().await;
        let group_paused = state.pause_all || state.paused_trigger_groups.contains(key.group());
        if group_paused {
            return;
        }
        resume_one(&mut state, key, now);
    }

    pub async fn resume_group(&self, group: &str, now: DateTime<Utc>) {
        let mut state = self.state.write().await;
        state.paused_trigger_groups.remove(group);
        if state.pause_all {
            return;
        }
        let keys: Vec<TriggerKey> = state
            .triggers
            .keys()
            .filter(|k| k.group() == group)
            .cloned()
            .collect();
        for tk in keys {
            resume_one(&mut state, &tk, now);
        }
    }

    pub async fn resume_job(&self, key: &JobKey, now: DateTime<Utc>) {
        let mut state = self.state.write().await;
        let keys: Vec<TriggerKey> = state.triggers_by_job.get(key).into_iter().flatten().cloned().collect();
        for tk in keys {
            let group_paused = state.pause_all || state.paused_trigger_groups.contains(tk.group());
            if !group_paused {
                resume_one(&mut state, &tk, now);
            }
        }
    }

    pub async fn resume_job_group(&self, group: &str, now: DateTime<Utc>) {
        let mut state = self.state.write().await;
        let job_keys: Vec<JobKey> = state.jobs.keys().filter(|k| k.group() == group).cloned().collect();
        for jk in job_keys {
            let keys: Vec<TriggerKey> = state.triggers_by_job.get(&jk).into_iter().flatten().cloned().collect();
            for tk in keys {
                let group_paused = state.pause_all || state.paused_trigger_groups.contains(tk.group());
                if !group_paused {
                    resume_one(&mut state, &tk, now);
                }
            }
        }
    }

    pub async fn resume_all(&self, now: DateTime<Utc>) {
        let mut state = self.state.write().await;
        state.pause_all = false;
        let keys: Vec<TriggerKey> = state.triggers.keys().cloned().collect();
        for tk in keys {
            if state.paused_trigger_groups.contains(tk.group()) {
                continue;
            }
            resume_one(&mut state, &tk, now);
        }
    }

    /// Returns up to `max_count` due, normal-state, unacquired triggers
    /// ordered by `(next_fire_time, priority desc, key)`, atomically
    /// marking them acquired so no other caller can take them too.
    pub async fn acquire_next_triggers(&self, no_later_than: DateTime<Utc>, max_count: usize) -> Vec<Trigger> {
        let mut state = self.state.write().await;
        let mut due: Vec<TriggerKey> = state
            .triggers
            .iter()
            .filter(|(k, t)| {
                t.header.state.is_acquirable()
                    && !state.acquired.contains_key(*k)
                    && t.header.next_fire_time.is_some_and(|f| f <= no_later_than)
            })
            .map(|(k, _)| k.clone())
            .collect();

        due.sort_by(|a, b| {
            let ta = &state.triggers[a];
            let tb = &state.triggers[b];
            ta.header
                .next_fire_time
                .cmp(&tb.header.next_fire_time)
                .then_with(|| tb.header.priority.cmp(&ta.header.priority))
                .then_with(|| a.cmp(b))
        });
        due.truncate(max_count);

        let now = Utc::now();
        let mut acquired = Vec::with_capacity(due.len());
        for key in due {
            state.acquired.insert(key.clone(), now);
            if let Some(t) = state.triggers.get(&key) {
                acquired.push(t.clone());
            }
        }
        acquired
    }

    /// Releases an acquisition without firing — used when the loop aborts
    /// before reaching `trigger_fired` (e.g. on shutdown mid-batch).
    pub async fn release_trigger(&self, key: &TriggerKey) {
        self.state.write().await.acquired.remove(key);
    }

    /// Startup recovery pass: releases acquisitions older than `lease`,
    /// which can only mean the firing loop pass that took them crashed
    /// before reaching `trigger_fired`. Each released trigger is rewritten
    /// through the same misfire-instruction path a missed fire would take,
    /// so it picks up a sane next fire time instead of being reacquired
    /// immediately at its stale `next_fire_time`. Returns the rewritten
    /// triggers for listener notification.
    pub async fn recover_stale_acquisitions(&self, now: DateTime<Utc>, lease: chrono::Duration) -> Vec<Trigger> {
        let mut state = self.state.write().await;
        let stale: Vec<TriggerKey> = state
            .acquired
            .iter()
            .filter(|(_, acquired_at)| now.signed_duration_since(**acquired_at) > lease)
            .map(|(k, _)| k.clone())
            .collect();

        let mut recovered = Vec::with_capacity(stale.len());
        for key in stale {
            state.acquired.remove(&key);
            if let Some(t) = state.triggers.get_mut(&key) {
                tracing::warn!(
                    trigger = %key,
                    group = RECOVERING_JOBS_GROUP,
                    "releasing acquisition reservation left behind by a crashed firing loop pass"
                );
                t.update_after_misfire(now);
                if t.header.next_fire_time.is_none() && t.header.state == TriggerState::Normal {
                    t.header.state = TriggerState::Complete;
                }
                recovered.push(t.clone());
            }
        }
        recovered
    }

    /// Advances the trigger's fire-time bookkeeping and, if its job is
    /// stateful, marks it (and every other trigger of that job) `BLOCKED`.
    /// Returns the `FiredRecord` the firing loop hands to the worker and
    /// later back to `trigger_complete`.
    pub async fn trigger_fired(&self, key: &TriggerKey, actual_fire_time: DateTime<Utc>) -> Option<FiredRecord> {
        let mut state = self.state.write().await;
        state.acquired.remove(key);
        let trigger = state.triggers.get(key)?.clone();
        let scheduled_fire_time = trigger.header.next_fire_time?;
        let job_key = trigger.header.job_key.clone();
        let stateful = state.jobs.get(&job_key).map(|j| j.stateful).unwrap_or(false);

        if stateful && state.executing.contains_key(&job_key) {
            // Another firing of this job is already running; reject
            // acquisition — the caller should leave this trigger for the
            // next pass rather than double-fire a stateful job.
            return None;
        }

        let calendar = trigger
            .header
            .calendar_name
            .as_ref()
            .and_then(|name| state.calendars.get(name))
            .cloned();

        let record = FiredRecord {
            trigger_key: key.clone(),
            job_key: job_key.clone(),
            scheduled_fire_time,
            actual_fire_time,
            fire_instance_id: Uuid::new_v4(),
        };

        if let Some(t) = state.triggers.get_mut(key) {
            t.triggered(calendar.as_ref());
            if t.header.state == TriggerState::Normal {
                if stateful {
                    t.header.state = TriggerState::Blocked;
                } else if t.header.next_fire_time.is_none() {
                    t.header.state = TriggerState::Complete;
                }
            }
        }

        if stateful {
            let sibling_keys: Vec<TriggerKey> =
                state.triggers_by_job.get(&job_key).into_iter().flatten().cloned().collect();
            for sk in sibling_keys {
                if &sk == key {
                    continue;
                }
                if let Some(sibling) = state.triggers.get_mut(&sk) {
                    if sibling.header.state == TriggerState::Normal {
                        sibling.header.state = TriggerState::Blocked;
                    } else if sibling.header.state == TriggerState::Paused {
                        sibling.header.state = TriggerState::PausedBlocked;
                    }
                }
            }
            state.executing.insert(job_key, record.clone());
        }

        Some(record)
    }

    /// Called once the worker returns a result for `record`: unblocks any
    /// sibling triggers of a stateful job and applies the job-result
    /// instruction.
    pub async fn trigger_complete(&self, record: &FiredRecord, instruction: JobResultInstruction) {
        let mut state = self.state.write().await;
        state.executing.remove(&record.job_key);

        let stateful = state.jobs.get(&record.job_key).map(|j| j.stateful).unwrap_or(false);
        if stateful {
            let sibling_keys: Vec<TriggerKey> = state
                .triggers_by_job
                .get(&record.job_key)
                .into_iter()
                .flatten()
                .cloned()
                .collect();
            for sk in sibling_keys {
                if let Some(t) = state.triggers.get_mut(&sk) {
                    t.header.state = t.header.state.resumed();
                }
            }
        }

        match instruction {
            JobResultInstruction::Noop => {}
            JobResultInstruction::ReExecuteJob => {
                if let Some(t) = state.triggers.get_mut(&record.trigger_key) {
                    t.header.next_fire_time = Some(record.actual_fire_time);
                    if t.header.state != TriggerState::Blocked && t.header.state != TriggerState::PausedBlocked {
                        t.header.state = TriggerState::Normal;
                    }
                }
            }
            JobResultInstruction::DeleteTrigger => {
                drop(state);
                self.remove_trigger(&record.trigger_key).await;
            }
            JobResultInstruction::SetTriggerComplete => {
                if let Some(t) = state.triggers.get_mut(&record.trigger_key) {
                    t.header.state = TriggerState::Complete;
                }
            }
            JobResultInstruction::SetAllJobTriggersComplete => {
                let sibling_keys: Vec<TriggerKey> = state
                    .triggers_by_job
                    .get(&record.job_key)
                    .into_iter()
                    .flatten()
                    .cloned()
                    .collect();
                for sk in sibling_keys {
                    if let Some(t) = state.triggers.get_mut(&sk) {
                        t.header.state = TriggerState::Complete;
                    }
                }
            }
        }
    }

    pub async fn get_currently_executing_jobs(&self) -> Vec<JobDetail> {
        let state = self.state.read().await;
        state
            .executing
            .keys()
            .filter_map(|k| state.jobs.get(k).cloned())
            .collect()
    }

    /// Scans for NORMAL triggers overdue by more than `threshold`,
    /// applying each one's misfire instruction and returning the
    /// (now-updated) triggers for listener notification. Triggers
    /// currently acquired are skipped — the acquiring pass already has a
    /// more current view of them.
    pub async fn scan_and_handle_misfires(&self, now: DateTime<Utc>, threshold: chrono::Duration) -> Vec<Trigger> {
        let mut state = self.state.write().await;
        let overdue: Vec<TriggerKey> = state
            .triggers
            .iter()
            .filter(|(k, t)| {
                t.header.state == TriggerState::Normal
                    && !state.acquired.contains_key(*k)
                    && t.header.next_fire_time.is_some_and(|f| f + threshold < now)
            })
            .map(|(k, _)| k.clone())
            .collect();

        let mut misfired = Vec::with_capacity(overdue.len());
        for key in overdue {
            if let Some(t) = state.triggers.get_mut(&key) {
                t.update_after_misfire(now);
                if t.header.next_fire_time.is_none() {
                    t.header.state = TriggerState::Complete;
                }
                misfired.push(t.clone());
            }
        }
        misfired
    }
}

fn resume_one(state: &mut State, key: &TriggerKey, now: DateTime<Utc>) {
    if let Some(t) = state.triggers.get_mut(key) {
        t.header.state = t.header.state.resumed();
        if let Some(next) = t.header.next_fire_time {
            if next < now {
                t.update_after_misfire(now);
            }
        }
    }
}

impl Default for JobStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scheduler_core::{Key, MisfireInstruction};
    use scheduler_core::trigger::RepeatCount;

    fn job(name: &str) -> JobDetail {
        JobDetail::new(Key::with_default_group(name), "demo::Job")
    }

    fn simple_trigger(name: &str, job_name: &str, start: DateTime<Utc>) -> Trigger {
        Trigger::new_simple(
            Key::with_default_group(name),
            Key::with_default_group(job_name),
            start,
            None,
            RepeatCount::Indefinite,
            chrono::Duration::seconds(1),
            MisfireInstruction::SmartPolicy,
        )
        .unwrap()
    }

    #[tokio::test]
    async fn store_trigger_rejects_missing_job() {
        let store = JobStore::new();
        let result = store
            .store_trigger(simple_trigger("t1", "missing", Utc::now()), false)
            .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn store_job_rejects_duplicate_without_replace() {
        let store = JobStore::new();
        store.store_job(job("j1"), false).await.unwrap();
        let result = store.store_job(job("j1"), false).await;
        assert!(result.is_err());
        store.store_job(job("j1"), true).await.unwrap();
    }

    #[tokio::test]
    async fn remove_job_removes_its_triggers() {
        let store = JobStore::new();
        store.store_job(job("j1"), false).await.unwrap();
        store.store_trigger(simple_trigger("t1", "j1", Utc::now()), false).await.unwrap();
        assert!(store.remove_job(&Key::with_default_group("j1")).await);
        assert!(store.get_trigger(&Key::with_default_group("t1")).await.is_none());
    }

    #[tokio::test]
    async fn remove_trigger_removes_orphaned_non_durable_job() {
        let store = JobStore::new();
        store.store_job(job("j1"), false).await.unwrap();
        store.store_trigger(simple_trigger("t1", "j1", Utc::now()), false).await.unwrap();
        store.remove_trigger(&Key::with_default_group("t1")).await;
        assert!(store.get_job_detail(&Key::with_default_group("j1")).await.is_none());
    }

    #[tokio::test]
    async fn remove_trigger_keeps_durable_job() {
        let store = JobStore::new();
        store.store_job(job("j1").durable(true), false).await.unwrap();
        store.store_trigger(simple_trigger("t1", "j1", Utc::now()), false).await.unwrap();
        store.remove_trigger(&Key::with_default_group("t1")).await;
        assert!(store.get_job_detail(&Key::with_default_group("j1")).await.is_some());
    }

    #[tokio::test]
    async fn acquire_next_triggers_is_ordered_and_exclusive() {
        let store = JobStore::new();
        store.store_job(job("j1"), false).await.unwrap();
        let now = Utc::now();
        store
            .store_trigger(simple_trigger("late", "j1", now + chrono::Duration::seconds(5)), false)
            .await
            .unwrap();
        store.store_trigger(simple_trigger("early", "j1", now), false).await.unwrap();

        let acquired = store.acquire_next_triggers(now + chrono::Duration::seconds(10), 10).await;
        assert_eq!(acquired.len(), 2);
        assert_eq!(acquired[0].header.key.name(), "early");

        // A second acquisition call must not see already-acquired triggers.
        let again = store.acquire_next_triggers(now + chrono::Duration::seconds(10), 10).await;
        assert!(again.is_empty());
    }

    #[tokio::test]
    async fn pause_group_marks_future_insertions_paused() {
        let store = JobStore::new();
        store.pause_group("nightly").await;
        store.store_job(job("j1"), false).await.unwrap();
        store
            .store_trigger(
                Trigger::new_simple(
                    Key::new("t1", "nightly"),
                    Key::with_default_group("j1"),
                    Utc::now(),
                    None,
                    RepeatCount::Indefinite,
                    chrono::Duration::seconds(1),
                    MisfireInstruction::SmartPolicy,
                )
                .unwrap(),
                false,
            )
            .await
            .unwrap();
        assert_eq!(
            store.get_trigger_state(&Key::new("t1", "nightly")).await,
            TriggerState::Paused
        );
    }

    #[tokio::test]
    async fn stateful_job_blocks_sibling_trigger_until_complete() {
        let store = JobStore::new();
        store.store_job(job("j1").stateful(true), false).await.unwrap();
        let now = Utc::now();
        store.store_trigger(simple_trigger("t1", "j1", now), false).await.unwrap();
        store.store_trigger(simple_trigger("t2", "j1", now), false).await.unwrap();

        let acquired = store.acquire_next_triggers(now, 10).await;
        let first = &acquired[0];
        let record = store.trigger_fired(&first.header.key, now).await.unwrap();

        let other_key = if first.header.key.name() == "t1" {
            Key::with_default_group("t2")
        } else {
            Key::with_default_group("t1")
        };
        assert_eq!(store.get_trigger_state(&other_key).await, TriggerState::Blocked);

        store
            .trigger_complete(&record, JobResultInstruction::Noop)
            .await;
        assert_eq!(store.get_trigger_state(&other_key).await, TriggerState::Normal);
    }

    #[tokio::test]
    async fn resume_all_respects_independently_paused_groups() {
        let store = JobStore::new();
        store.store_job(job("j1"), false).await.unwrap();
        store
            .store_trigger(
                Trigger::new_simple(
                    Key::new("t1", "special"),
                    Key::with_default_group("j1"),
                    Utc::now(),
                    None,
                    RepeatCount::Indefinite,
                    chrono::Duration::seconds(1),
                    MisfireInstruction::SmartPolicy,
                )
                .unwrap(),
                false,
            )
            .await
            .unwrap();
        store.pause_group("special").await;
        store.pause_all().await;
        store.resume_all(Utc::now()).await;
        assert_eq!(
            store.get_trigger_state(&Key::new("t1", "special")).await,
            TriggerState::Paused
        );
    }

    #[tokio::test]
    async fn recover_stale_acquisitions_releases_and_rewrites() {
        let store = JobStore::new();
        store.store_job(job("j1"), false).await.unwrap();
        let start = Utc::now() - chrono::Duration::minutes(10);
        store.store_trigger(simple_trigger("t1", "j1", start), false).await.unwrap();

        // Simulate a loop pass that acquired the trigger and then crashed
        // before reaching `trigger_fired`.
        let acquired = store.acquire_next_triggers(start, 10).await;
        assert_eq!(acquired.len(), 1);

        let now = Utc::now();
        // Not yet past the lease: nothing recovered.
        let recovered = store.recover_stale_acquisitions(now, chrono::Duration::hours(1)).await;
        assert!(recovered.is_empty());

        // Past the lease: the reservation is released and the trigger is
        // reacquirable again with a rewritten next fire time.
        let recovered = store.recover_stale_acquisitions(now, chrono::Duration::zero()).await;
        assert_eq!(recovered.len(), 1);
        assert!(recovered[0].header.next_fire_time.unwrap() > start);

        let again = store.acquire_next_triggers(now, 10).await;
        assert_eq!(again.len(), 1);
    }
}
