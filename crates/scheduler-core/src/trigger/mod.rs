//! The trigger state machine: shared scheduling metadata (a
//! [`TriggerHeader`]) paired with one of a closed set of recurrence
//! variants ([`Trigger`]).

mod cron_trigger;
mod simple;
mod state;

pub use cron_trigger::CronTrigger;
pub use simple::{RepeatCount, SimpleTrigger};
pub use state::TriggerState;

use crate::calendar::Calendar;
use crate::cron::CronExpression;
use crate::error::{SchedulerError, SchedulerResult};
use crate::key::{JobKey, TriggerKey};
use crate::misfire::MisfireInstruction;
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

/// Scheduling metadata common to every trigger variant, independent of how
/// its next fire time is computed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TriggerHeader {
    pub key: TriggerKey,
    pub job_key: JobKey,
    pub description: Option<String>,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub previous_fire_time: Option<DateTime<Utc>>,
    pub next_fire_time: Option<DateTime<Utc>>,
    /// Name of a registered [`Calendar`] this trigger's fire times must
    /// respect, if any.
    pub calendar_name: Option<String>,
    pub misfire_instruction: MisfireInstruction,
    /// Higher fires first when multiple triggers are due at the same
    /// instant. Default 5, matching Quartz.
    pub priority: i32,
    pub state: TriggerState,
}

/// The recurrence rule driving a trigger: one of a closed set of variants.
/// Represented as a tagged enum (not a trait object) because the set is
/// closed and each variant's misfire handling differs in ways that are
/// easiest to express with an exhaustive match.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum TriggerKind {
    Simple(SimpleTrigger),
    Cron(CronTrigger),
}

/// A trigger: scheduling metadata plus a recurrence rule.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Trigger {
    pub header: TriggerHeader,
    pub kind: TriggerKind,
}

const DEFAULT_PRIORITY: i32 = 5;

impl Trigger {
    /// Build a trigger around a fixed-interval recurrence. Validates that
    /// `end_time` (if given) does not precede `start_time`, that the
    /// misfire instruction is one `SimpleTrigger` accepts, and computes the
    /// initial `next_fire_time`.
    pub fn new_simple(
        key: TriggerKey,
        job_key: JobKey,
        start_time: DateTime<Utc>,
        end_time: Option<DateTime<Utc>>,
        repeat_count: RepeatCount,
        repeat_interval: chrono::Duration,
        misfire_instruction: MisfireInstruction,
    ) -> SchedulerResult<Self> {
        validate_time_bounds(start_time, end_time)?;
        misfire_instruction.validate_for_simple()?;
        if !matches!(repeat_count, RepeatCount::Finite(0)) && repeat_interval <= chrono::Duration::zero() {
            return Err(SchedulerError::InvalidConfiguration(
                "repeat_interval must be positive when repeat_count is nonzero".to_string(),
            ));
        }

        let simple = SimpleTrigger::new(repeat_count, repeat_interval);
        let next_fire_time = simple.next_fire_time_after(start_time, end_time, start_time - chrono::Duration::seconds(1));

        Ok(Self {
            header: TriggerHeader {
                key,
                job_key,
                description: None,
                start_time,
                end_time,
                previous_fire_time: None,
                next_fire_time,
                calendar_name: None,
                misfire_instruction,
                priority: DEFAULT_PRIORITY,
                state: TriggerState::Normal,
            },
            kind: TriggerKind::Simple(simple),
        })
    }

    /// Build a trigger around a parsed cron expression.
    pub fn new_cron(
        key: TriggerKey,
        job_key: JobKey,
        expression: CronExpression,
        timezone: Tz,
        start_time: DateTime<Utc>,
        end_time: Option<DateTime<Utc>>,
        misfire_instruction: MisfireInstruction,
    ) -> SchedulerResult<Self> {
        validate_time_bounds(start_time, end_time)?;
        misfire_instruction.validate_for_cron()?;

        let cron = CronTrigger::new(expression, timezone);
        let next_fire_time = cron.next_fire_time_after(end_time, start_time - chrono::Duration::seconds(1));

        Ok(Self {
            header: TriggerHeader {
                key,
                job_key,
                description: None,
                start_time,
                end_time,
                previous_fire_time: None,
                next_fire_time,
                calendar_name: None,
                misfire_instruction,
                priority: DEFAULT_PRIORITY,
                state: TriggerState::Normal,
            },
            kind: TriggerKind::Cron(cron),
        })
    }

    /// The smallest fire time strictly after `after`, bounded by this
    /// trigger's start/end window.
    pub fn get_next_fire_time_after(&self, after: DateTime<Utc>) -> Option<DateTime<Utc>> {
        match &self.kind {
            TriggerKind::Simple(s) => s.next_fire_time_after(self.header.start_time, self.header.end_time, after),
            TriggerKind::Cron(c) => c.next_fire_time_after(self.header.end_time, after),
        }
    }

    /// The last instant this trigger will ever fire, or `None` if it
    /// repeats indefinitely (true for every cron trigger, and for a simple
    /// trigger with `RepeatCount::Indefinite`).
    pub fn get_final_fire_time(&self) -> Option<DateTime<Utc>> {
        match &self.kind {
            TriggerKind::Simple(s) => s.final_fire_time(self.header.start_time, self.header.end_time),
            TriggerKind::Cron(_) => None,
        }
    }

    /// Whether this trigger can still produce a fire time, given a
    /// calendar it must respect. Consults `next_fire_time`, advancing past
    /// any instants the calendar excludes.
    pub fn may_fire_again(&self, calendar: Option<&Calendar>) -> bool {
        self.next_fire_time_respecting(calendar).is_some()
    }

    /// Re-derive `next_fire_time` against a (possibly updated) calendar,
    /// skipping past any now-excluded instant. Used when a calendar is
    /// replaced with `update_triggers = true`.
    pub fn apply_calendar(&mut self, calendar: Option<&Calendar>) {
        self.header.next_fire_time = self.next_fire_time_respecting(calendar);
        if self.header.next_fire_time.is_none() && self.header.state == TriggerState::Normal {
            self.header.state = TriggerState::Complete;
        }
    }

    fn next_fire_time_respecting(&self, calendar: Option<&Calendar>) -> Option<DateTime<Utc>> {
        let mut candidate = self.header.next_fire_time;
        loop {
            let c = candidate?;
            match calendar {
                Some(cal) if !cal.is_time_included(c) => {
                    candidate = self.get_next_fire_time_after(c);
                }
                _ => return Some(c),
            }
        }
    }

    /// Record that this trigger fired, advancing its internal state and
    /// computing the next fire time (skipping any instants excluded by
    /// `calendar`).
    pub fn triggered(&mut self, calendar: Option<&Calendar>) {
        if let TriggerKind::Simple(s) = &mut self.kind {
            s.times_triggered += 1;
        }
        self.header.previous_fire_time = self.header.next_fire_time;
        let mut candidate = self.header.next_fire_time.and_then(|t| self.get_next_fire_time_after(t));
        if let Some(cal) = calendar {
            while let Some(c) = candidate {
                if cal.is_time_included(c) {
                    break;
                }
                candidate = self.get_next_fire_time_after(c);
            }
        }
        self.header.next_fire_time = candidate;
        if self.header.next_fire_time.is_none() && self.header.state == TriggerState::Normal {
            self.header.state = TriggerState::Complete;
        }
    }

    /// Apply misfire handling: resolve `SmartPolicy` to a concrete,
    /// variant-appropriate instruction, then recompute `next_fire_time`.
    pub fn update_after_misfire(&mut self, now: DateTime<Utc>) {
        let resolved = self.resolve_misfire_instruction();
        let missed = self.header.next_fire_time;

        match (&mut self.kind, resolved) {
            (_, MisfireInstruction::IgnoreMisfirePolicy) => {}
            (TriggerKind::Simple(_), MisfireInstruction::FireNow)
            | (TriggerKind::Cron(_), MisfireInstruction::FireOnceNow) => {
                self.header.next_fire_time = Some(now);
            }
            (_, MisfireInstruction::DoNothing) => {
                self.header.next_fire_time = self.get_next_fire_time_after(now);
            }
            (TriggerKind::Simple(_), MisfireInstruction::RescheduleNowWithExistingCount) => {
                self.header.next_fire_time = Some(now);
            }
            (TriggerKind::Simple(_), MisfireInstruction::RescheduleNextWithExistingCount) => {
                self.header.next_fire_time = self.get_next_fire_time_after(now);
            }
            (TriggerKind::Simple(s), MisfireInstruction::RescheduleNextWithRemainingCount) => {
                if let (Some(missed), RepeatCount::Finite(n)) = (missed, &mut s.repeat_count) {
                    let skipped = s.fires_skipped(missed, now);
                    *n = n.saturating_sub(skipped);
                }
                self.header.next_fire_time = self.get_next_fire_time_after(now);
            }
            (kind, instruction) => {
                unreachable!("{instruction:?} is not valid for {kind:?}, validated at construction")
            }
        }
    }

    fn resolve_misfire_instruction(&self) -> MisfireInstruction {
        if self.header.misfire_instruction != MisfireInstruction::SmartPolicy {
            return self.header.misfire_instruction;
        }
        match &self.kind {
            TriggerKind::Cron(_) => MisfireInstruction::FireOnceNow,
            TriggerKind::Simple(s) => match s.repeat_count {
                RepeatCount::Finite(0) => MisfireInstruction::FireNow,
                RepeatCount::Indefinite => MisfireInstruction::RescheduleNextWithRemainingCount,
                RepeatCount::Finite(_) => MisfireInstruction::RescheduleNowWithExistingCount,
            },
        }
    }
}

fn validate_time_bounds(start: DateTime<Utc>, end: Option<DateTime<Utc>>) -> SchedulerResult<()> {
    if let Some(end) = end {
        if end < start {
            return Err(SchedulerError::InvalidConfiguration(
                "end_time cannot precede start_time".to_string(),
            ));
        }
    }
    Ok(())
}
