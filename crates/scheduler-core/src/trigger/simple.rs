use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// How many times a [`SimpleTrigger`] repeats after its first fire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RepeatCount {
    /// Fires `n` additional times after the first.
    Finite(u32),
    /// Repeats forever (until paused, removed, or its end time passes).
    Indefinite,
}

/// Fixed-interval recurrence: fires at `start`, `start + interval`,
/// `start + 2*interval`, ... up to `repeat_count` additional times or
/// `end_time`, whichever comes first.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimpleTrigger {
    pub(crate) repeat_count: RepeatCount,
    pub(crate) repeat_interval: Duration,
    pub(crate) times_triggered: u32,
}

impl SimpleTrigger {
    pub(crate) fn new(repeat_count: RepeatCount, repeat_interval: Duration) -> Self {
        Self {
            repeat_count,
            repeat_interval,
            times_triggered: 0,
        }
    }

    /// Fires once at `start_time` only.
    pub fn once() -> Self {
        Self::new(RepeatCount::Finite(0), Duration::zero())
    }

    fn nth_fire_time(&self, start: DateTime<Utc>, end: Option<DateTime<Utc>>, n: u32) -> Option<DateTime<Utc>> {
        if let RepeatCount::Finite(max) = self.repeat_count {
            if n > max {
                return None;
            }
        }
        let offset = self.repeat_interval.checked_mul(n as i32)?;
        let t = start.checked_add_signed(offset)?;
        if let Some(end) = end {
            if t > end {
                return None;
            }
        }
        Some(t)
    }

    pub(crate) fn next_fire_time_after(
        &self,
        start: DateTime<Utc>,
        end: Option<DateTime<Utc>>,
        after: DateTime<Utc>,
    ) -> Option<DateTime<Utc>> {
        if after < start {
            return self.nth_fire_time(start, end, 0);
        }
        if self.repeat_interval <= Duration::zero() {
            return None;
        }
        let interval_ms = self.repeat_interval.num_milliseconds().max(1);
        let elapsed_ms = (after - start).num_milliseconds();
        let n = (elapsed_ms / interval_ms + 1).max(0) as u32;
        self.nth_fire_time(start, end, n)
    }

    pub(crate) fn final_fire_time(&self, start: DateTime<Utc>, end: Option<DateTime<Utc>>) -> Option<DateTime<Utc>> {
        match self.repeat_count {
            RepeatCount::Finite(n) => self.nth_fire_time(start, end, n),
            RepeatCount::Indefinite => None,
        }
    }

    /// Number of scheduled fires in `(missed, now]`, used by
    /// `RESCHEDULE_NEXT_WITH_REMAINING_COUNT` to decrement the remaining
    /// repeat count by the number of fires a misfire skipped.
    pub(crate) fn fires_skipped(&self, missed: DateTime<Utc>, now: DateTime<Utc>) -> u32 {
        if self.repeat_interval <= Duration::zero() || now <= missed {
            return 0;
        }
        let interval_ms = self.repeat_interval.num_milliseconds().max(1);
        ((now - missed).num_milliseconds() / interval_ms + 1).max(0) as u32
    }
}
