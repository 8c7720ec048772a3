use crate::cron::CronExpression;
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

/// Recurrence driven by a parsed cron expression, evaluated in a fixed
/// time zone.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CronTrigger {
    #[serde(with = "cron_expr_serde")]
    pub(crate) expression: CronExpression,
    pub(crate) timezone: Tz,
}

impl CronTrigger {
    pub(crate) fn new(expression: CronExpression, timezone: Tz) -> Self {
        Self { expression, timezone }
    }

    /// The cron expression driving this trigger.
    pub fn expression(&self) -> &CronExpression {
        &self.expression
    }

    /// The time zone fire times are computed in.
    pub fn timezone(&self) -> Tz {
        self.timezone
    }

    pub(crate) fn next_fire_time_after(
        &self,
        end: Option<DateTime<Utc>>,
        after: DateTime<Utc>,
    ) -> Option<DateTime<Utc>> {
        let candidate = self.expression.next_after(after, self.timezone)?.with_timezone(&Utc);
        match end {
            Some(end) if candidate > end => None,
            _ => Some(candidate),
        }
    }
}

/// Cron expressions aren't naturally `Serialize`; persist the source string
/// and timezone-aware parse result instead.
mod cron_expr_serde {
    use super::CronExpression;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S: Serializer>(expr: &CronExpression, s: S) -> Result<S::Ok, S::Error> {
        expr.as_str().serialize(s)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<CronExpression, D::Error> {
        let raw = String::deserialize(d)?;
        CronExpression::parse(&raw).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn final_fire_time_is_unbounded_without_end() {
        let expr = CronExpression::parse("0 0 12 * * ?").unwrap();
        let trigger = CronTrigger::new(expr, Tz::UTC);
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        assert!(trigger.next_fire_time_after(None, start).is_some());
    }

    #[test]
    fn end_time_bounds_cron_recurrence() {
        let expr = CronExpression::parse("0 0 12 * * ?").unwrap();
        let trigger = CronTrigger::new(expr, Tz::UTC);
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2024, 1, 1, 6, 0, 0).unwrap();
        assert!(trigger.next_fire_time_after(Some(end), start).is_none());
    }
}
