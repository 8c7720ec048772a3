use chrono::{DateTime, Datelike, NaiveTime, Utc, Weekday};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet};

/// An inclusion predicate over instants, used to skip fire times that fall
/// on holidays or within blackout windows.
///
/// Calendars chain: a trigger consults its own calendar, which may in turn
/// delegate to a `next` calendar, matching Quartz's `Calendar.getBaseCalendar`
/// chaining. A time is included only if every calendar in the chain
/// includes it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Calendar {
    base: BaseCalendar,
    next: Option<Box<Calendar>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
enum BaseCalendar {
    AlwaysInclude,
    DailyBlackout { start: NaiveTime, end: NaiveTime },
    ExcludedDates(BTreeSet<chrono::NaiveDate>),
    ExcludedWeekdays(HashSet<u8>),
}

impl Calendar {
    /// A calendar that excludes nothing.
    pub fn always_include() -> Self {
        Self {
            base: BaseCalendar::AlwaysInclude,
            next: None,
        }
    }

    /// Exclude a daily time-of-day window (e.g. a nightly maintenance
    /// blackout), in the instant's own UTC civil time.
    pub fn daily_blackout(start: NaiveTime, end: NaiveTime) -> Self {
        Self {
            base: BaseCalendar::DailyBlackout { start, end },
            next: None,
        }
    }

    /// Exclude a fixed set of calendar dates (holidays).
    pub fn excluded_dates(dates: impl IntoIterator<Item = chrono::NaiveDate>) -> Self {
        Self {
            base: BaseCalendar::ExcludedDates(dates.into_iter().collect()),
            next: None,
        }
    }

    /// Exclude weekends or other recurring weekdays.
    pub fn excluded_weekdays(days: impl IntoIterator<Item = Weekday>) -> Self {
        Self {
            base: BaseCalendar::ExcludedWeekdays(
                days.into_iter().map(|d| d.num_days_from_sunday() as u8).collect(),
            ),
            next: None,
        }
    }

    /// Chain another calendar underneath this one.
    pub fn chained_to(mut self, next: Calendar) -> Self {
        self.next = Some(Box::new(next));
        self
    }

    /// Whether `time` is included by this calendar and every calendar it
    /// chains to.
    pub fn is_time_included(&self, time: DateTime<Utc>) -> bool {
        let included = match &self.base {
            BaseCalendar::AlwaysInclude => true,
            BaseCalendar::DailyBlackout { start, end } => {
                let tod = time.time();
                !(tod >= *start && tod <= *end)
            }
            BaseCalendar::ExcludedDates(dates) => !dates.contains(&time.date_naive()),
            BaseCalendar::ExcludedWeekdays(days) => {
                !days.contains(&(time.weekday().num_days_from_sunday() as u8))
            }
        };
        included && self.next.as_ref().map_or(true, |n| n.is_time_included(time))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn always_include_includes_everything() {
        let cal = Calendar::always_include();
        assert!(cal.is_time_included(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()));
    }

    #[test]
    fn daily_blackout_excludes_window() {
        let cal = Calendar::daily_blackout(
            NaiveTime::from_hms_opt(2, 0, 0).unwrap(),
            NaiveTime::from_hms_opt(4, 0, 0).unwrap(),
        );
        assert!(!cal.is_time_included(Utc.with_ymd_and_hms(2024, 1, 1, 3, 0, 0).unwrap()));
        assert!(cal.is_time_included(Utc.with_ymd_and_hms(2024, 1, 1, 5, 0, 0).unwrap()));
    }

    #[test]
    fn excluded_dates_blocks_holiday() {
        let holiday = chrono::NaiveDate::from_ymd_opt(2024, 12, 25).unwrap();
        let cal = Calendar::excluded_dates([holiday]);
        assert!(!cal.is_time_included(Utc.with_ymd_and_hms(2024, 12, 25, 9, 0, 0).unwrap()));
        assert!(cal.is_time_included(Utc.with_ymd_and_hms(2024, 12, 26, 9, 0, 0).unwrap()));
    }

    #[test]
    fn chained_calendars_require_all_to_include() {
        let weekends = Calendar::excluded_weekdays([Weekday::Sat, Weekday::Sun]);
        let holiday = chrono::NaiveDate::from_ymd_opt(2024, 7, 4).unwrap();
        let holidays = Calendar::excluded_dates([holiday]).chained_to(weekends);

        // July 4, 2024 is a Thursday: excluded by the holiday calendar.
        assert!(!holidays.is_time_included(Utc.with_ymd_and_hms(2024, 7, 4, 9, 0, 0).unwrap()));
        // July 6, 2024 is a Saturday: excluded by the chained weekend calendar.
        assert!(!holidays.is_time_included(Utc.with_ymd_and_hms(2024, 7, 6, 9, 0, 0).unwrap()));
        // July 5, 2024 is a Friday: included by both.
        assert!(holidays.is_time_included(Utc.with_ymd_and_hms(2024, 7, 5, 9, 0, 0).unwrap()));
    }
}
