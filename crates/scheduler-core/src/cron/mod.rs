//! Cron expression parsing and next-fire-time computation.
//!
//! A [`CronExpression`] is parsed once (errors surface at that point, never
//! at fire time) and then repeatedly asked for [`CronExpression::next_after`]
//! — the smallest instant strictly after a given one that matches the
//! expression, evaluated in a caller-supplied time zone.

mod fields;
mod parse;

use chrono::{DateTime, Datelike, LocalResult, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Timelike};
use chrono_tz::Tz;
use fields::{DomField, DowField};
use parse::{month_names, parse_numeric_field};
use std::collections::BTreeSet;

pub use parse::CronParseError;

/// The last year a cron expression is allowed to match, per spec's year
/// field range (1970-2099). `next_after` returns `None` once it would have
/// to search past this year.
pub const MAX_YEAR: i32 = 2099;
const MIN_YEAR: i32 = 1970;

/// A parsed seven-field cron expression: seconds, minutes, hours,
/// day-of-month, month, day-of-week, and an optional year.
#[derive(Debug, Clone)]
pub struct CronExpression {
    raw: String,
    seconds: BTreeSet<u32>,
    minutes: BTreeSet<u32>,
    hours: BTreeSet<u32>,
    dom: DomField,
    months: BTreeSet<u32>,
    dow: DowField,
    years: Option<BTreeSet<u32>>,
}

impl CronExpression {
    /// Parse the canonical "seconds minutes hours day-of-month month
    /// day-of-week [year]" form.
    pub fn parse(expr: &str) -> Result<Self, CronParseError> {
        let tokens: Vec<&str> = expr.split_whitespace().collect();
        if tokens.len() != 6 && tokens.len() != 7 {
            return Err(CronParseError {
                position: 0,
                message: format!(
                    "expected 6 or 7 fields, found {} in '{expr}'",
                    tokens.len()
                ),
            });
        }

        let seconds = parse_numeric_field(tokens[0], 0, 0, 59, None)?;
        let minutes = parse_numeric_field(tokens[1], 1, 0, 59, None)?;
        let hours = parse_numeric_field(tokens[2], 2, 0, 23, None)?;
        let dom = DomField::parse(tokens[3])?;
        let months = parse_numeric_field(tokens[4], 4, 1, 12, Some(month_names()))?;
        let dow = DowField::parse(tokens[5])?;
        let years = match tokens.get(6) {
            Some(tok) => Some(parse_numeric_field(tok, 6, MIN_YEAR as u32, MAX_YEAR as u32, None)?),
            None => None,
        };

        if dom.is_unspecified() && dow.is_unspecified() {
            return Err(CronParseError {
                position: 3,
                message: "day-of-month and day-of-week cannot both be '?'".to_string(),
            });
        }

        Ok(Self {
            raw: expr.to_string(),
            seconds,
            minutes,
            hours,
            dom,
            months,
            dow,
            years,
        })
    }

    /// The original expression string.
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Whether `date` satisfies the day-of-month and day-of-week fields.
    ///
    /// Per the core's resolved Open Question: when both fields are
    /// concretely specified (neither is `?`), a date must satisfy BOTH —
    /// the two sets intersect rather than union.
    fn day_matches(&self, date: NaiveDate) -> bool {
        match (self.dom.is_unspecified(), self.dow.is_unspecified()) {
            (true, false) => self.dow.matches(date),
            (false, true) => self.dom.matches(date),
            (false, false) => self.dom.matches(date) && self.dow.matches(date),
            (true, true) => unreachable!("parse rejects both fields unspecified"),
        }
    }

    fn year_allowed(&self, year: i32) -> bool {
        match &self.years {
            Some(set) => set.contains(&(year as u32)),
            None => (MIN_YEAR..=MAX_YEAR).contains(&year),
        }
    }

    /// The smallest instant strictly after `after`, expressed in `tz`, that
    /// matches this expression — or `None` if no such instant exists before
    /// the expression's year bound is exhausted.
    pub fn next_after(&self, after: DateTime<chrono::Utc>, tz: Tz) -> Option<DateTime<Tz>> {
        let local_after = after.with_timezone(&tz);
        let start = local_after
            .naive_local()
            .with_nanosecond(0)
            .unwrap_or(local_after.naive_local())
            + chrono::Duration::seconds(1);

        let mut date = start.date();
        let mut floor_time = Some(start.time());

        loop {
            if date.year() > MAX_YEAR {
                tracing::debug!(expr = %self.raw, "cron recurrence exhausted the supported year range");
                return None;
            }
            if !self.year_allowed(date.year()) {
                date = match self.next_allowed_year_start(date.year()) {
                    Some(d) => d,
                    None => return None,
                };
                floor_time = None;
                continue;
            }
            if !self.months.contains(&date.month()) {
                date = self.advance_to_next_month(date);
                floor_time = None;
                continue;
            }
            if !self.day_matches(date) {
                date = date.succ_opt()?;
                floor_time = None;
                continue;
            }

            let floor = floor_time.unwrap_or(NaiveTime::MIN);
            match self.next_time_of_day(floor) {
                Some(time) => {
                    let naive = NaiveDateTime::new(date, time);
                    match self.resolve_local(naive, tz) {
                        Some(resolved) => return Some(resolved),
                        None => {
                            date = date.succ_opt()?;
                            floor_time = None;
                        }
                    }
                }
                None => {
                    date = date.succ_opt()?;
                    floor_time = None;
                }
            }
        }
    }

    /// Resolve a naive local datetime to a concrete `DateTime<Tz>`,
    /// applying the DST gap/overlap rule from the core's time zone
    /// semantics: a gap advances to the next existing instant, an overlap
    /// picks the earlier occurrence.
    fn resolve_local(&self, naive: NaiveDateTime, tz: Tz) -> Option<DateTime<Tz>> {
        match tz.from_local_datetime(&naive) {
            LocalResult::Single(dt) => Some(dt),
            LocalResult::Ambiguous(earliest, _latest) => Some(earliest),
            LocalResult::None => {
                // Gap: no such local time exists. Advance second-by-second
                // (bounded — DST shifts are at most a couple of hours)
                // until a concrete local time resolves.
                let mut candidate = naive;
                for _ in 0..4 * 60 * 60 {
                    candidate += chrono::Duration::seconds(1);
                    if let LocalResult::Single(dt) = tz.from_local_datetime(&candidate) {
                        return Some(dt);
                    }
                }
                None
            }
        }
    }

    fn next_time_of_day(&self, floor: NaiveTime) -> Option<NaiveTime> {
        let floor_h = floor.hour();
        let floor_m = floor.minute();
        let floor_s = floor.second();

        for &h in self.hours.range(floor_h..) {
            let (min_m, min_s) = if h == floor_h {
                (floor_m, floor_s)
            } else {
                (0, 0)
            };
            for &m in self.minutes.range(min_m..) {
                let min_s = if m == min_m { min_s } else { 0 };
                if let Some(&s) = self.seconds.range(min_s..).next() {
                    return NaiveTime::from_hms_opt(h, m, s);
                }
            }
        }
        None
    }

    fn next_allowed_year_start(&self, current_year: i32) -> Option<NaiveDate> {
        let next_year = match &self.years {
            Some(set) => *set.iter().find(|&&y| y as i32 > current_year)?,
            None => {
                let candidate = current_year + 1;
                if candidate > MAX_YEAR {
                    return None;
                }
                candidate as u32
            }
        };
        NaiveDate::from_ymd_opt(next_year as i32, 1, 1)
    }

    fn advance_to_next_month(&self, date: NaiveDate) -> NaiveDate {
        let mut year = date.year();
        let mut month = date.month();
        if let Some(&next) = self.months.range(month + 1..).next() {
            month = next;
        } else {
            year += 1;
            month = *self.months.iter().next().expect("non-empty month set");
        }
        NaiveDate::from_ymd_opt(year, month, 1).unwrap_or(date)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn utc(y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32) -> DateTime<chrono::Utc> {
        Utc.with_ymd_and_hms(y, mo, d, h, mi, s).unwrap()
    }

    #[test]
    fn scenario_a_weekday_business_hours() {
        let expr = CronExpression::parse("0 15 10 ? * MON-FRI").unwrap();
        let start = utc(2024, 1, 1, 0, 0, 0);
        let mut t = start;
        let expected_days = [1, 2, 3, 4, 5, 8];
        for &day in &expected_days {
            let next = expr.next_after(t, Tz::UTC).unwrap();
            assert_eq!(next.year(), 2024);
            assert_eq!(next.month(), 1);
            assert_eq!(next.day(), day);
            assert_eq!((next.hour(), next.minute(), next.second()), (10, 15, 0));
            t = next.with_timezone(&Utc);
        }
    }

    #[test]
    fn scenario_b_last_friday_of_month() {
        let expr = CronExpression::parse("0 15 10 ? * 6L").unwrap();
        let start = utc(2024, 1, 1, 0, 0, 0);
        let first = expr.next_after(start, Tz::UTC).unwrap();
        assert_eq!((first.year(), first.month(), first.day()), (2024, 1, 26));
        let second = expr
            .next_after(first.with_timezone(&Utc), Tz::UTC)
            .unwrap();
        assert_eq!((second.year(), second.month(), second.day()), (2024, 2, 23));
        let third = expr
            .next_after(second.with_timezone(&Utc), Tz::UTC)
            .unwrap();
        assert_eq!((third.year(), third.month(), third.day()), (2024, 3, 29));
    }

    #[test]
    fn strictly_increasing_and_in_match_set() {
        let expr = CronExpression::parse("0 */15 * * * ?").unwrap();
        let mut t = utc(2024, 3, 1, 0, 0, 0);
        let mut prev: Option<DateTime<chrono::Utc>> = None;
        for _ in 0..20 {
            let next = expr.next_after(t, Tz::UTC).unwrap().with_timezone(&Utc);
            if let Some(p) = prev {
                assert!(next > p);
            }
            assert_eq!(next.minute() % 15, 0);
            assert_eq!(next.second(), 0);
            prev = Some(next);
            t = next;
        }
    }

    #[test]
    fn both_dom_and_dow_specified_intersects() {
        // Matches only days that are both the 1st AND a Monday.
        let expr = CronExpression::parse("0 0 0 1 * MON").unwrap();
        let start = utc(2024, 1, 1, 0, 0, 0);
        let next = expr.next_after(start, Tz::UTC).unwrap();
        assert_eq!(next.weekday(), chrono::Weekday::Mon);
        assert_eq!(next.day(), 1);
    }

    #[test]
    fn both_question_marks_is_parse_error() {
        assert!(CronExpression::parse("0 0 0 ? * ?").is_err());
    }

    #[test]
    fn year_bound_exhausted_returns_none() {
        let expr = CronExpression::parse("0 0 0 1 1 ? 2024").unwrap();
        let start = utc(2024, 1, 1, 0, 0, 0);
        let first = expr.next_after(start, Tz::UTC);
        assert!(first.is_none());
    }

    #[test]
    fn leap_day_only_fires_on_leap_years() {
        let expr = CronExpression::parse("0 0 0 29 2 ?").unwrap();
        let start = utc(2023, 1, 1, 0, 0, 0);
        let next = expr.next_after(start, Tz::UTC).unwrap();
        assert_eq!((next.year(), next.month(), next.day()), (2024, 2, 29));
    }

    #[test]
    fn dst_spring_forward_gap_is_skipped() {
        // US Eastern: clocks jump from 2:00 to 3:00 on 2024-03-10.
        let ny: Tz = "America/New_York".parse().unwrap();
        let expr = CronExpression::parse("0 30 2 10 3 ?").unwrap();
        let start = utc(2024, 3, 9, 0, 0, 0);
        let next = expr.next_after(start, ny).unwrap();
        assert!(next.hour() >= 3);
    }
}
