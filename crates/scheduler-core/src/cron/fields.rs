use super::parse::{dow_names, CronParseError};
use chrono::{Datelike, NaiveDate, Weekday};

/// One comma-separated term of the day-of-month field.
#[derive(Debug, Clone, PartialEq, Eq)]
enum DomTerm {
    Exact(u32),
    Range(u32, u32),
    Step { start: u32, end: u32, step: u32 },
    /// `L` — the last day of the month.
    Last,
    /// `LW` — the last weekday (Mon-Fri) of the month.
    LastWeekday,
    /// `NW` — the weekday nearest to day `N`, without crossing a month
    /// boundary.
    NearestWeekday(u32),
}

/// The day-of-month field: either `?` (unspecified, day-of-week governs)
/// or a list of OR'd terms.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DomField {
    Unspecified,
    Terms(Vec<DomTerm>),
}

impl DomField {
    pub fn parse(field: &str) -> Result<Self, CronParseError> {
        if field == "?" {
            return Ok(DomField::Unspecified);
        }
        let mut terms = Vec::new();
        for raw in field.split(',') {
            terms.push(parse_dom_term(raw)?);
        }
        if terms.is_empty() {
            return Err(CronParseError {
                position: 3,
                message: "day-of-month field is empty".to_string(),
            });
        }
        Ok(DomField::Terms(terms))
    }

    /// Whether `date` satisfies this field, independent of day-of-week.
    pub fn matches(&self, date: NaiveDate) -> bool {
        match self {
            DomField::Unspecified => true,
            DomField::Terms(terms) => terms.iter().any(|t| term_matches(t, date)),
        }
    }

    pub fn is_unspecified(&self) -> bool {
        matches!(self, DomField::Unspecified)
    }
}

fn days_in_month(year: i32, month: u32) -> u32 {
    let next_month_first = if month == 12 {
        NaiveDate::from_ymd_opt(year + 1, 1, 1)
    } else {
        NaiveDate::from_ymd_opt(year, month + 1, 1)
    }
    .expect("valid calendar month");
    next_month_first
        .pred_opt()
        .expect("day before month start exists")
        .day()
}

fn term_matches(term: &DomTerm, date: NaiveDate) -> bool {
    let day = date.day();
    match term {
        DomTerm::Exact(n) => day == *n,
        DomTerm::Range(a, b) => day >= *a && day <= *b,
        DomTerm::Step { start, end, step } => {
            day >= *start && day <= *end && (day - start) % step == 0
        }
        DomTerm::Last => day == days_in_month(date.year(), date.month()),
        DomTerm::LastWeekday => {
            let last = days_in_month(date.year(), date.month());
            day == nearest_weekday(date.year(), date.month(), last)
        }
        DomTerm::NearestWeekday(n) => {
            let last = days_in_month(date.year(), date.month());
            let target = (*n).min(last);
            day == nearest_weekday(date.year(), date.month(), target)
        }
    }
}

/// The weekday nearest to `target` within the same month (never crossing
/// a month boundary in either direction).
fn nearest_weekday(year: i32, month: u32, target: u32) -> u32 {
    let last = days_in_month(year, month);
    let date = NaiveDate::from_ymd_opt(year, month, target).expect("target day in range");
    match date.weekday() {
        Weekday::Sat => {
            if target > 1 {
                target - 1
            } else {
                (target + 2).min(last)
            }
        }
        Weekday::Sun => {
            if target < last {
                target + 1
            } else {
                target.saturating_sub(2).max(1)
            }
        }
        _ => target,
    }
}

fn parse_dom_term(raw: &str) -> Result<DomTerm, CronParseError> {
    let pos = 3;
    if raw == "L" {
        return Ok(DomTerm::Last);
    }
    if raw == "LW" {
        return Ok(DomTerm::LastWeekday);
    }
    if let Some(prefix) = raw.strip_suffix('W') {
        let n = prefix
            .parse::<u32>()
            .map_err(|_| err(pos, format!("'{raw}' is not a valid nearest-weekday term")))?;
        if !(1..=31).contains(&n) {
            return Err(err(pos, format!("{n} is out of range [1, 31]")));
        }
        return Ok(DomTerm::NearestWeekday(n));
    }
    if let Some((range, step)) = raw.split_once('/') {
        let step: u32 = step
            .parse()
            .map_err(|_| err(pos, format!("'{step}' is not a valid step")))?;
        if step == 0 {
            return Err(err(pos, "step must be greater than zero"));
        }
        let (start, end) = parse_dom_range(range, pos)?;
        return Ok(DomTerm::Step { start, end, step });
    }
    if let Some((a, b)) = raw.split_once('-') {
        let a = parse_dom_num(a, pos)?;
        let b = parse_dom_num(b, pos)?;
        return Ok(DomTerm::Range(a, b));
    }
    if raw == "*" {
        return Ok(DomTerm::Range(1, 31));
    }
    let n = parse_dom_num(raw, pos)?;
    Ok(DomTerm::Exact(n))
}

fn parse_dom_range(range: &str, pos: usize) -> Result<(u32, u32), CronParseError> {
    if range == "*" {
        return Ok((1, 31));
    }
    match range.split_once('-') {
        Some((a, b)) => Ok((parse_dom_num(a, pos)?, parse_dom_num(b, pos)?)),
        None => {
            let v = parse_dom_num(range, pos)?;
            Ok((v, 31))
        }
    }
}

fn parse_dom_num(raw: &str, pos: usize) -> Result<u32, CronParseError> {
    let n: u32 = raw
        .parse()
        .map_err(|_| err(pos, format!("'{raw}' is not a valid day-of-month value")))?;
    if !(1..=31).contains(&n) {
        return Err(err(pos, format!("{n} is out of range [1, 31]")));
    }
    Ok(n)
}

fn err(position: usize, message: impl Into<String>) -> CronParseError {
    CronParseError {
        position,
        message: message.into(),
    }
}

/// One comma-separated term of the day-of-week field. `1 == Sunday`
/// through `7 == Saturday`, matching Quartz's convention.
#[derive(Debug, Clone, PartialEq, Eq)]
enum DowTerm {
    Exact(u32),
    Range(u32, u32),
    Step { start: u32, end: u32, step: u32 },
    /// `NL` — the last occurrence of weekday `N` in the month.
    Last(u32),
    /// `N#M` — the `M`th occurrence of weekday `N` in the month (1..=5).
    Nth(u32, u32),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DowField {
    Unspecified,
    Terms(Vec<DowTerm>),
}

fn quartz_dow(date: NaiveDate) -> u32 {
    // Quartz day-of-week: SUN=1 .. SAT=7. chrono's Weekday::num_days_from_sunday is 0-based.
    date.weekday().num_days_from_sunday() + 1
}

impl DowField {
    pub fn parse(field: &str) -> Result<Self, CronParseError> {
        if field == "?" {
            return Ok(DowField::Unspecified);
        }
        let mut terms = Vec::new();
        for raw in field.split(',') {
            terms.push(parse_dow_term(raw)?);
        }
        if terms.is_empty() {
            return Err(CronParseError {
                position: 5,
                message: "day-of-week field is empty".to_string(),
            });
        }
        Ok(DowField::Terms(terms))
    }

    pub fn matches(&self, date: NaiveDate) -> bool {
        match self {
            DowField::Unspecified => true,
            DowField::Terms(terms) => terms.iter().any(|t| dow_term_matches(t, date)),
        }
    }

    pub fn is_unspecified(&self) -> bool {
        matches!(self, DowField::Unspecified)
    }
}

fn dow_term_matches(term: &DowTerm, date: NaiveDate) -> bool {
    let dow = quartz_dow(date);
    match term {
        DowTerm::Exact(n) => dow == *n,
        DowTerm::Range(a, b) => in_wrapping_range(dow, *a, *b),
        DowTerm::Step { start, end, step } => {
            in_wrapping_range(dow, *start, *end) && (dow + 7 - start) % step == 0
        }
        DowTerm::Last(n) => dow == *n && date.day() + 7 > days_in_month(date.year(), date.month()),
        DowTerm::Nth(n, occurrence) => dow == *n && (date.day() - 1) / 7 + 1 == *occurrence,
    }
}

fn in_wrapping_range(v: u32, a: u32, b: u32) -> bool {
    if a <= b {
        v >= a && v <= b
    } else {
        v >= a || v <= b
    }
}

fn parse_dow_term(raw: &str) -> Result<DowTerm, CronParseError> {
    let pos = 5;
    if let Some(prefix) = raw.strip_suffix('L') {
        let n = parse_dow_num(prefix, pos)?;
        return Ok(DowTerm::Last(n));
    }
    if let Some((day, occ)) = raw.split_once('#') {
        let n = parse_dow_num(day, pos)?;
        let occ: u32 = occ
            .parse()
            .map_err(|_| err(pos, format!("'{occ}' is not a valid occurrence")))?;
        if !(1..=5).contains(&occ) {
            return Err(err(pos, format!("occurrence {occ} is out of range [1, 5]")));
        }
        return Ok(DowTerm::Nth(n, occ));
    }
    if raw == "*" {
        return Ok(DowTerm::Range(1, 7));
    }
    if let Some((range, step)) = raw.split_once('/') {
        let step: u32 = step
            .parse()
            .map_err(|_| err(pos, format!("'{step}' is not a valid step")))?;
        if step == 0 {
            return Err(err(pos, "step must be greater than zero"));
        }
        let (start, end) = if range == "*" {
            (1, 7)
        } else if let Some((a, b)) = range.split_once('-') {
            (parse_dow_num(a, pos)?, parse_dow_num(b, pos)?)
        } else {
            (parse_dow_num(range, pos)?, 7)
        };
        return Ok(DowTerm::Step { start, end, step });
    }
    if let Some((a, b)) = raw.split_once('-') {
        return Ok(DowTerm::Range(parse_dow_num(a, pos)?, parse_dow_num(b, pos)?));
    }
    Ok(DowTerm::Exact(parse_dow_num(raw, pos)?))
}

fn parse_dow_num(raw: &str, pos: usize) -> Result<u32, CronParseError> {
    let (names, base) = dow_names();
    if let Some(v) = names
        .iter()
        .position(|n| *n == raw.to_ascii_uppercase())
        .map(|i| base + i as u32)
    {
        return Ok(v);
    }
    let n: u32 = raw
        .parse()
        .map_err(|_| err(pos, format!("'{raw}' is not a valid day-of-week value")))?;
    if !(1..=7).contains(&n) {
        return Err(err(pos, format!("{n} is out of range [1, 7]")));
    }
    Ok(n)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn last_day_of_month() {
        let f = DomField::parse("L").unwrap();
        assert!(f.matches(date(2024, 2, 29)));
        assert!(!f.matches(date(2024, 2, 28)));
        assert!(f.matches(date(2023, 2, 28)));
    }

    #[test]
    fn last_weekday_of_month() {
        let f = DomField::parse("LW").unwrap();
        // Feb 2024 ends on Thu 29th, already a weekday.
        assert!(f.matches(date(2024, 2, 29)));
        // Jun 2024 ends on Sun 30th -> nearest weekday is Fri 28th.
        assert!(f.matches(date(2024, 6, 28)));
        assert!(!f.matches(date(2024, 6, 30)));
    }

    #[test]
    fn nearest_weekday_no_month_crossing() {
        // 1W in a month starting on Saturday: nearest weekday cannot
        // cross back into the previous month, so it's the following Monday.
        let f = DomField::parse("1W").unwrap();
        // June 1, 2024 is a Saturday; nearest weekday without crossing back
        // is Monday June 3.
        assert!(f.matches(date(2024, 6, 3)));
        assert!(!f.matches(date(2024, 5, 31)));
    }

    #[test]
    fn last_friday_of_month() {
        let f = DowField::parse("6L").unwrap();
        assert!(f.matches(date(2024, 1, 26)));
        assert!(f.matches(date(2024, 2, 23)));
        assert!(f.matches(date(2024, 3, 29)));
    }

    #[test]
    fn nth_weekday_occurrence() {
        // 2#1 = first Monday of the month.
        let f = DowField::parse("2#1").unwrap();
        assert!(f.matches(date(2024, 1, 1)));
        assert!(!f.matches(date(2024, 1, 8)));
    }

    #[test]
    fn weekday_range_mon_fri() {
        let f = DowField::parse("MON-FRI").unwrap();
        assert!(f.matches(date(2024, 1, 5))); // Friday
        assert!(!f.matches(date(2024, 1, 6))); // Saturday
    }
}
