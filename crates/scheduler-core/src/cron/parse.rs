use std::collections::BTreeSet;
use std::fmt;

/// A cron expression failed to parse.
///
/// `position` is the index of the offending field (0 = seconds, 6 = year)
/// so a caller can point a user at the exact token that was malformed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CronParseError {
    pub position: usize,
    pub message: String,
}

impl fmt::Display for CronParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "cron field {}: {}", self.position, self.message)
    }
}

impl std::error::Error for CronParseError {}

fn err(position: usize, message: impl Into<String>) -> CronParseError {
    CronParseError {
        position,
        message: message.into(),
    }
}

const MONTH_NAMES: [&str; 12] = [
    "JAN", "FEB", "MAR", "APR", "MAY", "JUN", "JUL", "AUG", "SEP", "OCT", "NOV", "DEC",
];

const DOW_NAMES: [&str; 7] = ["SUN", "MON", "TUE", "WED", "THU", "FRI", "SAT"];

fn resolve_name(token: &str, names: &[&str], base: u32) -> Option<u32> {
    let upper = token.to_ascii_uppercase();
    names
        .iter()
        .position(|n| *n == upper)
        .map(|i| base + i as u32)
}

/// Parse a single numeric atom (`N`), resolving month/weekday names when
/// a `names` table is supplied.
fn parse_atom(token: &str, position: usize, names: Option<(&[&str], u32)>) -> Result<u32, CronParseError> {
    if let Some((table, base)) = names {
        if let Some(v) = resolve_name(token, table, base) {
            return Ok(v);
        }
    }
    token
        .parse::<u32>()
        .map_err(|_| err(position, format!("'{token}' is not a valid value")))
}

/// Expand a simple numeric field (seconds, minutes, hours, month, year)
/// made of comma-separated `*`, `N`, `N-M`, `N/S`, `N-M/S` terms.
pub fn parse_numeric_field(
    field: &str,
    position: usize,
    min: u32,
    max: u32,
    names: Option<(&[&str], u32)>,
) -> Result<BTreeSet<u32>, CronParseError> {
    let mut values = BTreeSet::new();
    for term in field.split(',') {
        expand_numeric_term(term, position, min, max, names, &mut values)?;
    }
    if values.is_empty() {
        return Err(err(position, "field matches no values"));
    }
    Ok(values)
}

fn expand_numeric_term(
    term: &str,
    position: usize,
    min: u32,
    max: u32,
    names: Option<(&[&str], u32)>,
    out: &mut BTreeSet<u32>,
) -> Result<(), CronParseError> {
    let (range_part, step) = match term.split_once('/') {
        Some((r, s)) => {
            let step = s
                .parse::<u32>()
                .map_err(|_| err(position, format!("'{s}' is not a valid step")))?;
            if step == 0 {
                return Err(err(position, "step must be greater than zero"));
            }
            (r, Some(step))
        }
        None => (term, None),
    };

    let (start, end) = if range_part == "*" {
        (min, max)
    } else if let Some((a, b)) = range_part.split_once('-') {
        let a = parse_atom(a, position, names)?;
        let b = parse_atom(b, position, names)?;
        (a, b)
    } else {
        let v = parse_atom(range_part, position, names)?;
        match step {
            Some(_) => (v, max),
            None => {
                if v < min || v > max {
                    return Err(err(position, format!("{v} is out of range [{min}, {max}]")));
                }
                out.insert(v);
                return Ok(());
            }
        }
    };

    if start < min || end > max || start > end {
        return Err(err(
            position,
            format!("range {start}-{end} is out of bounds [{min}, {max}]"),
        ));
    }

    let step = step.unwrap_or(1);
    let mut v = start;
    while v <= end {
        out.insert(v);
        v += step;
    }
    Ok(())
}

pub fn month_names() -> (&'static [&'static str], u32) {
    (&MONTH_NAMES, 1)
}

pub fn dow_names() -> (&'static [&'static str], u32) {
    (&DOW_NAMES, 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn star_expands_full_range() {
        let set = parse_numeric_field("*", 0, 0, 59, None).unwrap();
        assert_eq!(set.len(), 60);
    }

    #[test]
    fn range_and_list() {
        let set = parse_numeric_field("1-3,10", 0, 0, 59, None).unwrap();
        assert_eq!(set, BTreeSet::from([1, 2, 3, 10]));
    }

    #[test]
    fn step_range() {
        let set = parse_numeric_field("0/15", 0, 0, 59, None).unwrap();
        assert_eq!(set, BTreeSet::from([0, 15, 30, 45]));
    }

    #[test]
    fn stepped_explicit_range() {
        let set = parse_numeric_field("10-40/10", 0, 0, 59, None).unwrap();
        assert_eq!(set, BTreeSet::from([10, 20, 30, 40]));
    }

    #[test]
    fn month_name_resolution() {
        let set = parse_numeric_field("JAN-MAR", 4, 1, 12, Some(month_names())).unwrap();
        assert_eq!(set, BTreeSet::from([1, 2, 3]));
    }

    #[test]
    fn out_of_range_is_error() {
        assert!(parse_numeric_field("61", 0, 0, 59, None).is_err());
    }

    #[test]
    fn zero_step_is_error() {
        assert!(parse_numeric_field("*/0", 0, 0, 59, None).is_err());
    }
}
