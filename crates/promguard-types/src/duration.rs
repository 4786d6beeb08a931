//! Duration parsing and human-readable formatting.
//!
//! Diagnostics render durations with at most two units and never include
//! seconds: the largest unit with a non-zero value, optionally followed by
//! the next smaller unit (`5d16h`, `18h45m`, `1w`).

use std::time::Duration;

const MINUTE: u64 = 60;
const HOUR: u64 = 60 * MINUTE;
const DAY: u64 = 24 * HOUR;
const WEEK: u64 = 7 * DAY;
const YEAR: u64 = 365 * DAY;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DurationParseError {
    pub input: String,
}

impl std::fmt::Display for DurationParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "invalid duration {:?} (expected e.g. \"5m\", \"1h30m\", \"1w\")",
            self.input
        )
    }
}

impl std::error::Error for DurationParseError {}

/// Parse a Prometheus-style duration: one or more `<digits><unit>` groups
/// where unit is one of `ms`, `s`, `m`, `h`, `d`, `w`, `y`.
pub fn parse_duration(input: &str) -> Result<Duration, DurationParseError> {
    let err = || DurationParseError {
        input: input.to_string(),
    };

    let s = input.trim();
    if s.is_empty() {
        return Err(err());
    }

    let mut total_ms: u64 = 0;
    let mut rest = s;
    while !rest.is_empty() {
        let digits_end = rest
            .find(|c: char| !c.is_ascii_digit())
            .ok_or_else(err)?;
        if digits_end == 0 {
            return Err(err());
        }
        let value: u64 = rest[..digits_end].parse().map_err(|_| err())?;
        rest = &rest[digits_end..];

        let (unit_ms, unit_len) = if rest.starts_with("ms") {
            (1, 2)
        } else if rest.starts_with('s') {
            (1000, 1)
        } else if rest.starts_with('m') {
            (MINUTE * 1000, 1)
        } else if rest.starts_with('h') {
            (HOUR * 1000, 1)
        } else if rest.starts_with('d') {
            (DAY * 1000, 1)
        } else if rest.starts_with('w') {
            (WEEK * 1000, 1)
        } else if rest.starts_with('y') {
            (YEAR * 1000, 1)
        } else {
            return Err(err());
        };
        total_ms = total_ms.saturating_add(value.saturating_mul(unit_ms));
        rest = &rest[unit_len..];
    }

    Ok(Duration::from_millis(total_ms))
}

/// Format a duration as the largest non-zero unit plus, when non-zero, the
/// immediately smaller unit. Input is rounded to whole minutes.
pub fn format_duration(d: Duration) -> String {
    let minutes = (d.as_secs_f64() / MINUTE as f64).round() as u64;
    if minutes == 0 {
        return "0m".to_string();
    }

    let weeks = minutes / (WEEK / MINUTE);
    let mut rem = minutes % (WEEK / MINUTE);
    let days = rem / (DAY / MINUTE);
    rem %= DAY / MINUTE;
    let hours = rem / (HOUR / MINUTE);
    let mins = rem % (HOUR / MINUTE);

    let units = [(weeks, "w"), (days, "d"), (hours, "h"), (mins, "m")];
    let first = units
        .iter()
        .position(|(v, _)| *v > 0)
        .unwrap_or(units.len() - 1);

    let mut out = format!("{}{}", units[first].0, units[first].1);
    if let Some((v, suffix)) = units.get(first + 1) {
        if *v > 0 {
            out.push_str(&format!("{v}{suffix}"));
        }
    }
    out
}

/// Format an elapsed duration for "since"/"ago" messages.
///
/// Anything longer than one hour is rounded to the whole hour first, so a
/// gap of 4d5m reads as `4d` and 23h59m reads as `1d`.
pub fn format_since(d: Duration) -> String {
    if d > Duration::from_secs(HOUR) {
        let hours = (d.as_secs_f64() / HOUR as f64).round() as u64;
        format_duration(Duration::from_secs(hours * HOUR))
    } else {
        format_duration(d)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mins(m: u64) -> Duration {
        Duration::from_secs(m * 60)
    }

    #[test]
    fn parses_single_and_compound_durations() {
        assert_eq!(parse_duration("5m").unwrap(), mins(5));
        assert_eq!(parse_duration("1w").unwrap(), mins(7 * 24 * 60));
        assert_eq!(parse_duration("1h30m").unwrap(), mins(90));
        assert_eq!(parse_duration("500ms").unwrap(), Duration::from_millis(500));
    }

    #[test]
    fn rejects_malformed_durations() {
        for bad in ["", "m", "5", "5x", "h5", "5m3"] {
            assert!(parse_duration(bad).is_err(), "expected error for {bad:?}");
        }
    }

    #[test]
    fn formats_with_at_most_two_units() {
        assert_eq!(format_duration(mins(7 * 24 * 60)), "1w");
        assert_eq!(format_duration(mins(5 * 24 * 60 + 16 * 60)), "5d16h");
        assert_eq!(format_duration(mins(18 * 60 + 45)), "18h45m");
        assert_eq!(format_duration(mins(35)), "35m");
        // Adjacent unit is zero: no sub-unit is shown.
        assert_eq!(format_duration(mins(4 * 24 * 60 + 5)), "4d");
        assert_eq!(format_duration(mins(8 * 24 * 60)), "1w1d");
    }

    #[test]
    fn since_rounds_to_the_hour_boundary() {
        assert_eq!(format_since(mins(23 * 60 + 59)), "1d");
        assert_eq!(format_since(mins(4 * 24 * 60 + 5)), "4d");
        assert_eq!(format_since(mins(5 * 24 * 60 + 16 * 60)), "5d16h");
        assert_eq!(format_since(mins(7 * 24 * 60)), "1w");
        assert_eq!(format_since(mins(35)), "35m");
    }
}
