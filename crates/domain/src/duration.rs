//! Compact duration strings such as `2h13m` or `1.5d`

use std::sync::LazyLock;

use regex::Regex;
use thiserror::Error;
use time::Duration;

static DURATION_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^((?P<days>[.\d]+?)d)?((?P<hours>[.\d]+?)h)?((?P<minutes>[.\d]+?)m)?((?P<seconds>[.\d]+?)s)?$",
    )
    .expect("Valid regex")
});

const UNITS: [(&str, f64); 4] = [
    ("days", 86_400.0),
    ("hours", 3_600.0),
    ("minutes", 60.0),
    ("seconds", 1.0),
];

/// Largest duration accepted, matching the usual timedelta limit
pub const MAX_DAYS: f64 = 999_999_999.0;

/// Errors raised by [`parse_duration`]
#[derive(Debug, Error, PartialEq)]
pub enum DurationParseError {
    #[error("unable to parse time '{0}'")]
    Invalid(String),
    #[error("invalid number '{value}' for {unit}")]
    Number { unit: &'static str, value: String },
    #[error("duration '{0}' is out of range")]
    OutOfRange(String),
}

/// Parse `[<n>d][<n>h][<n>m][<n>s]` into a duration
///
/// Each number may be fractional. The units must appear in this order and
/// each at most once; the empty string is a zero duration.
pub fn parse_duration(input: &str) -> Result<Duration, DurationParseError> {
    let captures = DURATION_PATTERN
        .captures(input)
        .ok_or_else(|| DurationParseError::Invalid(input.to_string()))?;

    let mut seconds = 0.0;
    for (unit, scale) in UNITS {
        let Some(part) = captures.name(unit) else {
            continue;
        };
        let value: f64 = part
            .as_str()
            .parse()
            .map_err(|_| DurationParseError::Number {
                unit,
                value: part.as_str().to_string(),
            })?;
        seconds += value * scale;
    }

    if !seconds.is_finite() || seconds >= (MAX_DAYS + 1.0) * 86_400.0 {
        return Err(DurationParseError::OutOfRange(input.to_string()));
    }

    Ok(Duration::seconds_f64(seconds))
}

/// Render seconds as `H:MM:SS.ss`
pub fn format_elapsed(seconds: f64) -> String {
    let hours = (seconds / 3_600.0).floor();
    let rest = seconds.rem_euclid(3_600.0);
    let minutes = (rest / 60.0).floor();
    let secs = rest.rem_euclid(60.0);
    format!("{}:{:02}:{:05.2}", hours as i64, minutes as i64, secs)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_hours_and_minutes() {
        assert_eq!(parse_duration("2h13m").unwrap(), Duration::minutes(133));
    }

    #[test]
    fn test_parse_all_units() {
        let parsed = parse_duration("1d2h3m4s").unwrap();
        assert_eq!(parsed, Duration::seconds(86_400 + 7_200 + 180 + 4));
    }

    #[test]
    fn test_parse_fractional_values() {
        assert_eq!(parse_duration("1.5d").unwrap(), Duration::hours(36));
        assert_eq!(parse_duration("0.5s").unwrap(), Duration::milliseconds(500));
        assert_eq!(parse_duration("2.h").unwrap(), Duration::hours(2));
    }

    #[test]
    fn test_parse_empty_is_zero() {
        assert_eq!(parse_duration("").unwrap(), Duration::ZERO);
    }

    #[test]
    fn test_parse_rejects_unknown_format() {
        for input in ["2x", "1m2h", "h", "1h 2m", "-1h"] {
            assert_eq!(
                parse_duration(input),
                Err(DurationParseError::Invalid(input.to_string())),
                "{input}"
            );
        }
    }

    #[test]
    fn test_parse_rejects_malformed_number() {
        assert_eq!(
            parse_duration("1.2.3h"),
            Err(DurationParseError::Number {
                unit: "hours",
                value: "1.2.3".to_string()
            })
        );
    }

    #[test]
    fn test_parse_rejects_out_of_range() {
        assert!(matches!(
            parse_duration("1000000000d"),
            Err(DurationParseError::OutOfRange(_))
        ));
        assert!(parse_duration("999999999d").is_ok());
    }

    #[test]
    fn test_format_elapsed() {
        assert_eq!(format_elapsed(0.0), "0:00:00.00");
        assert_eq!(format_elapsed(3725.5), "1:02:05.50");
        assert_eq!(format_elapsed(59.25), "0:00:59.25");
        assert_eq!(format_elapsed(90_000.0), "25:00:00.00");
    }
}
