//! ISO-8601 periods for token lifetimes
//!
//! Parsing is done by the `iso8601` crate. Calendar units are then fixed
//! for expiry arithmetic: a year is 365 days, a month 30.

use chrono::TimeDelta;
use iso8601::Duration;
use thiserror::Error;

const MILLIS_PER_SECOND: i64 = 1000;
const MILLIS_PER_MINUTE: i64 = 60 * MILLIS_PER_SECOND;
const MILLIS_PER_HOUR: i64 = 60 * MILLIS_PER_MINUTE;
const MILLIS_PER_DAY: i64 = 24 * MILLIS_PER_HOUR;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DurationError {
    #[error("duration cannot be empty")]
    Empty,

    #[error("{0}")]
    Invalid(String),

    #[error("duration is too large")]
    Overflow,
}

/// A parsed ISO-8601 period
#[derive(Debug, Clone)]
pub struct IsoDuration(Duration);

impl IsoDuration {
    pub fn parse(s: &str) -> Result<Self, DurationError> {
        if s.is_empty() {
            return Err(DurationError::Empty);
        }

        let parsed = iso8601::duration(s).map_err(DurationError::Invalid)?;
        let duration = IsoDuration(parsed);

        // Reject values that cannot be represented before anyone uses them
        duration.to_time_delta()?;

        Ok(duration)
    }

    /// Total length in milliseconds
    pub fn total_milliseconds(&self) -> Result<i64, DurationError> {
        let parts = match self.0 {
            Duration::Weeks(weeks) => vec![(weeks, 7 * MILLIS_PER_DAY)],
            Duration::YMDHMS {
                year,
                month,
                day,
                hour,
                minute,
                second,
                millisecond,
            } => vec![
                (year, 365 * MILLIS_PER_DAY),
                (month, 30 * MILLIS_PER_DAY),
                (day, MILLIS_PER_DAY),
                (hour, MILLIS_PER_HOUR),
                (minute, MILLIS_PER_MINUTE),
                (second, MILLIS_PER_SECOND),
                (millisecond, 1),
            ],
        };

        parts.into_iter().try_fold(0i64, |total, (value, scale)| {
            i64::from(value)
                .checked_mul(scale)
                .and_then(|v| total.checked_add(v))
                .ok_or(DurationError::Overflow)
        })
    }

    pub fn to_time_delta(&self) -> Result<TimeDelta, DurationError> {
        TimeDelta::try_milliseconds(self.total_milliseconds()?).ok_or(DurationError::Overflow)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seconds(s: &str) -> i64 {
        IsoDuration::parse(s).unwrap().to_time_delta().unwrap().num_seconds()
    }

    #[test]
    fn test_parse_valid() {
        assert_eq!(seconds("P1DT2H30M"), 86400 + 2 * 3600 + 30 * 60);
        assert_eq!(seconds("PT1M"), 60);
        assert_eq!(seconds("P2W"), 14 * 86400);
        assert_eq!(seconds("PT0S"), 0);
    }

    #[test]
    fn test_calendar_units_are_fixed() {
        assert_eq!(seconds("P1Y"), 365 * 86400);
        assert_eq!(seconds("P1M"), 30 * 86400);
        assert_eq!(seconds("P1MT1M"), 30 * 86400 + 60);
    }

    #[test]
    fn test_parse_invalid() {
        assert_eq!(IsoDuration::parse("").unwrap_err(), DurationError::Empty);
        for input in ["1D", "one day", "T1H", "-P1D"] {
            assert!(
                matches!(IsoDuration::parse(input), Err(DurationError::Invalid(_))),
                "{} should be rejected",
                input
            );
        }
    }

    #[test]
    fn test_parse_overflow() {
        assert_eq!(
            IsoDuration::parse("P999999999Y").unwrap_err(),
            DurationError::Overflow
        );
    }
}
