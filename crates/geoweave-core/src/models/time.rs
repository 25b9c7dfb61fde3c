//! Time intervals and time steps of a project.

use std::fmt;

use chrono::{DateTime, Duration, Months, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{GeoweaveError, Result};

const DISPLAY_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%:z";

/// Whether an interval denotes a single instant or a span
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TimeKind {
    Instant,
    Interval,
}

/// A closed time interval `[start, end]` with `start <= end`.
///
/// The invariant is checked on construction and on deserialization, so a
/// `TimeInterval` value in hand is always valid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "TimeIntervalDict", into = "TimeIntervalDict")]
pub struct TimeInterval {
    start: DateTime<Utc>,
    end: DateTime<Utc>,
}

/// Wire representation in unix milliseconds
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
struct TimeIntervalDict {
    start: i64,
    end: i64,
}

impl TimeInterval {
    /// Create an interval, rejecting `end < start`
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Self> {
        if end < start {
            return Err(GeoweaveError::InvalidTimeInterval {
                start: start.to_rfc3339(),
                end: end.to_rfc3339(),
            });
        }
        Ok(Self { start, end })
    }

    /// Create an instant (`start == end`)
    pub fn instant(at: DateTime<Utc>) -> Self {
        Self { start: at, end: at }
    }

    /// Create an interval, repairing `end < start` by moving `end` onto `start`.
    ///
    /// This is the time slider policy: user input is repaired instead of rejected.
    pub fn clamped(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self {
            start,
            end: end.max(start),
        }
    }

    /// Create an interval from unix milliseconds
    pub fn from_millis(start: i64, end: i64) -> Result<Self> {
        let to_datetime = |millis: i64| {
            DateTime::<Utc>::from_timestamp_millis(millis).ok_or_else(|| {
                GeoweaveError::InvalidTimeInterval {
                    start: start.to_string(),
                    end: end.to_string(),
                }
            })
        };
        Self::new(to_datetime(start)?, to_datetime(end)?)
    }

    /// Parse an RFC 3339 instant, e.g. from configuration
    pub fn parse_instant(value: &str) -> Result<Self> {
        let at = DateTime::parse_from_rfc3339(value).map_err(|e| GeoweaveError::ConfigInvalid {
            key: "time".to_string(),
            reason: format!("'{}' is not an RFC 3339 timestamp: {}", value, e),
        })?;
        Ok(Self::instant(at.with_timezone(&Utc)))
    }

    /// Parse an RFC 3339 interval given as start and end
    pub fn parse(start: &str, end: &str) -> Result<Self> {
        let start = Self::parse_instant(start)?.start;
        let end = Self::parse_instant(end)?.start;
        Self::new(start, end)
    }

    pub fn start(&self) -> DateTime<Utc> {
        self.start
    }

    pub fn end(&self) -> DateTime<Utc> {
        self.end
    }

    pub fn kind(&self) -> TimeKind {
        if self.start == self.end {
            TimeKind::Instant
        } else {
            TimeKind::Interval
        }
    }

    /// Move both bounds forward by a time step
    pub fn shifted_by(&self, step: TimeStep) -> Result<Self> {
        Ok(Self {
            start: step.add_to(self.start)?,
            end: step.add_to(self.end)?,
        })
    }

    /// Move both bounds backward by a time step
    pub fn shifted_back_by(&self, step: TimeStep) -> Result<Self> {
        Ok(Self {
            start: step.subtract_from(self.start)?,
            end: step.subtract_from(self.end)?,
        })
    }

    /// `true` if both bounds of `self` lie before the bounds of `other`
    pub fn is_before(&self, other: &TimeInterval) -> bool {
        self.start < other.start && self.end < other.end
    }

    /// The string used for backend query parameters
    pub fn as_request_string(&self) -> String {
        let start = self.start.to_rfc3339_opts(SecondsFormat::Millis, true);
        match self.kind() {
            TimeKind::Instant => start,
            TimeKind::Interval => {
                format!("{}/{}", start, self.end.to_rfc3339_opts(SecondsFormat::Millis, true))
            }
        }
    }
}

impl fmt::Display for TimeInterval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind() {
            TimeKind::Instant => write!(f, "{}", self.start.format(DISPLAY_FORMAT)),
            TimeKind::Interval => write!(
                f,
                "{} - {}",
                self.start.format(DISPLAY_FORMAT),
                self.end.format(DISPLAY_FORMAT)
            ),
        }
    }
}

impl TryFrom<TimeIntervalDict> for TimeInterval {
    type Error = GeoweaveError;

    fn try_from(dict: TimeIntervalDict) -> Result<Self> {
        Self::from_millis(dict.start, dict.end)
    }
}

impl From<TimeInterval> for TimeIntervalDict {
    fn from(time: TimeInterval) -> Self {
        Self {
            start: time.start.timestamp_millis(),
            end: time.end.timestamp_millis(),
        }
    }
}

/// Granularity of a time step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeGranularity {
    Millis,
    Seconds,
    Minutes,
    Hours,
    Days,
    Months,
    Years,
}

/// The step size of the project's time slider
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TimeStep {
    pub step: u32,
    pub granularity: TimeGranularity,
}

impl Default for TimeStep {
    fn default() -> Self {
        Self::new(1, TimeGranularity::Months)
    }
}

impl TimeStep {
    pub fn new(step: u32, granularity: TimeGranularity) -> Self {
        Self { step, granularity }
    }

    /// Parse the configured default step, e.g. `"15 minutes"` or `"6 months"`.
    ///
    /// Unknown values fall back to one month.
    pub fn from_config(value: &str) -> Self {
        match value.trim() {
            "15 minutes" => Self::new(15, TimeGranularity::Minutes),
            "1 hour" => Self::new(1, TimeGranularity::Hours),
            "1 day" => Self::new(1, TimeGranularity::Days),
            "1 month" => Self::new(1, TimeGranularity::Months),
            "6 months" => Self::new(6, TimeGranularity::Months),
            "1 year" => Self::new(1, TimeGranularity::Years),
            other => {
                tracing::warn!(value = other, "Unknown default time step, using 1 month");
                Self::default()
            }
        }
    }

    fn overflow(&self, at: DateTime<Utc>) -> GeoweaveError {
        GeoweaveError::InvalidTimeInterval {
            start: at.to_rfc3339(),
            end: format!("out of range after a step of {}", self),
        }
    }

    fn fixed_duration(&self) -> Option<Duration> {
        let step = i64::from(self.step);
        match self.granularity {
            TimeGranularity::Millis => Some(Duration::milliseconds(step)),
            TimeGranularity::Seconds => Some(Duration::seconds(step)),
            TimeGranularity::Minutes => Some(Duration::minutes(step)),
            TimeGranularity::Hours => Some(Duration::hours(step)),
            TimeGranularity::Days => Some(Duration::days(step)),
            TimeGranularity::Months | TimeGranularity::Years => None,
        }
    }

    fn months(&self) -> Months {
        match self.granularity {
            TimeGranularity::Years => Months::new(self.step.saturating_mul(12)),
            _ => Months::new(self.step),
        }
    }

    /// Add this step to a point in time (calendar aware for months and years)
    pub fn add_to(&self, at: DateTime<Utc>) -> Result<DateTime<Utc>> {
        let shifted = match self.fixed_duration() {
            Some(duration) => at.checked_add_signed(duration),
            None => at.checked_add_months(self.months()),
        };
        shifted.ok_or_else(|| self.overflow(at))
    }

    /// Subtract this step from a point in time
    pub fn subtract_from(&self, at: DateTime<Utc>) -> Result<DateTime<Utc>> {
        let shifted = match self.fixed_duration() {
            Some(duration) => at.checked_sub_signed(duration),
            None => at.checked_sub_months(self.months()),
        };
        shifted.ok_or_else(|| self.overflow(at))
    }
}

impl fmt::Display for TimeStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let unit = match self.granularity {
            TimeGranularity::Millis => "millisecond",
            TimeGranularity::Seconds => "second",
            TimeGranularity::Minutes => "minute",
            TimeGranularity::Hours => "hour",
            TimeGranularity::Days => "day",
            TimeGranularity::Months => "month",
            TimeGranularity::Years => "year",
        };
        let plural = if self.step > 1 { "s" } else { "" };
        write!(f, "{} {}{}", self.step, unit, plural)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn utc(y: i32, m: u32, d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, 0, 0, 0).unwrap()
    }

    #[test]
    fn test_rejects_end_before_start() {
        let result = TimeInterval::new(utc(2020, 2, 1), utc(2020, 1, 1));
        assert!(matches!(result, Err(GeoweaveError::InvalidTimeInterval { .. })));
    }

    #[test]
    fn test_clamped_repairs_end() {
        let time = TimeInterval::clamped(utc(2020, 2, 1), utc(2020, 1, 1));
        assert_eq!(time.start(), utc(2020, 2, 1));
        assert_eq!(time.end(), utc(2020, 2, 1));
        assert_eq!(time.kind(), TimeKind::Instant);
    }

    #[test]
    fn test_serializes_as_millis() {
        let time = TimeInterval::new(utc(1970, 1, 1), utc(1970, 1, 2)).unwrap();
        let json = serde_json::to_value(time).unwrap();
        assert_eq!(json, serde_json::json!({"start": 0, "end": 86_400_000}));
    }

    #[test]
    fn test_deserialize_rejects_invalid_interval() {
        let result: std::result::Result<TimeInterval, _> =
            serde_json::from_value(serde_json::json!({"start": 10, "end": 5}));
        assert!(result.is_err());
    }

    #[test]
    fn test_month_steps_are_calendar_aware() {
        let time = TimeInterval::instant(utc(2020, 1, 31));
        let shifted = time.shifted_by(TimeStep::new(1, TimeGranularity::Months)).unwrap();
        assert_eq!(shifted.start(), utc(2020, 2, 29));

        let back = TimeInterval::instant(utc(2021, 3, 1))
            .shifted_back_by(TimeStep::new(1, TimeGranularity::Years))
            .unwrap();
        assert_eq!(back.start(), utc(2020, 3, 1));
    }

    #[test]
    fn test_request_string() {
        let instant = TimeInterval::instant(utc(2000, 1, 1));
        assert_eq!(instant.as_request_string(), "2000-01-01T00:00:00.000Z");

        let interval = TimeInterval::new(utc(2000, 1, 1), utc(2000, 1, 2)).unwrap();
        assert_eq!(
            interval.as_request_string(),
            "2000-01-01T00:00:00.000Z/2000-01-02T00:00:00.000Z"
        );
    }

    #[test]
    fn test_time_step_from_config() {
        assert_eq!(
            TimeStep::from_config("15 minutes"),
            TimeStep::new(15, TimeGranularity::Minutes)
        );
        assert_eq!(TimeStep::from_config("6 months"), TimeStep::new(6, TimeGranularity::Months));
        assert_eq!(TimeStep::from_config("fortnight"), TimeStep::default());
        assert_eq!(TimeStep::new(6, TimeGranularity::Months).to_string(), "6 months");
    }
}
