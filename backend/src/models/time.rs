//! Timestamps, periods and sampling times.
//!
//! All instants are kept as UTC `NaiveDateTime`. Inputs carrying an offset are
//! normalized to UTC on parse; outputs always use the `YYYY-MM-DDTHH:MM:SS.t`
//! form the result encoding and CSV export rely on.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Timelike};
use serde::{Deserialize, Serialize};

/// Error raised when a timestamp token cannot be understood.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unparseable timestamp '{0}'")]
pub struct TimeParseError(pub String);

/// Parse an ISO-8601 timestamp.
///
/// Accepts `2007-05-01T02:59:00`, `2007-05-01T02:59:00.0`, `2007-05-01T02:59:00Z`,
/// `2007-05-01T02:59:00.000+01:00` and date-only `2007-05-01`.
pub fn parse_time(value: &str) -> Result<NaiveDateTime, TimeParseError> {
    let trimmed = value.trim();
    if let Ok(dt) = NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%dT%H:%M:%S%.f") {
        return Ok(dt);
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return Ok(dt.naive_utc());
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%d %H:%M:%S%.f") {
        return Ok(dt);
    }
    if let Ok(date) = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d") {
        if let Some(dt) = date.and_hms_opt(0, 0, 0) {
            return Ok(dt);
        }
    }
    Err(TimeParseError(value.to_string()))
}

/// Format a timestamp with a single fractional digit (`2007-05-01T02:59:00.0`).
pub fn format_time(time: &NaiveDateTime) -> String {
    let tenths = time.nanosecond() % 1_000_000_000 / 100_000_000;
    format!("{}.{}", time.format("%Y-%m-%dT%H:%M:%S"), tenths)
}

/// Tenths of a second since the Unix epoch: the precision [`format_time`] renders,
/// so two instants with the same key print identically.
pub fn encoded_tenths(time: &NaiveDateTime) -> i64 {
    let tenths = time.nanosecond() % 1_000_000_000 / 100_000_000;
    time.and_utc().timestamp() * 10 + i64::from(tenths)
}

/// Milliseconds since the Unix epoch, used as the decimation axis.
pub fn epoch_millis(time: &NaiveDateTime) -> i64 {
    time.and_utc().timestamp_millis()
}

/// Serde adapter for `NaiveDateTime` fields using [`parse_time`] / [`format_time`].
pub mod iso {
    use chrono::NaiveDateTime;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(time: &NaiveDateTime, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&super::format_time(time))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<NaiveDateTime, D::Error> {
        let raw = String::deserialize(deserializer)?;
        super::parse_time(&raw).map_err(serde::de::Error::custom)
    }
}

/// A closed time interval `[begin, end]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TimePeriod {
    #[serde(with = "iso")]
    pub begin: NaiveDateTime,
    #[serde(with = "iso")]
    pub end: NaiveDateTime,
}

impl TimePeriod {
    /// Create a period, returning `None` when `begin` is after `end`.
    pub fn new(begin: NaiveDateTime, end: NaiveDateTime) -> Option<Self> {
        if begin <= end {
            Some(Self { begin, end })
        } else {
            None
        }
    }

    /// Degenerate period covering a single instant.
    pub fn instant(time: NaiveDateTime) -> Self {
        Self {
            begin: time,
            end: time,
        }
    }

    /// Whether `begin <= end`. Deserialized periods are not checked on input.
    pub fn is_well_formed(&self) -> bool {
        self.begin <= self.end
    }

    pub fn contains(&self, time: &NaiveDateTime) -> bool {
        self.begin <= *time && *time <= self.end
    }

    pub fn intersects(&self, other: &TimePeriod) -> bool {
        self.begin <= other.end && other.begin <= self.end
    }

    /// Widen this period so it also covers `time`.
    pub fn extend_to(&mut self, time: NaiveDateTime) {
        if time < self.begin {
            self.begin = time;
        }
        if time > self.end {
            self.end = time;
        }
    }

    /// Smallest period covering both.
    pub fn union(&self, other: &TimePeriod) -> TimePeriod {
        TimePeriod {
            begin: self.begin.min(other.begin),
            end: self.end.max(other.end),
        }
    }
}

/// Phenomenon / sampling time of an observation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SamplingTime {
    Instant(#[serde(with = "iso")] NaiveDateTime),
    Period(TimePeriod),
}

impl SamplingTime {
    pub fn begin(&self) -> NaiveDateTime {
        match self {
            SamplingTime::Instant(t) => *t,
            SamplingTime::Period(p) => p.begin,
        }
    }

    pub fn end(&self) -> NaiveDateTime {
        match self {
            SamplingTime::Instant(t) => *t,
            SamplingTime::Period(p) => p.end,
        }
    }

    pub fn as_period(&self) -> TimePeriod {
        match self {
            SamplingTime::Instant(t) => TimePeriod::instant(*t),
            SamplingTime::Period(p) => *p,
        }
    }

    /// Collapse a period with identical bounds into an instant.
    pub fn from_period(period: TimePeriod) -> Self {
        if period.begin == period.end {
            SamplingTime::Instant(period.begin)
        } else {
            SamplingTime::Period(period)
        }
    }
}
