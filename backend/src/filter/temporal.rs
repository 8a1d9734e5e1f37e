//! Temporal operators over sample timestamps and sampling periods.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::models::time::{encoded_tenths, iso, SamplingTime, TimePeriod};

/// A temporal comparison operator with its operand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TemporalFilter {
    /// Instant: same encoded tenth of a second. Period: timestamp inside, bounds included.
    #[serde(rename = "TEquals")]
    Equals(SamplingTime),
    /// Strictly before the instant.
    #[serde(rename = "TBefore")]
    Before(#[serde(with = "iso")] NaiveDateTime),
    /// Strictly after the instant.
    #[serde(rename = "TAfter")]
    After(#[serde(with = "iso")] NaiveDateTime),
    /// Inside the period, bounds included.
    #[serde(rename = "TDuring")]
    During(TimePeriod),
}

impl TemporalFilter {
    /// Operand sanity check; an inverted period is rejected.
    pub fn is_well_formed(&self) -> bool {
        match self {
            TemporalFilter::Equals(SamplingTime::Period(p)) | TemporalFilter::During(p) => {
                p.is_well_formed()
            }
            _ => true,
        }
    }

    /// Evaluate against a single sample timestamp.
    pub fn matches_instant(&self, time: &NaiveDateTime) -> bool {
        match self {
            TemporalFilter::Equals(SamplingTime::Instant(t)) => encoded_tenths(t) == encoded_tenths(time),
            TemporalFilter::Equals(SamplingTime::Period(p)) => p.contains(time),
            TemporalFilter::Before(t) => time < t,
            TemporalFilter::After(t) => time > t,
            TemporalFilter::During(p) => p.contains(time),
        }
    }

    /// Whether any instant of `period` could satisfy this filter.
    ///
    /// Used to skip whole series before scanning their samples.
    pub fn may_overlap(&self, period: &TimePeriod) -> bool {
        match self {
            TemporalFilter::Equals(SamplingTime::Instant(t)) => {
                let t = encoded_tenths(t);
                encoded_tenths(&period.begin) <= t && t <= encoded_tenths(&period.end)
            }
            TemporalFilter::Equals(SamplingTime::Period(p)) | TemporalFilter::During(p) => {
                p.intersects(period)
            }
            TemporalFilter::Before(t) => period.begin < *t,
            TemporalFilter::After(t) => period.end > *t,
        }
    }
}

/// AND-composition of `filters` over one timestamp; no filter matches everything.
pub fn matches_all(filters: &[TemporalFilter], time: &NaiveDateTime) -> bool {
    filters.iter().all(|f| f.matches_instant(time))
}
