//! Ordered sample series and the last-write-wins merge.
//!
//! A series holds every row of one (procedure, phenomenon, feature) triple in a
//! `BTreeMap`, so keys stay unique and ascending whatever the insert order.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::hash::{Hash, Hasher};

use super::repository::{ErrorContext, RepositoryError, RepositoryResult};
use crate::filter::{matches_all, TemporalFilter};
use crate::models::{
    FeatureId, FieldValue, ObservationKind, PhenomenonId, ProcedureId, Sample, TimePeriod,
};

/// Value of the profile axis, totally ordered.
#[derive(Debug, Clone, Copy)]
pub struct AxisValue(pub f64);

impl AxisValue {
    fn normalized(&self) -> f64 {
        // fold -0.0 onto 0.0 so they key the same row
        if self.0 == 0.0 {
            0.0
        } else {
            self.0
        }
    }
}

impl PartialEq for AxisValue {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for AxisValue {}

impl PartialOrd for AxisValue {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for AxisValue {
    fn cmp(&self, other: &Self) -> Ordering {
        self.normalized().total_cmp(&other.normalized())
    }
}

impl Hash for AxisValue {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.normalized().to_bits().hash(state);
    }
}

/// Position of a row: its timestamp, plus the axis value for profiles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SampleKey {
    pub time: NaiveDateTime,
    pub axis: Option<AxisValue>,
}

/// Identity of a series.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SeriesKey {
    pub procedure: ProcedureId,
    pub phenomenon: PhenomenonId,
    pub feature: FeatureId,
}

/// Outcome of one merge.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergeSummary {
    /// Rows added at a new key.
    pub inserted: usize,
    /// Rows that overwrote an existing key.
    pub updated: usize,
}

/// Read-only copy of (part of) a series.
#[derive(Debug, Clone, PartialEq)]
pub struct SeriesSlice {
    pub key: SeriesKey,
    pub fields: Vec<PhenomenonId>,
    pub shape: ObservationKind,
    /// Enclosing sampling period of the whole series, not only of `samples`.
    pub period: Option<TimePeriod>,
    pub samples: Vec<Sample>,
}

#[derive(Debug, Clone)]
pub struct TimeSeries {
    key: SeriesKey,
    fields: Vec<PhenomenonId>,
    shape: ObservationKind,
    rows: BTreeMap<SampleKey, Vec<FieldValue>>,
    period: Option<TimePeriod>,
}

impl TimeSeries {
    pub fn new(key: SeriesKey, fields: Vec<PhenomenonId>, shape: ObservationKind) -> Self {
        Self {
            key,
            fields,
            shape,
            rows: BTreeMap::new(),
            period: None,
        }
    }

    pub fn key(&self) -> &SeriesKey {
        &self.key
    }

    pub fn fields(&self) -> &[PhenomenonId] {
        &self.fields
    }

    pub fn shape(&self) -> ObservationKind {
        self.shape
    }

    pub fn period(&self) -> Option<TimePeriod> {
        self.period
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Check that every row fits this series before anything is written.
    pub fn validate(
        samples: &[Sample],
        field_count: usize,
        shape: ObservationKind,
    ) -> RepositoryResult<()> {
        for (i, sample) in samples.iter().enumerate() {
            if sample.values.len() != field_count {
                return Err(RepositoryError::validation_with_context(
                    format!(
                        "row {} has {} values, expected {}",
                        i,
                        sample.values.len(),
                        field_count
                    ),
                    ErrorContext::new("merge").with_entity("series"),
                ));
            }
            if shape == ObservationKind::Profile
                && sample.values.first().and_then(FieldValue::as_f64).is_none()
            {
                return Err(RepositoryError::validation_with_context(
                    format!("row {} has no numeric profile axis value", i),
                    ErrorContext::new("merge").with_entity("series"),
                ));
            }
        }
        Ok(())
    }

    fn key_for(&self, sample: &Sample) -> SampleKey {
        let axis = match self.shape {
            ObservationKind::Timeseries => None,
            ObservationKind::Profile => sample.values.first().and_then(FieldValue::as_f64).map(AxisValue),
        };
        SampleKey {
            time: sample.time,
            axis,
        }
    }

    /// Merge `samples` into the series.
    ///
    /// A row at an existing key replaces the stored row; other rows are inserted
    /// in key order. The enclosing period widens to cover `declared` and every
    /// incoming timestamp. Nothing is written when validation fails.
    pub fn merge(
        &mut self,
        samples: &[Sample],
        declared: Option<TimePeriod>,
    ) -> RepositoryResult<MergeSummary> {
        Self::validate(samples, self.fields.len(), self.shape)
            .map_err(|e| e.with_operation(format!("merge into {}", self.key.procedure)))?;

        let mut summary = MergeSummary::default();
        for sample in samples {
            let key = self.key_for(sample);
            if self.rows.insert(key, sample.values.clone()).is_some() {
                summary.updated += 1;
            } else {
                summary.inserted += 1;
            }
            self.widen(TimePeriod::instant(sample.time));
        }
        if let Some(p) = declared {
            self.widen(p);
        }
        Ok(summary)
    }

    fn widen(&mut self, period: TimePeriod) {
        self.period = Some(match self.period {
            Some(current) => current.union(&period),
            None => period,
        });
    }

    /// All rows in ascending key order.
    pub fn samples(&self) -> Vec<Sample> {
        self.select(&[])
    }

    /// Rows whose timestamp satisfies every filter, ascending.
    pub fn select(&self, filters: &[TemporalFilter]) -> Vec<Sample> {
        if let Some(period) = self.period {
            if !filters.iter().all(|f| f.may_overlap(&period)) {
                return Vec::new();
            }
        }
        self.rows
            .iter()
            .filter(|(key, _)| matches_all(filters, &key.time))
            .map(|(key, values)| Sample::new(key.time, values.clone()))
            .collect()
    }

    /// Rows inside `period`, both bounds included.
    pub fn select_within(&self, period: &TimePeriod) -> Vec<Sample> {
        let lower = SampleKey {
            time: period.begin,
            axis: None,
        };
        self.rows
            .range(lower..)
            .take_while(|(key, _)| key.time <= period.end)
            .map(|(key, values)| Sample::new(key.time, values.clone()))
            .collect()
    }

    pub fn snapshot(&self, filters: &[TemporalFilter]) -> SeriesSlice {
        SeriesSlice {
            key: self.key.clone(),
            fields: self.fields.clone(),
            shape: self.shape,
            period: self.period,
            samples: self.select(filters),
        }
    }
}
