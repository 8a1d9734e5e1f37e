//! Phenomena, samples, observations, offerings and result templates.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::fmt;

use super::time::{iso, SamplingTime, TimePeriod};
use super::{FeatureId, FeatureOfInterest, ObservationId, OfferingId, PhenomenonId, ProcedureId, TemplateId};
use crate::filter::TemporalFilter;
use crate::services::encoding::TextEncoding;

/// An observed property, simple or composite.
///
/// A composite phenomenon lists its simple components in result-column order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Phenomenon {
    pub id: PhenomenonId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub components: Vec<PhenomenonId>,
}

impl Phenomenon {
    pub fn simple(id: impl Into<PhenomenonId>) -> Self {
        Self {
            id: id.into(),
            name: None,
            components: Vec::new(),
        }
    }

    pub fn composite(id: impl Into<PhenomenonId>, components: Vec<PhenomenonId>) -> Self {
        Self {
            id: id.into(),
            name: None,
            components,
        }
    }

    pub fn is_composite(&self) -> bool {
        !self.components.is_empty()
    }

    /// Ordered simple fields carried by a result of this phenomenon.
    pub fn fields(&self) -> Vec<PhenomenonId> {
        if self.components.is_empty() {
            vec![self.id.clone()]
        } else {
            self.components.clone()
        }
    }
}

/// One value of a sample row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Number(f64),
    Text(String),
    Missing,
}

impl FieldValue {
    /// Interpret a result token: empty is missing, numeric is a number.
    pub fn parse_token(token: &str) -> Self {
        let token = token.trim();
        if token.is_empty() {
            FieldValue::Missing
        } else if let Ok(v) = token.parse::<f64>() {
            FieldValue::Number(v)
        } else {
            FieldValue::Text(token.to_string())
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            FieldValue::Number(v) if v.is_finite() => Some(*v),
            _ => None,
        }
    }

    pub fn is_missing(&self) -> bool {
        matches!(self, FieldValue::Missing)
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            // integral doubles keep one decimal: 12.0, not 12
            FieldValue::Number(v) if v.is_finite() && v.fract() == 0.0 && v.abs() < 1e15 => {
                write!(f, "{:.1}", v)
            }
            FieldValue::Number(v) => write!(f, "{}", v),
            FieldValue::Text(s) => f.write_str(s),
            FieldValue::Missing => Ok(()),
        }
    }
}

impl From<f64> for FieldValue {
    fn from(v: f64) -> Self {
        FieldValue::Number(v)
    }
}

/// Atomic unit of a series: a timestamp and one value per field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    #[serde(with = "iso")]
    pub time: NaiveDateTime,
    pub values: Vec<FieldValue>,
}

impl Sample {
    pub fn new(time: NaiveDateTime, values: Vec<FieldValue>) -> Self {
        Self { time, values }
    }
}

/// Observation submitted through InsertObservation.
///
/// Feature and phenomenon are given in full so unknown ones can be registered
/// on the fly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewObservation {
    pub procedure: ProcedureId,
    pub feature_of_interest: FeatureOfInterest,
    pub observed_property: Phenomenon,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sampling_time: Option<SamplingTime>,
    #[serde(default)]
    pub result: Vec<Sample>,
}

impl NewObservation {
    /// Period enclosing the declared sampling time and every sample.
    pub fn enclosing_period(&self) -> Option<TimePeriod> {
        let mut period = self.sampling_time.map(|st| st.as_period());
        for sample in &self.result {
            match period.as_mut() {
                Some(p) => p.extend_to(sample.time),
                None => period = Some(TimePeriod::instant(sample.time)),
            }
        }
        period
    }
}

/// Observation returned by GetObservation and friends.
///
/// Feature and phenomenon are referenced by id; `fields` gives the column order
/// of every sample.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    pub id: ObservationId,
    pub procedure: ProcedureId,
    pub feature_of_interest: FeatureId,
    pub observed_property: PhenomenonId,
    pub fields: Vec<PhenomenonId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sampling_time: Option<SamplingTime>,
    pub result: Vec<Sample>,
}

/// Offering view recomputed from the series of its procedures.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Offering {
    pub id: OfferingId,
    pub procedures: Vec<ProcedureId>,
    pub observed_properties: Vec<PhenomenonId>,
    pub features_of_interest: Vec<FeatureId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_envelope: Option<TimePeriod>,
}

/// Stable handle for GetResult / InsertResult.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultTemplate {
    pub id: TemplateId,
    pub procedure: ProcedureId,
    pub offering: OfferingId,
    pub observed_property: PhenomenonId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feature_of_interest: Option<FeatureId>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub temporal_filters: Vec<TemporalFilter>,
    pub fields: Vec<PhenomenonId>,
    #[serde(default)]
    pub encoding: TextEncoding,
}
