//! Version-agnostic SOS request model.
//!
//! Optional parameters are `Option`s so the worker can tell a missing value
//! from an invalid one and report the right exception code.

use serde::{Deserialize, Serialize};

use super::version::SosVersion;
use crate::filter::{BBoxFilter, TemporalFilter};
use crate::models::{FeatureOfInterest, NewObservation, ObservationKind, Phenomenon, SensorKind};
use crate::services::encoding::TextEncoding;

/// How GetObservation returns its result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ResponseMode {
    Inline,
    ResultTemplate,
    Attached,
    OutOfBand,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GetCapabilities {
    pub accept_versions: Vec<String>,
    pub accept_formats: Vec<String>,
    pub sections: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DescribeSensor {
    pub version: SosVersion,
    pub procedure: Option<String>,
    /// `outputFormat` in 1.0.0, `procedureDescriptionFormat` in 2.0.0.
    pub description_format: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GetObservation {
    pub version: SosVersion,
    pub response_format: Option<String>,
    pub result_model: Option<String>,
    pub response_mode: Option<ResponseMode>,
    pub offerings: Vec<String>,
    pub procedures: Vec<String>,
    pub observed_properties: Vec<String>,
    pub features_of_interest: Vec<String>,
    pub temporal_filters: Vec<TemporalFilter>,
    pub bbox: Option<BBoxFilter>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GetObservationById {
    pub version: SosVersion,
    pub observation_ids: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GetResult {
    pub version: SosVersion,
    pub template: Option<String>,
    pub offering: Option<String>,
    pub observed_property: Option<String>,
    pub features_of_interest: Vec<String>,
    pub temporal_filters: Vec<TemporalFilter>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GetResultTemplate {
    pub version: SosVersion,
    pub offering: Option<String>,
    pub observed_property: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct InsertObservation {
    pub version: SosVersion,
    pub assigned_sensor_id: Option<String>,
    pub offerings: Vec<String>,
    pub observations: Vec<NewObservation>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct InsertResultTemplate {
    pub version: SosVersion,
    /// Client-chosen template identifier.
    pub identifier: Option<String>,
    pub offering: Option<String>,
    pub procedure: Option<String>,
    pub observed_property: Option<String>,
    pub feature_of_interest: Option<FeatureOfInterest>,
    pub encoding: Option<TextEncoding>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct InsertResult {
    pub version: SosVersion,
    pub template: Option<String>,
    pub result_values: Option<String>,
}

/// 1.0.0 observation template of a RegisterSensor request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ObservationTemplate {
    pub observed_property: Option<Phenomenon>,
    pub feature_of_interest: Option<FeatureOfInterest>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RegisterSensor {
    pub version: SosVersion,
    /// Identifier to register under; generated when absent.
    pub procedure_id: Option<String>,
    pub procedure_description_format: Option<String>,
    pub sensor_description: Option<String>,
    pub kind: SensorKind,
    pub observation_type: ObservationKind,
    pub parent: Option<String>,
    pub observation_template: Option<ObservationTemplate>,
    pub observable_properties: Vec<Phenomenon>,
    pub feature_of_interest: Option<FeatureOfInterest>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DeleteSensor {
    pub version: SosVersion,
    pub procedure: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GetFeatureOfInterest {
    pub version: SosVersion,
    pub feature_ids: Vec<String>,
    /// `location` in 1.0.0.
    pub bbox: Option<BBoxFilter>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GetFeatureOfInterestTime {
    pub version: SosVersion,
    pub feature_id: Option<String>,
}

/// Any SOS request, tagged by operation name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "request")]
pub enum SosRequest {
    GetCapabilities(GetCapabilities),
    DescribeSensor(DescribeSensor),
    GetObservation(GetObservation),
    GetObservationById(GetObservationById),
    GetResult(GetResult),
    GetResultTemplate(GetResultTemplate),
    InsertObservation(InsertObservation),
    InsertResultTemplate(InsertResultTemplate),
    InsertResult(InsertResult),
    #[serde(alias = "InsertSensor")]
    RegisterSensor(RegisterSensor),
    DeleteSensor(DeleteSensor),
    GetFeatureOfInterest(GetFeatureOfInterest),
    GetFeatureOfInterestTime(GetFeatureOfInterestTime),
}

impl SosRequest {
    pub fn operation(&self) -> &'static str {
        match self {
            Self::GetCapabilities(_) => "GetCapabilities",
            Self::DescribeSensor(_) => "DescribeSensor",
            Self::GetObservation(_) => "GetObservation",
            Self::GetObservationById(_) => "GetObservationById",
            Self::GetResult(_) => "GetResult",
            Self::GetResultTemplate(_) => "GetResultTemplate",
            Self::InsertObservation(_) => "InsertObservation",
            Self::InsertResultTemplate(_) => "InsertResultTemplate",
            Self::InsertResult(_) => "InsertResult",
            Self::RegisterSensor(_) => "RegisterSensor",
            Self::DeleteSensor(_) => "DeleteSensor",
            Self::GetFeatureOfInterest(_) => "GetFeatureOfInterest",
            Self::GetFeatureOfInterestTime(_) => "GetFeatureOfInterestTime",
        }
    }
}
