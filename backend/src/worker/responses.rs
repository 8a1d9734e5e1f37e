//! SOS response documents.

use serde::{Deserialize, Serialize};

use super::version::SosVersion;
use crate::config::{ServiceIdentification, ServiceProvider};
use crate::models::{
    FeatureId, FeatureOfInterest, Observation, ObservationId, Offering, OfferingId, PhenomenonId,
    ProcedureId, TemplateId, TimePeriod,
};
use crate::services::encoding::TextEncoding;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationsMetadata {
    pub operations: Vec<String>,
    pub response_formats: Vec<String>,
    pub procedure_description_formats: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterCapabilities {
    pub temporal_operators: Vec<String>,
    pub spatial_operators: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Contents {
    pub offerings: Vec<Offering>,
}

/// GetCapabilities document; sections that were not requested are `None`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Capabilities {
    pub version: SosVersion,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub service_identification: Option<ServiceIdentification>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub service_provider: Option<ServiceProvider>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub operations_metadata: Option<OperationsMetadata>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filter_capabilities: Option<FilterCapabilities>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contents: Option<Contents>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SensorDescription {
    pub procedure: ProcedureId,
    pub format: String,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObservationCollection {
    pub observations: Vec<Observation>,
    /// Union of the member sampling times.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bounded_by: Option<TimePeriod>,
}

impl ObservationCollection {
    pub fn new(observations: Vec<Observation>) -> Self {
        let bounded_by = observations
            .iter()
            .filter_map(|o| o.sampling_time.map(|st| st.as_period()))
            .reduce(|a, b| a.union(&b));
        Self {
            observations,
            bounded_by,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.observations.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultValues {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub template: Option<TemplateId>,
    pub values: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultStructure {
    /// Columns after the leading time token.
    pub fields: Vec<PhenomenonId>,
    pub encoding: TextEncoding,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InsertedObservations {
    pub observation_ids: Vec<ObservationId>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InsertedTemplate {
    pub template: TemplateId,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InsertedResult {
    pub observation_id: ObservationId,
    pub inserted: usize,
    pub updated: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisteredSensor {
    pub procedure: ProcedureId,
    pub offering: OfferingId,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeletedSensor {
    pub procedure: ProcedureId,
    /// False when nothing was registered under the id.
    pub existed: bool,
}

/// Outcome of removing the observations of a set of procedures.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemovedObservations {
    pub procedures: Vec<ProcedureId>,
    /// Series dropped across all procedures; zero on a repeated call.
    pub removed_series: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeatureCollection {
    pub features: Vec<FeatureOfInterest>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeatureTime {
    pub feature: FeatureId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub period: Option<TimePeriod>,
}

/// Any SOS response, tagged by document kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "response")]
pub enum SosResponse {
    Capabilities(Capabilities),
    SensorDescription(SensorDescription),
    ObservationCollection(ObservationCollection),
    ResultValues(ResultValues),
    ResultStructure(ResultStructure),
    InsertedObservations(InsertedObservations),
    InsertedTemplate(InsertedTemplate),
    InsertedResult(InsertedResult),
    RegisteredSensor(RegisteredSensor),
    DeletedSensor(DeletedSensor),
    FeatureCollection(FeatureCollection),
    FeatureTime(FeatureTime),
}
