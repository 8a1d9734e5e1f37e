//! Sensors (procedures) and their registration metadata.

use serde::{Deserialize, Serialize};

use super::ProcedureId;

/// SensorML process kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SensorKind {
    #[default]
    System,
    Component,
}

/// Shape of the series a sensor produces.
///
/// Profile sensors index their rows by the first field (a vertical or
/// along-curve coordinate) instead of by time alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ObservationKind {
    #[default]
    Timeseries,
    Profile,
}

/// A registered procedure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sensor {
    pub id: ProcedureId,
    #[serde(default)]
    pub kind: SensorKind,
    #[serde(default)]
    pub observation_kind: ObservationKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<ProcedureId>,
    /// Format the description was registered with.
    pub description_format: String,
    /// SensorML document, opaque to the service.
    pub description: String,
}

impl Sensor {
    pub fn is_profile(&self) -> bool {
        self.observation_kind == ObservationKind::Profile
    }
}
