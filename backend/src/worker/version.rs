//! Per-version parameter names, formats and requirements.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Protocol version of a request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum SosVersion {
    #[serde(rename = "1.0.0")]
    V100,
    #[default]
    #[serde(rename = "2.0.0")]
    V200,
}

pub const SENSORML_100: &str = "text/xml;subtype=\"sensorML/1.0.0\"";
pub const SENSORML_101: &str = "text/xml;subtype=\"sensorML/1.0.1\"";
pub const SENSORML_URI_100: &str = "http://www.opengis.net/sensorML/1.0.0";
pub const SENSORML_URI_101: &str = "http://www.opengis.net/sensorML/1.0.1";

pub const OM_100: &str = "text/xml; subtype=\"om/1.0.0\"";
pub const OM_200: &str = "http://www.opengis.net/om/2.0";

pub const RESULT_MODEL_OBSERVATION: &str = "om:Observation";
pub const RESULT_MODEL_MEASUREMENT: &str = "om:Measurement";

impl SosVersion {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim() {
            "1.0.0" => Some(Self::V100),
            "2.0.0" => Some(Self::V200),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::V100 => "1.0.0",
            Self::V200 => "2.0.0",
        }
    }

    /// Parameter carrying the sensor description format.
    pub fn description_format_locator(&self) -> &'static str {
        match self {
            Self::V100 => "outputFormat",
            Self::V200 => "procedureDescriptionFormat",
        }
    }

    pub fn sensor_formats(&self) -> &'static [&'static str] {
        match self {
            Self::V100 => &[SENSORML_100, SENSORML_101],
            Self::V200 => &[SENSORML_URI_100, SENSORML_URI_101],
        }
    }

    pub fn accepts_sensor_format(&self, format: &str) -> bool {
        let normalized = normalize_mime(format);
        self.sensor_formats().iter().any(|f| normalize_mime(f) == normalized)
    }

    pub fn observation_formats(&self) -> &'static [&'static str] {
        match self {
            Self::V100 => &[OM_100],
            Self::V200 => &[OM_200],
        }
    }

    /// Response format used when the request names none; 1.0.0 has no default.
    pub fn default_observation_format(&self) -> Option<&'static str> {
        match self {
            Self::V100 => None,
            Self::V200 => Some(OM_200),
        }
    }

    pub fn accepts_observation_format(&self, format: &str) -> bool {
        let normalized = normalize_mime(format);
        self.observation_formats()
            .iter()
            .any(|f| normalize_mime(f) == normalized)
    }

    /// Parameter naming the target of an InsertObservation.
    pub fn insert_target_locator(&self) -> &'static str {
        match self {
            Self::V100 => "AssignedSensorId",
            Self::V200 => "offering",
        }
    }

    pub fn result_template_locator(&self) -> &'static str {
        match self {
            Self::V100 => "ObservationTemplateId",
            Self::V200 => "template",
        }
    }
}

impl fmt::Display for SosVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Compare MIME types ignoring whitespace and case.
fn normalize_mime(value: &str) -> String {
    value
        .chars()
        .filter(|c| !c.is_whitespace())
        .flat_map(char::to_lowercase)
        .collect()
}

/// Accept a result model given as a prefixed name or a `{namespace}Local` QName.
pub fn parse_result_model(value: &str) -> Option<&'static str> {
    let value = value.trim();
    let local = value
        .strip_prefix("{http://www.opengis.net/om/1.0}")
        .or_else(|| value.strip_prefix("om:"))
        .unwrap_or(value);
    match local {
        "Observation" => Some(RESULT_MODEL_OBSERVATION),
        "Measurement" => Some(RESULT_MODEL_MEASUREMENT),
        _ => None,
    }
}
