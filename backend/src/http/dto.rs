//! Data Transfer Objects for the HTTP API.
//!
//! SOS requests and responses are served as-is; these types cover the
//! administrative endpoints around them.

use serde::{Deserialize, Serialize};

use crate::models::Sensor;
use crate::worker::ServiceStatus;

/// Health check response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub services: Vec<ServiceHealth>,
}

/// Lifecycle state of one configured service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceHealth {
    pub service_id: String,
    pub status: ServiceStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cause: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceListResponse {
    pub services: Vec<String>,
    pub total: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SensorListResponse {
    pub sensors: Vec<Sensor>,
    pub total: usize,
}

/// Query parameters of the CSV export.
///
/// `observedProperty` and `featureOfInterest` take comma-separated lists.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CsvParams {
    pub width: Option<usize>,
    pub observed_property: Option<String>,
    pub feature_of_interest: Option<String>,
    pub start: Option<String>,
    pub end: Option<String>,
}

/// Query parameters of the observation removal: comma-separated `procedure` ids.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProviderParams {
    pub procedure: Option<String>,
}

/// Split a comma-separated query value, dropping blanks.
pub fn split_list(value: Option<&str>) -> Vec<String> {
    value
        .map(|v| {
            v.split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_list() {
        assert_eq!(split_list(Some("a, b,,c")), vec!["a", "b", "c"]);
        assert!(split_list(None).is_empty());
        assert!(split_list(Some(" ")).is_empty());
    }
}
