//! GetCapabilities negotiation and document assembly.

use super::fault::SosFault;
use super::requests::GetCapabilities;
use super::responses::{Capabilities, Contents, FilterCapabilities, OperationsMetadata};
use super::version::SosVersion;
use crate::config::SosConfiguration;
use crate::models::Offering;

const SECTIONS: [&str; 5] = [
    "ServiceIdentification",
    "ServiceProvider",
    "OperationsMetadata",
    "Filter_Capabilities",
    "Contents",
];

const ACCEPTED_FORMATS: [&str; 3] = ["text/xml", "application/xml", "application/json"];

/// Requested sections, in `SECTIONS` order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) struct SectionSet([bool; 5]);

impl SectionSet {
    fn all() -> Self {
        Self([true; 5])
    }

    fn has(&self, name: &str) -> bool {
        SECTIONS
            .iter()
            .position(|s| *s == name)
            .is_some_and(|i| self.0[i])
    }
}

/// Pick the version to answer with: the highest accepted one the service supports.
pub(super) fn negotiate_version(
    config: &SosConfiguration,
    request: &GetCapabilities,
) -> Result<SosVersion, SosFault> {
    let supported = |v: &SosVersion| config.supports_version(v.as_str());
    if request.accept_versions.is_empty() {
        return [SosVersion::V200, SosVersion::V100]
            .into_iter()
            .find(supported)
            .ok_or_else(|| SosFault::version_negotiation("The service supports no version"));
    }
    request
        .accept_versions
        .iter()
        .filter_map(|v| SosVersion::parse(v))
        .filter(supported)
        .max()
        .ok_or_else(|| {
            SosFault::version_negotiation(format!(
                "The parameter acceptVersions must contain a supported version: {}",
                config.supported_versions.join(", ")
            ))
        })
}

pub(super) fn check_formats(request: &GetCapabilities) -> Result<(), SosFault> {
    if request.accept_formats.is_empty()
        || request
            .accept_formats
            .iter()
            .any(|f| ACCEPTED_FORMATS.contains(&f.trim()))
    {
        return Ok(());
    }
    Err(SosFault::invalid(
        "acceptFormats",
        format!("accepted formats are: {}", ACCEPTED_FORMATS.join(", ")),
    ))
}

pub(super) fn parse_sections(request: &GetCapabilities) -> Result<SectionSet, SosFault> {
    if request.sections.is_empty() {
        return Ok(SectionSet::all());
    }
    let mut set = SectionSet([false; 5]);
    for name in &request.sections {
        let name = name.trim();
        if name == "All" {
            return Ok(SectionSet::all());
        }
        // 2.0.0 spells it without the underscore
        let canonical = if name == "FilterCapabilities" { "Filter_Capabilities" } else { name };
        match SECTIONS.iter().position(|s| *s == canonical) {
            Some(i) => set.0[i] = true,
            None => {
                return Err(SosFault::invalid(
                    "Sections",
                    format!("The section {} does not exist", name),
                ))
            }
        }
    }
    Ok(set)
}

fn operations(version: SosVersion) -> Vec<String> {
    let common = [
        "GetCapabilities",
        "DescribeSensor",
        "GetObservation",
        "GetObservationById",
        "GetResult",
        "InsertObservation",
        "DeleteSensor",
        "GetFeatureOfInterest",
        "GetFeatureOfInterestTime",
    ];
    let specific: &[&str] = match version {
        SosVersion::V100 => &["RegisterSensor"],
        SosVersion::V200 => &["InsertSensor", "GetResultTemplate", "InsertResultTemplate", "InsertResult"],
    };
    common.iter().chain(specific).map(|s| s.to_string()).collect()
}

pub(super) fn build(
    config: &SosConfiguration,
    version: SosVersion,
    sections: SectionSet,
    offerings: Vec<Offering>,
) -> Capabilities {
    Capabilities {
        version,
        service_identification: sections
            .has("ServiceIdentification")
            .then(|| config.service.clone()),
        service_provider: sections.has("ServiceProvider").then(|| config.provider.clone()),
        operations_metadata: sections.has("OperationsMetadata").then(|| OperationsMetadata {
            operations: operations(version),
            response_formats: version.observation_formats().iter().map(|s| s.to_string()).collect(),
            procedure_description_formats: version.sensor_formats().iter().map(|s| s.to_string()).collect(),
        }),
        filter_capabilities: sections.has("Filter_Capabilities").then(|| FilterCapabilities {
            temporal_operators: ["TEquals", "TBefore", "TAfter", "TDuring"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            spatial_operators: vec!["BBOX".to_string()],
        }),
        contents: sections.has("Contents").then(|| Contents { offerings }),
    }
}
