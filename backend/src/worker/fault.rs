//! OGC exception reports raised by the worker.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::db::RepositoryError;

/// OWS exception codes used by the SOS operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ExceptionCode {
    MissingParameterValue,
    InvalidParameterValue,
    VersionNegotiationFailed,
    OperationNotSupported,
    NoApplicableCode,
}

impl ExceptionCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MissingParameterValue => "MissingParameterValue",
            Self::InvalidParameterValue => "InvalidParameterValue",
            Self::VersionNegotiationFailed => "VersionNegotiationFailed",
            Self::OperationNotSupported => "OperationNotSupported",
            Self::NoApplicableCode => "NoApplicableCode",
        }
    }
}

impl fmt::Display for ExceptionCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A failed SOS request: exception code, offending parameter and message.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("{code}{}: {message}", bracketed(.locator))]
#[serde(rename_all = "camelCase")]
pub struct SosFault {
    #[serde(rename = "exceptionCode")]
    pub code: ExceptionCode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub locator: Option<String>,
    #[serde(rename = "exceptionText")]
    pub message: String,
}

impl SosFault {
    pub fn new(code: ExceptionCode, locator: Option<&str>, message: impl Into<String>) -> Self {
        Self {
            code,
            locator: locator.map(str::to_string),
            message: message.into(),
        }
    }

    pub fn missing(locator: &str) -> Self {
        Self::new(
            ExceptionCode::MissingParameterValue,
            Some(locator),
            format!("{} must be specified", locator),
        )
    }

    pub fn invalid(locator: &str, message: impl Into<String>) -> Self {
        Self::new(ExceptionCode::InvalidParameterValue, Some(locator), message)
    }

    pub fn version_negotiation(message: impl Into<String>) -> Self {
        Self::new(ExceptionCode::VersionNegotiationFailed, Some("acceptVersion"), message)
    }

    pub fn not_supported(locator: &str, message: impl Into<String>) -> Self {
        Self::new(ExceptionCode::OperationNotSupported, Some(locator), message)
    }

    pub fn no_applicable(message: impl Into<String>) -> Self {
        Self::new(ExceptionCode::NoApplicableCode, None, message)
    }

    pub fn no_applicable_at(locator: &str, message: impl Into<String>) -> Self {
        Self::new(ExceptionCode::NoApplicableCode, Some(locator), message)
    }

    /// Whether the fault comes from the service lifecycle rather than the request.
    pub fn is_lifecycle(&self) -> bool {
        self.code == ExceptionCode::NoApplicableCode
            && self.locator.is_none()
            && (self.message.starts_with(NOT_RUNNING) || self.message.starts_with(SHUTDOWN))
    }
}

fn bracketed(locator: &Option<String>) -> String {
    locator.as_deref().map(|l| format!(" [{}]", l)).unwrap_or_default()
}

pub(crate) const NOT_RUNNING: &str = "The service is not running!";
pub(crate) const SHUTDOWN: &str = "The service has been shutdown";

impl From<RepositoryError> for SosFault {
    fn from(err: RepositoryError) -> Self {
        SosFault::no_applicable(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_includes_locator() {
        let fault = SosFault::missing("procedure");
        assert_eq!(
            fault.to_string(),
            "MissingParameterValue [procedure]: procedure must be specified"
        );
        assert_eq!(
            SosFault::no_applicable("boom").to_string(),
            "NoApplicableCode: boom"
        );
    }

    #[test]
    fn test_json_shape() {
        let json = serde_json::to_value(SosFault::invalid("offering", "unknown")).unwrap();
        assert_eq!(json["exceptionCode"], "InvalidParameterValue");
        assert_eq!(json["locator"], "offering");
        assert_eq!(json["exceptionText"], "unknown");
    }

    #[test]
    fn test_lifecycle_detection() {
        assert!(SosFault::no_applicable(format!("{} cause", NOT_RUNNING)).is_lifecycle());
        assert!(SosFault::no_applicable(SHUTDOWN).is_lifecycle());
        assert!(!SosFault::no_applicable_at("responseMode", "out of band").is_lifecycle());
    }
}
