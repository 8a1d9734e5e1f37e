//! HTTP error handling and response types.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::services::ConfigurerError;
use crate::worker::SosFault;

/// API error response body for failures outside the SOS protocol.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiError {
    /// Error code for programmatic handling
    pub code: String,
    /// Human-readable error message
    pub message: String,
}

impl ApiError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }
}

/// OGC exception report wrapping a worker fault.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExceptionReport {
    pub version: String,
    pub exceptions: Vec<SosFault>,
}

impl ExceptionReport {
    pub fn new(fault: SosFault) -> Self {
        Self {
            version: "1.0.0".to_string(),
            exceptions: vec![fault],
        }
    }
}

/// Application error type for HTTP handlers.
#[derive(Debug)]
pub enum AppError {
    /// Protocol fault raised by a worker
    Fault(SosFault),
    /// No service under the requested id
    UnknownService(String),
    /// Invalid request (validation error)
    BadRequest(String),
    /// Internal server error
    Internal(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match self {
            AppError::Fault(fault) => {
                let status = if fault.is_lifecycle() {
                    StatusCode::SERVICE_UNAVAILABLE
                } else {
                    StatusCode::BAD_REQUEST
                };
                (status, Json(ExceptionReport::new(fault))).into_response()
            }
            AppError::UnknownService(id) => (
                StatusCode::NOT_FOUND,
                Json(ApiError::new("UNKNOWN_SERVICE", format!("no service is configured under '{}'", id))),
            )
                .into_response(),
            AppError::BadRequest(msg) => {
                (StatusCode::BAD_REQUEST, Json(ApiError::new("BAD_REQUEST", msg))).into_response()
            }
            AppError::Internal(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiError::new("INTERNAL_ERROR", msg)),
            )
                .into_response(),
        }
    }
}

impl From<SosFault> for AppError {
    fn from(fault: SosFault) -> Self {
        AppError::Fault(fault)
    }
}

impl From<ConfigurerError> for AppError {
    fn from(err: ConfigurerError) -> Self {
        match err {
            ConfigurerError::UnknownService(id) => AppError::UnknownService(id),
            ConfigurerError::Fault(fault) => AppError::Fault(fault),
            ConfigurerError::Config(e) => AppError::Internal(e.to_string()),
        }
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::Internal(err.to_string())
    }
}
