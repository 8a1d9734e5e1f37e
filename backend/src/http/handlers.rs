//! HTTP handlers for the SOS API.
//!
//! Workers are synchronous and in-memory, so handlers call them directly.

use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::IntoResponse,
    Json,
};

use super::dto::{
    split_list, CsvParams, HealthResponse, ProviderParams, SensorListResponse, ServiceHealth, ServiceListResponse,
};
use super::error::AppError;
use super::state::AppState;
use crate::models::{parse_time, FeatureId, PhenomenonId, ProcedureId};
use crate::worker::{
    CsvQuery, DeletedSensor, RemovedObservations, ServiceStatus, SosFault, SosRequest, SosResponse,
};

/// Result type for handlers.
pub type HandlerResult<T> = Result<Json<T>, AppError>;

// =============================================================================
// Health Check
// =============================================================================

/// GET /health
///
/// Lifecycle state of every configured service.
pub async fn health_check(State(state): State<AppState>) -> HandlerResult<HealthResponse> {
    let mut services = Vec::new();
    for service_id in state.configurer.list_services()? {
        let health = match state.configurer.worker(&service_id) {
            Ok(worker) => ServiceHealth {
                service_id,
                status: worker.status(),
                cause: worker.start_error(),
            },
            Err(e) => ServiceHealth {
                service_id,
                status: ServiceStatus::Uninitialized,
                cause: Some(e.to_string()),
            },
        };
        services.push(health);
    }

    let all_running = services.iter().all(|s| s.status == ServiceStatus::Running);
    Ok(Json(HealthResponse {
        status: if all_running { "ok" } else { "degraded" }.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        services,
    }))
}

// =============================================================================
// Services
// =============================================================================

/// GET /sos
pub async fn list_services(State(state): State<AppState>) -> HandlerResult<ServiceListResponse> {
    let services = state.configurer.list_services()?;
    let total = services.len();
    Ok(Json(ServiceListResponse { services, total }))
}

/// POST /sos/{service_id}
///
/// Serve one SOS request, tagged by its `request` field.
pub async fn sos_request(
    State(state): State<AppState>,
    Path(service_id): Path<String>,
    Json(request): Json<SosRequest>,
) -> HandlerResult<SosResponse> {
    let worker = state.configurer.worker(&service_id)?;
    tracing::debug!(service = %service_id, operation = request.operation(), "SOS request");
    Ok(Json(worker.handle(&request)?))
}

/// POST /sos/{service_id}/restart
pub async fn restart_service(
    State(state): State<AppState>,
    Path(service_id): Path<String>,
) -> HandlerResult<ServiceHealth> {
    let worker = state.configurer.worker(&service_id)?;
    let status = worker.init_worker();
    Ok(Json(ServiceHealth {
        service_id,
        status,
        cause: worker.start_error(),
    }))
}

// =============================================================================
// Sensors
// =============================================================================

/// GET /sos/{service_id}/sensors
pub async fn list_sensors(
    State(state): State<AppState>,
    Path(service_id): Path<String>,
) -> HandlerResult<SensorListResponse> {
    let sensors = state.configurer.list_sensors(&service_id)?;
    let total = sensors.len();
    Ok(Json(SensorListResponse { sensors, total }))
}

/// DELETE /sos/{service_id}/sensors/{sensor_id}
pub async fn delete_sensor(
    State(state): State<AppState>,
    Path((service_id, sensor_id)): Path<(String, String)>,
) -> HandlerResult<DeletedSensor> {
    Ok(Json(state.configurer.remove_sensor(&service_id, &sensor_id)?))
}

/// DELETE /sos/{service_id}/observations?procedure=a,b
///
/// Removes the observations of the listed sensors; the sensors stay registered.
pub async fn delete_provider(
    State(state): State<AppState>,
    Path(service_id): Path<String>,
    Query(params): Query<ProviderParams>,
) -> HandlerResult<RemovedObservations> {
    let procedures = split_list(params.procedure.as_deref());
    let procedures: Vec<&str> = procedures.iter().map(String::as_str).collect();
    Ok(Json(state.configurer.delete_provider(&service_id, &procedures)?))
}

/// GET /sos/{service_id}/sensors/{sensor_id}/csv
///
/// Query: `width`, `observedProperty`, `featureOfInterest`, `start`, `end`.
pub async fn sensor_csv(
    State(state): State<AppState>,
    Path((service_id, sensor_id)): Path<(String, String)>,
    Query(params): Query<CsvParams>,
) -> Result<impl IntoResponse, AppError> {
    let bound = |value: Option<&str>, locator: &str| {
        value
            .filter(|v| !v.trim().is_empty())
            .map(|v| parse_time(v).map_err(|e| SosFault::invalid(locator, e.to_string())))
            .transpose()
    };
    let query = CsvQuery {
        procedure: ProcedureId::from(sensor_id),
        observed_properties: split_list(params.observed_property.as_deref())
            .into_iter()
            .map(PhenomenonId::from)
            .collect(),
        features_of_interest: split_list(params.feature_of_interest.as_deref())
            .into_iter()
            .map(FeatureId::from)
            .collect(),
        start: bound(params.start.as_deref(), "start")?,
        end: bound(params.end.as_deref(), "end")?,
        width: params.width,
    };

    let worker = state.configurer.worker(&service_id)?;
    let csv = worker.export_csv(&query)?;
    Ok((StatusCode::OK, [(header::CONTENT_TYPE, "text/csv; charset=utf-8")], csv))
}
