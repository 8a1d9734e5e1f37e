//! Worker lifecycle: configuration loading, shutdown and restart.

mod support;

use std::sync::{Arc, Mutex};

use examind_sos::config::{InMemoryConfigStore, ServiceConfigStore, SosConfiguration};
use examind_sos::db::LocalRepository;
use examind_sos::models::ProcedureId;
use examind_sos::services::{EventBus, SosEvent};
use examind_sos::worker::{
    DescribeSensor, ExceptionCode, GetCapabilities, ServiceStatus, SosVersion, SosWorker,
};
use support::*;

fn describe(worker: &SosWorker, procedure: &str) -> Result<String, examind_sos::worker::SosFault> {
    worker
        .describe_sensor(&DescribeSensor {
            version: SosVersion::V200,
            procedure: Some(procedure.to_string()),
            description_format: Some(SENSORML.to_string()),
        })
        .map(|d| d.description)
}

#[test]
fn test_destroy_then_init_restores_running() {
    let (worker, _) = geom_worker();
    assert_eq!(worker.status(), ServiceStatus::Running);

    worker.destroy();
    assert_eq!(worker.status(), ServiceStatus::Destroyed);
    let err = describe(&worker, SENSOR_3).unwrap_err();
    assert_eq!(err.code, ExceptionCode::NoApplicableCode);
    assert!(err.message.contains("The service has been shutdown"));

    assert_eq!(worker.init_worker(), ServiceStatus::Running);
    assert!(describe(&worker, SENSOR_3).is_ok());
}

#[test]
fn test_store_data_survives_restart() {
    let (worker, repo) = geom_worker();
    worker.destroy();
    worker.init_worker();
    assert_eq!(repo.series_count(), 2);
}

#[test]
fn test_unconfigured_service_reports_null_configuration() {
    let store = Arc::new(InMemoryConfigStore::new());
    let worker = SosWorker::new(SERVICE, store.clone(), Arc::new(LocalRepository::new()), EventBus::new());
    assert_eq!(worker.status(), ServiceStatus::Uninitialized);

    let err = worker.get_capabilities(&GetCapabilities::default()).unwrap_err();
    assert_eq!(err.code, ExceptionCode::NoApplicableCode);
    assert_eq!(
        err.message,
        "The service is not running!\ncause: configuration object is null"
    );

    // configuring the service and restarting brings it up
    store.save(SERVICE, &SosConfiguration::default()).unwrap();
    assert_eq!(worker.init_worker(), ServiceStatus::Running);
    assert!(worker.start_error().is_none());
}

#[test]
fn test_invalid_configuration_reports_cause() {
    let store = config_store("supported_versions = []");
    let worker = SosWorker::new(SERVICE, store, Arc::new(LocalRepository::new()), EventBus::new());
    assert_eq!(worker.status(), ServiceStatus::Uninitialized);
    let err = describe(&worker, SENSOR_3).unwrap_err();
    assert!(err.message.contains("configuration object is malformed"));
}

#[test]
fn test_unhealthy_store_leaves_worker_configured() {
    let repo = LocalRepository::new();
    repo.set_healthy(false);
    let worker = SosWorker::new(SERVICE, config_store(""), Arc::new(repo.clone()), EventBus::new());
    assert_eq!(worker.status(), ServiceStatus::Configured);
    assert!(worker.configuration().is_some());
    let err = describe(&worker, SENSOR_3).unwrap_err();
    assert!(err.message.contains("the observation store is unavailable"));
}

#[test]
fn test_state_changes_are_published() {
    let events = EventBus::new();
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    events.subscribe("recorder", move |event| {
        if let SosEvent::ServiceStateChanged { state, .. } = event {
            sink.lock().unwrap().push(state.clone());
        }
        Ok(())
    });

    let worker = SosWorker::new(SERVICE, config_store(""), Arc::new(LocalRepository::new()), events);
    worker.destroy();
    worker.init_worker();
    assert_eq!(*seen.lock().unwrap(), vec!["running", "destroyed", "running"]);
}

#[test]
fn test_deleted_sensor_is_no_longer_described() {
    let (worker, _) = geom_worker();
    let deleted = worker
        .delete_sensor(&examind_sos::worker::DeleteSensor {
            version: SosVersion::V200,
            procedure: Some(SENSOR_3.to_string()),
        })
        .unwrap();
    assert!(deleted.existed);

    let err = describe(&worker, SENSOR_3).unwrap_err();
    assert_eq!(err.code, ExceptionCode::InvalidParameterValue);
    assert_eq!(err.locator.as_deref(), Some("procedure"));
    assert!(err.message.contains("this sensor is not registered"));
}

#[test]
fn test_delete_provider_removes_observations_only() {
    let (worker, repo) = geom_worker();
    let removed = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&removed);
    worker.events().subscribe("recorder", move |event| {
        if let SosEvent::ObservationsRemoved { procedure, series, .. } = event {
            sink.lock().unwrap().push((procedure.to_string(), *series));
        }
        Ok(())
    });

    let procedures: Vec<ProcedureId> = vec![SENSOR_3.into(), SENSOR_8.into(), "urn:ogc:object:sensor:GEOM:404".into()];
    let first = worker.delete_provider(&procedures).unwrap();
    assert_eq!(first.removed_series, 2);
    assert_eq!(repo.series_count(), 0);
    // sensors stay registered
    assert!(describe(&worker, SENSOR_3).is_ok());

    let again = worker.delete_provider(&procedures).unwrap();
    assert_eq!(again.removed_series, 0);
    assert_eq!(
        *removed.lock().unwrap(),
        vec![(SENSOR_3.to_string(), 1), (SENSOR_8.to_string(), 1)]
    );

    let err = worker.delete_provider(&[]).unwrap_err();
    assert_eq!(err.code, ExceptionCode::MissingParameterValue);
    assert_eq!(err.locator.as_deref(), Some("procedure"));
}
