//! Administrative entry point over the SOS workers of every configured service.
//!
//! The configurer creates workers lazily, one per service id, each with its own
//! observation store built from the service's `[repository]` settings. Workers
//! share one [`EventBus`].

use chrono::NaiveDateTime;
use log::{info, warn};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

use crate::config::{ConfigError, ServiceConfigStore, SosConfiguration};
use crate::db::{RepositoryFactory, RepositoryType};
use crate::models::{FeatureId, PhenomenonId, ProcedureId, Sensor};
use crate::services::events::EventBus;
use crate::worker::{
    CsvQuery, DeleteSensor, DeletedSensor, RemovedObservations, ServiceStatus, SosFault, SosVersion, SosWorker,
};

/// Errors of the administrative operations.
#[derive(Debug, Error)]
pub enum ConfigurerError {
    #[error("no service is configured under '{0}'")]
    UnknownService(String),
    #[error(transparent)]
    Fault(#[from] SosFault),
    #[error(transparent)]
    Config(#[from] ConfigError),
}

pub type ConfigurerResult<T> = Result<T, ConfigurerError>;

/// Registry of the running SOS workers.
pub struct SosConfigurer {
    config_store: Arc<dyn ServiceConfigStore>,
    workers: RwLock<HashMap<String, Arc<SosWorker>>>,
    events: EventBus,
}

impl SosConfigurer {
    pub fn new(config_store: Arc<dyn ServiceConfigStore>) -> Self {
        Self::with_events(config_store, EventBus::new())
    }

    pub fn with_events(config_store: Arc<dyn ServiceConfigStore>, events: EventBus) -> Self {
        Self {
            config_store,
            workers: RwLock::new(HashMap::new()),
            events,
        }
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    pub fn config_store(&self) -> &Arc<dyn ServiceConfigStore> {
        &self.config_store
    }

    /// Ids of every configured service, sorted.
    pub fn list_services(&self) -> ConfigurerResult<Vec<String>> {
        Ok(self.config_store.list_services()?)
    }

    /// Worker of `service_id`, started on first use.
    ///
    /// A worker whose configuration later turns out broken is still returned;
    /// its operations report the cause.
    pub fn worker(&self, service_id: &str) -> ConfigurerResult<Arc<SosWorker>> {
        if let Some(worker) = self.workers.read().get(service_id) {
            return Ok(Arc::clone(worker));
        }

        if self.config_store.load_raw(service_id)?.is_none() {
            return Err(ConfigurerError::UnknownService(service_id.to_string()));
        }
        let repo_type = match self.config_store.load(service_id) {
            Ok(Some(config)) => config.repository.repo_type,
            Ok(None) => RepositoryType::default(),
            Err(e) => {
                warn!("Service {} has an unusable configuration: {}", service_id, e);
                RepositoryType::default()
            }
        };
        let repository = RepositoryFactory::create(repo_type).map_err(SosFault::from)?;

        let mut workers = self.workers.write();
        // another caller may have won the race while the store was built
        let worker = workers.entry(service_id.to_string()).or_insert_with(|| {
            info!("Starting SOS worker {} on a {:?} store", service_id, repo_type);
            Arc::new(SosWorker::new(
                service_id,
                Arc::clone(&self.config_store),
                repository,
                self.events.clone(),
            ))
        });
        Ok(Arc::clone(worker))
    }

    /// Store a configuration and restart the service's worker, if one runs.
    pub fn configure(&self, service_id: &str, config: &SosConfiguration) -> ConfigurerResult<ServiceStatus> {
        self.config_store.save(service_id, config)?;
        let existing = self.workers.read().get(service_id).cloned();
        match existing {
            Some(worker) => Ok(worker.init_worker()),
            None => Ok(self.worker(service_id)?.status()),
        }
    }

    /// Re-read the configuration of a service and restart it.
    pub fn restart(&self, service_id: &str) -> ConfigurerResult<ServiceStatus> {
        Ok(self.worker(service_id)?.init_worker())
    }

    /// Shut a service down; its worker stays registered and can be restarted.
    pub fn stop(&self, service_id: &str) -> ConfigurerResult<()> {
        self.worker(service_id)?.destroy();
        Ok(())
    }

    /// Destroy every worker.
    pub fn shutdown(&self) {
        for (_, worker) in self.workers.write().drain() {
            worker.destroy();
        }
    }

    /// Samples of one sensor as CSV, decimated to `width` buckets.
    ///
    /// # Arguments
    /// * `procedure` - Sensor id
    /// * `observed_properties` - Columns to export; every field of the sensor when empty
    /// * `features` - Features of interest to restrict to; all when empty
    /// * `start`, `end` - Optional inclusive time bounds
    /// * `width` - Decimation width; zero exports every row
    #[allow(clippy::too_many_arguments)]
    pub fn get_decimated_observations_csv(
        &self,
        service_id: &str,
        procedure: &str,
        observed_properties: &[&str],
        features: &[&str],
        start: Option<NaiveDateTime>,
        end: Option<NaiveDateTime>,
        width: usize,
    ) -> ConfigurerResult<String> {
        let query = CsvQuery {
            procedure: ProcedureId::from(procedure),
            observed_properties: observed_properties.iter().map(|p| PhenomenonId::from(*p)).collect(),
            features_of_interest: features.iter().map(|f| FeatureId::from(*f)).collect(),
            start,
            end,
            width: Some(width),
        };
        Ok(self.worker(service_id)?.export_csv(&query)?)
    }

    /// Every sample of one sensor as CSV.
    pub fn get_observations_csv(
        &self,
        service_id: &str,
        procedure: &str,
        observed_properties: &[&str],
        features: &[&str],
        start: Option<NaiveDateTime>,
        end: Option<NaiveDateTime>,
    ) -> ConfigurerResult<String> {
        self.get_decimated_observations_csv(service_id, procedure, observed_properties, features, start, end, 0)
    }

    /// Sensors registered in a service.
    pub fn list_sensors(&self, service_id: &str) -> ConfigurerResult<Vec<Sensor>> {
        Ok(self.worker(service_id)?.list_sensors()?)
    }

    /// Delete a sensor through the worker, as DeleteSensor does.
    pub fn remove_sensor(&self, service_id: &str, procedure: &str) -> ConfigurerResult<DeletedSensor> {
        let worker = self.worker(service_id)?;
        Ok(worker.delete_sensor(&DeleteSensor {
            version: SosVersion::V200,
            procedure: Some(procedure.to_string()),
        })?)
    }

    /// Drop the observations of `procedures` while keeping the sensors.
    pub fn delete_provider(&self, service_id: &str, procedures: &[&str]) -> ConfigurerResult<RemovedObservations> {
        let procedures: Vec<ProcedureId> = procedures.iter().map(|p| ProcedureId::from(*p)).collect();
        Ok(self.worker(service_id)?.delete_provider(&procedures)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::InMemoryConfigStore;

    fn configurer() -> SosConfigurer {
        let store = InMemoryConfigStore::new();
        store.insert_raw("default", "");
        SosConfigurer::new(Arc::new(store))
    }

    #[test]
    fn test_unknown_service_is_rejected() {
        let configurer = configurer();
        assert!(matches!(
            configurer.worker("other"),
            Err(ConfigurerError::UnknownService(id)) if id == "other"
        ));
    }

    #[test]
    fn test_worker_is_created_once() {
        let configurer = configurer();
        let a = configurer.worker("default").unwrap();
        let b = configurer.worker("default").unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(a.status(), ServiceStatus::Running);
    }

    #[test]
    fn test_stop_and_restart() {
        let configurer = configurer();
        configurer.stop("default").unwrap();
        assert!(matches!(
            configurer.list_sensors("default"),
            Err(ConfigurerError::Fault(f)) if f.message.contains("shutdown")
        ));
        assert_eq!(configurer.restart("default").unwrap(), ServiceStatus::Running);
        assert!(configurer.list_sensors("default").unwrap().is_empty());
    }

    #[test]
    fn test_remove_unknown_sensor_is_a_noop() {
        let configurer = configurer();
        let deleted = configurer
            .remove_sensor("default", "urn:ogc:object:sensor:GEOM:42")
            .unwrap();
        assert!(!deleted.existed);
    }

    #[test]
    fn test_delete_provider_on_empty_service() {
        let configurer = configurer();
        let removed = configurer
            .delete_provider("default", &["urn:ogc:object:sensor:GEOM:42"])
            .unwrap();
        assert_eq!(removed.removed_series, 0);
        assert!(matches!(
            configurer.delete_provider("other", &["x"]),
            Err(ConfigurerError::UnknownService(_))
        ));
    }

    #[test]
    fn test_csv_of_unknown_sensor_fails_on_procedure() {
        let configurer = configurer();
        let err = configurer
            .get_observations_csv("default", "urn:ogc:object:sensor:GEOM:42", &[], &[], None, None)
            .unwrap_err();
        match err {
            ConfigurerError::Fault(f) => assert_eq!(f.locator.as_deref(), Some("procedure")),
            other => panic!("unexpected error: {}", other),
        }
    }
}
