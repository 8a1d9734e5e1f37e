//! SOS worker: lifecycle, request validation and dispatch.
//!
//! A worker serves one configured service instance. Every operation first
//! checks that the worker is running, then validates its parameters in a fixed
//! order so the first offending parameter decides the exception reported.
//!
//! # Lifecycle
//!
//! ```text
//! Uninitialized ──config parsed──▶ Configured ──store healthy──▶ Running
//!        ▲                                                         │
//!        └────────────── init_worker() ◀── Destroyed ◀── destroy() ─┘
//! ```

mod capabilities;
pub mod fault;
pub mod requests;
pub mod responses;
pub mod version;

pub use fault::{ExceptionCode, SosFault};
pub use requests::*;
pub use responses::*;
pub use version::SosVersion;

use chrono::NaiveDateTime;
use log::{debug, info, warn};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use crate::config::{ConfigError, ServiceConfigStore, SosConfiguration};
use crate::db::{FullRepository, RepositoryError, SampleQuery, SeriesSlice, TemplateDraft, TimeSeries};
use crate::filter::TemporalFilter;
use crate::models::*;
use crate::services::decimation::{to_csv, Decimator};
use crate::services::encoding::TextEncoding;
use crate::services::events::{EventBus, SosEvent};
use crate::services::resolver;
use fault::{NOT_RUNNING, SHUTDOWN};
use version::{parse_result_model, RESULT_MODEL_MEASUREMENT, SENSORML_100};

/// Lifecycle state of a worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServiceStatus {
    Uninitialized,
    Configured,
    Running,
    Destroyed,
}

impl fmt::Display for ServiceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ServiceStatus::Uninitialized => "uninitialized",
            ServiceStatus::Configured => "configured",
            ServiceStatus::Running => "running",
            ServiceStatus::Destroyed => "destroyed",
        };
        f.write_str(name)
    }
}

struct WorkerState {
    status: ServiceStatus,
    cause: Option<String>,
    config: Option<Arc<SosConfiguration>>,
}

impl WorkerState {
    fn failed(status: ServiceStatus, cause: impl Into<String>, config: Option<SosConfiguration>) -> Self {
        Self {
            status,
            cause: Some(cause.into()),
            config: config.map(Arc::new),
        }
    }
}

/// Parameters of a CSV export.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CsvQuery {
    pub procedure: ProcedureId,
    /// Columns to export; every field of the procedure when empty.
    pub observed_properties: Vec<PhenomenonId>,
    pub features_of_interest: Vec<FeatureId>,
    #[serde(with = "optional_iso")]
    pub start: Option<NaiveDateTime>,
    #[serde(with = "optional_iso")]
    pub end: Option<NaiveDateTime>,
    /// Decimation width; the configured default when absent, no decimation when zero.
    pub width: Option<usize>,
}

mod optional_iso {
    use chrono::NaiveDateTime;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(time: &Option<NaiveDateTime>, serializer: S) -> Result<S::Ok, S::Error> {
        match time {
            Some(t) => serializer.serialize_some(&crate::models::format_time(t)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<NaiveDateTime>, D::Error> {
        Option::<String>::deserialize(deserializer)?
            .filter(|raw| !raw.trim().is_empty())
            .map(|raw| crate::models::parse_time(&raw).map_err(serde::de::Error::custom))
            .transpose()
    }
}

/// Map a store validation error onto the parameter that carried the bad data.
fn fault_at(locator: &'static str) -> impl Fn(RepositoryError) -> SosFault {
    move |err| match err {
        RepositoryError::ValidationError { message, .. } => SosFault::invalid(locator, message),
        other => SosFault::from(other),
    }
}

fn check_filters(filters: &[TemporalFilter]) -> Result<(), SosFault> {
    if filters.iter().all(TemporalFilter::is_well_formed) {
        Ok(())
    } else {
        Err(SosFault::invalid(
            "temporalFilter",
            "the period begin is after its end",
        ))
    }
}

/// An insert names an offering the procedure already belongs to.
fn check_bound(offering: &Offering, procedure: &ProcedureId) -> Result<(), SosFault> {
    if offering.procedures.contains(procedure) {
        Ok(())
    } else {
        Err(SosFault::invalid(
            "offering",
            format!("the procedure {} is not part of the offering {}", procedure, offering.id),
        ))
    }
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

/// Sampling time covering the first to the last sample.
fn sampling_time_of(samples: &[Sample]) -> Option<SamplingTime> {
    let first = samples.iter().map(|s| s.time).min()?;
    let last = samples.iter().map(|s| s.time).max()?;
    Some(SamplingTime::from_period(TimePeriod {
        begin: first,
        end: last,
    }))
}

/// The SOS service instance.
pub struct SosWorker {
    service_id: String,
    config_store: Arc<dyn ServiceConfigStore>,
    repository: Arc<dyn FullRepository>,
    events: EventBus,
    state: RwLock<WorkerState>,
}

impl SosWorker {
    /// Create a worker and load its configuration.
    ///
    /// Construction never fails: a missing or broken configuration leaves the
    /// worker in a non-running state and every request reports the cause.
    ///
    /// # Arguments
    /// * `service_id` - Key of the configuration in `config_store`
    /// * `config_store` - Persisted service configurations
    /// * `repository` - Observation store served by this worker
    /// * `events` - Bus change notifications are published on
    pub fn new(
        service_id: impl Into<String>,
        config_store: Arc<dyn ServiceConfigStore>,
        repository: Arc<dyn FullRepository>,
        events: EventBus,
    ) -> Self {
        let worker = Self {
            service_id: service_id.into(),
            config_store,
            repository,
            events,
            state: RwLock::new(WorkerState {
                status: ServiceStatus::Uninitialized,
                cause: None,
                config: None,
            }),
        };
        worker.init_worker();
        worker
    }

    pub fn service_id(&self) -> &str {
        &self.service_id
    }

    pub fn repository(&self) -> &Arc<dyn FullRepository> {
        &self.repository
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    pub fn status(&self) -> ServiceStatus {
        self.state.read().status
    }

    /// Why the worker is not running, if it is not.
    pub fn start_error(&self) -> Option<String> {
        self.state.read().cause.clone()
    }

    /// Current configuration, when one was parsed.
    pub fn configuration(&self) -> Option<Arc<SosConfiguration>> {
        self.state.read().config.clone()
    }

    fn load_state(&self) -> WorkerState {
        let raw = match self.config_store.load_raw(&self.service_id) {
            Ok(Some(raw)) => raw,
            Ok(None) => {
                return WorkerState::failed(ServiceStatus::Uninitialized, "configuration object is null", None)
            }
            Err(e) => {
                return WorkerState::failed(
                    ServiceStatus::Uninitialized,
                    format!("unable to load the configuration: {}", e),
                    None,
                )
            }
        };
        let config = match SosConfiguration::from_toml_str(&raw) {
            Ok(config) => config,
            Err(e @ (ConfigError::Malformed(_) | ConfigError::Invalid(_))) => {
                return WorkerState::failed(
                    ServiceStatus::Uninitialized,
                    format!("configuration object is malformed: {}", e),
                    None,
                )
            }
            Err(e) => {
                return WorkerState::failed(
                    ServiceStatus::Uninitialized,
                    format!("unable to load the configuration: {}", e),
                    None,
                )
            }
        };
        match self.repository.health_check() {
            Ok(true) => WorkerState {
                status: ServiceStatus::Running,
                cause: None,
                config: Some(Arc::new(config)),
            },
            _ => WorkerState::failed(
                ServiceStatus::Configured,
                "the observation store is unavailable",
                Some(config),
            ),
        }
    }

    /// Re-read the configuration and restart, whatever the current state.
    pub fn init_worker(&self) -> ServiceStatus {
        let next = self.load_state();
        let status = next.status;
        match &next.cause {
            None => info!("SOS worker {} is running", self.service_id),
            Some(cause) => warn!("SOS worker {} is {}: {}", self.service_id, status, cause),
        }
        *self.state.write() = next;
        self.publish(SosEvent::ServiceStateChanged {
            service: self.service_id.clone(),
            state: status.to_string(),
        });
        status
    }

    /// Stop serving. Requests already past the state check complete normally.
    pub fn destroy(&self) {
        {
            let mut state = self.state.write();
            state.status = ServiceStatus::Destroyed;
            state.cause = Some(SHUTDOWN.to_string());
        }
        info!("SOS worker {} destroyed", self.service_id);
        self.publish(SosEvent::ServiceStateChanged {
            service: self.service_id.clone(),
            state: ServiceStatus::Destroyed.to_string(),
        });
    }

    fn publish(&self, event: SosEvent) {
        for response in self.events.publish(&event) {
            if response.is_failure() {
                debug!("Event delivery failed: {:?}", response);
            }
        }
    }

    /// Configuration of a running worker, or the lifecycle fault.
    fn running(&self) -> Result<Arc<SosConfiguration>, SosFault> {
        let state = self.state.read();
        match (state.status, &state.config) {
            (ServiceStatus::Running, Some(config)) => Ok(Arc::clone(config)),
            (ServiceStatus::Destroyed, _) => Err(SosFault::no_applicable(SHUTDOWN)),
            _ => Err(SosFault::no_applicable(format!(
                "{}\ncause: {}",
                NOT_RUNNING,
                state.cause.as_deref().unwrap_or("unknown")
            ))),
        }
    }

    fn running_for(&self, version: SosVersion) -> Result<Arc<SosConfiguration>, SosFault> {
        let config = self.running()?;
        if !config.supports_version(version.as_str()) {
            return Err(SosFault::invalid(
                "version",
                format!("version {} is not supported by this service", version),
            ));
        }
        Ok(config)
    }

    fn registered_sensor(&self, id: &ProcedureId, locator: &str) -> Result<Sensor, SosFault> {
        self.repository
            .get_sensor(id)?
            .ok_or_else(|| SosFault::invalid(locator, format!("this sensor is not registered in the SOS: {}", id)))
    }

    fn known_feature(&self, id: &FeatureId) -> Result<FeatureOfInterest, SosFault> {
        self.repository.get_feature(id)?.ok_or_else(|| {
            SosFault::invalid(
                "featureOfInterest",
                format!("the feature of interest {} is not registered", id),
            )
        })
    }

    fn known_offering(&self, id: &OfferingId) -> Result<Offering, SosFault> {
        self.repository
            .get_offering(id)?
            .ok_or_else(|| SosFault::invalid("offering", format!("offering {} is not available", id)))
    }

    fn known_phenomena(&self, ids: &[PhenomenonId]) -> Result<Vec<Phenomenon>, SosFault> {
        resolver::resolve_phenomena(self.repository.as_ref(), ids)?.map_err(|unknown| {
            SosFault::invalid(
                "observedProperty",
                format!("this phenomenon {} is not registered in the database", unknown),
            )
        })
    }

    // ==================== Dispatch ====================

    /// Serve any request.
    pub fn handle(&self, request: &SosRequest) -> Result<SosResponse, SosFault> {
        debug!("{} {}", self.service_id, request.operation());
        let response = match request {
            SosRequest::GetCapabilities(r) => SosResponse::Capabilities(self.get_capabilities(r)?),
            SosRequest::DescribeSensor(r) => SosResponse::SensorDescription(self.describe_sensor(r)?),
            SosRequest::GetObservation(r) => SosResponse::ObservationCollection(self.get_observation(r)?),
            SosRequest::GetObservationById(r) => {
                SosResponse::ObservationCollection(self.get_observation_by_id(r)?)
            }
            SosRequest::GetResult(r) => SosResponse::ResultValues(self.get_result(r)?),
            SosRequest::GetResultTemplate(r) => SosResponse::ResultStructure(self.get_result_template(r)?),
            SosRequest::InsertObservation(r) => SosResponse::InsertedObservations(self.insert_observation(r)?),
            SosRequest::InsertResultTemplate(r) => SosResponse::InsertedTemplate(self.insert_result_template(r)?),
            SosRequest::InsertResult(r) => SosResponse::InsertedResult(self.insert_result(r)?),
            SosRequest::RegisterSensor(r) => SosResponse::RegisteredSensor(self.register_sensor(r)?),
            SosRequest::DeleteSensor(r) => SosResponse::DeletedSensor(self.delete_sensor(r)?),
            SosRequest::GetFeatureOfInterest(r) => {
                SosResponse::FeatureCollection(self.get_feature_of_interest(r)?)
            }
            SosRequest::GetFeatureOfInterestTime(r) => {
                SosResponse::FeatureTime(self.get_feature_of_interest_time(r)?)
            }
        };
        Ok(response)
    }

    // ==================== Discovery ====================

    pub fn get_capabilities(&self, request: &GetCapabilities) -> Result<Capabilities, SosFault> {
        let config = self.running()?;
        let version = capabilities::negotiate_version(&config, request)?;
        capabilities::check_formats(request)?;
        let sections = capabilities::parse_sections(request)?;
        let offerings = self.repository.list_offerings()?;
        Ok(capabilities::build(&config, version, sections, offerings))
    }

    pub fn describe_sensor(&self, request: &DescribeSensor) -> Result<SensorDescription, SosFault> {
        self.running_for(request.version)?;
        let locator = request.version.description_format_locator();
        let format = non_blank(&request.description_format).ok_or_else(|| SosFault::missing(locator))?;
        if !request.version.accepts_sensor_format(format) {
            return Err(SosFault::invalid(
                locator,
                format!("{} is not a supported description format", format),
            ));
        }
        let procedure = non_blank(&request.procedure).ok_or_else(|| SosFault::missing("procedure"))?;
        let sensor = self.registered_sensor(&ProcedureId::from(procedure), "procedure")?;
        Ok(SensorDescription {
            procedure: sensor.id,
            format: format.to_string(),
            description: sensor.description,
        })
    }

    // ==================== Observation retrieval ====================

    /// Filtered observations of the store.
    ///
    /// # Validation order
    /// response format, result model, response mode, offering, procedure,
    /// observed property, feature of interest, temporal filters, BBOX.
    pub fn get_observation(&self, request: &GetObservation) -> Result<ObservationCollection, SosFault> {
        let config = self.running_for(request.version)?;
        let version = request.version;

        match non_blank(&request.response_format) {
            None if version.default_observation_format().is_none() => {
                return Err(SosFault::missing("responseFormat"))
            }
            Some(format) if !version.accepts_observation_format(format) => {
                return Err(SosFault::invalid(
                    "responseFormat",
                    format!("{} is not a supported responseFormat", format),
                ))
            }
            _ => {}
        }

        let mut measurements = false;
        if version == SosVersion::V100 {
            if let Some(model) = non_blank(&request.result_model) {
                let model = parse_result_model(model).ok_or_else(|| {
                    SosFault::invalid("resultModel", format!("{} is not a supported result model", model))
                })?;
                measurements = model == RESULT_MODEL_MEASUREMENT;
            }
        }

        let mode = request.response_mode.unwrap_or(ResponseMode::Inline);
        match mode {
            ResponseMode::Attached => {
                return Err(SosFault::not_supported(
                    "responseMode",
                    "This response mode is not supported by the service (inline or resultTemplate)",
                ))
            }
            ResponseMode::OutOfBand => {
                return Err(SosFault::no_applicable_at(
                    "responseMode",
                    "This response mode is not supported by the service (inline or resultTemplate)",
                ))
            }
            ResponseMode::ResultTemplate if version != SosVersion::V100 => {
                return Err(SosFault::invalid(
                    "responseMode",
                    "the resultTemplate response mode is only available in SOS 1.0.0",
                ))
            }
            _ => {}
        }

        if version == SosVersion::V100 && request.offerings.is_empty() {
            return Err(SosFault::missing("offering"));
        }
        let offerings: Vec<OfferingId> = request.offerings.iter().map(|o| OfferingId::from(o.as_str())).collect();
        let mut offering_procedures: Option<BTreeSet<ProcedureId>> = None;
        for id in &offerings {
            let offering = self.known_offering(id)?;
            offering_procedures
                .get_or_insert_with(BTreeSet::new)
                .extend(offering.procedures);
        }

        let mut procedures = Vec::with_capacity(request.procedures.len());
        for id in &request.procedures {
            let id = ProcedureId::from(id.as_str());
            let bound = offering_procedures.as_ref().map_or(true, |p| p.contains(&id));
            if !bound || self.repository.get_sensor(&id)?.is_none() {
                return Err(SosFault::invalid(
                    "procedure",
                    format!("this process is not registered in the offering: {}", id),
                ));
            }
            procedures.push(id);
        }

        if version == SosVersion::V100 && request.observed_properties.is_empty() {
            return Err(SosFault::missing("observedProperty"));
        }
        let phenomenon_ids: Vec<PhenomenonId> = request
            .observed_properties
            .iter()
            .map(|p| PhenomenonId::from(p.as_str()))
            .collect();
        let phenomena = self.known_phenomena(&phenomenon_ids)?;

        let mut features = Vec::with_capacity(request.features_of_interest.len());
        for id in &request.features_of_interest {
            features.push(self.known_feature(&FeatureId::from(id.as_str()))?.id);
        }

        check_filters(&request.temporal_filters)?;

        let bbox = match &request.bbox {
            Some(b) => Some(b.envelope().ok_or_else(|| SosFault::missing("BBOX"))?),
            None => None,
        };

        let query = SampleQuery {
            procedures,
            offerings,
            phenomena: phenomenon_ids,
            features,
            temporal: request.temporal_filters.clone(),
            bbox,
        };

        if mode == ResponseMode::ResultTemplate {
            let procedures = match (&query.procedures, &offering_procedures) {
                (p, _) if !p.is_empty() => p.clone(),
                (_, Some(bound)) => bound.iter().cloned().collect(),
                _ => Vec::new(),
            };
            return self.template_observations(&config, &query, &procedures, &phenomena);
        }

        let slices = self.repository.get_samples(&query)?;
        let observations = if measurements {
            self.measurements(&config, &slices)
        } else {
            self.observations(&config, &slices, &phenomena)
        };
        if let Some(max) = config.max_observations_by_request {
            if observations.len() > max {
                return Err(SosFault::no_applicable(format!(
                    "The response contains {} observations, more than the {} allowed by the service; refine the request",
                    observations.len(),
                    max
                )));
            }
        }
        Ok(ObservationCollection::new(observations))
    }

    /// One observation per slice, restricted to the requested fields.
    fn observations(&self, config: &SosConfiguration, slices: &[SeriesSlice], phenomena: &[Phenomenon]) -> Vec<Observation> {
        let requested = resolver::expand_fields(phenomena);
        slices
            .iter()
            .enumerate()
            .map(|(i, slice)| {
                let whole = phenomena.is_empty() || phenomena.iter().any(|p| p.id == slice.key.phenomenon);
                let fields: Vec<PhenomenonId> = if whole {
                    slice.fields.clone()
                } else {
                    requested.iter().filter(|f| slice.fields.contains(f)).cloned().collect()
                };
                let observed_property = match fields.as_slice() {
                    [single] if !whole => single.clone(),
                    _ => slice.key.phenomenon.clone(),
                };
                let result = if whole { slice.samples.clone() } else { resolver::project(slice, &fields) };
                Observation {
                    id: self.response_observation_id(config, &slice.key.procedure, i + 1),
                    procedure: slice.key.procedure.clone(),
                    feature_of_interest: slice.key.feature.clone(),
                    observed_property,
                    fields,
                    sampling_time: sampling_time_of(&result),
                    result,
                }
            })
            .collect()
    }

    /// One single-value observation per present value.
    fn measurements(&self, config: &SosConfiguration, slices: &[SeriesSlice]) -> Vec<Observation> {
        let mut observations = Vec::new();
        for slice in slices {
            for sample in &slice.samples {
                for (field, value) in slice.fields.iter().zip(&sample.values) {
                    if value.is_missing() {
                        continue;
                    }
                    observations.push(Observation {
                        id: self.response_observation_id(config, &slice.key.procedure, observations.len() + 1),
                        procedure: slice.key.procedure.clone(),
                        feature_of_interest: slice.key.feature.clone(),
                        observed_property: field.clone(),
                        fields: vec![field.clone()],
                        sampling_time: Some(SamplingTime::Instant(sample.time)),
                        result: vec![Sample::new(sample.time, vec![value.clone()])],
                    });
                }
            }
        }
        observations
    }

    fn response_observation_id(&self, config: &SosConfiguration, procedure: &ProcedureId, n: usize) -> ObservationId {
        ObservationId::new(format!(
            "{}{}-{}",
            config.observation_id_base,
            resolver::procedure_suffix(&config.sensor_id_base, procedure),
            n
        ))
    }

    /// Store one template per (procedure, observed property) and return template observations.
    fn template_observations(
        &self,
        config: &SosConfiguration,
        query: &SampleQuery,
        procedures: &[ProcedureId],
        phenomena: &[Phenomenon],
    ) -> Result<ObservationCollection, SosFault> {
        let mut observations = Vec::new();
        for procedure in procedures {
            let series = self.repository.list_series(procedure)?;
            let offering = self
                .repository
                .offerings_of(procedure)?
                .into_iter()
                .find(|o| query.offerings.is_empty() || query.offerings.contains(o))
                .unwrap_or_else(|| resolver::offering_for(&config.sensor_id_base, procedure));
            for phenomenon in phenomena {
                let Some(info) = series.iter().find(|s| {
                    (s.key.phenomenon == phenomenon.id || s.fields.contains(&phenomenon.id))
                        && (query.features.is_empty() || query.features.contains(&s.key.feature))
                }) else {
                    continue;
                };
                let feature = match query.features.as_slice() {
                    [single] => Some(single.clone()),
                    _ => None,
                };
                let template = self.repository.store_template(TemplateDraft {
                    requested_id: None,
                    id_prefix: resolver::template_prefix(
                        &config.observation_template_id_base,
                        &config.sensor_id_base,
                        procedure,
                    ),
                    procedure: procedure.clone(),
                    offering: offering.clone(),
                    observed_property: phenomenon.id.clone(),
                    feature_of_interest: feature,
                    temporal_filters: query.temporal.clone(),
                    fields: phenomenon.fields(),
                    encoding: TextEncoding::default(),
                })?;
                debug!("Result template {} for {}", template.id, procedure);
                observations.push(Observation {
                    id: ObservationId::new(template.id.as_str()),
                    procedure: procedure.clone(),
                    feature_of_interest: info.key.feature.clone(),
                    observed_property: template.observed_property,
                    fields: template.fields,
                    sampling_time: None,
                    result: Vec::new(),
                });
            }
        }
        Ok(ObservationCollection::new(observations))
    }

    /// Current samples of previously inserted observations.
    pub fn get_observation_by_id(&self, request: &GetObservationById) -> Result<ObservationCollection, SosFault> {
        self.running_for(request.version)?;
        if request.observation_ids.is_empty() {
            return Err(SosFault::missing("observationId"));
        }
        let mut observations = Vec::with_capacity(request.observation_ids.len());
        for id in &request.observation_ids {
            let id = ObservationId::from(id.as_str());
            let unknown = || SosFault::invalid("observationId", format!("observation {} does not exist", id));
            let record = self.repository.observation_record(&id)?.ok_or_else(unknown)?;
            let slice = self.repository.observation_slice(&record)?.ok_or_else(unknown)?;
            observations.push(Observation {
                id: record.id,
                procedure: slice.key.procedure,
                feature_of_interest: slice.key.feature,
                observed_property: slice.key.phenomenon,
                fields: slice.fields,
                sampling_time: record.period.map(SamplingTime::from_period),
                result: slice.samples,
            });
        }
        Ok(ObservationCollection::new(observations))
    }

    // ==================== Results ====================

    pub fn get_result(&self, request: &GetResult) -> Result<ResultValues, SosFault> {
        self.running_for(request.version)?;
        let locator = request.version.result_template_locator();

        let (template, procedures, phenomenon, fields, encoding, mut filters) =
            match non_blank(&request.template) {
                Some(id) => {
                    let template = self
                        .repository
                        .get_template(&TemplateId::from(id))?
                        .ok_or_else(|| SosFault::invalid(locator, format!("the template {} does not exist", id)))?;
                    (
                        Some(template.clone()),
                        vec![template.procedure],
                        template.observed_property,
                        template.fields,
                        template.encoding,
                        template.temporal_filters,
                    )
                }
                None if request.version == SosVersion::V100 => return Err(SosFault::missing(locator)),
                None => {
                    let offering = non_blank(&request.offering).ok_or_else(|| SosFault::missing("offering"))?;
                    let property =
                        non_blank(&request.observed_property).ok_or_else(|| SosFault::missing("observedProperty"))?;
                    let offering = self.known_offering(&OfferingId::from(offering))?;
                    let phenomenon = self
                        .known_phenomena(&[PhenomenonId::from(property)])?
                        .remove(0);
                    (
                        None,
                        offering.procedures,
                        phenomenon.id.clone(),
                        phenomenon.fields(),
                        TextEncoding::default(),
                        Vec::new(),
                    )
                }
            };

        let mut features = Vec::with_capacity(request.features_of_interest.len());
        for id in &request.features_of_interest {
            features.push(self.known_feature(&FeatureId::from(id.as_str()))?.id);
        }
        check_filters(&request.temporal_filters)?;
        filters.extend(request.temporal_filters.iter().copied());

        let template_id = template.as_ref().map(|t| t.id.clone());
        if let Some(feature) = template.as_ref().and_then(|t| t.feature_of_interest.clone()) {
            if !features.is_empty() && !features.contains(&feature) {
                return Ok(ResultValues {
                    template: template_id,
                    values: String::new(),
                });
            }
            features = vec![feature];
        }

        let slices = self.repository.get_samples(&SampleQuery {
            procedures,
            phenomena: vec![phenomenon],
            features,
            temporal: filters,
            ..Default::default()
        })?;
        let shape = slices.first().map_or(ObservationKind::Timeseries, |s| s.shape);
        let rows = resolver::join_slices(&slices, &fields, shape);
        Ok(ResultValues {
            template: template_id,
            values: encoding.encode(&rows),
        })
    }

    pub fn get_result_template(&self, request: &GetResultTemplate) -> Result<ResultStructure, SosFault> {
        self.running_for(request.version)?;
        let offering = non_blank(&request.offering).ok_or_else(|| SosFault::missing("offering"))?;
        let property = non_blank(&request.observed_property).ok_or_else(|| SosFault::missing("observedProperty"))?;
        let offering = self.known_offering(&OfferingId::from(offering))?;
        let phenomenon = self.known_phenomena(&[PhenomenonId::from(property)])?.remove(0);

        let declared = self
            .repository
            .list_templates()?
            .into_iter()
            .find(|t| t.offering == offering.id && t.observed_property == phenomenon.id);
        Ok(match declared {
            Some(t) => ResultStructure {
                fields: t.fields,
                encoding: t.encoding,
            },
            None => ResultStructure {
                fields: phenomenon.fields(),
                encoding: TextEncoding::default(),
            },
        })
    }

    // ==================== Insertion ====================

    pub fn insert_result_template(&self, request: &InsertResultTemplate) -> Result<InsertedTemplate, SosFault> {
        let config = self.running_for(request.version)?;
        let offering = non_blank(&request.offering).ok_or_else(|| SosFault::missing("offering"))?;
        let procedure = non_blank(&request.procedure).ok_or_else(|| SosFault::missing("procedure"))?;
        let property = non_blank(&request.observed_property).ok_or_else(|| SosFault::missing("observedProperty"))?;

        let sensor = self.registered_sensor(&ProcedureId::from(procedure), "procedure")?;
        let offering = self.known_offering(&OfferingId::from(offering))?;
        check_bound(&offering, &sensor.id)?;
        let phenomenon = self.known_phenomena(&[PhenomenonId::from(property)])?.remove(0);
        let encoding = request.encoding.clone().unwrap_or_default();
        encoding
            .check()
            .map_err(|e| SosFault::invalid("resultEncoding", e.to_string()))?;
        if let Some(feature) = &request.feature_of_interest {
            self.repository.register_feature(feature.clone())?;
        }

        let template = self.repository.store_template(TemplateDraft {
            requested_id: request.identifier.as_deref().map(TemplateId::from),
            id_prefix: resolver::template_prefix(&config.observation_template_id_base, &config.sensor_id_base, &sensor.id),
            procedure: sensor.id.clone(),
            offering: offering.id,
            observed_property: phenomenon.id.clone(),
            feature_of_interest: request.feature_of_interest.as_ref().map(|f| f.id.clone()),
            temporal_filters: Vec::new(),
            fields: phenomenon.fields(),
            encoding,
        })?;
        info!("Result template {} registered for {}", template.id, sensor.id);
        self.publish(SosEvent::TemplateCreated {
            service: self.service_id.clone(),
            template: template.id.clone(),
        });
        Ok(InsertedTemplate { template: template.id })
    }

    pub fn insert_result(&self, request: &InsertResult) -> Result<InsertedResult, SosFault> {
        let config = self.running_for(request.version)?;
        let id = non_blank(&request.template).ok_or_else(|| SosFault::missing("template"))?;
        let template = self
            .repository
            .get_template(&TemplateId::from(id))?
            .ok_or_else(|| SosFault::invalid("template", format!("the template {} does not exist", id)))?;
        let values = non_blank(&request.result_values).ok_or_else(|| SosFault::missing("resultValues"))?;

        let feature_id = template.feature_of_interest.clone().ok_or_else(|| {
            SosFault::invalid("template", "the template does not declare a feature of interest")
        })?;
        let feature = self.known_feature(&feature_id)?;
        let phenomenon = self
            .repository
            .get_phenomenon(&template.observed_property)?
            .ok_or_else(|| SosFault::no_applicable(format!("phenomenon {} vanished", template.observed_property)))?;

        let rows = template
            .encoding
            .decode(values, template.fields.len())
            .map_err(|e| SosFault::invalid("resultValues", e.to_string()))?;

        let observation = NewObservation {
            procedure: template.procedure.clone(),
            feature_of_interest: feature,
            observed_property: phenomenon,
            sampling_time: None,
            result: rows,
        };
        let receipt = self
            .repository
            .insert_observation(&template.offering, &observation, &config.observation_id_base)
            .map_err(fault_at("resultValues"))?;
        info!(
            "InsertResult {}: {} new, {} updated rows",
            template.id, receipt.summary.inserted, receipt.summary.updated
        );
        self.publish(SosEvent::ObservationsInserted {
            service: self.service_id.clone(),
            procedure: template.procedure,
            observations: vec![receipt.observation_id.clone()],
        });
        Ok(InsertedResult {
            observation_id: receipt.observation_id,
            inserted: receipt.summary.inserted,
            updated: receipt.summary.updated,
        })
    }

    /// Merge observations into the store.
    ///
    /// Every observation is validated before any is written.
    pub fn insert_observation(&self, request: &InsertObservation) -> Result<InsertedObservations, SosFault> {
        let config = self.running_for(request.version)?;
        let locator = request.version.insert_target_locator();

        let (offering, assigned) = match request.version {
            SosVersion::V100 => {
                let id = non_blank(&request.assigned_sensor_id).ok_or_else(|| SosFault::missing(locator))?;
                let sensor = self.repository.get_sensor(&ProcedureId::from(id))?.ok_or_else(|| {
                    SosFault::invalid(locator, format!("this sensor ID is not registered: {}", id))
                })?;
                let offering = match self.repository.offerings_of(&sensor.id)?.into_iter().next() {
                    Some(offering) => offering,
                    None => {
                        let offering = resolver::offering_for(&config.sensor_id_base, &sensor.id);
                        self.repository.bind_offering(&offering, &sensor.id)?;
                        offering
                    }
                };
                (self.known_offering(&offering)?, Some(sensor))
            }
            SosVersion::V200 => {
                if request.offerings.is_empty() {
                    return Err(SosFault::missing(locator));
                }
                let mut offerings = request
                    .offerings
                    .iter()
                    .map(|id| self.known_offering(&OfferingId::from(id.as_str())))
                    .collect::<Result<Vec<_>, _>>()?;
                // observations go to the first offering named
                (offerings.swap_remove(0), None)
            }
        };

        if request.observations.is_empty() {
            return Err(SosFault::missing("observation"));
        }

        let mut prepared = Vec::with_capacity(request.observations.len());
        for observation in &request.observations {
            let mut observation = observation.clone();
            let sensor = match &assigned {
                Some(sensor) => {
                    observation.procedure = sensor.id.clone();
                    sensor.clone()
                }
                None => self.registered_sensor(&observation.procedure, "procedure")?,
            };
            check_bound(&offering, &sensor.id)?;
            if let Some(SamplingTime::Period(p)) = &observation.sampling_time {
                if !p.is_well_formed() {
                    return Err(SosFault::invalid("samplingTime", "the period begin is after its end"));
                }
            }
            let fields = self
                .repository
                .get_phenomenon(&observation.observed_property.id)?
                .unwrap_or_else(|| observation.observed_property.clone())
                .fields();
            TimeSeries::validate(&observation.result, fields.len(), sensor.observation_kind)
                .map_err(fault_at("result"))?;
            prepared.push(observation);
        }

        let mut ids = Vec::with_capacity(prepared.len());
        for observation in &prepared {
            let stored = self
                .repository
                .register_phenomenon(observation.observed_property.clone())?;
            let observation = NewObservation {
                observed_property: stored,
                ..observation.clone()
            };
            self.repository.register_feature(observation.feature_of_interest.clone())?;
            let receipt = self
                .repository
                .insert_observation(&offering.id, &observation, &config.observation_id_base)
                .map_err(fault_at("result"))?;
            info!(
                "Inserted {} into {}: {} new, {} updated rows",
                receipt.observation_id, observation.procedure, receipt.summary.inserted, receipt.summary.updated
            );
            self.publish(SosEvent::ObservationsInserted {
                service: self.service_id.clone(),
                procedure: observation.procedure.clone(),
                observations: vec![receipt.observation_id.clone()],
            });
            ids.push(receipt.observation_id);
        }
        Ok(InsertedObservations { observation_ids: ids })
    }

    // ==================== Sensors ====================

    /// Register (or replace) a sensor and bind it to `offering-<suffix>`.
    pub fn register_sensor(&self, request: &RegisterSensor) -> Result<RegisteredSensor, SosFault> {
        let config = self.running_for(request.version)?;

        let (format, description) = match request.version {
            SosVersion::V200 => {
                let locator = "procedureDescriptionFormat";
                let format = non_blank(&request.procedure_description_format)
                    .ok_or_else(|| SosFault::missing(locator))?;
                if !request.version.accepts_sensor_format(format) {
                    return Err(SosFault::invalid(
                        locator,
                        format!("{} is not a supported description format", format),
                    ));
                }
                let description =
                    non_blank(&request.sensor_description).ok_or_else(|| SosFault::missing("procedureDescription"))?;
                (format.to_string(), description.to_string())
            }
            SosVersion::V100 => {
                let description =
                    non_blank(&request.sensor_description).ok_or_else(|| SosFault::missing("SensorDescription"))?;
                let template = request
                    .observation_template
                    .as_ref()
                    .ok_or_else(|| SosFault::missing("observationTemplate"))?;
                if template.observed_property.is_none() {
                    return Err(SosFault::invalid(
                        "observationTemplate",
                        "the observation template must specify an observed property",
                    ));
                }
                (SENSORML_100.to_string(), description.to_string())
            }
        };

        let parent = match non_blank(&request.parent) {
            Some(id) => Some(self.registered_sensor(&ProcedureId::from(id), "parent")?.id),
            None => None,
        };

        let id = match non_blank(&request.procedure_id) {
            Some(id) => ProcedureId::from(id),
            None => loop {
                let n = self.repository.allocate_sensor_number()?;
                let candidate = ProcedureId::new(format!("{}{}", config.sensor_id_base, n));
                if self.repository.get_sensor(&candidate)?.is_none() {
                    break candidate;
                }
            },
        };

        let replaced = self.repository.insert_sensor(Sensor {
            id: id.clone(),
            kind: request.kind,
            observation_kind: request.observation_type,
            parent,
            description_format: format,
            description,
        })?;
        let offering = resolver::offering_for(&config.sensor_id_base, &id);
        self.repository.bind_offering(&offering, &id)?;

        let template = request.observation_template.as_ref();
        for phenomenon in template
            .and_then(|t| t.observed_property.as_ref())
            .into_iter()
            .chain(&request.observable_properties)
        {
            self.repository.register_phenomenon(phenomenon.clone())?;
        }
        for feature in template
            .and_then(|t| t.feature_of_interest.as_ref())
            .into_iter()
            .chain(request.feature_of_interest.as_ref())
        {
            self.repository.register_feature(feature.clone())?;
        }

        info!(
            "{} sensor {} in {}",
            if replaced { "Updated" } else { "Registered" },
            id,
            offering
        );
        self.publish(SosEvent::SensorRegistered {
            service: self.service_id.clone(),
            procedure: id.clone(),
        });
        Ok(RegisteredSensor {
            procedure: id,
            offering,
        })
    }

    /// Registered sensors, ordered by id.
    pub fn list_sensors(&self) -> Result<Vec<Sensor>, SosFault> {
        self.running()?;
        Ok(self.repository.list_sensors()?)
    }

    /// Delete a sensor and its data. Unknown sensors succeed with `existed: false`.
    pub fn delete_sensor(&self, request: &DeleteSensor) -> Result<DeletedSensor, SosFault> {
        self.running_for(request.version)?;
        let id = ProcedureId::from(non_blank(&request.procedure).ok_or_else(|| SosFault::missing("procedure"))?);
        let existed = self.repository.delete_sensor(&id)?;
        if existed {
            self.publish(SosEvent::SensorDeleted {
                service: self.service_id.clone(),
                procedure: id.clone(),
            });
        }
        Ok(DeletedSensor { procedure: id, existed })
    }

    /// Remove every observation of `procedures`, keeping the sensors registered.
    ///
    /// Unknown procedures and repeated calls remove nothing and still succeed.
    pub fn delete_provider(&self, procedures: &[ProcedureId]) -> Result<RemovedObservations, SosFault> {
        self.running()?;
        if procedures.is_empty() {
            return Err(SosFault::missing("procedure"));
        }
        let mut removed_series = 0;
        for procedure in procedures {
            let series = self.repository.delete_observations(procedure)?;
            if series > 0 {
                self.publish(SosEvent::ObservationsRemoved {
                    service: self.service_id.clone(),
                    procedure: procedure.clone(),
                    series,
                });
            }
            removed_series += series;
        }
        info!("Removed {} series of {} procedures", removed_series, procedures.len());
        Ok(RemovedObservations {
            procedures: procedures.to_vec(),
            removed_series,
        })
    }

    // ==================== Features ====================

    pub fn get_feature_of_interest(&self, request: &GetFeatureOfInterest) -> Result<FeatureCollection, SosFault> {
        self.running_for(request.version)?;
        if request.bbox.as_ref().is_some_and(|b| b.envelope().is_none()) {
            return Err(SosFault::missing("BBOX"));
        }
        if request.version == SosVersion::V100 && request.feature_ids.is_empty() && request.bbox.is_none() {
            return Err(SosFault::missing("location"));
        }

        let candidates = if request.feature_ids.is_empty() {
            self.repository.list_features()?
        } else {
            request
                .feature_ids
                .iter()
                .map(|id| self.known_feature(&FeatureId::from(id.as_str())))
                .collect::<Result<Vec<_>, _>>()?
        };
        let features = candidates
            .into_iter()
            .filter(|f| request.bbox.as_ref().map_or(true, |bbox| bbox.matches(f)))
            .collect();
        Ok(FeatureCollection { features })
    }

    pub fn get_feature_of_interest_time(&self, request: &GetFeatureOfInterestTime) -> Result<FeatureTime, SosFault> {
        self.running_for(request.version)?;
        let id = non_blank(&request.feature_id).ok_or_else(|| SosFault::missing("featureOfInterest"))?;
        let feature = self.known_feature(&FeatureId::from(id))?;
        let period = self.repository.feature_time_envelope(&feature.id)?;
        Ok(FeatureTime {
            feature: feature.id,
            period,
        })
    }

    // ==================== Export ====================

    /// Samples of one sensor as CSV, decimated to `query.width` buckets.
    pub fn export_csv(&self, query: &CsvQuery) -> Result<String, SosFault> {
        let config = self.running()?;
        let sensor = self.registered_sensor(&query.procedure, "procedure")?;
        let shape = sensor.observation_kind;

        let mut fields = if query.observed_properties.is_empty() {
            resolver::procedure_fields(self.repository.as_ref(), &sensor.id)?
        } else {
            resolver::expand_fields(&self.known_phenomena(&query.observed_properties)?)
        };
        if shape == ObservationKind::Profile {
            // the axis column leads every profile row
            let axis = self
                .repository
                .list_series(&sensor.id)?
                .into_iter()
                .find_map(|info| info.fields.first().cloned());
            if let Some(axis) = axis {
                fields.retain(|f| *f != axis);
                fields.insert(0, axis);
            }
        }

        for id in &query.features_of_interest {
            self.known_feature(id)?;
        }
        let temporal = match (query.start, query.end) {
            (Some(begin), Some(end)) => {
                let period = TimePeriod { begin, end };
                check_filters(&[TemporalFilter::During(period)])?;
                vec![TemporalFilter::During(period)]
            }
            (Some(begin), None) => vec![TemporalFilter::During(TimePeriod {
                begin,
                end: NaiveDateTime::MAX,
            })],
            (None, Some(end)) => vec![TemporalFilter::During(TimePeriod {
                begin: NaiveDateTime::MIN,
                end,
            })],
            (None, None) => Vec::new(),
        };

        let slices = self.repository.get_samples(&SampleQuery {
            procedures: vec![sensor.id.clone()],
            phenomena: query.observed_properties.clone(),
            features: query.features_of_interest.clone(),
            temporal,
            ..Default::default()
        })?;
        let rows = resolver::join_slices(&slices, &fields, shape);
        let width = query.width.unwrap_or(config.default_decimation_width);
        let rows = Decimator::new(width, shape).decimate(&rows);
        debug!("CSV export of {}: {} rows at width {}", sensor.id, rows.len(), width);
        Ok(to_csv(&fields, shape, &rows))
    }
}
