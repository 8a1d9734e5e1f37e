//! In-memory local repository implementation.
//!
//! This module provides a local implementation of all repository traits
//! suitable for unit testing, local development and single-node deployments.
//! The index lives behind one lock; every series sits behind its own lock so
//! merges into different series do not contend.

use log::{debug, info};
use parking_lot::RwLock;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;

use crate::db::repository::*;
use crate::db::series::{SeriesKey, SeriesSlice, TimeSeries};
use crate::models::*;

type SeriesHandle = Arc<RwLock<TimeSeries>>;

/// In-memory local repository.
///
/// Cloning is cheap and clones share the same data.
///
/// # Example
/// ```
/// use examind_sos::db::repositories::LocalRepository;
/// use examind_sos::db::repository::SensorRepository;
///
/// let repo = LocalRepository::new();
/// assert!(repo.health_check().unwrap());
/// assert!(repo.list_sensors().unwrap().is_empty());
/// ```
#[derive(Clone)]
pub struct LocalRepository {
    data: Arc<RwLock<LocalData>>,
}

struct LocalData {
    sensors: BTreeMap<ProcedureId, Sensor>,
    offerings: BTreeMap<OfferingId, BTreeSet<ProcedureId>>,
    phenomena: BTreeMap<PhenomenonId, Phenomenon>,
    features: BTreeMap<FeatureId, FeatureOfInterest>,
    series: BTreeMap<SeriesKey, SeriesHandle>,
    records: HashMap<ObservationId, ObservationRecord>,
    templates: BTreeMap<TemplateId, ResultTemplate>,

    // ID counters
    template_counters: HashMap<ProcedureId, u64>,
    next_sensor_number: u64,
    next_observation_number: u64,

    // Connection health
    is_healthy: bool,
}

impl Default for LocalData {
    fn default() -> Self {
        Self {
            sensors: BTreeMap::new(),
            offerings: BTreeMap::new(),
            phenomena: BTreeMap::new(),
            features: BTreeMap::new(),
            series: BTreeMap::new(),
            records: HashMap::new(),
            templates: BTreeMap::new(),
            template_counters: HashMap::new(),
            next_sensor_number: 1,
            next_observation_number: 1,
            is_healthy: true,
        }
    }
}

impl LocalData {
    fn series_handles<'a>(
        &'a self,
        procedures: &'a BTreeSet<ProcedureId>,
    ) -> impl Iterator<Item = (&'a SeriesKey, &'a SeriesHandle)> + 'a {
        self.series
            .iter()
            .filter(move |(key, _)| procedures.contains(&key.procedure))
    }

    fn offering_view(&self, id: &OfferingId, procedures: &BTreeSet<ProcedureId>) -> Offering {
        let mut observed = BTreeSet::new();
        let mut features = BTreeSet::new();
        let mut envelope: Option<TimePeriod> = None;
        for (key, handle) in self.series_handles(procedures) {
            let series = handle.read();
            observed.insert(key.phenomenon.clone());
            features.insert(key.feature.clone());
            if let Some(p) = series.period() {
                envelope = Some(envelope.map_or(p, |e| e.union(&p)));
            }
        }
        Offering {
            id: id.clone(),
            procedures: procedures.iter().cloned().collect(),
            observed_properties: observed.into_iter().collect(),
            features_of_interest: features.into_iter().collect(),
            time_envelope: envelope,
        }
    }

    fn phenomenon_matches(&self, key: &SeriesKey, fields: &[PhenomenonId], wanted: &[PhenomenonId]) -> bool {
        wanted.is_empty()
            || wanted
                .iter()
                .any(|w| *w == key.phenomenon || fields.contains(w))
    }
}

impl LocalRepository {
    /// Create a new empty local repository.
    pub fn new() -> Self {
        Self {
            data: Arc::new(RwLock::new(LocalData::default())),
        }
    }

    /// Set the health status for testing connection failures.
    pub fn set_healthy(&self, healthy: bool) {
        self.data.write().is_healthy = healthy;
    }

    /// Clear all data from the repository.
    pub fn clear(&self) {
        let mut data = self.data.write();
        *data = LocalData {
            is_healthy: data.is_healthy,
            ..Default::default()
        };
    }

    /// Get the number of series stored.
    pub fn series_count(&self) -> usize {
        self.data.read().series.len()
    }

    /// Helper to check health and return error if unhealthy.
    fn check_health(&self) -> RepositoryResult<()> {
        if !self.data.read().is_healthy {
            return Err(RepositoryError::connection("Observation store is not healthy"));
        }
        Ok(())
    }
}

impl Default for LocalRepository {
    fn default() -> Self {
        Self::new()
    }
}

impl SensorRepository for LocalRepository {
    fn health_check(&self) -> RepositoryResult<bool> {
        Ok(self.data.read().is_healthy)
    }

    fn insert_sensor(&self, sensor: Sensor) -> RepositoryResult<bool> {
        self.check_health()?;
        let mut data = self.data.write();
        let replaced = data.sensors.insert(sensor.id.clone(), sensor).is_some();
        Ok(replaced)
    }

    fn get_sensor(&self, id: &ProcedureId) -> RepositoryResult<Option<Sensor>> {
        self.check_health()?;
        Ok(self.data.read().sensors.get(id).cloned())
    }

    fn list_sensors(&self) -> RepositoryResult<Vec<Sensor>> {
        self.check_health()?;
        Ok(self.data.read().sensors.values().cloned().collect())
    }

    fn delete_sensor(&self, id: &ProcedureId) -> RepositoryResult<bool> {
        self.check_health()?;
        let mut data = self.data.write();
        let existed = data.sensors.remove(id).is_some();

        let before = data.series.len();
        data.series.retain(|key, _| key.procedure != *id);
        let removed_series = before - data.series.len();
        data.records.retain(|_, record| record.series.procedure != *id);
        data.templates.retain(|_, template| template.procedure != *id);
        data.template_counters.remove(id);
        for procedures in data.offerings.values_mut() {
            procedures.remove(id);
        }
        data.offerings.retain(|_, procedures| !procedures.is_empty());
        for sensor in data.sensors.values_mut() {
            if sensor.parent.as_ref() == Some(id) {
                sensor.parent = None;
            }
        }

        if existed {
            info!("Deleted sensor {} ({} series removed)", id, removed_series);
        }
        Ok(existed)
    }

    fn allocate_sensor_number(&self) -> RepositoryResult<u64> {
        self.check_health()?;
        let mut data = self.data.write();
        let n = data.next_sensor_number;
        data.next_sensor_number += 1;
        Ok(n)
    }

    fn bind_offering(&self, offering: &OfferingId, procedure: &ProcedureId) -> RepositoryResult<()> {
        self.check_health()?;
        let mut data = self.data.write();
        data.offerings
            .entry(offering.clone())
            .or_default()
            .insert(procedure.clone());
        Ok(())
    }

    fn get_offering(&self, id: &OfferingId) -> RepositoryResult<Option<Offering>> {
        self.check_health()?;
        let data = self.data.read();
        Ok(data
            .offerings
            .get(id)
            .map(|procedures| data.offering_view(id, procedures)))
    }

    fn list_offerings(&self) -> RepositoryResult<Vec<Offering>> {
        self.check_health()?;
        let data = self.data.read();
        Ok(data
            .offerings
            .iter()
            .map(|(id, procedures)| data.offering_view(id, procedures))
            .collect())
    }

    fn offerings_of(&self, procedure: &ProcedureId) -> RepositoryResult<Vec<OfferingId>> {
        self.check_health()?;
        let data = self.data.read();
        Ok(data
            .offerings
            .iter()
            .filter(|(_, procedures)| procedures.contains(procedure))
            .map(|(id, _)| id.clone())
            .collect())
    }
}

impl FeatureRepository for LocalRepository {
    fn register_phenomenon(&self, phenomenon: Phenomenon) -> RepositoryResult<Phenomenon> {
        self.check_health()?;
        let mut data = self.data.write();
        for component in &phenomenon.components {
            data.phenomena
                .entry(component.clone())
                .or_insert_with(|| Phenomenon::simple(component.clone()));
        }
        let stored = data
            .phenomena
            .entry(phenomenon.id.clone())
            .or_insert(phenomenon);
        Ok(stored.clone())
    }

    fn get_phenomenon(&self, id: &PhenomenonId) -> RepositoryResult<Option<Phenomenon>> {
        self.check_health()?;
        Ok(self.data.read().phenomena.get(id).cloned())
    }

    fn register_feature(&self, feature: FeatureOfInterest) -> RepositoryResult<()> {
        self.check_health()?;
        self.data.write().features.insert(feature.id.clone(), feature);
        Ok(())
    }

    fn get_feature(&self, id: &FeatureId) -> RepositoryResult<Option<FeatureOfInterest>> {
        self.check_health()?;
        Ok(self.data.read().features.get(id).cloned())
    }

    fn list_features(&self) -> RepositoryResult<Vec<FeatureOfInterest>> {
        self.check_health()?;
        Ok(self.data.read().features.values().cloned().collect())
    }
}

impl ObservationRepository for LocalRepository {
    fn insert_observation(
        &self,
        offering: &OfferingId,
        observation: &NewObservation,
        id_base: &str,
    ) -> RepositoryResult<InsertReceipt> {
        self.check_health()?;
        let context = || {
            ErrorContext::new("insert_observation")
                .with_entity("observation")
                .with_entity_id(&observation.procedure)
        };

        // Resolve the series under the index lock, merge under the series lock only.
        let handle = {
            let mut data = self.data.write();
            let sensor = data.sensors.get(&observation.procedure).cloned().ok_or_else(|| {
                RepositoryError::not_found_with_context("unknown procedure", context())
            })?;
            let phenomenon = data
                .phenomena
                .get(&observation.observed_property.id)
                .cloned()
                .ok_or_else(|| RepositoryError::not_found_with_context("unknown phenomenon", context()))?;
            let fields = phenomenon.fields();
            TimeSeries::validate(&observation.result, fields.len(), sensor.observation_kind)
                .map_err(|e| e.with_operation("insert_observation"))?;

            let bound = data
                .offerings
                .get(offering)
                .is_some_and(|procedures| procedures.contains(&observation.procedure));
            if !bound {
                return Err(RepositoryError::validation_with_context(
                    format!("{} is not part of offering {}", observation.procedure, offering),
                    context().with_entity("offering"),
                ));
            }

            let key = SeriesKey {
                procedure: observation.procedure.clone(),
                phenomenon: phenomenon.id.clone(),
                feature: observation.feature_of_interest.id.clone(),
            };
            data.series
                .entry(key.clone())
                .or_insert_with(|| {
                    debug!("Creating series {:?}", key);
                    Arc::new(RwLock::new(TimeSeries::new(key, fields, sensor.observation_kind)))
                })
                .clone()
        };

        let (series_key, summary) = {
            let mut series = handle.write();
            let summary = series.merge(&observation.result, observation.enclosing_period())?;
            (series.key().clone(), summary)
        };

        let period = observation.enclosing_period();
        let mut data = self.data.write();
        // a delete may have dropped the series while it was being merged
        let live = data
            .series
            .get(&series_key)
            .is_some_and(|current| Arc::ptr_eq(current, &handle));
        if !live {
            return Err(RepositoryError::not_found_with_context(
                "the series was deleted during the insert",
                context(),
            ));
        }
        let observation_id = ObservationId::new(format!("{}{}", id_base, data.next_observation_number));
        data.next_observation_number += 1;
        data.records.insert(
            observation_id.clone(),
            ObservationRecord {
                id: observation_id.clone(),
                series: series_key.clone(),
                period,
            },
        );

        debug!(
            "Merged {} new / {} updated rows into {}",
            summary.inserted, summary.updated, series_key.procedure
        );
        Ok(InsertReceipt {
            observation_id,
            series: series_key,
            summary,
            period,
        })
    }

    fn get_samples(&self, query: &SampleQuery) -> RepositoryResult<Vec<SeriesSlice>> {
        self.check_health()?;
        let handles: Vec<SeriesHandle> = {
            let data = self.data.read();
            let offering_procedures: Option<BTreeSet<&ProcedureId>> = if query.offerings.is_empty() {
                None
            } else {
                Some(
                    query
                        .offerings
                        .iter()
                        .filter_map(|o| data.offerings.get(o))
                        .flatten()
                        .collect(),
                )
            };

            data.series
                .iter()
                .filter(|(key, _)| query.procedures.is_empty() || query.procedures.contains(&key.procedure))
                .filter(|(key, _)| {
                    offering_procedures
                        .as_ref()
                        .map_or(true, |procs| procs.contains(&key.procedure))
                })
                .filter(|(key, _)| query.features.is_empty() || query.features.contains(&key.feature))
                .filter(|(key, _)| match &query.bbox {
                    None => true,
                    Some(bbox) => data
                        .features
                        .get(&key.feature)
                        .and_then(FeatureOfInterest::envelope)
                        .is_some_and(|env| env.intersects(bbox)),
                })
                .filter(|(key, handle)| {
                    query.phenomena.is_empty()
                        || data.phenomenon_matches(key, handle.read().fields(), &query.phenomena)
                })
                .map(|(_, handle)| Arc::clone(handle))
                .collect()
        };

        Ok(handles
            .iter()
            .map(|handle| handle.read().snapshot(&query.temporal))
            .filter(|slice| !slice.samples.is_empty())
            .collect())
    }

    fn list_series(&self, procedure: &ProcedureId) -> RepositoryResult<Vec<SeriesInfo>> {
        self.check_health()?;
        let data = self.data.read();
        Ok(data
            .series
            .iter()
            .filter(|(key, _)| key.procedure == *procedure)
            .map(|(key, handle)| {
                let series = handle.read();
                SeriesInfo {
                    key: key.clone(),
                    fields: series.fields().to_vec(),
                    shape: series.shape(),
                    period: series.period(),
                    len: series.len(),
                }
            })
            .collect())
    }

    fn feature_time_envelope(&self, feature: &FeatureId) -> RepositoryResult<Option<TimePeriod>> {
        self.check_health()?;
        let data = self.data.read();
        Ok(data
            .series
            .iter()
            .filter(|(key, _)| key.feature == *feature)
            .filter_map(|(_, handle)| handle.read().period())
            .reduce(|a, b| a.union(&b)))
    }

    fn observation_record(&self, id: &ObservationId) -> RepositoryResult<Option<ObservationRecord>> {
        self.check_health()?;
        Ok(self.data.read().records.get(id).cloned())
    }

    fn observation_slice(&self, record: &ObservationRecord) -> RepositoryResult<Option<SeriesSlice>> {
        self.check_health()?;
        let handle = match self.data.read().series.get(&record.series) {
            Some(handle) => Arc::clone(handle),
            None => return Ok(None),
        };
        let series = handle.read();
        let samples = match &record.period {
            Some(period) => series.select_within(period),
            None => Vec::new(),
        };
        Ok(Some(SeriesSlice {
            key: series.key().clone(),
            fields: series.fields().to_vec(),
            shape: series.shape(),
            period: series.period(),
            samples,
        }))
    }

    fn delete_observations(&self, procedure: &ProcedureId) -> RepositoryResult<usize> {
        self.check_health()?;
        let mut data = self.data.write();
        let before = data.series.len();
        data.series.retain(|key, _| key.procedure != *procedure);
        data.records.retain(|_, record| record.series.procedure != *procedure);
        let removed = before - data.series.len();
        if removed > 0 {
            info!("Removed {} series of {}", removed, procedure);
        }
        Ok(removed)
    }
}

impl TemplateRepository for LocalRepository {
    fn store_template(&self, draft: TemplateDraft) -> RepositoryResult<ResultTemplate> {
        self.check_health()?;
        let mut data = self.data.write();

        let id = match draft.requested_id.clone() {
            Some(id) => id,
            None => {
                if let Some(existing) = data.templates.values().find(|t| draft.same_shape(t)) {
                    return Ok(existing.clone());
                }
                let counter = data.template_counters.entry(draft.procedure.clone()).or_insert(0);
                let id = TemplateId::new(format!("{}-{}", draft.id_prefix, counter));
                *counter += 1;
                id
            }
        };

        let template = ResultTemplate {
            id: id.clone(),
            procedure: draft.procedure,
            offering: draft.offering,
            observed_property: draft.observed_property,
            feature_of_interest: draft.feature_of_interest,
            temporal_filters: draft.temporal_filters,
            fields: draft.fields,
            encoding: draft.encoding,
        };
        info!("Stored result template {}", id);
        data.templates.insert(id, template.clone());
        Ok(template)
    }

    fn get_template(&self, id: &TemplateId) -> RepositoryResult<Option<ResultTemplate>> {
        self.check_health()?;
        Ok(self.data.read().templates.get(id).cloned())
    }

    fn list_templates(&self) -> RepositoryResult<Vec<ResultTemplate>> {
        self.check_health()?;
        Ok(self.data.read().templates.values().cloned().collect())
    }
}
