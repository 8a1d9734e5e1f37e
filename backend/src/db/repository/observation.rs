//! Observation repository trait: series merge and sample queries.

use serde::{Deserialize, Serialize};

use super::error::RepositoryResult;
use crate::db::series::{MergeSummary, SeriesKey, SeriesSlice};
use crate::filter::TemporalFilter;
use crate::models::{
    Envelope, FeatureId, NewObservation, ObservationId, ObservationKind, OfferingId, PhenomenonId,
    ProcedureId, TimePeriod,
};

/// Sample selection. Empty lists match everything.
#[derive(Debug, Clone, Default)]
pub struct SampleQuery {
    pub procedures: Vec<ProcedureId>,
    /// Restricts to procedures bound to one of these offerings.
    pub offerings: Vec<OfferingId>,
    /// Matches a series whose phenomenon is listed or carries a listed field.
    pub phenomena: Vec<PhenomenonId>,
    pub features: Vec<FeatureId>,
    /// Conjoined.
    pub temporal: Vec<TemporalFilter>,
    /// Intersected with the feature-of-interest envelope.
    pub bbox: Option<Envelope>,
}

impl SampleQuery {
    pub fn for_procedure(procedure: ProcedureId) -> Self {
        Self {
            procedures: vec![procedure],
            ..Default::default()
        }
    }
}

/// What an insert produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InsertReceipt {
    pub observation_id: ObservationId,
    pub series: SeriesKey,
    pub summary: MergeSummary,
    pub period: Option<TimePeriod>,
}

/// Where an inserted observation landed, for GetObservationById.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObservationRecord {
    pub id: ObservationId,
    pub series: SeriesKey,
    pub period: Option<TimePeriod>,
}

/// Series metadata without samples.
#[derive(Debug, Clone, PartialEq)]
pub struct SeriesInfo {
    pub key: SeriesKey,
    pub fields: Vec<PhenomenonId>,
    pub shape: ObservationKind,
    pub period: Option<TimePeriod>,
    pub len: usize,
}

/// Repository trait for observation storage.
///
/// # Concurrency
/// Inserts into one series are serialized; inserts into different series may
/// run in parallel. Every returned slice is a consistent snapshot of its series.
pub trait ObservationRepository: Send + Sync {
    /// Merge an observation into its series and bind its procedure to `offering`.
    ///
    /// The procedure, feature and phenomenon must already be registered; the
    /// registered phenomenon fixes the row width.
    ///
    /// # Arguments
    /// * `offering` - Offering the observation is published under
    /// * `observation` - Samples plus their procedure, feature and phenomenon
    /// * `id_base` - Prefix of the generated observation id
    ///
    /// # Returns
    /// * `Ok(InsertReceipt)` - Assigned id and merge counts
    /// * `Err(RepositoryError::ValidationError)` - A row does not fit the series
    /// * `Err(RepositoryError::NotFound)` - Unknown procedure or phenomenon
    fn insert_observation(
        &self,
        offering: &OfferingId,
        observation: &NewObservation,
        id_base: &str,
    ) -> RepositoryResult<InsertReceipt>;

    /// Filtered snapshots of every matching series, samples ascending.
    /// Series with no matching sample are left out.
    fn get_samples(&self, query: &SampleQuery) -> RepositoryResult<Vec<SeriesSlice>>;

    /// Metadata of the series of a procedure.
    fn list_series(&self, procedure: &ProcedureId) -> RepositoryResult<Vec<SeriesInfo>>;

    /// Sampling period of a feature over every series observing it.
    fn feature_time_envelope(&self, feature: &FeatureId) -> RepositoryResult<Option<TimePeriod>>;

    /// Record of a previously inserted observation.
    fn observation_record(&self, id: &ObservationId) -> RepositoryResult<Option<ObservationRecord>>;

    /// Current rows of a recorded observation's window.
    fn observation_slice(&self, record: &ObservationRecord) -> RepositoryResult<Option<SeriesSlice>>;

    /// Drop every series of a procedure. Unknown procedures are a no-op.
    ///
    /// # Returns
    /// Number of series removed
    fn delete_observations(&self, procedure: &ProcedureId) -> RepositoryResult<usize>;
}
