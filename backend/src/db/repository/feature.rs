//! Phenomenon and feature-of-interest dictionary.

use super::error::RepositoryResult;
use crate::models::{FeatureId, FeatureOfInterest, Phenomenon, PhenomenonId};

/// Repository trait for the phenomena and features observations refer to.
pub trait FeatureRepository: Send + Sync {
    /// Register a phenomenon. An already known id keeps its first definition.
    ///
    /// # Returns
    /// The stored definition, which callers must use to lay out result columns.
    fn register_phenomenon(&self, phenomenon: Phenomenon) -> RepositoryResult<Phenomenon>;

    fn get_phenomenon(&self, id: &PhenomenonId) -> RepositoryResult<Option<Phenomenon>>;

    /// Register or replace a feature of interest.
    fn register_feature(&self, feature: FeatureOfInterest) -> RepositoryResult<()>;

    fn get_feature(&self, id: &FeatureId) -> RepositoryResult<Option<FeatureOfInterest>>;

    /// All features ordered by id.
    fn list_features(&self) -> RepositoryResult<Vec<FeatureOfInterest>>;
}
