//! Result template repository trait.

use super::error::RepositoryResult;
use crate::filter::TemporalFilter;
use crate::models::{FeatureId, OfferingId, PhenomenonId, ProcedureId, ResultTemplate, TemplateId};
use crate::services::encoding::TextEncoding;

/// A template before it has an id.
#[derive(Debug, Clone, PartialEq)]
pub struct TemplateDraft {
    /// Client-chosen identifier; generated when `None`.
    pub requested_id: Option<TemplateId>,
    /// Prefix of generated ids; `-<n>` is appended.
    pub id_prefix: String,
    pub procedure: ProcedureId,
    pub offering: OfferingId,
    pub observed_property: PhenomenonId,
    pub feature_of_interest: Option<FeatureId>,
    pub temporal_filters: Vec<TemporalFilter>,
    pub fields: Vec<PhenomenonId>,
    pub encoding: TextEncoding,
}

impl TemplateDraft {
    /// Whether `template` was created from the same combination.
    pub fn same_shape(&self, template: &ResultTemplate) -> bool {
        self.procedure == template.procedure
            && self.offering == template.offering
            && self.observed_property == template.observed_property
            && self.feature_of_interest == template.feature_of_interest
            && self.temporal_filters == template.temporal_filters
    }
}

/// Repository trait for result templates.
pub trait TemplateRepository: Send + Sync {
    /// Store a template.
    ///
    /// Generated ids are numbered per procedure (`<prefix>-0`, `<prefix>-1`, ...).
    /// A draft matching an existing template's combination returns that
    /// template unchanged.
    fn store_template(&self, draft: TemplateDraft) -> RepositoryResult<ResultTemplate>;

    fn get_template(&self, id: &TemplateId) -> RepositoryResult<Option<ResultTemplate>>;

    /// All templates ordered by id.
    fn list_templates(&self) -> RepositoryResult<Vec<ResultTemplate>>;
}
