//! Repository trait definitions for the observation store.
//!
//! The store is split into focused traits so implementations stay testable:
//!
//! - [`error`]: Error types for repository operations
//! - [`sensor`]: Sensors and offering bindings
//! - [`feature`]: Phenomena and features of interest
//! - [`observation`]: Series merge, sample queries and observation records
//! - [`template`]: Result templates and their numbering
//!
//! # Convenience Trait Bound
//!
//! For code that needs every capability, use the [`FullRepository`] trait bound:
//!
//! ```ignore
//! fn register<R: FullRepository + ?Sized>(repo: &R, sensor: Sensor) -> RepositoryResult<()> {
//!     repo.insert_sensor(sensor)?;
//!     Ok(())
//! }
//! ```

pub mod error;
pub mod feature;
pub mod observation;
pub mod sensor;
pub mod template;

// Re-export error types
pub use error::{ErrorContext, RepositoryError, RepositoryResult};

// Re-export all traits
pub use feature::FeatureRepository;
pub use observation::{InsertReceipt, ObservationRecord, ObservationRepository, SampleQuery, SeriesInfo};
pub use sensor::SensorRepository;
pub use template::{TemplateDraft, TemplateRepository};

/// Composite trait bound for a complete store implementation.
///
/// Automatically implemented for any type that implements all four traits.
pub trait FullRepository:
    SensorRepository + FeatureRepository + ObservationRepository + TemplateRepository
{
}

// Blanket implementation: any type implementing all four traits automatically implements FullRepository
impl<T> FullRepository for T where
    T: SensorRepository + FeatureRepository + ObservationRepository + TemplateRepository
{
}
