//! Observation storage.
//!
//! This module provides abstractions for storage operations via the Repository
//! pattern, allowing different storage backends to be swapped easily.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │  SOS worker / configurer / HTTP surface                 │
//! └───────────────────┬─────────────────────────────────────┘
//!                     │
//! ┌───────────────────▼─────────────────────────────────────┐
//! │  Repository traits (repository/) - Abstract Interface   │
//! └───────────────────┬─────────────────────────────────────┘
//!                     │
//!     ┌───────────────▼──────────────────────────────┐
//!     │   Local Repository (in-memory, per-series    │
//!     │   locks over `series::TimeSeries`)           │
//!     └──────────────────────────────────────────────┘
//! ```
//!
//! The module includes:
//! - `repository`: Trait definitions and the error type
//! - `repositories::local`: In-memory implementation
//! - `series`: Ordered sample series with last-write-wins merge
//! - `factory`: Factory for creating repository instances

pub mod factory;
pub mod repositories;
pub mod repository;
pub mod series;

pub use factory::{RepositoryFactory, RepositoryType};
pub use repositories::LocalRepository;
pub use repository::{
    ErrorContext, FeatureRepository, FullRepository, InsertReceipt, ObservationRecord,
    ObservationRepository, RepositoryError, RepositoryResult, SampleQuery, SensorRepository,
    SeriesInfo, TemplateDraft, TemplateRepository,
};
pub use series::{MergeSummary, SampleKey, SeriesKey, SeriesSlice, TimeSeries};
