//! Domain model shared by the store, the decimator and the worker.

pub mod macros;

pub mod feature;
pub mod observation;
pub mod sensor;
pub mod time;

crate::define_urn_type!(ProcedureId);
crate::define_urn_type!(OfferingId);
crate::define_urn_type!(PhenomenonId);
crate::define_urn_type!(FeatureId);
crate::define_urn_type!(TemplateId);
crate::define_urn_type!(ObservationId);

pub use feature::*;
pub use observation::*;
pub use sensor::*;
pub use time::*;
