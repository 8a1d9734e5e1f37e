//! Service layer between the store and the request surfaces.
//!
//! The worker and the HTTP layer call into these modules; none of them holds
//! request state.

pub mod configurer;
pub mod decimation;
pub mod encoding;
pub mod events;
pub mod resolver;

pub use configurer::{ConfigurerError, ConfigurerResult, SosConfigurer};
pub use decimation::{csv_header, to_csv, Decimator};
pub use encoding::{EncodingError, TextEncoding};
pub use events::{EventBus, EventResponse, SosEvent, SubscriptionHandle};
