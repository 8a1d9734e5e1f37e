//! Repository implementations module.
//!
//! - `local`: In-memory implementation backing the service and its tests
pub mod local;

pub use local::LocalRepository;
