//! Request filters: temporal operators and BBOX.

pub mod spatial;
pub mod temporal;

pub use spatial::BBoxFilter;
pub use temporal::{matches_all, TemporalFilter};
