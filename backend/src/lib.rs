//! # Examind SOS
//!
//! Sensor Observation Service core: an observation store with last-write-wins
//! series merge, OGC temporal and spatial filters, a decimating CSV exporter,
//! and a worker serving SOS 1.0.0 and 2.0.0 requests.
//!
//! ## Features
//!
//! - **Observation store**: one ordered series per (procedure, phenomenon, feature),
//!   overlapping inserts replace samples at the same key
//! - **Filters**: TEquals, TBefore, TAfter, TDuring and BBOX
//! - **Decimation**: bucket min/max downsampling for CSV export
//! - **SOS worker**: lifecycle state machine, ordered validation, OGC exception codes
//! - **HTTP API**: JSON endpoints over axum (feature `http-server`)
//!
//! ## Architecture
//!
//! - [`models`]: identifiers, samples, observations, features and time types
//! - [`filter`]: temporal and spatial request filters
//! - [`db`]: repository traits and the in-memory `LocalRepository`
//! - [`services`]: decimation, result encoding, resolver, events and the configurer
//! - [`worker`]: the SOS worker and its request/response model
//! - [`config`]: service configuration and its stores
//! - [`http`]: Axum-based HTTP server and request handlers

// Allow large error types - RepositoryError contains rich context for debugging
#![allow(clippy::result_large_err)]

pub mod config;
pub mod db;
pub mod filter;
pub mod models;
pub mod services;
pub mod worker;

#[cfg(feature = "http-server")]
pub mod http;
