//! HTTP server module for the SOS service.
//!
//! An axum router exposing the workers of an [`SosConfigurer`](crate::services::SosConfigurer)
//! as a JSON API, plus the administrative CSV export.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │  HTTP Layer (axum handlers)                               │
//! │  - JSON requests tagged by operation                      │
//! │  - Faults rendered as exception reports                   │
//! │  - CORS, compression, tracing                             │
//! └───────────────────┬──────────────────────────────────────┘
//!                     │
//! ┌───────────────────▼──────────────────────────────────────┐
//! │  Worker Layer (worker/, services/configurer)              │
//! │  - Lifecycle and request validation                       │
//! │  - Decimation and CSV export                              │
//! └───────────────────┬──────────────────────────────────────┘
//!                     │
//! ┌───────────────────▼──────────────────────────────────────┐
//! │  Repository Layer (db/)                                   │
//! │  - Series merge and sample queries                        │
//! │  - LocalRepository                                        │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! # Routes
//!
//! | Method | Path                                        | |
//! |--------|---------------------------------------------|-|
//! | GET    | `/health`                                   | service states |
//! | GET    | `/sos`                                      | configured services |
//! | POST   | `/sos/{service_id}`                         | any SOS request |
//! | POST   | `/sos/{service_id}/restart`                 | re-read configuration |
//! | GET    | `/sos/{service_id}/sensors`                 | registered sensors |
//! | DELETE | `/sos/{service_id}/sensors/{sensor_id}`     | delete a sensor |
//! | GET    | `/sos/{service_id}/sensors/{sensor_id}/csv` | CSV export |

#[cfg(feature = "http-server")]
pub mod handlers;

#[cfg(feature = "http-server")]
pub mod router;

#[cfg(feature = "http-server")]
pub mod state;

#[cfg(feature = "http-server")]
pub mod error;

#[cfg(feature = "http-server")]
pub mod dto;

#[cfg(feature = "http-server")]
pub use router::create_router;

#[cfg(feature = "http-server")]
pub use state::AppState;
