//! Application state for the HTTP server.

use std::sync::Arc;

use crate::services::SosConfigurer;

/// Shared application state passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    /// Worker registry every route resolves its service through
    pub configurer: Arc<SosConfigurer>,
}

impl AppState {
    pub fn new(configurer: Arc<SosConfigurer>) -> Self {
        Self { configurer }
    }
}
