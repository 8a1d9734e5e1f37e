//! SOS HTTP Server Binary
//!
//! Main entry point for the SOS JSON API. It opens the configuration
//! directory, makes sure the default service is configured, sets up the HTTP
//! router, and starts serving requests.
//!
//! # Usage
//!
//! ```bash
//! # Serve the services configured in ./config
//! cargo run --bin sos-server
//!
//! # Serve another directory and default service
//! SOS_CONFIG_DIR=/etc/sos SOS_SERVICE_ID=coastal cargo run --bin sos-server
//! ```
//!
//! # Environment Variables
//!
//! - `HOST`: Server host (default: 0.0.0.0)
//! - `PORT`: Server port (default: 8080)
//! - `SOS_CONFIG_DIR`: Directory of `<service-id>.toml` files (default: ./config)
//! - `SOS_SERVICE_ID`: Service created with default settings when unconfigured (default: default)
//! - `SOS_REPOSITORY_TYPE`: Store backend written into that default configuration (default: local)
//! - `RUST_LOG`: Log level (default: info)

use std::env;
use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use examind_sos::config::{FileConfigStore, ServiceConfigStore, SosConfiguration};
use examind_sos::db::RepositoryType;
use examind_sos::http::{create_router, AppState};
use examind_sos::services::SosConfigurer;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    FmtSubscriber::builder()
        .with_max_level(
            env::var("RUST_LOG")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(Level::INFO),
        )
        .with_target(true)
        .with_thread_ids(true)
        .init();

    info!("Starting SOS HTTP Server");

    let config_dir = env::var("SOS_CONFIG_DIR").unwrap_or_else(|_| "config".to_string());
    std::fs::create_dir_all(&config_dir)
        .with_context(|| format!("cannot create configuration directory {}", config_dir))?;
    let store = FileConfigStore::new(&config_dir);

    let service_id = env::var("SOS_SERVICE_ID").unwrap_or_else(|_| "default".to_string());
    if store.load_raw(&service_id)?.is_none() {
        info!("No configuration for {}, writing defaults to {}", service_id, config_dir);
        let mut config = SosConfiguration::default();
        config.repository.repo_type = RepositoryType::from_env().map_err(anyhow::Error::msg)?;
        store.save(&service_id, &config)?;
    }

    let configurer = Arc::new(SosConfigurer::new(Arc::new(store)));
    for id in configurer.list_services()? {
        let worker = configurer.worker(&id)?;
        match worker.start_error() {
            None => info!("Service {} is {}", id, worker.status()),
            Some(cause) => tracing::warn!("Service {} is {}: {}", id, worker.status(), cause),
        }
    }

    let app = create_router(AppState::new(Arc::clone(&configurer)));

    let host = env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
    let port: u16 = env::var("PORT")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(8080);
    let addr: SocketAddr = format!("{}:{}", host, port).parse()?;

    info!("Server listening on http://{}", addr);
    info!("Health: http://{}/health", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await?;

    info!("Shutting down SOS services");
    configurer.shutdown();
    Ok(())
}
