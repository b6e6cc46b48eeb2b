//! # relayhubd — relayhub daemon
//!
//! Composition root that wires all adapters together and starts the server.
//!
//! ## Responsibilities
//! - Parse configuration (`relayhub.toml`, env vars)
//! - Initialise `tracing` from the configured filter
//! - Open the JSON store and load devices and profiles; any failure here
//!   stops the daemon before it binds
//! - Start the persistence lanes, build the operations and the axum router
//! - Serve until SIGINT/SIGTERM, then flush pending table writes
//!
//! ## Dependency rule
//! This is the **only** crate that depends on all other crates.
//! It is the wiring layer; no domain logic belongs here.

mod config;

use std::sync::Arc;

use anyhow::Context;
use tracing_subscriber::EnvFilter;

use relayhub_adapter_http_axum::router;
use relayhub_adapter_http_axum::state::AppState;
use relayhub_adapter_storage_json::Config as StoreConfig;
use relayhub_app::access::AccessControl;
use relayhub_app::operations::Operations;
use relayhub_app::persistence::{self, PersistenceSync};
use relayhub_app::registry::DeviceRegistry;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = config::Config::load().context("failed to load configuration")?;

    let filter = EnvFilter::try_new(&config.logging.filter)
        .with_context(|| format!("invalid log filter {:?}", config.logging.filter))?;
    tracing_subscriber::fmt().with_env_filter(filter).init();

    // Storage
    let store = StoreConfig {
        data_dir: config.storage.data_dir.clone(),
    }
    .build()
    .await
    .context("failed to open data directory")?;

    // State
    let registry = Arc::new(DeviceRegistry::new());
    let access = Arc::new(AccessControl::new());
    persistence::load(&store)
        .await
        .context("failed to load persisted state")?
        .install(&registry, &access)
        .context("persisted state is inconsistent")?;
    tracing::info!(
        data_dir = %config.storage.data_dir.display(),
        devices = registry.len(),
        profiles = access.len(),
        "state loaded"
    );

    // Persistence lanes
    let sync = PersistenceSync::start(
        store,
        Arc::clone(&registry),
        Arc::clone(&access),
        config.retry_policy(),
    );

    // HTTP
    let state = AppState::new(Operations::new(registry, access, sync.handle()));
    let app = router::build(state);

    let bind_addr = config.bind_addr();
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind {bind_addr}"))?;
    tracing::info!(%bind_addr, "relayhubd listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    tracing::info!("flushing pending writes");
    if let Err(err) = sync.shutdown().await {
        tracing::error!(error = %err, "some tables could not be written");
    }
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %err, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                tracing::error!(error = %err, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
    tracing::info!("shutdown signal received");
}
