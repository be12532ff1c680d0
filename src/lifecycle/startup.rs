//! Startup orchestration.
//!
//! # Responsibilities
//! - Open the state store and build the relay engine
//! - Start background tasks (health monitor, config reload, metrics)
//! - Bind listeners and begin accepting traffic
//! - Drive graceful shutdown
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal
//! - Listeners start last (traffic only when the engine is ready)
//! - Shutdown disposes the engine after the listeners have drained

use std::path::PathBuf;
use std::sync::Arc;

use tokio::net::TcpListener;
use tokio::sync::mpsc;

use crate::admin::{setup_admin_router, AdminState};
use crate::config::schema::{RelayConfig, SettingsPatch, StorageConfig};
use crate::config::watcher::{ConfigReload, ConfigWatcher};
use crate::engine::{EngineServices, RelayEngine};
use crate::health::HealthMonitor;
use crate::http::ProxyServer;
use crate::lifecycle::shutdown::Shutdown;
use crate::lifecycle::signals::shutdown_signal;
use crate::observability::metrics;
use crate::relay::transport::ReqwestTransport;
use crate::storage::{JsonFileStore, KeyValueStore, MemoryStore, StoreError};

/// The configured state store: a JSON file, or memory when no path is set.
pub fn open_store(config: &StorageConfig) -> Result<Arc<dyn KeyValueStore>, StoreError> {
    match &config.path {
        Some(path) => Ok(Arc::new(JsonFileStore::open(path)?)),
        None => {
            tracing::warn!("No storage path configured, state will not survive restarts");
            Ok(Arc::new(MemoryStore::new()))
        }
    }
}

/// Run the host proxy until a shutdown signal arrives.
pub async fn run(
    config: RelayConfig,
    config_path: Option<PathBuf>,
) -> Result<(), Box<dyn std::error::Error>> {
    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let engine = RelayEngine::create(
        &config,
        EngineServices {
            transport: Arc::new(ReqwestTransport::new()),
            store: open_store(&config.storage)?,
            ..EngineServices::default()
        },
    );

    let shutdown = Arc::new(Shutdown::new());
    let mut tasks = Vec::new();

    let monitor = HealthMonitor::new(engine.prober(), config.health.clone());
    tasks.push(tokio::spawn(monitor.run(shutdown.subscribe())));

    // Kept alive for the lifetime of the process.
    let _watcher = match &config_path {
        Some(path) => {
            let (guard, reloads) = ConfigWatcher::new(path, &config).spawn(shutdown.subscribe())?;
            tasks.push(tokio::spawn(apply_reloads(Arc::clone(&engine), reloads)));
            Some(guard)
        }
        None => None,
    };

    if config.admin.enabled {
        let listener = TcpListener::bind(&config.admin.bind_address).await?;
        tracing::info!(address = %listener.local_addr()?, "Admin API listening");
        let router = setup_admin_router(AdminState::new(Arc::clone(&engine), &config.admin.api_key));
        let mut stop = shutdown.subscribe();
        tasks.push(tokio::spawn(async move {
            let served = axum::serve(listener, router)
                .with_graceful_shutdown(async move {
                    let _ = stop.recv().await;
                })
                .await;
            if let Err(e) = served {
                tracing::error!(error = %e, "Admin API failed");
            }
        }));
    }

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    let server = ProxyServer::new(Arc::clone(&engine), &config.listener);
    let proxy = tokio::spawn(server.run(listener, shutdown.subscribe()));

    shutdown_signal().await;
    shutdown.trigger();

    proxy.await??;
    for task in tasks {
        let _ = task.await;
    }

    engine.dispose();
    tracing::info!("Shutdown complete");
    Ok(())
}

/// Apply runtime changes from the config file until the watcher stops.
async fn apply_reloads(engine: Arc<RelayEngine>, mut reloads: mpsc::UnboundedReceiver<ConfigReload>) {
    while let Some(reload) = reloads.recv().await {
        if reload.settings != SettingsPatch::default() {
            engine.update_settings(&reload.settings);
        }
        if let Some(auth) = reload.auth {
            tracing::info!(rules = auth.len(), "Auth rules reloaded");
            engine.set_auth_rules(auth);
        }
    }
}
