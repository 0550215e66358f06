//! Kube Snapshot - control-plane inventory snapshotter
//!
//! Polls the control-plane API for nodes, pods and services on an interval
//! and appends flattened summary rows to a relational store. Collection can
//! be switched on and off through `POST /status/{value}`.

use anyhow::{Context, Result};
use snapshot_lib::{
    api::{self, AppState},
    health::{components, HealthRegistry},
    observability::{SnapshotMetrics, StructuredLogger},
    AvailabilityToggle, CollectionLoopBuilder, MemoryStore, RecordClock, RecordStore,
    ResourceClient, SqliteStore,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod config;

use crate::config::{SnapshotConfig, StoreBackend};

const SNAPSHOT_VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing with JSON output and env filter
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().json())
        .init();

    info!("Starting kube-snapshot");

    let config = SnapshotConfig::load()?;
    info!(
        control_plane = %config.control_plane_url,
        backend = ?config.store_backend,
        interval_secs = config.collection_interval_secs,
        "Snapshotter configured"
    );

    let health_registry = HealthRegistry::new();
    health_registry.register(components::COLLECTOR).await;
    health_registry.register(components::STORE).await;

    let metrics = SnapshotMetrics::new();
    let logger = StructuredLogger::new(&config.control_plane_url);

    // Reachability is informational only; collection runs either way
    let client = Arc::new(
        ResourceClient::new(&config.control_plane_url, config.request_timeout())
            .context("Failed to create control-plane client")?,
    );
    let reachable = client.probe().await;
    metrics.set_control_plane_reachable(reachable);
    if reachable {
        health_registry.set_healthy(components::CONTROL_PLANE).await;
    } else {
        health_registry
            .set_degraded(components::CONTROL_PLANE, "version probe failed at startup")
            .await;
    }

    let store: Arc<dyn RecordStore> = match config.store_backend {
        StoreBackend::Sqlite => Arc::new(
            SqliteStore::open(&config.database_path).with_context(|| {
                format!("Failed to open database {}", config.database_path.display())
            })?,
        ),
        StoreBackend::Memory => {
            Arc::new(MemoryStore::with_max_records(config.memory_max_records))
        }
    };

    let clock = RecordClock::with_offset_hours(config.record_utc_offset_hours)
        .context("Invalid record time offset")?;

    let toggle = AvailabilityToggle::default();
    metrics.set_collection_active(toggle.is_active());

    let collection_loop = CollectionLoopBuilder::new()
        .client(client)
        .store(store)
        .toggle(toggle.clone())
        .clock(clock)
        .health(health_registry.clone())
        .interval(config.collection_interval())
        .jitter(config.collection_jitter())
        .build()?;

    // Bind before any task starts so a taken port fails startup
    let addr = SocketAddr::from(([0, 0, 0, 0], config.api_port));
    let listener = api::bind(addr).await?;

    let (shutdown_tx, _) = broadcast::channel::<()>(1);

    let loop_handle = tokio::spawn(collection_loop.run(shutdown_tx.subscribe()));

    let app_state = Arc::new(AppState::new(
        toggle,
        health_registry.clone(),
        metrics,
        logger.clone(),
    ));
    let mut api_shutdown = shutdown_tx.subscribe();
    let mut api_handle = tokio::spawn(api::serve(listener, app_state, async move {
        let _ = api_shutdown.recv().await;
    }));

    health_registry.set_ready(true).await;
    logger.log_startup(SNAPSHOT_VERSION, reachable);

    // Stop on SIGINT or when the control API exits
    let api_result = tokio::select! {
        signal = tokio::signal::ctrl_c() => {
            signal?;
            logger.log_shutdown("SIGINT received");
            None
        }
        result = &mut api_handle => {
            logger.log_shutdown("control API server exited");
            Some(result)
        }
    };

    let _ = shutdown_tx.send(());
    loop_handle.await.context("Collection loop task failed")?;
    let api_result = match api_result {
        Some(result) => result,
        None => api_handle.await,
    };
    api_result.context("API server task failed")??;

    info!("Shutdown complete");
    Ok(())
}
