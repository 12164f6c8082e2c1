// SPDX-FileCopyrightText: 2026 Lifeline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `lifeline serve` command implementation.
//!
//! Opens SQLite storage, clears presence left over from a previous process,
//! builds the hub, and runs the gateway until a shutdown signal arrives.

use std::sync::Arc;

use lifeline_config::LifelineConfig;
use lifeline_core::{HealthStatus, LifelineError, PluginAdapter, StorageAdapter};
use lifeline_gateway::Gateway;
use lifeline_hub::{Hub, HubOptions};
use lifeline_storage::SqliteStorage;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::shutdown;

/// Runs the `lifeline serve` command.
pub async fn run_serve(config: LifelineConfig) -> Result<(), LifelineError> {
    init_tracing(&config.server.log_level);

    info!(name = %config.server.name, "starting lifeline serve");

    let storage = SqliteStorage::new(config.storage.clone());
    storage.initialize().await?;
    let storage: Arc<dyn StorageAdapter> = Arc::new(storage);

    // No session survives a restart.
    mark_stale_presence(storage.as_ref()).await?;

    let hub = Arc::new(Hub::new(storage.clone(), HubOptions::from(&config)));
    let gateway = Gateway::new(config.gateway.clone(), config.server.name.clone(), hub);

    let root = CancellationToken::new();
    let cancel = shutdown::install_signal_handler(&root);

    let addr = gateway.start().await?;
    report_health(storage.as_ref()).await;
    report_health(&gateway).await;
    info!(%addr, "lifeline is accepting connections");

    cancel.cancelled().await;

    info!("shutting down gateway");
    gateway.shutdown().await?;
    if let Err(e) = storage.close().await {
        warn!(error = %e, "storage close failed");
    }

    info!("lifeline serve shutdown complete");
    Ok(())
}

/// Marks every presence record offline.
///
/// Handles the case where the process was previously killed without a
/// graceful shutdown, leaving users recorded as online.
async fn mark_stale_presence(storage: &dyn StorageAdapter) -> Result<usize, LifelineError> {
    let reset = storage.reset_presence().await?;
    if reset > 0 {
        info!(count = reset, "marked stale presence records offline");
    }
    Ok(reset)
}

/// Logs one adapter's identity and current health.
async fn report_health<A: PluginAdapter + ?Sized>(adapter: &A) {
    let name = adapter.name();
    let kind = adapter.adapter_type();
    let version = adapter.version();
    match adapter.health_check().await {
        Ok(HealthStatus::Healthy) => info!(adapter = name, %kind, %version, "adapter healthy"),
        Ok(status) => warn!(adapter = name, %kind, %version, ?status, "adapter not healthy"),
        Err(e) => warn!(adapter = name, %kind, error = %e, "adapter health check failed"),
    }
}

/// Builds the log filter from `RUST_LOG`, falling back to the configured level.
///
/// A bare level applies to Lifeline's own crates; anything containing `=` is
/// taken as a full filter directive.
fn log_filter(log_level: &str) -> tracing_subscriber::EnvFilter {
    use tracing_subscriber::EnvFilter;

    EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if log_level.contains('=') {
            EnvFilter::new(log_level)
        } else {
            EnvFilter::new(format!("lifeline={log_level},tower_http={log_level},warn"))
        }
    })
}

/// Initializes the tracing subscriber with the given log level.
fn init_tracing(log_level: &str) {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(log_filter(log_level))
        .with_target(true)
        .with_thread_names(false)
        .try_init();
}
