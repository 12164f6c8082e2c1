// SPDX-FileCopyrightText: 2026 Lifeline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP/WebSocket gateway for the Lifeline hub.
//!
//! The gateway is a thin boundary: it authenticates callers, translates HTTP
//! and WebSocket frames into [`Hub`] calls, and maps errors to statuses. It
//! holds no domain state of its own.

pub mod auth;
pub mod error;
pub mod handlers;
pub mod server;
pub mod ws;

use std::net::SocketAddr;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

use lifeline_config::model::GatewayConfig;
use lifeline_core::{AdapterType, HealthStatus, LifelineError, PluginAdapter};
use lifeline_hub::Hub;

use crate::auth::AuthConfig;
use crate::server::{GatewayState, HealthState, ServerConfig};

/// Runs the axum server as a background task bound to the configured address.
pub struct Gateway {
    config: GatewayConfig,
    name: String,
    hub: Arc<Hub>,
    shutdown: CancellationToken,
    server_handle: Mutex<Option<tokio::task::JoinHandle<()>>>,
}

impl Gateway {
    pub fn new(config: GatewayConfig, name: impl Into<String>, hub: Arc<Hub>) -> Self {
        Self {
            config,
            name: name.into(),
            hub,
            shutdown: CancellationToken::new(),
            server_handle: Mutex::new(None),
        }
    }

    /// Shared handler state for this gateway.
    pub fn state(&self) -> GatewayState {
        GatewayState {
            hub: Arc::clone(&self.hub),
            auth: AuthConfig {
                bearer_token: self.config.bearer_token.clone(),
            },
            health: HealthState {
                start_time: std::time::Instant::now(),
                name: self.name.clone(),
            },
        }
    }

    /// Bind and start serving. Returns the bound address.
    pub async fn start(&self) -> Result<SocketAddr, LifelineError> {
        if self.config.bearer_token.is_none() {
            tracing::warn!("gateway.bearer_token is not set; every request will be rejected");
        }
        let listener = server::bind(&ServerConfig {
            host: self.config.host.clone(),
            port: self.config.port,
        })
        .await?;
        let addr = listener.local_addr().map_err(|e| LifelineError::Channel {
            message: format!("failed to read gateway address: {e}"),
            source: Some(Box::new(e)),
        })?;

        let state = self.state();
        let shutdown = self.shutdown.clone();
        let handle = tokio::spawn(async move {
            if let Err(e) = server::serve(listener, state, shutdown).await {
                tracing::error!("gateway server error: {e}");
            }
        });
        *self.server_handle.lock().await = Some(handle);

        tracing::info!(%addr, "gateway started");
        Ok(addr)
    }

    /// Token that stops the server when cancelled.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }
}

#[async_trait]
impl PluginAdapter for Gateway {
    fn name(&self) -> &str {
        "gateway"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Channel
    }

    async fn health_check(&self) -> Result<HealthStatus, LifelineError> {
        let handle = self.server_handle.lock().await;
        match handle.as_ref() {
            Some(h) if !h.is_finished() => Ok(HealthStatus::Healthy),
            Some(_) => Ok(HealthStatus::Unhealthy("server exited".to_string())),
            None => Ok(HealthStatus::Unhealthy("server not started".to_string())),
        }
    }

    async fn shutdown(&self) -> Result<(), LifelineError> {
        self.shutdown.cancel();
        let handle = self.server_handle.lock().await.take();
        if let Some(h) = handle {
            h.await.map_err(|e| LifelineError::Internal(format!("gateway task failed: {e}")))?;
        }
        Ok(())
    }
}
