// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! adsync: fans discovery, creative sync and signal activation out to many
//! advertising agents, tolerating per-agent failure and tracking per-agent
//! sync and approval state.

pub mod activity;
pub mod agent;
pub mod config;
pub mod directory;
pub mod error;
pub mod fanout;
pub mod model;
pub mod notify;
pub mod orchestrator;
pub mod selector;
pub mod state;
pub mod store;
pub mod tracker;
pub mod transport;

#[doc(hidden)]
pub mod test_support;

use std::sync::Arc;

use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use crate::agent::{ClientRegistry, HttpTransport};
use crate::config::SyncConfig;
use crate::directory::{RegistryConfig, StaticDirectory};
use crate::state::AppState;
use crate::transport::build_router;

/// Load the registry file, or start empty when none is configured.
pub fn load_directory(config: &SyncConfig) -> anyhow::Result<StaticDirectory> {
    let registry = match config.registry {
        Some(ref path) => RegistryConfig::load(path)
            .map_err(|e| anyhow::anyhow!("failed to load registry {}: {e:#}", path.display()))?,
        None => {
            tracing::warn!("no --registry given, starting with an empty directory");
            RegistryConfig::default()
        }
    };
    Ok(StaticDirectory::new(registry))
}

/// Run the orchestrator server until shutdown.
pub async fn run(config: SyncConfig, shutdown: CancellationToken) -> anyhow::Result<()> {
    config.validate()?;
    let addr = format!("{}:{}", config.host, config.port);

    let directory = Arc::new(load_directory(&config)?);
    let clients = Arc::new(ClientRegistry::new(Arc::new(HttpTransport::new())));
    let state = Arc::new(AppState::new(config, directory, clients, shutdown.clone())?);

    let listener = TcpListener::bind(&addr).await?;
    tracing::info!(
        addr = %listener.local_addr()?,
        agents = state.directory.agent_count(),
        auth = state.config.auth_token.is_some(),
        "adsync listening"
    );
    axum::serve(listener, build_router(state)).with_graceful_shutdown(shutdown.cancelled_owned()).await?;

    Ok(())
}
