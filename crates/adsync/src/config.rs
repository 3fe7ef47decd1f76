// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

use crate::orchestrator::OrchestratorSettings;
use crate::selector::SelectOptions;

/// Multi-agent discovery and sync orchestrator.
#[derive(Debug, Clone, Parser)]
#[command(name = "adsync", version, about)]
pub struct SyncConfig {
    /// Host to bind on.
    #[arg(long, default_value = "127.0.0.1", env = "ADSYNC_HOST")]
    pub host: String,

    /// Port to listen on.
    #[arg(long, default_value_t = 9810, env = "ADSYNC_PORT")]
    pub port: u16,

    /// Bearer token for API auth. If unset, auth is disabled.
    #[arg(long, env = "ADSYNC_AUTH_TOKEN")]
    pub auth_token: Option<String>,

    /// Path to the agent/account/creative/campaign registry JSON file.
    #[arg(long, env = "ADSYNC_REGISTRY")]
    pub registry: Option<PathBuf>,

    /// Directory for persisted sync state and the activity log. In-memory when unset.
    #[arg(long, env = "ADSYNC_STATE_DIR")]
    pub state_dir: Option<PathBuf>,

    /// Per-agent call timeout in milliseconds.
    #[arg(long, default_value_t = 30_000, env = "ADSYNC_AGENT_TIMEOUT_MS")]
    pub agent_timeout_ms: u64,

    /// Maximum agent calls in flight at once.
    #[arg(long, default_value_t = 16, env = "ADSYNC_MAX_CONCURRENCY")]
    pub max_concurrency: usize,

    /// Lookback window for relevance selection, in days.
    #[arg(long, default_value_t = crate::selector::DEFAULT_DAYS_BACK, env = "ADSYNC_DAYS_BACK")]
    pub days_back: i64,

    /// Skip agents of active campaigns unless they had recent activity.
    #[arg(long, env = "ADSYNC_RECENT_ONLY")]
    pub recent_only: bool,

    /// URL to POST notifications to.
    #[arg(long, env = "ADSYNC_NOTIFY_WEBHOOK")]
    pub notify_webhook: Option<String>,

    /// Log format (json or text).
    #[arg(long, env = "ADSYNC_LOG_FORMAT", default_value = "text")]
    pub log_format: String,

    /// Log level filter (trace, debug, info, warn, error or a directive list).
    #[arg(long, env = "ADSYNC_LOG_LEVEL", default_value = "info")]
    pub log_level: String,
}

impl SyncConfig {
    /// Validate the configuration after parsing.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.agent_timeout_ms == 0 {
            anyhow::bail!("--agent-timeout-ms must be greater than zero");
        }
        if self.max_concurrency == 0 {
            anyhow::bail!("--max-concurrency must be greater than zero");
        }
        if self.days_back < 0 {
            anyhow::bail!("--days-back cannot be negative");
        }
        match self.log_format.as_str() {
            "json" | "text" => {}
            other => anyhow::bail!("invalid log format: {other}"),
        }
        Ok(())
    }

    pub fn agent_timeout(&self) -> Duration {
        Duration::from_millis(self.agent_timeout_ms)
    }

    pub fn orchestrator_settings(&self) -> OrchestratorSettings {
        OrchestratorSettings {
            agent_timeout: self.agent_timeout(),
            max_concurrency: self.max_concurrency,
            select: SelectOptions { days_back: self.days_back, include_active: !self.recent_only },
        }
    }

    /// Minimal config for tests: ephemeral port, in-memory state, short timeout.
    #[doc(hidden)]
    pub fn test() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 0,
            auth_token: None,
            registry: None,
            state_dir: None,
            agent_timeout_ms: 500,
            max_concurrency: 8,
            days_back: crate::selector::DEFAULT_DAYS_BACK,
            recent_only: false,
            notify_webhook: None,
            log_format: "text".into(),
            log_level: "debug".into(),
        }
    }
}
