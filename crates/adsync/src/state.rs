// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::path::Path;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::activity::ActivityRecorder;
use crate::agent::AgentCall;
use crate::config::SyncConfig;
use crate::directory::StaticDirectory;
use crate::notify::{BroadcastSink, FanoutSink, NotificationSink, WebhookSink};
use crate::orchestrator::{Orchestrator, OrchestratorDeps};
use crate::store::{ActivityStore, FileStore, MemoryStore, SyncStore};
use crate::tracker::SyncStateTracker;

/// Shared server state.
pub struct AppState {
    pub config: SyncConfig,
    pub directory: Arc<StaticDirectory>,
    pub orchestrator: Orchestrator,
    /// Notification hub for `/ws/events` clients.
    pub events: Arc<BroadcastSink>,
    pub shutdown: CancellationToken,
}

impl AppState {
    /// Wire the orchestrator from config. Opens the file store when
    /// `state_dir` is set.
    pub fn new(
        config: SyncConfig,
        directory: Arc<StaticDirectory>,
        caller: Arc<dyn AgentCall>,
        shutdown: CancellationToken,
    ) -> anyhow::Result<Self> {
        let (sync_store, activity_store) = open_store(config.state_dir.as_deref())?;

        let events = Arc::new(BroadcastSink::default());
        let broadcast: Arc<dyn NotificationSink> = events.clone();
        let mut sink = FanoutSink::new(vec![broadcast]);
        if let Some(url) = &config.notify_webhook {
            sink.push(Arc::new(WebhookSink::new(url.clone())));
        }
        let notify: Arc<dyn NotificationSink> = Arc::new(sink);

        let orchestrator = Orchestrator::new(
            OrchestratorDeps {
                accounts: directory.clone(),
                directory: directory.clone(),
                caller,
                tracker: Arc::new(SyncStateTracker::new(sync_store)),
                activity: Arc::new(ActivityRecorder::new(activity_store)),
                notify,
            },
            config.orchestrator_settings(),
        );

        Ok(Self { config, directory, orchestrator, events, shutdown })
    }
}

fn open_store(dir: Option<&Path>) -> anyhow::Result<(Arc<dyn SyncStore>, Arc<dyn ActivityStore>)> {
    match dir {
        Some(dir) => {
            let store = Arc::new(FileStore::open(dir)?);
            tracing::info!(path = %dir.display(), "using file-backed state");
            let sync: Arc<dyn SyncStore> = store.clone();
            let activity: Arc<dyn ActivityStore> = store;
            Ok((sync, activity))
        }
        None => {
            let store = Arc::new(MemoryStore::new());
            let sync: Arc<dyn SyncStore> = store.clone();
            let activity: Arc<dyn ActivityStore> = store;
            Ok((sync, activity))
        }
    }
}
