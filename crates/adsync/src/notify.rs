// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Owner-facing notifications: failed or regressed syncs, approvals waiting
//! on an agent, degraded discovery.
//!
//! Delivery is fire-and-forget. A sink never blocks or fails the operation
//! that raised the notification.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    SyncFailed,
    SyncRegressed,
    ApprovalPending,
    DiscoveryDegraded,
}

impl NotificationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SyncFailed => "sync_failed",
            Self::SyncRegressed => "sync_regressed",
            Self::ApprovalPending => "approval_pending",
            Self::DiscoveryDegraded => "discovery_degraded",
        }
    }
}

/// Wire-format notification. Serialized as
/// `{"type": "...", "owner_id": "...", "payload": {...}, "ts": "..."}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    #[serde(rename = "type")]
    pub kind: NotificationKind,
    pub owner_id: String,
    pub payload: serde_json::Value,
    pub ts: DateTime<Utc>,
}

impl Notification {
    pub fn new(kind: NotificationKind, owner_id: impl Into<String>, payload: serde_json::Value) -> Self {
        Self { kind, owner_id: owner_id.into(), payload, ts: Utc::now() }
    }
}

pub trait NotificationSink: Send + Sync {
    fn notify(&self, event: Notification);
}

// -- Broadcast ----------------------------------------------------------------

/// In-process hub; feeds `/ws/events` subscribers.
pub struct BroadcastSink {
    tx: broadcast::Sender<Notification>,
}

impl BroadcastSink {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Notification> {
        self.tx.subscribe()
    }
}

impl Default for BroadcastSink {
    fn default() -> Self {
        Self::new(256)
    }
}

impl NotificationSink for BroadcastSink {
    fn notify(&self, event: Notification) {
        // No subscribers is not an error.
        let _ = self.tx.send(event);
    }
}

// -- Webhook ------------------------------------------------------------------

/// POSTs each notification as JSON to a fixed URL from a spawned task.
pub struct WebhookSink {
    url: String,
    client: Client,
}

impl WebhookSink {
    pub fn new(url: impl Into<String>) -> Self {
        let _ = rustls::crypto::ring::default_provider().install_default();
        let client = Client::builder().timeout(Duration::from_secs(10)).build().unwrap_or_default();
        Self { url: url.into(), client }
    }
}

impl NotificationSink for WebhookSink {
    fn notify(&self, event: Notification) {
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            tracing::warn!(kind = event.kind.as_str(), "webhook notify outside runtime, dropped");
            return;
        };
        let client = self.client.clone();
        let url = self.url.clone();
        handle.spawn(async move {
            let kind = event.kind.as_str();
            match client.post(&url).json(&event).send().await {
                Ok(resp) if resp.status().is_success() => {
                    tracing::debug!(kind, owner_id = %event.owner_id, "webhook delivered");
                }
                Ok(resp) => {
                    tracing::warn!(kind, status = resp.status().as_u16(), "webhook rejected notification");
                }
                Err(e) => tracing::warn!(kind, err = %e, "webhook delivery failed"),
            }
        });
    }
}

// -- Fanout -------------------------------------------------------------------

/// Delivers every notification to each inner sink.
#[derive(Default)]
pub struct FanoutSink {
    sinks: Vec<Arc<dyn NotificationSink>>,
}

impl FanoutSink {
    pub fn new(sinks: Vec<Arc<dyn NotificationSink>>) -> Self {
        Self { sinks }
    }

    pub fn push(&mut self, sink: Arc<dyn NotificationSink>) {
        self.sinks.push(sink);
    }
}

impl NotificationSink for FanoutSink {
    fn notify(&self, event: Notification) {
        for sink in &self.sinks {
            sink.notify(event.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use axum::routing::post;
    use axum::{Json, Router};
    use serde_json::json;
    use tokio::sync::mpsc;

    use super::*;

    #[test]
    fn notification_wire_format() -> anyhow::Result<()> {
        let n = Notification::new(NotificationKind::SyncRegressed, "o1", json!({"agent_id": "a1"}));
        let value = serde_json::to_value(&n)?;
        assert_eq!(value["type"], "sync_regressed");
        assert_eq!(value["owner_id"], "o1");
        assert_eq!(value["payload"]["agent_id"], "a1");
        assert!(value["ts"].is_string());
        Ok(())
    }

    #[tokio::test]
    async fn fanout_reaches_every_broadcast_subscriber() -> anyhow::Result<()> {
        let first = Arc::new(BroadcastSink::default());
        let second = Arc::new(BroadcastSink::default());
        let mut rx1 = first.subscribe();
        let mut rx2 = second.subscribe();
        let sink = FanoutSink::new(vec![first.clone(), second.clone()]);

        sink.notify(Notification::new(NotificationKind::ApprovalPending, "o1", json!({})));
        assert_eq!(rx1.recv().await?.kind, NotificationKind::ApprovalPending);
        assert_eq!(rx2.recv().await?.owner_id, "o1");
        Ok(())
    }

    #[test]
    fn broadcast_without_subscribers_is_fine() {
        BroadcastSink::new(4).notify(Notification::new(NotificationKind::SyncFailed, "o1", json!({})));
    }

    #[tokio::test]
    async fn webhook_posts_json() -> anyhow::Result<()> {
        let (tx, mut rx) = mpsc::unbounded_channel::<serde_json::Value>();
        let router = Router::new().route(
            "/hook",
            post(move |Json(body): Json<serde_json::Value>| {
                let tx = tx.clone();
                async move {
                    let _ = tx.send(body);
                    "ok"
                }
            }),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        tokio::spawn(async move {
            let _ = axum::serve(listener, router).await;
        });

        let sink = WebhookSink::new(format!("http://{addr}/hook"));
        sink.notify(Notification::new(NotificationKind::SyncFailed, "o1", json!({"error": "boom"})));

        let body = tokio::time::timeout(Duration::from_secs(5), rx.recv()).await?;
        let body = body.ok_or_else(|| anyhow::anyhow!("webhook never called"))?;
        assert_eq!(body["type"], "sync_failed");
        assert_eq!(body["payload"]["error"], "boom");
        Ok(())
    }
}
