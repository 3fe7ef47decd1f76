// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Notification stream: forwards every [`Notification`] to WebSocket clients
//! over `/ws/events`, optionally filtered by owner. The API token is checked
//! by the auth middleware before the upgrade.

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use axum::extract::{Query, State, WebSocketUpgrade};
use axum::response::IntoResponse;
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::sync::broadcast::error::RecvError;

use crate::notify::Notification;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct EventsQuery {
    /// Only forward notifications for this owner.
    pub owner: Option<String>,
}

/// `GET /ws/events`: WebSocket upgrade for the notification stream.
pub async fn ws_events_handler(
    State(state): State<Arc<AppState>>,
    Query(query): Query<EventsQuery>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_connection(state, query.owner, socket))
}

fn wants(owner: Option<&str>, event: &Notification) -> bool {
    owner.is_none_or(|o| o == event.owner_id)
}

async fn handle_connection(state: Arc<AppState>, owner: Option<String>, socket: WebSocket) {
    let (mut ws_tx, mut ws_rx) = socket.split();
    let mut events = state.events.subscribe();

    loop {
        tokio::select! {
            event = events.recv() => {
                let event = match event {
                    Ok(e) => e,
                    Err(RecvError::Lagged(n)) => {
                        tracing::debug!(skipped = n, "events client lagged");
                        continue;
                    }
                    Err(RecvError::Closed) => break,
                };
                if !wants(owner.as_deref(), &event) {
                    continue;
                }
                if let Ok(json) = serde_json::to_string(&event) {
                    if ws_tx.send(Message::Text(json.into())).await.is_err() {
                        break;
                    }
                }
            }
            msg = ws_rx.next() => {
                match msg {
                    Some(Ok(Message::Close(_))) | None | Some(Err(_)) => break,
                    _ => {}
                }
            }
            _ = state.shutdown.cancelled() => break,
        }
    }
}
