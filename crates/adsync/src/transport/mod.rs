// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! HTTP + WebSocket transport for the orchestrator.

pub mod auth;
pub mod http;
pub mod ws_events;

use std::sync::Arc;

use axum::middleware;
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::state::AppState;

/// Build the axum `Router` with all orchestrator routes.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        // Health (no auth)
        .route("/api/v1/health", get(http::health))
        // Owner-scoped operations
        .route("/api/v1/owners/{owner}/discover", post(http::discover))
        .route("/api/v1/owners/{owner}/creatives/{id}/sync", post(http::sync_creative))
        .route("/api/v1/owners/{owner}/signals/{id}/activate", post(http::activate_signal))
        .route("/api/v1/owners/{owner}/attention", get(http::attention))
        .route("/api/v1/owners/{owner}/activity", get(http::owner_activity))
        // Subject state, scoped to the owner
        .route("/api/v1/owners/{owner}/creatives/{id}/sync-status", get(http::creative_sync_status))
        .route("/api/v1/owners/{owner}/signals/{id}/sync-status", get(http::signal_sync_status))
        .route("/api/v1/owners/{owner}/creatives/{id}/activity", get(http::creative_activity))
        .route(
            "/api/v1/owners/{owner}/creatives/{id}/agents/{agent}/approval",
            post(http::record_approval),
        )
        // Notification stream
        .route("/ws/events", get(ws_events::ws_events_handler))
        // Middleware
        .layer(middleware::from_fn_with_state(state.clone(), auth::auth_layer))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
