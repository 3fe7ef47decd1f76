// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! HTTP handlers for the orchestrator API.

use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Path, Query, State};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::error::OrchestratorError;
use crate::model::{ActivityRecord, SubjectKey, SyncAttempt};
use crate::orchestrator::{DiscoverOptions, DiscoveryKind, DiscoveryQuery, SyncOptions};
use crate::state::AppState;
use crate::tracker::ApprovalDecision;

const DEFAULT_ACTIVITY_LIMIT: usize = 50;

// -- Request/Response types ---------------------------------------------------

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub agent_count: usize,
}

#[derive(Debug, Default, Deserialize)]
pub struct DiscoverRequest {
    #[serde(default)]
    pub kind: DiscoveryKind,
    #[serde(default)]
    pub brief: Option<String>,
    #[serde(default)]
    pub filters: serde_json::Value,
    #[serde(default)]
    pub agent_ids: Option<Vec<String>>,
    #[serde(default)]
    pub min_successful_agents: Option<usize>,
    #[serde(default)]
    pub deadline_ms: Option<u64>,
}

#[derive(Debug, Deserialize)]
pub struct SyncRequest {
    #[serde(default)]
    pub agent_ids: Option<Vec<String>>,
    #[serde(default)]
    pub campaign_id: Option<String>,
    #[serde(default = "default_true")]
    pub auto_detect: bool,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Default, Deserialize)]
pub struct ActivateRequest {
    #[serde(default)]
    pub agent_ids: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
pub struct ApprovalRequest {
    pub decision: ApprovalDecision,
}

#[derive(Debug, Deserialize)]
pub struct ActivityParams {
    #[serde(default)]
    pub limit: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct SyncStatusResponse {
    pub subject: SubjectKey,
    pub agents: Vec<SyncAttempt>,
}

#[derive(Debug, Serialize)]
pub struct AttentionResponse {
    pub owner_id: String,
    pub items: Vec<SyncAttempt>,
}

#[derive(Debug, Serialize)]
pub struct ActivityResponse {
    pub records: Vec<ActivityRecord>,
}

pub(crate) fn error_response(err: OrchestratorError) -> Response {
    let code = err.code();
    if code.http_status() >= 500 {
        tracing::error!(err = %err, "request failed");
    } else {
        tracing::debug!(err = %err, "request rejected");
    }
    code.to_http_response(err.to_string()).into_response()
}

fn respond<T: Serialize>(result: Result<T, OrchestratorError>) -> Response {
    match result {
        Ok(body) => Json(body).into_response(),
        Err(e) => error_response(e),
    }
}

// -- Handlers -----------------------------------------------------------------

/// `GET /api/v1/health`
pub async fn health(State(s): State<Arc<AppState>>) -> impl IntoResponse {
    Json(HealthResponse { status: "running".to_owned(), agent_count: s.directory.agent_count() })
}

/// `POST /api/v1/owners/{owner}/discover`
pub async fn discover(
    State(s): State<Arc<AppState>>,
    Path(owner): Path<String>,
    Json(req): Json<DiscoverRequest>,
) -> Response {
    let query = DiscoveryQuery { kind: req.kind, brief: req.brief, filters: req.filters };
    let options = DiscoverOptions {
        agent_ids: req.agent_ids,
        min_successful_agents: req.min_successful_agents,
        deadline: req.deadline_ms.map(Duration::from_millis),
    };
    respond(s.orchestrator.discover(&owner, &query, options).await)
}

/// `POST /api/v1/owners/{owner}/creatives/{id}/sync`
pub async fn sync_creative(
    State(s): State<Arc<AppState>>,
    Path((owner, creative_id)): Path<(String, String)>,
    Json(req): Json<SyncRequest>,
) -> Response {
    let options = SyncOptions {
        agent_ids: req.agent_ids,
        campaign_id: req.campaign_id,
        auto_detect: req.auto_detect,
    };
    respond(s.orchestrator.sync_creative(&owner, &creative_id, options).await)
}

/// `POST /api/v1/owners/{owner}/signals/{id}/activate`
pub async fn activate_signal(
    State(s): State<Arc<AppState>>,
    Path((owner, signal_id)): Path<(String, String)>,
    Json(req): Json<ActivateRequest>,
) -> Response {
    respond(s.orchestrator.activate_signal(&owner, &signal_id, req.agent_ids).await)
}

/// `GET /api/v1/owners/{owner}/attention`
pub async fn attention(State(s): State<Arc<AppState>>, Path(owner): Path<String>) -> Response {
    let result = s
        .orchestrator
        .tracker()
        .needs_attention(&owner)
        .map(|items| AttentionResponse { owner_id: owner.clone(), items });
    respond(result)
}

/// `GET /api/v1/owners/{owner}/activity?limit=N`
pub async fn owner_activity(
    State(s): State<Arc<AppState>>,
    Path(owner): Path<String>,
    Query(params): Query<ActivityParams>,
) -> Response {
    let limit = params.limit.unwrap_or(DEFAULT_ACTIVITY_LIMIT);
    let result =
        s.orchestrator.activity().for_owner(&owner, limit).map(|records| ActivityResponse { records });
    respond(result)
}

/// `GET /api/v1/owners/{owner}/creatives/{id}/sync-status`
pub async fn creative_sync_status(
    State(s): State<Arc<AppState>>,
    Path((owner, id)): Path<(String, String)>,
) -> Response {
    sync_status(&s, &owner, SubjectKey::creative(id))
}

/// `GET /api/v1/owners/{owner}/signals/{id}/sync-status`
pub async fn signal_sync_status(
    State(s): State<Arc<AppState>>,
    Path((owner, id)): Path<(String, String)>,
) -> Response {
    sync_status(&s, &owner, SubjectKey::signal(id))
}

fn sync_status(s: &AppState, owner: &str, subject: SubjectKey) -> Response {
    let result = s
        .orchestrator
        .tracker()
        .owner_sync_status(owner, &subject)
        .map(|agents| SyncStatusResponse { subject: subject.clone(), agents });
    respond(result)
}

/// `GET /api/v1/owners/{owner}/creatives/{id}/activity`
pub async fn creative_activity(
    State(s): State<Arc<AppState>>,
    Path((owner, id)): Path<(String, String)>,
) -> Response {
    let result = s.orchestrator.activity().for_subject(&SubjectKey::creative(id)).map(|mut records| {
        records.retain(|r| r.owner_id == owner);
        ActivityResponse { records }
    });
    respond(result)
}

/// `POST /api/v1/owners/{owner}/creatives/{id}/agents/{agent}/approval`
pub async fn record_approval(
    State(s): State<Arc<AppState>>,
    Path((owner, creative_id, agent_id)): Path<(String, String, String)>,
    Json(req): Json<ApprovalRequest>,
) -> Response {
    let subject = SubjectKey::creative(creative_id);
    respond(s.orchestrator.tracker().record_approval(&subject, &owner, &agent_id, req.decision))
}
