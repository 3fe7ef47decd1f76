// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Orchestration facade: discovery, creative sync and signal activation.
//!
//! Each operation resolves its target agents, fans the request out through
//! [`FanOut`], then records per-agent state, activity and notifications.
//! Per-agent failures live in the returned report; only unknown entities,
//! unusable options and storage failures before dispatch surface as errors.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::activity::ActivityRecorder;
use crate::agent::AgentCall;
use crate::directory::{AccountResolver, CampaignDirectory};
use crate::error::{CallError, OrchestratorError};
use crate::fanout::{
    merge_discovered, normalize_items, AgentOutcome, DispatchOptions, DispatchSummary, FanOut,
    Slot,
};
use crate::model::{
    ActivityOutcome, ActivityRecord, AgentTarget, ApprovalStatus, DiscoveredItem,
    DiscoveryResult, SubjectKey, SyncStatus,
};
use crate::notify::{Notification, NotificationKind, NotificationSink};
use crate::selector::{RelevanceSelector, SelectOptions};
use crate::tracker::{SyncOutcome, SyncStateTracker};

// -- Options and reports ------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiscoveryKind {
    #[default]
    Products,
    Signals,
}

impl DiscoveryKind {
    pub fn action(&self) -> &'static str {
        match self {
            Self::Products => "get_products",
            Self::Signals => "get_signals",
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DiscoveryQuery {
    #[serde(default)]
    pub kind: DiscoveryKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub brief: Option<String>,
    #[serde(default, skip_serializing_if = "serde_json::Value::is_null")]
    pub filters: serde_json::Value,
}

#[derive(Debug, Clone, Default)]
pub struct DiscoverOptions {
    /// Query exactly these agents instead of every enabled one.
    pub agent_ids: Option<Vec<String>>,
    pub min_successful_agents: Option<usize>,
    pub deadline: Option<Duration>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DiscoveryReport {
    pub kind: DiscoveryKind,
    pub items: Vec<DiscoveredItem>,
    pub agents: Vec<DiscoveryResult>,
    pub summary: DispatchSummary,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

#[derive(Debug, Clone)]
pub struct SyncOptions {
    pub agent_ids: Option<Vec<String>>,
    pub campaign_id: Option<String>,
    /// Fall back to the relevance selector when no explicit targets are given.
    pub auto_detect: bool,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self { agent_ids: None, campaign_id: None, auto_detect: true }
    }
}

/// How the target agents of a sync were chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetSource {
    Explicit,
    Campaign,
    AutoDetect,
    OwnerAgents,
}

#[derive(Debug, Clone, Serialize)]
pub struct SyncAgentResult {
    pub agent_id: String,
    pub agent_name: String,
    pub success: bool,
    pub status: SyncStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub approval_status: Option<ApprovalStatus>,
    pub regressed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<String>,
    pub duration_ms: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct SyncReport {
    pub subject: SubjectKey,
    pub target_source: TargetSource,
    /// True when no targeted agent failed (vacuously true with none).
    pub success: bool,
    pub agents: Vec<SyncAgentResult>,
    pub summary: DispatchSummary,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

// -- Facade -------------------------------------------------------------------

/// Tunables shared by every operation.
#[derive(Debug, Clone, Copy)]
pub struct OrchestratorSettings {
    pub agent_timeout: Duration,
    pub max_concurrency: usize,
    pub select: SelectOptions,
}

impl Default for OrchestratorSettings {
    fn default() -> Self {
        Self {
            agent_timeout: Duration::from_secs(30),
            max_concurrency: 16,
            select: SelectOptions::default(),
        }
    }
}

/// Collaborators the facade is built from.
pub struct OrchestratorDeps {
    pub accounts: Arc<dyn AccountResolver>,
    pub directory: Arc<dyn CampaignDirectory>,
    pub caller: Arc<dyn AgentCall>,
    pub tracker: Arc<SyncStateTracker>,
    pub activity: Arc<ActivityRecorder>,
    pub notify: Arc<dyn NotificationSink>,
}

pub struct Orchestrator {
    accounts: Arc<dyn AccountResolver>,
    directory: Arc<dyn CampaignDirectory>,
    selector: RelevanceSelector,
    fanout: FanOut,
    tracker: Arc<SyncStateTracker>,
    activity: Arc<ActivityRecorder>,
    notify: Arc<dyn NotificationSink>,
    select: SelectOptions,
}

impl Orchestrator {
    pub fn new(deps: OrchestratorDeps, settings: OrchestratorSettings) -> Self {
        Self {
            selector: RelevanceSelector::new(
                Arc::clone(&deps.accounts),
                Arc::clone(&deps.directory),
            ),
            fanout: FanOut::new(deps.caller, settings.agent_timeout, settings.max_concurrency),
            accounts: deps.accounts,
            directory: deps.directory,
            tracker: deps.tracker,
            activity: deps.activity,
            notify: deps.notify,
            select: settings.select,
        }
    }

    pub fn tracker(&self) -> &SyncStateTracker {
        &self.tracker
    }

    pub fn activity(&self) -> &ActivityRecorder {
        &self.activity
    }

    /// Query agents for products or signals and merge what they return.
    pub async fn discover(
        &self,
        owner_id: &str,
        query: &DiscoveryQuery,
        options: DiscoverOptions,
    ) -> Result<DiscoveryReport, OrchestratorError> {
        let slots = match &options.agent_ids {
            Some(ids) => self.explicit_slots(owner_id, ids),
            None => self.owner_slots(owner_id),
        };

        if slots.is_empty() {
            tracing::info!(owner_id, kind = query.kind.action(), "discovery has no agents to query");
            return Ok(DiscoveryReport {
                kind: query.kind,
                items: vec![],
                agents: vec![],
                summary: empty_summary(),
                reason: Some(format!("no enabled agents available for owner {owner_id}")),
            });
        }

        let mut data = json!({});
        if let Some(brief) = &query.brief {
            data["brief"] = json!(brief);
        }
        if !query.filters.is_null() {
            data["filters"] = query.filters.clone();
        }

        let dispatch = DispatchOptions {
            min_successful: options.min_successful_agents,
            deadline: options.deadline,
        };
        let report = self.fanout.dispatch_all(slots, query.kind.action(), &data, &dispatch).await;

        let agents = report
            .outcomes
            .iter()
            .map(|o| {
                self.activity.record(activity_record(owner_id, None, query.kind.action(), o));
                DiscoveryResult {
                    agent_id: o.agent_id.clone(),
                    agent_name: o.agent_name.clone(),
                    success: o.is_success(),
                    error: o.error().map(error_message),
                    error_kind: o.error().map(|e| e.kind().to_owned()),
                    item_count: o
                        .result
                        .as_ref()
                        .map(|r| normalize_items(&o.agent_id, &o.agent_name, &r.data).len())
                        .unwrap_or(0),
                    duration_ms: o.duration.as_millis() as u64,
                }
            })
            .collect();

        let summary = report.summary();
        if summary.degraded {
            self.notify.notify(Notification::new(
                NotificationKind::DiscoveryDegraded,
                owner_id,
                json!({
                    "kind": query.kind,
                    "succeeded": summary.succeeded,
                    "total": summary.total,
                    "min_successful": options.min_successful_agents,
                }),
            ));
        }

        Ok(DiscoveryReport {
            kind: query.kind,
            items: merge_discovered(&report),
            agents,
            summary,
            reason: None,
        })
    }

    /// Submit a creative to its target agents and track the outcome per agent.
    pub async fn sync_creative(
        &self,
        owner_id: &str,
        creative_id: &str,
        options: SyncOptions,
    ) -> Result<SyncReport, OrchestratorError> {
        let creative = self
            .directory
            .creative(creative_id)
            .filter(|c| c.owner_id == owner_id)
            .ok_or_else(|| OrchestratorError::not_found("creative", creative_id))?;

        let (source, slots) = if let Some(ids) = &options.agent_ids {
            (TargetSource::Explicit, self.explicit_slots(owner_id, ids))
        } else if let Some(campaign_id) = &options.campaign_id {
            let campaign = self
                .directory
                .campaign(campaign_id)
                .filter(|c| c.owner_id == owner_id)
                .ok_or_else(|| OrchestratorError::not_found("campaign", campaign_id.as_str()))?;
            (TargetSource::Campaign, self.explicit_slots(owner_id, &campaign.agent_ids()))
        } else if options.auto_detect {
            let ids = self.selector.select_agents(creative_id, owner_id, self.select)?;
            (TargetSource::AutoDetect, self.explicit_slots(owner_id, &ids))
        } else {
            return Ok(empty_sync(
                SubjectKey::creative(creative_id),
                TargetSource::Explicit,
                "no sync targets: pass agent_ids, campaign_id or enable auto_detect".to_owned(),
            ));
        };

        let subject = SubjectKey::creative(creative_id);
        if slots.is_empty() {
            return Ok(empty_sync(
                subject,
                source,
                format!("no relevant agents found for creative {creative_id}"),
            ));
        }

        let data = json!({ "creatives": [creative] });
        self.run_sync(owner_id, subject, source, slots, "sync_creatives", &data).await
    }

    /// Activate a signal on the given agents, or every enabled agent of the
    /// owner when none are named.
    pub async fn activate_signal(
        &self,
        owner_id: &str,
        signal_id: &str,
        agent_ids: Option<Vec<String>>,
    ) -> Result<SyncReport, OrchestratorError> {
        let (source, slots) = match &agent_ids {
            Some(ids) => (TargetSource::Explicit, self.explicit_slots(owner_id, ids)),
            None => (TargetSource::OwnerAgents, self.owner_slots(owner_id)),
        };

        let subject = SubjectKey::signal(signal_id);
        if slots.is_empty() {
            return Ok(empty_sync(
                subject,
                source,
                format!("no enabled agents available for owner {owner_id}"),
            ));
        }

        let data = json!({ "signal_id": signal_id, "owner_id": owner_id });
        self.run_sync(owner_id, subject, source, slots, "activate_signal", &data).await
    }

    async fn run_sync(
        &self,
        owner_id: &str,
        subject: SubjectKey,
        source: TargetSource,
        slots: Vec<Slot>,
        action: &str,
        data: &serde_json::Value,
    ) -> Result<SyncReport, OrchestratorError> {
        let callable: Vec<String> = slots
            .iter()
            .filter_map(|slot| match slot {
                Slot::Call(target) => Some(target.agent.id.clone()),
                Slot::Unavailable { .. } => None,
            })
            .collect();
        self.tracker.begin_attempts(&subject, owner_id, &callable, Utc::now())?;

        let report = self.fanout.dispatch_all(slots, action, data, &DispatchOptions::default()).await;

        let mut agents = Vec::with_capacity(report.outcomes.len());
        for outcome in &report.outcomes {
            self.activity.record(activity_record(owner_id, Some(&subject), action, outcome));
            agents.push(self.settle_sync(owner_id, &subject, outcome));
        }

        let summary = report.summary();
        tracing::info!(
            %subject,
            owner_id,
            action,
            succeeded = summary.succeeded,
            total = summary.total,
            "sync settled"
        );

        Ok(SyncReport {
            subject,
            target_source: source,
            success: summary.failed == 0,
            agents,
            summary,
            reason: None,
        })
    }

    /// Write one agent's outcome to the tracker and raise notifications.
    fn settle_sync(&self, owner_id: &str, subject: &SubjectKey, outcome: &AgentOutcome) -> SyncAgentResult {
        let mut result = SyncAgentResult {
            agent_id: outcome.agent_id.clone(),
            agent_name: outcome.agent_name.clone(),
            success: outcome.is_success(),
            status: if outcome.is_success() { SyncStatus::Synced } else { SyncStatus::Failed },
            approval_status: None,
            regressed: false,
            error: outcome.error().map(error_message),
            error_kind: outcome.error().map(|e| e.kind().to_owned()),
            duration_ms: outcome.duration.as_millis() as u64,
        };

        // Never-dispatched agents have no row to update.
        if outcome.request.is_none() {
            return result;
        }

        let sync_outcome = match &outcome.result {
            Ok(reply) => SyncOutcome::Synced { approval: reported_approval(&reply.data) },
            Err(e) => SyncOutcome::Failed { error: error_message(e) },
        };
        let row = match self.tracker.record_sync_outcome(
            subject,
            owner_id,
            &outcome.agent_id,
            sync_outcome,
            Utc::now(),
        ) {
            Ok(row) => row,
            Err(e) => {
                tracing::error!(%subject, agent_id = %outcome.agent_id, err = %e, "failed to record sync outcome");
                return result;
            }
        };

        result.status = row.status;
        result.approval_status = row.approval_status;
        result.regressed = row.regressed;

        let payload = json!({
            "subject": subject,
            "agent_id": outcome.agent_id,
            "agent_name": outcome.agent_name,
            "error": row.error,
            "approval_status": row.approval_status,
        });
        let kind = match (row.status, row.regressed, row.approval_status) {
            (SyncStatus::Failed, true, _) => Some(NotificationKind::SyncRegressed),
            (SyncStatus::Failed, false, _) => Some(NotificationKind::SyncFailed),
            (SyncStatus::Synced, _, Some(ApprovalStatus::Pending)) => {
                Some(NotificationKind::ApprovalPending)
            }
            _ => None,
        };
        if let Some(kind) = kind {
            self.notify.notify(Notification::new(kind, owner_id, payload));
        }
        result
    }

    /// Every enabled, active agent of the owner.
    fn owner_slots(&self, owner_id: &str) -> Vec<Slot> {
        self.accounts
            .agents_for_owner(owner_id)
            .into_iter()
            .filter(|a| a.is_active())
            .filter_map(|agent| {
                let auth = self.accounts.account_auth(owner_id, &agent.id)?;
                Some(Slot::Call(AgentTarget { agent, auth }))
            })
            .collect()
    }

    /// One slot per distinct requested id. Ids that cannot be called become
    /// [`Slot::Unavailable`] so they still show up in the report.
    fn explicit_slots(&self, owner_id: &str, agent_ids: &[String]) -> Vec<Slot> {
        let mut seen = HashSet::new();
        agent_ids
            .iter()
            .filter(|id| seen.insert(id.as_str()))
            .map(|id| {
                let Some(agent) = self.accounts.agent(id) else {
                    return unavailable(id, id, "unknown agent");
                };
                if !agent.is_active() {
                    return unavailable(id, &agent.name, "agent is inactive");
                }
                match self.accounts.account_auth(owner_id, id) {
                    Some(auth) => Slot::Call(AgentTarget { agent, auth }),
                    None => unavailable(id, &agent.name, "no enabled account for owner"),
                }
            })
            .collect()
    }
}

fn unavailable(agent_id: &str, agent_name: &str, reason: &str) -> Slot {
    Slot::Unavailable {
        agent_id: agent_id.to_owned(),
        agent_name: agent_name.to_owned(),
        reason: reason.to_owned(),
    }
}

fn empty_summary() -> DispatchSummary {
    DispatchSummary { total: 0, succeeded: 0, failed: 0, degraded: false }
}

fn empty_sync(subject: SubjectKey, source: TargetSource, reason: String) -> SyncReport {
    tracing::info!(%subject, reason = %reason, "sync has no target agents");
    SyncReport {
        subject,
        target_source: source,
        success: true,
        agents: vec![],
        summary: empty_summary(),
        reason: Some(reason),
    }
}

/// Message without the kind prefix; the kind is reported separately.
fn error_message(e: &CallError) -> String {
    match e {
        CallError::Transport(t) => t.to_string(),
        CallError::Agent { message } | CallError::Configuration { message } => message.clone(),
    }
}

/// Approval reported in a sync reply, either top-level or on the first
/// creative entry.
pub(crate) fn reported_approval(data: &serde_json::Value) -> Option<ApprovalStatus> {
    data.get("approval_status")
        .or_else(|| data.pointer("/creatives/0/approval_status"))
        .and_then(|v| v.as_str())
        .and_then(ApprovalStatus::parse)
}

fn activity_record(
    owner_id: &str,
    subject: Option<&SubjectKey>,
    action: &str,
    outcome: &AgentOutcome,
) -> ActivityRecord {
    let request = outcome
        .request
        .as_ref()
        .and_then(|r| serde_json::to_value(r).ok())
        .unwrap_or(serde_json::Value::Null);
    let (response, kind, error) = match &outcome.result {
        Ok(reply) => (reply.data.clone(), ActivityOutcome::Success, None),
        Err(e) => {
            let kind = match e {
                CallError::Transport(_) => ActivityOutcome::TransportError,
                CallError::Agent { .. } => ActivityOutcome::AgentError,
                CallError::Configuration { .. } => ActivityOutcome::ConfigurationError,
            };
            (serde_json::Value::Null, kind, Some(error_message(e)))
        }
    };
    ActivityRecord {
        id: uuid::Uuid::new_v4(),
        agent_id: outcome.agent_id.clone(),
        owner_id: owner_id.to_owned(),
        subject: subject.cloned(),
        action: action.to_owned(),
        request,
        response,
        duration_ms: outcome.duration.as_millis() as u64,
        outcome: kind,
        error,
        recorded_at: Utc::now(),
    }
}

#[cfg(test)]
#[path = "orchestrator_tests.rs"]
mod tests;
