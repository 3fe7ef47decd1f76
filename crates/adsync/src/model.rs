// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Core records shared by every orchestrator component.
//!
//! Agents, accounts, creatives and campaigns are owned by external
//! registration flows and consumed read-only. Sync attempts and activity
//! records are the only state this crate writes.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// -- Agents ------------------------------------------------------------------

/// Wire protocol spoken by an agent endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentProtocol {
    /// Plain JSON envelope POSTed to the endpoint.
    Adcp,
    /// JSON-RPC 2.0 `tools/call` over HTTP.
    Mcp,
}

impl AgentProtocol {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Adcp => "adcp",
            Self::Mcp => "mcp",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentStatus {
    #[default]
    Active,
    Inactive,
}

/// An externally owned advertising agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Agent {
    pub id: String,
    pub name: String,
    pub endpoint_url: String,
    pub protocol: AgentProtocol,
    #[serde(default)]
    pub status: AgentStatus,
    /// Creative formats this agent accepts ("video", "display", ...).
    #[serde(default)]
    pub supported_formats: Vec<String>,
}

impl Agent {
    pub fn is_active(&self) -> bool {
        self.status == AgentStatus::Active
    }

    /// Whether the agent declares support for `format` (case-insensitive).
    pub fn supports_format(&self, format: &str) -> bool {
        self.supported_formats.iter().any(|f| f.eq_ignore_ascii_case(format))
    }
}

/// Authentication applied to outbound calls for one owner/agent pair.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AuthConfig {
    #[default]
    None,
    Bearer {
        token: String,
    },
    ApiKey {
        header: String,
        key: String,
    },
}

impl AuthConfig {
    /// Headers to attach to an outbound request.
    pub fn headers(&self) -> Vec<(String, String)> {
        match self {
            Self::None => vec![],
            Self::Bearer { token } => vec![("authorization".to_owned(), format!("Bearer {token}"))],
            Self::ApiKey { header, key } => vec![(header.clone(), key.clone())],
        }
    }
}

/// Per-owner binding of credentials to an agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentAccount {
    pub owner_id: String,
    pub agent_id: String,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default = "default_true")]
    pub enabled: bool,
}

fn default_true() -> bool {
    true
}

/// An agent plus the auth to use when calling it for a particular owner.
#[derive(Debug, Clone)]
pub struct AgentTarget {
    pub agent: Agent,
    pub auth: AuthConfig,
}

// -- Creatives and campaigns -------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Creative {
    pub id: String,
    pub owner_id: String,
    pub format: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub assets: serde_json::Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CampaignStatus {
    #[default]
    Draft,
    Active,
    Paused,
    Completed,
}

/// A campaign line item executed through one agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tactic {
    pub id: String,
    pub agent_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_activity_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Campaign {
    pub id: String,
    pub owner_id: String,
    #[serde(default)]
    pub status: CampaignStatus,
    #[serde(default)]
    pub tactics: Vec<Tactic>,
}

impl Campaign {
    /// Distinct agent ids referenced by this campaign's tactics, in order.
    pub fn agent_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = Vec::new();
        for tactic in &self.tactics {
            if !ids.contains(&tactic.agent_id) {
                ids.push(tactic.agent_id.clone());
            }
        }
        ids
    }
}

// -- Sync state --------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubjectKind {
    Creative,
    Signal,
}

/// The thing being synced: a creative or a signal.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SubjectKey {
    pub kind: SubjectKind,
    pub id: String,
}

impl SubjectKey {
    pub fn creative(id: impl Into<String>) -> Self {
        Self { kind: SubjectKind::Creative, id: id.into() }
    }

    pub fn signal(id: impl Into<String>) -> Self {
        Self { kind: SubjectKind::Signal, id: id.into() }
    }
}

impl fmt::Display for SubjectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            SubjectKind::Creative => write!(f, "creative:{}", self.id),
            SubjectKind::Signal => write!(f, "signal:{}", self.id),
        }
    }
}

/// Natural key of a sync attempt row.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AttemptKey {
    pub subject: SubjectKey,
    pub agent_id: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncStatus {
    #[default]
    NotSynced,
    Pending,
    Synced,
    Failed,
}

impl SyncStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NotSynced => "not_synced",
            Self::Pending => "pending",
            Self::Synced => "synced",
            Self::Failed => "failed",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalStatus {
    Pending,
    Approved,
    Rejected,
}

impl ApprovalStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
        }
    }

    /// Parse an approval status reported by an agent. Unknown values map to `None`.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "pending" | "pending_review" | "in_review" => Some(Self::Pending),
            "approved" => Some(Self::Approved),
            "rejected" | "denied" => Some(Self::Rejected),
            _ => None,
        }
    }
}

/// Current sync state of one subject on one agent. Exactly one row per key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncAttempt {
    pub subject: SubjectKey,
    pub agent_id: String,
    pub owner_id: String,
    pub status: SyncStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub approval_status: Option<ApprovalStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Set when a previously synced subject failed on a later attempt.
    #[serde(default)]
    pub regressed: bool,
    #[serde(default)]
    pub attempts: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_attempt_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub synced_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub approval_updated_at: Option<DateTime<Utc>>,
    pub recorded_at: DateTime<Utc>,
}

impl SyncAttempt {
    pub fn key(&self) -> AttemptKey {
        AttemptKey { subject: self.subject.clone(), agent_id: self.agent_id.clone() }
    }

    pub fn needs_attention(&self) -> bool {
        self.status == SyncStatus::Failed
            || self.regressed
            || self.approval_status == Some(ApprovalStatus::Rejected)
    }
}

// -- Activity ----------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityOutcome {
    Success,
    AgentError,
    TransportError,
    ConfigurationError,
}

/// Immutable audit entry for one agent interaction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityRecord {
    pub id: uuid::Uuid,
    pub agent_id: String,
    pub owner_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject: Option<SubjectKey>,
    pub action: String,
    pub request: serde_json::Value,
    #[serde(default)]
    pub response: serde_json::Value,
    pub duration_ms: u64,
    pub outcome: ActivityOutcome,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub recorded_at: DateTime<Utc>,
}

// -- Discovery ---------------------------------------------------------------

/// One product or signal returned by an agent, tagged with its source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiscoveredItem {
    pub source_agent_id: String,
    pub source_agent_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub item_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub payload: serde_json::Value,
}

/// Per-agent discovery outcome.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscoveryResult {
    pub agent_id: String,
    pub agent_name: String,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<String>,
    pub item_count: usize,
    pub duration_ms: u64,
}
