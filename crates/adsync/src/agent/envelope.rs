// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Wire envelope exchanged with agents.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Request envelope sent to every agent, regardless of protocol.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentRequest {
    pub action: String,
    pub data: serde_json::Value,
    pub request_id: uuid::Uuid,
    pub timestamp: DateTime<Utc>,
}

impl AgentRequest {
    /// Build a request stamped with a fresh id and the current time.
    pub fn new(action: impl Into<String>, data: serde_json::Value) -> Self {
        Self {
            action: action.into(),
            data,
            request_id: uuid::Uuid::new_v4(),
            timestamp: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseStatus {
    Success,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteError {
    #[serde(default)]
    pub message: String,
}

/// Response envelope returned by an agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentResponse {
    pub status: ResponseStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<RemoteError>,
}

impl AgentResponse {
    /// Message to report for an error response.
    pub fn error_message(&self) -> String {
        match &self.error {
            Some(e) if !e.message.is_empty() => e.message.clone(),
            _ => "agent reported an error without a message".to_owned(),
        }
    }
}

/// Successful reply from an agent.
#[derive(Debug, Clone, PartialEq)]
pub struct AgentReply {
    pub data: serde_json::Value,
}
