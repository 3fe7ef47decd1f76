// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared test infrastructure: fixtures and scripted agents.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use futures_util::future::BoxFuture;
use parking_lot::Mutex;

use crate::agent::envelope::{AgentReply, AgentRequest};
use crate::agent::transport::{AgentTransport, TransportResponse};
use crate::agent::AgentCall;
use crate::error::{CallError, TransportError};
use crate::model::{Agent, AgentProtocol, AgentStatus, AgentTarget, AuthConfig};
use crate::notify::{Notification, NotificationKind, NotificationSink};

/// Build an active agent with the given supported formats.
pub fn agent(id: &str, formats: &[&str]) -> Agent {
    Agent {
        id: id.to_owned(),
        name: format!("Agent {id}"),
        endpoint_url: format!("http://{id}.agents.test/rpc"),
        protocol: AgentProtocol::Adcp,
        status: AgentStatus::Active,
        supported_formats: formats.iter().map(|f| (*f).to_owned()).collect(),
    }
}

pub fn target(id: &str) -> AgentTarget {
    AgentTarget { agent: agent(id, &[]), auth: AuthConfig::None }
}

/// Scripted behavior for one agent.
#[derive(Debug, Clone)]
pub enum Script {
    Reply(serde_json::Value),
    AgentError(String),
    TransportError(TransportError),
    /// Sleep before replying; long enough delays trip the caller's timeout.
    Delay(Duration, serde_json::Value),
    /// Never answers.
    Hang,
}

/// In-process [`AgentCall`] that answers from a per-agent script and records
/// every request it receives.
#[derive(Default)]
pub struct ScriptedAgents {
    scripts: Mutex<HashMap<String, Script>>,
    calls: Mutex<Vec<(String, AgentRequest)>>,
}

impl ScriptedAgents {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn script(&self, agent_id: &str, script: Script) {
        self.scripts.lock().insert(agent_id.to_owned(), script);
    }

    pub fn calls(&self) -> Vec<(String, AgentRequest)> {
        self.calls.lock().clone()
    }

    pub fn calls_to(&self, agent_id: &str) -> usize {
        self.calls.lock().iter().filter(|(id, _)| id == agent_id).count()
    }
}

impl AgentCall for ScriptedAgents {
    fn call<'a>(
        &'a self,
        target: &'a AgentTarget,
        request: &'a AgentRequest,
        _timeout: Duration,
    ) -> BoxFuture<'a, Result<AgentReply, CallError>> {
        let agent_id = target.agent.id.clone();
        self.calls.lock().push((agent_id.clone(), request.clone()));
        let script = self
            .scripts
            .lock()
            .get(&agent_id)
            .cloned()
            .unwrap_or(Script::Reply(serde_json::Value::Null));
        Box::pin(async move {
            match script {
                Script::Reply(data) => Ok(AgentReply { data }),
                Script::AgentError(message) => Err(CallError::Agent { message }),
                Script::TransportError(e) => Err(CallError::Transport(e)),
                Script::Delay(d, data) => {
                    tokio::time::sleep(d).await;
                    Ok(AgentReply { data })
                }
                Script::Hang => {
                    std::future::pending::<()>().await;
                    Ok(AgentReply { data: serde_json::Value::Null })
                }
            }
        })
    }
}

/// Transport that returns a canned response and records what was posted.
pub struct CannedTransport {
    response: Result<TransportResponse, TransportError>,
    posted: Mutex<Vec<(String, serde_json::Value, Vec<(String, String)>)>>,
}

impl CannedTransport {
    pub fn new(http_status: u16, body: serde_json::Value) -> Arc<Self> {
        Arc::new(Self {
            response: Ok(TransportResponse { http_status, body }),
            posted: Mutex::new(vec![]),
        })
    }

    pub fn failing(err: TransportError) -> Arc<Self> {
        Arc::new(Self { response: Err(err), posted: Mutex::new(vec![]) })
    }

    pub fn posted(&self) -> Vec<(String, serde_json::Value, Vec<(String, String)>)> {
        self.posted.lock().clone()
    }
}

impl AgentTransport for CannedTransport {
    fn post<'a>(
        &'a self,
        url: &'a str,
        body: &'a serde_json::Value,
        headers: &'a [(String, String)],
        _timeout: Duration,
    ) -> BoxFuture<'a, Result<TransportResponse, TransportError>> {
        self.posted.lock().push((url.to_owned(), body.clone(), headers.to_vec()));
        let response = self.response.clone();
        Box::pin(async move { response })
    }
}

/// Sink that keeps every notification for inspection.
#[derive(Default)]
pub struct RecordingSink {
    events: Mutex<Vec<Notification>>,
}

impl RecordingSink {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn events(&self) -> Vec<Notification> {
        self.events.lock().clone()
    }

    pub fn kinds(&self) -> Vec<NotificationKind> {
        self.events.lock().iter().map(|e| e.kind).collect()
    }
}

impl NotificationSink for RecordingSink {
    fn notify(&self, event: Notification) {
        self.events.lock().push(event);
    }
}
