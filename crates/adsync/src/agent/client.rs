// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-protocol agent clients behind the [`AgentCall`] capability.
//!
//! Clients never retry. A reachable agent answering `status: "error"` is an
//! [`CallError::Agent`]; anything that prevents reading a response envelope
//! is a [`CallError::Transport`].

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use futures_util::future::BoxFuture;

use crate::agent::envelope::{AgentReply, AgentRequest, AgentResponse, ResponseStatus};
use crate::agent::transport::{AgentTransport, TransportResponse};
use crate::error::{CallError, TransportError};
use crate::model::{AgentProtocol, AgentTarget};

/// The single capability the fan-out dispatcher depends on.
pub trait AgentCall: Send + Sync {
    fn call<'a>(
        &'a self,
        target: &'a AgentTarget,
        request: &'a AgentRequest,
        timeout: Duration,
    ) -> BoxFuture<'a, Result<AgentReply, CallError>>;
}

/// Interpret a decoded response envelope.
fn interpret(response: AgentResponse) -> Result<AgentReply, CallError> {
    match response.status {
        ResponseStatus::Success => {
            Ok(AgentReply { data: response.data.unwrap_or(serde_json::Value::Null) })
        }
        ResponseStatus::Error => Err(CallError::Agent { message: response.error_message() }),
    }
}

/// Parse an envelope out of a JSON value, falling back to the HTTP status
/// when the body is not an envelope. A success envelope only counts on a
/// 2xx response.
fn envelope_from(value: serde_json::Value, resp: &TransportResponse) -> Result<AgentReply, CallError> {
    match serde_json::from_value::<AgentResponse>(value) {
        Ok(envelope) if envelope.status == ResponseStatus::Success && !resp.is_success() => {
            Err(TransportError::Http { status: resp.http_status }.into())
        }
        Ok(envelope) => interpret(envelope),
        Err(_) if !resp.is_success() => {
            Err(TransportError::Http { status: resp.http_status }.into())
        }
        Err(e) => Err(TransportError::Decode(format!("not a response envelope: {e}")).into()),
    }
}

// -- AdCP ---------------------------------------------------------------------

/// Posts the request envelope as-is; the body is the response envelope.
pub struct AdcpClient {
    transport: Arc<dyn AgentTransport>,
}

impl AdcpClient {
    pub fn new(transport: Arc<dyn AgentTransport>) -> Self {
        Self { transport }
    }
}

impl AgentCall for AdcpClient {
    fn call<'a>(
        &'a self,
        target: &'a AgentTarget,
        request: &'a AgentRequest,
        timeout: Duration,
    ) -> BoxFuture<'a, Result<AgentReply, CallError>> {
        Box::pin(async move {
            let body = serde_json::to_value(request)
                .map_err(|e| TransportError::Decode(e.to_string()))?;
            let headers = target.auth.headers();
            let resp =
                self.transport.post(&target.agent.endpoint_url, &body, &headers, timeout).await?;
            envelope_from(resp.body.clone(), &resp)
        })
    }
}

// -- MCP ----------------------------------------------------------------------

/// Wraps the request in a JSON-RPC `tools/call` where the tool is the action.
pub struct McpClient {
    transport: Arc<dyn AgentTransport>,
}

impl McpClient {
    pub fn new(transport: Arc<dyn AgentTransport>) -> Self {
        Self { transport }
    }
}

/// Build the JSON-RPC body for a request.
pub(crate) fn mcp_body(request: &AgentRequest) -> serde_json::Value {
    let mut arguments = match &request.data {
        serde_json::Value::Object(map) => map.clone(),
        serde_json::Value::Null => serde_json::Map::new(),
        other => {
            let mut map = serde_json::Map::new();
            map.insert("data".to_owned(), other.clone());
            map
        }
    };
    arguments.insert("request_id".to_owned(), request.request_id.to_string().into());
    arguments.insert("timestamp".to_owned(), request.timestamp.to_rfc3339().into());
    serde_json::json!({
        "jsonrpc": "2.0",
        "id": request.request_id.to_string(),
        "method": "tools/call",
        "params": {
            "name": request.action,
            "arguments": arguments,
        }
    })
}

/// Extract the response envelope from a JSON-RPC reply.
pub(crate) fn mcp_reply(resp: &TransportResponse) -> Result<AgentReply, CallError> {
    let body = &resp.body;
    if let Some(err) = body.get("error") {
        let message = err
            .get("message")
            .and_then(|m| m.as_str())
            .unwrap_or("JSON-RPC error without a message")
            .to_owned();
        return Err(CallError::Agent { message });
    }

    let Some(result) = body.get("result") else {
        if !resp.is_success() {
            return Err(TransportError::Http { status: resp.http_status }.into());
        }
        return Err(TransportError::Decode("JSON-RPC reply has no result".to_owned()).into());
    };

    if result.get("isError").and_then(|v| v.as_bool()) == Some(true) {
        let message = first_text(result).unwrap_or_else(|| "tool call failed".to_owned());
        return Err(CallError::Agent { message });
    }

    if let Some(structured) = result.get("structuredContent") {
        return envelope_from(structured.clone(), resp);
    }

    match first_text(result) {
        Some(text) => {
            let value: serde_json::Value = serde_json::from_str(&text)
                .map_err(|e| TransportError::Decode(format!("tool text is not JSON: {e}")))?;
            envelope_from(value, resp)
        }
        None => Err(TransportError::Decode("tool result has no content".to_owned()).into()),
    }
}

fn first_text(result: &serde_json::Value) -> Option<String> {
    result
        .get("content")
        .and_then(|c| c.as_array())
        .and_then(|blocks| {
            blocks.iter().find_map(|b| {
                (b.get("type").and_then(|t| t.as_str()) == Some("text"))
                    .then(|| b.get("text").and_then(|t| t.as_str()).map(String::from))
                    .flatten()
            })
        })
}

impl AgentCall for McpClient {
    fn call<'a>(
        &'a self,
        target: &'a AgentTarget,
        request: &'a AgentRequest,
        timeout: Duration,
    ) -> BoxFuture<'a, Result<AgentReply, CallError>> {
        Box::pin(async move {
            let body = mcp_body(request);
            let mut headers = target.auth.headers();
            headers.push(("accept".to_owned(), "application/json, text/event-stream".to_owned()));
            let resp =
                self.transport.post(&target.agent.endpoint_url, &body, &headers, timeout).await?;
            mcp_reply(&resp)
        })
    }
}

// -- Registry -----------------------------------------------------------------

/// Protocol → client mapping, built once at startup and shared by `Arc`.
pub struct ClientRegistry {
    clients: HashMap<AgentProtocol, Arc<dyn AgentCall>>,
}

impl ClientRegistry {
    /// Registry with the built-in client for every protocol over `transport`.
    pub fn new(transport: Arc<dyn AgentTransport>) -> Self {
        let mut clients: HashMap<AgentProtocol, Arc<dyn AgentCall>> = HashMap::new();
        clients.insert(AgentProtocol::Adcp, Arc::new(AdcpClient::new(Arc::clone(&transport))));
        clients.insert(AgentProtocol::Mcp, Arc::new(McpClient::new(transport)));
        Self { clients }
    }

    /// Empty registry; protocols must be added with [`ClientRegistry::with`].
    pub fn empty() -> Self {
        Self { clients: HashMap::new() }
    }

    /// Register (or replace) the client for a protocol.
    pub fn with(mut self, protocol: AgentProtocol, client: Arc<dyn AgentCall>) -> Self {
        self.clients.insert(protocol, client);
        self
    }
}

impl AgentCall for ClientRegistry {
    fn call<'a>(
        &'a self,
        target: &'a AgentTarget,
        request: &'a AgentRequest,
        timeout: Duration,
    ) -> BoxFuture<'a, Result<AgentReply, CallError>> {
        let protocol = target.agent.protocol;
        match self.clients.get(&protocol) {
            Some(client) => client.call(target, request, timeout),
            None => Box::pin(async move {
                Err(CallError::Configuration {
                    message: format!("no client registered for protocol {}", protocol.as_str()),
                })
            }),
        }
    }
}

#[cfg(test)]
#[path = "client_tests.rs"]
mod tests;
