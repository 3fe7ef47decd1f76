// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::fmt;

use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};

/// Error codes for the orchestrator API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorCode {
    Unauthorized,
    BadRequest,
    NotFound,
    Configuration,
    StateConflict,
    UpstreamError,
    Internal,
}

impl ErrorCode {
    pub fn http_status(&self) -> u16 {
        match self {
            Self::Unauthorized => 401,
            Self::BadRequest => 400,
            Self::NotFound => 404,
            Self::Configuration => 422,
            Self::StateConflict => 409,
            Self::UpstreamError => 502,
            Self::Internal => 500,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unauthorized => "UNAUTHORIZED",
            Self::BadRequest => "BAD_REQUEST",
            Self::NotFound => "NOT_FOUND",
            Self::Configuration => "CONFIGURATION",
            Self::StateConflict => "STATE_CONFLICT",
            Self::UpstreamError => "UPSTREAM_ERROR",
            Self::Internal => "INTERNAL",
        }
    }

    pub fn to_error_body(&self, message: impl Into<String>) -> ErrorBody {
        ErrorBody { code: self.as_str().to_owned(), message: message.into() }
    }

    pub fn to_http_response(
        &self,
        message: impl Into<String>,
    ) -> (StatusCode, Json<ErrorResponse>) {
        let status =
            StatusCode::from_u16(self.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let body = ErrorResponse { error: self.to_error_body(message) };
        (status, Json(body))
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Top-level error response envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: ErrorBody,
}

/// Error body with machine-readable code and human-readable message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
}

// -- Agent call errors --------------------------------------------------------

/// Failure reaching an agent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// The call did not complete within its time box.
    Timeout { after_ms: u64 },
    /// Connection refused, DNS failure, reset, ...
    Network(String),
    /// Non-2xx status without an error envelope.
    Http { status: u16 },
    /// 2xx status but the body is not a usable response.
    Decode(String),
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Timeout { after_ms } => write!(f, "timed out after {after_ms}ms"),
            Self::Network(msg) => write!(f, "network error: {msg}"),
            Self::Http { status } => write!(f, "unexpected HTTP status {status}"),
            Self::Decode(msg) => write!(f, "invalid response: {msg}"),
        }
    }
}

impl std::error::Error for TransportError {}

/// Outcome of a failed per-agent call. Captured inline in aggregate results.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallError {
    Transport(TransportError),
    /// The agent was reachable but answered `status: "error"`.
    Agent { message: String },
    /// The agent could not be called at all (unknown, disabled, no account).
    Configuration { message: String },
}

impl CallError {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Transport(_) => "transport_error",
            Self::Agent { .. } => "agent_error",
            Self::Configuration { .. } => "configuration_error",
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Transport(TransportError::Timeout { .. }))
    }
}

impl fmt::Display for CallError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Transport(e) => write!(f, "transport error: {e}"),
            Self::Agent { message } => write!(f, "agent error: {message}"),
            Self::Configuration { message } => write!(f, "configuration error: {message}"),
        }
    }
}

impl std::error::Error for CallError {}

impl From<TransportError> for CallError {
    fn from(e: TransportError) -> Self {
        Self::Transport(e)
    }
}

// -- Operation errors ---------------------------------------------------------

/// Errors surfaced synchronously by orchestrator operations.
///
/// Per-agent failures never appear here; they are reported inside the
/// aggregate result.
#[derive(Debug)]
pub enum OrchestratorError {
    Transport(TransportError),
    Agent { agent_id: String, message: String },
    NotFound { entity: &'static str, id: String },
    Configuration(String),
    StateConflict(String),
    Storage(anyhow::Error),
    /// Missing or wrong API token.
    Unauthorized(String),
}

impl OrchestratorError {
    pub fn not_found(entity: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound { entity, id: id.into() }
    }

    pub fn code(&self) -> ErrorCode {
        match self {
            Self::Transport(_) | Self::Agent { .. } => ErrorCode::UpstreamError,
            Self::NotFound { .. } => ErrorCode::NotFound,
            Self::Configuration(_) => ErrorCode::Configuration,
            Self::StateConflict(_) => ErrorCode::StateConflict,
            Self::Storage(_) => ErrorCode::Internal,
            Self::Unauthorized(_) => ErrorCode::Unauthorized,
        }
    }
}

impl fmt::Display for OrchestratorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Transport(e) => write!(f, "transport error: {e}"),
            Self::Agent { agent_id, message } => write!(f, "agent {agent_id} error: {message}"),
            Self::NotFound { entity, id } => write!(f, "{entity} not found: {id}"),
            Self::Configuration(msg) => write!(f, "configuration error: {msg}"),
            Self::StateConflict(msg) => write!(f, "state conflict: {msg}"),
            Self::Storage(e) => write!(f, "storage error: {e:#}"),
            Self::Unauthorized(msg) => write!(f, "unauthorized: {msg}"),
        }
    }
}

impl std::error::Error for OrchestratorError {}

impl From<anyhow::Error> for OrchestratorError {
    fn from(e: anyhow::Error) -> Self {
        Self::Storage(e)
    }
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
