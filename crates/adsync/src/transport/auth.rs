// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! API token check for every route except `/api/v1/health`.
//!
//! Clients send `Authorization: Bearer <token>`. The event stream also takes
//! `?token=` because browsers cannot set headers on a WebSocket upgrade.

use std::sync::Arc;

use axum::body::Body;
use axum::extract::{Query, State};
use axum::http::header::AUTHORIZATION;
use axum::http::Request;
use axum::middleware::Next;
use axum::response::Response;
use serde::Deserialize;

use crate::error::OrchestratorError;
use crate::state::AppState;
use crate::transport::http;

#[derive(Debug, Default, Deserialize)]
struct TokenParam {
    token: Option<String>,
}

/// Check a presented token against the configured one. Everything passes
/// when no token is configured.
pub fn authorize(expected: Option<&str>, presented: Option<&str>) -> Result<(), OrchestratorError> {
    let Some(expected) = expected else {
        return Ok(());
    };
    match presented {
        Some(token) if tokens_match(token, expected) => Ok(()),
        Some(_) => Err(OrchestratorError::Unauthorized("invalid api token".to_owned())),
        None => Err(OrchestratorError::Unauthorized("missing api token".to_owned())),
    }
}

/// Compares every byte regardless of where the first mismatch is.
fn tokens_match(presented: &str, expected: &str) -> bool {
    presented.len() == expected.len()
        && presented.bytes().zip(expected.bytes()).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

fn bearer(value: &str) -> Option<&str> {
    let (scheme, token) = value.split_once(' ')?;
    scheme.eq_ignore_ascii_case("bearer").then(|| token.trim())
}

/// Token carried by the request: the bearer header, else `?token=` on the
/// event stream.
fn presented_token(req: &Request<Body>) -> Option<String> {
    let header = req.headers().get(AUTHORIZATION).and_then(|v| v.to_str().ok()).and_then(bearer);
    if let Some(token) = header {
        return Some(token.to_owned());
    }
    if !req.uri().path().starts_with("/ws/") {
        return None;
    }
    Query::<TokenParam>::try_from_uri(req.uri()).ok().and_then(|Query(param)| param.token)
}

/// Middleware rejecting requests without the configured API token.
pub async fn auth_layer(State(state): State<Arc<AppState>>, req: Request<Body>, next: Next) -> Response {
    if req.uri().path() == "/api/v1/health" {
        return next.run(req).await;
    }

    let presented = presented_token(&req);
    if let Err(err) = authorize(state.config.auth_token.as_deref(), presented.as_deref()) {
        return http::error_response(err);
    }
    next.run(req).await
}
