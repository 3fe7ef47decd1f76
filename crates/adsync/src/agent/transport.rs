// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! HTTP transport used by agent clients.

use std::time::Duration;

use futures_util::future::BoxFuture;
use reqwest::Client;

use crate::error::TransportError;

/// Raw HTTP reply from an agent endpoint.
#[derive(Debug, Clone, PartialEq)]
pub struct TransportResponse {
    pub http_status: u16,
    /// Decoded JSON body; `Null` when the body is empty or not JSON on an
    /// error status.
    pub body: serde_json::Value,
}

impl TransportResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.http_status)
    }
}

/// POST a JSON body to a URL.
pub trait AgentTransport: Send + Sync {
    fn post<'a>(
        &'a self,
        url: &'a str,
        body: &'a serde_json::Value,
        headers: &'a [(String, String)],
        timeout: Duration,
    ) -> BoxFuture<'a, Result<TransportResponse, TransportError>>;
}

/// reqwest-backed transport shared by every agent client.
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    pub fn new() -> Self {
        // Already installed is fine; any other caller picked the same provider.
        let _ = rustls::crypto::ring::default_provider().install_default();
        let client = Client::builder()
            .user_agent(concat!("adsync/", env!("CARGO_PKG_VERSION")))
            .build()
            .unwrap_or_default();
        Self { client }
    }
}

impl Default for HttpTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl AgentTransport for HttpTransport {
    fn post<'a>(
        &'a self,
        url: &'a str,
        body: &'a serde_json::Value,
        headers: &'a [(String, String)],
        timeout: Duration,
    ) -> BoxFuture<'a, Result<TransportResponse, TransportError>> {
        Box::pin(async move {
            let mut req = self.client.post(url).json(body).timeout(timeout);
            for (name, value) in headers {
                req = req.header(name.as_str(), value.as_str());
            }
            let resp = req.send().await.map_err(|e| map_reqwest_error(e, timeout))?;
            let http_status = resp.status().as_u16();
            let bytes = resp.bytes().await.map_err(|e| map_reqwest_error(e, timeout))?;
            let body = decode_body(http_status, &bytes)?;
            Ok(TransportResponse { http_status, body })
        })
    }
}

fn map_reqwest_error(e: reqwest::Error, timeout: Duration) -> TransportError {
    if e.is_timeout() {
        TransportError::Timeout { after_ms: timeout.as_millis() as u64 }
    } else if e.is_decode() {
        TransportError::Decode(e.to_string())
    } else {
        TransportError::Network(e.to_string())
    }
}

/// Decode a response body. Only a 2xx reply must carry valid JSON.
pub(crate) fn decode_body(
    http_status: u16,
    bytes: &[u8],
) -> Result<serde_json::Value, TransportError> {
    if bytes.iter().all(|b| b.is_ascii_whitespace()) {
        return Ok(serde_json::Value::Null);
    }
    match serde_json::from_slice(bytes) {
        Ok(value) => Ok(value),
        Err(_) if !(200..300).contains(&http_status) => Ok(serde_json::Value::Null),
        Err(e) => Err(TransportError::Decode(e.to_string())),
    }
}

#[cfg(test)]
#[path = "transport_tests.rs"]
mod tests;
