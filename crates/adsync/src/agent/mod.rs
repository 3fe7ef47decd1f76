// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Agent endpoint communication: wire envelope, HTTP transport, and
//! per-protocol clients.

pub mod client;
pub mod envelope;
pub mod transport;

pub use client::{AgentCall, ClientRegistry};
pub use envelope::{AgentReply, AgentRequest, AgentResponse};
pub use transport::{AgentTransport, HttpTransport, TransportResponse};
