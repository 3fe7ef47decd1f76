// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Fan-out dispatcher: concurrent per-agent calls with failure isolation.
//!
//! Every dispatch settles all agents before returning. A failing, slow or
//! misconfigured agent yields an entry in the report; it never cancels its
//! siblings and never turns the whole dispatch into an error.

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures_util::future::join_all;
use serde::Serialize;
use tokio::sync::Semaphore;

use crate::agent::envelope::{AgentReply, AgentRequest};
use crate::agent::AgentCall;
use crate::error::{CallError, TransportError};
use crate::model::{AgentTarget, DiscoveredItem};

/// Await every future and keep each output next to its key, in input order.
///
/// The join-all-with-partial-failure primitive shared by discovery and sync:
/// a future resolving to an error never short-circuits the others.
pub async fn settle_all<K, F>(tasks: Vec<(K, F)>) -> Vec<(K, F::Output)>
where
    F: Future,
{
    let (keys, futures): (Vec<K>, Vec<F>) = tasks.into_iter().unzip();
    keys.into_iter().zip(join_all(futures).await).collect()
}

/// Options for a single dispatch.
#[derive(Debug, Clone, Default)]
pub struct DispatchOptions {
    /// Below this many successes the report is flagged as degraded.
    pub min_successful: Option<usize>,
    /// Wall-clock bound on the whole dispatch, queueing included.
    pub deadline: Option<Duration>,
}

/// A dispatch slot: either an agent to call or a requested agent that
/// cannot be called.
#[derive(Debug, Clone)]
pub enum Slot {
    Call(AgentTarget),
    Unavailable { agent_id: String, agent_name: String, reason: String },
}

impl Slot {
    pub fn agent_id(&self) -> &str {
        match self {
            Self::Call(t) => &t.agent.id,
            Self::Unavailable { agent_id, .. } => agent_id,
        }
    }
}

/// Settled result for one agent.
#[derive(Debug, Clone)]
pub struct AgentOutcome {
    pub agent_id: String,
    pub agent_name: String,
    /// Request built for the agent; `None` when the slot was unavailable.
    pub request: Option<AgentRequest>,
    pub result: Result<AgentReply, CallError>,
    pub duration: Duration,
}

impl AgentOutcome {
    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }

    pub fn error(&self) -> Option<&CallError> {
        self.result.as_ref().err()
    }
}

/// Aggregate of one dispatch. Holds exactly one outcome per slot.
#[derive(Debug, Clone)]
pub struct DispatchReport {
    pub outcomes: Vec<AgentOutcome>,
    pub min_successful: Option<usize>,
}

impl DispatchReport {
    pub fn total(&self) -> usize {
        self.outcomes.len()
    }

    pub fn succeeded(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_success()).count()
    }

    pub fn failed(&self) -> usize {
        self.total() - self.succeeded()
    }

    /// Fewer successes than requested. Never an error by itself.
    pub fn degraded(&self) -> bool {
        self.min_successful.is_some_and(|min| self.succeeded() < min)
    }

    pub fn summary(&self) -> DispatchSummary {
        DispatchSummary {
            total: self.total(),
            succeeded: self.succeeded(),
            failed: self.failed(),
            degraded: self.degraded(),
        }
    }
}

/// "N of M agents succeeded", attached to every aggregate response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DispatchSummary {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub degraded: bool,
}

/// Concurrent dispatcher over an [`AgentCall`].
pub struct FanOut {
    caller: Arc<dyn AgentCall>,
    agent_timeout: Duration,
    limit: Arc<Semaphore>,
}

impl FanOut {
    pub fn new(
        caller: Arc<dyn AgentCall>,
        agent_timeout: Duration,
        max_concurrency: usize,
    ) -> Self {
        Self { caller, agent_timeout, limit: Arc::new(Semaphore::new(max_concurrency.max(1))) }
    }

    pub fn agent_timeout(&self) -> Duration {
        self.agent_timeout
    }

    /// Send `action` with `data` to every slot and settle all of them.
    pub async fn dispatch_all(
        &self,
        slots: Vec<Slot>,
        action: &str,
        data: &serde_json::Value,
        options: &DispatchOptions,
    ) -> DispatchReport {
        let deadline_at = options.deadline.map(|d| tokio::time::Instant::now() + d);

        tracing::debug!(
            action,
            agents = slots.len(),
            timeout_ms = self.agent_timeout.as_millis() as u64,
            deadline_ms = options.deadline.map(|d| d.as_millis() as u64),
            "fan-out start"
        );

        let tasks: Vec<_> = slots
            .into_iter()
            .map(|slot| {
                let id = slot.agent_id().to_owned();
                (id, self.dispatch_one(slot, action, data, deadline_at))
            })
            .collect();

        let outcomes: Vec<AgentOutcome> =
            settle_all(tasks).await.into_iter().map(|(_, outcome)| outcome).collect();

        let report = DispatchReport { outcomes, min_successful: options.min_successful };
        let summary = report.summary();
        if summary.degraded {
            tracing::warn!(
                action,
                succeeded = summary.succeeded,
                total = summary.total,
                min_successful = options.min_successful.unwrap_or(0),
                "fan-out degraded"
            );
        } else {
            tracing::info!(
                action,
                succeeded = summary.succeeded,
                failed = summary.failed,
                "fan-out settled"
            );
        }
        report
    }

    /// Call one slot. The permit wait and the call both count against
    /// `deadline_at`; the call alone is also bounded by the agent timeout.
    async fn dispatch_one(
        &self,
        slot: Slot,
        action: &str,
        data: &serde_json::Value,
        deadline_at: Option<tokio::time::Instant>,
    ) -> AgentOutcome {
        let target = match slot {
            Slot::Call(target) => target,
            Slot::Unavailable { agent_id, agent_name, reason } => {
                return AgentOutcome {
                    agent_id,
                    agent_name,
                    request: None,
                    result: Err(CallError::Configuration { message: reason }),
                    duration: Duration::ZERO,
                };
            }
        };

        let request = AgentRequest::new(action, data.clone());
        let started = Instant::now();
        let result = self.call_within(&target, &request, deadline_at).await;
        let duration = started.elapsed();

        match &result {
            Ok(_) => tracing::debug!(
                agent_id = %target.agent.id,
                action,
                elapsed_ms = duration.as_millis() as u64,
                "agent call ok"
            ),
            Err(e) => {
                tracing::warn!(agent_id = %target.agent.id, action, err = %e, "agent call failed")
            }
        }

        AgentOutcome {
            agent_id: target.agent.id,
            agent_name: target.agent.name,
            request: Some(request),
            result,
            duration,
        }
    }

    async fn call_within(
        &self,
        target: &AgentTarget,
        request: &AgentRequest,
        deadline_at: Option<tokio::time::Instant>,
    ) -> Result<AgentReply, CallError> {
        let timed_out = |budget: Duration| {
            CallError::Transport(TransportError::Timeout { after_ms: budget.as_millis() as u64 })
        };

        let _permit = match deadline_at {
            Some(at) => match tokio::time::timeout_at(at, self.limit.acquire()).await {
                Ok(permit) => permit,
                Err(_) => {
                    tracing::debug!(agent_id = %target.agent.id, "deadline passed while queued");
                    return Err(timed_out(Duration::ZERO));
                }
            },
            None => self.limit.acquire().await,
        };

        let now = tokio::time::Instant::now();
        let call_deadline = match deadline_at {
            Some(at) => at.min(now + self.agent_timeout),
            None => now + self.agent_timeout,
        };
        let budget = call_deadline.saturating_duration_since(now);
        match tokio::time::timeout_at(call_deadline, self.caller.call(target, request, budget)).await {
            Ok(result) => result,
            Err(_) => Err(timed_out(budget)),
        }
    }
}

// -- Discovery merge ------------------------------------------------------------

/// Keys under which agents return discovered items.
const ITEM_KEYS: &[&str] = &["products", "signals", "items"];

/// Normalize one agent's discovery payload into tagged items.
///
/// Accepts `{products|signals|items: [...]}` or a bare array.
pub fn normalize_items(
    agent_id: &str,
    agent_name: &str,
    data: &serde_json::Value,
) -> Vec<DiscoveredItem> {
    let list = match data {
        serde_json::Value::Array(arr) => Some(arr),
        serde_json::Value::Object(map) => {
            ITEM_KEYS.iter().find_map(|k| map.get(*k).and_then(|v| v.as_array()))
        }
        _ => None,
    };
    let Some(list) = list else {
        return vec![];
    };
    list.iter()
        .map(|payload| DiscoveredItem {
            source_agent_id: agent_id.to_owned(),
            source_agent_name: agent_name.to_owned(),
            item_id: ["product_id", "signal_id", "id"]
                .iter()
                .find_map(|k| payload.get(*k).and_then(|v| v.as_str()))
                .map(String::from),
            name: payload.get("name").and_then(|v| v.as_str()).map(String::from),
            payload: payload.clone(),
        })
        .collect()
}

/// Concatenate every successful agent's items. No cross-agent dedup: the
/// same nominal product from two agents may differ in price or availability.
pub fn merge_discovered(report: &DispatchReport) -> Vec<DiscoveredItem> {
    report
        .outcomes
        .iter()
        .filter_map(|o| o.result.as_ref().ok().map(|reply| (o, reply)))
        .flat_map(|(o, reply)| normalize_items(&o.agent_id, &o.agent_name, &reply.data))
        .collect()
}

#[cfg(test)]
#[path = "fanout_tests.rs"]
mod tests;
