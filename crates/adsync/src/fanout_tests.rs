// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use futures_util::future::BoxFuture;
use serde_json::json;

use super::*;
use crate::test_support::{target, Script, ScriptedAgents};

fn products(n: usize) -> serde_json::Value {
    let list: Vec<_> =
        (0..n).map(|i| json!({"product_id": format!("p{i}"), "name": format!("Product {i}")})).collect();
    json!({ "products": list })
}

fn fanout(agents: Arc<ScriptedAgents>, timeout_ms: u64) -> FanOut {
    FanOut::new(agents, Duration::from_millis(timeout_ms), 16)
}

// -- settle_all ------------------------------------------------------------------

#[tokio::test]
async fn settle_all_keeps_every_result_in_order() {
    let tasks: Vec<(u32, BoxFuture<'static, Result<u32, String>>)> = vec![
        (1, Box::pin(async { Err("boom".to_owned()) })),
        (2, Box::pin(async {
            tokio::time::sleep(Duration::from_millis(20)).await;
            Ok(20)
        })),
        (3, Box::pin(async { Ok(30) })),
    ];
    let settled = settle_all(tasks).await;
    assert_eq!(settled.len(), 3);
    assert_eq!(settled[0], (1, Err("boom".to_owned())));
    assert_eq!(settled[1], (2, Ok(20)));
    assert_eq!(settled[2], (3, Ok(30)));
}

// -- dispatch_all -----------------------------------------------------------------

#[tokio::test]
async fn one_timeout_does_not_drop_siblings() {
    let agents = ScriptedAgents::new();
    agents.script("A", Script::Reply(products(2)));
    agents.script("B", Script::Hang);
    agents.script("C", Script::Reply(products(5)));

    let slots = vec![Slot::Call(target("A")), Slot::Call(target("B")), Slot::Call(target("C"))];
    let report = fanout(agents, 100)
        .dispatch_all(slots, "get_products", &json!({"brief": "cars"}), &DispatchOptions::default())
        .await;

    assert_eq!(report.total(), 3);
    assert_eq!(report.succeeded(), 2);
    assert_eq!(report.failed(), 1);
    let failed: Vec<_> = report.outcomes.iter().filter(|o| !o.is_success()).collect();
    assert_eq!(failed[0].agent_id, "B");
    assert!(failed[0].error().is_some_and(|e| e.is_timeout()));

    let merged = merge_discovered(&report);
    assert_eq!(merged.len(), 7);
    assert_eq!(merged.iter().filter(|i| i.source_agent_id == "A").count(), 2);
    assert_eq!(merged.iter().filter(|i| i.source_agent_id == "C").count(), 5);
}

#[tokio::test]
async fn report_has_one_entry_per_agent() {
    for failing in [0, 1, 4, 8] {
        let agents = ScriptedAgents::new();
        let mut slots = vec![];
        for i in 0..8 {
            let id = format!("agent-{i}");
            if i < failing {
                agents.script(&id, Script::AgentError(format!("nope {i}")));
            } else {
                agents.script(&id, Script::Reply(json!({})));
            }
            slots.push(Slot::Call(target(&id)));
        }

        let report =
            fanout(agents, 500).dispatch_all(slots, "x", &json!({}), &DispatchOptions::default()).await;
        assert_eq!(report.total(), 8);
        assert_eq!(report.failed(), failing);
        let ids: Vec<_> = report.outcomes.iter().map(|o| o.agent_id.clone()).collect();
        let expected: Vec<_> = (0..8).map(|i| format!("agent-{i}")).collect();
        assert_eq!(ids, expected);
    }
}

#[tokio::test]
async fn min_successful_flags_degraded_without_failing() {
    let agents = ScriptedAgents::new();
    agents.script("A", Script::Reply(json!({})));
    agents.script("B", Script::TransportError(TransportError::Network("refused".into())));

    let options = DispatchOptions { min_successful: Some(2), deadline: None };
    let report = fanout(agents, 500)
        .dispatch_all(vec![Slot::Call(target("A")), Slot::Call(target("B"))], "x", &json!({}), &options)
        .await;

    assert!(report.degraded());
    let summary = report.summary();
    assert_eq!(summary, DispatchSummary { total: 2, succeeded: 1, failed: 1, degraded: true });
}

#[tokio::test]
async fn min_successful_met_is_not_degraded() {
    let agents = ScriptedAgents::new();
    let options = DispatchOptions { min_successful: Some(1), deadline: None };
    let report =
        fanout(agents, 500).dispatch_all(vec![Slot::Call(target("A"))], "x", &json!({}), &options).await;
    assert!(!report.degraded());
}

#[tokio::test]
async fn deadline_caps_agent_timeout() {
    let agents = ScriptedAgents::new();
    agents.script("slow", Script::Delay(Duration::from_millis(400), json!({})));
    agents.script("fast", Script::Reply(json!({})));

    let options = DispatchOptions { min_successful: None, deadline: Some(Duration::from_millis(50)) };
    let started = std::time::Instant::now();
    let report = fanout(agents, 10_000)
        .dispatch_all(vec![Slot::Call(target("slow")), Slot::Call(target("fast"))], "x", &json!({}), &options)
        .await;

    assert!(started.elapsed() < Duration::from_millis(400));
    assert!(report.outcomes[0].error().is_some_and(|e| e.is_timeout()));
    assert!(report.outcomes[1].is_success());
}

#[tokio::test]
async fn deadline_covers_agents_waiting_for_a_permit() {
    let agents = ScriptedAgents::new();
    for id in ["A", "B", "C"] {
        agents.script(id, Script::Delay(Duration::from_millis(80), json!({})));
    }
    let fan = FanOut::new(agents, Duration::from_secs(10), 1);
    let options = DispatchOptions { min_successful: None, deadline: Some(Duration::from_millis(100)) };
    let slots: Vec<_> = ["A", "B", "C"].iter().map(|id| Slot::Call(target(id))).collect();

    let started = std::time::Instant::now();
    let report = fan.dispatch_all(slots, "x", &json!({}), &options).await;

    assert!(started.elapsed() < Duration::from_millis(180), "took {:?}", started.elapsed());
    assert_eq!(report.total(), 3);
    assert!(report.outcomes[0].is_success());
    assert!(report.outcomes[1].error().is_some_and(|e| e.is_timeout()));
    assert!(report.outcomes[2].error().is_some_and(|e| e.is_timeout()));
}

#[tokio::test]
async fn unavailable_slot_is_reported_not_called() {
    let agents = ScriptedAgents::new();
    let slots = vec![
        Slot::Call(target("A")),
        Slot::Unavailable {
            agent_id: "ghost".into(),
            agent_name: "ghost".into(),
            reason: "unknown agent".into(),
        },
    ];
    let report =
        fanout(agents.clone(), 500).dispatch_all(slots, "x", &json!({}), &DispatchOptions::default()).await;

    assert_eq!(report.total(), 2);
    let ghost = &report.outcomes[1];
    assert!(ghost.request.is_none());
    assert!(matches!(ghost.error(), Some(CallError::Configuration { .. })));
    assert_eq!(agents.calls_to("ghost"), 0);
}

#[tokio::test]
async fn each_agent_gets_its_own_request_id() {
    let agents = ScriptedAgents::new();
    let report = fanout(agents.clone(), 500)
        .dispatch_all(
            vec![Slot::Call(target("A")), Slot::Call(target("B"))],
            "sync_creatives",
            &json!({"creatives": []}),
            &DispatchOptions::default(),
        )
        .await;

    let calls = agents.calls();
    assert_eq!(calls.len(), 2);
    assert_ne!(calls[0].1.request_id, calls[1].1.request_id);
    assert_eq!(calls[0].1.action, "sync_creatives");
    assert_eq!(report.outcomes[0].request.as_ref().map(|r| r.request_id), Some(calls[0].1.request_id));
}

/// Counts peak in-flight calls.
struct Gauge {
    current: AtomicUsize,
    peak: AtomicUsize,
}

impl AgentCall for Gauge {
    fn call<'a>(
        &'a self,
        _target: &'a AgentTarget,
        _request: &'a AgentRequest,
        _timeout: Duration,
    ) -> BoxFuture<'a, Result<AgentReply, CallError>> {
        Box::pin(async move {
            let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(20)).await;
            self.current.fetch_sub(1, Ordering::SeqCst);
            Ok(AgentReply { data: json!({}) })
        })
    }
}

#[tokio::test]
async fn concurrency_is_bounded() {
    let gauge = Arc::new(Gauge { current: AtomicUsize::new(0), peak: AtomicUsize::new(0) });
    let fan = FanOut::new(gauge.clone(), Duration::from_secs(5), 2);
    let slots: Vec<_> = (0..6).map(|i| Slot::Call(target(&format!("a{i}")))).collect();

    let report = fan.dispatch_all(slots, "x", &json!({}), &DispatchOptions::default()).await;
    assert_eq!(report.succeeded(), 6);
    assert!(gauge.peak.load(Ordering::SeqCst) <= 2);
}

#[tokio::test]
async fn calls_run_concurrently() {
    let agents = ScriptedAgents::new();
    for id in ["A", "B", "C", "D"] {
        agents.script(id, Script::Delay(Duration::from_millis(100), json!({})));
    }
    let slots: Vec<_> = ["A", "B", "C", "D"].iter().map(|id| Slot::Call(target(id))).collect();

    let started = std::time::Instant::now();
    let report = fanout(agents, 5_000).dispatch_all(slots, "x", &json!({}), &DispatchOptions::default()).await;
    assert_eq!(report.succeeded(), 4);
    assert!(started.elapsed() < Duration::from_millis(350));
}

// -- normalize / merge ------------------------------------------------------------

#[test]
fn normalize_reads_known_keys() {
    let items = normalize_items("A", "Agent A", &json!({"signals": [{"signal_id": "s1", "name": "Auto intenders"}]}));
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].item_id.as_deref(), Some("s1"));
    assert_eq!(items[0].name.as_deref(), Some("Auto intenders"));
    assert_eq!(items[0].source_agent_name, "Agent A");
}

#[test]
fn normalize_accepts_bare_array() {
    let items = normalize_items("A", "Agent A", &json!([{"id": "x"}, {"id": "y"}]));
    assert_eq!(items.len(), 2);
    assert_eq!(items[1].item_id.as_deref(), Some("y"));
}

#[test]
fn normalize_unknown_shape_is_empty() {
    assert!(normalize_items("A", "A", &json!({"message": "hi"})).is_empty());
    assert!(normalize_items("A", "A", &serde_json::Value::Null).is_empty());
}

#[tokio::test]
async fn merge_keeps_cross_agent_duplicates() {
    let agents = ScriptedAgents::new();
    let same = json!({"products": [{"product_id": "ctv-1", "price": 10}]});
    agents.script("A", Script::Reply(same.clone()));
    agents.script("B", Script::Reply(json!({"products": [{"product_id": "ctv-1", "price": 12}]})));

    let report = fanout(agents, 500)
        .dispatch_all(vec![Slot::Call(target("A")), Slot::Call(target("B"))], "get_products", &json!({}), &DispatchOptions::default())
        .await;
    let merged = merge_discovered(&report);
    assert_eq!(merged.len(), 2);
    assert_eq!(merged[0].payload["price"], 10);
    assert_eq!(merged[1].payload["price"], 12);
}
