// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use chrono::Duration;

use super::*;
use crate::store::MemoryStore;

fn tracker() -> SyncStateTracker {
    SyncStateTracker::new(Arc::new(MemoryStore::new()))
}

fn c1() -> SubjectKey {
    SubjectKey::creative("c1")
}

fn synced(approval: Option<ApprovalStatus>) -> SyncOutcome {
    SyncOutcome::Synced { approval }
}

fn failed(msg: &str) -> SyncOutcome {
    SyncOutcome::Failed { error: msg.into() }
}

#[test]
fn first_sync_goes_pending_then_synced_awaiting_approval() -> anyhow::Result<()> {
    let t = tracker();
    let t0 = Utc::now();

    let row = t.begin_attempt(&c1(), "o1", "a1", t0)?;
    assert_eq!(row.status, SyncStatus::Pending);
    assert_eq!(row.attempts, 1);
    assert_eq!(row.approval_status, None);

    let row = t.record_sync_outcome(&c1(), "o1", "a1", synced(None), t0 + Duration::milliseconds(5))?;
    assert_eq!(row.status, SyncStatus::Synced);
    assert_eq!(row.approval_status, Some(ApprovalStatus::Pending));
    assert!(row.synced_at.is_some());
    Ok(())
}

#[test]
fn resync_updates_single_row() -> anyhow::Result<()> {
    let t = tracker();
    let t0 = Utc::now();
    for i in 0..3 {
        let at = t0 + Duration::seconds(i * 10);
        t.begin_attempt(&c1(), "o1", "a1", at)?;
        t.record_sync_outcome(&c1(), "o1", "a1", synced(None), at + Duration::seconds(1))?;
    }

    let rows = t.get_sync_status(&c1())?;
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].attempts, 3);
    Ok(())
}

#[test]
fn begin_attempts_marks_every_agent_at_once() -> anyhow::Result<()> {
    let t = tracker();
    let t0 = Utc::now();
    t.record_sync_outcome(&c1(), "o1", "b", synced(None), t0)?;

    let ids = vec!["a".to_owned(), "b".to_owned()];
    let rows = t.begin_attempts(&c1(), "o1", &ids, t0 + Duration::seconds(1))?;
    let summary: Vec<_> = rows.iter().map(|r| (r.agent_id.as_str(), r.status, r.attempts)).collect();
    assert_eq!(summary, vec![("a", SyncStatus::Pending, 1), ("b", SyncStatus::Pending, 2)]);
    assert_eq!(t.get_sync_status(&c1())?.len(), 2);
    Ok(())
}

#[test]
fn failure_after_success_is_a_regression() -> anyhow::Result<()> {
    let t = tracker();
    let t0 = Utc::now();
    t.begin_attempt(&c1(), "o1", "a1", t0)?;
    t.record_sync_outcome(&c1(), "o1", "a1", synced(None), t0 + Duration::seconds(1))?;

    t.begin_attempt(&c1(), "o1", "a1", t0 + Duration::seconds(2))?;
    let row = t.record_sync_outcome(&c1(), "o1", "a1", failed("format rejected"), t0 + Duration::seconds(3))?;
    assert_eq!(row.status, SyncStatus::Failed);
    assert!(row.regressed);
    assert_eq!(row.error.as_deref(), Some("format rejected"));
    assert_eq!(t.needs_attention("o1")?.len(), 1);

    // A later success clears the regression and resets approval.
    let row = t.record_sync_outcome(&c1(), "o1", "a1", synced(None), t0 + Duration::seconds(4))?;
    assert!(!row.regressed);
    assert_eq!(row.error, None);
    assert_eq!(row.approval_status, Some(ApprovalStatus::Pending));
    assert!(t.needs_attention("o1")?.is_empty());
    Ok(())
}

#[test]
fn first_failure_is_not_a_regression() -> anyhow::Result<()> {
    let t = tracker();
    let t0 = Utc::now();
    t.begin_attempt(&c1(), "o1", "a1", t0)?;
    let row = t.record_sync_outcome(&c1(), "o1", "a1", failed("down"), t0 + Duration::seconds(1))?;
    assert_eq!(row.status, SyncStatus::Failed);
    assert!(!row.regressed);
    assert_eq!(row.approval_status, None);
    Ok(())
}

#[test]
fn failed_agents_still_appear_in_status() -> anyhow::Result<()> {
    let t = tracker();
    let t0 = Utc::now();
    t.record_sync_outcome(&c1(), "o1", "b", failed("timeout"), t0)?;
    t.record_sync_outcome(&c1(), "o1", "a", synced(Some(ApprovalStatus::Approved)), t0)?;

    let rows = t.get_sync_status(&c1())?;
    let summary: Vec<_> = rows.iter().map(|r| (r.agent_id.as_str(), r.status)).collect();
    assert_eq!(summary, vec![("a", SyncStatus::Synced), ("b", SyncStatus::Failed)]);
    assert_eq!(rows[0].approval_status, Some(ApprovalStatus::Approved));
    assert!(rows[0].approval_updated_at.is_some());
    Ok(())
}

#[test]
fn stale_outcome_is_ignored() -> anyhow::Result<()> {
    let t = tracker();
    let t0 = Utc::now();
    t.record_sync_outcome(&c1(), "o1", "a1", synced(None), t0 + Duration::seconds(5))?;
    let row = t.record_sync_outcome(&c1(), "o1", "a1", failed("late"), t0)?;
    assert_eq!(row.status, SyncStatus::Synced);
    assert_eq!(t.get_sync_status(&c1())?[0].status, SyncStatus::Synced);
    Ok(())
}

#[test]
fn approval_requires_synced_pending_row() -> anyhow::Result<()> {
    let t = tracker();
    let t0 = Utc::now();

    let missing = t.record_approval(&c1(), "o1", "a1", ApprovalDecision::Approved);
    assert!(matches!(missing, Err(OrchestratorError::NotFound { .. })));

    t.begin_attempt(&c1(), "o1", "a1", t0)?;
    let pending = t.record_approval(&c1(), "o1", "a1", ApprovalDecision::Approved);
    assert!(matches!(pending, Err(OrchestratorError::StateConflict(_))));

    t.record_sync_outcome(&c1(), "o1", "a1", synced(None), t0 + Duration::seconds(1))?;
    let row = t.record_approval(&c1(), "o1", "a1", ApprovalDecision::Rejected)?;
    assert_eq!(row.approval_status, Some(ApprovalStatus::Rejected));
    assert_eq!(t.needs_attention("o1")?.len(), 1);

    let again = t.record_approval(&c1(), "o1", "a1", ApprovalDecision::Approved);
    assert!(matches!(again, Err(OrchestratorError::StateConflict(_))));
    Ok(())
}

#[test]
fn approval_on_failed_row_conflicts() -> anyhow::Result<()> {
    let t = tracker();
    t.record_sync_outcome(&c1(), "o1", "a1", failed("nope"), Utc::now())?;
    let result = t.record_approval(&c1(), "o1", "a1", ApprovalDecision::Approved);
    assert!(matches!(result, Err(OrchestratorError::StateConflict(_))));
    Ok(())
}

#[test]
fn other_owners_rows_are_invisible() -> anyhow::Result<()> {
    let t = tracker();
    let now = Utc::now();
    t.record_sync_outcome(&c1(), "o1", "a1", synced(None), now)?;
    t.record_sync_outcome(&c1(), "o2", "a2", synced(None), now)?;

    let mine: Vec<_> = t.owner_sync_status("o1", &c1())?.into_iter().map(|r| r.agent_id).collect();
    assert_eq!(mine, vec!["a1"]);
    assert!(t.owner_sync_status("o3", &c1())?.is_empty());

    let stolen = t.record_approval(&c1(), "o2", "a1", ApprovalDecision::Approved);
    assert!(matches!(stolen, Err(OrchestratorError::NotFound { .. })));
    assert_eq!(t.get_sync_status(&c1())?[0].approval_status, Some(ApprovalStatus::Pending));
    Ok(())
}

#[test]
fn signals_and_creatives_do_not_collide() -> anyhow::Result<()> {
    let t = tracker();
    let now = Utc::now();
    t.record_sync_outcome(&SubjectKey::creative("x"), "o1", "a1", synced(None), now)?;
    t.record_sync_outcome(&SubjectKey::signal("x"), "o1", "a1", failed("no"), now)?;
    assert_eq!(t.get_sync_status(&SubjectKey::creative("x"))?[0].status, SyncStatus::Synced);
    assert_eq!(t.get_sync_status(&SubjectKey::signal("x"))?[0].status, SyncStatus::Failed);
    Ok(())
}
