// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Append-only audit trail of agent interactions.

use std::sync::Arc;

use crate::error::OrchestratorError;
use crate::model::{ActivityRecord, SubjectKey};
use crate::store::ActivityStore;

pub struct ActivityRecorder {
    store: Arc<dyn ActivityStore>,
}

impl ActivityRecorder {
    pub fn new(store: Arc<dyn ActivityStore>) -> Self {
        Self { store }
    }

    /// Append one record. Failures are logged and swallowed: losing an audit
    /// entry must not fail the interaction it describes.
    pub fn record(&self, entry: ActivityRecord) {
        if let Err(e) = self.store.append(&entry) {
            tracing::warn!(
                agent_id = %entry.agent_id,
                action = %entry.action,
                err = %e,
                "failed to append activity record"
            );
        }
    }

    /// Records for one subject, oldest first.
    pub fn for_subject(&self, subject: &SubjectKey) -> Result<Vec<ActivityRecord>, OrchestratorError> {
        Ok(self.store.list_subject(subject)?)
    }

    /// The `limit` most recent records for an owner, newest first.
    pub fn for_owner(&self, owner_id: &str, limit: usize) -> Result<Vec<ActivityRecord>, OrchestratorError> {
        let mut records = self.store.list_owner(owner_id)?;
        records.reverse();
        records.truncate(limit);
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};
    use serde_json::json;

    use super::*;
    use crate::model::ActivityOutcome;
    use crate::store::MemoryStore;

    fn entry(agent: &str, offset_s: i64) -> ActivityRecord {
        ActivityRecord {
            id: uuid::Uuid::new_v4(),
            agent_id: agent.into(),
            owner_id: "o1".into(),
            subject: Some(SubjectKey::creative("c1")),
            action: "sync_creatives".into(),
            request: json!({}),
            response: json!({}),
            duration_ms: 1,
            outcome: ActivityOutcome::Success,
            error: None,
            recorded_at: Utc::now() + Duration::seconds(offset_s),
        }
    }

    struct BrokenStore;

    impl ActivityStore for BrokenStore {
        fn append(&self, _record: &ActivityRecord) -> anyhow::Result<()> {
            anyhow::bail!("disk full")
        }
        fn list_subject(&self, _subject: &SubjectKey) -> anyhow::Result<Vec<ActivityRecord>> {
            Ok(vec![])
        }
        fn list_owner(&self, _owner_id: &str) -> anyhow::Result<Vec<ActivityRecord>> {
            anyhow::bail!("disk gone")
        }
    }

    #[test]
    fn for_owner_returns_most_recent_first() -> anyhow::Result<()> {
        let recorder = ActivityRecorder::new(Arc::new(MemoryStore::new()));
        for (agent, offset) in [("a1", 0), ("a2", 10), ("a3", 20)] {
            recorder.record(entry(agent, offset));
        }
        let recent: Vec<_> = recorder.for_owner("o1", 2)?.into_iter().map(|r| r.agent_id).collect();
        assert_eq!(recent, vec!["a3", "a2"]);

        let ordered: Vec<_> =
            recorder.for_subject(&SubjectKey::creative("c1"))?.into_iter().map(|r| r.agent_id).collect();
        assert_eq!(ordered, vec!["a1", "a2", "a3"]);
        Ok(())
    }

    #[test]
    fn append_failure_is_swallowed() {
        let recorder = ActivityRecorder::new(Arc::new(BrokenStore));
        recorder.record(entry("a1", 0));
        assert!(matches!(recorder.for_owner("o1", 10), Err(OrchestratorError::Storage(_))));
    }
}
