// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-agent sync and approval state.
//!
//! One row per (subject, agent), moved through
//! `not_synced -> pending -> synced(approval) | failed`. A failure after an
//! earlier success marks the row regressed rather than hiding it.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::error::OrchestratorError;
use crate::model::{ApprovalStatus, AttemptKey, SubjectKey, SyncAttempt, SyncStatus};
use crate::store::SyncStore;

/// Result of one dispatched sync, as seen by the tracker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    /// The agent accepted the subject. `approval` is what the agent reported,
    /// if anything.
    Synced { approval: Option<ApprovalStatus> },
    Failed { error: String },
}

/// Out-of-band decision on a pending approval.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalDecision {
    Approved,
    Rejected,
}

impl From<ApprovalDecision> for ApprovalStatus {
    fn from(d: ApprovalDecision) -> Self {
        match d {
            ApprovalDecision::Approved => Self::Approved,
            ApprovalDecision::Rejected => Self::Rejected,
        }
    }
}

pub struct SyncStateTracker {
    store: Arc<dyn SyncStore>,
    /// Held for the load-modify-upsert of a single row. Never across an await.
    write: Mutex<()>,
}

impl SyncStateTracker {
    pub fn new(store: Arc<dyn SyncStore>) -> Self {
        Self { store, write: Mutex::new(()) }
    }

    /// Mark the row pending ahead of dispatch, creating it on first sync.
    pub fn begin_attempt(
        &self,
        subject: &SubjectKey,
        owner_id: &str,
        agent_id: &str,
        at: DateTime<Utc>,
    ) -> Result<SyncAttempt, OrchestratorError> {
        let rows = self.begin_attempts(subject, owner_id, &[agent_id.to_owned()], at)?;
        rows.into_iter()
            .next()
            .ok_or_else(|| OrchestratorError::Storage(anyhow::anyhow!("no row written for {subject}/{agent_id}")))
    }

    /// Mark every agent's row pending as one step. If any write fails, rows
    /// already written are put back the way they were and the error is
    /// returned, so no agent is left pending for a dispatch that never ran.
    pub fn begin_attempts(
        &self,
        subject: &SubjectKey,
        owner_id: &str,
        agent_ids: &[String],
        at: DateTime<Utc>,
    ) -> Result<Vec<SyncAttempt>, OrchestratorError> {
        let _guard = self.write.lock();
        let mut written: Vec<(AttemptKey, Option<SyncAttempt>)> = Vec::with_capacity(agent_ids.len());
        let mut rows = Vec::with_capacity(agent_ids.len());

        for agent_id in agent_ids {
            let key = AttemptKey { subject: subject.clone(), agent_id: agent_id.clone() };
            match self.mark_pending(&key, owner_id, at) {
                Ok((row, previous)) => {
                    if previous.as_ref() != Some(&row) {
                        written.push((key, previous));
                    }
                    rows.push(row);
                }
                Err(e) => {
                    tracing::warn!(%subject, agent_id, err = %e, "could not mark sync pending");
                    self.restore(written);
                    return Err(e);
                }
            }
        }
        Ok(rows)
    }

    /// Returns the row as stored afterwards and the row it replaced.
    fn mark_pending(
        &self,
        key: &AttemptKey,
        owner_id: &str,
        at: DateTime<Utc>,
    ) -> Result<(SyncAttempt, Option<SyncAttempt>), OrchestratorError> {
        let previous = self.store.get(key)?;
        let mut row = match &previous {
            Some(row) if row.recorded_at > at => return Ok((row.clone(), previous)),
            Some(row) => row.clone(),
            None => fresh_row(&key.subject, owner_id, &key.agent_id, at),
        };

        row.status = SyncStatus::Pending;
        row.attempts += 1;
        row.last_attempt_at = Some(at);
        row.recorded_at = at;
        self.store.upsert(&row)?;
        Ok((row, previous))
    }

    fn restore(&self, written: Vec<(AttemptKey, Option<SyncAttempt>)>) {
        for (key, previous) in written.into_iter().rev() {
            let result = match &previous {
                Some(row) => self.store.upsert(row),
                None => self.store.remove(&key),
            };
            if let Err(e) = result {
                tracing::error!(subject = %key.subject, agent_id = %key.agent_id, err = %e, "could not roll back pending row");
            }
        }
    }

    /// Apply a sync outcome. Outcomes older than the stored row are ignored
    /// and the stored row is returned unchanged.
    pub fn record_sync_outcome(
        &self,
        subject: &SubjectKey,
        owner_id: &str,
        agent_id: &str,
        outcome: SyncOutcome,
        recorded_at: DateTime<Utc>,
    ) -> Result<SyncAttempt, OrchestratorError> {
        let _guard = self.write.lock();
        let key = AttemptKey { subject: subject.clone(), agent_id: agent_id.to_owned() };
        let mut row = match self.store.get(&key)? {
            Some(row) if row.recorded_at > recorded_at => {
                tracing::debug!(%subject, agent_id, "ignoring stale sync outcome");
                return Ok(row);
            }
            Some(row) => row,
            None => {
                let mut row = fresh_row(subject, owner_id, agent_id, recorded_at);
                row.attempts = 1;
                row.last_attempt_at = Some(recorded_at);
                row
            }
        };

        match outcome {
            SyncOutcome::Synced { approval } => {
                let approval = approval.unwrap_or(ApprovalStatus::Pending);
                row.status = SyncStatus::Synced;
                row.approval_status = Some(approval);
                row.approval_updated_at =
                    (approval != ApprovalStatus::Pending).then_some(recorded_at);
                row.synced_at = Some(recorded_at);
                row.error = None;
                row.regressed = false;
            }
            SyncOutcome::Failed { error } => {
                if row.synced_at.is_some() && !row.regressed {
                    tracing::warn!(%subject, agent_id, err = %error, "sync regressed");
                }
                row.regressed = row.synced_at.is_some();
                row.status = SyncStatus::Failed;
                row.error = Some(error);
            }
        }
        row.recorded_at = recorded_at;
        self.store.upsert(&row)?;
        Ok(row)
    }

    /// Current state for every agent ever targeted with `subject`, sorted by
    /// agent id.
    pub fn get_sync_status(&self, subject: &SubjectKey) -> Result<Vec<SyncAttempt>, OrchestratorError> {
        Ok(self.store.list_subject(subject)?)
    }

    /// [`Self::get_sync_status`] limited to rows owned by `owner_id`.
    pub fn owner_sync_status(
        &self,
        owner_id: &str,
        subject: &SubjectKey,
    ) -> Result<Vec<SyncAttempt>, OrchestratorError> {
        let mut rows = self.store.list_subject(subject)?;
        rows.retain(|row| row.owner_id == owner_id);
        Ok(rows)
    }

    /// Resolve a pending approval. Only a synced row awaiting approval can
    /// move to approved or rejected. Another owner's row is not found.
    pub fn record_approval(
        &self,
        subject: &SubjectKey,
        owner_id: &str,
        agent_id: &str,
        decision: ApprovalDecision,
    ) -> Result<SyncAttempt, OrchestratorError> {
        let _guard = self.write.lock();
        let key = AttemptKey { subject: subject.clone(), agent_id: agent_id.to_owned() };
        let mut row = self
            .store
            .get(&key)?
            .filter(|row| row.owner_id == owner_id)
            .ok_or_else(|| OrchestratorError::not_found("sync attempt", format!("{subject}/{agent_id}")))?;

        if row.status != SyncStatus::Synced || row.approval_status != Some(ApprovalStatus::Pending) {
            return Err(OrchestratorError::StateConflict(format!(
                "{subject} on {agent_id} is {} with approval {}",
                row.status.as_str(),
                row.approval_status.map_or("none", |a| a.as_str()),
            )));
        }

        let now = Utc::now();
        row.approval_status = Some(decision.into());
        row.approval_updated_at = Some(now);
        row.recorded_at = row.recorded_at.max(now);
        self.store.upsert(&row)?;
        tracing::info!(%subject, agent_id, approval = ?decision, "approval recorded");
        Ok(row)
    }

    /// Rows for `owner_id` that are failed, regressed or rejected.
    pub fn needs_attention(&self, owner_id: &str) -> Result<Vec<SyncAttempt>, OrchestratorError> {
        let rows = self.store.list_owner(owner_id)?;
        Ok(rows.into_iter().filter(SyncAttempt::needs_attention).collect())
    }
}

fn fresh_row(subject: &SubjectKey, owner_id: &str, agent_id: &str, at: DateTime<Utc>) -> SyncAttempt {
    SyncAttempt {
        subject: subject.clone(),
        agent_id: agent_id.to_owned(),
        owner_id: owner_id.to_owned(),
        status: SyncStatus::NotSynced,
        approval_status: None,
        error: None,
        regressed: false,
        attempts: 0,
        last_attempt_at: None,
        synced_at: None,
        approval_updated_at: None,
        recorded_at: at,
    }
}

#[cfg(test)]
#[path = "tracker_tests.rs"]
mod tests;
