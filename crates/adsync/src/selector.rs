// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Relevance selector: picks the agents a creative should be synced to.
//!
//! Candidates come from the owner's campaign tactics: those with activity
//! inside the lookback window and, optionally, every tactic of an active
//! campaign. Candidates are then narrowed to active agents the owner can
//! call that accept the creative's format.

use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};

use crate::directory::{AccountResolver, CampaignDirectory};
use crate::error::OrchestratorError;
use crate::model::CampaignStatus;

pub const DEFAULT_DAYS_BACK: i64 = 30;

#[derive(Debug, Clone, Copy)]
pub struct SelectOptions {
    pub days_back: i64,
    pub include_active: bool,
}

impl Default for SelectOptions {
    fn default() -> Self {
        Self { days_back: DEFAULT_DAYS_BACK, include_active: true }
    }
}

pub struct RelevanceSelector {
    accounts: Arc<dyn AccountResolver>,
    directory: Arc<dyn CampaignDirectory>,
}

impl RelevanceSelector {
    pub fn new(accounts: Arc<dyn AccountResolver>, directory: Arc<dyn CampaignDirectory>) -> Self {
        Self { accounts, directory }
    }

    /// Agent ids relevant to `creative_id`, sorted. Empty when nothing
    /// qualifies; only an unknown creative is an error.
    pub fn select_agents(
        &self,
        creative_id: &str,
        owner_id: &str,
        options: SelectOptions,
    ) -> Result<Vec<String>, OrchestratorError> {
        self.select_agents_at(creative_id, owner_id, options, Utc::now())
    }

    pub(crate) fn select_agents_at(
        &self,
        creative_id: &str,
        owner_id: &str,
        options: SelectOptions,
        now: DateTime<Utc>,
    ) -> Result<Vec<String>, OrchestratorError> {
        let creative = self
            .directory
            .creative(creative_id)
            .ok_or_else(|| OrchestratorError::not_found("creative", creative_id))?;

        let cutoff = now - Duration::days(options.days_back.max(0));
        let mut candidates = BTreeSet::new();
        for campaign in self.directory.campaigns_for_owner(owner_id) {
            let active = options.include_active && campaign.status == CampaignStatus::Active;
            for tactic in &campaign.tactics {
                let recent = tactic.last_activity_at.is_some_and(|at| at >= cutoff);
                if recent || active {
                    candidates.insert(tactic.agent_id.clone());
                }
            }
        }

        let eligible: BTreeSet<String> = self
            .accounts
            .agents_for_owner(owner_id)
            .into_iter()
            .filter(|a| a.is_active() && a.supports_format(&creative.format))
            .map(|a| a.id)
            .collect();

        let selected: Vec<String> = candidates.intersection(&eligible).cloned().collect();
        tracing::debug!(
            creative_id,
            owner_id,
            format = %creative.format,
            candidates = candidates.len(),
            selected = selected.len(),
            "relevance selection"
        );
        Ok(selected)
    }
}

#[cfg(test)]
#[path = "selector_tests.rs"]
mod tests;
