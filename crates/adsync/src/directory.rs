// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Read-only lookups of agents, accounts, creatives and campaigns.
//!
//! Registration of these records happens elsewhere; the orchestrator only
//! reads them through [`AccountResolver`] and [`CampaignDirectory`].
//! [`StaticDirectory`] serves both from a JSON registry file loaded at
//! startup (`--registry <path>`).

use std::collections::HashMap;
use std::path::Path;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::model::{Agent, AgentAccount, AuthConfig, Campaign, Creative};

/// Resolves which agents an owner may use and how to authenticate.
pub trait AccountResolver: Send + Sync {
    /// Agents the owner holds an enabled account for, active or not.
    fn agents_for_owner(&self, owner_id: &str) -> Vec<Agent>;
    /// Auth for the owner's account with an agent; `None` when no enabled
    /// account exists.
    fn account_auth(&self, owner_id: &str, agent_id: &str) -> Option<AuthConfig>;
    /// Look up an agent by id regardless of owner.
    fn agent(&self, agent_id: &str) -> Option<Agent>;
}

/// Creative and campaign lookups used for target resolution.
pub trait CampaignDirectory: Send + Sync {
    fn creative(&self, creative_id: &str) -> Option<Creative>;
    fn campaign(&self, campaign_id: &str) -> Option<Campaign>;
    fn campaigns_for_owner(&self, owner_id: &str) -> Vec<Campaign>;
}

/// On-disk registry document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RegistryConfig {
    #[serde(default)]
    pub agents: Vec<Agent>,
    #[serde(default)]
    pub accounts: Vec<AgentAccount>,
    #[serde(default)]
    pub creatives: Vec<Creative>,
    #[serde(default)]
    pub campaigns: Vec<Campaign>,
}

impl RegistryConfig {
    /// Load a registry from a JSON file.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&contents)?;
        Ok(config)
    }
}

#[derive(Default)]
struct Inner {
    agents: HashMap<String, Agent>,
    /// Keyed by (owner, agent).
    accounts: HashMap<(String, String), AgentAccount>,
    creatives: HashMap<String, Creative>,
    campaigns: HashMap<String, Campaign>,
}

/// In-memory directory. Records may be replaced at runtime (tests, reloads).
#[derive(Default)]
pub struct StaticDirectory {
    inner: RwLock<Inner>,
}

impl StaticDirectory {
    pub fn new(config: RegistryConfig) -> Self {
        let dir = Self::default();
        {
            let mut inner = dir.inner.write();
            for agent in config.agents {
                inner.agents.insert(agent.id.clone(), agent);
            }
            for account in config.accounts {
                inner.accounts.insert((account.owner_id.clone(), account.agent_id.clone()), account);
            }
            for creative in config.creatives {
                inner.creatives.insert(creative.id.clone(), creative);
            }
            for campaign in config.campaigns {
                inner.campaigns.insert(campaign.id.clone(), campaign);
            }
        }
        dir
    }

    pub fn agent_count(&self) -> usize {
        self.inner.read().agents.len()
    }

    pub fn upsert_agent(&self, agent: Agent) {
        self.inner.write().agents.insert(agent.id.clone(), agent);
    }

    pub fn upsert_account(&self, account: AgentAccount) {
        let key = (account.owner_id.clone(), account.agent_id.clone());
        self.inner.write().accounts.insert(key, account);
    }

    pub fn upsert_creative(&self, creative: Creative) {
        self.inner.write().creatives.insert(creative.id.clone(), creative);
    }

    pub fn upsert_campaign(&self, campaign: Campaign) {
        self.inner.write().campaigns.insert(campaign.id.clone(), campaign);
    }
}

impl AccountResolver for StaticDirectory {
    fn agents_for_owner(&self, owner_id: &str) -> Vec<Agent> {
        let inner = self.inner.read();
        let mut agents: Vec<Agent> = inner
            .accounts
            .values()
            .filter(|a| a.owner_id == owner_id && a.enabled)
            .filter_map(|a| inner.agents.get(&a.agent_id).cloned())
            .collect();
        agents.sort_by(|a, b| a.id.cmp(&b.id));
        agents
    }

    fn account_auth(&self, owner_id: &str, agent_id: &str) -> Option<AuthConfig> {
        let inner = self.inner.read();
        inner
            .accounts
            .get(&(owner_id.to_owned(), agent_id.to_owned()))
            .filter(|a| a.enabled)
            .map(|a| a.auth.clone())
    }

    fn agent(&self, agent_id: &str) -> Option<Agent> {
        self.inner.read().agents.get(agent_id).cloned()
    }
}

impl CampaignDirectory for StaticDirectory {
    fn creative(&self, creative_id: &str) -> Option<Creative> {
        self.inner.read().creatives.get(creative_id).cloned()
    }

    fn campaign(&self, campaign_id: &str) -> Option<Campaign> {
        self.inner.read().campaigns.get(campaign_id).cloned()
    }

    fn campaigns_for_owner(&self, owner_id: &str) -> Vec<Campaign> {
        let mut campaigns: Vec<Campaign> = self
            .inner
            .read()
            .campaigns
            .values()
            .filter(|c| c.owner_id == owner_id)
            .cloned()
            .collect();
        campaigns.sort_by(|a, b| a.id.cmp(&b.id));
        campaigns
    }
}
