//! In-memory rule repository backed by `DashMap`.

use campaign_core::{CampaignError, CampaignResult};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tracing::{debug, info};
use uuid::Uuid;

use crate::ports::RuleRepository;
use crate::rule::Rule;

/// Concurrent rule store with compare-and-swap saves.
pub struct InMemoryRuleStore {
    rules: DashMap<Uuid, Rule>,
}

impl InMemoryRuleStore {
    pub fn new() -> Self {
        Self {
            rules: DashMap::new(),
        }
    }

    /// Seed the store, replacing rules with the same id.
    pub fn with_rules(rules: impl IntoIterator<Item = Rule>) -> Self {
        let store = Self::new();
        for rule in rules {
            store.rules.insert(rule.id(), rule);
        }
        store
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// All rules for a campaign, enabled or not, oldest first.
    pub fn list_for_campaign(&self, campaign_id: Uuid) -> Vec<Rule> {
        let mut rules: Vec<Rule> = self
            .rules
            .iter()
            .filter(|r| r.value().campaign_id() == campaign_id)
            .map(|r| r.value().clone())
            .collect();
        rules.sort_by_key(|r| r.created_at());
        rules
    }
}

impl Default for InMemoryRuleStore {
    fn default() -> Self {
        Self::new()
    }
}

impl RuleRepository for InMemoryRuleStore {
    fn find_enabled(&self, campaign_id: Option<Uuid>) -> CampaignResult<Vec<Rule>> {
        let mut rules: Vec<Rule> = self
            .rules
            .iter()
            .map(|r| r.value().clone())
            .filter(|r| r.is_enabled())
            .filter(|r| campaign_id.map_or(true, |cid| r.campaign_id() == cid))
            .collect();
        rules.sort_by_key(|r| r.created_at());
        Ok(rules)
    }

    fn find_by_id(&self, id: Uuid) -> CampaignResult<Option<Rule>> {
        Ok(self.rules.get(&id).map(|r| r.value().clone()))
    }

    fn save(&self, rule: &Rule, expected: Option<&Rule>) -> CampaignResult<()> {
        // The entry guard holds the shard lock across compare and write.
        match (self.rules.entry(rule.id()), expected) {
            (Entry::Occupied(mut slot), Some(expected)) => {
                if slot.get() != expected {
                    return Err(CampaignError::Conflict(format!(
                        "rule {} was modified concurrently",
                        rule.id()
                    )));
                }
                slot.insert(rule.clone());
            }
            (Entry::Vacant(_), Some(_)) => {
                return Err(CampaignError::NotFound(format!("rule {}", rule.id())));
            }
            (Entry::Occupied(mut slot), None) => {
                slot.insert(rule.clone());
            }
            (Entry::Vacant(slot), None) => {
                info!(rule_id = %rule.id(), campaign_id = %rule.campaign_id(), "Rule created");
                slot.insert(rule.clone());
            }
        }
        debug!(rule_id = %rule.id(), trigger_count = rule.trigger_count(), "Rule saved");
        Ok(())
    }

    fn delete(&self, id: Uuid) -> CampaignResult<bool> {
        let removed = self.rules.remove(&id).is_some();
        if removed {
            info!(rule_id = %id, "Rule deleted");
        }
        Ok(removed)
    }
}
