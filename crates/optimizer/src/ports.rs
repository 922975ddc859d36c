//! Collaborator interfaces around the decision core: where rules, metrics
//! and budgets come from, and who carries out triggered actions.

use campaign_core::{CampaignResult, Money};
use uuid::Uuid;

use crate::action::Action;
use crate::kpi::MetricSnapshot;
use crate::rule::Rule;

/// Persistence for rules.
pub trait RuleRepository: Send + Sync {
    /// Enabled rules, optionally restricted to one campaign.
    fn find_enabled(&self, campaign_id: Option<Uuid>) -> CampaignResult<Vec<Rule>>;

    fn find_by_id(&self, id: Uuid) -> CampaignResult<Option<Rule>>;

    /// Store `rule`. When `expected` is given, the write only succeeds if the
    /// stored row still equals it; otherwise `CampaignError::Conflict`.
    fn save(&self, rule: &Rule, expected: Option<&Rule>) -> CampaignResult<()>;

    fn delete(&self, id: Uuid) -> CampaignResult<bool>;
}

/// Latest performance figures per campaign.
pub trait MetricsSource: Send + Sync {
    fn latest_snapshot(&self, campaign_id: Uuid) -> CampaignResult<Option<MetricSnapshot>>;
}

/// Current daily budget per campaign. `None` means no pacing signal.
pub trait BudgetSource: Send + Sync {
    fn daily_budget(&self, campaign_id: Uuid) -> CampaignResult<Option<Money>>;
}

/// Applies a triggered rule's actions on the ad platform or notifier.
pub trait ActionExecutor: Send + Sync {
    fn execute(&self, rule: &Rule, actions: &[Action]) -> CampaignResult<()>;
}
