//! Savings projection: how much spend is wasted and how much an action
//! would save.

use campaign_core::{Currency, Money};
use tracing::warn;

use crate::action::Action;
use crate::kpi::MetricSnapshot;

/// Default ROAS floor below which spend counts as wasted.
pub const DEFAULT_WASTE_ROAS_THRESHOLD: f64 = 1.0;

/// Days per month used by the monthly projection. No calendar awareness.
pub const DAYS_PER_MONTH: i64 = 30;

/// Stateless savings calculations over KPI snapshots.
#[derive(Debug, Clone)]
pub struct SavingsProjector {
    max_budget_change_percent: f64,
}

impl Default for SavingsProjector {
    fn default() -> Self {
        Self::new(100.0)
    }
}

impl SavingsProjector {
    /// `max_budget_change_percent` caps the percentage of a budget action
    /// when projecting; percentages are also floored at zero.
    pub fn new(max_budget_change_percent: f64) -> Self {
        let max = if max_budget_change_percent.is_finite() {
            max_budget_change_percent.clamp(0.0, 100.0)
        } else {
            100.0
        };
        Self {
            max_budget_change_percent: max,
        }
    }

    /// Total spend of snapshots whose ROAS is below `roas_threshold`.
    ///
    /// The result carries the first snapshot's currency; snapshots in any
    /// other currency are left out of the total.
    pub fn calculate_wasted_spend(&self, snapshots: &[MetricSnapshot], roas_threshold: f64) -> Money {
        let currency = first_currency(snapshots);
        snapshots
            .iter()
            .filter(|s| {
                let same = s.spend().currency() == currency;
                if !same {
                    warn!(
                        campaign_id = %s.campaign_id(),
                        expected = %currency,
                        found = %s.spend().currency(),
                        "Skipping snapshot in another currency"
                    );
                }
                same
            })
            .filter(|s| s.roas() < roas_threshold)
            .fold(Money::zero(currency), |acc, s| acc.saturating_add(s.spend()))
    }

    /// Spend that applying `action` to the period in `snapshot` would save.
    pub fn project_action_savings(&self, snapshot: &MetricSnapshot, action: &Action) -> Money {
        let spend = snapshot.spend();
        match action {
            Action::PauseCampaign => spend,
            Action::ReduceBudget { percentage } => {
                let pct = self.clamp_percentage(*percentage);
                Money::from_f64_rounded(spend.as_f64() * pct / 100.0, spend.currency())
            }
            Action::IncreaseBudget { .. } | Action::AlertOnly { .. } => {
                Money::zero(spend.currency())
            }
        }
    }

    /// Savings of a rule's action list. Actions apply to the same spend, so
    /// the largest single saving wins rather than the sum.
    pub fn project_rule_savings(&self, snapshot: &MetricSnapshot, actions: &[Action]) -> Money {
        actions
            .iter()
            .map(|a| self.project_action_savings(snapshot, a))
            .max_by_key(|m| m.amount())
            .unwrap_or_else(|| Money::zero(snapshot.spend().currency()))
    }

    /// Scale a daily saving to a 30-day month.
    pub fn project_monthly_savings(&self, daily: Money) -> Money {
        daily.saturating_mul(DAYS_PER_MONTH)
    }

    /// Spend reduction between two periods, never negative. Periods in
    /// different currencies cannot be compared and yield zero.
    pub fn calculate_savings_from_optimization(
        &self,
        before: &MetricSnapshot,
        after: &MetricSnapshot,
    ) -> Money {
        let currency = before.spend().currency();
        if after.spend().currency() != currency {
            warn!(
                campaign_id = %before.campaign_id(),
                before = %currency,
                after = %after.spend().currency(),
                "Cannot compare spend across currencies"
            );
            return Money::zero(currency);
        }
        before.spend().saturating_sub(after.spend())
    }

    fn clamp_percentage(&self, percentage: f64) -> f64 {
        if !percentage.is_finite() {
            return 0.0;
        }
        percentage.clamp(0.0, self.max_budget_change_percent)
    }
}

fn first_currency(snapshots: &[MetricSnapshot]) -> Currency {
    snapshots
        .first()
        .map(|s| s.spend().currency())
        .unwrap_or_default()
}
