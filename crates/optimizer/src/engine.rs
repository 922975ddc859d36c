//! Optimization engine: one evaluation pass over a set of rules.
//!
//! The engine decides; it never talks to the ad platform itself. `decide`
//! is pure over its inputs. `run_cycle` wires the decision to the
//! collaborator ports: load enabled rules, evaluate each against its
//! campaign's latest snapshot, persist the rule with its cooldown restarted
//! and only then hand the triggered actions to the executor. The
//! conflict-checked save claims the trigger, so concurrent passes over the
//! same rule execute its actions at most once.

use std::collections::HashMap;

use campaign_core::config::OptimizerConfig;
use campaign_core::{CampaignError, CampaignResult, Money};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::action::Action;
use crate::kpi::MetricSnapshot;
use crate::ports::{ActionExecutor, BudgetSource, MetricsSource, RuleRepository};
use crate::rule::Rule;
use crate::savings::SavingsProjector;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// A rule that should fire now, with the instance to persist afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TriggerDecision {
    pub rule_id: Uuid,
    pub campaign_id: Uuid,
    pub rule_name: String,
    pub actions: Vec<Action>,
    pub projected_savings: Money,
    pub projected_monthly_savings: Money,
    pub evaluated_at: DateTime<Utc>,
    pub updated_rule: Rule,
}

/// Why a single rule did or did not fire.
#[derive(Debug, Clone)]
pub enum RuleOutcome {
    Disabled,
    ConditionsNotMet,
    CoolingDown { until: DateTime<Utc> },
    Triggered(Box<TriggerDecision>),
}

/// Tally of one `run_cycle` pass.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CycleReport {
    pub evaluated: usize,
    pub triggered: usize,
    pub conditions_not_met: usize,
    pub cooling_down: usize,
    pub missing_metrics: usize,
    pub conflicts: usize,
    pub failed: usize,
    pub decisions: Vec<TriggerDecision>,
}

// ---------------------------------------------------------------------------
// OptimizationEngine
// ---------------------------------------------------------------------------

pub struct OptimizationEngine {
    config: OptimizerConfig,
    projector: SavingsProjector,
}

impl OptimizationEngine {
    pub fn new(config: OptimizerConfig) -> Self {
        let projector = SavingsProjector::new(config.max_budget_change_percent);
        Self { config, projector }
    }

    pub fn projector(&self) -> &SavingsProjector {
        &self.projector
    }

    /// Evaluate one rule against its campaign's snapshot.
    pub fn evaluate_rule(
        &self,
        rule: &Rule,
        snapshot: &MetricSnapshot,
        daily_budget: Option<Money>,
        now: DateTime<Utc>,
    ) -> RuleOutcome {
        if !rule.is_enabled() {
            return RuleOutcome::Disabled;
        }
        if !rule.evaluate(snapshot, daily_budget) {
            return RuleOutcome::ConditionsNotMet;
        }
        if let Some(until) = rule.cooldown_ends_at(now) {
            return RuleOutcome::CoolingDown { until };
        }

        let projected_savings = self.projector.project_rule_savings(snapshot, rule.actions());
        RuleOutcome::Triggered(Box::new(TriggerDecision {
            rule_id: rule.id(),
            campaign_id: rule.campaign_id(),
            rule_name: rule.name().to_string(),
            actions: rule.actions().to_vec(),
            projected_savings,
            projected_monthly_savings: self.projector.project_monthly_savings(projected_savings),
            evaluated_at: now,
            updated_rule: rule.record_trigger_at(now),
        }))
    }

    /// Decide which rules fire, given the latest snapshot and optional
    /// daily budget per campaign. Rules without a snapshot are skipped.
    pub fn decide(
        &self,
        rules: &[Rule],
        snapshots: &HashMap<Uuid, MetricSnapshot>,
        budgets: &HashMap<Uuid, Money>,
        now: DateTime<Utc>,
    ) -> Vec<TriggerDecision> {
        let mut decisions = Vec::new();

        for rule in rules {
            let Some(snapshot) = snapshots.get(&rule.campaign_id()) else {
                debug!(rule_id = %rule.id(), campaign_id = %rule.campaign_id(), "No snapshot for campaign, skipping rule");
                continue;
            };
            let budget = budgets.get(&rule.campaign_id()).copied();

            match self.evaluate_rule(rule, snapshot, budget, now) {
                RuleOutcome::Triggered(decision) => {
                    info!(
                        rule_id = %rule.id(),
                        campaign_id = %rule.campaign_id(),
                        rule = %rule.describe(),
                        savings = %decision.projected_savings,
                        "Rule triggered"
                    );
                    decisions.push(*decision);
                }
                RuleOutcome::CoolingDown { until } => {
                    debug!(rule_id = %rule.id(), until = %until, "Rule cooling down");
                }
                RuleOutcome::ConditionsNotMet | RuleOutcome::Disabled => {}
            }
        }

        decisions
    }

    /// Spend wasted below the configured ROAS floor.
    pub fn wasted_spend(&self, snapshots: &[MetricSnapshot]) -> Money {
        self.projector
            .calculate_wasted_spend(snapshots, self.config.wasted_spend_roas_threshold)
    }

    /// Run a full pass through the collaborator ports. A failure on one
    /// rule is logged and counted; it never aborts the pass.
    pub fn run_cycle(
        &self,
        rules: &dyn RuleRepository,
        metrics: &dyn MetricsSource,
        budgets: &dyn BudgetSource,
        executor: &dyn ActionExecutor,
        now: DateTime<Utc>,
    ) -> CampaignResult<CycleReport> {
        let enabled = rules.find_enabled(None)?;
        let mut report = CycleReport::default();

        for rule in &enabled {
            report.evaluated += 1;

            let snapshot = match metrics.latest_snapshot(rule.campaign_id()) {
                Ok(Some(s)) => s,
                Ok(None) => {
                    report.missing_metrics += 1;
                    continue;
                }
                Err(e) => {
                    warn!(rule_id = %rule.id(), error = %e, "Failed to load metrics");
                    report.failed += 1;
                    continue;
                }
            };
            let budget = budgets.daily_budget(rule.campaign_id()).unwrap_or_else(|e| {
                warn!(campaign_id = %rule.campaign_id(), error = %e, "Failed to load daily budget, pacing disabled");
                None
            });

            let decision = match self.evaluate_rule(rule, &snapshot, budget, now) {
                RuleOutcome::Triggered(d) => d,
                RuleOutcome::CoolingDown { .. } => {
                    report.cooling_down += 1;
                    continue;
                }
                RuleOutcome::ConditionsNotMet | RuleOutcome::Disabled => {
                    report.conditions_not_met += 1;
                    continue;
                }
            };

            match rules.save(&decision.updated_rule, Some(rule)) {
                Ok(()) => {}
                Err(CampaignError::Conflict(msg)) => {
                    warn!(rule_id = %rule.id(), %msg, "Rule changed during evaluation");
                    report.conflicts += 1;
                    continue;
                }
                Err(e) => {
                    warn!(rule_id = %rule.id(), error = %e, "Failed to persist rule");
                    report.failed += 1;
                    continue;
                }
            }

            if let Err(e) = executor.execute(rule, &decision.actions) {
                warn!(rule_id = %rule.id(), error = %e, "Action execution failed");
                report.failed += 1;
                // Release the claim so the next pass retries.
                if let Err(e) = rules.save(rule, Some(&decision.updated_rule)) {
                    warn!(rule_id = %rule.id(), error = %e, "Failed to restore rule after execution failure");
                }
                continue;
            }

            info!(
                rule_id = %rule.id(),
                rule = %rule.describe(),
                trigger_count = decision.updated_rule.trigger_count(),
                "Rule trigger recorded"
            );
            report.triggered += 1;
            report.decisions.push(*decision);
        }

        info!(
            evaluated = report.evaluated,
            triggered = report.triggered,
            cooling_down = report.cooling_down,
            failed = report.failed,
            "Optimization cycle complete"
        );
        Ok(report)
    }
}

impl Default for OptimizationEngine {
    fn default() -> Self {
        Self::new(OptimizerConfig::default())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::condition::{Condition, Metric, Operator};
    use crate::rule::{ecommerce_presets, NewRule, RuleType};
    use chrono::{Duration, NaiveDate};

    fn snapshot(campaign_id: Uuid, conversions: i64, spend: i64, revenue: i64) -> MetricSnapshot {
        MetricSnapshot::new(
            campaign_id,
            100_000,
            1_000,
            conversions,
            Money::of(spend).unwrap(),
            Money::of(revenue).unwrap(),
            NaiveDate::from_ymd_opt(2024, 6, 1).unwrap(),
        )
        .unwrap()
    }

    #[test]
    fn test_evaluate_rule_outcomes() {
        let engine = OptimizationEngine::default();
        let now = Utc::now();
        let cid = Uuid::new_v4();
        let roas_rule = ecommerce_presets(cid, Uuid::new_v4()).remove(1);
        let losing = snapshot(cid, 10, 100_000, 50_000);
        let winning = snapshot(cid, 10, 100_000, 300_000);

        assert!(matches!(
            engine.evaluate_rule(&roas_rule, &winning, None, now),
            RuleOutcome::ConditionsNotMet
        ));
        assert!(matches!(
            engine.evaluate_rule(&roas_rule.disable(), &losing, None, now),
            RuleOutcome::Disabled
        ));

        let RuleOutcome::Triggered(decision) = engine.evaluate_rule(&roas_rule, &losing, None, now)
        else {
            panic!("expected trigger");
        };
        assert_eq!(decision.projected_savings.amount(), 30_000);
        assert_eq!(decision.projected_monthly_savings.amount(), 900_000);
        assert_eq!(decision.updated_rule.trigger_count(), 1);

        match engine.evaluate_rule(&decision.updated_rule, &losing, None, now) {
            RuleOutcome::CoolingDown { until } => assert_eq!(until, now + Duration::minutes(60)),
            other => panic!("expected cooldown, got {other:?}"),
        }
    }

    #[test]
    fn test_evaluate_rule_with_unbounded_cooldown() {
        let engine = OptimizationEngine::default();
        let cid = Uuid::new_v4();
        let mut json = serde_json::to_value(ecommerce_presets(cid, Uuid::new_v4()).remove(1)).unwrap();
        json["cooldown_minutes"] = serde_json::json!(u32::MAX);
        json["last_triggered_at"] = serde_json::to_value(DateTime::<Utc>::MAX_UTC).unwrap();
        let rule: Rule = serde_json::from_value(json).unwrap();

        let losing = snapshot(cid, 10, 100_000, 50_000);
        match engine.evaluate_rule(&rule, &losing, None, Utc::now()) {
            RuleOutcome::CoolingDown { until } => assert_eq!(until, DateTime::<Utc>::MAX_UTC),
            other => panic!("expected cooldown, got {other:?}"),
        }
    }

    #[test]
    fn test_decide_skips_campaigns_without_snapshot() {
        let engine = OptimizationEngine::default();
        let with_data = Uuid::new_v4();
        let without_data = Uuid::new_v4();
        let mut rules = ecommerce_presets(with_data, Uuid::new_v4());
        rules.extend(ecommerce_presets(without_data, Uuid::new_v4()));

        // CPA 100_000 / 5 = 20_000 and ROAS 0.5: pause and budget cut fire.
        let snapshots = HashMap::from([(with_data, snapshot(with_data, 5, 100_000, 50_000))]);
        let decisions = engine.decide(&rules, &snapshots, &HashMap::new(), Utc::now());

        assert_eq!(decisions.len(), 2);
        assert!(decisions.iter().all(|d| d.campaign_id == with_data));
    }

    #[test]
    fn test_decide_uses_budget_for_pacing() {
        let engine = OptimizationEngine::default();
        let cid = Uuid::new_v4();
        let pace_rule = Rule::create(NewRule {
            campaign_id: cid,
            user_id: Uuid::new_v4(),
            name: "pace".to_string(),
            rule_type: RuleType::BudgetPace,
            conditions: vec![Condition::new(Metric::SpendPace, Operator::Gt, 120.0)],
            actions: vec![crate::action::Action::alert_in_app()],
            cooldown_minutes: Some(30),
        })
        .unwrap();
        let snapshots = HashMap::from([(cid, snapshot(cid, 10, 13_000, 50_000))]);

        let without = engine.decide(&[pace_rule.clone()], &snapshots, &HashMap::new(), Utc::now());
        assert!(without.is_empty());

        let budgets = HashMap::from([(cid, Money::of(10_000).unwrap())]);
        let with = engine.decide(&[pace_rule], &snapshots, &budgets, Utc::now());
        assert_eq!(with.len(), 1);
        assert!(with[0].projected_savings.is_zero());
    }

    #[test]
    fn test_wasted_spend_uses_configured_threshold() {
        let engine = OptimizationEngine::new(OptimizerConfig {
            wasted_spend_roas_threshold: 2.0,
            ..OptimizerConfig::default()
        });
        let cid = Uuid::new_v4();
        let snapshots = vec![
            snapshot(cid, 1, 1_000, 1_500),
            snapshot(cid, 1, 1_000, 2_500),
        ];
        assert_eq!(engine.wasted_spend(&snapshots).amount(), 1_000);
    }
}
