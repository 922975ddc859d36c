//! Optimization rules: ANDed conditions, the actions to take when they all
//! hold, and a per-rule cooldown that keeps a rule from re-firing on every
//! evaluation pass.
//!
//! A `Rule` never performs its actions. It answers two questions,
//! "do the conditions hold?" and "has the cooldown elapsed?", and the
//! caller acts on the answer. Every mutator returns a new instance.

use campaign_core::config::PresetConfig;
use campaign_core::{CampaignError, CampaignResult, Money};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::action::Action;
use crate::condition::{Condition, Metric, Operator};
use crate::kpi::MetricSnapshot;

pub const DEFAULT_COOLDOWN_MINUTES: u32 = 60;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Informational classification shown to users. Does not affect evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RuleType {
    CpaThreshold,
    RoasFloor,
    BudgetPace,
    CreativeFatigue,
}

/// Input for authoring a rule.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewRule {
    pub campaign_id: Uuid,
    pub user_id: Uuid,
    pub name: String,
    pub rule_type: RuleType,
    pub conditions: Vec<Condition>,
    pub actions: Vec<Action>,
    #[serde(default)]
    pub cooldown_minutes: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rule {
    id: Uuid,
    campaign_id: Uuid,
    user_id: Uuid,
    name: String,
    rule_type: RuleType,
    conditions: Vec<Condition>,
    actions: Vec<Action>,
    #[serde(rename = "is_enabled")]
    enabled: bool,
    last_triggered_at: Option<DateTime<Utc>>,
    trigger_count: u64,
    cooldown_minutes: u32,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Rule
// ---------------------------------------------------------------------------

impl Rule {
    /// Author a new, enabled rule that has never triggered.
    pub fn create(new: NewRule) -> CampaignResult<Self> {
        if new.name.trim().is_empty() {
            return Err(CampaignError::Validation(
                "Rule name must not be empty".to_string(),
            ));
        }
        if new.actions.is_empty() {
            return Err(CampaignError::Validation(format!(
                "Rule '{}' must have at least one action",
                new.name
            )));
        }

        Ok(Self::from_draft(new, Utc::now()))
    }

    fn from_draft(new: NewRule, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            campaign_id: new.campaign_id,
            user_id: new.user_id,
            name: new.name,
            rule_type: new.rule_type,
            conditions: new.conditions,
            actions: new.actions,
            enabled: true,
            last_triggered_at: None,
            trigger_count: 0,
            cooldown_minutes: new.cooldown_minutes.unwrap_or(DEFAULT_COOLDOWN_MINUTES),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn campaign_id(&self) -> Uuid {
        self.campaign_id
    }

    pub fn user_id(&self) -> Uuid {
        self.user_id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn rule_type(&self) -> RuleType {
        self.rule_type
    }

    pub fn conditions(&self) -> &[Condition] {
        &self.conditions
    }

    pub fn actions(&self) -> &[Action] {
        &self.actions
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn last_triggered_at(&self) -> Option<DateTime<Utc>> {
        self.last_triggered_at
    }

    pub fn trigger_count(&self) -> u64 {
        self.trigger_count
    }

    pub fn cooldown_minutes(&self) -> u32 {
        self.cooldown_minutes
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    // -- decision predicates -------------------------------------------------

    /// True when every condition holds. A rule without conditions holds
    /// vacuously.
    pub fn evaluate(&self, snapshot: &MetricSnapshot, daily_budget: Option<Money>) -> bool {
        self.conditions
            .iter()
            .all(|c| c.evaluate(snapshot, daily_budget))
    }

    /// Whether the cooldown has elapsed as of the wall clock.
    pub fn can_trigger(&self) -> bool {
        self.can_trigger_at(Utc::now())
    }

    /// Whether the cooldown has elapsed as of `now`.
    pub fn can_trigger_at(&self, now: DateTime<Utc>) -> bool {
        self.cooldown_ends_at(now).is_none()
    }

    /// When the rule may next trigger, if it is still cooling down at `now`.
    /// A cooldown running past the representable range never ends.
    pub fn cooldown_ends_at(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let last = self.last_triggered_at?;
        let ends = last
            .checked_add_signed(self.cooldown())
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        (ends > now).then_some(ends)
    }

    /// Enabled, conditions hold and the cooldown has elapsed.
    pub fn should_trigger_at(
        &self,
        snapshot: &MetricSnapshot,
        daily_budget: Option<Money>,
        now: DateTime<Utc>,
    ) -> bool {
        self.enabled && self.evaluate(snapshot, daily_budget) && self.can_trigger_at(now)
    }

    fn cooldown(&self) -> Duration {
        Duration::minutes(i64::from(self.cooldown_minutes))
    }

    // -- transitions ---------------------------------------------------------

    /// Record that the rule's actions were applied, starting the cooldown.
    pub fn record_trigger(&self) -> Self {
        self.record_trigger_at(Utc::now())
    }

    /// Record a trigger at `now`. The last-triggered timestamp never moves
    /// backwards.
    pub fn record_trigger_at(&self, now: DateTime<Utc>) -> Self {
        let last = match self.last_triggered_at {
            Some(prev) if prev > now => prev,
            _ => now,
        };
        Self {
            last_triggered_at: Some(last),
            trigger_count: self.trigger_count.saturating_add(1),
            updated_at: self.updated_at.max(now),
            ..self.clone()
        }
    }

    pub fn enable(&self) -> Self {
        self.with_enabled(true)
    }

    /// Disable the rule. Cooldown and trigger history are kept.
    pub fn disable(&self) -> Self {
        self.with_enabled(false)
    }

    fn with_enabled(&self, enabled: bool) -> Self {
        Self {
            enabled,
            updated_at: Utc::now(),
            ..self.clone()
        }
    }

    /// Replace the whole condition list.
    pub fn update_conditions(&self, conditions: Vec<Condition>) -> Self {
        Self {
            conditions,
            updated_at: Utc::now(),
            ..self.clone()
        }
    }

    /// Replace the whole action list.
    pub fn update_actions(&self, actions: Vec<Action>) -> Self {
        Self {
            actions,
            updated_at: Utc::now(),
            ..self.clone()
        }
    }

    /// Human-readable summary for logs and alert messages.
    pub fn describe(&self) -> String {
        let conditions = self
            .conditions
            .iter()
            .map(|c| c.to_string())
            .collect::<Vec<_>>()
            .join(" AND ");
        let actions = self
            .actions
            .iter()
            .map(|a| a.to_string())
            .collect::<Vec<_>>()
            .join(", ");
        format!("{}: when {} then {}", self.name, conditions, actions)
    }
}

// ---------------------------------------------------------------------------
// Presets
// ---------------------------------------------------------------------------

/// The canned e-commerce rule set with default thresholds.
pub fn ecommerce_presets(campaign_id: Uuid, user_id: Uuid) -> Vec<Rule> {
    ecommerce_presets_with(&PresetConfig::default(), campaign_id, user_id)
}

/// The canned e-commerce rule set: pause on high CPA, cut budget on low
/// ROAS, alert on overspend pace.
pub fn ecommerce_presets_with(config: &PresetConfig, campaign_id: Uuid, user_id: Uuid) -> Vec<Rule> {
    let now = Utc::now();
    let drafts = vec![
        NewRule {
            campaign_id,
            user_id,
            name: "Pause on high CPA".to_string(),
            rule_type: RuleType::CpaThreshold,
            conditions: vec![Condition::new(Metric::Cpa, Operator::Gt, config.max_cpa)],
            actions: vec![Action::pause()],
            cooldown_minutes: Some(config.cooldown_minutes),
        },
        NewRule {
            campaign_id,
            user_id,
            name: "Cut budget on low ROAS".to_string(),
            rule_type: RuleType::RoasFloor,
            conditions: vec![Condition::new(Metric::Roas, Operator::Lt, config.min_roas)],
            actions: vec![Action::reduce_budget(config.roas_budget_cut_percent)],
            cooldown_minutes: Some(config.cooldown_minutes),
        },
        NewRule {
            campaign_id,
            user_id,
            name: "Alert on overspend pace".to_string(),
            rule_type: RuleType::BudgetPace,
            conditions: vec![Condition::new(
                Metric::SpendPace,
                Operator::Gt,
                config.max_spend_pace_percent,
            )],
            actions: vec![Action::alert_in_app()],
            cooldown_minutes: Some(config.cooldown_minutes),
        },
    ];

    drafts
        .into_iter()
        .map(|d| Rule::from_draft(d, now))
        .collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn snapshot(conversions: i64, spend: i64, revenue: i64) -> MetricSnapshot {
        MetricSnapshot::new(
            Uuid::new_v4(),
            10_000,
            200,
            conversions,
            Money::of(spend).unwrap(),
            Money::of(revenue).unwrap(),
            NaiveDate::from_ymd_opt(2024, 6, 1).unwrap(),
        )
        .unwrap()
    }

    fn rule(conditions: Vec<Condition>) -> Rule {
        Rule::create(NewRule {
            campaign_id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            name: "test rule".to_string(),
            rule_type: RuleType::CpaThreshold,
            conditions,
            actions: vec![Action::pause()],
            cooldown_minutes: None,
        })
        .unwrap()
    }

    // 1. Creation -----------------------------------------------------------

    #[test]
    fn test_create_defaults() {
        let r = rule(vec![]);
        assert!(r.is_enabled());
        assert_eq!(r.trigger_count(), 0);
        assert_eq!(r.cooldown_minutes(), 60);
        assert!(r.last_triggered_at().is_none());
    }

    #[test]
    fn test_create_validation() {
        let base = NewRule {
            campaign_id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            name: "  ".to_string(),
            rule_type: RuleType::RoasFloor,
            conditions: vec![],
            actions: vec![Action::pause()],
            cooldown_minutes: None,
        };
        assert!(Rule::create(base.clone()).is_err());

        let no_actions = NewRule {
            name: "ok".to_string(),
            actions: vec![],
            ..base
        };
        assert!(Rule::create(no_actions).is_err());
    }

    // 2. Evaluation ---------------------------------------------------------

    #[test]
    fn test_and_semantics() {
        // CPA = 100_000 / 5 = 20_000, ROAS = 0.5
        let s = snapshot(5, 100_000, 50_000);
        let cpa_high = Condition::new(Metric::Cpa, Operator::Gt, 15_000.0);
        let roas_low = Condition::new(Metric::Roas, Operator::Lt, 1.0);
        let roas_very_low = Condition::new(Metric::Roas, Operator::Lt, 0.1);

        assert!(rule(vec![cpa_high, roas_low]).evaluate(&s, None));
        assert!(!rule(vec![cpa_high, roas_very_low]).evaluate(&s, None));
        assert!(!rule(vec![roas_very_low, cpa_high]).evaluate(&s, None));
    }

    #[test]
    fn test_empty_conditions_hold() {
        let s = snapshot(0, 0, 0);
        assert!(rule(vec![]).evaluate(&s, None));
    }

    #[test]
    fn test_evaluate_is_idempotent() {
        let s = snapshot(5, 100_000, 50_000);
        let r = rule(vec![Condition::new(Metric::Roas, Operator::Lt, 1.0)]);
        let before = r.clone();
        for _ in 0..5 {
            assert!(r.evaluate(&s, None));
        }
        assert_eq!(r, before);
        assert!(r.can_trigger());
    }

    // 3. Cooldown -----------------------------------------------------------

    #[test]
    fn test_cooldown_law() {
        let now = Utc::now();
        let r = rule(vec![]);
        assert!(r.can_trigger_at(now));

        let triggered = r.record_trigger_at(now);
        assert_eq!(triggered.trigger_count(), 1);
        assert!(!triggered.can_trigger_at(now));
        assert!(!triggered.can_trigger_at(now + Duration::minutes(59)));
        assert!(triggered.can_trigger_at(now + Duration::minutes(60)));
    }

    #[test]
    fn test_record_trigger_wall_clock() {
        let r = rule(vec![]);
        assert!(r.can_trigger());
        let triggered = r.record_trigger();
        assert_eq!(triggered.trigger_count(), 1);
        assert!(!triggered.can_trigger());
        // The original is untouched.
        assert_eq!(r.trigger_count(), 0);
    }

    #[test]
    fn test_last_triggered_never_moves_backwards() {
        let now = Utc::now();
        let r = rule(vec![]).record_trigger_at(now);
        let earlier = r.record_trigger_at(now - Duration::minutes(5));
        assert_eq!(earlier.last_triggered_at(), Some(now));
        assert_eq!(earlier.trigger_count(), 2);
    }

    #[test]
    fn test_cooldown_ends_at() {
        let now = Utc::now();
        let r = rule(vec![]);
        assert!(r.cooldown_ends_at(now).is_none());
        let triggered = r.record_trigger_at(now);
        assert_eq!(
            triggered.cooldown_ends_at(now),
            Some(now + Duration::minutes(60))
        );
        assert!(triggered
            .cooldown_ends_at(now + Duration::minutes(61))
            .is_none());
    }

    #[test]
    fn test_cooldown_past_calendar_range_never_ends() {
        let far_future = Rule {
            last_triggered_at: Some(DateTime::<Utc>::MAX_UTC - Duration::days(1)),
            cooldown_minutes: u32::MAX,
            ..rule(vec![])
        };
        let now = Utc::now();
        assert!(!far_future.can_trigger_at(now));
        assert_eq!(far_future.cooldown_ends_at(now), Some(DateTime::<Utc>::MAX_UTC));
    }

    // 4. Transitions --------------------------------------------------------

    #[test]
    fn test_disable_keeps_history() {
        let now = Utc::now();
        let r = rule(vec![]).record_trigger_at(now);
        let disabled = r.disable();
        assert!(!disabled.is_enabled());
        assert_eq!(disabled.trigger_count(), 1);
        assert_eq!(disabled.last_triggered_at(), Some(now));
        assert!(disabled.enable().is_enabled());
    }

    #[test]
    fn test_should_trigger_requires_all_three() {
        let now = Utc::now();
        let s = snapshot(5, 100_000, 50_000);
        let r = rule(vec![Condition::new(Metric::Roas, Operator::Lt, 1.0)]);

        assert!(r.should_trigger_at(&s, None, now));
        assert!(!r.disable().should_trigger_at(&s, None, now));
        assert!(!r.record_trigger_at(now).should_trigger_at(&s, None, now));
        let healthy = snapshot(5, 100_000, 500_000);
        assert!(!r.should_trigger_at(&healthy, None, now));
    }

    #[test]
    fn test_update_replaces_lists() {
        let r = rule(vec![Condition::new(Metric::Roas, Operator::Lt, 1.0)]);
        let updated = r
            .update_conditions(vec![Condition::new(Metric::Ctr, Operator::Lt, 0.5)])
            .update_actions(vec![Action::alert_in_app(), Action::reduce_budget(10.0)]);

        assert_eq!(updated.conditions().len(), 1);
        assert_eq!(updated.conditions()[0].metric, Metric::Ctr);
        assert_eq!(updated.actions().len(), 2);
        assert_eq!(updated.id(), r.id());
        assert!(updated.updated_at() >= r.updated_at());
    }

    // 5. Presets ------------------------------------------------------------

    #[test]
    fn test_ecommerce_presets() {
        let cid = Uuid::new_v4();
        let uid = Uuid::new_v4();
        let presets = ecommerce_presets(cid, uid);

        assert_eq!(presets.len(), 3);
        for r in &presets {
            assert!(r.is_enabled());
            assert_eq!(r.cooldown_minutes(), 60);
            assert_eq!(r.trigger_count(), 0);
            assert_eq!(r.campaign_id(), cid);
            assert_eq!(r.user_id(), uid);
        }
        assert_eq!(presets[0].actions(), &[Action::pause()]);
        assert_eq!(presets[1].actions(), &[Action::reduce_budget(30.0)]);
        assert_eq!(presets[2].actions(), &[Action::alert_in_app()]);
        assert_eq!(presets[2].conditions()[0].metric, Metric::SpendPace);
    }

    #[test]
    fn test_serialized_field_names() {
        let r = rule(vec![]);
        let json = serde_json::to_value(&r).unwrap();
        for field in [
            "id",
            "campaign_id",
            "user_id",
            "name",
            "rule_type",
            "conditions",
            "actions",
            "is_enabled",
            "last_triggered_at",
            "trigger_count",
            "cooldown_minutes",
            "created_at",
            "updated_at",
        ] {
            assert!(json.get(field).is_some(), "missing field {field}");
        }
        let back: Rule = serde_json::from_value(json).unwrap();
        assert_eq!(back, r);
    }

    #[test]
    fn test_describe() {
        let r = rule(vec![Condition::new(Metric::Roas, Operator::Lt, 1.0)]);
        assert_eq!(r.describe(), "test rule: when ROAS < 1 then pause campaign");
    }
}
