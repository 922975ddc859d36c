//! Rule conditions: a single `metric operator threshold` comparison.

use std::fmt;

use campaign_core::Money;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::kpi::MetricSnapshot;

/// Metric a condition inspects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    Cpa,
    Roas,
    Ctr,
    Cpc,
    Cvr,
    /// Spend as a percentage of the caller-supplied daily budget.
    SpendPace,
}

/// Comparison operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operator {
    Gt,
    Lt,
    Gte,
    Lte,
}

impl Operator {
    pub fn apply(&self, value: f64, threshold: f64) -> bool {
        match self {
            Operator::Gt => value > threshold,
            Operator::Lt => value < threshold,
            Operator::Gte => value >= threshold,
            Operator::Lte => value <= threshold,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Condition {
    pub metric: Metric,
    pub operator: Operator,
    pub threshold: f64,
}

impl Condition {
    pub fn new(metric: Metric, operator: Operator, threshold: f64) -> Self {
        Self {
            metric,
            operator,
            threshold,
        }
    }

    /// Test the condition against a snapshot. `daily_budget` is only read by
    /// spend-pace conditions; without it, or in another currency than the
    /// spend, the pace is 0.
    pub fn evaluate(&self, snapshot: &MetricSnapshot, daily_budget: Option<Money>) -> bool {
        let value = self.metric.extract(snapshot, daily_budget);
        self.operator.apply(value, self.threshold)
    }
}

impl Metric {
    /// Read this metric from a snapshot. Never NaN or infinite.
    pub fn extract(&self, snapshot: &MetricSnapshot, daily_budget: Option<Money>) -> f64 {
        match self {
            Metric::Cpa => snapshot.cpa().as_f64(),
            Metric::Roas => snapshot.roas(),
            Metric::Ctr => snapshot.ctr(),
            Metric::Cpc => snapshot.cpc().as_f64(),
            Metric::Cvr => snapshot.cvr(),
            Metric::SpendPace => match daily_budget {
                Some(budget) if budget.currency() != snapshot.spend().currency() => {
                    warn!(
                        campaign_id = %snapshot.campaign_id(),
                        spend_currency = %snapshot.spend().currency(),
                        budget_currency = %budget.currency(),
                        "Daily budget currency differs from spend, pacing disabled"
                    );
                    0.0
                }
                Some(budget) if !budget.is_zero() => {
                    snapshot.spend().as_f64() / budget.as_f64() * 100.0
                }
                _ => 0.0,
            },
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Metric::Cpa => write!(f, "CPA"),
            Metric::Roas => write!(f, "ROAS"),
            Metric::Ctr => write!(f, "CTR"),
            Metric::Cpc => write!(f, "CPC"),
            Metric::Cvr => write!(f, "CVR"),
            Metric::SpendPace => write!(f, "spend pace"),
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operator::Gt => write!(f, ">"),
            Operator::Lt => write!(f, "<"),
            Operator::Gte => write!(f, ">="),
            Operator::Lte => write!(f, "<="),
        }
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.metric, self.operator, self.threshold)
    }
}
