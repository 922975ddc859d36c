//! Automated campaign optimization: KPI snapshots, threshold conditions,
//! rules with cooldowns, and savings projection. Decides which campaigns
//! to pause, cut or flag; execution is left to the caller.

pub mod action;
pub mod condition;
pub mod engine;
pub mod kpi;
pub mod ports;
pub mod rule;
pub mod savings;
pub mod store;

pub use action::{Action, NotificationChannel};
pub use condition::{Condition, Metric, Operator};
pub use engine::{CycleReport, OptimizationEngine, RuleOutcome, TriggerDecision};
pub use kpi::{KpiComparison, MetricSnapshot};
pub use rule::{ecommerce_presets, ecommerce_presets_with, NewRule, Rule, RuleType};
pub use savings::SavingsProjector;
pub use store::InMemoryRuleStore;
