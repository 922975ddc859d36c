use serde::Deserialize;

use crate::error::{CampaignError, CampaignResult};

/// Root application configuration. Loaded from environment variables
/// with the prefix `CAMPAIGN_OPTIMIZER__`.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_node_id")]
    pub node_id: String,
    #[serde(default)]
    pub optimizer: OptimizerConfig,
    #[serde(default)]
    pub presets: PresetConfig,
}

/// Tunables for rule evaluation and savings projection.
#[derive(Debug, Clone, Deserialize)]
pub struct OptimizerConfig {
    #[serde(default = "default_wasted_spend_roas_threshold")]
    pub wasted_spend_roas_threshold: f64,
    /// Upper bound applied to budget-change percentages when projecting savings.
    #[serde(default = "default_max_budget_change_percent")]
    pub max_budget_change_percent: f64,
}

/// Thresholds for the canned e-commerce rule set.
#[derive(Debug, Clone, Deserialize)]
pub struct PresetConfig {
    #[serde(default = "default_max_cpa")]
    pub max_cpa: f64,
    #[serde(default = "default_min_roas")]
    pub min_roas: f64,
    #[serde(default = "default_roas_budget_cut_percent")]
    pub roas_budget_cut_percent: f64,
    #[serde(default = "default_max_spend_pace_percent")]
    pub max_spend_pace_percent: f64,
    #[serde(default = "default_cooldown_minutes")]
    pub cooldown_minutes: u32,
}

// Default functions
fn default_node_id() -> String {
    "node-01".to_string()
}
fn default_cooldown_minutes() -> u32 {
    60
}
fn default_wasted_spend_roas_threshold() -> f64 {
    1.0
}
fn default_max_budget_change_percent() -> f64 {
    100.0
}
fn default_max_cpa() -> f64 {
    15_000.0
}
fn default_min_roas() -> f64 {
    1.0
}
fn default_roas_budget_cut_percent() -> f64 {
    30.0
}
fn default_max_spend_pace_percent() -> f64 {
    120.0
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self {
            wasted_spend_roas_threshold: default_wasted_spend_roas_threshold(),
            max_budget_change_percent: default_max_budget_change_percent(),
        }
    }
}

impl Default for PresetConfig {
    fn default() -> Self {
        Self {
            max_cpa: default_max_cpa(),
            min_roas: default_min_roas(),
            roas_budget_cut_percent: default_roas_budget_cut_percent(),
            max_spend_pace_percent: default_max_spend_pace_percent(),
            cooldown_minutes: default_cooldown_minutes(),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            node_id: default_node_id(),
            optimizer: OptimizerConfig::default(),
            presets: PresetConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load configuration from environment variables.
    pub fn load() -> Result<Self, config::ConfigError> {
        let builder = config::Config::builder().add_source(
            config::Environment::with_prefix("CAMPAIGN_OPTIMIZER")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder.build()?;
        config.try_deserialize()
    }

    /// Load from a TOML file layered under the environment.
    pub fn load_from(path: &str) -> Result<Self, config::ConfigError> {
        let builder = config::Config::builder()
            .add_source(config::File::with_name(path).required(false))
            .add_source(
                config::Environment::with_prefix("CAMPAIGN_OPTIMIZER")
                    .separator("__")
                    .try_parsing(true),
            );

        builder.build()?.try_deserialize()
    }

    /// Load (from `path` when given) and validate.
    pub fn load_validated(path: Option<&str>) -> CampaignResult<Self> {
        let config = match path {
            Some(p) => Self::load_from(p)?,
            None => Self::load()?,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> CampaignResult<()> {
        let pct = self.optimizer.max_budget_change_percent;
        if !(0.0..=100.0).contains(&pct) {
            return Err(CampaignError::Config(format!(
                "optimizer.max_budget_change_percent must be within 0..=100, got {pct}"
            )));
        }
        if !self.optimizer.wasted_spend_roas_threshold.is_finite()
            || self.optimizer.wasted_spend_roas_threshold < 0.0
        {
            return Err(CampaignError::Config(
                "optimizer.wasted_spend_roas_threshold must be a non-negative number".to_string(),
            ));
        }
        if !(0.0..=100.0).contains(&self.presets.roas_budget_cut_percent) {
            return Err(CampaignError::Config(format!(
                "presets.roas_budget_cut_percent must be within 0..=100, got {}",
                self.presets.roas_budget_cut_percent
            )));
        }
        for (name, value) in [
            ("presets.max_cpa", self.presets.max_cpa),
            ("presets.min_roas", self.presets.min_roas),
            ("presets.max_spend_pace_percent", self.presets.max_spend_pace_percent),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(CampaignError::Config(format!(
                    "{name} must be a non-negative number, got {value}"
                )));
            }
        }
        Ok(())
    }
}
