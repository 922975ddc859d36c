//! Campaign Autopilot: command-line front end for the optimization rules.
//!
//! Prints the preset rule set, or runs one decision pass over rules and
//! snapshots read from JSON files. Decisions go to stdout as JSON; logs go
//! to stderr.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use anyhow::Context;
use campaign_core::config::AppConfig;
use campaign_core::Money;
use campaign_optimizer::{ecommerce_presets_with, MetricSnapshot, OptimizationEngine, Rule};
use chrono::Utc;
use clap::{Parser, Subcommand};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

#[derive(Parser, Debug)]
#[command(name = "campaign-autopilot")]
#[command(about = "Automated campaign optimization rules")]
#[command(version)]
struct Cli {
    /// Optional TOML config file (environment variables still apply)
    #[arg(long, env = "CAMPAIGN_OPTIMIZER_CONFIG")]
    config: Option<String>,

    /// Node identifier (overrides config)
    #[arg(long, env = "CAMPAIGN_OPTIMIZER__NODE_ID")]
    node_id: Option<String>,

    /// Preset rule cooldown in minutes (overrides config)
    #[arg(long)]
    cooldown_minutes: Option<u32>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the e-commerce preset rules for a campaign
    Presets {
        #[arg(long)]
        campaign_id: Uuid,
        #[arg(long)]
        user_id: Uuid,
    },
    /// Evaluate rules against the latest snapshots and print decisions
    Evaluate {
        /// JSON array of rules
        #[arg(long)]
        rules: PathBuf,
        /// JSON array of metric snapshots; the newest per campaign is used
        #[arg(long)]
        snapshots: PathBuf,
        /// JSON object mapping campaign id to daily budget
        #[arg(long)]
        budgets: Option<PathBuf>,
    },
}

#[derive(Serialize)]
struct EvaluationOutput {
    evaluated_at: chrono::DateTime<Utc>,
    node_id: String,
    wasted_spend: Money,
    decisions: Vec<campaign_optimizer::TriggerDecision>,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "campaign_autopilot=info,campaign_optimizer=info".into()),
        )
        .with_writer(std::io::stderr)
        .json()
        .init();

    let cli = Cli::parse();

    let mut config = AppConfig::load_validated(cli.config.as_deref()).unwrap_or_else(|e| {
        warn!(error = %e, "Failed to load config, using defaults");
        AppConfig::default()
    });

    if let Some(node_id) = cli.node_id {
        config.node_id = node_id;
    }
    if let Some(minutes) = cli.cooldown_minutes {
        config.presets.cooldown_minutes = minutes;
    }

    info!(
        node_id = %config.node_id,
        cooldown_minutes = config.presets.cooldown_minutes,
        "Configuration loaded"
    );

    match cli.command {
        Command::Presets {
            campaign_id,
            user_id,
        } => {
            let presets = ecommerce_presets_with(&config.presets, campaign_id, user_id);
            println!("{}", serde_json::to_string_pretty(&presets)?);
        }
        Command::Evaluate {
            rules,
            snapshots,
            budgets,
        } => {
            let rules: Vec<Rule> = read_json(&rules)?;
            let snapshots: Vec<MetricSnapshot> = read_json(&snapshots)?;
            let budgets: HashMap<Uuid, Money> = match budgets {
                Some(path) => read_json(&path)?,
                None => HashMap::new(),
            };

            let engine = OptimizationEngine::new(config.optimizer.clone());
            let now = Utc::now();
            let decisions = engine.decide(&rules, &latest_per_campaign(&snapshots), &budgets, now);
            info!(
                rules = rules.len(),
                triggered = decisions.len(),
                "Evaluation complete"
            );

            let output = EvaluationOutput {
                evaluated_at: now,
                node_id: config.node_id.clone(),
                wasted_spend: engine.wasted_spend(&snapshots),
                decisions,
            };
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
    }

    Ok(())
}

fn read_json<T: DeserializeOwned>(path: &Path) -> anyhow::Result<T> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("parsing {}", path.display()))
}

/// Newest snapshot (by date, then creation time) for each campaign.
fn latest_per_campaign(snapshots: &[MetricSnapshot]) -> HashMap<Uuid, MetricSnapshot> {
    let mut latest: HashMap<Uuid, MetricSnapshot> = HashMap::new();
    for s in snapshots {
        let newer = latest
            .get(&s.campaign_id())
            .map_or(true, |cur| (s.date(), s.created_at()) > (cur.date(), cur.created_at()));
        if newer {
            latest.insert(s.campaign_id(), s.clone());
        }
    }
    latest
}
