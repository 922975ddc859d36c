//! Actions a triggered rule asks the executor to take. Pure data.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Where an alert-only action is delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationChannel {
    InApp,
    Email,
    Slack,
}

#[allow(clippy::derivable_impls)]
impl Default for NotificationChannel {
    fn default() -> Self {
        Self::InApp
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Action {
    PauseCampaign,
    /// Cut the daily budget by `percentage` percent.
    ReduceBudget { percentage: f64 },
    /// Raise the daily budget by `percentage` percent.
    IncreaseBudget { percentage: f64 },
    AlertOnly {
        #[serde(default)]
        channel: NotificationChannel,
    },
}

impl Action {
    pub fn pause() -> Self {
        Action::PauseCampaign
    }

    pub fn reduce_budget(percentage: f64) -> Self {
        Action::ReduceBudget { percentage }
    }

    pub fn increase_budget(percentage: f64) -> Self {
        Action::IncreaseBudget { percentage }
    }

    pub fn alert_only(channel: NotificationChannel) -> Self {
        Action::AlertOnly { channel }
    }

    pub fn alert_in_app() -> Self {
        Self::alert_only(NotificationChannel::default())
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::PauseCampaign => write!(f, "pause campaign"),
            Action::ReduceBudget { percentage } => write!(f, "reduce budget by {percentage}%"),
            Action::IncreaseBudget { percentage } => {
                write!(f, "increase budget by {percentage}%")
            }
            Action::AlertOnly { channel } => write!(f, "alert via {channel:?}"),
        }
    }
}
