pub mod config;
pub mod error;
pub mod types;

pub use crate::config::AppConfig;
pub use crate::error::{CampaignError, CampaignResult};
pub use crate::types::{Currency, Money};
