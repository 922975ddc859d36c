//! Shared value types: monetary amounts and currencies.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{CampaignError, CampaignResult};

/// ISO-4217 currency of a monetary amount.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Currency {
    Jpy,
    Usd,
    Eur,
}

#[allow(clippy::derivable_impls)]
impl Default for Currency {
    fn default() -> Self {
        Self::Jpy
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Currency::Jpy => write!(f, "JPY"),
            Currency::Usd => write!(f, "USD"),
            Currency::Eur => write!(f, "EUR"),
        }
    }
}

/// A non-negative amount of money in the currency's minor unit
/// (yen for JPY, cents for USD/EUR).
///
/// Arithmetic saturates instead of overflowing so that metric and savings
/// computations never fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "RawMoney")]
pub struct Money {
    amount: i64,
    currency: Currency,
}

#[derive(Deserialize)]
struct RawMoney {
    amount: i64,
    #[serde(default)]
    currency: Currency,
}

impl TryFrom<RawMoney> for Money {
    type Error = CampaignError;

    fn try_from(raw: RawMoney) -> Result<Self, Self::Error> {
        Money::new(raw.amount, raw.currency)
    }
}

impl Money {
    /// Create an amount, rejecting negative values.
    pub fn new(amount: i64, currency: Currency) -> CampaignResult<Self> {
        if amount < 0 {
            return Err(CampaignError::Validation(format!(
                "Money amount must be non-negative, got {amount} {currency}"
            )));
        }
        Ok(Self { amount, currency })
    }

    /// Shorthand for an amount in the default currency.
    pub fn of(amount: i64) -> CampaignResult<Self> {
        Self::new(amount, Currency::default())
    }

    pub fn zero(currency: Currency) -> Self {
        Self {
            amount: 0,
            currency,
        }
    }

    /// Build from a floating-point figure, rounding half away from zero.
    /// Negative, NaN and infinite inputs collapse to zero.
    pub fn from_f64_rounded(value: f64, currency: Currency) -> Self {
        let amount = if value.is_finite() && value > 0.0 {
            // `as` saturates at i64::MAX for oversized values.
            value.round() as i64
        } else {
            0
        };
        Self { amount, currency }
    }

    pub fn amount(&self) -> i64 {
        self.amount
    }

    pub fn currency(&self) -> Currency {
        self.currency
    }

    pub fn is_zero(&self) -> bool {
        self.amount == 0
    }

    pub fn as_f64(&self) -> f64 {
        self.amount as f64
    }

    /// Sum keeping this amount's currency.
    pub fn saturating_add(self, other: Money) -> Money {
        Money {
            amount: self.amount.saturating_add(other.amount),
            currency: self.currency,
        }
    }

    /// Difference floored at zero.
    pub fn saturating_sub(self, other: Money) -> Money {
        Money {
            amount: self.amount.saturating_sub(other.amount).max(0),
            currency: self.currency,
        }
    }

    pub fn saturating_mul(self, factor: i64) -> Money {
        Money {
            amount: self.amount.saturating_mul(factor.max(0)),
            currency: self.currency,
        }
    }

    /// Checked sum that refuses to mix currencies.
    pub fn checked_add(self, other: Money) -> CampaignResult<Money> {
        if self.currency != other.currency {
            return Err(CampaignError::Validation(format!(
                "Cannot add {} to {}",
                other.currency, self.currency
            )));
        }
        Ok(self.saturating_add(other))
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.amount, self.currency)
    }
}
