//! KPI snapshots: one campaign's observed performance for a period, with
//! derived metrics (ROAS, CPA, CTR, CVR, CPC, CPM) that are defined for
//! every input, zero denominators included.

use campaign_core::{CampaignError, CampaignResult, Currency, Money};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Immutable performance record for one campaign and date.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawSnapshot")]
pub struct MetricSnapshot {
    campaign_id: Uuid,
    impressions: u64,
    clicks: u64,
    conversions: u64,
    spend: Money,
    revenue: Money,
    date: NaiveDate,
    created_at: DateTime<Utc>,
}

/// Wire shape accepted on deserialization; counters are signed so that
/// negative platform data is reported as a validation error.
#[derive(Deserialize)]
struct RawSnapshot {
    campaign_id: Uuid,
    impressions: i64,
    clicks: i64,
    conversions: i64,
    spend: Money,
    revenue: Money,
    date: NaiveDate,
    #[serde(default = "Utc::now")]
    created_at: DateTime<Utc>,
}

impl TryFrom<RawSnapshot> for MetricSnapshot {
    type Error = CampaignError;

    fn try_from(raw: RawSnapshot) -> Result<Self, Self::Error> {
        let mut snapshot = MetricSnapshot::new(
            raw.campaign_id,
            raw.impressions,
            raw.clicks,
            raw.conversions,
            raw.spend,
            raw.revenue,
            raw.date,
        )?;
        snapshot.created_at = raw.created_at;
        Ok(snapshot)
    }
}

/// Period-over-period comparison of two snapshots.
///
/// Raw metrics are relative changes in percent. CTR is an absolute
/// difference in percentage points.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KpiComparison {
    pub impressions_change: f64,
    pub clicks_change: f64,
    pub conversions_change: f64,
    pub spend_change: f64,
    pub revenue_change: f64,
    pub ctr_point_change: f64,
}

// ---------------------------------------------------------------------------
// MetricSnapshot
// ---------------------------------------------------------------------------

impl MetricSnapshot {
    /// Build a snapshot from raw platform counters, rejecting negatives and
    /// spend and revenue in different currencies.
    pub fn new(
        campaign_id: Uuid,
        impressions: i64,
        clicks: i64,
        conversions: i64,
        spend: Money,
        revenue: Money,
        date: NaiveDate,
    ) -> CampaignResult<Self> {
        if spend.currency() != revenue.currency() {
            return Err(CampaignError::Validation(format!(
                "spend ({}) and revenue ({}) must share a currency",
                spend.currency(),
                revenue.currency()
            )));
        }
        Ok(Self {
            campaign_id,
            impressions: non_negative("impressions", impressions)?,
            clicks: non_negative("clicks", clicks)?,
            conversions: non_negative("conversions", conversions)?,
            spend,
            revenue,
            date,
            created_at: Utc::now(),
        })
    }

    /// All-zero snapshot dated today.
    pub fn zero(campaign_id: Uuid, currency: Currency) -> Self {
        let now = Utc::now();
        Self {
            campaign_id,
            impressions: 0,
            clicks: 0,
            conversions: 0,
            spend: Money::zero(currency),
            revenue: Money::zero(currency),
            date: now.date_naive(),
            created_at: now,
        }
    }

    pub fn campaign_id(&self) -> Uuid {
        self.campaign_id
    }

    pub fn impressions(&self) -> u64 {
        self.impressions
    }

    pub fn clicks(&self) -> u64 {
        self.clicks
    }

    pub fn conversions(&self) -> u64 {
        self.conversions
    }

    pub fn spend(&self) -> Money {
        self.spend
    }

    pub fn revenue(&self) -> Money {
        self.revenue
    }

    pub fn date(&self) -> NaiveDate {
        self.date
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    // -- derived metrics -----------------------------------------------------

    /// `revenue / spend` (0.0 when spend is zero).
    pub fn roas(&self) -> f64 {
        if self.spend.is_zero() {
            return 0.0;
        }
        self.revenue.as_f64() / self.spend.as_f64()
    }

    /// Cost per acquisition, rounded to the minor unit (zero without conversions).
    pub fn cpa(&self) -> Money {
        self.cost_per(self.conversions, 1.0)
    }

    /// Click-through rate in percent, within `0..=100`.
    pub fn ctr(&self) -> f64 {
        if self.impressions == 0 {
            return 0.0;
        }
        (self.clicks as f64 / self.impressions as f64 * 100.0).clamp(0.0, 100.0)
    }

    /// Conversion rate in percent (0.0 when there are no clicks).
    pub fn cvr(&self) -> f64 {
        if self.clicks == 0 {
            return 0.0;
        }
        self.conversions as f64 / self.clicks as f64 * 100.0
    }

    /// Cost per click, rounded to the minor unit.
    pub fn cpc(&self) -> Money {
        self.cost_per(self.clicks, 1.0)
    }

    /// Cost per thousand impressions, rounded to the minor unit.
    pub fn cpm(&self) -> Money {
        self.cost_per(self.impressions, 1000.0)
    }

    fn cost_per(&self, count: u64, scale: f64) -> Money {
        if count == 0 {
            return Money::zero(self.spend.currency());
        }
        Money::from_f64_rounded(
            self.spend.as_f64() / count as f64 * scale,
            self.spend.currency(),
        )
    }

    // -- aggregation ---------------------------------------------------------

    /// Sum a list of snapshots into one dated today. An empty list yields a
    /// zero snapshot; mixing currencies is a validation error.
    pub fn aggregate(campaign_id: Uuid, snapshots: &[MetricSnapshot]) -> CampaignResult<Self> {
        let currency = snapshots
            .first()
            .map(|s| s.spend.currency())
            .unwrap_or_default();
        let mut total = Self::zero(campaign_id, currency);

        for s in snapshots {
            total.impressions = total.impressions.saturating_add(s.impressions);
            total.clicks = total.clicks.saturating_add(s.clicks);
            total.conversions = total.conversions.saturating_add(s.conversions);
            total.spend = total.spend.checked_add(s.spend)?;
            total.revenue = total.revenue.checked_add(s.revenue)?;
        }

        Ok(total)
    }

    /// Compare this snapshot (current period) against `previous`.
    pub fn compare(&self, previous: &MetricSnapshot) -> KpiComparison {
        KpiComparison {
            impressions_change: percent_change(self.impressions as f64, previous.impressions as f64),
            clicks_change: percent_change(self.clicks as f64, previous.clicks as f64),
            conversions_change: percent_change(
                self.conversions as f64,
                previous.conversions as f64,
            ),
            spend_change: percent_change(self.spend.as_f64(), previous.spend.as_f64()),
            revenue_change: percent_change(self.revenue.as_f64(), previous.revenue.as_f64()),
            ctr_point_change: self.ctr() - previous.ctr(),
        }
    }
}

fn non_negative(field: &str, value: i64) -> CampaignResult<u64> {
    u64::try_from(value).map_err(|_| {
        CampaignError::Validation(format!("{field} must be non-negative, got {value}"))
    })
}

/// Relative change in percent. A zero baseline maps to 0% when the current
/// value is also zero and 100% otherwise.
fn percent_change(current: f64, previous: f64) -> f64 {
    if previous == 0.0 {
        return if current > 0.0 { 100.0 } else { 0.0 };
    }
    (current - previous) / previous * 100.0
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
