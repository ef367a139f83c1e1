//! Weighted account-health scoring: a 0-100 composite and A-F grade per
//! advertiser from recent performance, wallet, and activity signals.
//!
//! Each component is independently bucketed with no interpolation between
//! bands. Scoring is a pure function of the gathered signals and is safely
//! recomputable at any time.

use adboard_core::types::{CampaignStatus, Grade, HealthScore};
use adboard_ledger::WalletLedger;
use adboard_store::{CampaignStore, OwnerDirectory, StatsStore};
use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;
use uuid::Uuid;

/// Aggregated inputs for one owner over the scoring window.
#[derive(Debug, Clone)]
pub struct OwnerSignals {
    pub owner: String,
    /// Owner CTR divided by platform-average CTR; `None` without data.
    pub ctr_ratio: Option<f64>,
    /// Owner conversion rate divided by platform average; `None` without data.
    pub conversion_ratio: Option<f64>,
    pub wallet_balance_cents: i64,
    pub days_since_activity: i64,
    /// Last 7 daily spend totals, oldest first. Zero-filled for gap days.
    pub daily_spend_cents: Vec<i64>,
    pub active_campaigns: usize,
}

/// CTR ratio component, worth up to 25 points.
pub fn ctr_points(ratio: Option<f64>) -> u32 {
    match ratio {
        Some(r) if r >= 1.5 => 25,
        Some(r) if r >= 1.0 => 20,
        Some(r) if r >= 0.7 => 15,
        Some(r) if r >= 0.4 => 8,
        _ => 0,
    }
}

/// Conversion ratio component, worth up to 20 points.
pub fn conversion_points(ratio: Option<f64>) -> u32 {
    match ratio {
        Some(r) if r >= 1.5 => 20,
        Some(r) if r >= 1.0 => 16,
        Some(r) if r >= 0.5 => 10,
        Some(r) if r > 0.0 => 5,
        _ => 0,
    }
}

/// Wallet balance component, worth up to 20 points.
pub fn balance_points(balance_cents: i64) -> u32 {
    if balance_cents >= 10_000 {
        20
    } else if balance_cents >= 5_000 {
        15
    } else if balance_cents >= 1_000 {
        10
    } else if balance_cents > 0 {
        5
    } else {
        0
    }
}

/// Activity recency component, worth up to 20 points.
pub fn recency_points(days_since_activity: i64) -> u32 {
    if days_since_activity <= 1 {
        20
    } else if days_since_activity <= 3 {
        16
    } else if days_since_activity <= 7 {
        12
    } else if days_since_activity <= 14 {
        6
    } else {
        0
    }
}

/// Spend momentum component, worth up to 15 points: second-half average of
/// the last 7 daily spends vs the first-half average. With fewer than 4
/// days of data but at least one active campaign, a flat 8 is awarded.
pub fn momentum_points(daily_spend_cents: &[i64], active_campaigns: usize) -> u32 {
    let data_points = daily_spend_cents.iter().filter(|v| **v > 0).count();
    if data_points < 4 {
        return if active_campaigns > 0 { 8 } else { 0 };
    }

    let mid = daily_spend_cents.len() / 2;
    let first_avg = average(&daily_spend_cents[..mid]);
    let second_avg = average(&daily_spend_cents[mid..]);
    if first_avg <= 0.0 {
        return if second_avg > 0.0 { 15 } else { 0 };
    }

    let ratio = second_avg / first_avg;
    if ratio > 1.1 {
        15
    } else if ratio >= 0.9 {
        10
    } else if ratio >= 0.5 {
        5
    } else {
        0
    }
}

fn average(values: &[i64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<i64>() as f64 / values.len() as f64
}

pub fn grade_for(score: u32) -> Grade {
    if score >= 80 {
        Grade::A
    } else if score >= 65 {
        Grade::B
    } else if score >= 45 {
        Grade::C
    } else if score >= 25 {
        Grade::D
    } else {
        Grade::F
    }
}

/// Pure scoring function: sum the five components and band the grade.
pub fn score_signals(signals: &OwnerSignals) -> HealthScore {
    let score = ctr_points(signals.ctr_ratio)
        + conversion_points(signals.conversion_ratio)
        + balance_points(signals.wallet_balance_cents)
        + recency_points(signals.days_since_activity)
        + momentum_points(&signals.daily_spend_cents, signals.active_campaigns);

    HealthScore {
        owner: signals.owner.clone(),
        score,
        grade: grade_for(score),
        computed_at: Utc::now(),
    }
}

/// Gathers per-owner signals from the stores and scores them.
pub struct HealthScorer {
    campaigns: Arc<CampaignStore>,
    ledger: Arc<WalletLedger>,
    stats: Arc<StatsStore>,
    owners: Arc<OwnerDirectory>,
}

impl HealthScorer {
    pub fn new(
        campaigns: Arc<CampaignStore>,
        ledger: Arc<WalletLedger>,
        stats: Arc<StatsStore>,
        owners: Arc<OwnerDirectory>,
    ) -> Self {
        Self {
            campaigns,
            ledger,
            stats,
            owners,
        }
    }

    /// Aggregate signals for an owner over the last `window_days` days.
    pub fn signals(&self, owner: &str, window_days: u32, now: DateTime<Utc>) -> OwnerSignals {
        let today = now.date_naive();
        let from = today - Duration::days(window_days.saturating_sub(1) as i64);

        let campaigns = self.campaigns.list_for_owner(owner);
        let campaign_ids: Vec<Uuid> = campaigns.iter().map(|c| c.id).collect();
        let active_campaigns = campaigns
            .iter()
            .filter(|c| c.status == CampaignStatus::Active)
            .count();

        let rows = self.stats.for_campaigns(&campaign_ids, from, today);
        let (owner_imp, owner_clk, owner_conv) = rows.iter().fold((0u64, 0u64, 0u64), |acc, r| {
            (acc.0 + r.impressions, acc.1 + r.clicks, acc.2 + r.conversions)
        });
        let (platform_imp, platform_clk, platform_conv, _) =
            self.stats.platform_totals(from, today);

        let ctr_ratio = ratio(
            rate(owner_clk, owner_imp),
            rate(platform_clk, platform_imp),
        );
        let conversion_ratio = ratio(
            rate(owner_conv, owner_clk),
            rate(platform_conv, platform_clk),
        );

        OwnerSignals {
            owner: owner.to_string(),
            ctr_ratio,
            conversion_ratio,
            wallet_balance_cents: self.ledger.balance(owner).unwrap_or(0),
            days_since_activity: self.owners.days_inactive(owner, now),
            daily_spend_cents: self.stats.daily_spend(&campaign_ids, today, 7),
            active_campaigns,
        }
    }

    pub fn score(&self, owner: &str, window_days: u32) -> HealthScore {
        let signals = self.signals(owner, window_days, Utc::now());
        score_signals(&signals)
    }
}

fn rate(numerator: u64, denominator: u64) -> Option<f64> {
    if denominator == 0 {
        None
    } else {
        Some(numerator as f64 / denominator as f64)
    }
}

fn ratio(owner: Option<f64>, platform: Option<f64>) -> Option<f64> {
    match (owner, platform) {
        (Some(o), Some(p)) if p > 0.0 => Some(o / p),
        _ => None,
    }
}
