//! Daily stat store — per-campaign, per-day rollups materialized by the
//! external aggregator. The core consumes these for health scoring and
//! insight generation over bounded recent windows; it does not own them.

use adboard_core::types::DailyStat;
use chrono::NaiveDate;
use dashmap::DashMap;
use uuid::Uuid;

pub struct StatsStore {
    rows: DashMap<(Uuid, NaiveDate), DailyStat>,
}

impl StatsStore {
    pub fn new() -> Self {
        Self {
            rows: DashMap::new(),
        }
    }

    /// Ingest one day's rollup, accumulating into any existing row for the
    /// same campaign/day.
    pub fn ingest(&self, stat: DailyStat) {
        self.rows
            .entry((stat.campaign_id, stat.date))
            .and_modify(|row| {
                row.impressions += stat.impressions;
                row.clicks += stat.clicks;
                row.conversions += stat.conversions;
                row.spend_cents += stat.spend_cents;
            })
            .or_insert(stat);
    }

    /// All rows for a campaign within `[from, to]`, ordered by date ascending.
    pub fn for_campaign(&self, campaign_id: &Uuid, from: NaiveDate, to: NaiveDate) -> Vec<DailyStat> {
        let mut rows: Vec<DailyStat> = self
            .rows
            .iter()
            .filter(|r| r.campaign_id == *campaign_id && r.date >= from && r.date <= to)
            .map(|r| r.clone())
            .collect();
        rows.sort_by_key(|r| r.date);
        rows
    }

    /// All rows for a set of campaigns within `[from, to]`.
    pub fn for_campaigns(
        &self,
        campaign_ids: &[Uuid],
        from: NaiveDate,
        to: NaiveDate,
    ) -> Vec<DailyStat> {
        let mut rows: Vec<DailyStat> = self
            .rows
            .iter()
            .filter(|r| campaign_ids.contains(&r.campaign_id) && r.date >= from && r.date <= to)
            .map(|r| r.clone())
            .collect();
        rows.sort_by(|a, b| a.date.cmp(&b.date).then(a.campaign_id.cmp(&b.campaign_id)));
        rows
    }

    /// Platform-wide totals within `[from, to]`:
    /// `(impressions, clicks, conversions, spend_cents)`.
    pub fn platform_totals(&self, from: NaiveDate, to: NaiveDate) -> (u64, u64, u64, i64) {
        self.rows
            .iter()
            .filter(|r| r.date >= from && r.date <= to)
            .fold((0, 0, 0, 0), |(imp, clk, conv, spend), r| {
                (
                    imp + r.impressions,
                    clk + r.clicks,
                    conv + r.conversions,
                    spend + r.spend_cents,
                )
            })
    }

    /// Per-day spend totals for a set of campaigns over the last `days` days
    /// ending at `to`, ordered oldest first. Days without data contribute 0.
    pub fn daily_spend(&self, campaign_ids: &[Uuid], to: NaiveDate, days: u32) -> Vec<i64> {
        let mut breakdown = Vec::with_capacity(days as usize);
        for i in (0..days).rev() {
            let day = to - chrono::Duration::days(i as i64);
            let total: i64 = self
                .rows
                .iter()
                .filter(|r| r.date == day && campaign_ids.contains(&r.campaign_id))
                .map(|r| r.spend_cents)
                .sum();
            breakdown.push(total);
        }
        breakdown
    }
}

impl Default for StatsStore {
    fn default() -> Self {
        Self::new()
    }
}
