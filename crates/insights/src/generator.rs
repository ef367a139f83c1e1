//! Rule engine that turns aggregated account and performance signals into
//! prioritized, human-readable recommendations.
//!
//! Each rule is independently evaluable and emits at most one insight per
//! owner unless noted (budget and spend rules are per-campaign). Output is
//! sorted most severe first.

use adboard_core::types::{CampaignStatus, Creative, Insight, Severity};
use adboard_ledger::WalletLedger;
use adboard_store::{CampaignStore, OwnerDirectory, StatsStore};
use chrono::{DateTime, Duration, NaiveDate, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

/// Days of history consulted for rate-based rules.
const WINDOW_DAYS: i64 = 14;
/// Statistical floor on prior-period impressions for the CTR-decline rule.
const CTR_DECLINE_MIN_IMPRESSIONS: u64 = 50;
/// Statistical floor on clicks for the conversion-gap rule.
const CONVERSION_GAP_MIN_CLICKS: u64 = 20;

pub struct InsightGenerator {
    campaigns: Arc<CampaignStore>,
    ledger: Arc<WalletLedger>,
    stats: Arc<StatsStore>,
    owners: Arc<OwnerDirectory>,
}

impl InsightGenerator {
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

    /// Evaluate every rule for every owner and return the insights sorted
    /// by severity, most severe first.
    pub fn generate(
        &self,
        owner_ids: &[String],
        creatives: &[Creative],
        now: DateTime<Utc>,
    ) -> Vec<Insight> {
        let mut insights = Vec::new();
        let today = now.date_naive();

        for owner in owner_ids {
            let campaigns = self.campaigns.list_for_owner(owner);
            let active: Vec<_> = campaigns
                .iter()
                .filter(|c| c.status == CampaignStatus::Active)
                .collect();
            let campaign_ids: Vec<Uuid> = campaigns.iter().map(|c| c.id).collect();

            self.churn_risk(owner, now, &mut insights);
            self.low_wallet(owner, active.len(), &mut insights);
            self.ctr_decline(owner, &campaign_ids, today, &mut insights);
            self.creative_fatigue(owner, creatives, now, &mut insights);
            self.conversion_gap(owner, &campaign_ids, today, &mut insights);

            for campaign in &active {
                self.budget_exhaustion(owner, campaign, &mut insights);
                self.underspending(owner, campaign, today, &mut insights);
            }

            self.placement_opportunity(owner, &active, today, &mut insights);
        }

        insights.sort_by_key(|i| i.severity);
        debug!(count = insights.len(), "Insights generated");
        insights
    }

    fn churn_risk(&self, owner: &str, now: DateTime<Utc>, out: &mut Vec<Insight>) {
        let days = self.owners.days_inactive(owner, now);
        let lifetime_spent = self
            .ledger
            .account(owner)
            .map(|a| a.lifetime_spent_cents)
            .unwrap_or(0);

        if days >= 14 {
            let description = if days == i64::MAX {
                "No activity on record for this account".to_string()
            } else {
                format!("No activity for {days} days")
            };
            out.push(insight(
                owner,
                Severity::Critical,
                "churn_risk",
                description,
                "Reach out with a re-engagement offer before the account lapses",
            ));
        } else if days >= 7 && lifetime_spent > 0 {
            out.push(insight(
                owner,
                Severity::Critical,
                "churn_risk",
                format!("Previously spending account quiet for {days} days"),
                "Contact the advertiser; their campaigns may be stalling",
            ));
        }
    }

    fn low_wallet(&self, owner: &str, active_count: usize, out: &mut Vec<Insight>) {
        let balance = self.ledger.balance(owner).unwrap_or(0);
        if balance < 1_000 && active_count >= 1 {
            out.push(insight(
                owner,
                Severity::Critical,
                "low_balance",
                format!(
                    "Wallet balance is {:.2} USD with {active_count} active campaign(s)",
                    balance as f64 / 100.0
                ),
                "Top up the wallet to keep campaigns serving",
            ));
        }
    }

    fn ctr_decline(
        &self,
        owner: &str,
        campaign_ids: &[Uuid],
        today: NaiveDate,
        out: &mut Vec<Insight>,
    ) {
        let current_from = today - Duration::days(6);
        let prior_from = today - Duration::days(13);
        let prior_to = today - Duration::days(7);

        let (cur_imp, cur_clk) = totals(&self.stats, campaign_ids, current_from, today);
        let (prior_imp, prior_clk) = totals(&self.stats, campaign_ids, prior_from, prior_to);

        if prior_imp < CTR_DECLINE_MIN_IMPRESSIONS {
            return;
        }
        let prior_ctr = prior_clk as f64 / prior_imp as f64;
        if prior_ctr <= 0.0 {
            return;
        }
        let current_ctr = if cur_imp == 0 {
            0.0
        } else {
            cur_clk as f64 / cur_imp as f64
        };
        if current_ctr <= prior_ctr * 0.8 {
            let drop_pct = (1.0 - current_ctr / prior_ctr) * 100.0;
            out.push(insight(
                owner,
                Severity::Warning,
                "ctr_decline",
                format!("CTR dropped {drop_pct:.0}% versus the prior 7 days"),
                "Refresh creatives or review placement targeting",
            ));
        }
    }

    fn creative_fatigue(
        &self,
        owner: &str,
        creatives: &[Creative],
        now: DateTime<Utc>,
        out: &mut Vec<Insight>,
    ) {
        // Only the first matching creative per owner is reported.
        let stale = creatives.iter().find(|c| {
            c.owner == owner && c.is_active && (now - c.updated_at).num_days() >= 30
        });
        if let Some(creative) = stale {
            let age = (now - creative.updated_at).num_days();
            out.push(insight(
                owner,
                Severity::Warning,
                "creative_fatigue",
                format!("Creative {} unchanged for {age} days", creative.id),
                "Rotate in fresh creative to fight banner blindness",
            ));
        }
    }

    fn conversion_gap(
        &self,
        owner: &str,
        campaign_ids: &[Uuid],
        today: NaiveDate,
        out: &mut Vec<Insight>,
    ) {
        let from = today - Duration::days(WINDOW_DAYS - 1);
        let rows = self.stats.for_campaigns(campaign_ids, from, today);
        let (imp, clk, conv) = rows.iter().fold((0u64, 0u64, 0u64), |acc, r| {
            (acc.0 + r.impressions, acc.1 + r.clicks, acc.2 + r.conversions)
        });
        if imp == 0 || clk < CONVERSION_GAP_MIN_CLICKS {
            return;
        }
        let ctr = clk as f64 / imp as f64;
        if ctr < 0.015 {
            return;
        }

        let (_, platform_clk, platform_conv, _) = self.stats.platform_totals(from, today);
        if platform_clk == 0 {
            return;
        }
        let platform_rate = platform_conv as f64 / platform_clk as f64;
        let owner_rate = conv as f64 / clk as f64;
        if platform_rate > 0.0 && owner_rate < platform_rate * 0.5 {
            out.push(insight(
                owner,
                Severity::Warning,
                "conversion_gap",
                format!(
                    "Strong CTR ({:.1}%) but conversion rate is less than half the platform average",
                    ctr * 100.0
                ),
                "Review landing pages; the traffic is there but it is not converting",
            ));
        }
    }

    fn budget_exhaustion(
        &self,
        owner: &str,
        campaign: &adboard_core::types::Campaign,
        out: &mut Vec<Insight>,
    ) {
        let Some(total) = campaign.total_budget_cents.filter(|t| *t > 0) else {
            return;
        };
        let spent_fraction = campaign.total_spent_cents as f64 / total as f64;
        if spent_fraction >= 0.85 {
            out.push(insight(
                owner,
                Severity::Critical,
                "budget_exhaustion",
                format!(
                    "Campaign {} has spent {:.0}% of its total budget",
                    campaign.id,
                    spent_fraction * 100.0
                ),
                "Increase the budget or plan a follow-up campaign",
            ));
        }
    }

    fn underspending(
        &self,
        owner: &str,
        campaign: &adboard_core::types::Campaign,
        today: NaiveDate,
        out: &mut Vec<Insight>,
    ) {
        let Some(cap) = campaign.daily_budget_cents.filter(|c| *c > 0) else {
            return;
        };
        let spend = self.stats.daily_spend(&[campaign.id], today, 7);
        let avg = spend.iter().sum::<i64>() as f64 / spend.len() as f64;
        if avg > 0.0 && avg < cap as f64 * 0.3 {
            out.push(insight(
                owner,
                Severity::Info,
                "underspending",
                format!(
                    "Campaign {} averages {:.0}% of its daily budget",
                    campaign.id,
                    avg / cap as f64 * 100.0
                ),
                "Raise the bid rate or broaden placements to use the budget",
            ));
        }
    }

    fn placement_opportunity(
        &self,
        owner: &str,
        active: &[&adboard_core::types::Campaign],
        today: NaiveDate,
        out: &mut Vec<Insight>,
    ) {
        if active.len() < 2 {
            return;
        }
        let mut by_placement: HashMap<&str, Vec<Uuid>> = HashMap::new();
        for campaign in active {
            by_placement
                .entry(campaign.placement_slug.as_str())
                .or_default()
                .push(campaign.id);
        }
        if by_placement.len() < 2 {
            return;
        }

        let from = today - Duration::days(WINDOW_DAYS - 1);
        let mut ctrs: Vec<(String, f64)> = Vec::new();
        for (slug, ids) in &by_placement {
            let (imp, clk) = totals(&self.stats, ids, from, today);
            if imp < 50 {
                // Every placement needs the impression floor.
                return;
            }
            ctrs.push((slug.to_string(), clk as f64 / imp as f64));
        }

        ctrs.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        let (best_slug, best_ctr) = &ctrs[0];
        let (worst_slug, worst_ctr) = &ctrs[ctrs.len() - 1];
        if *best_ctr > 0.0 && *best_ctr >= worst_ctr * 2.0 {
            out.push(insight(
                owner,
                Severity::Info,
                "placement_opportunity",
                format!(
                    "Placement '{best_slug}' outperforms '{worst_slug}' by 2x or more on CTR"
                ),
                "Shift budget toward the stronger placement",
            ));
        }
    }
}

fn totals(
    stats: &StatsStore,
    campaign_ids: &[Uuid],
    from: NaiveDate,
    to: NaiveDate,
) -> (u64, u64) {
    stats
        .for_campaigns(campaign_ids, from, to)
        .iter()
        .fold((0, 0), |acc, r| (acc.0 + r.impressions, acc.1 + r.clicks))
}

fn insight(
    owner: &str,
    severity: Severity,
    category: &str,
    description: impl Into<String>,
    action: &str,
) -> Insight {
    Insight {
        id: Uuid::new_v4(),
        owner: owner.to_string(),
        severity,
        category: category.to_string(),
        description: description.into(),
        action: action.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use adboard_core::event_bus::noop_sink;
    use adboard_core::types::{DailyStat, InventoryType};
    use adboard_store::campaigns::NewCampaign;

    struct Fixture {
        campaigns: Arc<CampaignStore>,
        ledger: Arc<WalletLedger>,
        stats: Arc<StatsStore>,
        owners: Arc<OwnerDirectory>,
        generator: InsightGenerator,
    }

    fn fixture() -> Fixture {
        let campaigns = Arc::new(CampaignStore::new());
        let ledger = Arc::new(WalletLedger::new(noop_sink()));
        let stats = Arc::new(StatsStore::new());
        let owners = Arc::new(OwnerDirectory::new());
        let generator = InsightGenerator::new(
            campaigns.clone(),
            ledger.clone(),
            stats.clone(),
            owners.clone(),
        );
        Fixture {
            campaigns,
            ledger,
            stats,
            owners,
            generator,
        }
    }

    fn active_campaign(
        fx: &Fixture,
        owner: &str,
        slug: &str,
        total: Option<i64>,
        daily: Option<i64>,
    ) -> adboard_core::types::Campaign {
        let campaign = fx.campaigns.create(NewCampaign {
            owner: owner.to_string(),
            placement_slug: slug.to_string(),
            inventory_type: InventoryType::Cpc,
            rate_cents: 50,
            priority: 1,
            daily_budget_cents: daily,
            total_budget_cents: total,
            start_date: Utc::now() - Duration::days(30),
            end_date: None,
        });
        fx.campaigns.set_status(&campaign.id, CampaignStatus::Active);
        fx.campaigns.get(&campaign.id).unwrap()
    }

    fn stat(campaign_id: Uuid, date: NaiveDate, imp: u64, clk: u64, conv: u64) -> DailyStat {
        DailyStat {
            campaign_id,
            date,
            impressions: imp,
            clicks: clk,
            conversions: conv,
            spend_cents: 0,
        }
    }

    #[test]
    fn test_churn_risk_for_long_inactive_spender() {
        let fx = fixture();
        let now = Utc::now();
        fx.owners.touch("adv-1", now - Duration::days(20));
        fx.ledger.credit("adv-1", 5_000, "topup").unwrap();
        fx.ledger.debit("adv-1", 1_000, "alloc").unwrap();

        let insights = fx.generator.generate(&["adv-1".to_string()], &[], now);
        let churn: Vec<_> = insights.iter().filter(|i| i.category == "churn_risk").collect();
        assert_eq!(churn.len(), 1);
        assert_eq!(churn[0].severity, Severity::Critical);
    }

    #[test]
    fn test_churn_risk_mid_window_requires_spend() {
        let fx = fixture();
        let now = Utc::now();

        // 8 days quiet, no spend history: no churn insight.
        fx.owners.touch("adv-1", now - Duration::days(8));
        let insights = fx.generator.generate(&["adv-1".to_string()], &[], now);
        assert!(insights.iter().all(|i| i.category != "churn_risk"));

        // Same inactivity with spend history: critical.
        fx.owners.touch("adv-2", now - Duration::days(8));
        fx.ledger.credit("adv-2", 5_000, "topup").unwrap();
        fx.ledger.debit("adv-2", 500, "alloc").unwrap();
        let insights = fx.generator.generate(&["adv-2".to_string()], &[], now);
        assert!(insights.iter().any(|i| i.category == "churn_risk"));
    }

    #[test]
    fn test_low_wallet_needs_active_campaign() {
        let fx = fixture();
        let now = Utc::now();
        fx.owners.touch("adv-1", now);
        fx.ledger.credit("adv-1", 500, "topup").unwrap();

        // No active campaign: no insight.
        let insights = fx.generator.generate(&["adv-1".to_string()], &[], now);
        assert!(insights.iter().all(|i| i.category != "low_balance"));

        active_campaign(&fx, "adv-1", "home_hero", None, None);
        let insights = fx.generator.generate(&["adv-1".to_string()], &[], now);
        assert!(insights
            .iter()
            .any(|i| i.category == "low_balance" && i.severity == Severity::Critical));
    }

    #[test]
    fn test_ctr_decline_respects_impression_floor() {
        let fx = fixture();
        let now = Utc::now();
        let today = now.date_naive();
        fx.owners.touch("adv-1", now);
        fx.ledger.credit("adv-1", 50_000, "topup").unwrap();
        let campaign = active_campaign(&fx, "adv-1", "home_hero", None, None);

        // Prior week below the 50-impression floor: no trigger.
        fx.stats.ingest(stat(campaign.id, today - Duration::days(10), 40, 4, 0));
        fx.stats.ingest(stat(campaign.id, today - Duration::days(2), 100, 1, 0));
        let insights = fx.generator.generate(&["adv-1".to_string()], &[], now);
        assert!(insights.iter().all(|i| i.category != "ctr_decline"));

        // Lift prior impressions over the floor; 10% -> 1% CTR triggers.
        fx.stats.ingest(stat(campaign.id, today - Duration::days(9), 60, 6, 0));
        let insights = fx.generator.generate(&["adv-1".to_string()], &[], now);
        assert!(insights
            .iter()
            .any(|i| i.category == "ctr_decline" && i.severity == Severity::Warning));
    }

    #[test]
    fn test_creative_fatigue_reports_first_match_only() {
        let fx = fixture();
        let now = Utc::now();
        fx.owners.touch("adv-1", now);
        let creatives = vec![
            Creative {
                id: Uuid::new_v4(),
                owner: "adv-1".to_string(),
                campaign_id: Uuid::new_v4(),
                is_active: true,
                updated_at: now - Duration::days(45),
            },
            Creative {
                id: Uuid::new_v4(),
                owner: "adv-1".to_string(),
                campaign_id: Uuid::new_v4(),
                is_active: true,
                updated_at: now - Duration::days(60),
            },
        ];

        let insights = fx.generator.generate(&["adv-1".to_string()], &creatives, now);
        let fatigue: Vec<_> = insights
            .iter()
            .filter(|i| i.category == "creative_fatigue")
            .collect();
        assert_eq!(fatigue.len(), 1);
        assert!(fatigue[0].description.contains(&creatives[0].id.to_string()));
    }

    #[test]
    fn test_budget_exhaustion_at_85_percent() {
        let fx = fixture();
        let now = Utc::now();
        fx.owners.touch("adv-1", now);
        fx.ledger.credit("adv-1", 50_000, "topup").unwrap();
        let campaign = active_campaign(&fx, "adv-1", "home_hero", Some(1_000), None);
        fx.campaigns.reserve_spend(&campaign.id, 850);

        let insights = fx.generator.generate(&["adv-1".to_string()], &[], now);
        assert!(insights
            .iter()
            .any(|i| i.category == "budget_exhaustion" && i.severity == Severity::Critical));
    }

    #[test]
    fn test_underspending_info() {
        let fx = fixture();
        let now = Utc::now();
        let today = now.date_naive();
        fx.owners.touch("adv-1", now);
        fx.ledger.credit("adv-1", 50_000, "topup").unwrap();
        let campaign = active_campaign(&fx, "adv-1", "home_hero", None, Some(1_000));

        // ~100 cents/day against a 1 000 cap: 10% < 30%.
        for i in 0..7 {
            fx.stats.ingest(DailyStat {
                campaign_id: campaign.id,
                date: today - Duration::days(i),
                impressions: 10,
                clicks: 1,
                conversions: 0,
                spend_cents: 100,
            });
        }

        let insights = fx.generator.generate(&["adv-1".to_string()], &[], now);
        assert!(insights
            .iter()
            .any(|i| i.category == "underspending" && i.severity == Severity::Info));
    }

    #[test]
    fn test_placement_opportunity() {
        let fx = fixture();
        let now = Utc::now();
        let today = now.date_naive();
        fx.owners.touch("adv-1", now);
        fx.ledger.credit("adv-1", 50_000, "topup").unwrap();
        let strong = active_campaign(&fx, "adv-1", "home_hero", None, None);
        let weak = active_campaign(&fx, "adv-1", "sidebar", None, None);

        fx.stats.ingest(stat(strong.id, today - Duration::days(1), 1_000, 40, 0));
        fx.stats.ingest(stat(weak.id, today - Duration::days(1), 1_000, 10, 0));

        let insights = fx.generator.generate(&["adv-1".to_string()], &[], now);
        assert!(insights
            .iter()
            .any(|i| i.category == "placement_opportunity" && i.severity == Severity::Info));
    }

    #[test]
    fn test_output_sorted_most_severe_first() {
        let fx = fixture();
        let now = Utc::now();
        let today = now.date_naive();
        fx.owners.touch("adv-1", now);
        // Low balance (critical) + underspending (info) for the same owner.
        fx.ledger.credit("adv-1", 500, "topup").unwrap();
        let campaign = active_campaign(&fx, "adv-1", "home_hero", None, Some(1_000));
        for i in 0..7 {
            fx.stats.ingest(DailyStat {
                campaign_id: campaign.id,
                date: today - Duration::days(i),
                impressions: 10,
                clicks: 1,
                conversions: 0,
                spend_cents: 100,
            });
        }

        let insights = fx.generator.generate(&["adv-1".to_string()], &[], now);
        assert!(insights.len() >= 2);
        for pair in insights.windows(2) {
            assert!(pair[0].severity <= pair[1].severity);
        }
        assert_eq!(insights[0].severity, Severity::Critical);
    }
}
