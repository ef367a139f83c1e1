//! Demo data for local development: a few placements, funded advertisers,
//! and campaigns with a week of synthetic stats.

use adboard_core::types::{Creative, DailyStat, InventoryType};
use adboard_ledger::WalletLedger;
use adboard_store::campaigns::NewCampaign;
use adboard_store::{CampaignStore, OwnerDirectory, PlacementRegistry, StatsStore};
use chrono::{Duration, Utc};
use parking_lot::RwLock;
use std::sync::Arc;
use uuid::Uuid;

pub fn seed_demo_data(
    placements: &PlacementRegistry,
    campaigns: &CampaignStore,
    ledger: &WalletLedger,
    stats: &StatsStore,
    owners: &OwnerDirectory,
    creatives: &Arc<RwLock<Vec<Creative>>>,
) -> anyhow::Result<()> {
    let now = Utc::now();
    let today = now.date_naive();

    placements.register("home_hero", "home", "hero", InventoryType::Featured, 1, 200);
    placements.register("home_grid", "home", "grid", InventoryType::Featured, 4, 80);
    placements.register("search_sidebar", "search", "sidebar", InventoryType::Cpc, 3, 25);

    let advertisers = [
        ("willow-candles", 25_000),
        ("oak-and-iron", 8_000),
        ("fern-papergoods", 600),
    ];
    for (owner, balance) in advertisers {
        ledger.open_account(owner, Some(1_000), None);
        ledger.credit(owner, balance, "seed:initial")?;
        owners.touch(owner, now - Duration::hours(6));
    }

    let demo_campaigns = [
        ("willow-candles", "home_hero", InventoryType::Featured, 200, 10, Some(50_000)),
        ("willow-candles", "search_sidebar", InventoryType::Cpc, 30, 5, None),
        ("oak-and-iron", "home_grid", InventoryType::Featured, 80, 3, Some(10_000)),
        ("fern-papergoods", "search_sidebar", InventoryType::Cpc, 25, 1, Some(2_000)),
    ];
    for (owner, slug, inventory_type, rate, priority, total) in demo_campaigns {
        let campaign = campaigns.create(NewCampaign {
            owner: owner.to_string(),
            placement_slug: slug.to_string(),
            inventory_type,
            rate_cents: rate,
            priority,
            daily_budget_cents: None,
            total_budget_cents: total,
            start_date: now - Duration::days(10),
            end_date: None,
        });

        creatives.write().push(Creative {
            id: Uuid::new_v4(),
            owner: owner.to_string(),
            campaign_id: campaign.id,
            is_active: true,
            updated_at: now - Duration::days(3),
        });

        // A week of plausible history so health and insight endpoints
        // return something interesting out of the box.
        for day in 0..7 {
            stats.ingest(DailyStat {
                campaign_id: campaign.id,
                date: today - Duration::days(day),
                impressions: 400 + priority as u64 * 50,
                clicks: 8 + priority as u64,
                conversions: 1,
                spend_cents: rate * 4,
            });
        }
    }

    Ok(())
}
