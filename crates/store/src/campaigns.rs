//! Campaign store — definitions plus the two sanctioned mutation paths:
//! spend (allocation engine) and status (budget pacer). Campaigns are never
//! destroyed; they are soft-completed via status.

use adboard_core::types::{Campaign, CampaignStatus, InventoryType};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use tracing::info;
use uuid::Uuid;

/// Parameters for creating a campaign.
#[derive(Debug, Clone)]
pub struct NewCampaign {
    pub owner: String,
    pub placement_slug: String,
    pub inventory_type: InventoryType,
    pub rate_cents: i64,
    pub priority: i32,
    pub daily_budget_cents: Option<i64>,
    pub total_budget_cents: Option<i64>,
    pub start_date: DateTime<Utc>,
    pub end_date: Option<DateTime<Utc>>,
}

pub struct CampaignStore {
    campaigns: DashMap<Uuid, Campaign>,
}

impl CampaignStore {
    pub fn new() -> Self {
        Self {
            campaigns: DashMap::new(),
        }
    }

    /// Create a campaign in `pending` status. The pacer activates it once the
    /// schedule and wallet checks pass.
    pub fn create(&self, new: NewCampaign) -> Campaign {
        let campaign = Campaign {
            id: Uuid::new_v4(),
            owner: new.owner,
            placement_slug: new.placement_slug,
            inventory_type: new.inventory_type,
            rate_cents: new.rate_cents,
            priority: new.priority,
            daily_budget_cents: new.daily_budget_cents,
            total_budget_cents: new.total_budget_cents,
            total_spent_cents: 0,
            status: CampaignStatus::Pending,
            start_date: new.start_date,
            end_date: new.end_date,
            created_at: Utc::now(),
        };
        info!(campaign_id = %campaign.id, owner = %campaign.owner, "Campaign created");
        self.campaigns.insert(campaign.id, campaign.clone());
        campaign
    }

    pub fn get(&self, id: &Uuid) -> Option<Campaign> {
        self.campaigns.get(id).map(|c| c.clone())
    }

    pub fn list(&self) -> Vec<Campaign> {
        let mut all: Vec<Campaign> = self.campaigns.iter().map(|c| c.clone()).collect();
        all.sort_by(|a, b| a.id.cmp(&b.id));
        all
    }

    pub fn list_for_placement(&self, slug: &str) -> Vec<Campaign> {
        let mut matching: Vec<Campaign> = self
            .campaigns
            .iter()
            .filter(|c| c.placement_slug == slug)
            .map(|c| c.clone())
            .collect();
        matching.sort_by(|a, b| a.id.cmp(&b.id));
        matching
    }

    pub fn list_for_owner(&self, owner: &str) -> Vec<Campaign> {
        let mut matching: Vec<Campaign> = self
            .campaigns
            .iter()
            .filter(|c| c.owner == owner)
            .map(|c| c.clone())
            .collect();
        matching.sort_by(|a, b| a.id.cmp(&b.id));
        matching
    }

    /// Reserve spend against the campaign's running total. The check and the
    /// increment run under the entry lock, so concurrent reservations for one
    /// campaign serialize: at most one reservation can cross the total
    /// budget, and it must start with positive headroom. Returns `None` when
    /// the id is unknown or the total budget has no remaining headroom.
    /// Allocation-engine-only path.
    pub fn reserve_spend(&self, id: &Uuid, amount_cents: i64) -> Option<Campaign> {
        self.campaigns.get_mut(id).and_then(|mut campaign| {
            if campaign
                .total_budget_cents
                .is_some_and(|total| campaign.total_spent_cents >= total)
            {
                return None;
            }
            campaign.total_spent_cents += amount_cents;
            Some(campaign.clone())
        })
    }

    /// Back out a reservation whose wallet debit failed.
    pub fn release_spend(&self, id: &Uuid, amount_cents: i64) {
        if let Some(mut campaign) = self.campaigns.get_mut(id) {
            campaign.total_spent_cents -= amount_cents;
        }
    }

    /// Change a campaign's status. Pacer-only path; returns the previous
    /// status, or `None` when the id is unknown or the status is unchanged.
    pub fn set_status(&self, id: &Uuid, status: CampaignStatus) -> Option<CampaignStatus> {
        self.campaigns.get_mut(id).and_then(|mut campaign| {
            if campaign.status == status {
                return None;
            }
            let previous = campaign.status;
            campaign.status = status;
            Some(previous)
        })
    }
}

impl Default for CampaignStore {
    fn default() -> Self {
        Self::new()
    }
}
