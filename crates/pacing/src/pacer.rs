//! Campaign status state machine and daily pacing counters.
//!
//! Transitions:
//! - `pending -> active` when the start date is reached and the owner has a
//!   positive balance.
//! - `active -> budget_exhausted` when total spend reaches the total budget.
//! - `active -> paused` and any reactivation: manual operator actions only.
//! - `active/paused -> completed` when the end date has passed.
//!
//! The daily cap is a soft, same-day-scoped exclusion that resets at the next
//! day boundary; `budget_exhausted` is total-budget-scoped and persists until
//! manual reactivation. Spend checks run inline with the allocation debit, so
//! campaign-budget overspend is bounded by one allocation's rate and is
//! surfaced on the `pacing.budget_overspend_cents` counter.

use adboard_core::error::{AdboardError, AdboardResult};
use adboard_core::event_bus::{make_event, EventSink};
use adboard_core::types::{Campaign, CampaignStatus, PlatformEventType};
use adboard_ledger::WalletLedger;
use adboard_store::CampaignStore;
use chrono::{DateTime, NaiveDate, Utc};
use dashmap::DashMap;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

#[derive(Debug, Clone, Copy)]
struct DaySpend {
    day: NaiveDate,
    spent_cents: i64,
}

pub struct BudgetPacer {
    campaigns: Arc<CampaignStore>,
    ledger: Arc<WalletLedger>,
    events: Arc<dyn EventSink>,
    daily: DashMap<Uuid, DaySpend>,
}

impl BudgetPacer {
    pub fn new(
        campaigns: Arc<CampaignStore>,
        ledger: Arc<WalletLedger>,
        events: Arc<dyn EventSink>,
    ) -> Self {
        Self {
            campaigns,
            ledger,
            events,
            daily: DashMap::new(),
        }
    }

    /// Spend recorded against the campaign for `day`. A counter from a
    /// previous day reads as zero; it is reset lazily on the next write.
    pub fn daily_spent(&self, campaign_id: &Uuid, day: NaiveDate) -> i64 {
        self.daily
            .get(campaign_id)
            .filter(|d| d.day == day)
            .map(|d| d.spent_cents)
            .unwrap_or(0)
    }

    /// Remaining headroom under the daily cap for `day`, or `None` when the
    /// campaign has no daily budget.
    pub fn daily_remaining(&self, campaign: &Campaign, day: NaiveDate) -> Option<i64> {
        campaign
            .daily_budget_cents
            .map(|cap| cap - self.daily_spent(&campaign.id, day))
    }

    /// Record spend against the daily counter and re-check the total budget
    /// inline. Crossing the total budget transitions the campaign to
    /// `budget_exhausted` immediately (accept-then-exhaust policy).
    pub fn note_spend(&self, campaign_id: &Uuid, amount_cents: i64, now: DateTime<Utc>) {
        let today = now.date_naive();
        self.daily
            .entry(*campaign_id)
            .and_modify(|d| {
                if d.day == today {
                    d.spent_cents += amount_cents;
                } else {
                    d.day = today;
                    d.spent_cents = amount_cents;
                }
            })
            .or_insert(DaySpend {
                day: today,
                spent_cents: amount_cents,
            });

        let Some(campaign) = self.campaigns.get(campaign_id) else {
            return;
        };
        if let Some(total) = campaign.total_budget_cents {
            if campaign.total_spent_cents >= total && campaign.status == CampaignStatus::Active {
                let overspend = campaign.total_spent_cents - total;
                if overspend > 0 {
                    metrics::counter!("pacing.budget_overspend_cents")
                        .increment(overspend as u64);
                    warn!(
                        campaign_id = %campaign_id,
                        overspend_cents = overspend,
                        "Campaign spend crossed total budget"
                    );
                }
                self.transition(campaign_id, CampaignStatus::BudgetExhausted);
            }
        }
    }

    /// Apply the automatic transitions for one campaign.
    pub fn evaluate(&self, campaign_id: &Uuid, now: DateTime<Utc>) {
        let Some(campaign) = self.campaigns.get(campaign_id) else {
            return;
        };

        let ended = campaign.end_date.is_some_and(|end| end < now);
        match campaign.status {
            CampaignStatus::Pending => {
                let funded = self
                    .ledger
                    .balance(&campaign.owner)
                    .unwrap_or(0)
                    > 0;
                if campaign.start_date <= now && funded {
                    self.transition(campaign_id, CampaignStatus::Active);
                }
            }
            CampaignStatus::Active => {
                if ended {
                    self.transition(campaign_id, CampaignStatus::Completed);
                } else if campaign
                    .remaining_budget_cents()
                    .is_some_and(|remaining| remaining <= 0)
                {
                    self.transition(campaign_id, CampaignStatus::BudgetExhausted);
                }
            }
            CampaignStatus::Paused => {
                if ended {
                    self.transition(campaign_id, CampaignStatus::Completed);
                }
            }
            // Manual reactivation only.
            CampaignStatus::BudgetExhausted | CampaignStatus::Completed => {}
        }
    }

    /// Periodic sweep over every campaign. Staleness between a budget
    /// crossing and the sweep is bounded by the sweep interval; the ledger's
    /// reserve-and-check still prevents wallet overspend in that window.
    pub fn sweep(&self, now: DateTime<Utc>) {
        for campaign in self.campaigns.list() {
            self.evaluate(&campaign.id, now);
        }
    }

    /// Manual operator action: pause an active campaign.
    pub fn pause(&self, campaign_id: &Uuid) -> AdboardResult<()> {
        let campaign = self
            .campaigns
            .get(campaign_id)
            .ok_or_else(|| AdboardError::NotFound(format!("campaign {campaign_id}")))?;
        if campaign.status != CampaignStatus::Active {
            return Err(AdboardError::Validation(format!(
                "campaign {campaign_id} is not active"
            )));
        }
        self.transition(campaign_id, CampaignStatus::Paused);
        Ok(())
    }

    /// Manual operator action: reactivate a paused, exhausted, or completed
    /// campaign.
    pub fn reactivate(&self, campaign_id: &Uuid) -> AdboardResult<()> {
        let campaign = self
            .campaigns
            .get(campaign_id)
            .ok_or_else(|| AdboardError::NotFound(format!("campaign {campaign_id}")))?;
        match campaign.status {
            CampaignStatus::Paused
            | CampaignStatus::BudgetExhausted
            | CampaignStatus::Completed => {
                self.transition(campaign_id, CampaignStatus::Active);
                Ok(())
            }
            status => Err(AdboardError::Validation(format!(
                "campaign {campaign_id} cannot be reactivated from {status:?}"
            ))),
        }
    }

    fn transition(&self, campaign_id: &Uuid, status: CampaignStatus) {
        let Some(previous) = self.campaigns.set_status(campaign_id, status) else {
            return;
        };
        let Some(campaign) = self.campaigns.get(campaign_id) else {
            return;
        };
        info!(
            campaign_id = %campaign_id,
            from = ?previous,
            to = ?status,
            "Campaign status changed"
        );
        metrics::counter!("pacing.status_transitions").increment(1);

        let mut event = make_event(
            PlatformEventType::CampaignStatusChanged,
            campaign.owner.clone(),
            Some(*campaign_id),
            None,
        );
        event.detail = Some(format!("{previous:?} -> {status:?}"));
        self.events.emit(event);

        if status == CampaignStatus::BudgetExhausted {
            self.events.emit(make_event(
                PlatformEventType::BudgetExhausted,
                campaign.owner,
                Some(*campaign_id),
                campaign.total_budget_cents,
            ));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use adboard_core::event_bus::{capture_sink, noop_sink};
    use adboard_core::types::InventoryType;
    use adboard_store::campaigns::NewCampaign;
    use chrono::Duration;

    fn setup() -> (Arc<CampaignStore>, Arc<WalletLedger>, BudgetPacer, Arc<adboard_core::event_bus::CaptureSink>) {
        let campaigns = Arc::new(CampaignStore::new());
        let ledger = Arc::new(WalletLedger::new(noop_sink()));
        let sink = capture_sink();
        let pacer = BudgetPacer::new(campaigns.clone(), ledger.clone(), sink.clone());
        (campaigns, ledger, pacer, sink)
    }

    fn new_campaign(owner: &str, total: Option<i64>, daily: Option<i64>) -> NewCampaign {
        NewCampaign {
            owner: owner.to_string(),
            placement_slug: "home_hero".to_string(),
            inventory_type: InventoryType::Featured,
            rate_cents: 100,
            priority: 1,
            daily_budget_cents: daily,
            total_budget_cents: total,
            start_date: Utc::now() - Duration::days(1),
            end_date: None,
        }
    }

    #[test]
    fn test_pending_activates_when_funded() {
        let (campaigns, ledger, pacer, _) = setup();
        let campaign = campaigns.create(new_campaign("adv-1", None, None));

        // No wallet balance yet: stays pending.
        pacer.evaluate(&campaign.id, Utc::now());
        assert_eq!(campaigns.get(&campaign.id).unwrap().status, CampaignStatus::Pending);

        ledger.credit("adv-1", 5_000, "topup-1").unwrap();
        pacer.evaluate(&campaign.id, Utc::now());
        assert_eq!(campaigns.get(&campaign.id).unwrap().status, CampaignStatus::Active);
    }

    #[test]
    fn test_active_completes_after_end_date() {
        let (campaigns, ledger, pacer, _) = setup();
        ledger.credit("adv-1", 5_000, "topup-1").unwrap();
        let mut new = new_campaign("adv-1", None, None);
        new.end_date = Some(Utc::now() - Duration::hours(1));
        let campaign = campaigns.create(new);
        campaigns.set_status(&campaign.id, CampaignStatus::Active);

        pacer.sweep(Utc::now());
        assert_eq!(
            campaigns.get(&campaign.id).unwrap().status,
            CampaignStatus::Completed
        );
    }

    #[test]
    fn test_budget_crossing_exhausts_campaign() {
        let (campaigns, _, pacer, sink) = setup();
        let campaign = campaigns.create(new_campaign("adv-1", Some(1_000), None));
        campaigns.set_status(&campaign.id, CampaignStatus::Active);

        campaigns.reserve_spend(&campaign.id, 950);
        pacer.note_spend(&campaign.id, 950, Utc::now());
        assert_eq!(
            campaigns.get(&campaign.id).unwrap().status,
            CampaignStatus::Active
        );

        // The crossing allocation is accepted, then the campaign exhausts.
        campaigns.reserve_spend(&campaign.id, 100);
        pacer.note_spend(&campaign.id, 100, Utc::now());
        assert_eq!(
            campaigns.get(&campaign.id).unwrap().status,
            CampaignStatus::BudgetExhausted
        );
        assert_eq!(sink.count_type(PlatformEventType::BudgetExhausted), 1);
        assert_eq!(sink.count_type(PlatformEventType::CampaignStatusChanged), 1);
    }

    #[test]
    fn test_daily_counter_resets_at_day_boundary() {
        let (campaigns, _, pacer, _) = setup();
        let campaign = campaigns.create(new_campaign("adv-1", None, Some(500)));

        let day_one = Utc::now();
        pacer.note_spend(&campaign.id, 400, day_one);
        let stored = campaigns.get(&campaign.id).unwrap();
        assert_eq!(
            pacer.daily_remaining(&stored, day_one.date_naive()),
            Some(100)
        );

        // Next calendar day: the soft exclusion resets.
        let day_two = day_one + Duration::days(1);
        assert_eq!(pacer.daily_spent(&campaign.id, day_two.date_naive()), 0);
        pacer.note_spend(&campaign.id, 50, day_two);
        assert_eq!(pacer.daily_spent(&campaign.id, day_two.date_naive()), 50);
    }

    #[test]
    fn test_manual_pause_and_reactivate() {
        let (campaigns, _, pacer, _) = setup();
        let campaign = campaigns.create(new_campaign("adv-1", None, None));

        // Pausing a pending campaign is not allowed.
        assert!(pacer.pause(&campaign.id).is_err());

        campaigns.set_status(&campaign.id, CampaignStatus::Active);
        pacer.pause(&campaign.id).unwrap();
        assert_eq!(
            campaigns.get(&campaign.id).unwrap().status,
            CampaignStatus::Paused
        );

        pacer.reactivate(&campaign.id).unwrap();
        assert_eq!(
            campaigns.get(&campaign.id).unwrap().status,
            CampaignStatus::Active
        );
    }

    #[test]
    fn test_exhausted_requires_manual_reactivation() {
        let (campaigns, ledger, pacer, _) = setup();
        ledger.credit("adv-1", 50_000, "topup-1").unwrap();
        let campaign = campaigns.create(new_campaign("adv-1", Some(1_000), None));
        campaigns.set_status(&campaign.id, CampaignStatus::Active);
        campaigns.reserve_spend(&campaign.id, 1_000);
        pacer.note_spend(&campaign.id, 1_000, Utc::now());

        // The sweep never reactivates an exhausted campaign.
        pacer.sweep(Utc::now());
        assert_eq!(
            campaigns.get(&campaign.id).unwrap().status,
            CampaignStatus::BudgetExhausted
        );

        pacer.reactivate(&campaign.id).unwrap();
        assert_eq!(
            campaigns.get(&campaign.id).unwrap().status,
            CampaignStatus::Active
        );
    }
}
