//! Winner selection for placement requests.
//!
//! Candidates are filtered for eligibility, ordered deterministically
//! (priority desc, rate desc, campaign id asc — no randomness), and debited
//! reserve-and-check: a candidate whose debit would drive the wallet
//! negative is rejected and the next-best candidate is tried. Every
//! invocation records one audit decision, whatever the outcome.

use crate::decision_log::DecisionSink;
use adboard_core::error::{AdboardError, AdboardResult};
use adboard_core::types::{
    AllocationDecision, AllocationRequest, Campaign, CampaignStatus, CandidateSnapshot,
    ClickEvent, InventoryType, Rejection, RejectionReason, Winner,
};
use adboard_ledger::WalletLedger;
use adboard_pacing::BudgetPacer;
use adboard_store::{CampaignStore, PlacementRegistry};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};
use uuid::Uuid;

const MAX_SLUG_LEN: usize = 128;

/// Result of one allocation invocation.
#[derive(Debug, Clone)]
pub struct AllocationOutcome {
    pub winners: Vec<Winner>,
    pub fallback_used: bool,
    pub rejection_log: Vec<Rejection>,
}

pub struct AllocationEngine {
    placements: Arc<PlacementRegistry>,
    campaigns: Arc<CampaignStore>,
    ledger: Arc<WalletLedger>,
    pacer: Arc<BudgetPacer>,
    decisions: Arc<dyn DecisionSink>,
    max_debit_retries: u32,
}

impl AllocationEngine {
    pub fn new(
        placements: Arc<PlacementRegistry>,
        campaigns: Arc<CampaignStore>,
        ledger: Arc<WalletLedger>,
        pacer: Arc<BudgetPacer>,
        decisions: Arc<dyn DecisionSink>,
        max_debit_retries: u32,
    ) -> Self {
        Self {
            placements,
            campaigns,
            ledger,
            pacer,
            decisions,
            max_debit_retries,
        }
    }

    /// Select winners for a placement request and debit featured winners.
    /// Returns `fallback_used = true` with no winners when nothing is
    /// allocatable; callers fall back to organic ordering.
    pub fn allocate(&self, request: &AllocationRequest) -> AdboardResult<AllocationOutcome> {
        validate_request(request)?;
        let started = Instant::now();
        let now = Utc::now();
        metrics::counter!("allocation.requests").increment(1);

        let placement = match self.placements.get(&request.placement_slug) {
            Some(p) if p.is_active => p,
            // Cheap early-out: missing or disabled placement, still logged.
            _ => {
                debug!(slug = %request.placement_slug, "Placement missing or disabled");
                metrics::counter!("allocation.fallbacks").increment(1);
                let outcome = AllocationOutcome {
                    winners: Vec::new(),
                    fallback_used: true,
                    rejection_log: Vec::new(),
                };
                self.record_decision(request, &outcome, Vec::new(), started);
                return Ok(outcome);
            }
        };

        let mut candidates = self.campaigns.list_for_placement(&placement.slug);
        if let Some(owners) = &request.candidate_owners {
            candidates.retain(|c| owners.contains(&c.owner));
        }

        let snapshots: Vec<CandidateSnapshot> = candidates
            .iter()
            .map(|c| CandidateSnapshot {
                campaign_id: c.id,
                owner: c.owner.clone(),
                priority: c.priority,
                rate_cents: c.rate_cents,
                remaining_budget_cents: c.remaining_budget_cents(),
                wallet_balance_cents: self.ledger.balance(&c.owner).unwrap_or(0),
            })
            .collect();

        let mut rejections = Vec::new();
        let mut eligible: Vec<Campaign> = Vec::new();
        for campaign in candidates {
            match self.eligibility(&campaign, now) {
                None => eligible.push(campaign),
                Some(reason) => rejections.push(Rejection {
                    campaign_id: campaign.id,
                    reason,
                }),
            }
        }

        // Deterministic ordering: priority desc, rate desc, id asc.
        eligible.sort_by(|a, b| {
            b.priority
                .cmp(&a.priority)
                .then_with(|| b.rate_cents.cmp(&a.rate_cents))
                .then_with(|| a.id.cmp(&b.id))
        });

        let decision_id = Uuid::new_v4();
        let mut winners = Vec::new();
        for campaign in eligible {
            if winners.len() >= placement.max_slots {
                rejections.push(Rejection {
                    campaign_id: campaign.id,
                    reason: RejectionReason::OutOfSlots,
                });
                continue;
            }

            match campaign.inventory_type {
                InventoryType::Featured => {
                    // Reserve budget headroom before touching the wallet; the
                    // store serializes concurrent reservations per campaign,
                    // so at most one allocation can cross the total budget.
                    if self
                        .campaigns
                        .reserve_spend(&campaign.id, campaign.rate_cents)
                        .is_none()
                    {
                        rejections.push(Rejection {
                            campaign_id: campaign.id,
                            reason: RejectionReason::BudgetExhausted,
                        });
                        continue;
                    }
                    let reference = format!("alloc:{decision_id}:{}", campaign.id);
                    match self.debit_with_retries(&campaign.owner, campaign.rate_cents, &reference)
                    {
                        Ok(_) => {
                            self.pacer.note_spend(&campaign.id, campaign.rate_cents, now);
                            winners.push(winner_of(&campaign));
                        }
                        Err(AdboardError::InsufficientBalance(_)) => {
                            // Failed debit: back out the reservation and try
                            // the next-best candidate.
                            self.campaigns.release_spend(&campaign.id, campaign.rate_cents);
                            rejections.push(Rejection {
                                campaign_id: campaign.id,
                                reason: RejectionReason::InsufficientBalance,
                            });
                        }
                        Err(e) => {
                            self.campaigns.release_spend(&campaign.id, campaign.rate_cents);
                            return Err(e);
                        }
                    }
                }
                // No charge at allocation time; click events debit later.
                InventoryType::Cpc => winners.push(winner_of(&campaign)),
            }
        }

        let outcome = AllocationOutcome {
            fallback_used: winners.is_empty(),
            winners,
            rejection_log: rejections,
        };
        if outcome.fallback_used {
            metrics::counter!("allocation.fallbacks").increment(1);
        } else {
            metrics::counter!("allocation.winners").increment(outcome.winners.len() as u64);
        }
        info!(
            slug = %placement.slug,
            winners = outcome.winners.len(),
            rejections = outcome.rejection_log.len(),
            fallback = outcome.fallback_used,
            "Allocation decided"
        );
        self.record_decision(request, &outcome, snapshots, started);
        Ok(outcome)
    }

    /// Bill a click against a cpc campaign: debit the owner's wallet for the
    /// supplied cost (or the campaign rate) and update spend. Returns the
    /// new wallet balance.
    pub fn record_click(&self, event: &ClickEvent) -> AdboardResult<i64> {
        if event.click_id.is_empty() {
            return Err(AdboardError::Validation("click_id must not be empty".into()));
        }
        if event.cost_cents.is_some_and(|c| c <= 0) {
            return Err(AdboardError::Validation(
                "cost_cents must be positive when supplied".into(),
            ));
        }

        let campaign = self
            .campaigns
            .get(&event.campaign_id)
            .ok_or_else(|| AdboardError::NotFound(format!("campaign {}", event.campaign_id)))?;
        if campaign.inventory_type != InventoryType::Cpc {
            return Err(AdboardError::Validation(format!(
                "campaign {} is not cpc inventory",
                campaign.id
            )));
        }
        match campaign.status {
            CampaignStatus::Active => {}
            CampaignStatus::BudgetExhausted => {
                return Err(AdboardError::BudgetExceeded(format!(
                    "campaign {} budget exhausted",
                    campaign.id
                )))
            }
            status => {
                return Err(AdboardError::Validation(format!(
                    "campaign {} is not active ({status:?})",
                    campaign.id
                )))
            }
        }

        let cost = event.cost_cents.unwrap_or(campaign.rate_cents);
        if self.campaigns.reserve_spend(&campaign.id, cost).is_none() {
            return Err(AdboardError::BudgetExceeded(format!(
                "campaign {} has no remaining budget",
                campaign.id
            )));
        }
        let reference = format!("click:{}", event.click_id);
        let balance = match self.debit_with_retries(&campaign.owner, cost, &reference) {
            Ok(balance) => balance,
            Err(e) => {
                self.campaigns.release_spend(&campaign.id, cost);
                return Err(e);
            }
        };
        self.pacer.note_spend(&campaign.id, cost, Utc::now());
        metrics::counter!("allocation.clicks_billed").increment(1);
        Ok(balance)
    }

    /// `None` when the campaign is allocatable; otherwise the rejection
    /// reason to log.
    fn eligibility(&self, campaign: &Campaign, now: DateTime<Utc>) -> Option<RejectionReason> {
        if campaign.status != CampaignStatus::Active {
            return Some(RejectionReason::NotEligible);
        }
        if campaign.start_date > now || campaign.end_date.is_some_and(|end| end < now) {
            return Some(RejectionReason::NotEligible);
        }
        if self.ledger.balance(&campaign.owner).unwrap_or(0) <= 0 {
            return Some(RejectionReason::InsufficientBalance);
        }
        if campaign
            .remaining_budget_cents()
            .is_some_and(|remaining| remaining <= 0)
        {
            return Some(RejectionReason::BudgetExhausted);
        }
        if self
            .pacer
            .daily_remaining(campaign, now.date_naive())
            .is_some_and(|remaining| remaining <= 0)
        {
            // Same-day-scoped exclusion from the daily cap.
            return Some(RejectionReason::BudgetExhausted);
        }
        None
    }

    fn debit_with_retries(
        &self,
        owner: &str,
        amount_cents: i64,
        reference: &str,
    ) -> AdboardResult<i64> {
        let mut attempt = 0;
        loop {
            match self.ledger.debit(owner, amount_cents, reference) {
                Err(AdboardError::ConcurrencyConflict(msg))
                    if attempt < self.max_debit_retries =>
                {
                    attempt += 1;
                    metrics::counter!("ledger.debit_retries").increment(1);
                    debug!(owner = owner, attempt = attempt, error = %msg, "Retrying wallet debit");
                }
                other => return other,
            }
        }
    }

    fn record_decision(
        &self,
        request: &AllocationRequest,
        outcome: &AllocationOutcome,
        candidates: Vec<CandidateSnapshot>,
        started: Instant,
    ) {
        self.decisions.record(AllocationDecision {
            id: Uuid::new_v4(),
            placement_slug: request.placement_slug.clone(),
            candidates,
            winners: outcome.winners.clone(),
            rejection_log: outcome.rejection_log.clone(),
            fallback_used: outcome.fallback_used,
            duration_us: started.elapsed().as_micros() as u64,
            created_at: Utc::now(),
        });
    }
}

fn winner_of(campaign: &Campaign) -> Winner {
    Winner {
        owner: campaign.owner.clone(),
        campaign_id: campaign.id,
        inventory_type: campaign.inventory_type,
        rate_cents: campaign.rate_cents,
    }
}

fn validate_request(request: &AllocationRequest) -> AdboardResult<()> {
    if request.placement_slug.is_empty() {
        return Err(AdboardError::Validation(
            "placement_slug must not be empty".into(),
        ));
    }
    if request.placement_slug.len() > MAX_SLUG_LEN {
        return Err(AdboardError::Validation(
            "placement_slug exceeds maximum length".into(),
        ));
    }
    Ok(())
}
