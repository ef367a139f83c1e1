use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Pricing model for a placement slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InventoryType {
    /// Pay-per-win: the winner's rate is debited once at allocation time.
    Featured,
    /// Pay-per-click: no charge at allocation; click events trigger the debit.
    Cpc,
}

/// A named slot on a page where a winning campaign's creative may appear.
/// Immutable during a request; edited out-of-band.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Placement {
    pub slug: String,
    pub page: String,
    pub position: String,
    pub inventory_type: InventoryType,
    pub max_slots: usize,
    pub base_rate_cents: i64,
    pub is_active: bool,
}

/// Campaign lifecycle state. Spend mutations come from the allocation
/// engine; status mutations come from the budget pacer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CampaignStatus {
    Pending,
    Active,
    Paused,
    BudgetExhausted,
    Completed,
}

/// An advertiser's funded, scheduled bid to win placements.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Campaign {
    pub id: Uuid,
    pub owner: String,
    pub placement_slug: String,
    pub inventory_type: InventoryType,
    /// Bid/price per win (featured) or per click (cpc).
    pub rate_cents: i64,
    pub priority: i32,
    pub daily_budget_cents: Option<i64>,
    pub total_budget_cents: Option<i64>,
    pub total_spent_cents: i64,
    pub status: CampaignStatus,
    pub start_date: DateTime<Utc>,
    pub end_date: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Campaign {
    /// Remaining total budget, or `None` when no total budget is set.
    pub fn remaining_budget_cents(&self) -> Option<i64> {
        self.total_budget_cents
            .map(|total| total - self.total_spent_cents)
    }
}

/// Auto-top-up settings for a wallet.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AutoTopupConfig {
    pub threshold_cents: i64,
    pub amount_cents: i64,
}

/// An advertiser's prepaid balance.
/// Invariant: `balance_cents = lifetime_deposited_cents - lifetime_spent_cents`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WalletAccount {
    pub owner: String,
    pub balance_cents: i64,
    pub lifetime_deposited_cents: i64,
    pub lifetime_spent_cents: i64,
    pub low_balance_threshold_cents: Option<i64>,
    pub auto_topup: Option<AutoTopupConfig>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionType {
    Deposit,
    Spend,
    Refund,
    Adjustment,
}

/// One entry in the append-only wallet transaction log.
/// `balance_after_cents` of transaction *n* must equal that of *n-1*
/// plus/minus `amount_cents` of *n*, per owner, in creation order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WalletTransaction {
    pub id: Uuid,
    pub owner: String,
    pub txn_type: TransactionType,
    pub amount_cents: i64,
    pub balance_after_cents: i64,
    pub reference: String,
    pub created_at: DateTime<Utc>,
}

/// Why a candidate campaign was excluded from an allocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectionReason {
    NotEligible,
    InsufficientBalance,
    BudgetExhausted,
    OutOfSlots,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Rejection {
    pub campaign_id: Uuid,
    pub reason: RejectionReason,
}

/// State of a candidate at decision time, captured for the audit trail.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CandidateSnapshot {
    pub campaign_id: Uuid,
    pub owner: String,
    pub priority: i32,
    pub rate_cents: i64,
    pub remaining_budget_cents: Option<i64>,
    pub wallet_balance_cents: i64,
}

/// A winning campaign in an allocation response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Winner {
    pub owner: String,
    pub campaign_id: Uuid,
    pub inventory_type: InventoryType,
    pub rate_cents: i64,
}

/// Write-once audit record for a single allocation invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AllocationDecision {
    pub id: Uuid,
    pub placement_slug: String,
    pub candidates: Vec<CandidateSnapshot>,
    pub winners: Vec<Winner>,
    pub rejection_log: Vec<Rejection>,
    pub fallback_used: bool,
    pub duration_us: u64,
    pub created_at: DateTime<Utc>,
}

/// Per-day performance rollup, materialized by an external aggregator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DailyStat {
    pub campaign_id: Uuid,
    pub date: NaiveDate,
    pub impressions: u64,
    pub clicks: u64,
    pub conversions: u64,
    pub spend_cents: i64,
}

/// An advertiser's ad creative; tracked for fatigue detection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Creative {
    pub id: Uuid,
    pub owner: String,
    pub campaign_id: Uuid,
    pub is_active: bool,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Grade {
    A,
    B,
    C,
    D,
    F,
}

/// Composite 0-100 account-health metric. Derived, never independently mutated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthScore {
    pub owner: String,
    pub score: u32,
    pub grade: Grade,
    pub computed_at: DateTime<Utc>,
}

/// Insight severity, ordered most severe first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Critical,
    Warning,
    Info,
}

/// A generated, actionable recommendation. Regenerated each run,
/// not persisted as source of truth.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Insight {
    pub id: Uuid,
    pub owner: String,
    pub severity: Severity,
    pub category: String,
    pub description: String,
    pub action: String,
}

// ---------------------------------------------------------------------------
// Request / response boundary
// ---------------------------------------------------------------------------

/// Inbound placement request from the rendering layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AllocationRequest {
    pub placement_slug: String,
    #[serde(default)]
    pub candidate_owners: Option<Vec<String>>,
    #[serde(default)]
    pub device_type: Option<String>,
    #[serde(default)]
    pub page: Option<String>,
    #[serde(default)]
    pub scenario: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AllocationResponse {
    pub winners: Vec<Winner>,
    pub fallback_used: bool,
}

/// Inbound click event for cpc inventory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClickEvent {
    pub campaign_id: Uuid,
    #[serde(default)]
    pub cost_cents: Option<i64>,
    pub click_id: String,
}

/// Inbound top-up notification from the payment collaborator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TopupNotification {
    pub owner: String,
    pub amount_cents: i64,
    pub reference: String,
}

// ---------------------------------------------------------------------------
// Emitted events
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlatformEventType {
    LowBalance,
    BudgetExhausted,
    CampaignStatusChanged,
    TopupFailed,
}

/// Outbound event consumed by an external notifier.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlatformEvent {
    pub event_id: Uuid,
    pub event_type: PlatformEventType,
    pub owner: String,
    pub campaign_id: Option<Uuid>,
    pub amount_cents: Option<i64>,
    pub detail: Option<String>,
    pub timestamp: DateTime<Utc>,
}
