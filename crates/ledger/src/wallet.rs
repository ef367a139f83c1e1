//! Per-owner wallet accounts and the append-only transaction log.
//!
//! Every debit/credit for a given owner runs under that owner's lock: the
//! balance check, the balance write, and the transaction append are one
//! atomic unit. Different owners' wallets are independent and impose no
//! cross-locking.

use adboard_core::error::{AdboardError, AdboardResult};
use adboard_core::event_bus::{make_event, EventSink};
use adboard_core::types::{
    AutoTopupConfig, PlatformEventType, TransactionType, WalletAccount, WalletTransaction,
};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

/// External payment collaborator. The ledger asks it for a top-up and only
/// credits the wallet on success; card capture is out of scope here.
pub trait PaymentProvider: Send + Sync {
    /// Request a top-up; returns a payment reference on success.
    fn request_topup(&self, owner: &str, amount_cents: i64) -> AdboardResult<String>;
}

struct WalletState {
    account: WalletAccount,
    transactions: Vec<WalletTransaction>,
    /// Debounce latch: records when the last low-balance alert fired,
    /// cleared when the balance rises back above the threshold.
    low_balance_alerted_at: Option<DateTime<Utc>>,
    /// Single-attempt latch for auto-top-up, cleared the same way.
    topup_attempted: bool,
}

pub struct WalletLedger {
    wallets: DashMap<String, Arc<Mutex<WalletState>>>,
    events: Arc<dyn EventSink>,
    payments: Option<Arc<dyn PaymentProvider>>,
    default_low_balance_threshold_cents: Option<i64>,
}

impl WalletLedger {
    pub fn new(events: Arc<dyn EventSink>) -> Self {
        Self {
            wallets: DashMap::new(),
            events,
            payments: None,
            default_low_balance_threshold_cents: None,
        }
    }

    pub fn with_payment_provider(mut self, provider: Arc<dyn PaymentProvider>) -> Self {
        self.payments = Some(provider);
        self
    }

    /// Threshold applied to accounts that don't set their own, including
    /// accounts auto-created by a first deposit.
    pub fn with_low_balance_threshold(mut self, cents: i64) -> Self {
        self.default_low_balance_threshold_cents = Some(cents);
        self
    }

    /// Open (or reconfigure) an account. Balance and history are preserved
    /// when the account already exists.
    pub fn open_account(
        &self,
        owner: &str,
        low_balance_threshold_cents: Option<i64>,
        auto_topup: Option<AutoTopupConfig>,
    ) {
        let state = self.wallet_entry(owner);
        let mut state = state.lock();
        state.account.low_balance_threshold_cents =
            low_balance_threshold_cents.or(self.default_low_balance_threshold_cents);
        state.account.auto_topup = auto_topup;
        info!(owner = owner, "Wallet account opened");
    }

    /// Credit a deposit (e.g. from a top-up notification). Auto-creates the
    /// account on first deposit. Returns the new balance.
    pub fn credit(&self, owner: &str, amount_cents: i64, reference: &str) -> AdboardResult<i64> {
        self.credit_as(owner, amount_cents, TransactionType::Deposit, reference)
    }

    /// Credit a refund. Returns the new balance.
    pub fn refund(&self, owner: &str, amount_cents: i64, reference: &str) -> AdboardResult<i64> {
        self.credit_as(owner, amount_cents, TransactionType::Refund, reference)
    }

    fn credit_as(
        &self,
        owner: &str,
        amount_cents: i64,
        txn_type: TransactionType,
        reference: &str,
    ) -> AdboardResult<i64> {
        if amount_cents <= 0 {
            return Err(AdboardError::Validation(format!(
                "credit amount must be positive, got {amount_cents}"
            )));
        }

        let state = self.wallet_entry(owner);
        let mut state = state.lock();
        Self::apply_credit(&mut state, amount_cents, txn_type, reference);
        metrics::counter!("ledger.credits").increment(1);
        Ok(state.account.balance_cents)
    }

    /// Debit spend from an owner's wallet. Fails with `InsufficientBalance`
    /// when the debit would drive the balance negative; no transaction is
    /// written in that case. Returns the new balance (after any triggered
    /// auto-top-up).
    pub fn debit(&self, owner: &str, amount_cents: i64, reference: &str) -> AdboardResult<i64> {
        if amount_cents <= 0 {
            return Err(AdboardError::Validation(format!(
                "debit amount must be positive, got {amount_cents}"
            )));
        }

        let state = match self.wallets.get(owner) {
            Some(entry) => entry.clone(),
            None => {
                metrics::counter!("ledger.insufficient_balance").increment(1);
                return Err(AdboardError::InsufficientBalance(format!(
                    "no wallet for owner {owner}"
                )));
            }
        };
        let mut state = state.lock();

        if state.account.balance_cents < amount_cents {
            metrics::counter!("ledger.insufficient_balance").increment(1);
            return Err(AdboardError::InsufficientBalance(format!(
                "owner {owner}: requested {amount_cents}, balance {}",
                state.account.balance_cents
            )));
        }

        let now = Utc::now();
        state.account.balance_cents -= amount_cents;
        state.account.lifetime_spent_cents += amount_cents;
        state.account.updated_at = now;
        let balance_after = state.account.balance_cents;
        let transaction = WalletTransaction {
            id: Uuid::new_v4(),
            owner: owner.to_string(),
            txn_type: TransactionType::Spend,
            amount_cents,
            balance_after_cents: balance_after,
            reference: reference.to_string(),
            created_at: now,
        };
        state.transactions.push(transaction);
        metrics::counter!("ledger.debits").increment(1);

        self.after_debit(owner, &mut state);
        Ok(state.account.balance_cents)
    }

    pub fn balance(&self, owner: &str) -> Option<i64> {
        self.wallets
            .get(owner)
            .map(|entry| entry.lock().account.balance_cents)
    }

    pub fn account(&self, owner: &str) -> Option<WalletAccount> {
        self.wallets
            .get(owner)
            .map(|entry| entry.lock().account.clone())
    }

    /// When the most recent low-balance alert fired for this owner, if one
    /// is still latched.
    pub fn low_balance_alerted_at(&self, owner: &str) -> Option<DateTime<Utc>> {
        self.wallets
            .get(owner)
            .and_then(|entry| entry.lock().low_balance_alerted_at)
    }

    /// Full transaction history for an owner, in creation order.
    pub fn transactions(&self, owner: &str) -> Vec<WalletTransaction> {
        self.wallets
            .get(owner)
            .map(|entry| entry.lock().transactions.clone())
            .unwrap_or_default()
    }

    /// Replay the transaction log and confirm it reconstructs the balance
    /// exactly, with no intermediate negative balance.
    pub fn verify_chain(&self, owner: &str) -> bool {
        let state = match self.wallets.get(owner) {
            Some(entry) => entry.clone(),
            None => return true,
        };
        let state = state.lock();

        let mut running: i64 = 0;
        for txn in &state.transactions {
            match txn.txn_type {
                TransactionType::Deposit | TransactionType::Refund => running += txn.amount_cents,
                TransactionType::Spend => running -= txn.amount_cents,
                TransactionType::Adjustment => running += txn.amount_cents,
            }
            if txn.balance_after_cents != running || running < 0 {
                return false;
            }
        }
        running == state.account.balance_cents
            && state.account.balance_cents
                == state.account.lifetime_deposited_cents - state.account.lifetime_spent_cents
    }

    // -- internal helpers ---------------------------------------------------

    fn wallet_entry(&self, owner: &str) -> Arc<Mutex<WalletState>> {
        self.wallets
            .entry(owner.to_string())
            .or_insert_with(|| {
                let now = Utc::now();
                Arc::new(Mutex::new(WalletState {
                    account: WalletAccount {
                        owner: owner.to_string(),
                        balance_cents: 0,
                        lifetime_deposited_cents: 0,
                        lifetime_spent_cents: 0,
                        low_balance_threshold_cents: self.default_low_balance_threshold_cents,
                        auto_topup: None,
                        updated_at: now,
                    },
                    transactions: Vec::new(),
                    low_balance_alerted_at: None,
                    topup_attempted: false,
                }))
            })
            .clone()
    }

    /// Mutate state under an already-held lock. Clears the alert/top-up
    /// latches when the new balance is back above the thresholds.
    fn apply_credit(
        state: &mut WalletState,
        amount_cents: i64,
        txn_type: TransactionType,
        reference: &str,
    ) {
        let now = Utc::now();
        state.account.balance_cents += amount_cents;
        match txn_type {
            TransactionType::Spend => state.account.lifetime_spent_cents += amount_cents,
            _ => state.account.lifetime_deposited_cents += amount_cents,
        }
        state.account.updated_at = now;
        let balance_after = state.account.balance_cents;
        let owner = state.account.owner.clone();
        state.transactions.push(WalletTransaction {
            id: Uuid::new_v4(),
            owner,
            txn_type,
            amount_cents,
            balance_after_cents: balance_after,
            reference: reference.to_string(),
            created_at: now,
        });

        if let Some(threshold) = state.account.low_balance_threshold_cents {
            if state.account.balance_cents >= threshold {
                state.low_balance_alerted_at = None;
            }
        }
        if let Some(topup) = &state.account.auto_topup {
            if state.account.balance_cents >= topup.threshold_cents {
                state.topup_attempted = false;
            }
        }
    }

    /// Low-balance alerting and auto-top-up, run under the owner's lock
    /// after every successful debit.
    fn after_debit(&self, owner: &str, state: &mut WalletState) {
        if let Some(threshold) = state.account.low_balance_threshold_cents {
            if state.account.balance_cents < threshold && state.low_balance_alerted_at.is_none() {
                state.low_balance_alerted_at = Some(Utc::now());
                metrics::counter!("ledger.low_balance_alerts").increment(1);
                warn!(
                    owner = owner,
                    balance_cents = state.account.balance_cents,
                    threshold_cents = threshold,
                    "Wallet balance below threshold"
                );
                self.events.emit(make_event(
                    PlatformEventType::LowBalance,
                    owner,
                    None,
                    Some(state.account.balance_cents),
                ));
            }
        }

        let topup = match &state.account.auto_topup {
            Some(config) if state.account.balance_cents < config.threshold_cents => config.clone(),
            _ => return,
        };
        if state.topup_attempted {
            return;
        }
        state.topup_attempted = true;

        let Some(provider) = &self.payments else {
            warn!(owner = owner, "Auto-top-up enabled but no payment provider configured");
            return;
        };

        match provider.request_topup(owner, topup.amount_cents) {
            Ok(reference) => {
                info!(
                    owner = owner,
                    amount_cents = topup.amount_cents,
                    reference = %reference,
                    "Auto-top-up credited"
                );
                Self::apply_credit(state, topup.amount_cents, TransactionType::Deposit, &reference);
                metrics::counter!("ledger.auto_topups").increment(1);
            }
            Err(e) => {
                warn!(owner = owner, error = %e, "Auto-top-up request failed");
                metrics::counter!("ledger.auto_topup_failures").increment(1);
                self.events.emit(make_event(
                    PlatformEventType::TopupFailed,
                    owner,
                    None,
                    Some(topup.amount_cents),
                ));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use adboard_core::event_bus::{capture_sink, noop_sink};

    struct ApprovingProvider;
    impl PaymentProvider for ApprovingProvider {
        fn request_topup(&self, _owner: &str, _amount_cents: i64) -> AdboardResult<String> {
            Ok("pay-ref-001".to_string())
        }
    }

    struct DecliningProvider;
    impl PaymentProvider for DecliningProvider {
        fn request_topup(&self, _owner: &str, _amount_cents: i64) -> AdboardResult<String> {
            Err(AdboardError::Payment("card declined".into()))
        }
    }

    #[test]
    fn test_credit_and_debit_reconcile() {
        let ledger = WalletLedger::new(noop_sink());

        assert_eq!(ledger.credit("adv-1", 5_000, "topup-1").unwrap(), 5_000);
        assert_eq!(ledger.debit("adv-1", 1_200, "alloc-1").unwrap(), 3_800);

        let account = ledger.account("adv-1").unwrap();
        assert_eq!(account.lifetime_deposited_cents, 5_000);
        assert_eq!(account.lifetime_spent_cents, 1_200);
        assert_eq!(
            account.balance_cents,
            account.lifetime_deposited_cents - account.lifetime_spent_cents
        );
    }

    #[test]
    fn test_debit_insufficient_balance_writes_nothing() {
        let ledger = WalletLedger::new(noop_sink());
        ledger.credit("adv-1", 50, "topup-1").unwrap();

        let err = ledger.debit("adv-1", 100, "alloc-1").unwrap_err();
        assert!(matches!(err, AdboardError::InsufficientBalance(_)));
        assert_eq!(ledger.balance("adv-1"), Some(50));
        // Only the deposit is on the log.
        assert_eq!(ledger.transactions("adv-1").len(), 1);
    }

    #[test]
    fn test_debit_unknown_owner_fails() {
        let ledger = WalletLedger::new(noop_sink());
        let err = ledger.debit("ghost", 100, "alloc-1").unwrap_err();
        assert!(matches!(err, AdboardError::InsufficientBalance(_)));
    }

    #[test]
    fn test_rejects_non_positive_amounts() {
        let ledger = WalletLedger::new(noop_sink());
        assert!(matches!(
            ledger.credit("adv-1", 0, "x").unwrap_err(),
            AdboardError::Validation(_)
        ));
        assert!(matches!(
            ledger.debit("adv-1", -5, "x").unwrap_err(),
            AdboardError::Validation(_)
        ));
    }

    #[test]
    fn test_chain_replay_reconstructs_balance() {
        let ledger = WalletLedger::new(noop_sink());
        ledger.credit("adv-1", 10_000, "topup-1").unwrap();
        ledger.debit("adv-1", 300, "alloc-1").unwrap();
        ledger.debit("adv-1", 700, "alloc-2").unwrap();
        ledger.refund("adv-1", 300, "refund-alloc-1").unwrap();
        ledger.debit("adv-1", 150, "click-9").unwrap();

        assert_eq!(ledger.balance("adv-1"), Some(9_150));
        assert!(ledger.verify_chain("adv-1"));

        let transactions = ledger.transactions("adv-1");
        assert_eq!(transactions.len(), 5);
        assert!(transactions.iter().all(|t| t.balance_after_cents >= 0));
    }

    #[test]
    fn test_low_balance_alert_is_debounced() {
        let sink = capture_sink();
        let ledger = WalletLedger::new(sink.clone());
        ledger.open_account("adv-1", Some(1_000), None);
        ledger.credit("adv-1", 1_500, "topup-1").unwrap();

        // Crossing the threshold fires exactly one alert and stamps it.
        ledger.debit("adv-1", 600, "alloc-1").unwrap();
        let first_alert = ledger.low_balance_alerted_at("adv-1").unwrap();
        ledger.debit("adv-1", 100, "alloc-2").unwrap();
        assert_eq!(sink.count_type(PlatformEventType::LowBalance), 1);
        assert_eq!(ledger.low_balance_alerted_at("adv-1"), Some(first_alert));

        // Recovering above the threshold clears the latch and re-arms.
        ledger.credit("adv-1", 2_000, "topup-2").unwrap();
        assert_eq!(ledger.low_balance_alerted_at("adv-1"), None);
        ledger.debit("adv-1", 2_500, "alloc-3").unwrap();
        assert_eq!(sink.count_type(PlatformEventType::LowBalance), 2);
        assert!(ledger.low_balance_alerted_at("adv-1").unwrap() >= first_alert);
    }

    #[test]
    fn test_default_threshold_applies_to_auto_created_accounts() {
        let sink = capture_sink();
        let ledger = WalletLedger::new(sink.clone()).with_low_balance_threshold(1_000);

        // No open_account call: the first deposit creates the wallet with
        // the ledger-wide default threshold.
        ledger.credit("adv-1", 1_500, "topup-1").unwrap();
        ledger.debit("adv-1", 600, "alloc-1").unwrap();
        assert_eq!(sink.count_type(PlatformEventType::LowBalance), 1);
        assert_eq!(
            ledger.account("adv-1").unwrap().low_balance_threshold_cents,
            Some(1_000)
        );

        // An explicit per-account threshold still wins.
        ledger.open_account("adv-2", Some(50), None);
        assert_eq!(
            ledger.account("adv-2").unwrap().low_balance_threshold_cents,
            Some(50)
        );
    }

    #[test]
    fn test_auto_topup_credits_on_success() {
        let ledger = WalletLedger::new(noop_sink()).with_payment_provider(Arc::new(ApprovingProvider));
        ledger.open_account(
            "adv-1",
            None,
            Some(AutoTopupConfig {
                threshold_cents: 500,
                amount_cents: 2_000,
            }),
        );
        ledger.credit("adv-1", 600, "topup-1").unwrap();

        // Debit drops balance to 100 (< 500): top-up of 2 000 lands.
        let balance = ledger.debit("adv-1", 500, "alloc-1").unwrap();
        assert_eq!(balance, 2_100);
        assert!(ledger.verify_chain("adv-1"));
    }

    #[test]
    fn test_auto_topup_failure_is_single_attempt() {
        let sink = capture_sink();
        let ledger =
            WalletLedger::new(sink.clone()).with_payment_provider(Arc::new(DecliningProvider));
        ledger.open_account(
            "adv-1",
            None,
            Some(AutoTopupConfig {
                threshold_cents: 500,
                amount_cents: 2_000,
            }),
        );
        ledger.credit("adv-1", 600, "topup-1").unwrap();

        ledger.debit("adv-1", 200, "alloc-1").unwrap();
        ledger.debit("adv-1", 100, "alloc-2").unwrap();
        ledger.debit("adv-1", 100, "alloc-3").unwrap();

        // One failed attempt for the crossing, no retry storm.
        assert_eq!(sink.count_type(PlatformEventType::TopupFailed), 1);
    }

    #[test]
    fn test_concurrent_debits_never_oversell() {
        let ledger = Arc::new(WalletLedger::new(noop_sink()));
        ledger.credit("adv-1", 1_000, "topup-1").unwrap();

        let mut handles = Vec::new();
        for i in 0..10 {
            let ledger = ledger.clone();
            handles.push(std::thread::spawn(move || {
                ledger.debit("adv-1", 300, &format!("alloc-{i}")).is_ok()
            }));
        }

        let successes = handles
            .into_iter()
            .map(|h| h.join().expect("debit thread panicked"))
            .filter(|ok| *ok)
            .count();

        // floor(1000 / 300) = 3, regardless of interleaving.
        assert_eq!(successes, 3);
        assert_eq!(ledger.balance("adv-1"), Some(100));
        assert!(ledger.verify_chain("adv-1"));
    }
}
