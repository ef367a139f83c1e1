//! Wallet ledger — per-advertiser prepaid balances with an append-only
//! transaction log. All mutation goes through atomic per-owner operations.

pub mod wallet;

pub use wallet::{PaymentProvider, WalletLedger};
