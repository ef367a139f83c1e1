//! Budget pacer — campaign status state machine plus same-day spend caps.

pub mod pacer;

pub use pacer::BudgetPacer;
