//! Account health scoring and rule-based insight generation. Read-only
//! batch computations over bounded recent windows; never mutates campaign,
//! wallet, or decision state.

pub mod generator;
pub mod health;

pub use generator::InsightGenerator;
pub use health::{HealthScorer, OwnerSignals};
