//! Allocation engine — deterministic winner selection for placement
//! requests, with reserve-and-check debits and an audit trail of every
//! decision.

pub mod decision_log;
pub mod engine;

pub use decision_log::{BackgroundDecisionLogger, DecisionSink, InMemoryDecisionLog};
pub use engine::{AllocationEngine, AllocationOutcome};
