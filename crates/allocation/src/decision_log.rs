//! Decision audit trail — fire-and-forget recording of every allocation
//! decision. Uses a channel-based background writer so a slow or failed
//! write never blocks the allocation response.

use adboard_core::types::AllocationDecision;
use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::warn;

/// Sink for allocation decisions. Implementations must never fail the
/// caller; lost records are tolerated (best-effort durability).
pub trait DecisionSink: Send + Sync {
    fn record(&self, decision: AllocationDecision);
}

/// Append-only in-memory decision store, keyed by placement slug.
pub struct InMemoryDecisionLog {
    decisions: DashMap<String, Vec<AllocationDecision>>,
}

impl InMemoryDecisionLog {
    pub fn new() -> Self {
        Self {
            decisions: DashMap::new(),
        }
    }

    pub fn for_placement(&self, slug: &str) -> Vec<AllocationDecision> {
        self.decisions
            .get(slug)
            .map(|d| d.clone())
            .unwrap_or_default()
    }

    pub fn count(&self) -> usize {
        self.decisions.iter().map(|d| d.len()).sum()
    }
}

impl Default for InMemoryDecisionLog {
    fn default() -> Self {
        Self::new()
    }
}

impl DecisionSink for InMemoryDecisionLog {
    fn record(&self, decision: AllocationDecision) {
        self.decisions
            .entry(decision.placement_slug.clone())
            .or_default()
            .push(decision);
    }
}

/// Decision logger that hands records to a background writer task.
/// `record` is non-blocking; when the buffer is full the record is dropped
/// and counted, never surfaced to the allocation caller.
pub struct BackgroundDecisionLogger {
    sender: mpsc::Sender<AllocationDecision>,
    log: Arc<InMemoryDecisionLog>,
}

impl BackgroundDecisionLogger {
    /// Create the logger and spawn its writer task. Requires a tokio runtime.
    pub fn new(buffer_size: usize) -> Self {
        let (sender, mut receiver) = mpsc::channel::<AllocationDecision>(buffer_size);
        let log = Arc::new(InMemoryDecisionLog::new());

        let writer = log.clone();
        tokio::spawn(async move {
            while let Some(decision) = receiver.recv().await {
                writer.record(decision);
            }
        });

        Self { sender, log }
    }

    pub fn log(&self) -> Arc<InMemoryDecisionLog> {
        self.log.clone()
    }
}

impl DecisionSink for BackgroundDecisionLogger {
    fn record(&self, decision: AllocationDecision) {
        if let Err(e) = self.sender.try_send(decision) {
            metrics::counter!("decision_log.dropped").increment(1);
            warn!(error = %e, "Allocation decision dropped");
        } else {
            metrics::counter!("decision_log.queued").increment(1);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use adboard_core::types::{AllocationDecision, Rejection, RejectionReason};
    use chrono::Utc;
    use uuid::Uuid;

    fn sample_decision(slug: &str) -> AllocationDecision {
        AllocationDecision {
            id: Uuid::new_v4(),
            placement_slug: slug.to_string(),
            candidates: Vec::new(),
            winners: Vec::new(),
            rejection_log: vec![Rejection {
                campaign_id: Uuid::new_v4(),
                reason: RejectionReason::NotEligible,
            }],
            fallback_used: true,
            duration_us: 42,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_in_memory_log_appends() {
        let log = InMemoryDecisionLog::new();
        log.record(sample_decision("home_hero"));
        log.record(sample_decision("home_hero"));
        log.record(sample_decision("sidebar"));

        assert_eq!(log.for_placement("home_hero").len(), 2);
        assert_eq!(log.count(), 3);
    }

    #[tokio::test]
    async fn test_background_logger_drains_to_store() {
        let logger = BackgroundDecisionLogger::new(16);
        logger.record(sample_decision("home_hero"));

        // Give the writer task a chance to drain the channel.
        for _ in 0..50 {
            if logger.log().count() == 1 {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        }
        assert_eq!(logger.log().for_placement("home_hero").len(), 1);
    }
}
