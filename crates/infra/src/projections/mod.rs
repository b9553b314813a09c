//! Disposable read-model projections.
//!
//! Projections consume published envelopes (JSON payloads) and maintain
//! queryable read models for the reporting surfaces the engine itself does
//! not render. They are idempotent under at-least-once delivery: a
//! per-aggregate cursor ignores replays at or below the last applied
//! sequence number and rejects gaps. Read models carry no authority and can
//! always be rebuilt from the event store.

pub mod budget_position;
pub mod requisition_pipeline;
pub mod stock_on_hand;

pub use budget_position::{BudgetPosition, BudgetPositionProjection};
pub use requisition_pipeline::{PipelineEntry, RequisitionPipelineProjection};
pub use stock_on_hand::{StockOnHand, StockOnHandProjection};

use std::collections::HashMap;
use std::sync::RwLock;

use thiserror::Error;

use procura_core::AggregateId;

#[derive(Debug, Error)]
pub enum ProjectionError {
    #[error("failed to deserialize projected event: {0}")]
    Deserialize(String),

    #[error("non-monotonic sequence number (last={last}, found={found})")]
    NonMonotonicSequence { last: u64, found: u64 },
}

/// Per-aggregate sequence cursors shared by every projection.
///
/// `admit` returns `Ok(false)` for replays (sequence at or below the
/// cursor), `Ok(true)` when the event should be applied, and an error on a
/// gap. The first event of a stream may carry any positive sequence; after
/// that increments must be strictly `+1`.
#[derive(Debug, Default)]
pub struct StreamCursors {
    inner: RwLock<HashMap<AggregateId, u64>>,
}

impl StreamCursors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn admit(&self, aggregate_id: AggregateId, seq: u64) -> Result<bool, ProjectionError> {
        let last = self
            .inner
            .read()
            .ok()
            .and_then(|map| map.get(&aggregate_id).copied())
            .unwrap_or(0);

        if seq == 0 {
            return Err(ProjectionError::NonMonotonicSequence { last, found: seq });
        }
        if seq <= last {
            // Duplicate or replay; safe to ignore.
            return Ok(false);
        }
        if last != 0 && seq != last + 1 {
            return Err(ProjectionError::NonMonotonicSequence { last, found: seq });
        }
        Ok(true)
    }

    /// Advance the cursor after a successful apply.
    pub fn advance(&self, aggregate_id: AggregateId, seq: u64) {
        if let Ok(mut map) = self.inner.write() {
            map.insert(aggregate_id, seq);
        }
    }

    /// Forget all cursors (rebuild support).
    pub fn reset(&self) {
        if let Ok(mut map) = self.inner.write() {
            map.clear();
        }
    }
}

/// Sort envelopes into deterministic replay order (aggregate, sequence).
pub(crate) fn replay_order(
    envelopes: impl IntoIterator<Item = procura_events::EventEnvelope<serde_json::Value>>,
) -> Vec<procura_events::EventEnvelope<serde_json::Value>> {
    let mut envs: Vec<_> = envelopes.into_iter().collect();
    envs.sort_by_key(|e| (*e.aggregate_id().as_uuid().as_bytes(), e.sequence_number()));
    envs
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn replays_are_ignored_and_gaps_rejected() {
        let cursors = StreamCursors::new();
        let id = AggregateId::new();

        assert!(cursors.admit(id, 1).unwrap());
        cursors.advance(id, 1);

        // Replay of an applied sequence is a no-op, not an error.
        assert!(!cursors.admit(id, 1).unwrap());

        // Gap after the first applied event is an error.
        let err = cursors.admit(id, 3).unwrap_err();
        assert!(matches!(
            err,
            ProjectionError::NonMonotonicSequence { last: 1, found: 3 }
        ));

        assert!(cursors.admit(id, 2).unwrap());
    }

    #[test]
    fn first_event_may_start_anywhere_positive() {
        let cursors = StreamCursors::new();
        let id = AggregateId::new();

        assert!(cursors.admit(id, 5).unwrap());
        assert!(cursors.admit(id, 0).is_err());
    }
}
