//! Append-only audit trail fed from committed envelopes.
//!
//! Every committed event becomes one immutable [`AuditRecord`]. The trail is
//! a bus consumer: it never blocks or fails a business transition, and a
//! recording failure degrades to a `tracing::warn!` because the event store
//! itself remains the authoritative history.

use std::sync::RwLock;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use uuid::Uuid;

use procura_core::{AggregateId, UserId};
use procura_events::EventEnvelope;

/// One immutable audit entry: who did what to which aggregate, and when.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditRecord {
    pub event_id: Uuid,
    pub actor: UserId,
    /// The committed event type, e.g. `requisitions.requisition.submitted`.
    pub action: String,
    pub aggregate: AggregateId,
    pub aggregate_type: String,
    pub sequence: u64,
    /// Compact JSON of the event payload.
    pub summary: String,
    pub timestamp: DateTime<Utc>,
}

/// Append-only in-process audit log.
///
/// Records are only ever pushed; there is no mutation or removal surface.
#[derive(Debug, Default)]
pub struct AuditTrail {
    records: RwLock<Vec<AuditRecord>>,
}

impl AuditTrail {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a record for a committed envelope.
    pub fn record(&self, envelope: &EventEnvelope<JsonValue>) {
        let action = event_type_of(envelope)
            .unwrap_or_else(|| envelope.aggregate_type().to_string());

        let record = AuditRecord {
            event_id: envelope.event_id(),
            actor: envelope.actor(),
            action,
            aggregate: envelope.aggregate_id(),
            aggregate_type: envelope.aggregate_type().to_string(),
            sequence: envelope.sequence_number(),
            summary: envelope.payload().to_string(),
            timestamp: Utc::now(),
        };

        match self.records.write() {
            Ok(mut records) => records.push(record),
            Err(_) => tracing::warn!(
                aggregate_id = %envelope.aggregate_id(),
                sequence = envelope.sequence_number(),
                "audit trail lock poisoned; record dropped (event remains in the store)"
            ),
        }
    }

    pub fn records(&self) -> Vec<AuditRecord> {
        self.records.read().map(|r| r.clone()).unwrap_or_default()
    }

    /// Records touching one aggregate, in commit order.
    pub fn for_aggregate(&self, aggregate: AggregateId) -> Vec<AuditRecord> {
        let mut out: Vec<AuditRecord> = self
            .records()
            .into_iter()
            .filter(|r| r.aggregate == aggregate)
            .collect();
        out.sort_by_key(|r| r.sequence);
        out
    }
}

/// Events in this engine serialize as externally-tagged enums, so the
/// payload itself does not carry its type name; the projections deserialize
/// by aggregate type instead. For the audit action we take the enum tag.
fn event_type_of(envelope: &EventEnvelope<JsonValue>) -> Option<String> {
    let obj = envelope.payload().as_object()?;
    let variant = obj.keys().next()?;
    Some(format!("{}.{}", envelope.aggregate_type(), variant))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn envelope(aggregate: AggregateId, seq: u64) -> EventEnvelope<JsonValue> {
        EventEnvelope::new(
            Uuid::now_v7(),
            aggregate,
            "ledger.budget",
            UserId::new(),
            seq,
            serde_json::json!({"FundsReserved": {"amount": 100}}),
        )
    }

    #[test]
    fn records_are_appended_in_commit_order() {
        let trail = AuditTrail::new();
        let aggregate = AggregateId::new();

        trail.record(&envelope(aggregate, 1));
        trail.record(&envelope(AggregateId::new(), 1));
        trail.record(&envelope(aggregate, 2));

        let records = trail.for_aggregate(aggregate);
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].sequence, 1);
        assert_eq!(records[1].sequence, 2);
        assert_eq!(records[0].action, "ledger.budget.FundsReserved");
    }
}
