use serde::{Deserialize, Serialize};
use uuid::Uuid;

use procura_core::{AggregateId, UserId};

/// Envelope for a committed event, carrying stream metadata and the acting
/// user.
///
/// This is the unit published to consumers (audit trail, notifications,
/// projections). `sequence_number` is monotonically increasing per aggregate
/// stream; `actor` is the caller identity that triggered the transition and
/// feeds the audit record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventEnvelope<E> {
    event_id: Uuid,
    aggregate_id: AggregateId,
    aggregate_type: String,
    actor: UserId,

    /// Monotonically increasing position in the aggregate stream.
    sequence_number: u64,

    payload: E,
}

impl<E> EventEnvelope<E> {
    pub fn new(
        event_id: Uuid,
        aggregate_id: AggregateId,
        aggregate_type: impl Into<String>,
        actor: UserId,
        sequence_number: u64,
        payload: E,
    ) -> Self {
        Self {
            event_id,
            aggregate_id,
            aggregate_type: aggregate_type.into(),
            actor,
            sequence_number,
            payload,
        }
    }

    pub fn event_id(&self) -> Uuid {
        self.event_id
    }

    pub fn aggregate_id(&self) -> AggregateId {
        self.aggregate_id
    }

    pub fn aggregate_type(&self) -> &str {
        &self.aggregate_type
    }

    pub fn actor(&self) -> UserId {
        self.actor
    }

    pub fn sequence_number(&self) -> u64 {
        self.sequence_number
    }

    pub fn payload(&self) -> &E {
        &self.payload
    }

    pub fn into_payload(self) -> E {
        self.payload
    }
}
