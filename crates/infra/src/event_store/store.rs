use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

use procura_core::{AggregateId, ExpectedVersion, UserId};

/// An event ready to be appended to a stream, not yet assigned a sequence
/// number.
///
/// Build one with [`UncommittedEvent::from_typed`]: it serializes the typed
/// domain event to JSON and captures the metadata (`event_type`,
/// `event_version`, `occurred_at`) needed to deserialize it later. The store
/// assigns sequence numbers during append.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UncommittedEvent {
    pub event_id: Uuid,
    pub aggregate_id: AggregateId,
    pub aggregate_type: String,
    /// Identity of the caller that triggered the transition.
    pub actor: UserId,

    pub event_type: String,
    pub event_version: u32,
    pub occurred_at: DateTime<Utc>,

    pub payload: JsonValue,
}

impl UncommittedEvent {
    pub fn from_typed<E>(
        aggregate_id: AggregateId,
        aggregate_type: impl Into<String>,
        actor: UserId,
        event_id: Uuid,
        event: &E,
    ) -> Result<Self, EventStoreError>
    where
        E: procura_events::Event + Serialize,
    {
        let payload = serde_json::to_value(event).map_err(|e| {
            EventStoreError::InvalidAppend(format!("payload serialization failed: {e}"))
        })?;

        Ok(Self {
            event_id,
            aggregate_id,
            aggregate_type: aggregate_type.into(),
            actor,
            event_type: event.event_type().to_string(),
            event_version: event.version(),
            occurred_at: event.occurred_at(),
            payload,
        })
    }
}

/// A persisted event with its assigned sequence number.
///
/// Sequence numbers are per-aggregate-stream, start at 1 and increase by one
/// per event with no gaps. Once assigned they never change; together with the
/// append-only contract this makes the stream the immutable audit trail.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredEvent {
    pub event_id: Uuid,
    pub aggregate_id: AggregateId,
    pub aggregate_type: String,
    pub actor: UserId,

    /// Monotonically increasing position in the aggregate stream.
    pub sequence_number: u64,

    pub event_type: String,
    pub event_version: u32,
    pub occurred_at: DateTime<Utc>,

    pub payload: JsonValue,
}

impl StoredEvent {
    pub fn stream_version(&self) -> u64 {
        self.sequence_number
    }

    /// Convert into the envelope published to consumers.
    pub fn to_envelope(&self) -> procura_events::EventEnvelope<JsonValue> {
        procura_events::EventEnvelope::new(
            self.event_id,
            self.aggregate_id,
            self.aggregate_type.clone(),
            self.actor,
            self.sequence_number,
            self.payload.clone(),
        )
    }
}

/// Event store operation error (infrastructure, not domain).
#[derive(Debug, Error)]
pub enum EventStoreError {
    #[error("optimistic concurrency check failed: {0}")]
    Concurrency(String),

    #[error("aggregate type mismatch: {0}")]
    AggregateTypeMismatch(String),

    #[error("invalid append: {0}")]
    InvalidAppend(String),

    #[error("event publication failed: {0}")]
    Publish(String),
}

/// Append-only event store.
///
/// Events are organized into streams, one per aggregate instance. `append`
/// validates that the whole batch targets one aggregate of one type, checks
/// the optimistic `ExpectedVersion` against the current stream version, and
/// assigns sequence numbers starting at `current + 1` atomically (all events
/// in a batch are persisted or none are). `load_stream` returns the full
/// stream in sequence order, empty if the aggregate does not exist yet.
pub trait EventStore: Send + Sync {
    fn append(
        &self,
        events: Vec<UncommittedEvent>,
        expected_version: ExpectedVersion,
    ) -> Result<Vec<StoredEvent>, EventStoreError>;

    fn load_stream(&self, aggregate_id: AggregateId) -> Result<Vec<StoredEvent>, EventStoreError>;
}

impl<S> EventStore for Arc<S>
where
    S: EventStore + ?Sized,
{
    fn append(
        &self,
        events: Vec<UncommittedEvent>,
        expected_version: ExpectedVersion,
    ) -> Result<Vec<StoredEvent>, EventStoreError> {
        (**self).append(events, expected_version)
    }

    fn load_stream(&self, aggregate_id: AggregateId) -> Result<Vec<StoredEvent>, EventStoreError> {
        (**self).load_stream(aggregate_id)
    }
}
