//! Command execution pipeline.
//!
//! One consistent path for every aggregate command:
//!
//! 1. load the aggregate's stream from the event store
//! 2. rehydrate the aggregate by replaying history
//! 3. `handle` the command (pure decision logic)
//! 4. append the decided events with an exact expected version
//! 5. publish the committed envelopes to the bus
//!
//! Per-aggregate serialization comes from step 4: the append expects the
//! exact version observed in step 1, so interleaving writers surface as
//! `DispatchError::Concurrency` instead of lost updates.
//!
//! Publication failure after a successful append is *not* an error: the
//! events are durable and consumers are rebuildable from the store, so the
//! dispatcher logs a `tracing::warn!` and returns the committed events.

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value as JsonValue;
use uuid::Uuid;

use procura_core::{Aggregate, AggregateId, ExpectedVersion, ProcurementError, UserId};
use procura_events::{EventBus, EventEnvelope};

use crate::event_store::{EventStore, EventStoreError, StoredEvent, UncommittedEvent};

#[derive(Debug)]
pub enum DispatchError {
    /// Optimistic concurrency failure (stale aggregate version).
    Concurrency(String),
    /// Deterministic domain failure, carried verbatim.
    Domain(ProcurementError),
    /// Failed to deserialize historical payloads into the aggregate's event
    /// type.
    Deserialize(String),
    /// Persisting to the event store failed.
    Store(EventStoreError),
}

impl From<EventStoreError> for DispatchError {
    fn from(value: EventStoreError) -> Self {
        match value {
            EventStoreError::Concurrency(msg) => DispatchError::Concurrency(msg),
            other => DispatchError::Store(other),
        }
    }
}

impl From<ProcurementError> for DispatchError {
    fn from(value: ProcurementError) -> Self {
        match value {
            ProcurementError::Conflict(msg) => DispatchError::Concurrency(msg),
            other => DispatchError::Domain(other),
        }
    }
}

impl core::fmt::Display for DispatchError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            DispatchError::Concurrency(msg) => write!(f, "concurrency conflict: {msg}"),
            DispatchError::Domain(err) => write!(f, "{err}"),
            DispatchError::Deserialize(msg) => write!(f, "event deserialization failed: {msg}"),
            DispatchError::Store(err) => write!(f, "event store failure: {err}"),
        }
    }
}

impl std::error::Error for DispatchError {}

/// Reusable command execution engine for event-sourced aggregates.
///
/// Generic over the store and bus so tests run against the in-memory pair
/// and production swaps in Postgres without touching domain code.
#[derive(Debug)]
pub struct CommandDispatcher<S, B> {
    store: S,
    bus: B,
}

impl<S, B> CommandDispatcher<S, B> {
    pub fn new(store: S, bus: B) -> Self {
        Self { store, bus }
    }

    pub fn into_parts(self) -> (S, B) {
        (self.store, self.bus)
    }
}

impl<S, B> CommandDispatcher<S, B>
where
    S: EventStore,
    B: EventBus<EventEnvelope<JsonValue>>,
{
    /// Dispatch a command through the full pipeline.
    ///
    /// `make_aggregate` constructs the empty aggregate the history is
    /// replayed into (e.g. `|id| Requisition::empty(RequisitionId::new(id))`),
    /// keeping the dispatcher decoupled from aggregate constructors.
    ///
    /// An empty decided-event list (idempotent no-op at the aggregate)
    /// returns `Ok(vec![])` without touching the store.
    pub fn dispatch<A>(
        &self,
        actor: UserId,
        aggregate_id: AggregateId,
        aggregate_type: impl Into<String>,
        command: A::Command,
        make_aggregate: impl FnOnce(AggregateId) -> A,
    ) -> Result<Vec<StoredEvent>, DispatchError>
    where
        A: Aggregate<Error = ProcurementError>,
        A::Event: procura_events::Event + Serialize + DeserializeOwned,
    {
        // 1) Load history
        let history = self.store.load_stream(aggregate_id)?;
        validate_loaded_stream(aggregate_id, &history)?;
        let expected = ExpectedVersion::Exact(stream_version(&history));

        // 2) Rehydrate
        let mut aggregate = make_aggregate(aggregate_id);
        apply_history::<A>(&mut aggregate, &history)?;

        // 3) Decide (no mutation)
        let decided = aggregate.handle(&command).map_err(DispatchError::from)?;
        if decided.is_empty() {
            return Ok(vec![]);
        }

        // 4) Persist (append-only, optimistic)
        let aggregate_type = aggregate_type.into();
        let uncommitted = decided
            .iter()
            .map(|ev| {
                UncommittedEvent::from_typed(
                    aggregate_id,
                    aggregate_type.clone(),
                    actor,
                    Uuid::now_v7(),
                    ev,
                )
            })
            .collect::<Result<Vec<_>, _>>()?;

        let committed = self.store.append(uncommitted, expected)?;

        // 5) Publish committed events. Failure is degraded mode, not an
        //    error: the append is durable and read models rebuild.
        for stored in &committed {
            if let Err(e) = self.bus.publish(stored.to_envelope()) {
                tracing::warn!(
                    aggregate_id = %stored.aggregate_id,
                    event_type = %stored.event_type,
                    sequence_number = stored.sequence_number,
                    error = ?e,
                    "event publication failed after append; consumers lag until rebuild"
                );
            }
        }

        Ok(committed)
    }

    /// Load and rehydrate an aggregate without dispatching a command.
    ///
    /// Workflow services use this to read cross-aggregate state (a
    /// requisition total, a PO unit price) before deciding what to dispatch.
    pub fn load_aggregate<A>(
        &self,
        aggregate_id: AggregateId,
        make_aggregate: impl FnOnce(AggregateId) -> A,
    ) -> Result<A, DispatchError>
    where
        A: Aggregate,
        A::Event: DeserializeOwned,
    {
        let history = self.store.load_stream(aggregate_id)?;
        validate_loaded_stream(aggregate_id, &history)?;

        let mut aggregate = make_aggregate(aggregate_id);
        apply_history::<A>(&mut aggregate, &history)?;
        Ok(aggregate)
    }
}

fn stream_version(stream: &[StoredEvent]) -> u64 {
    stream.last().map(|e| e.sequence_number).unwrap_or(0)
}

fn validate_loaded_stream(
    aggregate_id: AggregateId,
    stream: &[StoredEvent],
) -> Result<(), DispatchError> {
    // Reject mixed or non-monotonic streams even if a buggy backend returns
    // them.
    let mut last = 0u64;
    for (idx, e) in stream.iter().enumerate() {
        if e.aggregate_id != aggregate_id {
            return Err(DispatchError::Store(EventStoreError::InvalidAppend(format!(
                "loaded stream contains wrong aggregate_id at index {idx}"
            ))));
        }
        if e.sequence_number == 0 {
            return Err(DispatchError::Store(EventStoreError::InvalidAppend(
                "stored event has sequence_number=0".to_string(),
            )));
        }
        if e.sequence_number <= last {
            return Err(DispatchError::Store(EventStoreError::InvalidAppend(format!(
                "non-monotonic sequence_number in loaded stream (last={last}, found={})",
                e.sequence_number
            ))));
        }
        last = e.sequence_number;
    }
    Ok(())
}

fn apply_history<A>(aggregate: &mut A, history: &[StoredEvent]) -> Result<(), DispatchError>
where
    A: Aggregate,
    A::Event: DeserializeOwned,
{
    // Deterministic replay order.
    let mut sorted = history.to_vec();
    sorted.sort_by_key(|e| e.sequence_number);

    for stored in sorted {
        let ev: A::Event = serde_json::from_value(stored.payload)
            .map_err(|e| DispatchError::Deserialize(e.to_string()))?;
        aggregate.apply(&ev);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::Utc;
    use procura_events::InMemoryEventBus;
    use procura_ledger::budget::{BudgetAllocation, BudgetCommand, OpenBudget, ReserveFunds};
    use procura_ledger::{BudgetId, Enforcement, FiscalYear};
    use procura_core::{DepartmentId, Money};

    use super::*;
    use crate::event_store::InMemoryEventStore;

    type Bus = Arc<InMemoryEventBus<EventEnvelope<JsonValue>>>;

    fn setup() -> (CommandDispatcher<InMemoryEventStore, Bus>, Bus) {
        let bus: Bus = Arc::new(InMemoryEventBus::new());
        (CommandDispatcher::new(InMemoryEventStore::new(), bus.clone()), bus)
    }

    fn open_cmd(budget_id: BudgetId) -> BudgetCommand {
        BudgetCommand::OpenBudget(OpenBudget {
            budget_id,
            department: DepartmentId::new(),
            fiscal_year: FiscalYear(2026),
            category: None,
            allocated: Money::from_minor(100_000),
            enforcement: Enforcement::Hard,
            occurred_at: Utc::now(),
        })
    }

    #[test]
    fn dispatch_persists_and_publishes() {
        let (dispatcher, bus) = setup();
        let sub = bus.subscribe();
        let actor = UserId::new();
        let id = AggregateId::new();
        let budget_id = BudgetId::new(id);

        let committed = dispatcher
            .dispatch(actor, id, "ledger.budget", open_cmd(budget_id), |id| {
                BudgetAllocation::empty(BudgetId::new(id))
            })
            .unwrap();

        assert_eq!(committed.len(), 1);
        assert_eq!(committed[0].sequence_number, 1);
        assert_eq!(committed[0].actor, actor);

        let published = sub.drain();
        assert_eq!(published.len(), 1);
        assert_eq!(published[0].aggregate_type(), "ledger.budget");
    }

    #[test]
    fn domain_failure_leaves_the_stream_untouched() {
        let (dispatcher, _bus) = setup();
        let actor = UserId::new();
        let id = AggregateId::new();
        let budget_id = BudgetId::new(id);

        dispatcher
            .dispatch(actor, id, "ledger.budget", open_cmd(budget_id), |id| {
                BudgetAllocation::empty(BudgetId::new(id))
            })
            .unwrap();

        let err = dispatcher
            .dispatch(
                actor,
                id,
                "ledger.budget",
                BudgetCommand::ReserveFunds(ReserveFunds {
                    budget_id,
                    amount: Money::from_minor(200_000),
                    reference: AggregateId::new(),
                    occurred_at: Utc::now(),
                }),
                |id| BudgetAllocation::empty(BudgetId::new(id)),
            )
            .unwrap_err();
        assert!(matches!(
            err,
            DispatchError::Domain(ProcurementError::InsufficientBudget { .. })
        ));

        let budget = dispatcher
            .load_aggregate(id, |id| BudgetAllocation::empty(BudgetId::new(id)))
            .unwrap();
        assert_eq!(budget.committed(), Money::ZERO);
    }

    #[test]
    fn idempotent_no_op_appends_nothing() {
        let (dispatcher, bus) = setup();
        let sub = bus.subscribe();
        let actor = UserId::new();
        let id = AggregateId::new();
        let budget_id = BudgetId::new(id);

        dispatcher
            .dispatch(actor, id, "ledger.budget", open_cmd(budget_id), |id| {
                BudgetAllocation::empty(BudgetId::new(id))
            })
            .unwrap();
        sub.drain();

        // Re-opening conflicts rather than duplicating the stream.
        let err = dispatcher
            .dispatch(actor, id, "ledger.budget", open_cmd(budget_id), |id| {
                BudgetAllocation::empty(BudgetId::new(id))
            })
            .unwrap_err();
        assert!(matches!(err, DispatchError::Concurrency(_)));
        assert!(sub.drain().is_empty());
    }
}
