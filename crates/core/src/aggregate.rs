//! Aggregate root trait for event-sourced domain models.

use crate::error::{DomainResult, ProcurementError};

/// Aggregate root marker + minimal interface.
///
/// Intentionally small so each procurement module decides how it models
/// state transitions without pulling in infrastructure concerns.
pub trait AggregateRoot {
    /// Strongly-typed aggregate identifier.
    type Id: Clone + Eq + core::hash::Hash + core::fmt::Debug;

    fn id(&self) -> &Self::Id;

    /// Monotonically increasing version of the aggregate's state.
    ///
    /// Corresponds to the number of events applied (the stream revision).
    fn version(&self) -> u64;
}

/// Optimistic concurrency expectation for an aggregate stream.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ExpectedVersion {
    /// Skip version checking (idempotent commands, migrations).
    Any,
    /// Require the stream to be at an exact version.
    Exact(u64),
}

impl ExpectedVersion {
    pub fn matches(self, actual: u64) -> bool {
        match self {
            ExpectedVersion::Any => true,
            ExpectedVersion::Exact(v) => v == actual,
        }
    }

    pub fn check(self, actual: u64) -> DomainResult<()> {
        if self.matches(actual) {
            Ok(())
        } else {
            Err(ProcurementError::conflict(format!(
                "optimistic concurrency check failed (expected: {self:?}, actual: {actual})"
            )))
        }
    }
}

/// Aggregate execution semantics (pure, deterministic).
///
/// - **Decision logic**: `handle(&self, cmd)` returns events.
/// - **State mutation**: `apply(&mut self, event)` evolves state.
///
/// Aggregates must not perform IO or side effects; they only return events
/// describing what happened. An empty event list from `handle` means the
/// command was a no-op against current state (e.g. re-approving an already
/// approved stage).
pub trait Aggregate: AggregateRoot {
    type Command: Clone + core::fmt::Debug;
    type Event: Clone + core::fmt::Debug;
    type Error: core::fmt::Debug;

    /// Evolve in-memory state from a single event. Deterministic; +1 version
    /// per applied event.
    fn apply(&mut self, event: &Self::Event);

    /// Decide which events to emit given current state and a command.
    /// Must not mutate state.
    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error>;
}
