use serde_json::Value as JsonValue;

use procura_core::{DepartmentId, Money};
use procura_events::EventEnvelope;
use procura_ledger::{BudgetEvent, BudgetId, Enforcement, FiscalYear};

use crate::aggregate_type;
use crate::read_model::ReadStore;

use super::{ProjectionError, StreamCursors, replay_order};

/// Queryable budget position: allocated / committed / spent per allocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BudgetPosition {
    pub budget_id: BudgetId,
    pub department: DepartmentId,
    pub fiscal_year: FiscalYear,
    pub enforcement: Enforcement,
    pub allocated: Money,
    pub committed: Money,
    pub spent: Money,
}

impl BudgetPosition {
    pub fn available(&self) -> Money {
        self.allocated - self.committed - self.spent
    }
}

/// Budget position projection over `ledger.budget` streams.
#[derive(Debug)]
pub struct BudgetPositionProjection<S>
where
    S: ReadStore<BudgetId, BudgetPosition>,
{
    store: S,
    cursors: StreamCursors,
}

impl<S> BudgetPositionProjection<S>
where
    S: ReadStore<BudgetId, BudgetPosition>,
{
    pub fn new(store: S) -> Self {
        Self {
            store,
            cursors: StreamCursors::new(),
        }
    }

    pub fn get(&self, budget_id: &BudgetId) -> Option<BudgetPosition> {
        self.store.get(budget_id)
    }

    pub fn list(&self) -> Vec<BudgetPosition> {
        self.store.list()
    }

    /// Apply one published envelope. Envelopes from other aggregate types
    /// are ignored; replays are idempotent.
    pub fn apply_envelope(
        &self,
        envelope: &EventEnvelope<JsonValue>,
    ) -> Result<(), ProjectionError> {
        if envelope.aggregate_type() != aggregate_type::BUDGET {
            return Ok(());
        }
        if !self.cursors.admit(envelope.aggregate_id(), envelope.sequence_number())? {
            return Ok(());
        }

        let event: BudgetEvent = serde_json::from_value(envelope.payload().clone())
            .map_err(|e| ProjectionError::Deserialize(e.to_string()))?;

        match event {
            BudgetEvent::BudgetOpened(e) => {
                self.store.upsert(
                    e.budget_id,
                    BudgetPosition {
                        budget_id: e.budget_id,
                        department: e.department,
                        fiscal_year: e.fiscal_year,
                        enforcement: e.enforcement,
                        allocated: e.allocated,
                        committed: Money::ZERO,
                        spent: Money::ZERO,
                    },
                );
            }
            BudgetEvent::FundsReserved(e) => {
                if let Some(mut position) = self.store.get(&e.budget_id) {
                    position.committed = e.committed_after;
                    self.store.upsert(e.budget_id, position);
                }
            }
            BudgetEvent::FundsReleased(e) => {
                if let Some(mut position) = self.store.get(&e.budget_id) {
                    position.committed = e.committed_after;
                    self.store.upsert(e.budget_id, position);
                }
            }
            BudgetEvent::FundsSettled(e) => {
                if let Some(mut position) = self.store.get(&e.budget_id) {
                    position.committed = e.committed_after;
                    position.spent = e.spent_after;
                    self.store.upsert(e.budget_id, position);
                }
            }
            BudgetEvent::SettlementReversed(e) => {
                if let Some(mut position) = self.store.get(&e.budget_id) {
                    position.committed = e.committed_after;
                    position.spent = e.spent_after;
                    self.store.upsert(e.budget_id, position);
                }
            }
        }

        self.cursors.advance(envelope.aggregate_id(), envelope.sequence_number());
        Ok(())
    }

    /// Rebuild from scratch by replaying envelopes in deterministic order.
    pub fn rebuild_from_scratch(
        &self,
        envelopes: impl IntoIterator<Item = EventEnvelope<JsonValue>>,
    ) -> Result<(), ProjectionError> {
        self.cursors.reset();
        self.store.clear();

        for envelope in replay_order(envelopes) {
            self.apply_envelope(&envelope)?;
        }
        Ok(())
    }
}
