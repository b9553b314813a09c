use serde_json::Value as JsonValue;

use procura_catalog::CatalogItemId;
use procura_core::Money;
use procura_events::EventEnvelope;
use procura_ledger::{StockEvent, StockItemId, StoreId};

use crate::aggregate_type;
use crate::read_model::ReadStore;

use super::{ProjectionError, StreamCursors, replay_order};

/// Queryable stock position per store/item pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StockOnHand {
    pub stock_item_id: StockItemId,
    pub store: StoreId,
    pub item: CatalogItemId,
    pub quantity_on_hand: i64,
    pub average_unit_cost: Money,
    pub total_value: Money,
}

/// Stock-on-hand projection over `ledger.stock_item` streams.
///
/// Movement events carry their after-balances, so the projection copies
/// them instead of recomputing the weighted average.
#[derive(Debug)]
pub struct StockOnHandProjection<S>
where
    S: ReadStore<StockItemId, StockOnHand>,
{
    store: S,
    cursors: StreamCursors,
}

impl<S> StockOnHandProjection<S>
where
    S: ReadStore<StockItemId, StockOnHand>,
{
    pub fn new(store: S) -> Self {
        Self {
            store,
            cursors: StreamCursors::new(),
        }
    }

    pub fn get(&self, stock_item_id: &StockItemId) -> Option<StockOnHand> {
        self.store.get(stock_item_id)
    }

    pub fn list(&self) -> Vec<StockOnHand> {
        self.store.list()
    }

    pub fn apply_envelope(
        &self,
        envelope: &EventEnvelope<JsonValue>,
    ) -> Result<(), ProjectionError> {
        if envelope.aggregate_type() != aggregate_type::STOCK_ITEM {
            return Ok(());
        }
        if !self.cursors.admit(envelope.aggregate_id(), envelope.sequence_number())? {
            return Ok(());
        }

        let event: StockEvent = serde_json::from_value(envelope.payload().clone())
            .map_err(|e| ProjectionError::Deserialize(e.to_string()))?;

        match event {
            StockEvent::StockItemOpened(e) => {
                self.store.upsert(
                    e.stock_item_id,
                    StockOnHand {
                        stock_item_id: e.stock_item_id,
                        store: e.store,
                        item: e.item,
                        quantity_on_hand: 0,
                        average_unit_cost: Money::ZERO,
                        total_value: Money::ZERO,
                    },
                );
            }
            StockEvent::StockReceived(e) => {
                if let Some(mut on_hand) = self.store.get(&e.stock_item_id) {
                    on_hand.quantity_on_hand = e.quantity_after;
                    on_hand.total_value = e.value_after;
                    on_hand.average_unit_cost = e.average_cost_after;
                    self.store.upsert(e.stock_item_id, on_hand);
                }
            }
            StockEvent::StockIssued(e) => {
                if let Some(mut on_hand) = self.store.get(&e.stock_item_id) {
                    on_hand.quantity_on_hand = e.quantity_after;
                    on_hand.total_value = e.value_after;
                    on_hand.average_unit_cost = e.average_cost_after;
                    self.store.upsert(e.stock_item_id, on_hand);
                }
            }
            StockEvent::StockAdjusted(e) => {
                if let Some(mut on_hand) = self.store.get(&e.stock_item_id) {
                    on_hand.quantity_on_hand = e.quantity_after;
                    on_hand.total_value = e.value_after;
                    on_hand.average_unit_cost = e.average_cost_after;
                    self.store.upsert(e.stock_item_id, on_hand);
                }
            }
        }

        self.cursors.advance(envelope.aggregate_id(), envelope.sequence_number());
        Ok(())
    }

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

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::Utc;
    use procura_core::{AggregateId, UserId};
    use procura_ledger::stock::{StockItemOpened, StockReceived};
    use uuid::Uuid;

    use super::*;
    use crate::read_model::InMemoryReadStore;

    fn envelope(id: StockItemId, seq: u64, event: &StockEvent) -> EventEnvelope<JsonValue> {
        EventEnvelope::new(
            Uuid::now_v7(),
            id.0,
            aggregate_type::STOCK_ITEM,
            UserId::new(),
            seq,
            serde_json::to_value(event).unwrap(),
        )
    }

    #[test]
    fn on_hand_mirrors_movement_after_balances() {
        let projection = StockOnHandProjection::new(Arc::new(InMemoryReadStore::new()));
        let id = StockItemId::new(AggregateId::new());

        let opened = StockEvent::StockItemOpened(StockItemOpened {
            stock_item_id: id,
            store: StoreId::new(AggregateId::new()),
            item: CatalogItemId::new(AggregateId::new()),
            occurred_at: Utc::now(),
        });
        let received = StockEvent::StockReceived(StockReceived {
            stock_item_id: id,
            quantity: 10,
            unit_cost: Money::from_minor(100_00),
            reference: AggregateId::new(),
            quantity_before: 0,
            quantity_after: 10,
            value_before: Money::ZERO,
            value_after: Money::from_minor(1_000_00),
            average_cost_after: Money::from_minor(100_00),
            occurred_at: Utc::now(),
        });

        projection.apply_envelope(&envelope(id, 1, &opened)).unwrap();
        projection.apply_envelope(&envelope(id, 2, &received)).unwrap();

        let on_hand = projection.get(&id).unwrap();
        assert_eq!(on_hand.quantity_on_hand, 10);
        assert_eq!(on_hand.total_value, Money::from_minor(1_000_00));
        assert_eq!(on_hand.average_unit_cost, Money::from_minor(100_00));
    }
}
