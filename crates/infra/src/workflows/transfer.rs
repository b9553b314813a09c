//! Inter-store stock transfer workflow.
//!
//! A transfer is an issue at the source and a receipt at the destination,
//! valued at the source's weighted-average cost at the moment of issue.
//! If the destination receipt fails, the issued quantity is received back
//! at the source at the same cost.

use chrono::Utc;
use serde_json::Value as JsonValue;

use procura_auth::{Action, Actor, CapabilityTable};
use procura_core::{AggregateId, ProcurementError};
use procura_events::{EventBus, EventEnvelope};
use procura_ledger::stock::{IssueStock, ReceiveStock};
use procura_ledger::{StockCommand, StockItem, StockItemId};

use crate::aggregate_type;
use crate::dispatcher::{CommandDispatcher, DispatchError};
use crate::event_store::EventStore;

pub struct StockTransferWorkflow<'a, S, B> {
    dispatcher: &'a CommandDispatcher<S, B>,
    capabilities: &'a CapabilityTable,
}

impl<'a, S, B> StockTransferWorkflow<'a, S, B>
where
    S: EventStore,
    B: EventBus<EventEnvelope<JsonValue>>,
{
    pub fn new(dispatcher: &'a CommandDispatcher<S, B>, capabilities: &'a CapabilityTable) -> Self {
        Self {
            dispatcher,
            capabilities,
        }
    }

    /// Move `quantity` units from `source` to `destination`.
    pub fn transfer(
        &self,
        actor: &Actor,
        source: StockItemId,
        destination: StockItemId,
        quantity: i64,
        reference: AggregateId,
    ) -> Result<(), DispatchError> {
        self.capabilities
            .authorize(actor, Action::TransferStock)
            .map_err(DispatchError::from)?;

        if source == destination {
            return Err(DispatchError::from(ProcurementError::validation(
                "transfer source and destination are the same stock item",
            )));
        }

        let from = self
            .dispatcher
            .load_aggregate(source.0, |id| StockItem::empty(StockItemId::new(id)))?;
        let to = self
            .dispatcher
            .load_aggregate(destination.0, |id| StockItem::empty(StockItemId::new(id)))?;

        match (from.item(), to.item()) {
            (Some(a), Some(b)) if a == b => {}
            _ => {
                return Err(DispatchError::from(ProcurementError::validation(
                    "transfer endpoints must track the same catalog item",
                )));
            }
        }

        // Valuation is fixed before the issue so both movements carry the
        // same unit cost.
        let unit_cost = from.average_unit_cost();

        self.dispatcher.dispatch(
            actor.user_id,
            source.0,
            aggregate_type::STOCK_ITEM,
            StockCommand::IssueStock(IssueStock {
                stock_item_id: source,
                quantity,
                reference,
                occurred_at: Utc::now(),
            }),
            |id| StockItem::empty(StockItemId::new(id)),
        )?;

        let received = self.dispatcher.dispatch(
            actor.user_id,
            destination.0,
            aggregate_type::STOCK_ITEM,
            StockCommand::ReceiveStock(ReceiveStock {
                stock_item_id: destination,
                quantity,
                unit_cost,
                reference,
                occurred_at: Utc::now(),
            }),
            |id| StockItem::empty(StockItemId::new(id)),
        );
        if let Err(err) = received {
            // Receive the issued quantity back at the cost it left with.
            self.dispatcher.dispatch(
                actor.user_id,
                source.0,
                aggregate_type::STOCK_ITEM,
                StockCommand::ReceiveStock(ReceiveStock {
                    stock_item_id: source,
                    quantity,
                    unit_cost,
                    reference,
                    occurred_at: Utc::now(),
                }),
                |id| StockItem::empty(StockItemId::new(id)),
            )?;
            return Err(err);
        }
        Ok(())
    }
}
