//! Goods receipt posting workflow.
//!
//! An inspected GRN is posted in two phases: one stock receipt per accepted
//! line (valued at the order's unit price), then a delivery record on the
//! purchase order. Any failure issues back the receipts already posted so
//! the ledger never holds goods the order does not acknowledge.

use chrono::Utc;
use serde_json::Value as JsonValue;

use procura_auth::{Action, Actor, CapabilityTable};
use procura_catalog::CatalogItemId;
use procura_core::{Money, ProcurementError};
use procura_events::{EventBus, EventEnvelope};
use procura_ledger::stock::{IssueStock, ReceiveStock};
use procura_ledger::{StockCommand, StockItem, StockItemId};
use procura_purchasing::order::RecordDelivery;
use procura_purchasing::{
    GoodsReceivedNote, GrnId, GrnStatus, PurchaseOrder, PurchaseOrderCommand, PurchaseOrderId,
};

use crate::aggregate_type;
use crate::dispatcher::{CommandDispatcher, DispatchError};
use crate::event_store::EventStore;

pub struct ReceivingWorkflow<'a, S, B> {
    dispatcher: &'a CommandDispatcher<S, B>,
    capabilities: &'a CapabilityTable,
}

impl<'a, S, B> ReceivingWorkflow<'a, S, B>
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

    /// Post an inspected GRN: receive accepted quantities into stock and
    /// record the delivery against the purchase order.
    ///
    /// `stock_items` maps each catalog item on the GRN to the stock item
    /// stream it lands in at the receiving store.
    pub fn post(
        &self,
        actor: &Actor,
        grn_id: GrnId,
        stock_items: &[(CatalogItemId, StockItemId)],
    ) -> Result<(), DispatchError> {
        self.capabilities
            .authorize(actor, Action::PostGoodsReceipt)
            .map_err(DispatchError::from)?;

        let grn = self
            .dispatcher
            .load_aggregate(grn_id.0, |id| GoodsReceivedNote::empty(GrnId::new(id)))?;
        if !matches!(grn.status(), GrnStatus::Accepted | GrnStatus::Partial) {
            return Err(DispatchError::from(ProcurementError::invalid_transition(
                grn.status().as_str(),
                "post",
            )));
        }
        let order_id = grn
            .order()
            .ok_or_else(|| DispatchError::from(ProcurementError::not_found()))?;
        let order = self
            .dispatcher
            .load_aggregate(order_id.0, |id| PurchaseOrder::empty(PurchaseOrderId::new(id)))?;

        // Resolve every accepted line before touching state so a missing
        // mapping or price fails the whole posting up front.
        let mut receipts: Vec<(StockItemId, CatalogItemId, i64, Money)> = Vec::new();
        for line in grn.accepted_lines() {
            let stock_item = stock_items
                .iter()
                .find(|(item, _)| *item == line.item)
                .map(|(_, stock_item)| *stock_item)
                .ok_or_else(|| {
                    DispatchError::from(ProcurementError::validation(format!(
                        "no stock item mapped for catalog item {}",
                        line.item
                    )))
                })?;
            let unit_price = order.unit_price_of(line.item).ok_or_else(|| {
                DispatchError::from(ProcurementError::validation(format!(
                    "catalog item {} is not on the order",
                    line.item
                )))
            })?;
            receipts.push((stock_item, line.item, line.quantity_accepted, unit_price));
        }

        let mut posted: Vec<(StockItemId, i64)> = Vec::new();
        for &(stock_item, _, quantity, unit_cost) in &receipts {
            let received = self.dispatcher.dispatch(
                actor.user_id,
                stock_item.0,
                aggregate_type::STOCK_ITEM,
                StockCommand::ReceiveStock(ReceiveStock {
                    stock_item_id: stock_item,
                    quantity,
                    unit_cost,
                    reference: grn_id.0,
                    occurred_at: Utc::now(),
                }),
                |id| StockItem::empty(StockItemId::new(id)),
            );
            if let Err(err) = received {
                self.issue_back(actor, &posted, grn_id)?;
                return Err(err);
            }
            posted.push((stock_item, quantity));
        }

        let deliveries: Vec<(CatalogItemId, i64)> = receipts
            .iter()
            .map(|&(_, item, quantity, _)| (item, quantity))
            .collect();
        let recorded = self.dispatcher.dispatch(
            actor.user_id,
            order_id.0,
            aggregate_type::PURCHASE_ORDER,
            PurchaseOrderCommand::RecordDelivery(RecordDelivery {
                order_id,
                deliveries,
                reference: grn_id.0,
                occurred_at: Utc::now(),
            }),
            |id| PurchaseOrder::empty(PurchaseOrderId::new(id)),
        );
        if let Err(err) = recorded {
            self.issue_back(actor, &posted, grn_id)?;
            return Err(err);
        }
        Ok(())
    }

    fn issue_back(
        &self,
        actor: &Actor,
        posted: &[(StockItemId, i64)],
        grn_id: GrnId,
    ) -> Result<(), DispatchError> {
        for &(stock_item, quantity) in posted {
            self.dispatcher.dispatch(
                actor.user_id,
                stock_item.0,
                aggregate_type::STOCK_ITEM,
                StockCommand::IssueStock(IssueStock {
                    stock_item_id: stock_item,
                    quantity,
                    reference: grn_id.0,
                    occurred_at: Utc::now(),
                }),
                |id| StockItem::empty(StockItemId::new(id)),
            )?;
        }
        Ok(())
    }
}
