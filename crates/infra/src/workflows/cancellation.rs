//! Purchase order cancellation workflow.
//!
//! Cancelling an order must undo exactly the ledger effects the order
//! caused: the commitment reserved for it is released in full, no more and
//! no less. The cancellation is recorded first (the business fact), then
//! the release posts to the budget the order's requisition draws on.

use chrono::Utc;
use serde_json::Value as JsonValue;

use procura_auth::{Action, Actor, CapabilityTable};
use procura_core::ProcurementError;
use procura_events::{EventBus, EventEnvelope};
use procura_ledger::budget::ReleaseFunds;
use procura_ledger::{BudgetAllocation, BudgetCommand, BudgetId};
use procura_purchasing::order::CancelOrder;
use procura_purchasing::{PurchaseOrder, PurchaseOrderCommand, PurchaseOrderId};
use procura_requisitions::{Requisition, RequisitionId};

use crate::aggregate_type;
use crate::dispatcher::{CommandDispatcher, DispatchError};
use crate::event_store::EventStore;

pub struct OrderCancellationWorkflow<'a, S, B> {
    dispatcher: &'a CommandDispatcher<S, B>,
    capabilities: &'a CapabilityTable,
}

impl<'a, S, B> OrderCancellationWorkflow<'a, S, B>
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

    /// Cancel an order and release the commitment it held.
    ///
    /// The released amount is the order total, which is what approval (or
    /// award reconciliation) reserved for it. The requisition stays
    /// approved; a replacement order can be raised and reserves afresh.
    pub fn cancel(
        &self,
        actor: &Actor,
        order_id: PurchaseOrderId,
        reason: impl Into<String>,
    ) -> Result<(), DispatchError> {
        self.capabilities
            .authorize(actor, Action::CancelPurchaseOrder)
            .map_err(DispatchError::from)?;

        let order = self
            .dispatcher
            .load_aggregate(order_id.0, |id| PurchaseOrder::empty(PurchaseOrderId::new(id)))?;
        let committed = order.total().map_err(DispatchError::from)?;
        let requisition_id = order
            .requisition()
            .ok_or_else(|| DispatchError::from(ProcurementError::not_found()))?;
        let requisition = self
            .dispatcher
            .load_aggregate(requisition_id.0, |id| Requisition::empty(RequisitionId::new(id)))?;
        let budget = requisition
            .budget()
            .ok_or_else(|| DispatchError::from(ProcurementError::not_found()))?;

        // 1) The cancellation itself. The aggregate refuses once delivery
        //    has started, so no release can happen for a live order.
        self.dispatcher.dispatch(
            actor.user_id,
            order_id.0,
            aggregate_type::PURCHASE_ORDER,
            PurchaseOrderCommand::Cancel(CancelOrder {
                order_id,
                reason: reason.into(),
                occurred_at: Utc::now(),
            }),
            |id| PurchaseOrder::empty(PurchaseOrderId::new(id)),
        )?;

        // 2) Release exactly what the order committed.
        self.dispatcher.dispatch(
            actor.user_id,
            budget.0,
            aggregate_type::BUDGET,
            BudgetCommand::ReleaseFunds(ReleaseFunds {
                budget_id: budget,
                amount: committed,
                reference: requisition_id.0,
                occurred_at: Utc::now(),
            }),
            |id| BudgetAllocation::empty(BudgetId::new(id)),
        )?;
        Ok(())
    }
}
