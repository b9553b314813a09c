//! Payment settlement workflow.
//!
//! Completing a payment is the moment the budget's commitment becomes
//! spend: the bank fact is recorded first, then the settlement posts to
//! the ledger (committed out at the order total, actual in at the amount
//! paid), then the invoice is marked paid. A failed invoice flip reverses
//! the settlement so the ledger and the invoice never disagree.

use chrono::Utc;
use serde_json::Value as JsonValue;

use procura_auth::{Action, Actor, CapabilityTable};
use procura_core::ProcurementError;
use procura_events::{EventBus, EventEnvelope};
use procura_ledger::budget::{ReverseSettlement, SettleFunds};
use procura_ledger::{BudgetAllocation, BudgetCommand, BudgetId};
use procura_purchasing::{PurchaseOrder, PurchaseOrderId};
use procura_requisitions::{Requisition, RequisitionId};
use procura_settlement::invoice::MarkPaid;
use procura_settlement::payment::{CompletePayment, FailPayment};
use procura_settlement::{
    Invoice, InvoiceCommand, InvoiceId, InvoiceStatus, Payment, PaymentCommand, PaymentId,
    PaymentStatus,
};

use crate::aggregate_type;
use crate::dispatcher::{CommandDispatcher, DispatchError};
use crate::event_store::EventStore;

pub struct PaymentWorkflow<'a, S, B> {
    dispatcher: &'a CommandDispatcher<S, B>,
    capabilities: &'a CapabilityTable,
}

impl<'a, S, B> PaymentWorkflow<'a, S, B>
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

    /// Record a completed bank payment and settle it against the budget.
    pub fn complete(
        &self,
        actor: &Actor,
        payment_id: PaymentId,
        bank_reference: impl Into<String>,
    ) -> Result<(), DispatchError> {
        self.capabilities
            .authorize(actor, Action::ExecutePayment)
            .map_err(DispatchError::from)?;

        let payment = self
            .dispatcher
            .load_aggregate(payment_id.0, |id| Payment::empty(PaymentId::new(id)))?;
        if payment.status() != PaymentStatus::Pending {
            return Err(DispatchError::from(ProcurementError::invalid_transition(
                payment.status().as_str(),
                "complete",
            )));
        }
        let invoice_id = payment
            .invoice()
            .ok_or_else(|| DispatchError::from(ProcurementError::not_found()))?;
        let invoice = self
            .dispatcher
            .load_aggregate(invoice_id.0, |id| Invoice::empty(InvoiceId::new(id)))?;
        if invoice.status() != InvoiceStatus::Approved {
            return Err(DispatchError::from(ProcurementError::out_of_sequence(
                "invoice must be approved before settlement",
            )));
        }
        let order_id = invoice
            .order()
            .ok_or_else(|| DispatchError::from(ProcurementError::not_found()))?;
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

        // 1) Bank fact.
        self.dispatcher.dispatch(
            actor.user_id,
            payment_id.0,
            aggregate_type::PAYMENT,
            PaymentCommand::Complete(CompletePayment {
                payment_id,
                bank_reference: bank_reference.into(),
                occurred_at: Utc::now(),
            }),
            |id| Payment::empty(PaymentId::new(id)),
        )?;

        // 2) Ledger settlement: commitment out at the order total, spend in
        //    at the amount actually paid.
        let actual = payment.amount();
        self.dispatcher.dispatch(
            actor.user_id,
            budget.0,
            aggregate_type::BUDGET,
            BudgetCommand::SettleFunds(SettleFunds {
                budget_id: budget,
                committed_amount: committed,
                actual_amount: actual,
                reference: payment_id.0,
                occurred_at: Utc::now(),
            }),
            |id| BudgetAllocation::empty(BudgetId::new(id)),
        )?;

        // 3) Invoice flips to Paid; reverse the settlement if it cannot.
        let marked = self.dispatcher.dispatch(
            actor.user_id,
            invoice_id.0,
            aggregate_type::INVOICE,
            InvoiceCommand::MarkPaid(MarkPaid {
                invoice_id,
                payment: payment_id.0,
                occurred_at: Utc::now(),
            }),
            |id| Invoice::empty(InvoiceId::new(id)),
        );
        if let Err(err) = marked {
            self.dispatcher.dispatch(
                actor.user_id,
                budget.0,
                aggregate_type::BUDGET,
                BudgetCommand::ReverseSettlement(ReverseSettlement {
                    budget_id: budget,
                    committed_amount: committed,
                    actual_amount: actual,
                    reference: payment_id.0,
                    occurred_at: Utc::now(),
                }),
                |id| BudgetAllocation::empty(BudgetId::new(id)),
            )?;
            return Err(err);
        }
        Ok(())
    }

    /// Record a failed bank payment. The budget is untouched; the invoice
    /// stays approved for a retry.
    pub fn fail(
        &self,
        actor: &Actor,
        payment_id: PaymentId,
        reason: impl Into<String>,
    ) -> Result<(), DispatchError> {
        self.capabilities
            .authorize(actor, Action::ExecutePayment)
            .map_err(DispatchError::from)?;

        self.dispatcher.dispatch(
            actor.user_id,
            payment_id.0,
            aggregate_type::PAYMENT,
            PaymentCommand::Fail(FailPayment {
                payment_id,
                reason: reason.into(),
                occurred_at: Utc::now(),
            }),
            |id| Payment::empty(PaymentId::new(id)),
        )?;
        Ok(())
    }
}
