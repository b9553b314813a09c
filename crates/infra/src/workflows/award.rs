//! Tender award workflow.
//!
//! Awarding a tender touches four aggregates: the budget (reconcile the
//! estimate reservation to the bid amount), the requisition (flip to
//! `Approved` at the bid amount), the winning and competing bids, and the
//! tender itself. The ledger reconciliation runs first with a compensating
//! re-reservation, because it is the only step that can fail on enforcement
//! grounds; the status transitions are pre-validated against loaded state.

use chrono::Utc;
use serde_json::Value as JsonValue;

use procura_auth::{Action, Actor, CapabilityTable};
use procura_core::{Money, ProcurementError};
use procura_events::{EventBus, EventEnvelope};
use procura_ledger::budget::{ReleaseFunds, ReserveFunds};
use procura_ledger::{BudgetAllocation, BudgetCommand, BudgetId};
use procura_purchasing::order::CreateOrder;
use procura_purchasing::{PurchaseOrder, PurchaseOrderCommand, PurchaseOrderId};
use procura_requisitions::requisition::MarkApproved;
use procura_requisitions::{Requisition, RequisitionCommand, RequisitionId, RequisitionStatus};
use procura_sourcing::bid::{AwardBid, DisqualifyBid};
use procura_sourcing::tender::AwardTender;
use procura_sourcing::{Bid, BidCommand, BidId, BidStatus, Tender, TenderCommand, TenderId, TenderStatus};

use crate::aggregate_type;
use crate::dispatcher::{CommandDispatcher, DispatchError};
use crate::event_store::EventStore;

pub struct AwardWorkflow<'a, S, B> {
    dispatcher: &'a CommandDispatcher<S, B>,
    capabilities: &'a CapabilityTable,
}

impl<'a, S, B> AwardWorkflow<'a, S, B>
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

    /// Award `winning` on `tender`, disqualifying `competing` bids.
    ///
    /// Budget is committed at the bid amount: the estimate reservation made
    /// at final-stage approval is released and the bid amount reserved in
    /// its place, as a compensated pair against the same budget.
    pub fn award(
        &self,
        actor: &Actor,
        tender_id: TenderId,
        winning: BidId,
        competing: &[BidId],
    ) -> Result<(), DispatchError> {
        self.capabilities
            .authorize(actor, Action::AwardTender)
            .map_err(DispatchError::from)?;

        let tender = self
            .dispatcher
            .load_aggregate(tender_id.0, |id| Tender::empty(TenderId::new(id)))?;
        if !matches!(tender.status(), TenderStatus::Evaluating | TenderStatus::Closed) {
            return Err(DispatchError::from(ProcurementError::invalid_transition(
                tender.status().as_str(),
                "award",
            )));
        }

        let bid = self
            .dispatcher
            .load_aggregate(winning.0, |id| Bid::empty(BidId::new(id)))?;
        if bid.status() != BidStatus::Qualified {
            return Err(DispatchError::from(ProcurementError::invalid_transition(
                bid.status().as_str(),
                "award",
            )));
        }
        let bid_amount = bid.amount();

        let requisition_id = tender
            .requisition()
            .ok_or_else(|| DispatchError::from(ProcurementError::not_found()))?;
        let requisition = self
            .dispatcher
            .load_aggregate(requisition_id.0, |id| Requisition::empty(RequisitionId::new(id)))?;
        if !requisition.all_stages_approved()
            || requisition.status() == RequisitionStatus::Approved
        {
            return Err(DispatchError::from(ProcurementError::out_of_sequence(
                "requisition has not cleared its approval chain",
            )));
        }
        let estimate = requisition.total().map_err(DispatchError::from)?;
        let budget = requisition
            .budget()
            .ok_or_else(|| DispatchError::from(ProcurementError::not_found()))?;

        // 1) Ledger reconciliation: estimate out, bid amount in.
        self.release(actor, budget, estimate, requisition_id)?;
        if let Err(err) = self.reserve(actor, budget, bid_amount, requisition_id) {
            // Compensate: restore the estimate reservation.
            self.reserve(actor, budget, estimate, requisition_id)?;
            return Err(err);
        }

        // 2) Requisition flips to Approved at the bid amount.
        let marked = self.dispatcher.dispatch(
            actor.user_id,
            requisition_id.0,
            aggregate_type::REQUISITION,
            RequisitionCommand::MarkApproved(MarkApproved {
                requisition_id,
                total: bid_amount,
                occurred_at: Utc::now(),
            }),
            |id| Requisition::empty(RequisitionId::new(id)),
        );
        if let Err(err) = marked {
            self.release(actor, budget, bid_amount, requisition_id)?;
            self.reserve(actor, budget, estimate, requisition_id)?;
            return Err(err);
        }

        // 3) Bid outcomes.
        self.dispatcher.dispatch(
            actor.user_id,
            winning.0,
            aggregate_type::BID,
            BidCommand::Award(AwardBid {
                bid_id: winning,
                occurred_at: Utc::now(),
            }),
            |id| Bid::empty(BidId::new(id)),
        )?;

        for &loser in competing {
            let state = self
                .dispatcher
                .load_aggregate(loser.0, |id| Bid::empty(BidId::new(id)))?;
            if !matches!(state.status(), BidStatus::Submitted | BidStatus::Qualified) {
                continue;
            }
            self.dispatcher.dispatch(
                actor.user_id,
                loser.0,
                aggregate_type::BID,
                BidCommand::Disqualify(DisqualifyBid {
                    bid_id: loser,
                    reason: "tender awarded to another bidder".to_string(),
                    occurred_at: Utc::now(),
                }),
                |id| Bid::empty(BidId::new(id)),
            )?;
        }

        // 4) Tender records the award.
        self.dispatcher.dispatch(
            actor.user_id,
            tender_id.0,
            aggregate_type::TENDER,
            TenderCommand::Award(AwardTender {
                tender_id,
                bid: winning,
                occurred_at: Utc::now(),
            }),
            |id| Tender::empty(TenderId::new(id)),
        )?;

        Ok(())
    }

    /// Raise a purchase order from an awarded bid.
    pub fn raise_order(
        &self,
        actor: &Actor,
        order_id: PurchaseOrderId,
        winning: BidId,
    ) -> Result<(), DispatchError> {
        self.capabilities
            .authorize(actor, Action::CreatePurchaseOrder)
            .map_err(DispatchError::from)?;

        let bid = self
            .dispatcher
            .load_aggregate(winning.0, |id| Bid::empty(BidId::new(id)))?;
        if bid.status() != BidStatus::Awarded {
            return Err(DispatchError::from(ProcurementError::invalid_transition(
                bid.status().as_str(),
                "raise_order",
            )));
        }
        let tender_id = bid
            .tender()
            .ok_or_else(|| DispatchError::from(ProcurementError::not_found()))?;
        let tender = self
            .dispatcher
            .load_aggregate(tender_id.0, |id| Tender::empty(TenderId::new(id)))?;
        let requisition_id = tender
            .requisition()
            .ok_or_else(|| DispatchError::from(ProcurementError::not_found()))?;
        let supplier = bid
            .supplier()
            .ok_or_else(|| DispatchError::from(ProcurementError::not_found()))?;

        let lines: Vec<_> = bid
            .lines()
            .iter()
            .map(|line| (line.item, line.quantity, line.unit_price))
            .collect();

        self.dispatcher.dispatch(
            actor.user_id,
            order_id.0,
            aggregate_type::PURCHASE_ORDER,
            PurchaseOrderCommand::Create(CreateOrder {
                order_id,
                requisition: requisition_id,
                bid: Some(winning),
                supplier,
                lines,
                occurred_at: Utc::now(),
            }),
            |id| PurchaseOrder::empty(PurchaseOrderId::new(id)),
        )?;
        Ok(())
    }

    fn reserve(
        &self,
        actor: &Actor,
        budget: BudgetId,
        amount: Money,
        reference: RequisitionId,
    ) -> Result<(), DispatchError> {
        self.dispatcher.dispatch(
            actor.user_id,
            budget.0,
            aggregate_type::BUDGET,
            BudgetCommand::ReserveFunds(ReserveFunds {
                budget_id: budget,
                amount,
                reference: reference.0,
                occurred_at: Utc::now(),
            }),
            |id| BudgetAllocation::empty(BudgetId::new(id)),
        )?;
        Ok(())
    }

    fn release(
        &self,
        actor: &Actor,
        budget: BudgetId,
        amount: Money,
        reference: RequisitionId,
    ) -> Result<(), DispatchError> {
        self.dispatcher.dispatch(
            actor.user_id,
            budget.0,
            aggregate_type::BUDGET,
            BudgetCommand::ReleaseFunds(ReleaseFunds {
                budget_id: budget,
                amount,
                reference: reference.0,
                occurred_at: Utc::now(),
            }),
            |id| BudgetAllocation::empty(BudgetId::new(id)),
        )?;
        Ok(())
    }
}
