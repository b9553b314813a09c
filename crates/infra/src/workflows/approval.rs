//! Requisition approval workflow.
//!
//! Resolves the governing threshold bracket at submission, routes stage
//! decisions through the capability table, and couples final approval to the
//! budget reservation: reserve first, flip the requisition second, release
//! the reservation if the flip fails.

use chrono::Utc;
use serde_json::Value as JsonValue;

use procura_auth::{Action, Actor, CapabilityTable};
use procura_core::{Money, ProcurementError};
use procura_events::{EventBus, EventEnvelope};
use procura_ledger::budget::{ReleaseFunds, ReserveFunds};
use procura_ledger::{BudgetAllocation, BudgetCommand, BudgetId};
use procura_requisitions::requisition::{Cancel, Decide, MarkApproved, Submit};
use procura_requisitions::{
    ApprovalPolicy, ApprovalStage, Decision, Requisition, RequisitionCommand, RequisitionId,
    RequisitionStatus,
};

use crate::aggregate_type;
use crate::dispatcher::{CommandDispatcher, DispatchError};
use crate::event_store::EventStore;

pub struct ApprovalWorkflow<'a, S, B> {
    dispatcher: &'a CommandDispatcher<S, B>,
    capabilities: &'a CapabilityTable,
    policy: &'a ApprovalPolicy,
}

impl<'a, S, B> ApprovalWorkflow<'a, S, B>
where
    S: EventStore,
    B: EventBus<EventEnvelope<JsonValue>>,
{
    pub fn new(
        dispatcher: &'a CommandDispatcher<S, B>,
        capabilities: &'a CapabilityTable,
        policy: &'a ApprovalPolicy,
    ) -> Self {
        Self {
            dispatcher,
            capabilities,
            policy,
        }
    }

    fn load_requisition(&self, id: RequisitionId) -> Result<Requisition, DispatchError> {
        self.dispatcher
            .load_aggregate(id.0, |id| Requisition::empty(RequisitionId::new(id)))
    }

    /// Submit a draft requisition, resolving the required stage set and the
    /// tender flag from the approval policy for the line total.
    pub fn submit(&self, actor: &Actor, id: RequisitionId) -> Result<(), DispatchError> {
        self.capabilities
            .authorize(actor, Action::SubmitRequisition)
            .map_err(DispatchError::from)?;

        let requisition = self.load_requisition(id)?;
        let total = requisition.total().map_err(DispatchError::from)?;
        let bracket = self.policy.bracket_for(total).map_err(DispatchError::from)?;

        self.dispatcher.dispatch(
            actor.user_id,
            id.0,
            aggregate_type::REQUISITION,
            RequisitionCommand::Submit(Submit {
                requisition_id: id,
                required_stages: bracket.stages.clone(),
                tender_required: bracket.tender_required,
                occurred_at: Utc::now(),
            }),
            |id| Requisition::empty(RequisitionId::new(id)),
        )?;
        Ok(())
    }

    /// Record a stage decision.
    ///
    /// Approving the final required stage completes the chain: for
    /// tender-exempt requisitions the workflow reserves the line total
    /// against the linked budget and marks the requisition `Approved`; a
    /// tender-required requisition instead reserves the estimate and stays
    /// at its last stage-approved status awaiting award.
    pub fn decide(
        &self,
        actor: &Actor,
        id: RequisitionId,
        stage: ApprovalStage,
        decision: Decision,
        comments: Option<String>,
    ) -> Result<(), DispatchError> {
        self.capabilities
            .authorize(actor, stage.action())
            .map_err(DispatchError::from)?;

        self.dispatcher.dispatch(
            actor.user_id,
            id.0,
            aggregate_type::REQUISITION,
            RequisitionCommand::Decide(Decide {
                requisition_id: id,
                stage,
                approver: actor.user_id,
                decision,
                comments,
                occurred_at: Utc::now(),
            }),
            |id| Requisition::empty(RequisitionId::new(id)),
        )?;

        if decision != Decision::Approved {
            return Ok(());
        }

        let requisition = self.load_requisition(id)?;
        if !requisition.all_stages_approved()
            || requisition.status() == RequisitionStatus::Approved
        {
            return Ok(());
        }

        let total = requisition.total().map_err(DispatchError::from)?;
        let budget = requisition
            .budget()
            .ok_or_else(|| DispatchError::from(ProcurementError::not_found()))?;

        // The reservation covers the estimate either way; only the status
        // flip waits for award on the tender path.
        self.reserve(actor, budget, total, id)?;

        if requisition.tender_required() {
            return Ok(());
        }

        let marked = self.dispatcher.dispatch(
            actor.user_id,
            id.0,
            aggregate_type::REQUISITION,
            RequisitionCommand::MarkApproved(MarkApproved {
                requisition_id: id,
                total,
                occurred_at: Utc::now(),
            }),
            |id| Requisition::empty(RequisitionId::new(id)),
        );

        if let Err(err) = marked {
            // Compensate: the reservation must not outlive a failed flip.
            self.release(actor, budget, total, id)?;
            return Err(err);
        }
        Ok(())
    }

    /// Cancel an approved requisition and release exactly what it reserved.
    pub fn cancel(
        &self,
        actor: &Actor,
        id: RequisitionId,
        reason: impl Into<String>,
    ) -> Result<(), DispatchError> {
        self.capabilities
            .authorize(actor, Action::CancelRequisition)
            .map_err(DispatchError::from)?;

        let requisition = self.load_requisition(id)?;
        let released = requisition.reserved_amount();
        let budget = requisition
            .budget()
            .ok_or_else(|| DispatchError::from(ProcurementError::not_found()))?;

        self.dispatcher.dispatch(
            actor.user_id,
            id.0,
            aggregate_type::REQUISITION,
            RequisitionCommand::Cancel(Cancel {
                requisition_id: id,
                reason: reason.into(),
                occurred_at: Utc::now(),
            }),
            |id| Requisition::empty(RequisitionId::new(id)),
        )?;

        self.release(actor, budget, released, id)?;
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
