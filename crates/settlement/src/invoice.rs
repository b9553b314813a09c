use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use procura_core::{Aggregate, AggregateId, AggregateRoot, Money, ProcurementError, UserId};
use procura_events::Event;
use procura_purchasing::{GrnId, PurchaseOrderId};
use procura_suppliers::SupplierId;

use crate::three_way::MatchOutcome;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InvoiceId(pub AggregateId);

impl InvoiceId {
    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }
}

impl core::fmt::Display for InvoiceId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum InvoiceStatus {
    Submitted,
    Verified,
    Approved,
    Paid,
    Rejected,
}

impl InvoiceStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, InvoiceStatus::Paid | InvoiceStatus::Rejected)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            InvoiceStatus::Submitted => "submitted",
            InvoiceStatus::Verified => "verified",
            InvoiceStatus::Approved => "approved",
            InvoiceStatus::Paid => "paid",
            InvoiceStatus::Rejected => "rejected",
        }
    }
}

impl core::fmt::Display for InvoiceStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Aggregate root: supplier Invoice against a purchase order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invoice {
    id: InvoiceId,
    order: Option<PurchaseOrderId>,
    receipt: Option<GrnId>,
    supplier: Option<SupplierId>,
    supplier_reference: String,
    total: Money,
    quantity: i64,
    match_outcome: Option<MatchOutcome>,
    match_overridden: bool,
    payment_reference: Option<AggregateId>,
    status: InvoiceStatus,
    version: u64,
    created: bool,
}

impl Invoice {
    pub fn empty(id: InvoiceId) -> Self {
        Self {
            id,
            order: None,
            receipt: None,
            supplier: None,
            supplier_reference: String::new(),
            total: Money::ZERO,
            quantity: 0,
            match_outcome: None,
            match_overridden: false,
            payment_reference: None,
            status: InvoiceStatus::Submitted,
            version: 0,
            created: false,
        }
    }

    pub fn status(&self) -> InvoiceStatus {
        self.status
    }

    pub fn total(&self) -> Money {
        self.total
    }

    pub fn quantity(&self) -> i64 {
        self.quantity
    }

    pub fn order(&self) -> Option<PurchaseOrderId> {
        self.order
    }

    pub fn receipt(&self) -> Option<GrnId> {
        self.receipt
    }

    pub fn supplier(&self) -> Option<SupplierId> {
        self.supplier
    }

    pub fn match_outcome(&self) -> Option<&MatchOutcome> {
        self.match_outcome.as_ref()
    }

    pub fn match_overridden(&self) -> bool {
        self.match_overridden
    }

    /// True once a recorded match passed or was overridden.
    pub fn match_cleared(&self) -> bool {
        self.match_overridden
            || self
                .match_outcome
                .as_ref()
                .is_some_and(MatchOutcome::is_matched)
    }
}

impl AggregateRoot for Invoice {
    type Id = InvoiceId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmitInvoice {
    pub invoice_id: InvoiceId,
    pub order: PurchaseOrderId,
    pub receipt: Option<GrnId>,
    pub supplier: SupplierId,
    pub supplier_reference: String,
    pub total: Money,
    pub quantity: i64,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerifyInvoice {
    pub invoice_id: InvoiceId,
    pub verifier: UserId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordMatch {
    pub invoice_id: InvoiceId,
    pub outcome: MatchOutcome,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OverrideMatch {
    pub invoice_id: InvoiceId,
    pub authorizer: UserId,
    pub justification: String,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApproveInvoice {
    pub invoice_id: InvoiceId,
    pub approver: UserId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RejectInvoice {
    pub invoice_id: InvoiceId,
    pub reason: String,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarkPaid {
    pub invoice_id: InvoiceId,
    pub payment: AggregateId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum InvoiceCommand {
    Submit(SubmitInvoice),
    Verify(VerifyInvoice),
    RecordMatch(RecordMatch),
    OverrideMatch(OverrideMatch),
    Approve(ApproveInvoice),
    Reject(RejectInvoice),
    MarkPaid(MarkPaid),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvoiceSubmitted {
    pub invoice_id: InvoiceId,
    pub order: PurchaseOrderId,
    pub receipt: Option<GrnId>,
    pub supplier: SupplierId,
    pub supplier_reference: String,
    pub total: Money,
    pub quantity: i64,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvoiceVerified {
    pub invoice_id: InvoiceId,
    pub verifier: UserId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchRecorded {
    pub invoice_id: InvoiceId,
    pub outcome: MatchOutcome,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchOverridden {
    pub invoice_id: InvoiceId,
    pub authorizer: UserId,
    pub justification: String,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvoiceApproved {
    pub invoice_id: InvoiceId,
    pub approver: UserId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvoiceRejected {
    pub invoice_id: InvoiceId,
    pub reason: String,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvoicePaid {
    pub invoice_id: InvoiceId,
    pub payment: AggregateId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum InvoiceEvent {
    Submitted(InvoiceSubmitted),
    Verified(InvoiceVerified),
    MatchRecorded(MatchRecorded),
    MatchOverridden(MatchOverridden),
    Approved(InvoiceApproved),
    Rejected(InvoiceRejected),
    Paid(InvoicePaid),
}

impl Event for InvoiceEvent {
    fn event_type(&self) -> &'static str {
        match self {
            InvoiceEvent::Submitted(_) => "settlement.invoice.submitted",
            InvoiceEvent::Verified(_) => "settlement.invoice.verified",
            InvoiceEvent::MatchRecorded(_) => "settlement.invoice.match_recorded",
            InvoiceEvent::MatchOverridden(_) => "settlement.invoice.match_overridden",
            InvoiceEvent::Approved(_) => "settlement.invoice.approved",
            InvoiceEvent::Rejected(_) => "settlement.invoice.rejected",
            InvoiceEvent::Paid(_) => "settlement.invoice.paid",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            InvoiceEvent::Submitted(e) => e.occurred_at,
            InvoiceEvent::Verified(e) => e.occurred_at,
            InvoiceEvent::MatchRecorded(e) => e.occurred_at,
            InvoiceEvent::MatchOverridden(e) => e.occurred_at,
            InvoiceEvent::Approved(e) => e.occurred_at,
            InvoiceEvent::Rejected(e) => e.occurred_at,
            InvoiceEvent::Paid(e) => e.occurred_at,
        }
    }
}

impl Aggregate for Invoice {
    type Command = InvoiceCommand;
    type Event = InvoiceEvent;
    type Error = ProcurementError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            InvoiceEvent::Submitted(e) => {
                self.id = e.invoice_id;
                self.order = Some(e.order);
                self.receipt = e.receipt;
                self.supplier = Some(e.supplier);
                self.supplier_reference = e.supplier_reference.clone();
                self.total = e.total;
                self.quantity = e.quantity;
                self.status = InvoiceStatus::Submitted;
                self.created = true;
            }
            InvoiceEvent::Verified(_) => {
                self.status = InvoiceStatus::Verified;
            }
            InvoiceEvent::MatchRecorded(e) => {
                self.match_outcome = Some(e.outcome.clone());
            }
            InvoiceEvent::MatchOverridden(_) => {
                self.match_overridden = true;
            }
            InvoiceEvent::Approved(_) => {
                self.status = InvoiceStatus::Approved;
            }
            InvoiceEvent::Rejected(_) => {
                self.status = InvoiceStatus::Rejected;
            }
            InvoiceEvent::Paid(e) => {
                self.payment_reference = Some(e.payment);
                self.status = InvoiceStatus::Paid;
            }
        }

        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            InvoiceCommand::Submit(cmd) => self.handle_submit(cmd),
            InvoiceCommand::Verify(cmd) => self.handle_verify(cmd),
            InvoiceCommand::RecordMatch(cmd) => self.handle_record_match(cmd),
            InvoiceCommand::OverrideMatch(cmd) => self.handle_override_match(cmd),
            InvoiceCommand::Approve(cmd) => self.handle_approve(cmd),
            InvoiceCommand::Reject(cmd) => self.handle_reject(cmd),
            InvoiceCommand::MarkPaid(cmd) => self.handle_mark_paid(cmd),
        }
    }
}

impl Invoice {
    fn handle_submit(&self, cmd: &SubmitInvoice) -> Result<Vec<InvoiceEvent>, ProcurementError> {
        if self.created {
            return Err(ProcurementError::conflict("invoice already exists"));
        }
        if !cmd.total.is_positive() {
            return Err(ProcurementError::validation("invoice total must be positive"));
        }
        if cmd.quantity <= 0 {
            return Err(ProcurementError::validation("invoice quantity must be positive"));
        }
        if cmd.supplier_reference.trim().is_empty() {
            return Err(ProcurementError::validation(
                "supplier reference cannot be empty",
            ));
        }
        Ok(vec![InvoiceEvent::Submitted(InvoiceSubmitted {
            invoice_id: cmd.invoice_id,
            order: cmd.order,
            receipt: cmd.receipt,
            supplier: cmd.supplier,
            supplier_reference: cmd.supplier_reference.clone(),
            total: cmd.total,
            quantity: cmd.quantity,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_verify(&self, cmd: &VerifyInvoice) -> Result<Vec<InvoiceEvent>, ProcurementError> {
        if self.status != InvoiceStatus::Submitted {
            return Err(ProcurementError::invalid_transition(
                self.status.as_str(),
                "verify",
            ));
        }
        Ok(vec![InvoiceEvent::Verified(InvoiceVerified {
            invoice_id: cmd.invoice_id,
            verifier: cmd.verifier,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_record_match(&self, cmd: &RecordMatch) -> Result<Vec<InvoiceEvent>, ProcurementError> {
        if self.status.is_terminal() {
            return Err(ProcurementError::invalid_transition(
                self.status.as_str(),
                "record_match",
            ));
        }
        Ok(vec![InvoiceEvent::MatchRecorded(MatchRecorded {
            invoice_id: cmd.invoice_id,
            outcome: cmd.outcome.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_override_match(&self, cmd: &OverrideMatch) -> Result<Vec<InvoiceEvent>, ProcurementError> {
        if self.status.is_terminal() {
            return Err(ProcurementError::invalid_transition(
                self.status.as_str(),
                "override_match",
            ));
        }
        if cmd.justification.trim().is_empty() {
            return Err(ProcurementError::validation(
                "override requires a justification",
            ));
        }
        // An override without a failed match on record is meaningless.
        if self.match_outcome.is_none() {
            return Err(ProcurementError::out_of_sequence(
                "no match recorded to override",
            ));
        }
        if self.match_cleared() {
            return Ok(Vec::new());
        }
        Ok(vec![InvoiceEvent::MatchOverridden(MatchOverridden {
            invoice_id: cmd.invoice_id,
            authorizer: cmd.authorizer,
            justification: cmd.justification.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_approve(&self, cmd: &ApproveInvoice) -> Result<Vec<InvoiceEvent>, ProcurementError> {
        if self.status != InvoiceStatus::Verified {
            return Err(ProcurementError::invalid_transition(
                self.status.as_str(),
                "approve",
            ));
        }
        // Approval is gated on a cleared match. A failed match blocks rather
        // than rejects: the invoice can be re-matched or overridden.
        match (&self.match_outcome, self.match_overridden) {
            (None, false) => Err(ProcurementError::match_failure(
                "no three-way match recorded",
            )),
            (Some(outcome), false) if !outcome.is_matched() => Err(
                ProcurementError::match_failure(format!("match failed: {outcome:?}")),
            ),
            _ => Ok(vec![InvoiceEvent::Approved(InvoiceApproved {
                invoice_id: cmd.invoice_id,
                approver: cmd.approver,
                occurred_at: cmd.occurred_at,
            })]),
        }
    }

    fn handle_reject(&self, cmd: &RejectInvoice) -> Result<Vec<InvoiceEvent>, ProcurementError> {
        if self.status.is_terminal() {
            return Err(ProcurementError::invalid_transition(
                self.status.as_str(),
                "reject",
            ));
        }
        Ok(vec![InvoiceEvent::Rejected(InvoiceRejected {
            invoice_id: cmd.invoice_id,
            reason: cmd.reason.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_mark_paid(&self, cmd: &MarkPaid) -> Result<Vec<InvoiceEvent>, ProcurementError> {
        if self.status != InvoiceStatus::Approved {
            return Err(ProcurementError::invalid_transition(
                self.status.as_str(),
                "mark_paid",
            ));
        }
        Ok(vec![InvoiceEvent::Paid(InvoicePaid {
            invoice_id: cmd.invoice_id,
            payment: cmd.payment,
            occurred_at: cmd.occurred_at,
        })])
    }
}
