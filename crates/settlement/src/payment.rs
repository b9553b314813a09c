use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use procura_core::{Aggregate, AggregateId, AggregateRoot, Money, ProcurementError, UserId};
use procura_events::Event;

use crate::invoice::InvoiceId;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PaymentId(pub AggregateId);

impl PaymentId {
    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }
}

impl core::fmt::Display for PaymentId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PaymentMethod {
    BankTransfer,
    Cheque,
    MobileMoney,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PaymentStatus {
    Pending,
    Completed,
    Failed,
    Cancelled,
}

impl PaymentStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, PaymentStatus::Pending)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Completed => "completed",
            PaymentStatus::Failed => "failed",
            PaymentStatus::Cancelled => "cancelled",
        }
    }
}

impl core::fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Aggregate root: Payment. One payment settles one invoice in full.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Payment {
    id: PaymentId,
    invoice: Option<InvoiceId>,
    amount: Money,
    method: PaymentMethod,
    bank_reference: Option<String>,
    status: PaymentStatus,
    version: u64,
    created: bool,
}

impl Payment {
    pub fn empty(id: PaymentId) -> Self {
        Self {
            id,
            invoice: None,
            amount: Money::ZERO,
            method: PaymentMethod::BankTransfer,
            bank_reference: None,
            status: PaymentStatus::Pending,
            version: 0,
            created: false,
        }
    }

    pub fn status(&self) -> PaymentStatus {
        self.status
    }

    pub fn amount(&self) -> Money {
        self.amount
    }

    pub fn invoice(&self) -> Option<InvoiceId> {
        self.invoice
    }
}

impl AggregateRoot for Payment {
    type Id = PaymentId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InitiatePayment {
    pub payment_id: PaymentId,
    pub invoice: InvoiceId,
    /// Must equal the invoice total: settlement is always in full.
    pub amount: Money,
    pub method: PaymentMethod,
    pub initiator: UserId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletePayment {
    pub payment_id: PaymentId,
    pub bank_reference: String,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailPayment {
    pub payment_id: PaymentId,
    pub reason: String,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CancelPayment {
    pub payment_id: PaymentId,
    pub reason: String,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PaymentCommand {
    Initiate(InitiatePayment),
    Complete(CompletePayment),
    Fail(FailPayment),
    Cancel(CancelPayment),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentInitiated {
    pub payment_id: PaymentId,
    pub invoice: InvoiceId,
    pub amount: Money,
    pub method: PaymentMethod,
    pub initiator: UserId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentCompleted {
    pub payment_id: PaymentId,
    pub invoice: InvoiceId,
    pub amount: Money,
    pub bank_reference: String,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentFailed {
    pub payment_id: PaymentId,
    pub reason: String,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentCancelled {
    pub payment_id: PaymentId,
    pub reason: String,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PaymentEvent {
    Initiated(PaymentInitiated),
    Completed(PaymentCompleted),
    Failed(PaymentFailed),
    Cancelled(PaymentCancelled),
}

impl Event for PaymentEvent {
    fn event_type(&self) -> &'static str {
        match self {
            PaymentEvent::Initiated(_) => "settlement.payment.initiated",
            PaymentEvent::Completed(_) => "settlement.payment.completed",
            PaymentEvent::Failed(_) => "settlement.payment.failed",
            PaymentEvent::Cancelled(_) => "settlement.payment.cancelled",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            PaymentEvent::Initiated(e) => e.occurred_at,
            PaymentEvent::Completed(e) => e.occurred_at,
            PaymentEvent::Failed(e) => e.occurred_at,
            PaymentEvent::Cancelled(e) => e.occurred_at,
        }
    }
}

impl Aggregate for Payment {
    type Command = PaymentCommand;
    type Event = PaymentEvent;
    type Error = ProcurementError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            PaymentEvent::Initiated(e) => {
                self.id = e.payment_id;
                self.invoice = Some(e.invoice);
                self.amount = e.amount;
                self.method = e.method;
                self.status = PaymentStatus::Pending;
                self.created = true;
            }
            PaymentEvent::Completed(e) => {
                self.bank_reference = Some(e.bank_reference.clone());
                self.status = PaymentStatus::Completed;
            }
            PaymentEvent::Failed(_) => {
                self.status = PaymentStatus::Failed;
            }
            PaymentEvent::Cancelled(_) => {
                self.status = PaymentStatus::Cancelled;
            }
        }

        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            PaymentCommand::Initiate(cmd) => self.handle_initiate(cmd),
            PaymentCommand::Complete(cmd) => self.handle_complete(cmd),
            PaymentCommand::Fail(cmd) => self.handle_fail(cmd),
            PaymentCommand::Cancel(cmd) => self.handle_cancel(cmd),
        }
    }
}

impl Payment {
    fn require_pending(&self, action: &str) -> Result<(), ProcurementError> {
        if self.status != PaymentStatus::Pending {
            return Err(ProcurementError::invalid_transition(
                self.status.as_str(),
                action,
            ));
        }
        Ok(())
    }

    fn handle_initiate(&self, cmd: &InitiatePayment) -> Result<Vec<PaymentEvent>, ProcurementError> {
        if self.created {
            return Err(ProcurementError::conflict("payment already exists"));
        }
        if !cmd.amount.is_positive() {
            return Err(ProcurementError::validation("payment amount must be positive"));
        }
        Ok(vec![PaymentEvent::Initiated(PaymentInitiated {
            payment_id: cmd.payment_id,
            invoice: cmd.invoice,
            amount: cmd.amount,
            method: cmd.method,
            initiator: cmd.initiator,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_complete(&self, cmd: &CompletePayment) -> Result<Vec<PaymentEvent>, ProcurementError> {
        self.require_pending("complete")?;
        if cmd.bank_reference.trim().is_empty() {
            return Err(ProcurementError::validation(
                "completion requires a bank reference",
            ));
        }
        let invoice = self
            .invoice
            .ok_or_else(ProcurementError::not_found)?;
        Ok(vec![PaymentEvent::Completed(PaymentCompleted {
            payment_id: cmd.payment_id,
            invoice,
            amount: self.amount,
            bank_reference: cmd.bank_reference.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_fail(&self, cmd: &FailPayment) -> Result<Vec<PaymentEvent>, ProcurementError> {
        self.require_pending("fail")?;
        Ok(vec![PaymentEvent::Failed(PaymentFailed {
            payment_id: cmd.payment_id,
            reason: cmd.reason.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_cancel(&self, cmd: &CancelPayment) -> Result<Vec<PaymentEvent>, ProcurementError> {
        self.require_pending("cancel")?;
        Ok(vec![PaymentEvent::Cancelled(PaymentCancelled {
            payment_id: cmd.payment_id,
            reason: cmd.reason.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }
}
