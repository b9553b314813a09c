use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use procura_core::{Aggregate, AggregateId, AggregateRoot, ProcurementError};
use procura_events::Event;
use procura_requisitions::RequisitionId;
use procura_suppliers::SupplierId;

use crate::bid::BidId;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TenderId(pub AggregateId);

impl TenderId {
    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }
}

impl core::fmt::Display for TenderId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TenderStatus {
    Draft,
    Published,
    Evaluating,
    Closed,
    Awarded,
    Cancelled,
}

impl TenderStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, TenderStatus::Awarded | TenderStatus::Cancelled)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TenderStatus::Draft => "draft",
            TenderStatus::Published => "published",
            TenderStatus::Evaluating => "evaluating",
            TenderStatus::Closed => "closed",
            TenderStatus::Awarded => "awarded",
            TenderStatus::Cancelled => "cancelled",
        }
    }
}

impl core::fmt::Display for TenderStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Aggregate root: Tender. A competitive sourcing round for one approved
/// requisition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tender {
    id: TenderId,
    requisition: Option<RequisitionId>,
    title: String,
    invited: Vec<SupplierId>,
    closing_date: Option<DateTime<Utc>>,
    published_at: Option<DateTime<Utc>>,
    awarded_bid: Option<BidId>,
    status: TenderStatus,
    version: u64,
    created: bool,
}

impl Tender {
    pub fn empty(id: TenderId) -> Self {
        Self {
            id,
            requisition: None,
            title: String::new(),
            invited: Vec::new(),
            closing_date: None,
            published_at: None,
            awarded_bid: None,
            status: TenderStatus::Draft,
            version: 0,
            created: false,
        }
    }

    pub fn status(&self) -> TenderStatus {
        self.status
    }

    pub fn requisition(&self) -> Option<RequisitionId> {
        self.requisition
    }

    pub fn invited(&self) -> &[SupplierId] {
        &self.invited
    }

    pub fn awarded_bid(&self) -> Option<BidId> {
        self.awarded_bid
    }
}

impl AggregateRoot for Tender {
    type Id = TenderId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateTender {
    pub tender_id: TenderId,
    pub requisition: RequisitionId,
    pub title: String,
    pub closing_date: DateTime<Utc>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InviteSupplier {
    pub tender_id: TenderId,
    pub supplier: SupplierId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublishTender {
    pub tender_id: TenderId,
    pub publish_date: DateTime<Utc>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BeginEvaluation {
    pub tender_id: TenderId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CloseTender {
    pub tender_id: TenderId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AwardTender {
    pub tender_id: TenderId,
    pub bid: BidId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CancelTender {
    pub tender_id: TenderId,
    pub reason: String,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TenderCommand {
    Create(CreateTender),
    InviteSupplier(InviteSupplier),
    Publish(PublishTender),
    BeginEvaluation(BeginEvaluation),
    Close(CloseTender),
    Award(AwardTender),
    Cancel(CancelTender),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TenderCreated {
    pub tender_id: TenderId,
    pub requisition: RequisitionId,
    pub title: String,
    pub closing_date: DateTime<Utc>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SupplierInvited {
    pub tender_id: TenderId,
    pub supplier: SupplierId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TenderPublished {
    pub tender_id: TenderId,
    pub publish_date: DateTime<Utc>,
    pub closing_date: DateTime<Utc>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvaluationStarted {
    pub tender_id: TenderId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TenderClosed {
    pub tender_id: TenderId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TenderAwarded {
    pub tender_id: TenderId,
    pub bid: BidId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TenderCancelled {
    pub tender_id: TenderId,
    pub reason: String,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TenderEvent {
    Created(TenderCreated),
    SupplierInvited(SupplierInvited),
    Published(TenderPublished),
    EvaluationStarted(EvaluationStarted),
    Closed(TenderClosed),
    Awarded(TenderAwarded),
    Cancelled(TenderCancelled),
}

impl Event for TenderEvent {
    fn event_type(&self) -> &'static str {
        match self {
            TenderEvent::Created(_) => "sourcing.tender.created",
            TenderEvent::SupplierInvited(_) => "sourcing.tender.supplier_invited",
            TenderEvent::Published(_) => "sourcing.tender.published",
            TenderEvent::EvaluationStarted(_) => "sourcing.tender.evaluation_started",
            TenderEvent::Closed(_) => "sourcing.tender.closed",
            TenderEvent::Awarded(_) => "sourcing.tender.awarded",
            TenderEvent::Cancelled(_) => "sourcing.tender.cancelled",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            TenderEvent::Created(e) => e.occurred_at,
            TenderEvent::SupplierInvited(e) => e.occurred_at,
            TenderEvent::Published(e) => e.occurred_at,
            TenderEvent::EvaluationStarted(e) => e.occurred_at,
            TenderEvent::Closed(e) => e.occurred_at,
            TenderEvent::Awarded(e) => e.occurred_at,
            TenderEvent::Cancelled(e) => e.occurred_at,
        }
    }
}

impl Aggregate for Tender {
    type Command = TenderCommand;
    type Event = TenderEvent;
    type Error = ProcurementError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            TenderEvent::Created(e) => {
                self.id = e.tender_id;
                self.requisition = Some(e.requisition);
                self.title = e.title.clone();
                self.closing_date = Some(e.closing_date);
                self.status = TenderStatus::Draft;
                self.created = true;
            }
            TenderEvent::SupplierInvited(e) => {
                self.invited.push(e.supplier);
            }
            TenderEvent::Published(e) => {
                self.published_at = Some(e.publish_date);
                self.status = TenderStatus::Published;
            }
            TenderEvent::EvaluationStarted(_) => {
                self.status = TenderStatus::Evaluating;
            }
            TenderEvent::Closed(_) => {
                self.status = TenderStatus::Closed;
            }
            TenderEvent::Awarded(e) => {
                self.awarded_bid = Some(e.bid);
                self.status = TenderStatus::Awarded;
            }
            TenderEvent::Cancelled(_) => {
                self.status = TenderStatus::Cancelled;
            }
        }

        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            TenderCommand::Create(cmd) => self.handle_create(cmd),
            TenderCommand::InviteSupplier(cmd) => self.handle_invite(cmd),
            TenderCommand::Publish(cmd) => self.handle_publish(cmd),
            TenderCommand::BeginEvaluation(cmd) => self.handle_begin_evaluation(cmd),
            TenderCommand::Close(cmd) => self.handle_close(cmd),
            TenderCommand::Award(cmd) => self.handle_award(cmd),
            TenderCommand::Cancel(cmd) => self.handle_cancel(cmd),
        }
    }
}

impl Tender {
    fn handle_create(&self, cmd: &CreateTender) -> Result<Vec<TenderEvent>, ProcurementError> {
        if self.created {
            return Err(ProcurementError::conflict("tender already exists"));
        }
        if cmd.title.trim().is_empty() {
            return Err(ProcurementError::validation("title cannot be empty"));
        }
        Ok(vec![TenderEvent::Created(TenderCreated {
            tender_id: cmd.tender_id,
            requisition: cmd.requisition,
            title: cmd.title.clone(),
            closing_date: cmd.closing_date,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_invite(&self, cmd: &InviteSupplier) -> Result<Vec<TenderEvent>, ProcurementError> {
        if self.status != TenderStatus::Draft {
            return Err(ProcurementError::invalid_transition(
                self.status.as_str(),
                "invite_supplier",
            ));
        }
        // Re-inviting the same supplier is a no-op.
        if self.invited.contains(&cmd.supplier) {
            return Ok(Vec::new());
        }
        Ok(vec![TenderEvent::SupplierInvited(SupplierInvited {
            tender_id: cmd.tender_id,
            supplier: cmd.supplier,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_publish(&self, cmd: &PublishTender) -> Result<Vec<TenderEvent>, ProcurementError> {
        if self.status != TenderStatus::Draft {
            return Err(ProcurementError::invalid_transition(
                self.status.as_str(),
                "publish",
            ));
        }
        if self.invited.is_empty() {
            return Err(ProcurementError::validation(
                "cannot publish a tender without invited suppliers",
            ));
        }
        let closing = self
            .closing_date
            .ok_or_else(|| ProcurementError::validation("tender has no closing date"))?;
        if closing <= cmd.publish_date {
            return Err(ProcurementError::validation(
                "closing date must be after publish date",
            ));
        }
        Ok(vec![TenderEvent::Published(TenderPublished {
            tender_id: cmd.tender_id,
            publish_date: cmd.publish_date,
            closing_date: closing,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_begin_evaluation(
        &self,
        cmd: &BeginEvaluation,
    ) -> Result<Vec<TenderEvent>, ProcurementError> {
        if self.status != TenderStatus::Published {
            return Err(ProcurementError::invalid_transition(
                self.status.as_str(),
                "begin_evaluation",
            ));
        }
        Ok(vec![TenderEvent::EvaluationStarted(EvaluationStarted {
            tender_id: cmd.tender_id,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_close(&self, cmd: &CloseTender) -> Result<Vec<TenderEvent>, ProcurementError> {
        if self.status != TenderStatus::Evaluating {
            return Err(ProcurementError::invalid_transition(
                self.status.as_str(),
                "close",
            ));
        }
        Ok(vec![TenderEvent::Closed(TenderClosed {
            tender_id: cmd.tender_id,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_award(&self, cmd: &AwardTender) -> Result<Vec<TenderEvent>, ProcurementError> {
        if !matches!(self.status, TenderStatus::Evaluating | TenderStatus::Closed) {
            return Err(ProcurementError::invalid_transition(
                self.status.as_str(),
                "award",
            ));
        }
        Ok(vec![TenderEvent::Awarded(TenderAwarded {
            tender_id: cmd.tender_id,
            bid: cmd.bid,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_cancel(&self, cmd: &CancelTender) -> Result<Vec<TenderEvent>, ProcurementError> {
        if self.status.is_terminal() {
            return Err(ProcurementError::invalid_transition(
                self.status.as_str(),
                "cancel",
            ));
        }
        Ok(vec![TenderEvent::Cancelled(TenderCancelled {
            tender_id: cmd.tender_id,
            reason: cmd.reason.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }
}
