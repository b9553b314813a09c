use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use procura_catalog::CatalogItemId;
use procura_core::{
    Aggregate, AggregateId, AggregateRoot, DepartmentId, Money, ProcurementError, UserId,
};
use procura_events::Event;
use procura_ledger::BudgetId;

use crate::policy::ApprovalStage;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequisitionId(pub AggregateId);

impl RequisitionId {
    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }
}

impl core::fmt::Display for RequisitionId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Priority {
    Low,
    Normal,
    High,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Decision {
    Approved,
    Rejected,
}

/// One line of a requisition. `line_total` is recomputed, never stored
/// independently of quantity and unit price.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequisitionLine {
    pub item: CatalogItemId,
    pub description: String,
    pub quantity: i64,
    pub unit_price: Money,
}

impl RequisitionLine {
    pub fn line_total(&self) -> Result<Money, ProcurementError> {
        self.unit_price.checked_mul(self.quantity)
    }
}

/// One instantiated approval stage of a submitted requisition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApprovalRecord {
    pub stage: ApprovalStage,
    pub sequence: u32,
    pub decision: Option<Decision>,
    pub approver: Option<UserId>,
    pub decided_at: Option<DateTime<Utc>>,
    pub comments: Option<String>,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RequisitionStatus {
    Draft,
    Submitted,
    HodApproved,
    FacultyApproved,
    BudgetApproved,
    FinanceApproved,
    ProcurementApproved,
    Approved,
    Rejected,
    Cancelled,
}

impl RequisitionStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, RequisitionStatus::Rejected | RequisitionStatus::Cancelled)
    }

    /// The status a requisition carries once `stage` is its latest approved
    /// stage in canonical order.
    fn for_stage(stage: ApprovalStage) -> Self {
        match stage {
            ApprovalStage::Hod => RequisitionStatus::HodApproved,
            ApprovalStage::Faculty => RequisitionStatus::FacultyApproved,
            ApprovalStage::Budget => RequisitionStatus::BudgetApproved,
            ApprovalStage::Finance => RequisitionStatus::FinanceApproved,
            ApprovalStage::Procurement => RequisitionStatus::ProcurementApproved,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RequisitionStatus::Draft => "draft",
            RequisitionStatus::Submitted => "submitted",
            RequisitionStatus::HodApproved => "hod_approved",
            RequisitionStatus::FacultyApproved => "faculty_approved",
            RequisitionStatus::BudgetApproved => "budget_approved",
            RequisitionStatus::FinanceApproved => "finance_approved",
            RequisitionStatus::ProcurementApproved => "procurement_approved",
            RequisitionStatus::Approved => "approved",
            RequisitionStatus::Rejected => "rejected",
            RequisitionStatus::Cancelled => "cancelled",
        }
    }
}

impl core::fmt::Display for RequisitionStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Aggregate root: Requisition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Requisition {
    id: RequisitionId,
    title: String,
    department: Option<DepartmentId>,
    budget: Option<BudgetId>,
    requester: Option<UserId>,
    priority: Priority,
    emergency: bool,
    required_by: Option<NaiveDate>,
    lines: Vec<RequisitionLine>,
    approvals: Vec<ApprovalRecord>,
    tender_required: bool,
    status: RequisitionStatus,
    reserved_amount: Money,
    version: u64,
    created: bool,
}

impl Requisition {
    pub fn empty(id: RequisitionId) -> Self {
        Self {
            id,
            title: String::new(),
            department: None,
            budget: None,
            requester: None,
            priority: Priority::Normal,
            emergency: false,
            required_by: None,
            lines: Vec::new(),
            approvals: Vec::new(),
            tender_required: false,
            status: RequisitionStatus::Draft,
            reserved_amount: Money::ZERO,
            version: 0,
            created: false,
        }
    }

    pub fn status(&self) -> RequisitionStatus {
        self.status
    }

    pub fn lines(&self) -> &[RequisitionLine] {
        &self.lines
    }

    pub fn approvals(&self) -> &[ApprovalRecord] {
        &self.approvals
    }

    pub fn tender_required(&self) -> bool {
        self.tender_required
    }

    pub fn department(&self) -> Option<DepartmentId> {
        self.department
    }

    pub fn budget(&self) -> Option<BudgetId> {
        self.budget
    }

    pub fn reserved_amount(&self) -> Money {
        self.reserved_amount
    }

    /// Sum of line totals.
    pub fn total(&self) -> Result<Money, ProcurementError> {
        let mut total = Money::ZERO;
        for line in &self.lines {
            total = total.checked_add(line.line_total()?)?;
        }
        Ok(total)
    }

    /// True once every instantiated stage carries an approval.
    pub fn all_stages_approved(&self) -> bool {
        !self.approvals.is_empty()
            && self
                .approvals
                .iter()
                .all(|r| r.decision == Some(Decision::Approved))
    }
}

impl AggregateRoot for Requisition {
    type Id = RequisitionId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateRequisition {
    pub requisition_id: RequisitionId,
    pub title: String,
    pub department: DepartmentId,
    pub budget: BudgetId,
    pub requester: UserId,
    pub priority: Priority,
    pub emergency: bool,
    pub required_by: Option<NaiveDate>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddItem {
    pub requisition_id: RequisitionId,
    pub line: RequisitionLine,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoveItem {
    pub requisition_id: RequisitionId,
    pub item: CatalogItemId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Submit {
    pub requisition_id: RequisitionId,
    /// Stage set resolved from the approval policy for the line total.
    pub required_stages: Vec<ApprovalStage>,
    pub tender_required: bool,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Decide {
    pub requisition_id: RequisitionId,
    pub stage: ApprovalStage,
    pub approver: UserId,
    pub decision: Decision,
    pub comments: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarkApproved {
    pub requisition_id: RequisitionId,
    /// Amount reserved against the budget by the approval workflow.
    pub total: Money,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cancel {
    pub requisition_id: RequisitionId,
    pub reason: String,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RequisitionCommand {
    Create(CreateRequisition),
    AddItem(AddItem),
    RemoveItem(RemoveItem),
    Submit(Submit),
    Decide(Decide),
    MarkApproved(MarkApproved),
    Cancel(Cancel),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequisitionCreated {
    pub requisition_id: RequisitionId,
    pub title: String,
    pub department: DepartmentId,
    pub budget: BudgetId,
    pub requester: UserId,
    pub priority: Priority,
    pub emergency: bool,
    pub required_by: Option<NaiveDate>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemAdded {
    pub requisition_id: RequisitionId,
    pub line: RequisitionLine,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemRemoved {
    pub requisition_id: RequisitionId,
    pub item: CatalogItemId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequisitionSubmitted {
    pub requisition_id: RequisitionId,
    pub required_stages: Vec<ApprovalStage>,
    pub tender_required: bool,
    pub total: Money,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageApproved {
    pub requisition_id: RequisitionId,
    pub stage: ApprovalStage,
    pub approver: UserId,
    pub comments: Option<String>,
    pub status_after: RequisitionStatus,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequisitionRejected {
    pub requisition_id: RequisitionId,
    pub stage: ApprovalStage,
    pub approver: UserId,
    pub comments: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequisitionApproved {
    pub requisition_id: RequisitionId,
    pub reserved_amount: Money,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequisitionCancelled {
    pub requisition_id: RequisitionId,
    pub reason: String,
    pub released_amount: Money,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RequisitionEvent {
    Created(RequisitionCreated),
    ItemAdded(ItemAdded),
    ItemRemoved(ItemRemoved),
    Submitted(RequisitionSubmitted),
    StageApproved(StageApproved),
    Rejected(RequisitionRejected),
    Approved(RequisitionApproved),
    Cancelled(RequisitionCancelled),
}

impl Event for RequisitionEvent {
    fn event_type(&self) -> &'static str {
        match self {
            RequisitionEvent::Created(_) => "requisitions.requisition.created",
            RequisitionEvent::ItemAdded(_) => "requisitions.requisition.item_added",
            RequisitionEvent::ItemRemoved(_) => "requisitions.requisition.item_removed",
            RequisitionEvent::Submitted(_) => "requisitions.requisition.submitted",
            RequisitionEvent::StageApproved(_) => "requisitions.requisition.stage_approved",
            RequisitionEvent::Rejected(_) => "requisitions.requisition.rejected",
            RequisitionEvent::Approved(_) => "requisitions.requisition.approved",
            RequisitionEvent::Cancelled(_) => "requisitions.requisition.cancelled",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            RequisitionEvent::Created(e) => e.occurred_at,
            RequisitionEvent::ItemAdded(e) => e.occurred_at,
            RequisitionEvent::ItemRemoved(e) => e.occurred_at,
            RequisitionEvent::Submitted(e) => e.occurred_at,
            RequisitionEvent::StageApproved(e) => e.occurred_at,
            RequisitionEvent::Rejected(e) => e.occurred_at,
            RequisitionEvent::Approved(e) => e.occurred_at,
            RequisitionEvent::Cancelled(e) => e.occurred_at,
        }
    }
}

impl Aggregate for Requisition {
    type Command = RequisitionCommand;
    type Event = RequisitionEvent;
    type Error = ProcurementError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            RequisitionEvent::Created(e) => {
                self.id = e.requisition_id;
                self.title = e.title.clone();
                self.department = Some(e.department);
                self.budget = Some(e.budget);
                self.requester = Some(e.requester);
                self.priority = e.priority;
                self.emergency = e.emergency;
                self.required_by = e.required_by;
                self.status = RequisitionStatus::Draft;
                self.created = true;
            }
            RequisitionEvent::ItemAdded(e) => {
                self.lines.push(e.line.clone());
            }
            RequisitionEvent::ItemRemoved(e) => {
                self.lines.retain(|line| line.item != e.item);
            }
            RequisitionEvent::Submitted(e) => {
                self.tender_required = e.tender_required;
                self.approvals = e
                    .required_stages
                    .iter()
                    .enumerate()
                    .map(|(index, stage)| ApprovalRecord {
                        stage: *stage,
                        sequence: index as u32,
                        decision: None,
                        approver: None,
                        decided_at: None,
                        comments: None,
                    })
                    .collect();
                self.status = RequisitionStatus::Submitted;
            }
            RequisitionEvent::StageApproved(e) => {
                if let Some(record) = self.approvals.iter_mut().find(|r| r.stage == e.stage) {
                    record.decision = Some(Decision::Approved);
                    record.approver = Some(e.approver);
                    record.decided_at = Some(e.occurred_at);
                    record.comments = e.comments.clone();
                }
                self.status = e.status_after;
            }
            RequisitionEvent::Rejected(e) => {
                if let Some(record) = self.approvals.iter_mut().find(|r| r.stage == e.stage) {
                    record.decision = Some(Decision::Rejected);
                    record.approver = Some(e.approver);
                    record.decided_at = Some(e.occurred_at);
                    record.comments = e.comments.clone();
                }
                self.status = RequisitionStatus::Rejected;
            }
            RequisitionEvent::Approved(e) => {
                self.reserved_amount = e.reserved_amount;
                self.status = RequisitionStatus::Approved;
            }
            RequisitionEvent::Cancelled(_) => {
                self.status = RequisitionStatus::Cancelled;
            }
        }

        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            RequisitionCommand::Create(cmd) => self.handle_create(cmd),
            RequisitionCommand::AddItem(cmd) => self.handle_add_item(cmd),
            RequisitionCommand::RemoveItem(cmd) => self.handle_remove_item(cmd),
            RequisitionCommand::Submit(cmd) => self.handle_submit(cmd),
            RequisitionCommand::Decide(cmd) => self.handle_decide(cmd),
            RequisitionCommand::MarkApproved(cmd) => self.handle_mark_approved(cmd),
            RequisitionCommand::Cancel(cmd) => self.handle_cancel(cmd),
        }
    }
}

impl Requisition {
    fn require_status(
        &self,
        expected: RequisitionStatus,
        action: &str,
    ) -> Result<(), ProcurementError> {
        if self.status != expected {
            return Err(ProcurementError::invalid_transition(
                self.status.as_str(),
                action,
            ));
        }
        Ok(())
    }

    fn handle_create(&self, cmd: &CreateRequisition) -> Result<Vec<RequisitionEvent>, ProcurementError> {
        if self.created {
            return Err(ProcurementError::conflict("requisition already exists"));
        }
        if cmd.title.trim().is_empty() {
            return Err(ProcurementError::validation("title cannot be empty"));
        }
        Ok(vec![RequisitionEvent::Created(RequisitionCreated {
            requisition_id: cmd.requisition_id,
            title: cmd.title.clone(),
            department: cmd.department,
            budget: cmd.budget,
            requester: cmd.requester,
            priority: cmd.priority,
            emergency: cmd.emergency,
            required_by: cmd.required_by,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_add_item(&self, cmd: &AddItem) -> Result<Vec<RequisitionEvent>, ProcurementError> {
        self.require_status(RequisitionStatus::Draft, "add_item")?;
        if cmd.line.quantity <= 0 {
            return Err(ProcurementError::validation("quantity must be positive"));
        }
        if !cmd.line.unit_price.is_positive() {
            return Err(ProcurementError::validation("unit price must be positive"));
        }
        if self.lines.iter().any(|line| line.item == cmd.line.item) {
            return Err(ProcurementError::validation(
                "item already present on requisition",
            ));
        }
        Ok(vec![RequisitionEvent::ItemAdded(ItemAdded {
            requisition_id: cmd.requisition_id,
            line: cmd.line.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_remove_item(&self, cmd: &RemoveItem) -> Result<Vec<RequisitionEvent>, ProcurementError> {
        self.require_status(RequisitionStatus::Draft, "remove_item")?;
        if !self.lines.iter().any(|line| line.item == cmd.item) {
            return Err(ProcurementError::not_found());
        }
        Ok(vec![RequisitionEvent::ItemRemoved(ItemRemoved {
            requisition_id: cmd.requisition_id,
            item: cmd.item,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_submit(&self, cmd: &Submit) -> Result<Vec<RequisitionEvent>, ProcurementError> {
        self.require_status(RequisitionStatus::Draft, "submit")?;
        if self.lines.is_empty() {
            return Err(ProcurementError::validation(
                "cannot submit a requisition without items",
            ));
        }
        if self.budget.is_none() {
            return Err(ProcurementError::validation(
                "cannot submit a requisition without a budget link",
            ));
        }
        if cmd.required_stages.is_empty() {
            return Err(ProcurementError::validation(
                "at least one approval stage is required",
            ));
        }
        Ok(vec![RequisitionEvent::Submitted(RequisitionSubmitted {
            requisition_id: cmd.requisition_id,
            required_stages: cmd.required_stages.clone(),
            tender_required: cmd.tender_required,
            total: self.total()?,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_decide(&self, cmd: &Decide) -> Result<Vec<RequisitionEvent>, ProcurementError> {
        if self.status.is_terminal() || self.status == RequisitionStatus::Approved {
            return Err(ProcurementError::invalid_transition(
                self.status.as_str(),
                "decide",
            ));
        }
        if self.approvals.is_empty() {
            return Err(ProcurementError::invalid_transition(
                self.status.as_str(),
                "decide",
            ));
        }

        let record = self
            .approvals
            .iter()
            .find(|r| r.stage == cmd.stage)
            .ok_or_else(|| {
                ProcurementError::validation(format!(
                    "stage {} is not required for this requisition",
                    cmd.stage
                ))
            })?;

        // Idempotent replay of an already approved stage.
        if record.decision == Some(Decision::Approved) {
            if cmd.decision == Decision::Approved {
                return Ok(Vec::new());
            }
            return Err(ProcurementError::conflict(format!(
                "stage {} was already approved",
                cmd.stage
            )));
        }

        // Every earlier required stage must already be approved.
        if let Some(open) = self
            .approvals
            .iter()
            .find(|r| r.stage < cmd.stage && r.decision != Some(Decision::Approved))
        {
            return Err(ProcurementError::out_of_sequence(format!(
                "stage {} is still pending before {}",
                open.stage, cmd.stage
            )));
        }

        match cmd.decision {
            Decision::Rejected => Ok(vec![RequisitionEvent::Rejected(RequisitionRejected {
                requisition_id: cmd.requisition_id,
                stage: cmd.stage,
                approver: cmd.approver,
                comments: cmd.comments.clone(),
                occurred_at: cmd.occurred_at,
            })]),
            Decision::Approved => {
                Ok(vec![RequisitionEvent::StageApproved(StageApproved {
                    requisition_id: cmd.requisition_id,
                    stage: cmd.stage,
                    approver: cmd.approver,
                    comments: cmd.comments.clone(),
                    status_after: RequisitionStatus::for_stage(cmd.stage),
                    occurred_at: cmd.occurred_at,
                })])
            }
        }
    }

    fn handle_mark_approved(&self, cmd: &MarkApproved) -> Result<Vec<RequisitionEvent>, ProcurementError> {
        if self.status == RequisitionStatus::Approved {
            return Ok(Vec::new());
        }
        if self.status.is_terminal() || self.status == RequisitionStatus::Draft {
            return Err(ProcurementError::invalid_transition(
                self.status.as_str(),
                "mark_approved",
            ));
        }
        if !self.all_stages_approved() {
            return Err(ProcurementError::out_of_sequence(
                "all required stages must be approved first",
            ));
        }
        if cmd.total.is_negative() {
            return Err(ProcurementError::validation("total cannot be negative"));
        }
        Ok(vec![RequisitionEvent::Approved(RequisitionApproved {
            requisition_id: cmd.requisition_id,
            reserved_amount: cmd.total,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_cancel(&self, cmd: &Cancel) -> Result<Vec<RequisitionEvent>, ProcurementError> {
        self.require_status(RequisitionStatus::Approved, "cancel")?;
        Ok(vec![RequisitionEvent::Cancelled(RequisitionCancelled {
            requisition_id: cmd.requisition_id,
            reason: cmd.reason.clone(),
            released_amount: self.reserved_amount,
            occurred_at: cmd.occurred_at,
        })])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(req: &mut Requisition, cmd: RequisitionCommand) -> Result<Vec<RequisitionEvent>, ProcurementError> {
        let events = req.handle(&cmd)?;
        for e in &events {
            req.apply(e);
        }
        Ok(events)
    }

    fn drafted(unit_price: i64, quantity: i64) -> (Requisition, RequisitionId) {
        let id = RequisitionId::new(AggregateId::new());
        let mut req = Requisition::empty(id);
        run(
            &mut req,
            RequisitionCommand::Create(CreateRequisition {
                requisition_id: id,
                title: "Lab equipment".to_string(),
                department: DepartmentId::new(),
                budget: BudgetId::new(AggregateId::new()),
                requester: UserId::new(),
                priority: Priority::Normal,
                emergency: false,
                required_by: None,
                occurred_at: Utc::now(),
            }),
        )
        .unwrap();
        run(
            &mut req,
            RequisitionCommand::AddItem(AddItem {
                requisition_id: id,
                line: RequisitionLine {
                    item: CatalogItemId::new(AggregateId::new()),
                    description: "spectrometer".to_string(),
                    quantity,
                    unit_price: Money::from_minor(unit_price),
                },
                occurred_at: Utc::now(),
            }),
        )
        .unwrap();
        (req, id)
    }

    fn submitted(
        stages: Vec<ApprovalStage>,
        tender_required: bool,
    ) -> (Requisition, RequisitionId) {
        let (mut req, id) = drafted(750_000_00, 1);
        run(
            &mut req,
            RequisitionCommand::Submit(Submit {
                requisition_id: id,
                required_stages: stages,
                tender_required,
                occurred_at: Utc::now(),
            }),
        )
        .unwrap();
        (req, id)
    }

    fn approve(req: &mut Requisition, id: RequisitionId, stage: ApprovalStage) -> Result<Vec<RequisitionEvent>, ProcurementError> {
        run(
            req,
            RequisitionCommand::Decide(Decide {
                requisition_id: id,
                stage,
                approver: UserId::new(),
                decision: Decision::Approved,
                comments: None,
                occurred_at: Utc::now(),
            }),
        )
    }

    #[test]
    fn submit_requires_items() {
        let id = RequisitionId::new(AggregateId::new());
        let mut req = Requisition::empty(id);
        run(
            &mut req,
            RequisitionCommand::Create(CreateRequisition {
                requisition_id: id,
                title: "Empty".to_string(),
                department: DepartmentId::new(),
                budget: BudgetId::new(AggregateId::new()),
                requester: UserId::new(),
                priority: Priority::Low,
                emergency: false,
                required_by: None,
                occurred_at: Utc::now(),
            }),
        )
        .unwrap();

        let err = req
            .handle(&RequisitionCommand::Submit(Submit {
                requisition_id: id,
                required_stages: vec![ApprovalStage::Hod],
                tender_required: false,
                occurred_at: Utc::now(),
            }))
            .unwrap_err();
        assert!(matches!(err, ProcurementError::Validation(_)));
    }

    #[test]
    fn out_of_sequence_stage_is_rejected() {
        let (mut req, id) = submitted(ApprovalStage::ALL.to_vec(), true);

        let err = approve(&mut req, id, ApprovalStage::Finance).unwrap_err();
        assert!(matches!(err, ProcurementError::OutOfSequence(_)));
    }

    #[test]
    fn reapproving_a_stage_is_a_noop() {
        let (mut req, id) = submitted(ApprovalStage::ALL.to_vec(), true);

        approve(&mut req, id, ApprovalStage::Hod).unwrap();
        let version_before = req.version();
        let status_before = req.status();

        let events = approve(&mut req, id, ApprovalStage::Hod).unwrap();
        assert!(events.is_empty());
        assert_eq!(req.version(), version_before);
        assert_eq!(req.status(), status_before);
    }

    #[test]
    fn full_chain_with_tender_stops_at_procurement_approved() {
        let (mut req, id) = submitted(ApprovalStage::ALL.to_vec(), true);

        for stage in ApprovalStage::ALL {
            approve(&mut req, id, stage).unwrap();
        }

        assert_eq!(req.status(), RequisitionStatus::ProcurementApproved);
        assert!(req.all_stages_approved());
        assert!(req.tender_required());
    }

    #[test]
    fn rejection_is_terminal() {
        let (mut req, id) = submitted(ApprovalStage::ALL.to_vec(), false);

        run(
            &mut req,
            RequisitionCommand::Decide(Decide {
                requisition_id: id,
                stage: ApprovalStage::Hod,
                approver: UserId::new(),
                decision: Decision::Rejected,
                comments: Some("over budget".to_string()),
                occurred_at: Utc::now(),
            }),
        )
        .unwrap();
        assert_eq!(req.status(), RequisitionStatus::Rejected);

        let err = approve(&mut req, id, ApprovalStage::Faculty).unwrap_err();
        assert!(matches!(err, ProcurementError::InvalidTransition { .. }));
    }

    #[test]
    fn mark_approved_records_reservation_and_enables_cancel() {
        let (mut req, id) = submitted(vec![ApprovalStage::Hod, ApprovalStage::Budget], false);

        approve(&mut req, id, ApprovalStage::Hod).unwrap();
        approve(&mut req, id, ApprovalStage::Budget).unwrap();
        assert_eq!(req.status(), RequisitionStatus::BudgetApproved);

        run(
            &mut req,
            RequisitionCommand::MarkApproved(MarkApproved {
                requisition_id: id,
                total: Money::from_minor(750_000_00),
                occurred_at: Utc::now(),
            }),
        )
        .unwrap();
        assert_eq!(req.status(), RequisitionStatus::Approved);
        assert_eq!(req.reserved_amount(), Money::from_minor(750_000_00));

        let events = run(
            &mut req,
            RequisitionCommand::Cancel(Cancel {
                requisition_id: id,
                reason: "no longer needed".to_string(),
                occurred_at: Utc::now(),
            }),
        )
        .unwrap();
        match &events[0] {
            RequisitionEvent::Cancelled(e) => {
                assert_eq!(e.released_amount, Money::from_minor(750_000_00));
            }
            other => panic!("expected Cancelled, got {other:?}"),
        }
        assert_eq!(req.status(), RequisitionStatus::Cancelled);
    }

    #[test]
    fn mark_approved_requires_all_stages() {
        let (mut req, id) = submitted(vec![ApprovalStage::Hod, ApprovalStage::Budget], false);
        approve(&mut req, id, ApprovalStage::Hod).unwrap();

        let err = req
            .handle(&RequisitionCommand::MarkApproved(MarkApproved {
                requisition_id: id,
                total: Money::from_minor(100_00),
                occurred_at: Utc::now(),
            }))
            .unwrap_err();
        assert!(matches!(err, ProcurementError::OutOfSequence(_)));
    }

    #[test]
    fn items_are_frozen_after_submit() {
        let (mut req, id) = submitted(vec![ApprovalStage::Hod], false);

        let err = req
            .handle(&RequisitionCommand::AddItem(AddItem {
                requisition_id: id,
                line: RequisitionLine {
                    item: CatalogItemId::new(AggregateId::new()),
                    description: "late addition".to_string(),
                    quantity: 1,
                    unit_price: Money::from_minor(10_00),
                },
                occurred_at: Utc::now(),
            }))
            .unwrap_err();
        assert!(matches!(err, ProcurementError::InvalidTransition { .. }));
    }
}
