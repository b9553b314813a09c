use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use procura_catalog::CatalogItemId;
use procura_core::{
    Aggregate, AggregateId, AggregateRoot, DepartmentId, Money, ProcurementError, UserId,
};
use procura_events::Event;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlanId(pub AggregateId);

impl PlanId {
    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }
}

impl core::fmt::Display for PlanId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlanItemId(pub AggregateId);

impl PlanItemId {
    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }
}

impl core::fmt::Display for PlanItemId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AmendmentId(pub AggregateId);

impl AmendmentId {
    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }
}

impl core::fmt::Display for AmendmentId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Quarter {
    Q1,
    Q2,
    Q3,
    Q4,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProcurementMethod {
    OpenTender,
    RestrictedTender,
    RequestForQuotation,
    DirectProcurement,
}

/// The amendable fields of a plan item.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemValues {
    pub quantity: i64,
    pub estimated_unit_cost: Money,
    pub quarter: Quarter,
    pub method: ProcurementMethod,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanItem {
    pub id: PlanItemId,
    pub item: CatalogItemId,
    pub values: ItemValues,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AmendmentKind {
    ModifyItem,
    AddItem,
    RemoveItem,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AmendmentStatus {
    Pending,
    Approved,
    Rejected,
}

/// An amendment record owned by the plan. `old_values` are captured from the
/// target item's state at proposal time so an approved amendment can be
/// reasoned about (and reversed) later.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Amendment {
    pub id: AmendmentId,
    pub kind: AmendmentKind,
    pub target: PlanItemId,
    pub catalog_item: Option<CatalogItemId>,
    pub old_values: Option<ItemValues>,
    pub new_values: Option<ItemValues>,
    pub justification: String,
    pub proposed_by: UserId,
    pub status: AmendmentStatus,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlanStatus {
    Draft,
    Submitted,
    Approved,
    Active,
}

impl PlanStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PlanStatus::Draft => "draft",
            PlanStatus::Submitted => "submitted",
            PlanStatus::Approved => "approved",
            PlanStatus::Active => "active",
        }
    }
}

impl core::fmt::Display for PlanStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Aggregate root: ProcurementPlan. Annual plan per department, carrying its
/// items and amendment history.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcurementPlan {
    id: PlanId,
    department: Option<DepartmentId>,
    fiscal_year: u16,
    title: String,
    items: Vec<PlanItem>,
    amendments: Vec<Amendment>,
    amended: bool,
    amendment_count: u32,
    status: PlanStatus,
    version: u64,
    created: bool,
}

impl ProcurementPlan {
    pub fn empty(id: PlanId) -> Self {
        Self {
            id,
            department: None,
            fiscal_year: 0,
            title: String::new(),
            items: Vec::new(),
            amendments: Vec::new(),
            amended: false,
            amendment_count: 0,
            status: PlanStatus::Draft,
            version: 0,
            created: false,
        }
    }

    pub fn status(&self) -> PlanStatus {
        self.status
    }

    pub fn items(&self) -> &[PlanItem] {
        &self.items
    }

    pub fn amendments(&self) -> &[Amendment] {
        &self.amendments
    }

    pub fn amended(&self) -> bool {
        self.amended
    }

    pub fn amendment_count(&self) -> u32 {
        self.amendment_count
    }

    pub fn item(&self, id: PlanItemId) -> Option<&PlanItem> {
        self.items.iter().find(|item| item.id == id)
    }

    fn amendment(&self, id: AmendmentId) -> Option<&Amendment> {
        self.amendments.iter().find(|a| a.id == id)
    }

    fn has_pending_amendment_for(&self, target: PlanItemId) -> bool {
        self.amendments
            .iter()
            .any(|a| a.target == target && a.status == AmendmentStatus::Pending)
    }
}

impl AggregateRoot for ProcurementPlan {
    type Id = PlanId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreatePlan {
    pub plan_id: PlanId,
    pub department: DepartmentId,
    pub fiscal_year: u16,
    pub title: String,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddPlanItem {
    pub plan_id: PlanId,
    pub item_id: PlanItemId,
    pub item: CatalogItemId,
    pub values: ItemValues,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmitPlan {
    pub plan_id: PlanId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApprovePlan {
    pub plan_id: PlanId,
    pub approver: UserId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivatePlan {
    pub plan_id: PlanId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProposeAmendment {
    pub plan_id: PlanId,
    pub amendment_id: AmendmentId,
    pub kind: AmendmentKind,
    pub target: PlanItemId,
    /// Catalog item for `AddItem` amendments.
    pub catalog_item: Option<CatalogItemId>,
    pub new_values: Option<ItemValues>,
    pub justification: String,
    pub proposed_by: UserId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApproveAmendment {
    pub plan_id: PlanId,
    pub amendment_id: AmendmentId,
    pub approver: UserId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RejectAmendment {
    pub plan_id: PlanId,
    pub amendment_id: AmendmentId,
    pub reason: String,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlanCommand {
    Create(CreatePlan),
    AddItem(AddPlanItem),
    Submit(SubmitPlan),
    Approve(ApprovePlan),
    Activate(ActivatePlan),
    ProposeAmendment(ProposeAmendment),
    ApproveAmendment(ApproveAmendment),
    RejectAmendment(RejectAmendment),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanCreated {
    pub plan_id: PlanId,
    pub department: DepartmentId,
    pub fiscal_year: u16,
    pub title: String,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanItemAdded {
    pub plan_id: PlanId,
    pub item_id: PlanItemId,
    pub item: CatalogItemId,
    pub values: ItemValues,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanSubmitted {
    pub plan_id: PlanId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanApproved {
    pub plan_id: PlanId,
    pub approver: UserId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanActivated {
    pub plan_id: PlanId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AmendmentProposed {
    pub plan_id: PlanId,
    pub amendment_id: AmendmentId,
    pub kind: AmendmentKind,
    pub target: PlanItemId,
    pub catalog_item: Option<CatalogItemId>,
    /// Captured from the target item's current state.
    pub old_values: Option<ItemValues>,
    pub new_values: Option<ItemValues>,
    pub justification: String,
    pub proposed_by: UserId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AmendmentApproved {
    pub plan_id: PlanId,
    pub amendment_id: AmendmentId,
    pub approver: UserId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AmendmentRejected {
    pub plan_id: PlanId,
    pub amendment_id: AmendmentId,
    pub reason: String,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlanEvent {
    Created(PlanCreated),
    ItemAdded(PlanItemAdded),
    Submitted(PlanSubmitted),
    Approved(PlanApproved),
    Activated(PlanActivated),
    AmendmentProposed(AmendmentProposed),
    AmendmentApproved(AmendmentApproved),
    AmendmentRejected(AmendmentRejected),
}

impl Event for PlanEvent {
    fn event_type(&self) -> &'static str {
        match self {
            PlanEvent::Created(_) => "planning.plan.created",
            PlanEvent::ItemAdded(_) => "planning.plan.item_added",
            PlanEvent::Submitted(_) => "planning.plan.submitted",
            PlanEvent::Approved(_) => "planning.plan.approved",
            PlanEvent::Activated(_) => "planning.plan.activated",
            PlanEvent::AmendmentProposed(_) => "planning.plan.amendment_proposed",
            PlanEvent::AmendmentApproved(_) => "planning.plan.amendment_approved",
            PlanEvent::AmendmentRejected(_) => "planning.plan.amendment_rejected",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            PlanEvent::Created(e) => e.occurred_at,
            PlanEvent::ItemAdded(e) => e.occurred_at,
            PlanEvent::Submitted(e) => e.occurred_at,
            PlanEvent::Approved(e) => e.occurred_at,
            PlanEvent::Activated(e) => e.occurred_at,
            PlanEvent::AmendmentProposed(e) => e.occurred_at,
            PlanEvent::AmendmentApproved(e) => e.occurred_at,
            PlanEvent::AmendmentRejected(e) => e.occurred_at,
        }
    }
}

impl Aggregate for ProcurementPlan {
    type Command = PlanCommand;
    type Event = PlanEvent;
    type Error = ProcurementError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            PlanEvent::Created(e) => {
                self.id = e.plan_id;
                self.department = Some(e.department);
                self.fiscal_year = e.fiscal_year;
                self.title = e.title.clone();
                self.status = PlanStatus::Draft;
                self.created = true;
            }
            PlanEvent::ItemAdded(e) => {
                self.items.push(PlanItem {
                    id: e.item_id,
                    item: e.item,
                    values: e.values,
                });
            }
            PlanEvent::Submitted(_) => {
                self.status = PlanStatus::Submitted;
            }
            PlanEvent::Approved(_) => {
                self.status = PlanStatus::Approved;
            }
            PlanEvent::Activated(_) => {
                self.status = PlanStatus::Active;
            }
            PlanEvent::AmendmentProposed(e) => {
                self.amendments.push(Amendment {
                    id: e.amendment_id,
                    kind: e.kind,
                    target: e.target,
                    catalog_item: e.catalog_item,
                    old_values: e.old_values,
                    new_values: e.new_values,
                    justification: e.justification.clone(),
                    proposed_by: e.proposed_by,
                    status: AmendmentStatus::Pending,
                });
            }
            PlanEvent::AmendmentApproved(e) => {
                let Some(index) = self.amendments.iter().position(|a| a.id == e.amendment_id)
                else {
                    return;
                };
                self.amendments[index].status = AmendmentStatus::Approved;
                let amendment = self.amendments[index].clone();
                match amendment.kind {
                    AmendmentKind::ModifyItem => {
                        if let (Some(item), Some(values)) = (
                            self.items.iter_mut().find(|i| i.id == amendment.target),
                            amendment.new_values,
                        ) {
                            item.values = values;
                        }
                    }
                    AmendmentKind::AddItem => {
                        if let (Some(catalog_item), Some(values)) =
                            (amendment.catalog_item, amendment.new_values)
                        {
                            self.items.push(PlanItem {
                                id: amendment.target,
                                item: catalog_item,
                                values,
                            });
                        }
                    }
                    AmendmentKind::RemoveItem => {
                        self.items.retain(|i| i.id != amendment.target);
                    }
                }
                self.amended = true;
                self.amendment_count += 1;
            }
            PlanEvent::AmendmentRejected(e) => {
                if let Some(a) = self.amendments.iter_mut().find(|a| a.id == e.amendment_id) {
                    a.status = AmendmentStatus::Rejected;
                }
            }
        }

        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            PlanCommand::Create(cmd) => self.handle_create(cmd),
            PlanCommand::AddItem(cmd) => self.handle_add_item(cmd),
            PlanCommand::Submit(cmd) => self.handle_submit(cmd),
            PlanCommand::Approve(cmd) => self.handle_approve(cmd),
            PlanCommand::Activate(cmd) => self.handle_activate(cmd),
            PlanCommand::ProposeAmendment(cmd) => self.handle_propose_amendment(cmd),
            PlanCommand::ApproveAmendment(cmd) => self.handle_approve_amendment(cmd),
            PlanCommand::RejectAmendment(cmd) => self.handle_reject_amendment(cmd),
        }
    }
}

fn validate_values(values: &ItemValues) -> Result<(), ProcurementError> {
    if values.quantity <= 0 {
        return Err(ProcurementError::validation("planned quantity must be positive"));
    }
    if !values.estimated_unit_cost.is_positive() {
        return Err(ProcurementError::validation(
            "estimated unit cost must be positive",
        ));
    }
    Ok(())
}

impl ProcurementPlan {
    fn handle_create(&self, cmd: &CreatePlan) -> Result<Vec<PlanEvent>, ProcurementError> {
        if self.created {
            return Err(ProcurementError::conflict("plan already exists"));
        }
        if cmd.title.trim().is_empty() {
            return Err(ProcurementError::validation("title cannot be empty"));
        }
        Ok(vec![PlanEvent::Created(PlanCreated {
            plan_id: cmd.plan_id,
            department: cmd.department,
            fiscal_year: cmd.fiscal_year,
            title: cmd.title.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_add_item(&self, cmd: &AddPlanItem) -> Result<Vec<PlanEvent>, ProcurementError> {
        if self.status != PlanStatus::Draft {
            return Err(ProcurementError::invalid_transition(
                self.status.as_str(),
                "add_item",
            ));
        }
        validate_values(&cmd.values)?;
        if self.items.iter().any(|i| i.id == cmd.item_id) {
            return Err(ProcurementError::conflict("plan item id already used"));
        }
        Ok(vec![PlanEvent::ItemAdded(PlanItemAdded {
            plan_id: cmd.plan_id,
            item_id: cmd.item_id,
            item: cmd.item,
            values: cmd.values,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_submit(&self, cmd: &SubmitPlan) -> Result<Vec<PlanEvent>, ProcurementError> {
        if self.status != PlanStatus::Draft {
            return Err(ProcurementError::invalid_transition(
                self.status.as_str(),
                "submit",
            ));
        }
        if self.items.is_empty() {
            return Err(ProcurementError::validation("cannot submit an empty plan"));
        }
        Ok(vec![PlanEvent::Submitted(PlanSubmitted {
            plan_id: cmd.plan_id,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_approve(&self, cmd: &ApprovePlan) -> Result<Vec<PlanEvent>, ProcurementError> {
        if self.status != PlanStatus::Submitted {
            return Err(ProcurementError::invalid_transition(
                self.status.as_str(),
                "approve",
            ));
        }
        Ok(vec![PlanEvent::Approved(PlanApproved {
            plan_id: cmd.plan_id,
            approver: cmd.approver,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_activate(&self, cmd: &ActivatePlan) -> Result<Vec<PlanEvent>, ProcurementError> {
        if self.status != PlanStatus::Approved {
            return Err(ProcurementError::invalid_transition(
                self.status.as_str(),
                "activate",
            ));
        }
        Ok(vec![PlanEvent::Activated(PlanActivated {
            plan_id: cmd.plan_id,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_propose_amendment(
        &self,
        cmd: &ProposeAmendment,
    ) -> Result<Vec<PlanEvent>, ProcurementError> {
        if !matches!(self.status, PlanStatus::Approved | PlanStatus::Active) {
            return Err(ProcurementError::invalid_transition(
                self.status.as_str(),
                "propose_amendment",
            ));
        }
        if cmd.justification.trim().is_empty() {
            return Err(ProcurementError::validation(
                "amendment requires a justification",
            ));
        }
        if self.amendment(cmd.amendment_id).is_some() {
            return Err(ProcurementError::conflict("amendment id already used"));
        }
        if self.has_pending_amendment_for(cmd.target) {
            return Err(ProcurementError::amendment_conflict(format!(
                "a pending amendment already targets item {}",
                cmd.target
            )));
        }

        let old_values = match cmd.kind {
            AmendmentKind::ModifyItem | AmendmentKind::RemoveItem => {
                let item = self
                    .item(cmd.target)
                    .ok_or_else(ProcurementError::not_found)?;
                Some(item.values)
            }
            AmendmentKind::AddItem => {
                if self.item(cmd.target).is_some() {
                    return Err(ProcurementError::conflict("target item already exists"));
                }
                if cmd.catalog_item.is_none() {
                    return Err(ProcurementError::validation(
                        "adding an item requires a catalog item",
                    ));
                }
                None
            }
        };

        match cmd.kind {
            AmendmentKind::ModifyItem | AmendmentKind::AddItem => {
                let values = cmd.new_values.ok_or_else(|| {
                    ProcurementError::validation("amendment requires new values")
                })?;
                validate_values(&values)?;
            }
            AmendmentKind::RemoveItem => {
                if cmd.new_values.is_some() {
                    return Err(ProcurementError::validation(
                        "removal amendments carry no new values",
                    ));
                }
            }
        }

        Ok(vec![PlanEvent::AmendmentProposed(AmendmentProposed {
            plan_id: cmd.plan_id,
            amendment_id: cmd.amendment_id,
            kind: cmd.kind,
            target: cmd.target,
            catalog_item: cmd.catalog_item,
            old_values,
            new_values: cmd.new_values,
            justification: cmd.justification.clone(),
            proposed_by: cmd.proposed_by,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_approve_amendment(
        &self,
        cmd: &ApproveAmendment,
    ) -> Result<Vec<PlanEvent>, ProcurementError> {
        let amendment = self
            .amendment(cmd.amendment_id)
            .ok_or_else(ProcurementError::not_found)?;
        if amendment.status != AmendmentStatus::Pending {
            return Err(ProcurementError::conflict("amendment is already decided"));
        }
        Ok(vec![PlanEvent::AmendmentApproved(AmendmentApproved {
            plan_id: cmd.plan_id,
            amendment_id: cmd.amendment_id,
            approver: cmd.approver,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_reject_amendment(
        &self,
        cmd: &RejectAmendment,
    ) -> Result<Vec<PlanEvent>, ProcurementError> {
        let amendment = self
            .amendment(cmd.amendment_id)
            .ok_or_else(ProcurementError::not_found)?;
        if amendment.status != AmendmentStatus::Pending {
            return Err(ProcurementError::conflict("amendment is already decided"));
        }
        Ok(vec![PlanEvent::AmendmentRejected(AmendmentRejected {
            plan_id: cmd.plan_id,
            amendment_id: cmd.amendment_id,
            reason: cmd.reason.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(plan: &mut ProcurementPlan, cmd: PlanCommand) -> Result<Vec<PlanEvent>, ProcurementError> {
        let events = plan.handle(&cmd)?;
        for e in &events {
            plan.apply(e);
        }
        Ok(events)
    }

    fn values(quantity: i64, cost: i64, quarter: Quarter) -> ItemValues {
        ItemValues {
            quantity,
            estimated_unit_cost: Money::from_minor(cost),
            quarter,
            method: ProcurementMethod::OpenTender,
        }
    }

    fn active_plan() -> (ProcurementPlan, PlanId, PlanItemId) {
        let id = PlanId::new(AggregateId::new());
        let item_id = PlanItemId::new(AggregateId::new());
        let mut plan = ProcurementPlan::empty(id);
        run(
            &mut plan,
            PlanCommand::Create(CreatePlan {
                plan_id: id,
                department: DepartmentId::new(),
                fiscal_year: 2025,
                title: "Annual plan 2025".to_string(),
                occurred_at: Utc::now(),
            }),
        )
        .unwrap();
        run(
            &mut plan,
            PlanCommand::AddItem(AddPlanItem {
                plan_id: id,
                item_id,
                item: CatalogItemId::new(AggregateId::new()),
                values: values(40, 250_00, Quarter::Q2),
                occurred_at: Utc::now(),
            }),
        )
        .unwrap();
        run(&mut plan, PlanCommand::Submit(SubmitPlan { plan_id: id, occurred_at: Utc::now() })).unwrap();
        run(
            &mut plan,
            PlanCommand::Approve(ApprovePlan {
                plan_id: id,
                approver: UserId::new(),
                occurred_at: Utc::now(),
            }),
        )
        .unwrap();
        run(&mut plan, PlanCommand::Activate(ActivatePlan { plan_id: id, occurred_at: Utc::now() })).unwrap();
        (plan, id, item_id)
    }

    fn propose_modify(
        plan: &mut ProcurementPlan,
        plan_id: PlanId,
        target: PlanItemId,
        new_values: ItemValues,
    ) -> Result<AmendmentId, ProcurementError> {
        let amendment_id = AmendmentId::new(AggregateId::new());
        run(
            plan,
            PlanCommand::ProposeAmendment(ProposeAmendment {
                plan_id,
                amendment_id,
                kind: AmendmentKind::ModifyItem,
                target,
                catalog_item: None,
                new_values: Some(new_values),
                justification: "quantity revised after enrollment figures".to_string(),
                proposed_by: UserId::new(),
                occurred_at: Utc::now(),
            }),
        )?;
        Ok(amendment_id)
    }

    fn approve_amendment(plan: &mut ProcurementPlan, plan_id: PlanId, amendment_id: AmendmentId) {
        run(
            plan,
            PlanCommand::ApproveAmendment(ApproveAmendment {
                plan_id,
                amendment_id,
                approver: UserId::new(),
                occurred_at: Utc::now(),
            }),
        )
        .unwrap();
    }

    #[test]
    fn approved_amendment_applies_values_and_counts() {
        let (mut plan, plan_id, item_id) = active_plan();
        let revised = values(60, 240_00, Quarter::Q3);

        let amendment_id = propose_modify(&mut plan, plan_id, item_id, revised).unwrap();
        assert!(!plan.amended());

        approve_amendment(&mut plan, plan_id, amendment_id);
        assert!(plan.amended());
        assert_eq!(plan.amendment_count(), 1);
        assert_eq!(plan.item(item_id).unwrap().values, revised);
    }

    #[test]
    fn second_pending_amendment_on_same_target_conflicts() {
        let (mut plan, plan_id, item_id) = active_plan();
        propose_modify(&mut plan, plan_id, item_id, values(50, 250_00, Quarter::Q2)).unwrap();

        let err = propose_modify(&mut plan, plan_id, item_id, values(55, 250_00, Quarter::Q2))
            .unwrap_err();
        assert!(matches!(err, ProcurementError::AmendmentConflict(_)));
    }

    #[test]
    fn rejected_amendment_leaves_item_untouched() {
        let (mut plan, plan_id, item_id) = active_plan();
        let original = plan.item(item_id).unwrap().values;
        let amendment_id =
            propose_modify(&mut plan, plan_id, item_id, values(99, 1_00, Quarter::Q4)).unwrap();

        run(
            &mut plan,
            PlanCommand::RejectAmendment(RejectAmendment {
                plan_id,
                amendment_id,
                reason: "not justified".to_string(),
                occurred_at: Utc::now(),
            }),
        )
        .unwrap();

        assert_eq!(plan.item(item_id).unwrap().values, original);
        assert!(!plan.amended());
        assert_eq!(plan.amendment_count(), 0);

        // The target is free for a new proposal.
        propose_modify(&mut plan, plan_id, item_id, values(45, 250_00, Quarter::Q2)).unwrap();
    }

    #[test]
    fn amendment_round_trip_restores_original_values() {
        let (mut plan, plan_id, item_id) = active_plan();
        let original = plan.item(item_id).unwrap().values;

        let first = propose_modify(&mut plan, plan_id, item_id, values(80, 300_00, Quarter::Q4))
            .unwrap();
        approve_amendment(&mut plan, plan_id, first);
        let captured_old = plan.amendments()[0].old_values.unwrap();
        assert_eq!(captured_old, original);

        // Applying the captured old values as a second amendment restores
        // the pre-amendment item.
        let second = propose_modify(&mut plan, plan_id, item_id, captured_old).unwrap();
        approve_amendment(&mut plan, plan_id, second);
        assert_eq!(plan.item(item_id).unwrap().values, original);
        assert_eq!(plan.amendment_count(), 2);
    }

    #[test]
    fn add_and_remove_amendments_change_the_item_set() {
        let (mut plan, plan_id, item_id) = active_plan();

        let add_id = AmendmentId::new(AggregateId::new());
        let new_item = PlanItemId::new(AggregateId::new());
        run(
            &mut plan,
            PlanCommand::ProposeAmendment(ProposeAmendment {
                plan_id,
                amendment_id: add_id,
                kind: AmendmentKind::AddItem,
                target: new_item,
                catalog_item: Some(CatalogItemId::new(AggregateId::new())),
                new_values: Some(values(10, 500_00, Quarter::Q1)),
                justification: "new lab course".to_string(),
                proposed_by: UserId::new(),
                occurred_at: Utc::now(),
            }),
        )
        .unwrap();
        approve_amendment(&mut plan, plan_id, add_id);
        assert_eq!(plan.items().len(), 2);

        let remove_id = AmendmentId::new(AggregateId::new());
        run(
            &mut plan,
            PlanCommand::ProposeAmendment(ProposeAmendment {
                plan_id,
                amendment_id: remove_id,
                kind: AmendmentKind::RemoveItem,
                target: item_id,
                catalog_item: None,
                new_values: None,
                justification: "superseded by shared facility".to_string(),
                proposed_by: UserId::new(),
                occurred_at: Utc::now(),
            }),
        )
        .unwrap();
        approve_amendment(&mut plan, plan_id, remove_id);
        assert_eq!(plan.items().len(), 1);
        assert!(plan.item(item_id).is_none());
        assert_eq!(plan.amendment_count(), 2);
    }

    #[test]
    fn amendments_require_an_approved_or_active_plan() {
        let id = PlanId::new(AggregateId::new());
        let mut plan = ProcurementPlan::empty(id);
        run(
            &mut plan,
            PlanCommand::Create(CreatePlan {
                plan_id: id,
                department: DepartmentId::new(),
                fiscal_year: 2025,
                title: "Draft plan".to_string(),
                occurred_at: Utc::now(),
            }),
        )
        .unwrap();

        let err = plan
            .handle(&PlanCommand::ProposeAmendment(ProposeAmendment {
                plan_id: id,
                amendment_id: AmendmentId::new(AggregateId::new()),
                kind: AmendmentKind::ModifyItem,
                target: PlanItemId::new(AggregateId::new()),
                catalog_item: None,
                new_values: Some(values(1, 1_00, Quarter::Q1)),
                justification: "too early".to_string(),
                proposed_by: UserId::new(),
                occurred_at: Utc::now(),
            }))
            .unwrap_err();
        assert!(matches!(err, ProcurementError::InvalidTransition { .. }));
    }
}
