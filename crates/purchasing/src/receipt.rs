use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use procura_catalog::CatalogItemId;
use procura_core::{Aggregate, AggregateId, AggregateRoot, ProcurementError, UserId};
use procura_events::Event;

use crate::order::PurchaseOrderId;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GrnId(pub AggregateId);

impl GrnId {
    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }
}

impl core::fmt::Display for GrnId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum GrnStatus {
    Draft,
    Inspecting,
    Accepted,
    Partial,
    Rejected,
}

impl GrnStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, GrnStatus::Accepted | GrnStatus::Partial | GrnStatus::Rejected)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            GrnStatus::Draft => "draft",
            GrnStatus::Inspecting => "inspecting",
            GrnStatus::Accepted => "accepted",
            GrnStatus::Partial => "partial",
            GrnStatus::Rejected => "rejected",
        }
    }
}

impl core::fmt::Display for GrnStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One GRN line: what the PO ordered, what the supplier delivered, and what
/// inspection accepted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GrnLine {
    pub item: CatalogItemId,
    pub quantity_ordered: i64,
    pub quantity_delivered: i64,
    pub quantity_accepted: i64,
}

/// Aggregate root: GoodsReceivedNote.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GoodsReceivedNote {
    id: GrnId,
    order: Option<PurchaseOrderId>,
    lines: Vec<GrnLine>,
    inspector: Option<UserId>,
    status: GrnStatus,
    version: u64,
    created: bool,
}

impl GoodsReceivedNote {
    pub fn empty(id: GrnId) -> Self {
        Self {
            id,
            order: None,
            lines: Vec::new(),
            inspector: None,
            status: GrnStatus::Draft,
            version: 0,
            created: false,
        }
    }

    pub fn status(&self) -> GrnStatus {
        self.status
    }

    pub fn order(&self) -> Option<PurchaseOrderId> {
        self.order
    }

    pub fn lines(&self) -> &[GrnLine] {
        &self.lines
    }

    /// Lines with a non-zero accepted quantity, for stock posting and PO
    /// delivery recording.
    pub fn accepted_lines(&self) -> impl Iterator<Item = &GrnLine> {
        self.lines.iter().filter(|line| line.quantity_accepted > 0)
    }
}

impl AggregateRoot for GoodsReceivedNote {
    type Id = GrnId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateGrn {
    pub grn_id: GrnId,
    pub order: PurchaseOrderId,
    /// (item, ordered, delivered) per line.
    pub lines: Vec<(CatalogItemId, i64, i64)>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BeginInspection {
    pub grn_id: GrnId,
    pub inspector: UserId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompleteInspection {
    pub grn_id: GrnId,
    /// (item, accepted quantity) per line.
    pub accepted: Vec<(CatalogItemId, i64)>,
    pub notes: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum GrnCommand {
    Create(CreateGrn),
    BeginInspection(BeginInspection),
    CompleteInspection(CompleteInspection),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GrnCreated {
    pub grn_id: GrnId,
    pub order: PurchaseOrderId,
    pub lines: Vec<(CatalogItemId, i64, i64)>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InspectionStarted {
    pub grn_id: GrnId,
    pub inspector: UserId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InspectionCompleted {
    pub grn_id: GrnId,
    pub accepted: Vec<(CatalogItemId, i64)>,
    pub outcome: GrnStatus,
    pub notes: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum GrnEvent {
    Created(GrnCreated),
    InspectionStarted(InspectionStarted),
    InspectionCompleted(InspectionCompleted),
}

impl Event for GrnEvent {
    fn event_type(&self) -> &'static str {
        match self {
            GrnEvent::Created(_) => "purchasing.grn.created",
            GrnEvent::InspectionStarted(_) => "purchasing.grn.inspection_started",
            GrnEvent::InspectionCompleted(_) => "purchasing.grn.inspection_completed",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            GrnEvent::Created(e) => e.occurred_at,
            GrnEvent::InspectionStarted(e) => e.occurred_at,
            GrnEvent::InspectionCompleted(e) => e.occurred_at,
        }
    }
}

impl Aggregate for GoodsReceivedNote {
    type Command = GrnCommand;
    type Event = GrnEvent;
    type Error = ProcurementError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            GrnEvent::Created(e) => {
                self.id = e.grn_id;
                self.order = Some(e.order);
                self.lines = e
                    .lines
                    .iter()
                    .map(|(item, ordered, delivered)| GrnLine {
                        item: *item,
                        quantity_ordered: *ordered,
                        quantity_delivered: *delivered,
                        quantity_accepted: 0,
                    })
                    .collect();
                self.status = GrnStatus::Draft;
                self.created = true;
            }
            GrnEvent::InspectionStarted(e) => {
                self.inspector = Some(e.inspector);
                self.status = GrnStatus::Inspecting;
            }
            GrnEvent::InspectionCompleted(e) => {
                for (item, accepted) in &e.accepted {
                    if let Some(line) = self.lines.iter_mut().find(|l| l.item == *item) {
                        line.quantity_accepted = *accepted;
                    }
                }
                self.status = e.outcome;
            }
        }

        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            GrnCommand::Create(cmd) => self.handle_create(cmd),
            GrnCommand::BeginInspection(cmd) => self.handle_begin_inspection(cmd),
            GrnCommand::CompleteInspection(cmd) => self.handle_complete_inspection(cmd),
        }
    }
}

impl GoodsReceivedNote {
    fn handle_create(&self, cmd: &CreateGrn) -> Result<Vec<GrnEvent>, ProcurementError> {
        if self.created {
            return Err(ProcurementError::conflict("goods received note already exists"));
        }
        if cmd.lines.is_empty() {
            return Err(ProcurementError::validation("note requires at least one line"));
        }
        if cmd
            .lines
            .iter()
            .any(|(_, ordered, delivered)| *ordered <= 0 || *delivered <= 0)
        {
            return Err(ProcurementError::validation(
                "ordered and delivered quantities must be positive",
            ));
        }
        Ok(vec![GrnEvent::Created(GrnCreated {
            grn_id: cmd.grn_id,
            order: cmd.order,
            lines: cmd.lines.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_begin_inspection(&self, cmd: &BeginInspection) -> Result<Vec<GrnEvent>, ProcurementError> {
        if self.status != GrnStatus::Draft {
            return Err(ProcurementError::invalid_transition(
                self.status.as_str(),
                "begin_inspection",
            ));
        }
        Ok(vec![GrnEvent::InspectionStarted(InspectionStarted {
            grn_id: cmd.grn_id,
            inspector: cmd.inspector,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_complete_inspection(&self, cmd: &CompleteInspection) -> Result<Vec<GrnEvent>, ProcurementError> {
        if self.status != GrnStatus::Inspecting {
            return Err(ProcurementError::invalid_transition(
                self.status.as_str(),
                "complete_inspection",
            ));
        }

        let mut total_accepted: i64 = 0;
        let mut total_delivered: i64 = 0;
        for line in &self.lines {
            let accepted = cmd
                .accepted
                .iter()
                .find(|(item, _)| *item == line.item)
                .map(|(_, qty)| *qty)
                .unwrap_or(0);
            if accepted < 0 {
                return Err(ProcurementError::validation(
                    "accepted quantity cannot be negative",
                ));
            }
            if accepted > line.quantity_delivered {
                return Err(ProcurementError::validation(format!(
                    "accepted {} exceeds delivered {}",
                    accepted, line.quantity_delivered
                )));
            }
            total_accepted += accepted;
            total_delivered += line.quantity_delivered;
        }
        if cmd
            .accepted
            .iter()
            .any(|(item, _)| !self.lines.iter().any(|l| l.item == *item))
        {
            return Err(ProcurementError::validation(
                "accepted item is not on the note",
            ));
        }

        let outcome = if total_accepted == 0 {
            GrnStatus::Rejected
        } else if total_accepted == total_delivered {
            GrnStatus::Accepted
        } else {
            GrnStatus::Partial
        };

        Ok(vec![GrnEvent::InspectionCompleted(InspectionCompleted {
            grn_id: cmd.grn_id,
            accepted: cmd.accepted.clone(),
            outcome,
            notes: cmd.notes.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(grn: &mut GoodsReceivedNote, cmd: GrnCommand) -> Result<Vec<GrnEvent>, ProcurementError> {
        let events = grn.handle(&cmd)?;
        for e in &events {
            grn.apply(e);
        }
        Ok(events)
    }

    fn inspecting(lines: Vec<(CatalogItemId, i64, i64)>) -> (GoodsReceivedNote, GrnId) {
        let id = GrnId::new(AggregateId::new());
        let mut grn = GoodsReceivedNote::empty(id);
        run(
            &mut grn,
            GrnCommand::Create(CreateGrn {
                grn_id: id,
                order: PurchaseOrderId::new(AggregateId::new()),
                lines,
                occurred_at: Utc::now(),
            }),
        )
        .unwrap();
        run(
            &mut grn,
            GrnCommand::BeginInspection(BeginInspection {
                grn_id: id,
                inspector: UserId::new(),
                occurred_at: Utc::now(),
            }),
        )
        .unwrap();
        (grn, id)
    }

    #[test]
    fn full_acceptance_yields_accepted() {
        let item = CatalogItemId::new(AggregateId::new());
        let (mut grn, id) = inspecting(vec![(item, 10, 10)]);

        run(
            &mut grn,
            GrnCommand::CompleteInspection(CompleteInspection {
                grn_id: id,
                accepted: vec![(item, 10)],
                notes: None,
                occurred_at: Utc::now(),
            }),
        )
        .unwrap();
        assert_eq!(grn.status(), GrnStatus::Accepted);
        assert_eq!(grn.lines()[0].quantity_accepted, 10);
    }

    #[test]
    fn partial_acceptance_yields_partial() {
        let item = CatalogItemId::new(AggregateId::new());
        let (mut grn, id) = inspecting(vec![(item, 10, 10)]);

        run(
            &mut grn,
            GrnCommand::CompleteInspection(CompleteInspection {
                grn_id: id,
                accepted: vec![(item, 7)],
                notes: Some("3 units damaged".to_string()),
                occurred_at: Utc::now(),
            }),
        )
        .unwrap();
        assert_eq!(grn.status(), GrnStatus::Partial);
    }

    #[test]
    fn zero_acceptance_yields_rejected() {
        let item = CatalogItemId::new(AggregateId::new());
        let (mut grn, id) = inspecting(vec![(item, 5, 5)]);

        run(
            &mut grn,
            GrnCommand::CompleteInspection(CompleteInspection {
                grn_id: id,
                accepted: vec![],
                notes: Some("wrong model".to_string()),
                occurred_at: Utc::now(),
            }),
        )
        .unwrap();
        assert_eq!(grn.status(), GrnStatus::Rejected);
    }

    #[test]
    fn accepting_more_than_delivered_fails() {
        let item = CatalogItemId::new(AggregateId::new());
        let (grn, id) = inspecting(vec![(item, 10, 8)]);

        let err = grn
            .handle(&GrnCommand::CompleteInspection(CompleteInspection {
                grn_id: id,
                accepted: vec![(item, 9)],
                notes: None,
                occurred_at: Utc::now(),
            }))
            .unwrap_err();
        assert!(matches!(err, ProcurementError::Validation(_)));
    }

    #[test]
    fn inspection_must_be_started_first() {
        let item = CatalogItemId::new(AggregateId::new());
        let id = GrnId::new(AggregateId::new());
        let mut grn = GoodsReceivedNote::empty(id);
        run(
            &mut grn,
            GrnCommand::Create(CreateGrn {
                grn_id: id,
                order: PurchaseOrderId::new(AggregateId::new()),
                lines: vec![(item, 5, 5)],
                occurred_at: Utc::now(),
            }),
        )
        .unwrap();

        let err = grn
            .handle(&GrnCommand::CompleteInspection(CompleteInspection {
                grn_id: id,
                accepted: vec![(item, 5)],
                notes: None,
                occurred_at: Utc::now(),
            }))
            .unwrap_err();
        assert!(matches!(err, ProcurementError::InvalidTransition { .. }));
    }
}
