use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use procura_catalog::CatalogItemId;
use procura_core::{Aggregate, AggregateId, AggregateRoot, Money, ProcurementError, UserId};
use procura_events::Event;
use procura_requisitions::RequisitionId;
use procura_sourcing::BidId;
use procura_suppliers::SupplierId;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PurchaseOrderId(pub AggregateId);

impl PurchaseOrderId {
    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }
}

impl core::fmt::Display for PurchaseOrderId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderStatus {
    Draft,
    PendingApproval,
    Approved,
    Sent,
    Acknowledged,
    Delivered,
    Closed,
    Cancelled,
}

impl OrderStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Closed | OrderStatus::Cancelled)
    }

    /// Cancellation window: any state strictly before Delivered.
    fn cancellable(&self) -> bool {
        matches!(
            self,
            OrderStatus::Draft
                | OrderStatus::PendingApproval
                | OrderStatus::Approved
                | OrderStatus::Sent
                | OrderStatus::Acknowledged
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Draft => "draft",
            OrderStatus::PendingApproval => "pending_approval",
            OrderStatus::Approved => "approved",
            OrderStatus::Sent => "sent",
            OrderStatus::Acknowledged => "acknowledged",
            OrderStatus::Delivered => "delivered",
            OrderStatus::Closed => "closed",
            OrderStatus::Cancelled => "cancelled",
        }
    }
}

impl core::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One order line. `quantity_delivered` accumulates across GRNs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderLine {
    pub item: CatalogItemId,
    pub quantity: i64,
    pub unit_price: Money,
    pub quantity_delivered: i64,
}

impl OrderLine {
    pub fn outstanding(&self) -> i64 {
        self.quantity - self.quantity_delivered
    }

    pub fn is_complete(&self) -> bool {
        self.quantity_delivered >= self.quantity
    }

    pub fn line_total(&self) -> Result<Money, ProcurementError> {
        self.unit_price.checked_mul(self.quantity)
    }
}

/// Aggregate root: PurchaseOrder. Derives from an awarded bid, or directly
/// from an approved requisition when no tender was required.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PurchaseOrder {
    id: PurchaseOrderId,
    requisition: Option<RequisitionId>,
    bid: Option<BidId>,
    supplier: Option<SupplierId>,
    lines: Vec<OrderLine>,
    status: OrderStatus,
    version: u64,
    created: bool,
}

impl PurchaseOrder {
    pub fn empty(id: PurchaseOrderId) -> Self {
        Self {
            id,
            requisition: None,
            bid: None,
            supplier: None,
            lines: Vec::new(),
            status: OrderStatus::Draft,
            version: 0,
            created: false,
        }
    }

    pub fn status(&self) -> OrderStatus {
        self.status
    }

    pub fn lines(&self) -> &[OrderLine] {
        &self.lines
    }

    pub fn supplier(&self) -> Option<SupplierId> {
        self.supplier
    }

    pub fn requisition(&self) -> Option<RequisitionId> {
        self.requisition
    }

    pub fn bid(&self) -> Option<BidId> {
        self.bid
    }

    pub fn total(&self) -> Result<Money, ProcurementError> {
        let mut total = Money::ZERO;
        for line in &self.lines {
            total = total.checked_add(line.line_total()?)?;
        }
        Ok(total)
    }

    pub fn unit_price_of(&self, item: CatalogItemId) -> Option<Money> {
        self.lines
            .iter()
            .find(|line| line.item == item)
            .map(|line| line.unit_price)
    }
}

impl AggregateRoot for PurchaseOrder {
    type Id = PurchaseOrderId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateOrder {
    pub order_id: PurchaseOrderId,
    pub requisition: RequisitionId,
    pub bid: Option<BidId>,
    pub supplier: SupplierId,
    pub lines: Vec<(CatalogItemId, i64, Money)>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmitForApproval {
    pub order_id: PurchaseOrderId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApproveOrder {
    pub order_id: PurchaseOrderId,
    pub approver: UserId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SendOrder {
    pub order_id: PurchaseOrderId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AcknowledgeOrder {
    pub order_id: PurchaseOrderId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordDelivery {
    pub order_id: PurchaseOrderId,
    /// (item, delivered quantity) per line covered by one GRN.
    pub deliveries: Vec<(CatalogItemId, i64)>,
    /// The GRN that evidences the delivery.
    pub reference: AggregateId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CloseOrder {
    pub order_id: PurchaseOrderId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CancelOrder {
    pub order_id: PurchaseOrderId,
    pub reason: String,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PurchaseOrderCommand {
    Create(CreateOrder),
    SubmitForApproval(SubmitForApproval),
    Approve(ApproveOrder),
    Send(SendOrder),
    Acknowledge(AcknowledgeOrder),
    RecordDelivery(RecordDelivery),
    Close(CloseOrder),
    Cancel(CancelOrder),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderCreated {
    pub order_id: PurchaseOrderId,
    pub requisition: RequisitionId,
    pub bid: Option<BidId>,
    pub supplier: SupplierId,
    pub lines: Vec<(CatalogItemId, i64, Money)>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderSubmitted {
    pub order_id: PurchaseOrderId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderApproved {
    pub order_id: PurchaseOrderId,
    pub approver: UserId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderSent {
    pub order_id: PurchaseOrderId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderAcknowledged {
    pub order_id: PurchaseOrderId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryRecorded {
    pub order_id: PurchaseOrderId,
    pub deliveries: Vec<(CatalogItemId, i64)>,
    pub reference: AggregateId,
    /// True when this delivery completed every line.
    pub fully_delivered: bool,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderClosed {
    pub order_id: PurchaseOrderId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderCancelled {
    pub order_id: PurchaseOrderId,
    pub reason: String,
    /// Committed amount the workflow must release.
    pub committed_amount: Money,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PurchaseOrderEvent {
    Created(OrderCreated),
    Submitted(OrderSubmitted),
    Approved(OrderApproved),
    Sent(OrderSent),
    Acknowledged(OrderAcknowledged),
    DeliveryRecorded(DeliveryRecorded),
    Closed(OrderClosed),
    Cancelled(OrderCancelled),
}

impl Event for PurchaseOrderEvent {
    fn event_type(&self) -> &'static str {
        match self {
            PurchaseOrderEvent::Created(_) => "purchasing.order.created",
            PurchaseOrderEvent::Submitted(_) => "purchasing.order.submitted",
            PurchaseOrderEvent::Approved(_) => "purchasing.order.approved",
            PurchaseOrderEvent::Sent(_) => "purchasing.order.sent",
            PurchaseOrderEvent::Acknowledged(_) => "purchasing.order.acknowledged",
            PurchaseOrderEvent::DeliveryRecorded(_) => "purchasing.order.delivery_recorded",
            PurchaseOrderEvent::Closed(_) => "purchasing.order.closed",
            PurchaseOrderEvent::Cancelled(_) => "purchasing.order.cancelled",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            PurchaseOrderEvent::Created(e) => e.occurred_at,
            PurchaseOrderEvent::Submitted(e) => e.occurred_at,
            PurchaseOrderEvent::Approved(e) => e.occurred_at,
            PurchaseOrderEvent::Sent(e) => e.occurred_at,
            PurchaseOrderEvent::Acknowledged(e) => e.occurred_at,
            PurchaseOrderEvent::DeliveryRecorded(e) => e.occurred_at,
            PurchaseOrderEvent::Closed(e) => e.occurred_at,
            PurchaseOrderEvent::Cancelled(e) => e.occurred_at,
        }
    }
}

impl Aggregate for PurchaseOrder {
    type Command = PurchaseOrderCommand;
    type Event = PurchaseOrderEvent;
    type Error = ProcurementError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            PurchaseOrderEvent::Created(e) => {
                self.id = e.order_id;
                self.requisition = Some(e.requisition);
                self.bid = e.bid;
                self.supplier = Some(e.supplier);
                self.lines = e
                    .lines
                    .iter()
                    .map(|(item, quantity, unit_price)| OrderLine {
                        item: *item,
                        quantity: *quantity,
                        unit_price: *unit_price,
                        quantity_delivered: 0,
                    })
                    .collect();
                self.status = OrderStatus::Draft;
                self.created = true;
            }
            PurchaseOrderEvent::Submitted(_) => {
                self.status = OrderStatus::PendingApproval;
            }
            PurchaseOrderEvent::Approved(_) => {
                self.status = OrderStatus::Approved;
            }
            PurchaseOrderEvent::Sent(_) => {
                self.status = OrderStatus::Sent;
            }
            PurchaseOrderEvent::Acknowledged(_) => {
                self.status = OrderStatus::Acknowledged;
            }
            PurchaseOrderEvent::DeliveryRecorded(e) => {
                for (item, qty) in &e.deliveries {
                    if let Some(line) = self.lines.iter_mut().find(|l| l.item == *item) {
                        line.quantity_delivered += qty;
                    }
                }
                if e.fully_delivered {
                    self.status = OrderStatus::Delivered;
                }
            }
            PurchaseOrderEvent::Closed(_) => {
                self.status = OrderStatus::Closed;
            }
            PurchaseOrderEvent::Cancelled(_) => {
                self.status = OrderStatus::Cancelled;
            }
        }

        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            PurchaseOrderCommand::Create(cmd) => self.handle_create(cmd),
            PurchaseOrderCommand::SubmitForApproval(cmd) => self.handle_submit(cmd),
            PurchaseOrderCommand::Approve(cmd) => self.handle_approve(cmd),
            PurchaseOrderCommand::Send(cmd) => self.handle_send(cmd),
            PurchaseOrderCommand::Acknowledge(cmd) => self.handle_acknowledge(cmd),
            PurchaseOrderCommand::RecordDelivery(cmd) => self.handle_record_delivery(cmd),
            PurchaseOrderCommand::Close(cmd) => self.handle_close(cmd),
            PurchaseOrderCommand::Cancel(cmd) => self.handle_cancel(cmd),
        }
    }
}

impl PurchaseOrder {
    fn require_status(&self, expected: OrderStatus, action: &str) -> Result<(), ProcurementError> {
        if self.status != expected {
            return Err(ProcurementError::invalid_transition(
                self.status.as_str(),
                action,
            ));
        }
        Ok(())
    }

    fn handle_create(&self, cmd: &CreateOrder) -> Result<Vec<PurchaseOrderEvent>, ProcurementError> {
        if self.created {
            return Err(ProcurementError::conflict("purchase order already exists"));
        }
        if cmd.lines.is_empty() {
            return Err(ProcurementError::validation("order requires at least one line"));
        }
        if cmd
            .lines
            .iter()
            .any(|(_, qty, price)| *qty <= 0 || !price.is_positive())
        {
            return Err(ProcurementError::validation(
                "order lines require positive quantity and price",
            ));
        }
        Ok(vec![PurchaseOrderEvent::Created(OrderCreated {
            order_id: cmd.order_id,
            requisition: cmd.requisition,
            bid: cmd.bid,
            supplier: cmd.supplier,
            lines: cmd.lines.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_submit(&self, cmd: &SubmitForApproval) -> Result<Vec<PurchaseOrderEvent>, ProcurementError> {
        self.require_status(OrderStatus::Draft, "submit_for_approval")?;
        Ok(vec![PurchaseOrderEvent::Submitted(OrderSubmitted {
            order_id: cmd.order_id,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_approve(&self, cmd: &ApproveOrder) -> Result<Vec<PurchaseOrderEvent>, ProcurementError> {
        self.require_status(OrderStatus::PendingApproval, "approve")?;
        Ok(vec![PurchaseOrderEvent::Approved(OrderApproved {
            order_id: cmd.order_id,
            approver: cmd.approver,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_send(&self, cmd: &SendOrder) -> Result<Vec<PurchaseOrderEvent>, ProcurementError> {
        self.require_status(OrderStatus::Approved, "send")?;
        Ok(vec![PurchaseOrderEvent::Sent(OrderSent {
            order_id: cmd.order_id,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_acknowledge(&self, cmd: &AcknowledgeOrder) -> Result<Vec<PurchaseOrderEvent>, ProcurementError> {
        self.require_status(OrderStatus::Sent, "acknowledge")?;
        Ok(vec![PurchaseOrderEvent::Acknowledged(OrderAcknowledged {
            order_id: cmd.order_id,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_record_delivery(&self, cmd: &RecordDelivery) -> Result<Vec<PurchaseOrderEvent>, ProcurementError> {
        if !matches!(self.status, OrderStatus::Sent | OrderStatus::Acknowledged) {
            return Err(ProcurementError::invalid_transition(
                self.status.as_str(),
                "record_delivery",
            ));
        }
        if cmd.deliveries.is_empty() {
            return Err(ProcurementError::validation("delivery has no lines"));
        }

        // Validate every delivered line against the outstanding quantity.
        let mut projected = self.lines.clone();
        for (item, qty) in &cmd.deliveries {
            if *qty <= 0 {
                return Err(ProcurementError::validation(
                    "delivered quantity must be positive",
                ));
            }
            let line = projected
                .iter_mut()
                .find(|l| l.item == *item)
                .ok_or_else(|| {
                    ProcurementError::validation("delivered item is not on the order")
                })?;
            if *qty > line.outstanding() {
                return Err(ProcurementError::validation(format!(
                    "over-delivery: {} exceeds outstanding {}",
                    qty,
                    line.outstanding()
                )));
            }
            line.quantity_delivered += qty;
        }

        let fully_delivered = projected.iter().all(OrderLine::is_complete);
        Ok(vec![PurchaseOrderEvent::DeliveryRecorded(DeliveryRecorded {
            order_id: cmd.order_id,
            deliveries: cmd.deliveries.clone(),
            reference: cmd.reference,
            fully_delivered,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_close(&self, cmd: &CloseOrder) -> Result<Vec<PurchaseOrderEvent>, ProcurementError> {
        self.require_status(OrderStatus::Delivered, "close")?;
        Ok(vec![PurchaseOrderEvent::Closed(OrderClosed {
            order_id: cmd.order_id,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_cancel(&self, cmd: &CancelOrder) -> Result<Vec<PurchaseOrderEvent>, ProcurementError> {
        if !self.status.cancellable() {
            return Err(ProcurementError::invalid_transition(
                self.status.as_str(),
                "cancel",
            ));
        }
        Ok(vec![PurchaseOrderEvent::Cancelled(OrderCancelled {
            order_id: cmd.order_id,
            reason: cmd.reason.clone(),
            committed_amount: self.total()?,
            occurred_at: cmd.occurred_at,
        })])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(po: &mut PurchaseOrder, cmd: PurchaseOrderCommand) -> Result<Vec<PurchaseOrderEvent>, ProcurementError> {
        let events = po.handle(&cmd)?;
        for e in &events {
            po.apply(e);
        }
        Ok(events)
    }

    fn sent_order(lines: Vec<(CatalogItemId, i64, Money)>) -> (PurchaseOrder, PurchaseOrderId) {
        let id = PurchaseOrderId::new(AggregateId::new());
        let mut po = PurchaseOrder::empty(id);
        run(
            &mut po,
            PurchaseOrderCommand::Create(CreateOrder {
                order_id: id,
                requisition: RequisitionId::new(AggregateId::new()),
                bid: None,
                supplier: SupplierId::new(AggregateId::new()),
                lines,
                occurred_at: Utc::now(),
            }),
        )
        .unwrap();
        run(
            &mut po,
            PurchaseOrderCommand::SubmitForApproval(SubmitForApproval {
                order_id: id,
                occurred_at: Utc::now(),
            }),
        )
        .unwrap();
        run(
            &mut po,
            PurchaseOrderCommand::Approve(ApproveOrder {
                order_id: id,
                approver: UserId::new(),
                occurred_at: Utc::now(),
            }),
        )
        .unwrap();
        run(
            &mut po,
            PurchaseOrderCommand::Send(SendOrder {
                order_id: id,
                occurred_at: Utc::now(),
            }),
        )
        .unwrap();
        (po, id)
    }

    fn deliver(po: &mut PurchaseOrder, id: PurchaseOrderId, deliveries: Vec<(CatalogItemId, i64)>) -> Result<Vec<PurchaseOrderEvent>, ProcurementError> {
        run(
            po,
            PurchaseOrderCommand::RecordDelivery(RecordDelivery {
                order_id: id,
                deliveries,
                reference: AggregateId::new(),
                occurred_at: Utc::now(),
            }),
        )
    }

    #[test]
    fn partial_deliveries_accumulate_and_auto_complete() {
        let item = CatalogItemId::new(AggregateId::new());
        let (mut po, id) = sent_order(vec![(item, 10, Money::from_minor(100_00))]);

        deliver(&mut po, id, vec![(item, 4)]).unwrap();
        assert_eq!(po.status(), OrderStatus::Sent);
        assert_eq!(po.lines()[0].quantity_delivered, 4);

        let events = deliver(&mut po, id, vec![(item, 6)]).unwrap();
        match &events[0] {
            PurchaseOrderEvent::DeliveryRecorded(e) => assert!(e.fully_delivered),
            other => panic!("expected DeliveryRecorded, got {other:?}"),
        }
        assert_eq!(po.status(), OrderStatus::Delivered);
    }

    #[test]
    fn over_delivery_is_rejected() {
        let item = CatalogItemId::new(AggregateId::new());
        let (mut po, id) = sent_order(vec![(item, 10, Money::from_minor(100_00))]);

        deliver(&mut po, id, vec![(item, 8)]).unwrap();
        let err = deliver(&mut po, id, vec![(item, 3)]).unwrap_err();
        assert!(matches!(err, ProcurementError::Validation(_)));
        assert_eq!(po.lines()[0].quantity_delivered, 8);
    }

    #[test]
    fn delivery_completes_only_when_every_line_is_complete() {
        let a = CatalogItemId::new(AggregateId::new());
        let b = CatalogItemId::new(AggregateId::new());
        let (mut po, id) = sent_order(vec![
            (a, 5, Money::from_minor(10_00)),
            (b, 2, Money::from_minor(20_00)),
        ]);

        deliver(&mut po, id, vec![(a, 5)]).unwrap();
        assert_eq!(po.status(), OrderStatus::Sent);

        deliver(&mut po, id, vec![(b, 2)]).unwrap();
        assert_eq!(po.status(), OrderStatus::Delivered);
    }

    #[test]
    fn cancellation_is_blocked_after_delivery() {
        let item = CatalogItemId::new(AggregateId::new());
        let (mut po, id) = sent_order(vec![(item, 1, Money::from_minor(50_00))]);
        deliver(&mut po, id, vec![(item, 1)]).unwrap();

        let err = po
            .handle(&PurchaseOrderCommand::Cancel(CancelOrder {
                order_id: id,
                reason: "too late".to_string(),
                occurred_at: Utc::now(),
            }))
            .unwrap_err();
        assert!(matches!(err, ProcurementError::InvalidTransition { .. }));
    }

    #[test]
    fn cancellation_carries_committed_amount() {
        let item = CatalogItemId::new(AggregateId::new());
        let (mut po, id) = sent_order(vec![(item, 3, Money::from_minor(100_00))]);

        let events = run(
            &mut po,
            PurchaseOrderCommand::Cancel(CancelOrder {
                order_id: id,
                reason: "supplier defaulted".to_string(),
                occurred_at: Utc::now(),
            }),
        )
        .unwrap();
        match &events[0] {
            PurchaseOrderEvent::Cancelled(e) => {
                assert_eq!(e.committed_amount, Money::from_minor(300_00));
            }
            other => panic!("expected Cancelled, got {other:?}"),
        }
    }

    #[test]
    fn lifecycle_enforces_order_of_transitions() {
        let id = PurchaseOrderId::new(AggregateId::new());
        let mut po = PurchaseOrder::empty(id);
        run(
            &mut po,
            PurchaseOrderCommand::Create(CreateOrder {
                order_id: id,
                requisition: RequisitionId::new(AggregateId::new()),
                bid: None,
                supplier: SupplierId::new(AggregateId::new()),
                lines: vec![(CatalogItemId::new(AggregateId::new()), 1, Money::from_minor(10_00))],
                occurred_at: Utc::now(),
            }),
        )
        .unwrap();

        let err = po
            .handle(&PurchaseOrderCommand::Send(SendOrder {
                order_id: id,
                occurred_at: Utc::now(),
            }))
            .unwrap_err();
        assert!(matches!(err, ProcurementError::InvalidTransition { .. }));
    }
}
