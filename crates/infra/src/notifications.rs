//! Notification outbox.
//!
//! Maps committed envelopes to notification records without blocking the
//! business transition. Actual delivery (email, in-app) is an external
//! collaborator that drains the outbox; this module only decides *what* is
//! notification-worthy and queues it durably in process.

use std::sync::RwLock;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use uuid::Uuid;

use procura_core::AggregateId;
use procura_events::EventEnvelope;

/// Notification-worthy transitions.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    RequisitionSubmitted,
    RequisitionApproved,
    RequisitionRejected,
    TenderPublished,
    TenderAwarded,
    OrderSent,
    GoodsReceived,
    InvoiceApproved,
    InvoicePaid,
    PaymentFailed,
    AmendmentProposed,
}

/// A queued notification awaiting delivery by an external collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub id: Uuid,
    pub kind: NotificationKind,
    pub aggregate: AggregateId,
    /// The source event, for delivery-side deduplication.
    pub event_id: Uuid,
    pub queued_at: DateTime<Utc>,
}

/// In-process notification outbox (bus consumer).
#[derive(Debug, Default)]
pub struct NotificationOutbox {
    queue: RwLock<Vec<Notification>>,
}

impl NotificationOutbox {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inspect a committed envelope and queue a notification if its
    /// transition is notification-worthy. Never fails the caller.
    pub fn observe(&self, envelope: &EventEnvelope<JsonValue>) {
        let Some(kind) = classify(envelope) else {
            return;
        };

        let notification = Notification {
            id: Uuid::now_v7(),
            kind,
            aggregate: envelope.aggregate_id(),
            event_id: envelope.event_id(),
            queued_at: Utc::now(),
        };

        match self.queue.write() {
            Ok(mut queue) => queue.push(notification),
            Err(_) => tracing::warn!(
                aggregate_id = %envelope.aggregate_id(),
                kind = ?kind,
                "notification outbox lock poisoned; notification dropped"
            ),
        }
    }

    /// Drain everything currently queued (delivery hand-off).
    pub fn drain(&self) -> Vec<Notification> {
        match self.queue.write() {
            Ok(mut queue) => queue.drain(..).collect(),
            Err(_) => vec![],
        }
    }

    pub fn pending(&self) -> usize {
        self.queue.read().map(|q| q.len()).unwrap_or(0)
    }
}

fn classify(envelope: &EventEnvelope<JsonValue>) -> Option<NotificationKind> {
    let variant = envelope.payload().as_object()?.keys().next()?.as_str();

    match (envelope.aggregate_type(), variant) {
        ("requisitions.requisition", "Submitted") => Some(NotificationKind::RequisitionSubmitted),
        ("requisitions.requisition", "Approved") => Some(NotificationKind::RequisitionApproved),
        ("requisitions.requisition", "Rejected") => Some(NotificationKind::RequisitionRejected),
        ("sourcing.tender", "Published") => Some(NotificationKind::TenderPublished),
        ("sourcing.tender", "Awarded") => Some(NotificationKind::TenderAwarded),
        ("purchasing.order", "Sent") => Some(NotificationKind::OrderSent),
        ("purchasing.grn", "InspectionCompleted") => Some(NotificationKind::GoodsReceived),
        ("settlement.invoice", "Approved") => Some(NotificationKind::InvoiceApproved),
        ("settlement.invoice", "Paid") => Some(NotificationKind::InvoicePaid),
        ("settlement.payment", "Failed") => Some(NotificationKind::PaymentFailed),
        ("planning.plan", "AmendmentProposed") => Some(NotificationKind::AmendmentProposed),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use procura_core::UserId;

    use super::*;

    fn envelope(aggregate_type: &str, payload: JsonValue) -> EventEnvelope<JsonValue> {
        EventEnvelope::new(Uuid::now_v7(), AggregateId::new(), aggregate_type, UserId::new(), 1, payload)
    }

    #[test]
    fn notification_worthy_transitions_are_queued() {
        let outbox = NotificationOutbox::new();

        outbox.observe(&envelope(
            "requisitions.requisition",
            serde_json::json!({"Submitted": {}}),
        ));
        outbox.observe(&envelope(
            "sourcing.tender",
            serde_json::json!({"Awarded": {}}),
        ));

        let drained = outbox.drain();
        assert_eq!(drained.len(), 2);
        assert_eq!(drained[0].kind, NotificationKind::RequisitionSubmitted);
        assert_eq!(drained[1].kind, NotificationKind::TenderAwarded);
        assert_eq!(outbox.pending(), 0);
    }

    #[test]
    fn uninteresting_events_are_ignored() {
        let outbox = NotificationOutbox::new();

        outbox.observe(&envelope("ledger.budget", serde_json::json!({"FundsReserved": {}})));
        outbox.observe(&envelope(
            "requisitions.requisition",
            serde_json::json!({"ItemAdded": {}}),
        ));

        assert_eq!(outbox.pending(), 0);
    }
}
