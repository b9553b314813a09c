use serde_json::Value as JsonValue;

use procura_core::{DepartmentId, Money};
use procura_events::EventEnvelope;
use procura_requisitions::{RequisitionEvent, RequisitionId, RequisitionStatus};

use crate::aggregate_type;
use crate::read_model::ReadStore;

use super::{ProjectionError, StreamCursors, replay_order};

/// One row of the requisition pipeline: where each request sits in the
/// approval chain and what it is worth.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineEntry {
    pub requisition_id: RequisitionId,
    pub title: String,
    pub department: DepartmentId,
    pub status: RequisitionStatus,
    /// Line total as of submission; zero while drafting.
    pub total: Money,
    pub tender_required: bool,
}

/// Requisition pipeline projection over `requisitions.requisition` streams.
#[derive(Debug)]
pub struct RequisitionPipelineProjection<S>
where
    S: ReadStore<RequisitionId, PipelineEntry>,
{
    store: S,
    cursors: StreamCursors,
}

impl<S> RequisitionPipelineProjection<S>
where
    S: ReadStore<RequisitionId, PipelineEntry>,
{
    pub fn new(store: S) -> Self {
        Self {
            store,
            cursors: StreamCursors::new(),
        }
    }

    pub fn get(&self, requisition_id: &RequisitionId) -> Option<PipelineEntry> {
        self.store.get(requisition_id)
    }

    pub fn list(&self) -> Vec<PipelineEntry> {
        self.store.list()
    }

    /// Entries currently awaiting a decision (neither draft nor terminal
    /// nor fully approved).
    pub fn awaiting_decision(&self) -> Vec<PipelineEntry> {
        self.list()
            .into_iter()
            .filter(|e| {
                !matches!(
                    e.status,
                    RequisitionStatus::Draft
                        | RequisitionStatus::Approved
                        | RequisitionStatus::Rejected
                        | RequisitionStatus::Cancelled
                )
            })
            .collect()
    }

    pub fn apply_envelope(
        &self,
        envelope: &EventEnvelope<JsonValue>,
    ) -> Result<(), ProjectionError> {
        if envelope.aggregate_type() != aggregate_type::REQUISITION {
            return Ok(());
        }
        if !self.cursors.admit(envelope.aggregate_id(), envelope.sequence_number())? {
            return Ok(());
        }

        let event: RequisitionEvent = serde_json::from_value(envelope.payload().clone())
            .map_err(|e| ProjectionError::Deserialize(e.to_string()))?;

        match event {
            RequisitionEvent::Created(e) => {
                self.store.upsert(
                    e.requisition_id,
                    PipelineEntry {
                        requisition_id: e.requisition_id,
                        title: e.title,
                        department: e.department,
                        status: RequisitionStatus::Draft,
                        total: Money::ZERO,
                        tender_required: false,
                    },
                );
            }
            RequisitionEvent::Submitted(e) => {
                if let Some(mut entry) = self.store.get(&e.requisition_id) {
                    entry.status = RequisitionStatus::Submitted;
                    entry.total = e.total;
                    entry.tender_required = e.tender_required;
                    self.store.upsert(e.requisition_id, entry);
                }
            }
            RequisitionEvent::StageApproved(e) => {
                if let Some(mut entry) = self.store.get(&e.requisition_id) {
                    entry.status = e.status_after;
                    self.store.upsert(e.requisition_id, entry);
                }
            }
            RequisitionEvent::Rejected(e) => {
                if let Some(mut entry) = self.store.get(&e.requisition_id) {
                    entry.status = RequisitionStatus::Rejected;
                    self.store.upsert(e.requisition_id, entry);
                }
            }
            RequisitionEvent::Approved(e) => {
                if let Some(mut entry) = self.store.get(&e.requisition_id) {
                    entry.status = RequisitionStatus::Approved;
                    self.store.upsert(e.requisition_id, entry);
                }
            }
            RequisitionEvent::Cancelled(e) => {
                if let Some(mut entry) = self.store.get(&e.requisition_id) {
                    entry.status = RequisitionStatus::Cancelled;
                    self.store.upsert(e.requisition_id, entry);
                }
            }
            // Line edits do not move the pipeline; totals snapshot at submit.
            RequisitionEvent::ItemAdded(_) | RequisitionEvent::ItemRemoved(_) => {}
        }

        self.cursors.advance(envelope.aggregate_id(), envelope.sequence_number());
        Ok(())
    }

    pub fn rebuild_from_scratch(
        &self,
        envelopes: impl IntoIterator<Item = EventEnvelope<JsonValue>>,
    ) -> Result<(), ProjectionError> {
        self.cursors.reset();
        self.store.clear();

        for envelope in replay_order(envelopes) {
            self.apply_envelope(&envelope)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::Utc;
    use procura_core::{AggregateId, UserId};
    use procura_ledger::BudgetId;
    use procura_requisitions::requisition::{
        RequisitionCreated, RequisitionSubmitted, StageApproved,
    };
    use procura_requisitions::{ApprovalStage, Priority};
    use uuid::Uuid;

    use super::*;
    use crate::read_model::InMemoryReadStore;

    fn envelope(id: RequisitionId, seq: u64, event: &RequisitionEvent) -> EventEnvelope<JsonValue> {
        EventEnvelope::new(
            Uuid::now_v7(),
            id.0,
            aggregate_type::REQUISITION,
            UserId::new(),
            seq,
            serde_json::to_value(event).unwrap(),
        )
    }

    #[test]
    fn pipeline_follows_the_approval_chain() {
        let projection = RequisitionPipelineProjection::new(Arc::new(InMemoryReadStore::new()));
        let id = RequisitionId::new(AggregateId::new());

        let created = RequisitionEvent::Created(RequisitionCreated {
            requisition_id: id,
            title: "Lab reagents".to_string(),
            department: DepartmentId::new(),
            budget: BudgetId::new(AggregateId::new()),
            requester: UserId::new(),
            priority: Priority::Normal,
            emergency: false,
            required_by: None,
            occurred_at: Utc::now(),
        });
        let submitted = RequisitionEvent::Submitted(RequisitionSubmitted {
            requisition_id: id,
            required_stages: vec![ApprovalStage::Hod, ApprovalStage::Budget],
            tender_required: false,
            total: Money::from_minor(30_000_00),
            occurred_at: Utc::now(),
        });
        let hod = RequisitionEvent::StageApproved(StageApproved {
            requisition_id: id,
            stage: ApprovalStage::Hod,
            approver: UserId::new(),
            comments: None,
            status_after: RequisitionStatus::HodApproved,
            occurred_at: Utc::now(),
        });

        projection.apply_envelope(&envelope(id, 1, &created)).unwrap();
        projection.apply_envelope(&envelope(id, 2, &submitted)).unwrap();
        projection.apply_envelope(&envelope(id, 3, &hod)).unwrap();

        let entry = projection.get(&id).unwrap();
        assert_eq!(entry.status, RequisitionStatus::HodApproved);
        assert_eq!(entry.total, Money::from_minor(30_000_00));

        let awaiting = projection.awaiting_decision();
        assert_eq!(awaiting.len(), 1);
    }
}
