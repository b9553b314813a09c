//! Requisitions: the approval chain engine and the `Requisition` aggregate.
//!
//! The approval chain is data-driven: an [`ApprovalPolicy`] maps amount
//! brackets to the stage set a requisition must clear, and the aggregate
//! enforces stage ordering and idempotence when decisions arrive.

pub mod policy;
pub mod requisition;

pub use policy::{ApprovalPolicy, ApprovalStage, ThresholdBracket};
pub use requisition::{
    ApprovalRecord, Decision, Priority, Requisition, RequisitionCommand, RequisitionEvent,
    RequisitionId, RequisitionLine, RequisitionStatus,
};
