//! Annual procurement plans and their amendment tracker.

pub mod plan;

pub use plan::{
    Amendment, AmendmentId, AmendmentKind, AmendmentStatus, ItemValues, PlanCommand, PlanEvent,
    PlanId, PlanItem, PlanItemId, PlanStatus, ProcurementMethod, ProcurementPlan, Quarter,
};
