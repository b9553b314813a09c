//! Infrastructure layer: event persistence, dispatch, projections, workflows.

pub mod audit;
pub mod dispatcher;
pub mod event_store;
pub mod notifications;
pub mod projections;
pub mod read_model;
pub mod workflows;

/// Stream type names, one per aggregate. The event store pins each stream
/// to the type that opened it, and projections filter on these.
pub mod aggregate_type {
    pub const BUDGET: &str = "ledger.budget";
    pub const STOCK_ITEM: &str = "ledger.stock_item";
    pub const REQUISITION: &str = "requisitions.requisition";
    pub const TENDER: &str = "sourcing.tender";
    pub const BID: &str = "sourcing.bid";
    pub const PURCHASE_ORDER: &str = "purchasing.order";
    pub const GRN: &str = "purchasing.grn";
    pub const INVOICE: &str = "settlement.invoice";
    pub const PAYMENT: &str = "settlement.payment";
    pub const PLAN: &str = "planning.plan";
    pub const SUPPLIER: &str = "suppliers.supplier";
    pub const CATALOG_ITEM: &str = "catalog.item";
}

pub use audit::{AuditRecord, AuditTrail};
pub use dispatcher::{CommandDispatcher, DispatchError};
pub use event_store::{EventStore, EventStoreError, InMemoryEventStore, PostgresEventStore};
pub use notifications::{Notification, NotificationKind, NotificationOutbox};
pub use read_model::{InMemoryReadStore, ReadStore};
