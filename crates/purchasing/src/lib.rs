//! Purchasing: purchase orders and goods received notes.

pub mod order;
pub mod receipt;

pub use order::{
    OrderLine, OrderStatus, PurchaseOrder, PurchaseOrderCommand, PurchaseOrderEvent,
    PurchaseOrderId,
};
pub use receipt::{
    GoodsReceivedNote, GrnCommand, GrnEvent, GrnId, GrnLine, GrnStatus,
};
