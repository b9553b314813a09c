//! Cross-aggregate workflow services.
//!
//! Each aggregate is its own consistency boundary; operations that span two
//! or more aggregates (approval + budget reservation, award + budget
//! reconciliation, order cancellation + commitment release, GRN posting +
//! stock receipt, payment + settlement, stock transfer) are orchestrated
//! here as ordered dispatches with precise compensating commands when a
//! later step fails. Authorization is checked once, at this boundary,
//! against the capability table — aggregates stay authorization-free.

pub mod approval;
pub mod award;
pub mod cancellation;
pub mod payment;
pub mod receiving;
pub mod transfer;

pub use approval::ApprovalWorkflow;
pub use award::AwardWorkflow;
pub use cancellation::OrderCancellationWorkflow;
pub use payment::PaymentWorkflow;
pub use receiving::ReceivingWorkflow;
pub use transfer::StockTransferWorkflow;
