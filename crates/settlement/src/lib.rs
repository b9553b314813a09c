//! Settlement: invoices, three-way matching and payments.

pub mod invoice;
pub mod payment;
pub mod three_way;

pub use invoice::{Invoice, InvoiceCommand, InvoiceEvent, InvoiceId, InvoiceStatus};
pub use payment::{Payment, PaymentCommand, PaymentEvent, PaymentId, PaymentMethod, PaymentStatus};
pub use three_way::{MatchInput, MatchOutcome, MatchTolerance, three_way_match};
