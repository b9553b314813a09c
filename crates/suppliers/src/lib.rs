//! Supplier registry: capability declarations per item category and
//! attached document metadata (never file bytes).

pub mod supplier;

pub use supplier::{
    DocumentKind, Supplier, SupplierCommand, SupplierDocument, SupplierEvent, SupplierId,
};
