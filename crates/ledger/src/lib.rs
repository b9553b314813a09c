//! Ledger primitives: budget allocation tracking and stock valuation.
//!
//! Both aggregates append an immutable movement entry (the event, carrying
//! before/after balances) for every mutation; the event stream is the audit
//! trail and is never edited after creation.

pub mod budget;
pub mod stock;

pub use budget::{
    BudgetAllocation, BudgetCommand, BudgetEvent, BudgetId, Enforcement, FiscalYear,
};
pub use stock::{StockCommand, StockEvent, StockItem, StockItemId, StoreId};
