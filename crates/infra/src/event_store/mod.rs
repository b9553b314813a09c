//! Append-only event store boundary.
//!
//! Storage-agnostic abstraction over aggregate event streams. The in-memory
//! implementation backs tests and single-process deployments; the Postgres
//! implementation backs production.

pub mod in_memory;
pub mod postgres;
pub mod store;

pub use in_memory::InMemoryEventStore;
pub use postgres::PostgresEventStore;
pub use store::{EventStore, EventStoreError, StoredEvent, UncommittedEvent};
