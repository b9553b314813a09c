//! `procura-core` — domain foundation for the procurement engine.
//!
//! Pure domain primitives only: no storage, no transport, no IO.

pub mod aggregate;
pub mod entity;
pub mod error;
pub mod id;
pub mod money;
pub mod value_object;

pub use aggregate::{Aggregate, AggregateRoot, ExpectedVersion};
pub use entity::Entity;
pub use error::{DomainResult, ProcurementError};
pub use id::{AggregateId, DepartmentId, UserId};
pub use money::Money;
pub use value_object::ValueObject;
