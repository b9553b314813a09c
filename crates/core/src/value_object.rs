//! Value object trait: equality by value, not identity.

/// Marker trait for immutable domain values compared by their attributes
/// (e.g. `Money`), as opposed to entities which are compared by id.
pub trait ValueObject: Clone + PartialEq + core::fmt::Debug {}
