//! Role-based access control for the procurement engine.
//!
//! Roles and actions are closed enumerations; the capability table maps
//! `{role x action}` to allowed/denied and is checked once at the workflow
//! boundary rather than inside each aggregate.

pub mod action;
pub mod actor;
pub mod capability;
pub mod role;

pub use action::Action;
pub use actor::Actor;
pub use capability::CapabilityTable;
pub use role::Role;
