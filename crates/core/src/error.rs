//! Domain error model.
//!
//! Deterministic business failures only; infrastructure errors live in the
//! infra crate. Every variant carries enough context (aggregate id, current
//! status, attempted action) for the caller to render a specific message.

use thiserror::Error;

/// Result type used across the domain layer.
pub type DomainResult<T> = Result<T, ProcurementError>;

/// Domain-level error taxonomy for the procurement engine.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProcurementError {
    /// Malformed input (negative quantity, expiry before effective date, ...).
    #[error("validation failed: {0}")]
    Validation(String),

    /// Requested action is illegal in the aggregate's current status.
    #[error("invalid transition: {action} not allowed in status {current}")]
    InvalidTransition { current: String, action: String },

    /// An approval/amendment stage prerequisite is unmet.
    #[error("out of sequence: {0}")]
    OutOfSequence(String),

    /// Actor lacks the role/capability for the action.
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// Budget reservation or settlement would exceed the allocation.
    #[error("insufficient budget: requested {requested} but only {available} available")]
    InsufficientBudget { requested: i64, available: i64 },

    /// Stock issue exceeds quantity on hand.
    #[error("insufficient stock: requested {requested} but only {on_hand} on hand")]
    InsufficientStock { requested: i64, on_hand: i64 },

    /// Three-way match tolerance exceeded.
    #[error("three-way match failed: {0}")]
    MatchFailure(String),

    /// A pending amendment already targets the same plan item.
    #[error("amendment conflict: {0}")]
    AmendmentConflict(String),

    /// An identifier was invalid (parse failure).
    #[error("invalid identifier: {0}")]
    InvalidId(String),

    /// A requested resource was not found (domain-level).
    #[error("not found")]
    NotFound,

    /// Stale version / optimistic concurrency conflict.
    #[error("conflict: {0}")]
    Conflict(String),
}

impl ProcurementError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn invalid_transition(current: impl Into<String>, action: impl Into<String>) -> Self {
        Self::InvalidTransition {
            current: current.into(),
            action: action.into(),
        }
    }

    pub fn out_of_sequence(msg: impl Into<String>) -> Self {
        Self::OutOfSequence(msg.into())
    }

    pub fn unauthorized(msg: impl Into<String>) -> Self {
        Self::Unauthorized(msg.into())
    }

    pub fn match_failure(msg: impl Into<String>) -> Self {
        Self::MatchFailure(msg.into())
    }

    pub fn amendment_conflict(msg: impl Into<String>) -> Self {
        Self::AmendmentConflict(msg.into())
    }

    pub fn invalid_id(msg: impl Into<String>) -> Self {
        Self::InvalidId(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    pub fn not_found() -> Self {
        Self::NotFound
    }
}
