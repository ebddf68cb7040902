//! Domain error model.

use thiserror::Error;

/// Result type used across the domain layer.
pub type DomainResult<T> = Result<T, DomainError>;

/// Domain-level error.
///
/// Keep this focused on deterministic, business/domain failures (validation,
/// invariants, conflicts). Infrastructure concerns belong elsewhere.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// A value failed validation (e.g. malformed input). Rejected before any
    /// lock is taken.
    #[error("validation failed: {0}")]
    Validation(String),

    /// A collection would drive a depot's stock below zero. No change applied.
    #[error("insufficient stock: {0}")]
    InsufficientStock(String),

    /// A meter sale's latest reading does not exceed the stored reading.
    #[error("invalid meter reading: {0}")]
    InvalidMeterReading(String),

    /// A key-scoped exclusive lock could not be acquired within the wait
    /// budget. Retryable: resubmit with the same idempotency key.
    #[error("lock timeout: {0}")]
    LockTimeout(String),

    /// The durable store could not be reached. The command itself was never
    /// evaluated; retryable with the same idempotency key.
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// An invoice number collision reached the store. Structurally impossible
    /// under correct locking; treated as a fatal integrity bug, not a normal
    /// error path.
    #[error("duplicate invoice number: {0}")]
    DuplicateInvoiceNumber(String),

    /// A domain invariant was violated (e.g. amount overflow).
    #[error("invariant violated: {0}")]
    InvariantViolation(String),

    /// A conflict occurred (e.g. invoice already issued, reused key).
    #[error("conflict: {0}")]
    Conflict(String),

    /// A requested resource was not found (domain-level).
    #[error("not found")]
    NotFound,

    /// Authorization failure at the domain boundary.
    #[error("unauthorized")]
    Unauthorized,
}

impl DomainError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn insufficient_stock(msg: impl Into<String>) -> Self {
        Self::InsufficientStock(msg.into())
    }

    pub fn invalid_meter_reading(msg: impl Into<String>) -> Self {
        Self::InvalidMeterReading(msg.into())
    }

    pub fn lock_timeout(msg: impl Into<String>) -> Self {
        Self::LockTimeout(msg.into())
    }

    pub fn unavailable(msg: impl Into<String>) -> Self {
        Self::Unavailable(msg.into())
    }

    pub fn invariant(msg: impl Into<String>) -> Self {
        Self::InvariantViolation(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    pub fn not_found() -> Self {
        Self::NotFound
    }

    /// Whether the caller should back off and resubmit the same command
    /// (with the same idempotency key).
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::LockTimeout(_) | Self::Unavailable(_))
    }
}
