//! Error taxonomy shared across the services.

use thiserror::Error;

/// Result type used across the domain layer.
pub type DispatchResult<T> = Result<T, DispatchError>;

/// Typed failure raised by lifecycle operations.
///
/// Keep this focused on deterministic, business/domain failures. The inbound
/// command layer translates these into protocol responses; consumer loops only
/// ever log them.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DispatchError {
    /// Input failed validation (bad shape/range). Never retried.
    #[error("validation failed: {0}")]
    Validation(String),

    /// A referenced entity does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// A uniqueness constraint was violated (unit code, one order per incident).
    #[error("duplicate: {0}")]
    Duplicate(String),

    /// The operation is illegal for the entity's current lifecycle state.
    #[error("invalid state: {0}")]
    InvalidState(String),

    /// An assignment status edge that is not in the transition table.
    #[error("invalid transition: {0}")]
    InvalidTransition(String),

    /// The unit is not in `Available` status.
    #[error("unit unavailable: {0}")]
    UnitUnavailable(String),

    /// The unit already has a non-terminal assignment elsewhere.
    #[error("unit busy: {0}")]
    UnitBusy(String),

    /// An identifier failed to parse.
    #[error("invalid identifier: {0}")]
    InvalidId(String),

    /// The underlying store rejected the write.
    #[error("database error: {0}")]
    Database(String),

    /// Unclassified internal failure.
    #[error("internal error: {0}")]
    Internal(String),
}

impl DispatchError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn duplicate(msg: impl Into<String>) -> Self {
        Self::Duplicate(msg.into())
    }

    pub fn invalid_state(msg: impl Into<String>) -> Self {
        Self::InvalidState(msg.into())
    }

    pub fn invalid_transition(msg: impl Into<String>) -> Self {
        Self::InvalidTransition(msg.into())
    }

    pub fn unit_unavailable(msg: impl Into<String>) -> Self {
        Self::UnitUnavailable(msg.into())
    }

    pub fn unit_busy(msg: impl Into<String>) -> Self {
        Self::UnitBusy(msg.into())
    }

    pub fn invalid_id(msg: impl Into<String>) -> Self {
        Self::InvalidId(msg.into())
    }

    pub fn database(msg: impl Into<String>) -> Self {
        Self::Database(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Whether retrying the same operation could ever succeed.
    ///
    /// Consumer loops use this to decide between discarding a message and
    /// leaving it for redelivery.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Database(_) | Self::Internal(_))
    }
}
