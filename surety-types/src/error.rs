//! Error taxonomy shared by every ledger operation.

use crate::types::{AccountId, Amount};

/// Error types for ledger operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LedgerError {
    /// Role or state precondition unmet
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    /// Unknown key
    #[error("Not found: {0}")]
    NotFound(String),

    /// Entry already exists
    #[error("Duplicate entry: {0}")]
    DuplicateEntry(String),

    /// Voter already voted for this nominee
    #[error("Duplicate vote: {voter} already voted for {nominee}")]
    DuplicateVote { voter: AccountId, nominee: AccountId },

    /// Airline already paid its fee
    #[error("Airline already funded: {0}")]
    AlreadyFunded(AccountId),

    /// Amount outside its permitted bounds
    #[error("Amount out of range: {amount} not in {min}..={max}")]
    OutOfRange { amount: Amount, min: Amount, max: Amount },

    /// Withdrawal exceeds the available balance
    #[error("Insufficient balance: requested {requested}, available {available}")]
    InsufficientBalance { requested: Amount, available: Amount },

    /// Circuit breaker active
    #[error("Service suspended: ledger is not operational")]
    ServiceSuspended,

    /// Flight or request already settled
    #[error("Already resolved: {0}")]
    AlreadyResolved(String),

    /// A committed state would break a ledger invariant
    #[error("Invariant violated: {0}")]
    InvariantViolation(String),

    /// Invalid configuration
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Snapshot could not be read or restored
    #[error("Snapshot error: {0}")]
    SnapshotError(String),
}

impl LedgerError {
    /// Whether the error only signals that the call had nothing left to do.
    pub fn is_noop(&self) -> bool {
        matches!(self, Self::DuplicateVote { .. } | Self::AlreadyResolved(_))
    }
}

pub type Result<T> = std::result::Result<T, LedgerError>;
