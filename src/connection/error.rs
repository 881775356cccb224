//! Physical connection error types
//!
//! Each transaction primitive has its own error type so the coordinator can
//! treat them differently: begin and commit failures reach the caller,
//! rollback failures are swallowed.

use thiserror::Error;

/// error from a physical begin, or from any call on an unusable connection
#[derive(Debug, Error)]
pub enum ConnectionError {
    /// the connection cannot be used right now
    #[error("connection unavailable: {0}")]
    Unavailable(String),

    /// the driver already has a transaction open
    #[error("a transaction is already active on this connection")]
    AlreadyActive,

    /// any other failure reported by the driver
    #[error("driver error: {0}")]
    Driver(String),
}

/// error from a physical commit
#[derive(Debug, Error)]
pub enum CommitError {
    /// the driver had no transaction to commit
    #[error("no active transaction to commit")]
    NoActiveTransaction,

    /// the driver refused or failed the commit
    #[error("commit failed: {0}")]
    Driver(String),
}

/// error from a physical rollback
#[derive(Debug, Error)]
pub enum RollbackError {
    /// rollback was issued with no transaction open
    #[error("no active transaction to roll back")]
    NoActiveTransaction,

    /// any other failure reported by the driver
    #[error("rollback failed: {0}")]
    Driver(String),
}

impl ConnectionError {
    /// check if retrying later could succeed
    pub fn is_unavailable(&self) -> bool {
        matches!(self, ConnectionError::Unavailable(_))
    }
}

impl RollbackError {
    /// check if this is the "nothing to roll back" driver quirk
    pub fn is_no_active_transaction(&self) -> bool {
        matches!(self, RollbackError::NoActiveTransaction)
    }
}

/// result type alias for physical begin and data access
pub type ConnectionResult<T> = Result<T, ConnectionError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_classification() {
        assert!(ConnectionError::Unavailable("socket closed".into()).is_unavailable());
        assert!(!ConnectionError::AlreadyActive.is_unavailable());

        assert!(RollbackError::NoActiveTransaction.is_no_active_transaction());
        assert!(!RollbackError::Driver("boom".into()).is_no_active_transaction());
    }

    #[test]
    fn test_error_messages() {
        assert_eq!(
            ConnectionError::Unavailable("socket closed".into()).to_string(),
            "connection unavailable: socket closed"
        );
        assert_eq!(
            CommitError::Driver("deadlock victim".into()).to_string(),
            "commit failed: deadlock victim"
        );
    }
}
