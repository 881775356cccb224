//! Transaction error types.

use std::path::PathBuf;

use thiserror::Error;

use crate::connection::{CommitError, ConnectionError};

/// Result type for transaction operations.
pub type TransactionResult<T> = Result<T, TransactionError>;

/// Errors returned by the coordinator.
#[derive(Debug, Error)]
pub enum TransactionError {
    /// The physical begin failed. No state was changed.
    #[error("failed to begin transaction: {0}")]
    Connection(#[from] ConnectionError),

    /// The physical commit failed. The nesting has already been closed.
    #[error("failed to commit transaction: {0}")]
    Commit(#[from] CommitError),

    /// Another participant rolled back, so this work will never commit.
    ///
    /// Only returned under [`PoisonPolicy::Reject`](super::PoisonPolicy::Reject).
    #[error("transaction {nesting_id} was rolled back by another participant")]
    Poisoned {
        nesting_id: String,
    },

    /// `commit` or `rollback` was called without a matching `begin`.
    #[error("{operation} called with no open transaction")]
    Usage {
        operation: &'static str,
    },
}

impl TransactionError {
    /// Check if this error is caller misuse rather than a runtime failure.
    pub fn is_usage_error(&self) -> bool {
        matches!(self, TransactionError::Usage { .. })
    }

    /// Check if this error reports a poisoned nesting.
    pub fn is_poisoned(&self) -> bool {
        matches!(self, TransactionError::Poisoned { .. })
    }

    pub(crate) fn usage(operation: &'static str) -> Self {
        Self::Usage { operation }
    }
}

/// Errors loading a [`CoordinatorConfig`](super::CoordinatorConfig).
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config: {0}")]
    Parse(#[from] serde_json::Error),
}
