//! REPL error types.

use thiserror::Error;

use crate::connection::ConnectionError;
use crate::record::BatchError;
use crate::transaction::{ConfigError, TransactionError};

/// Result type for REPL operations.
pub type ReplResult<T> = Result<T, ReplError>;

/// REPL errors.
#[derive(Debug, Error)]
pub enum ReplError {
    #[error("transaction error: {0}")]
    Transaction(#[from] TransactionError),

    #[error("connection error: {0}")]
    Connection(#[from] ConnectionError),

    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    #[error("invalid value: {0}")]
    Json(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Usage(String),
}

impl From<BatchError<ConnectionError>> for ReplError {
    fn from(err: BatchError<ConnectionError>) -> Self {
        match err {
            BatchError::Source(e) => ReplError::Connection(e),
            other => ReplError::Usage(other.to_string()),
        }
    }
}

impl ReplError {
    pub(crate) fn usage(message: impl Into<String>) -> Self {
        Self::Usage(message.into())
    }
}
