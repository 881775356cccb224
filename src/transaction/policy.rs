//! What a commit reports when it lands on a poisoned nesting.
//!
//! Once any participant rolls back, the physical transaction is gone and no
//! later commit in the same nesting can persist anything. The policy only
//! decides whether the committing caller is told about it:
//! - Discard: the commit returns `Ok(())` and the work is silently dropped
//! - Reject: the commit returns `TransactionError::Poisoned`

use std::fmt;

use serde::{Deserialize, Serialize};

/// Reporting policy for commits inside a poisoned nesting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PoisonPolicy {
    /// Accept the commit call and drop the work without telling the caller.
    #[default]
    Discard,

    /// Fail the commit call with `TransactionError::Poisoned`.
    ///
    /// The state transition is identical to `Discard`; the caller still must
    /// not call `rollback` for the same `begin`.
    Reject,
}

impl PoisonPolicy {
    /// Check if poisoned commits are reported as errors.
    pub fn rejects(&self) -> bool {
        matches!(self, PoisonPolicy::Reject)
    }
}

impl fmt::Display for PoisonPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PoisonPolicy::Discard => write!(f, "discard"),
            PoisonPolicy::Reject => write!(f, "reject"),
        }
    }
}

impl std::str::FromStr for PoisonPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "discard" | "silent" => Ok(PoisonPolicy::Discard),
            "reject" | "strict" => Ok(PoisonPolicy::Reject),
            _ => Err(format!("unknown poison policy: {}", s)),
        }
    }
}
