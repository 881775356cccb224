//! In-process reference driver.

use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;
use serde_json::Value;

use super::error::{CommitError, ConnectionError, ConnectionResult, RollbackError};
use super::PhysicalConnection;
use crate::record::BatchSource;

/// A transaction primitive as seen by the driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PhysicalCall {
    Begin,
    Commit,
    Rollback,
}

impl fmt::Display for PhysicalCall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PhysicalCall::Begin => write!(f, "BEGIN"),
            PhysicalCall::Commit => write!(f, "COMMIT"),
            PhysicalCall::Rollback => write!(f, "ROLLBACK"),
        }
    }
}

#[derive(Debug, Default)]
struct Faults {
    begin: Option<String>,
    commit: Option<String>,
    rollback: Option<String>,
}

/// An in-memory key/value "database" with real transaction semantics.
///
/// Writes made while a physical transaction is open are staged and only
/// become visible in [`committed_rows`](Self::committed_rows) after a
/// successful commit. Outside a transaction writes apply immediately.
///
/// Every primitive invocation is appended to the call log, including the ones
/// that fail, so tests can count exactly what the driver was asked to do.
#[derive(Debug, Default)]
pub struct MemoryConnection {
    committed: BTreeMap<String, Value>,
    /// `Some` iff a physical transaction is open. `None` values are deletes.
    staged: Option<BTreeMap<String, Option<Value>>>,
    calls: Vec<PhysicalCall>,
    faults: Faults,
    offline: Option<String>,
}

impl MemoryConnection {
    /// Create an empty connection.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a connection pre-loaded with committed rows.
    pub fn with_rows<K, I>(rows: I) -> Self
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, Value)>,
    {
        Self {
            committed: rows.into_iter().map(|(k, v)| (k.into(), v)).collect(),
            ..Self::default()
        }
    }

    /// Check if the driver has a physical transaction open.
    pub fn in_transaction(&self) -> bool {
        self.staged.is_some()
    }

    // ==================== Data ====================

    /// Write a row, staged if a transaction is open.
    pub fn put(&mut self, key: impl Into<String>, value: Value) -> ConnectionResult<()> {
        self.ensure_online()?;
        let key = key.into();
        match self.staged.as_mut() {
            Some(stage) => {
                stage.insert(key, Some(value));
            }
            None => {
                self.committed.insert(key, value);
            }
        }
        Ok(())
    }

    /// Delete a row, staged if a transaction is open. Returns whether it existed.
    pub fn delete(&mut self, key: &str) -> ConnectionResult<bool> {
        let existed = self.get(key)?.is_some();
        match self.staged.as_mut() {
            Some(stage) => {
                stage.insert(key.to_string(), None);
            }
            None => {
                self.committed.remove(key);
            }
        }
        Ok(existed)
    }

    /// Read a row as the open transaction sees it.
    pub fn get(&self, key: &str) -> ConnectionResult<Option<Value>> {
        self.ensure_online()?;
        if let Some(staged) = self.staged.as_ref().and_then(|s| s.get(key)) {
            return Ok(staged.clone());
        }
        Ok(self.committed.get(key).cloned())
    }

    /// All rows as the open transaction sees them, ordered by key.
    pub fn rows(&self) -> ConnectionResult<BTreeMap<String, Value>> {
        self.ensure_online()?;
        let mut view = self.committed.clone();
        if let Some(stage) = &self.staged {
            for (key, value) in stage {
                match value {
                    Some(v) => {
                        view.insert(key.clone(), v.clone());
                    }
                    None => {
                        view.remove(key);
                    }
                }
            }
        }
        Ok(view)
    }

    /// Rows that survived a commit (or were autocommitted).
    pub fn committed_rows(&self) -> &BTreeMap<String, Value> {
        &self.committed
    }

    // ==================== Call log ====================

    /// Every primitive invoked so far, in order.
    pub fn calls(&self) -> &[PhysicalCall] {
        &self.calls
    }

    /// How many times a primitive was invoked.
    pub fn count(&self, call: PhysicalCall) -> usize {
        self.calls.iter().filter(|c| **c == call).count()
    }

    /// Forget the call log.
    pub fn clear_calls(&mut self) {
        self.calls.clear();
    }

    // ==================== Fault injection ====================

    /// Make the next physical begin fail with a driver error.
    pub fn fail_next_begin(&mut self, message: impl Into<String>) {
        self.faults.begin = Some(message.into());
    }

    /// Make the next physical commit fail with a driver error.
    pub fn fail_next_commit(&mut self, message: impl Into<String>) {
        self.faults.commit = Some(message.into());
    }

    /// Make the next physical rollback fail with a driver error.
    pub fn fail_next_rollback(&mut self, message: impl Into<String>) {
        self.faults.rollback = Some(message.into());
    }

    /// Take the connection offline. Begins and data access fail until
    /// [`set_online`](Self::set_online) is called.
    pub fn set_offline(&mut self, reason: impl Into<String>) {
        self.offline = Some(reason.into());
    }

    /// Bring the connection back.
    pub fn set_online(&mut self) {
        self.offline = None;
    }

    /// Check if the connection is usable.
    pub fn is_online(&self) -> bool {
        self.offline.is_none()
    }

    fn ensure_online(&self) -> ConnectionResult<()> {
        match &self.offline {
            Some(reason) => Err(ConnectionError::Unavailable(reason.clone())),
            None => Ok(()),
        }
    }
}

impl PhysicalConnection for MemoryConnection {
    fn begin(&mut self) -> Result<(), ConnectionError> {
        self.calls.push(PhysicalCall::Begin);
        self.ensure_online()?;
        if let Some(message) = self.faults.begin.take() {
            return Err(ConnectionError::Driver(message));
        }
        if self.staged.is_some() {
            return Err(ConnectionError::AlreadyActive);
        }
        self.staged = Some(BTreeMap::new());
        Ok(())
    }

    fn commit(&mut self) -> Result<(), CommitError> {
        self.calls.push(PhysicalCall::Commit);
        let Some(stage) = self.staged.take() else {
            return Err(CommitError::NoActiveTransaction);
        };
        // A failed commit still ends the transaction; the stage is lost.
        if let Some(reason) = &self.offline {
            return Err(CommitError::Driver(format!("connection unavailable: {}", reason)));
        }
        if let Some(message) = self.faults.commit.take() {
            return Err(CommitError::Driver(message));
        }
        for (key, value) in stage {
            match value {
                Some(v) => {
                    self.committed.insert(key, v);
                }
                None => {
                    self.committed.remove(&key);
                }
            }
        }
        Ok(())
    }

    fn rollback(&mut self) -> Result<(), RollbackError> {
        self.calls.push(PhysicalCall::Rollback);
        let was_active = self.staged.take().is_some();
        if let Some(message) = self.faults.rollback.take() {
            return Err(RollbackError::Driver(message));
        }
        if !was_active {
            return Err(RollbackError::NoActiveTransaction);
        }
        Ok(())
    }
}

impl BatchSource for MemoryConnection {
    type Item = (String, Value);
    type Error = ConnectionError;

    fn fetch(&mut self, offset: usize, limit: usize) -> Result<Vec<Self::Item>, Self::Error> {
        Ok(self.rows()?.into_iter().skip(offset).take(limit).collect())
    }
}
