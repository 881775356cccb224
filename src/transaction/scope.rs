//! Scoped transaction handle.
//!
//! A [`TransactionScope`] is one caller's begin/commit-or-rollback obligation
//! expressed as a value: it is created by a successful `begin`, consumed by
//! `commit` or `rollback`, and rolls back when dropped unresolved, so an early
//! return or a panic can never leak nesting depth.
//!
//! Inner code opens nested scopes through the outer one without knowing
//! whether it is the outermost caller:
//!
//! ```
//! use txnest::connection::MemoryConnection;
//! use txnest::transaction::TransactionCoordinator;
//!
//! let mut coord = TransactionCoordinator::new(MemoryConnection::new());
//! let mut outer = coord.scope().unwrap();
//! {
//!     let inner = outer.scope().unwrap();
//!     inner.commit().unwrap();
//! }
//! outer.commit().unwrap();
//! assert_eq!(coord.depth(), 0);
//! ```

use std::ops::Deref;

use crate::connection::PhysicalConnection;
use crate::transaction::coordinator::TransactionCoordinator;
use crate::transaction::error::TransactionResult;

/// A logical transaction handle that rolls back unless resolved.
///
/// Only read access to the coordinator goes through `Deref`. Resolving goes
/// through the scope itself, so a handle can never be released twice:
///
/// ```compile_fail
/// use txnest::connection::MemoryConnection;
/// use txnest::transaction::TransactionCoordinator;
///
/// let mut coord = TransactionCoordinator::new(MemoryConnection::new());
/// let mut scope = coord.scope().unwrap();
/// TransactionCoordinator::rollback(&mut *scope).unwrap();
/// ```
pub struct TransactionScope<'a, C: PhysicalConnection> {
    coordinator: &'a mut TransactionCoordinator<C>,
    resolved: bool,
}

impl<'a, C: PhysicalConnection> TransactionScope<'a, C> {
    pub(crate) fn open(coordinator: &'a mut TransactionCoordinator<C>) -> TransactionResult<Self> {
        coordinator.begin()?;
        Ok(Self {
            coordinator,
            resolved: false,
        })
    }

    /// Release this handle with intent to commit.
    pub fn commit(mut self) -> TransactionResult<()> {
        self.resolved = true;
        self.coordinator.commit()
    }

    /// Release this handle and doom the transaction.
    pub fn rollback(mut self) -> TransactionResult<()> {
        self.resolved = true;
        self.coordinator.rollback()
    }

    /// Open a nested scope inside this one.
    pub fn scope(&mut self) -> TransactionResult<TransactionScope<'_, C>> {
        TransactionScope::open(&mut *self.coordinator)
    }

    /// Mutable access to the underlying connection.
    pub fn connection_mut(&mut self) -> &mut C {
        self.coordinator.connection_mut()
    }

    pub(crate) fn coordinator_mut(&mut self) -> &mut TransactionCoordinator<C> {
        self.coordinator
    }
}

impl<C: PhysicalConnection> Deref for TransactionScope<'_, C> {
    type Target = TransactionCoordinator<C>;

    fn deref(&self) -> &Self::Target {
        self.coordinator
    }
}

impl<C: PhysicalConnection> Drop for TransactionScope<'_, C> {
    fn drop(&mut self) {
        if self.resolved {
            return;
        }
        tracing::debug!(
            connection = %self.coordinator.config().name,
            depth = self.coordinator.depth(),
            panicking = std::thread::panicking(),
            "transaction scope dropped unresolved, rolling back"
        );
        // Only fails on misuse, and this handle is known to be open.
        let _ = self.coordinator.rollback();
    }
}
