//! Thread-shareable coordinator handle.
//!
//! The coordinator itself relies on sequential observation of its depth. When
//! several threads must use the same connection, wrap it in a
//! [`SharedCoordinator`]: every call is serialized through one mutex.
//!
//! The mutex serializes calls, nothing more. All threads still share a single
//! nesting, so a rollback on one thread poisons the work of every other
//! thread currently inside it. Hold the guard from [`SharedCoordinator::lock`]
//! (or use [`SharedCoordinator::with_transaction`]) to keep a whole
//! begin..commit sequence to yourself.

use std::fmt;
use std::sync::Arc;

use parking_lot::{Mutex, MutexGuard};

use crate::connection::PhysicalConnection;
use crate::transaction::config::CoordinatorConfig;
use crate::transaction::coordinator::{CoordinatorStats, TransactionCoordinator};
use crate::transaction::error::{TransactionError, TransactionResult};

/// A coordinator behind an `Arc<Mutex<..>>`. Cloning shares the same one.
pub struct SharedCoordinator<C> {
    inner: Arc<Mutex<TransactionCoordinator<C>>>,
}

impl<C> Clone for SharedCoordinator<C> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<C: PhysicalConnection> SharedCoordinator<C> {
    /// Wrap a connection with the default configuration.
    pub fn new(connection: C) -> Self {
        Self::from_coordinator(TransactionCoordinator::new(connection))
    }

    /// Wrap a connection with a custom configuration.
    pub fn with_config(connection: C, config: CoordinatorConfig) -> Self {
        Self::from_coordinator(TransactionCoordinator::with_config(connection, config))
    }

    /// Share an existing coordinator.
    pub fn from_coordinator(coordinator: TransactionCoordinator<C>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(coordinator)),
        }
    }

    /// See [`TransactionCoordinator::begin`].
    pub fn begin(&self) -> TransactionResult<()> {
        self.inner.lock().begin()
    }

    /// See [`TransactionCoordinator::commit`].
    pub fn commit(&self) -> TransactionResult<()> {
        self.inner.lock().commit()
    }

    /// See [`TransactionCoordinator::rollback`].
    pub fn rollback(&self) -> TransactionResult<()> {
        self.inner.lock().rollback()
    }

    /// Run `f` inside a transaction while holding the lock throughout.
    pub fn with_transaction<F, T, E>(&self, f: F) -> Result<T, E>
    where
        F: FnOnce(&mut TransactionCoordinator<C>) -> Result<T, E>,
        E: From<TransactionError>,
    {
        self.inner.lock().with_transaction(f)
    }
}

impl<C> SharedCoordinator<C> {
    /// Take exclusive access for a multi-step sequence.
    pub fn lock(&self) -> MutexGuard<'_, TransactionCoordinator<C>> {
        self.inner.lock()
    }

    /// Number of open logical handles.
    pub fn depth(&self) -> usize {
        self.inner.lock().depth()
    }

    /// Check if the open transaction has been rolled back by a participant.
    pub fn is_poisoned(&self) -> bool {
        self.inner.lock().is_poisoned()
    }

    /// Lifetime counters.
    pub fn stats(&self) -> CoordinatorStats {
        self.inner.lock().stats()
    }
}

impl<C> fmt::Debug for SharedCoordinator<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.inner.try_lock() {
            Some(guard) => f.debug_tuple("SharedCoordinator").field(&*guard).finish(),
            None => f.write_str("SharedCoordinator(<locked>)"),
        }
    }
}
