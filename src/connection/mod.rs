//! Physical connection abstraction.
//!
//! A [`PhysicalConnection`] exposes the three transaction primitives a driver
//! offers. Nothing above this layer knows about nesting; the
//! [`TransactionCoordinator`](crate::transaction::TransactionCoordinator)
//! is the only thing that should call these methods.
//!
//! [`MemoryConnection`] is an in-process driver with staged writes, a call
//! log and fault injection. It backs the REPL and the test suite.

mod error;
mod memory;

pub use error::{CommitError, ConnectionError, ConnectionResult, RollbackError};
pub use memory::{MemoryConnection, PhysicalCall};

/// The transaction primitives of a single database connection.
pub trait PhysicalConnection {
    /// Open a physical transaction.
    fn begin(&mut self) -> Result<(), ConnectionError>;

    /// Commit the open physical transaction.
    ///
    /// The transaction is considered ended whether or not this succeeds.
    fn commit(&mut self) -> Result<(), CommitError>;

    /// Roll back the open physical transaction.
    fn rollback(&mut self) -> Result<(), RollbackError>;
}

impl<C: PhysicalConnection + ?Sized> PhysicalConnection for &mut C {
    fn begin(&mut self) -> Result<(), ConnectionError> {
        (**self).begin()
    }

    fn commit(&mut self) -> Result<(), CommitError> {
        (**self).commit()
    }

    fn rollback(&mut self) -> Result<(), RollbackError> {
        (**self).rollback()
    }
}

impl<C: PhysicalConnection + ?Sized> PhysicalConnection for Box<C> {
    fn begin(&mut self) -> Result<(), ConnectionError> {
        (**self).begin()
    }

    fn commit(&mut self) -> Result<(), CommitError> {
        (**self).commit()
    }

    fn rollback(&mut self) -> Result<(), RollbackError> {
        (**self).rollback()
    }
}
