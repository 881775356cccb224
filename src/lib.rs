//! txnest - Nested transactions over a single database connection
//!
//! Lets unrelated components each run their own begin/commit/rollback
//! against one connection while only a single physical transaction is ever
//! open. An inner commit never ends a transaction an outer caller still
//! needs, and once anyone rolls back nothing in that nesting can commit.
//!
//! # Example
//!
//! ```
//! use txnest::connection::MemoryConnection;
//! use txnest::transaction::TransactionCoordinator;
//!
//! let mut coord = TransactionCoordinator::new(MemoryConnection::new());
//! coord.begin().unwrap();
//! coord.begin().unwrap();
//! coord.commit().unwrap(); // inner: nothing happens yet
//! coord.commit().unwrap(); // outer: physical COMMIT
//! assert!(!coord.is_active());
//! ```

pub mod connection;
pub mod db;
pub mod logging;
pub mod record;
pub mod schema;
pub mod transaction;
