//! Nested transaction management.
//!
//! This module lets unrelated call sites each run their own
//! begin/commit/rollback against one connection while only a single physical
//! transaction is ever open on it.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                  TransactionCoordinator                     │
//! │      (depth counter, poison flag, physical call gate)       │
//! └─────────────────────────────────────────────────────────────┘
//!        ▲                     ▲                     │
//!        │                     │                     ▼
//!  ┌─────────────┐       ┌─────────────┐       ┌─────────────┐
//!  │ Transaction │       │   Shared    │       │  Physical   │
//!  │    Scope    │       │ Coordinator │       │ Connection  │
//!  └─────────────┘       └─────────────┘       └─────────────┘
//! ```
//!
//! # Usage
//!
//! ```
//! use txnest::connection::{MemoryConnection, PhysicalCall};
//! use txnest::transaction::TransactionCoordinator;
//!
//! let mut coord = TransactionCoordinator::new(MemoryConnection::new());
//!
//! // Service layer
//! coord.begin().unwrap();
//!
//! // Repository layer, unaware of the outer transaction
//! coord.begin().unwrap();
//! coord.rollback().unwrap();
//!
//! // Service layer carries on; its commit cannot persist anything now
//! coord.commit().unwrap();
//!
//! assert_eq!(
//!     coord.connection().calls(),
//!     &[PhysicalCall::Begin, PhysicalCall::Rollback]
//! );
//! ```

mod config;
mod coordinator;
mod error;
mod policy;
mod scope;
mod shared;

pub use config::CoordinatorConfig;
pub use coordinator::{CoordinatorStats, NestingInfo, TransactionCoordinator};
pub use error::{ConfigError, TransactionError, TransactionResult};
pub use policy::PoisonPolicy;
pub use scope::TransactionScope;
pub use shared::SharedCoordinator;
