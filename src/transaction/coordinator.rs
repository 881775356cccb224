//! Transaction coordinator - reference-counted nesting over one connection.
//!
//! Any number of mutually unaware callers may issue `begin`/`commit`/`rollback`
//! pairs against the same coordinator. Only the outermost `begin` opens a
//! physical transaction and only the last `commit` closes it. A `rollback`
//! from any participant rolls back physically at once and poisons the
//! nesting, so no later `commit` in the same nesting can reach the driver.
//!
//! ```text
//!   begin ──► depth 0→1  (physical BEGIN)
//!   begin ──► depth 1→2
//!   rollback ► depth 2→1  (physical ROLLBACK, poisoned)
//!   commit ──► depth 1→0  (no COMMIT, poison cleared)
//! ```

use std::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;
use ulid::Ulid;

use crate::connection::PhysicalConnection;
use crate::transaction::config::CoordinatorConfig;
use crate::transaction::error::{TransactionError, TransactionResult};
use crate::transaction::scope::TransactionScope;

/// Identity of the physical transaction currently open.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NestingInfo {
    /// Unique id, for correlating log events.
    pub id: String,
    /// When the physical begin succeeded.
    pub started_at: DateTime<Utc>,
    /// Deepest nesting reached so far.
    pub max_depth: usize,
}

impl NestingInfo {
    fn start() -> Self {
        Self {
            id: Ulid::new().to_string().to_lowercase(),
            started_at: Utc::now(),
            max_depth: 0,
        }
    }
}

/// Counters of what the coordinator has done over its lifetime.
///
/// `physical_*` count calls issued to the driver, successful or not.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CoordinatorStats {
    pub physical_begins: u64,
    pub failed_begins: u64,
    pub physical_commits: u64,
    pub failed_commits: u64,
    pub physical_rollbacks: u64,
    pub swallowed_rollback_errors: u64,
    /// Outermost commits that closed a poisoned nesting without committing.
    pub discarded_commits: u64,
    /// Commits answered with `TransactionError::Poisoned`.
    pub rejected_commits: u64,
    pub usage_errors: u64,
}

/// Nested transaction coordinator for a single physical connection.
///
/// All operations take `&mut self`: one coordinator is observed by one caller
/// at a time. Share it across threads through
/// [`SharedCoordinator`](super::SharedCoordinator).
pub struct TransactionCoordinator<C> {
    connection: C,
    /// Logical handles currently open.
    depth: usize,
    /// Rolled back while other handles are still open.
    poisoned: bool,
    nesting: Option<NestingInfo>,
    stats: CoordinatorStats,
    config: CoordinatorConfig,
}

impl<C: PhysicalConnection> TransactionCoordinator<C> {
    /// Wrap a connection with the default configuration.
    pub fn new(connection: C) -> Self {
        Self::with_config(connection, CoordinatorConfig::default())
    }

    /// Wrap a connection with a custom configuration.
    pub fn with_config(connection: C, config: CoordinatorConfig) -> Self {
        Self {
            connection,
            depth: 0,
            poisoned: false,
            nesting: None,
            stats: CoordinatorStats::default(),
            config,
        }
    }

    /// Begin a new transaction or join the one already open.
    ///
    /// Only the outermost call touches the connection. If that physical begin
    /// fails the error is returned and nothing changes.
    pub fn begin(&mut self) -> TransactionResult<()> {
        if self.depth == 0 {
            self.stats.physical_begins += 1;
            if let Err(e) = self.connection.begin() {
                self.stats.failed_begins += 1;
                tracing::warn!(
                    connection = %self.config.name,
                    error = %e,
                    "physical begin failed"
                );
                return Err(e.into());
            }
            self.nesting = Some(NestingInfo::start());
            tracing::debug!(
                connection = %self.config.name,
                nesting = self.nesting_id(),
                "physical begin"
            );
        } else if self.poisoned {
            tracing::warn!(
                connection = %self.config.name,
                nesting = self.nesting_id(),
                depth = self.depth,
                "joining a transaction that has already been rolled back"
            );
        } else {
            tracing::trace!(
                connection = %self.config.name,
                nesting = self.nesting_id(),
                depth = self.depth,
                "nested begin"
            );
        }

        self.depth += 1;
        if let Some(nesting) = self.nesting.as_mut() {
            nesting.max_depth = nesting.max_depth.max(self.depth);
        }
        Ok(())
    }

    /// Release one handle; commit physically if it was the last one.
    ///
    /// The handle is released whatever the outcome. A commit that closes a
    /// poisoned nesting never reaches the driver; whether the caller hears
    /// about it depends on the [`PoisonPolicy`](super::PoisonPolicy).
    pub fn commit(&mut self) -> TransactionResult<()> {
        if self.depth == 0 {
            return Err(self.misuse("commit"));
        }
        self.depth -= 1;

        if self.depth > 0 {
            if self.poisoned && self.config.poison_policy.rejects() {
                let nesting_id = self.nesting_id().to_string();
                return Err(self.reject(nesting_id));
            }
            tracing::trace!(
                connection = %self.config.name,
                nesting = self.nesting_id(),
                depth = self.depth,
                "nested commit"
            );
            return Ok(());
        }

        let nesting_id = self.nesting.take().map(|n| n.id).unwrap_or_default();

        if self.poisoned {
            self.poisoned = false;
            self.stats.discarded_commits += 1;
            tracing::warn!(
                connection = %self.config.name,
                nesting = %nesting_id,
                "commit discarded, transaction was already rolled back"
            );
            if self.config.poison_policy.rejects() {
                return Err(self.reject(nesting_id));
            }
            return Ok(());
        }

        self.stats.physical_commits += 1;
        match self.connection.commit() {
            Ok(()) => {
                tracing::debug!(
                    connection = %self.config.name,
                    nesting = %nesting_id,
                    "physical commit"
                );
                Ok(())
            }
            Err(e) => {
                self.stats.failed_commits += 1;
                tracing::error!(
                    connection = %self.config.name,
                    nesting = %nesting_id,
                    error = %e,
                    "physical commit failed"
                );
                Err(e.into())
            }
        }
    }

    /// Release one handle and make sure the transaction never commits.
    ///
    /// The first rollback in a nesting rolls back physically at once; later
    /// ones only release their handle. Driver errors from the physical
    /// rollback are swallowed, so this only fails on misuse.
    pub fn rollback(&mut self) -> TransactionResult<()> {
        if self.depth == 0 {
            return Err(self.misuse("rollback"));
        }
        self.depth -= 1;

        if !self.poisoned {
            self.stats.physical_rollbacks += 1;
            match self.connection.rollback() {
                Ok(()) => {
                    tracing::debug!(
                        connection = %self.config.name,
                        nesting = self.nesting_id(),
                        depth = self.depth,
                        "physical rollback"
                    );
                }
                Err(e) => {
                    self.stats.swallowed_rollback_errors += 1;
                    tracing::debug!(
                        connection = %self.config.name,
                        nesting = self.nesting_id(),
                        error = %e,
                        "ignoring physical rollback error"
                    );
                }
            }
        } else {
            tracing::trace!(
                connection = %self.config.name,
                nesting = self.nesting_id(),
                depth = self.depth,
                "nested rollback of poisoned transaction"
            );
        }

        self.poisoned = self.depth > 0;
        if self.depth == 0 {
            self.nesting = None;
        }
        Ok(())
    }

    /// Begin and return a guard that rolls back unless resolved.
    pub fn scope(&mut self) -> TransactionResult<TransactionScope<'_, C>> {
        TransactionScope::open(self)
    }

    /// Run `f` inside a transaction.
    ///
    /// If `f` returns `Ok` the handle is committed, otherwise it is rolled
    /// back and the error is returned. A panic in `f` rolls the handle back
    /// while unwinding.
    pub fn with_transaction<F, T, E>(&mut self, f: F) -> Result<T, E>
    where
        F: FnOnce(&mut Self) -> Result<T, E>,
        E: From<TransactionError>,
    {
        let mut scope = self.scope()?;

        match f(scope.coordinator_mut()) {
            Ok(result) => {
                scope.commit()?;
                Ok(result)
            }
            Err(e) => {
                scope.rollback()?;
                Err(e)
            }
        }
    }

    /// Refuse data writes into a nesting that can no longer commit.
    ///
    /// Once the first rollback has run the driver has no open transaction,
    /// so a write issued now would autocommit behind the nesting's back.
    pub fn check_writable(&self) -> TransactionResult<()> {
        if self.poisoned {
            return Err(TransactionError::Poisoned {
                nesting_id: self.nesting_id().to_string(),
            });
        }
        Ok(())
    }

    fn misuse(&mut self, operation: &'static str) -> TransactionError {
        self.stats.usage_errors += 1;
        tracing::warn!(
            connection = %self.config.name,
            operation,
            "transaction call without matching begin"
        );
        TransactionError::usage(operation)
    }

    fn reject(&mut self, nesting_id: String) -> TransactionError {
        self.stats.rejected_commits += 1;
        TransactionError::Poisoned { nesting_id }
    }
}

impl<C> TransactionCoordinator<C> {
    /// Number of open logical handles.
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Check if a physical transaction is open.
    pub fn is_active(&self) -> bool {
        self.depth > 0
    }

    /// Check if the open transaction has been rolled back by a participant.
    pub fn is_poisoned(&self) -> bool {
        self.poisoned
    }

    /// The physical transaction currently open, if any.
    pub fn nesting(&self) -> Option<&NestingInfo> {
        self.nesting.as_ref()
    }

    /// Lifetime counters.
    pub fn stats(&self) -> CoordinatorStats {
        self.stats
    }

    /// The configuration in effect.
    pub fn config(&self) -> &CoordinatorConfig {
        &self.config
    }

    /// The wrapped connection.
    pub fn connection(&self) -> &C {
        &self.connection
    }

    /// The wrapped connection, for issuing queries.
    ///
    /// Transaction primitives must not be called through this reference;
    /// doing so desynchronizes the driver from the nesting depth.
    pub fn connection_mut(&mut self) -> &mut C {
        &mut self.connection
    }

    /// Unwrap the connection.
    pub fn into_inner(self) -> C {
        self.connection
    }

    fn nesting_id(&self) -> &str {
        self.nesting.as_ref().map(|n| n.id.as_str()).unwrap_or("")
    }
}

impl<C> fmt::Debug for TransactionCoordinator<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransactionCoordinator")
            .field("name", &self.config.name)
            .field("depth", &self.depth)
            .field("poisoned", &self.poisoned)
            .field("nesting", &self.nesting.as_ref().map(|n| &n.id))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    use crate::connection::{MemoryConnection, PhysicalCall};
    use crate::transaction::PoisonPolicy;

    #[derive(Debug, thiserror::Error)]
    enum AppError {
        #[error(transparent)]
        Transaction(#[from] TransactionError),
        #[error(transparent)]
        Connection(#[from] crate::connection::ConnectionError),
    }

    fn setup() -> TransactionCoordinator<MemoryConnection> {
        TransactionCoordinator::new(MemoryConnection::new())
    }

    fn strict() -> TransactionCoordinator<MemoryConnection> {
        let config = CoordinatorConfig::new("strict").poison_policy(PoisonPolicy::Reject);
        TransactionCoordinator::with_config(MemoryConnection::new(), config)
    }

    fn calls(coord: &TransactionCoordinator<MemoryConnection>) -> Vec<PhysicalCall> {
        coord.connection().calls().to_vec()
    }

    #[test]
    fn test_nested_commits_commit_once() {
        let mut coord = setup();

        coord.begin().unwrap();
        coord.begin().unwrap();
        assert_eq!(coord.depth(), 2);
        coord.commit().unwrap();
        assert!(coord.connection().in_transaction());
        coord.commit().unwrap();

        assert_eq!(calls(&coord), vec![PhysicalCall::Begin, PhysicalCall::Commit]);
        assert_eq!(coord.depth(), 0);
        assert!(!coord.is_active());
    }

    #[test]
    fn test_inner_rollback_suppresses_outer_commit() {
        let mut coord = setup();

        coord.begin().unwrap();
        coord.connection_mut().put("order", json!(1)).unwrap();
        coord.begin().unwrap();
        coord.rollback().unwrap();
        assert!(coord.is_poisoned());
        coord.commit().unwrap();

        assert_eq!(calls(&coord), vec![PhysicalCall::Begin, PhysicalCall::Rollback]);
        assert!(!coord.is_poisoned());
        assert!(coord.connection().committed_rows().is_empty());
        assert_eq!(coord.stats().discarded_commits, 1);
    }

    #[test]
    fn test_extra_rollback_is_usage_error() {
        let mut coord = setup();

        coord.begin().unwrap();
        coord.rollback().unwrap();
        let err = coord.rollback().unwrap_err();

        assert!(err.is_usage_error());
        assert_eq!(calls(&coord), vec![PhysicalCall::Begin, PhysicalCall::Rollback]);
        assert_eq!(coord.depth(), 0);
        assert_eq!(coord.stats().usage_errors, 1);
    }

    #[test]
    fn test_commit_without_begin_is_usage_error() {
        let mut coord = setup();

        let err = coord.commit().unwrap_err();
        assert!(matches!(err, TransactionError::Usage { operation: "commit" }));
        assert!(calls(&coord).is_empty());
        assert_eq!(coord.depth(), 0);
    }

    #[test]
    fn test_rollback_issued_once_per_nesting() {
        let mut coord = setup();

        coord.begin().unwrap();
        coord.begin().unwrap();
        coord.begin().unwrap();

        coord.rollback().unwrap();
        assert_eq!(coord.connection().count(PhysicalCall::Rollback), 1);
        assert!(coord.is_poisoned());

        coord.rollback().unwrap();
        assert_eq!(coord.connection().count(PhysicalCall::Rollback), 1);
        assert!(coord.is_poisoned());

        coord.commit().unwrap();
        assert_eq!(coord.depth(), 0);
        assert!(!coord.is_poisoned());
        assert_eq!(coord.connection().count(PhysicalCall::Commit), 0);
        assert_eq!(coord.connection().count(PhysicalCall::Rollback), 1);
    }

    #[test]
    fn test_outermost_rollback_leaves_clean_state() {
        let mut coord = setup();

        coord.begin().unwrap();
        coord.begin().unwrap();
        coord.commit().unwrap();
        coord.rollback().unwrap();

        assert!(!coord.is_poisoned());
        assert!(coord.nesting().is_none());
        assert_eq!(calls(&coord), vec![PhysicalCall::Begin, PhysicalCall::Rollback]);
    }

    #[test]
    fn test_independent_nesting_after_poison() {
        let mut coord = setup();

        coord.begin().unwrap();
        coord.begin().unwrap();
        coord.rollback().unwrap();
        coord.commit().unwrap();

        coord.begin().unwrap();
        coord.connection_mut().put("a", json!("kept")).unwrap();
        coord.commit().unwrap();

        assert_eq!(
            calls(&coord),
            vec![
                PhysicalCall::Begin,
                PhysicalCall::Rollback,
                PhysicalCall::Begin,
                PhysicalCall::Commit,
            ]
        );
        assert_eq!(coord.connection().committed_rows().get("a"), Some(&json!("kept")));
    }

    #[test]
    fn test_failed_begin_leaves_state_untouched() {
        let mut coord = setup();
        coord.connection_mut().set_offline("server gone");

        let err = coord.begin().unwrap_err();
        assert!(matches!(err, TransactionError::Connection(_)));
        assert_eq!(coord.depth(), 0);
        assert!(coord.nesting().is_none());

        // The next begin tries the driver again.
        coord.connection_mut().set_online();
        coord.begin().unwrap();
        assert_eq!(coord.connection().count(PhysicalCall::Begin), 2);
        assert_eq!(coord.stats().failed_begins, 1);
    }

    #[test]
    fn test_failed_commit_closes_nesting() {
        let mut coord = setup();

        coord.begin().unwrap();
        coord.begin().unwrap();
        coord.commit().unwrap();
        coord.connection_mut().fail_next_commit("deadlock victim");

        let err = coord.commit().unwrap_err();
        assert!(matches!(err, TransactionError::Commit(_)));
        assert_eq!(coord.depth(), 0);
        assert!(!coord.is_poisoned());
        assert!(coord.nesting().is_none());
        assert_eq!(coord.stats().failed_commits, 1);

        // No retry and no rollback were attempted.
        assert_eq!(calls(&coord), vec![PhysicalCall::Begin, PhysicalCall::Commit]);
    }

    #[test]
    fn test_rollback_errors_are_swallowed() {
        let mut coord = setup();

        coord.begin().unwrap();
        coord.connection_mut().fail_next_rollback("no transaction is active");
        coord.rollback().unwrap();

        assert_eq!(coord.depth(), 0);
        assert_eq!(coord.stats().swallowed_rollback_errors, 1);
    }

    #[test]
    fn test_rollback_after_driver_lost_transaction() {
        let mut coord = setup();

        coord.begin().unwrap();
        // Driver ends the transaction behind our back (e.g. server-side abort).
        coord.connection_mut().rollback().unwrap();
        coord.rollback().unwrap();

        assert_eq!(coord.stats().swallowed_rollback_errors, 1);
        assert_eq!(coord.depth(), 0);
    }

    #[test]
    fn test_begin_joins_poisoned_nesting() {
        let mut coord = setup();

        coord.begin().unwrap();
        coord.begin().unwrap();
        coord.rollback().unwrap();

        coord.begin().unwrap();
        assert_eq!(coord.depth(), 2);
        assert!(coord.is_poisoned());
        coord.commit().unwrap();
        coord.commit().unwrap();

        assert_eq!(coord.connection().count(PhysicalCall::Begin), 1);
        assert_eq!(coord.connection().count(PhysicalCall::Commit), 0);
    }

    #[test]
    fn test_reject_policy_reports_poisoned_commits() {
        let mut coord = strict();

        coord.begin().unwrap();
        coord.begin().unwrap();
        coord.begin().unwrap();
        coord.rollback().unwrap();

        let inner = coord.commit().unwrap_err();
        assert!(inner.is_poisoned());
        assert_eq!(coord.depth(), 1);

        let outer = coord.commit().unwrap_err();
        assert!(outer.is_poisoned());
        assert_eq!(coord.depth(), 0);
        assert!(!coord.is_poisoned());

        assert_eq!(coord.connection().count(PhysicalCall::Commit), 0);
        assert_eq!(coord.stats().rejected_commits, 2);
        assert_eq!(coord.stats().discarded_commits, 1);
    }

    #[test]
    fn test_reject_policy_plain_commit_succeeds() {
        let mut coord = strict();

        coord.begin().unwrap();
        coord.begin().unwrap();
        coord.commit().unwrap();
        coord.commit().unwrap();

        assert_eq!(coord.connection().count(PhysicalCall::Commit), 1);
        assert_eq!(coord.stats().rejected_commits, 0);
    }

    #[test]
    fn test_nesting_info() {
        let mut coord = setup();
        assert!(coord.nesting().is_none());

        coord.begin().unwrap();
        let id = coord.nesting().unwrap().id.clone();
        assert_eq!(id.len(), 26);

        coord.begin().unwrap();
        coord.begin().unwrap();
        coord.commit().unwrap();
        assert_eq!(coord.nesting().unwrap().id, id);
        assert_eq!(coord.nesting().unwrap().max_depth, 3);

        coord.commit().unwrap();
        coord.commit().unwrap();
        assert!(coord.nesting().is_none());

        coord.begin().unwrap();
        assert_ne!(coord.nesting().unwrap().id, id);
    }

    #[test]
    fn test_with_transaction_commits() {
        let mut coord = setup();

        let value = coord
            .with_transaction(|tx| {
                tx.connection_mut().put("user", json!({"name": "Alice"}))?;
                tx.with_transaction(|inner| {
                    inner.connection_mut().put("audit", json!("created"))?;
                    Ok::<_, AppError>(())
                })?;
                Ok::<_, AppError>(42)
            })
            .unwrap();

        assert_eq!(value, 42);
        assert_eq!(coord.connection().committed_rows().len(), 2);
        assert_eq!(calls(&coord), vec![PhysicalCall::Begin, PhysicalCall::Commit]);
    }

    #[test]
    fn test_with_transaction_rolls_back_on_error() {
        let mut coord = setup();

        let result: TransactionResult<()> = coord.with_transaction(|tx| {
            tx.begin()?;
            tx.commit()?;
            Err(TransactionError::usage("test"))
        });

        assert!(result.is_err());
        assert_eq!(coord.depth(), 0);
        assert_eq!(calls(&coord), vec![PhysicalCall::Begin, PhysicalCall::Rollback]);
    }

    #[test]
    fn test_inner_with_transaction_error_poisons_outer() {
        let mut coord = setup();

        let result: TransactionResult<()> = coord.with_transaction(|tx| {
            // Inner failure is handled; the outer caller carries on.
            let inner: TransactionResult<()> =
                tx.with_transaction(|_| Err(TransactionError::usage("inner")));
            assert!(inner.is_err());
            assert!(tx.is_poisoned());
            Ok(())
        });

        assert!(result.is_ok());
        assert_eq!(coord.connection().count(PhysicalCall::Commit), 0);
        assert_eq!(coord.connection().count(PhysicalCall::Rollback), 1);
    }

    #[test]
    fn test_with_transaction_panic_rolls_back() {
        let mut coord = setup();

        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _: TransactionResult<()> = coord.with_transaction(|tx| {
                tx.connection_mut().put("half", json!("written")).unwrap();
                panic!("handler crashed");
            });
        }));

        assert!(result.is_err());
        assert_eq!(coord.depth(), 0);
        assert!(!coord.is_poisoned());
        assert!(coord.connection().committed_rows().is_empty());
        assert_eq!(calls(&coord), vec![PhysicalCall::Begin, PhysicalCall::Rollback]);

        coord
            .with_transaction(|tx| {
                tx.connection_mut().put("k", json!(1))?;
                Ok::<_, AppError>(())
            })
            .unwrap();
        assert_eq!(coord.connection().count(PhysicalCall::Commit), 1);
        assert_eq!(coord.connection().committed_rows().get("k"), Some(&json!(1)));
    }

    #[test]
    fn test_with_transaction_reject_policy() {
        let mut coord = strict();

        let result: TransactionResult<()> = coord.with_transaction(|tx| {
            let inner: TransactionResult<()> =
                tx.with_transaction(|_| Err(TransactionError::usage("inner")));
            assert!(inner.is_err());
            Ok(())
        });

        match result {
            Err(e) => assert!(e.is_poisoned()),
            Ok(()) => panic!("commit into a rolled-back transaction was accepted"),
        }
        assert_eq!(coord.depth(), 0);
        assert!(!coord.is_poisoned());
        assert_eq!(calls(&coord), vec![PhysicalCall::Begin, PhysicalCall::Rollback]);
        assert_eq!(coord.stats().rejected_commits, 1);
        assert_eq!(coord.stats().usage_errors, 0);
    }

    #[test]
    fn test_check_writable() {
        let mut coord = setup();
        assert!(coord.check_writable().is_ok());

        coord.begin().unwrap();
        coord.begin().unwrap();
        assert!(coord.check_writable().is_ok());
        coord.rollback().unwrap();

        // The driver transaction is gone; a write now would autocommit.
        assert!(!coord.connection().in_transaction());
        assert!(coord.check_writable().unwrap_err().is_poisoned());

        coord.commit().unwrap();
        assert!(coord.check_writable().is_ok());
    }

    #[test]
    fn test_debug_output() {
        let mut coord = setup();
        coord.begin().unwrap();
        let debug = format!("{:?}", coord);
        assert!(debug.contains("depth: 1"));
        assert!(debug.contains("poisoned: false"));
    }

    #[test]
    fn test_borrowed_connection() {
        let mut conn = MemoryConnection::new();
        {
            let mut coord = TransactionCoordinator::new(&mut conn);
            coord.begin().unwrap();
            coord.commit().unwrap();
        }
        assert_eq!(conn.calls(), &[PhysicalCall::Begin, PhysicalCall::Commit]);
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;

        #[derive(Debug, Clone, Copy)]
        enum Step {
            Begin,
            Commit,
            Rollback,
        }

        fn resolve(
            coord: &mut TransactionCoordinator<MemoryConnection>,
            depth: &mut usize,
            rollback: bool,
            current_failed: &mut bool,
            rolled_back: &mut usize,
        ) {
            if rollback {
                coord.rollback().unwrap();
                if !*current_failed {
                    *current_failed = true;
                    *rolled_back += 1;
                }
            } else {
                coord.commit().unwrap();
            }
            *depth -= 1;
            if *depth == 0 {
                *current_failed = false;
            }
        }

        fn arb_steps() -> impl Strategy<Value = Vec<Step>> {
            prop::collection::vec(
                prop_oneof![
                    2 => Just(Step::Begin),
                    2 => Just(Step::Commit),
                    1 => Just(Step::Rollback),
                ],
                0..64,
            )
        }

        proptest! {
            /// Every nesting gets one begin and exactly one of commit or rollback.
            #[test]
            fn prop_one_physical_resolution_per_nesting(steps in arb_steps()) {
                let mut coord = setup();
                let mut depth = 0usize;
                let mut nestings = 0usize;
                let mut rolled_back = 0usize;
                let mut current_failed = false;

                for step in steps {
                    match step {
                        Step::Begin => {
                            if depth == 0 {
                                nestings += 1;
                            }
                            coord.begin().unwrap();
                            depth += 1;
                        }
                        // Unmatched resolutions are skipped to keep the sequence well formed.
                        Step::Commit if depth > 0 => {
                            resolve(&mut coord, &mut depth, false, &mut current_failed, &mut rolled_back);
                        }
                        Step::Rollback if depth > 0 => {
                            resolve(&mut coord, &mut depth, true, &mut current_failed, &mut rolled_back);
                        }
                        _ => {}
                    }
                    prop_assert_eq!(coord.depth(), depth);
                    prop_assert!(!coord.is_poisoned() || coord.depth() > 0);
                }
                while depth > 0 {
                    resolve(&mut coord, &mut depth, false, &mut current_failed, &mut rolled_back);
                }

                let conn = coord.connection();
                prop_assert_eq!(conn.count(PhysicalCall::Begin), nestings);
                prop_assert_eq!(conn.count(PhysicalCall::Rollback), rolled_back);
                prop_assert_eq!(conn.count(PhysicalCall::Commit), nestings - rolled_back);
                prop_assert!(!coord.is_poisoned());
                prop_assert!(!conn.in_transaction());
                prop_assert_eq!(coord.stats().swallowed_rollback_errors, 0);
            }

            /// Resolving more often than begun is always rejected.
            #[test]
            fn prop_depth_never_negative(begins in 0usize..8, extra in 1usize..4) {
                let mut coord = setup();
                for _ in 0..begins {
                    coord.begin().unwrap();
                }
                for _ in 0..begins {
                    coord.commit().unwrap();
                }
                for i in 0..extra {
                    let err = if i % 2 == 0 { coord.commit() } else { coord.rollback() };
                    prop_assert!(err.unwrap_err().is_usage_error());
                    prop_assert_eq!(coord.depth(), 0);
                }
                let physical = coord.connection().calls().len();
                prop_assert_eq!(physical, if begins > 0 { 2 } else { 0 });
            }
        }
    }
}
