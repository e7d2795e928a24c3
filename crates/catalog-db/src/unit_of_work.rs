//! # Unit of Work
//!
//! One logical transaction boundary over both repositories.
//!
//! ## Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Unit of Work Lifecycle                             │
//! │                                                                         │
//! │  db.unit_of_work().await  ← acquires ONE pooled connection             │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  uow.categories() / uow.products()                                     │
//! │       ├── reads run immediately                                        │
//! │       └── writes are staged                                            │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  uow.save().await                                                      │
//! │       │                                                                 │
//! │       ├── Idle:          BEGIN IMMEDIATE ... COMMIT                    │
//! │       └── InTransaction: SAVEPOINT ... RELEASE (outer txn stays open)  │
//! │       │                                                                 │
//! │       ├── Ok(rows)  → staged changes cleared, ids recorded             │
//! │       └── Err(e)    → rolled back, staged changes kept                 │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  drop(uow)  ← open transaction rolled back, connection released        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## State Machine
//! ```text
//!            begin_transaction()
//!   Idle ─────────────────────────► InTransaction
//!     ▲                                   │
//!     └───── commit / rollback ───────────┘
//! ```
//! `commit`/`rollback` while Idle and `begin` while InTransaction fail with
//! [`DbError::TransactionState`]. There is no nesting.

use std::time::Instant;

use chrono::{DateTime, Utc};
use sqlx::pool::PoolConnection;
use sqlx::{Sqlite, SqliteConnection};
use tracing::{debug, info, warn};
use uuid::Uuid;

use catalog_core::{Category, Product};

use crate::error::{DbError, DbResult};
use crate::repository::entity::Entity;
use crate::repository::generic::Repository;
use crate::session::{bounded, InFlightSave, Recovery, Session, Settled, TxState, SAVE_SAVEPOINT};
use crate::tracker::{Change, Pending, StagedChange};

/// What one flush did.
#[derive(Debug, Default)]
struct FlushOutcome {
    rows: u64,
    assigned: Vec<(u64, i64)>,
}

/// Unit of work over the catalog.
///
/// ## Usage
/// ```rust,ignore
/// let mut uow = db.unit_of_work().await?;
///
/// let beverages = uow.categories().add(Category::new("Beverages", "Drinks"));
/// uow.save().await?;
/// let category_id = uow.assigned_id(beverages).expect("saved");
///
/// uow.products().add(Product::new("Cola", "Fizzy", "1.50".parse()?, 10, category_id));
/// uow.save().await?;
/// ```
#[derive(Debug)]
pub struct UnitOfWork {
    session: Session,
}

impl UnitOfWork {
    pub(crate) fn new(conn: PoolConnection<Sqlite>, command_timeout: std::time::Duration) -> Self {
        let session = Session::new(conn, command_timeout);
        debug!(session = %session.id(), "Unit of work opened");
        UnitOfWork { session }
    }

    /// Category repository sharing this unit of work's connection and
    /// change tracker.
    pub fn categories(&mut self) -> Repository<'_, Category> {
        Repository::new(&mut self.session)
    }

    /// Product repository sharing this unit of work's connection and
    /// change tracker.
    pub fn products(&mut self) -> Repository<'_, Product> {
        Repository::new(&mut self.session)
    }

    /// Id used in this unit of work's log lines.
    pub fn session_id(&self) -> Uuid {
        self.session.id()
    }

    pub fn state(&self) -> TxState {
        self.session.state
    }

    pub fn has_pending_changes(&self) -> bool {
        self.session.tracker.has_changes()
    }

    /// Drops every staged change without touching the store.
    pub fn discard_changes(&mut self) {
        debug!(session = %self.session.id(), "Discarding staged changes");
        self.session.tracker.clear();
    }

    /// The id the store assigned to a staged insert.
    ///
    /// `None` until the save that flushed it succeeds, and again after the
    /// enclosing transaction rolls back.
    pub fn assigned_id<E>(&self, pending: Pending<E>) -> Option<i64> {
        self.session.tracker.assigned_id(pending)
    }

    // =========================================================================
    // Save
    // =========================================================================

    /// Flushes every staged change, in staging order, atomically.
    ///
    /// ## Returns
    /// * `Ok(rows)` - Total rows affected; staged changes are cleared
    /// * `Err(DbError::NotFound)` - A staged update/delete matched no row
    /// * `Err(DbError::ConstraintViolation)` - The store rejected a write
    /// * `Err(DbError::ConnectivityFailure)` - Busy, unreachable or timed out
    ///
    /// On error nothing from this call is durable and the staged changes
    /// are kept. Inside an explicit transaction, earlier saves are not
    /// affected by a failed one.
    pub async fn save(&mut self) -> DbResult<u64> {
        self.session.recover().await?;

        if !self.session.tracker.has_changes() {
            return Ok(0);
        }

        let started = Instant::now();
        let staged = self.session.tracker.changes().len();
        let in_transaction = self.session.state == TxState::InTransaction;

        let (open, close, recovery) = if in_transaction {
            (
                format!("SAVEPOINT {SAVE_SAVEPOINT}"),
                format!("RELEASE SAVEPOINT {SAVE_SAVEPOINT}"),
                Recovery::RollbackSavepoint,
            )
        } else {
            (
                "BEGIN IMMEDIATE".to_string(),
                "COMMIT".to_string(),
                Recovery::RollbackTransaction,
            )
        };

        let seq = self.session.next_save_seq();
        self.session.recovery = Some(recovery);
        if let Err(e) = self.session.control(&open).await {
            return self.abandon(e).await;
        }

        let outcome = match self.flush(seq).await {
            Ok(outcome) => outcome,
            Err(e) => return self.abandon(e).await,
        };

        self.session.in_flight = Some(InFlightSave {
            seq,
            rows: outcome.rows,
            assigned: outcome.assigned.clone(),
            in_transaction,
        });
        if let Err(e) = self.session.control(&close).await {
            return self.settle_unconfirmed(e).await;
        }
        self.session.in_flight = None;
        self.session.recovery = None;

        if in_transaction {
            self.session.tracker.record_provisional(outcome.assigned);
            self.session.txn_marker = Some(seq);
        } else {
            self.session.tracker.record_assigned(outcome.assigned);
        }
        self.session.tracker.clear();

        info!(
            session = %self.session.id(),
            staged,
            rows = outcome.rows,
            in_transaction,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Changes saved"
        );

        Ok(outcome.rows)
    }

    /// Writes the save marker, then every staged change. Caller owns the
    /// surrounding transaction or savepoint.
    async fn flush(&mut self, seq: i64) -> DbResult<FlushOutcome> {
        self.session.write_marker(seq).await?;

        let timeout = self.session.command_timeout();
        let now = Utc::now();
        let (conn, tracker) = self.session.split()?;

        let mut outcome = FlushOutcome::default();
        for change in tracker.changes() {
            let (rows, assigned) = match change {
                StagedChange::Category(c) => apply(conn, c, now, timeout).await?,
                StagedChange::Product(c) => apply(conn, c, now, timeout).await?,
            };
            outcome.rows += rows;
            outcome.assigned.extend(assigned);
        }

        Ok(outcome)
    }

    /// COMMIT or RELEASE failed without a clear answer. Recovery decides
    /// from the save marker whether the save took effect.
    async fn settle_unconfirmed(&mut self, err: DbError) -> DbResult<u64> {
        warn!(session = %self.session.id(), error = %err, "Save not confirmed, checking its marker");
        match self.session.recover().await {
            Ok(Settled::Applied { rows }) => Ok(rows),
            Ok(_) => Err(err),
            Err(recover_err) => {
                warn!(
                    session = %self.session.id(),
                    error = %recover_err,
                    "Save outcome still unknown; settled before next operation"
                );
                Err(err)
            }
        }
    }

    /// Rolls back whatever the failed operation left open, then reports
    /// the original error.
    async fn abandon<T>(&mut self, err: DbError) -> DbResult<T> {
        warn!(session = %self.session.id(), error = %err, "Operation failed, rolling back");
        if let Err(rollback_err) = self.session.recover().await {
            warn!(
                session = %self.session.id(),
                error = %rollback_err,
                "Rollback failed; will retry before next operation"
            );
        }
        Err(err)
    }

    // =========================================================================
    // Explicit Transactions
    // =========================================================================

    /// Opens a transaction spanning several saves.
    pub async fn begin_transaction(&mut self) -> DbResult<()> {
        self.session.recover().await?;
        if self.session.state == TxState::InTransaction {
            return Err(DbError::TransactionState(
                "a transaction is already open".to_string(),
            ));
        }

        self.session.recovery = Some(Recovery::RollbackTransaction);
        if let Err(e) = self.session.control("BEGIN IMMEDIATE").await {
            return self.abandon(e).await;
        }
        self.session.state = TxState::InTransaction;
        self.session.txn_marker = None;
        self.session.recovery = None;

        info!(session = %self.session.id(), "Transaction started");
        Ok(())
    }

    /// Commits the open transaction. On failure it is rolled back.
    ///
    /// If COMMIT errors or this future is dropped after COMMIT was sent,
    /// the marker of the transaction's last save decides the outcome: a
    /// commit that landed is reported (or, after a drop, adopted) as a
    /// success.
    pub async fn commit_transaction(&mut self) -> DbResult<()> {
        self.session.recover().await?;
        if self.session.state != TxState::InTransaction {
            return Err(DbError::TransactionState(
                "commit called with no open transaction".to_string(),
            ));
        }

        self.session.recovery = Some(Recovery::RollbackTransaction);
        if let Err(e) = self.session.control("COMMIT").await {
            warn!(session = %self.session.id(), error = %e, "Commit not confirmed, checking save marker");
            return match self.session.recover().await {
                Ok(Settled::Committed) => Ok(()),
                Ok(_) => Err(e),
                Err(recover_err) => {
                    warn!(
                        session = %self.session.id(),
                        error = %recover_err,
                        "Commit outcome still unknown; settled before next operation"
                    );
                    Err(e)
                }
            };
        }
        self.session.recovery = None;
        self.session.state = TxState::Idle;
        self.session.txn_marker = None;
        self.session.tracker.promote_provisional();

        info!(session = %self.session.id(), "Transaction committed");
        Ok(())
    }

    /// Rolls back the open transaction. Staged changes are kept; ids
    /// assigned inside the transaction are forgotten.
    pub async fn rollback_transaction(&mut self) -> DbResult<()> {
        self.session.recover().await?;
        if self.session.state != TxState::InTransaction {
            return Err(DbError::TransactionState(
                "rollback called with no open transaction".to_string(),
            ));
        }

        self.session.recovery = Some(Recovery::RollbackTransaction);
        if let Err(e) = self.session.control("ROLLBACK").await {
            return self.abandon(e).await;
        }
        self.session.recovery = None;
        self.session.state = TxState::Idle;
        self.session.txn_marker = None;
        self.session.tracker.forget_provisional();

        info!(session = %self.session.id(), "Transaction rolled back");
        Ok(())
    }

    /// Rolls back anything still open and returns the connection to the
    /// pool. Dropping the unit of work does the same without reporting
    /// errors.
    pub async fn close(mut self) -> DbResult<()> {
        if self.session.state == TxState::InTransaction {
            self.session.recovery = Some(Recovery::RollbackTransaction);
        }
        self.session.recover().await?;
        if self.session.tracker.has_changes() {
            warn!(
                session = %self.session.id(),
                staged = self.session.tracker.changes().len(),
                "Closing unit of work with unsaved changes"
            );
        }
        if self.session.has_saved() {
            if let Err(e) = self.session.clear_marker().await {
                debug!(session = %self.session.id(), error = %e, "Save marker left behind");
            }
        }
        self.session.release();
        debug!(session = %self.session.id(), "Unit of work closed");
        Ok(())
    }
}

/// Applies one staged change. Returns rows affected and, for inserts, the
/// ticket and the id the store assigned.
async fn apply<E: Entity>(
    conn: &mut SqliteConnection,
    change: &Change<E>,
    now: DateTime<Utc>,
    timeout: std::time::Duration,
) -> DbResult<(u64, Option<(u64, i64)>)> {
    match change {
        Change::Insert { seq, entity } => {
            let result = bounded(
                timeout,
                entity.bind_insert(sqlx::query(E::INSERT_SQL)).execute(&mut *conn),
            )
            .await?;
            let id = result.last_insert_rowid();
            debug!(entity = E::NAME, id, "Inserted");
            Ok((result.rows_affected(), Some((*seq, id))))
        }
        Change::Update(entity) => {
            let result = bounded(
                timeout,
                entity
                    .bind_update(sqlx::query(E::UPDATE_SQL), now)
                    .execute(&mut *conn),
            )
            .await?;
            if result.rows_affected() == 0 {
                return Err(DbError::not_found(E::NAME, entity.id()));
            }
            debug!(entity = E::NAME, id = entity.id(), "Updated");
            Ok((result.rows_affected(), None))
        }
        Change::Delete(entity) => {
            let result = bounded(
                timeout,
                sqlx::query(E::DELETE_SQL).bind(entity.id()).execute(&mut *conn),
            )
            .await?;
            if result.rows_affected() == 0 {
                return Err(DbError::not_found(E::NAME, entity.id()));
            }
            debug!(entity = E::NAME, id = entity.id(), "Deleted");
            Ok((result.rows_affected(), None))
        }
    }
}

#[cfg(test)]
mod tests {
    use std::future::{poll_fn, Future};
    use std::task::Poll;

    use super::*;
    use crate::error::ConstraintKind;
    use crate::{Database, DbConfig};
    use catalog_core::Money;

    async fn open() -> (Database, UnitOfWork) {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let uow = db.unit_of_work().await.unwrap();
        (db, uow)
    }

    /// Polls `fut` up to `polls` times, yielding in between, then drops it.
    async fn poll_then_drop<F: Future>(fut: F, polls: usize) {
        let mut fut = Box::pin(fut);
        for _ in 0..polls {
            if poll_fn(|cx| Poll::Ready(fut.as_mut().poll(cx).is_ready())).await {
                return;
            }
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test]
    async fn test_save_assigns_ids_in_staging_order() {
        let (_db, mut uow) = open().await;

        let first = uow.categories().add(Category::new("Beverages", "Drinks"));
        let second = uow.categories().add(Category::new("Snacks", "Crunchy"));
        assert_eq!(uow.assigned_id(first), None);

        assert_eq!(uow.save().await.unwrap(), 2);
        assert_eq!(uow.assigned_id(first), Some(1));
        assert_eq!(uow.assigned_id(second), Some(2));
        assert!(!uow.has_pending_changes());
    }

    #[tokio::test]
    async fn test_failed_save_keeps_changes_and_writes_nothing() {
        let (_db, mut uow) = open().await;

        uow.categories().add(Category::new("Beverages", "Drinks"));
        // Unknown category: the whole batch must roll back
        uow.products()
            .add(Product::new("Cola", "Fizzy", Money::from_cents(150), 10, 99));

        let err = uow.save().await.unwrap_err();
        assert_eq!(err.constraint_kind(), Some(ConstraintKind::ForeignKey));
        assert!(uow.has_pending_changes());
        assert_eq!(uow.categories().count().await.unwrap(), 0);

        uow.discard_changes();
        assert_eq!(uow.save().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_update_of_missing_row_is_not_found() {
        let (_db, mut uow) = open().await;

        let mut ghost = Category::new("Ghost", "Never saved");
        ghost.id = 7;
        uow.categories().update(&ghost);

        let err = uow.save().await.unwrap_err();
        assert!(matches!(err, DbError::NotFound { ref entity, ref id } if entity == "Category" && id == "7"));
    }

    #[tokio::test]
    async fn test_transaction_state_misuse() {
        let (_db, mut uow) = open().await;

        assert!(matches!(
            uow.commit_transaction().await,
            Err(DbError::TransactionState(_))
        ));
        assert!(matches!(
            uow.rollback_transaction().await,
            Err(DbError::TransactionState(_))
        ));

        uow.begin_transaction().await.unwrap();
        assert_eq!(uow.state(), TxState::InTransaction);
        assert!(matches!(
            uow.begin_transaction().await,
            Err(DbError::TransactionState(_))
        ));

        uow.commit_transaction().await.unwrap();
        assert_eq!(uow.state(), TxState::Idle);
    }

    #[tokio::test]
    async fn test_rollback_discards_saves_and_forgets_ids() {
        let (_db, mut uow) = open().await;

        uow.begin_transaction().await.unwrap();
        let pending = uow.categories().add(Category::new("Beverages", "Drinks"));
        uow.save().await.unwrap();
        assert_eq!(uow.assigned_id(pending), Some(1));
        assert_eq!(uow.categories().count().await.unwrap(), 1);

        uow.rollback_transaction().await.unwrap();
        assert_eq!(uow.state(), TxState::Idle);
        assert_eq!(uow.assigned_id(pending), None);
        assert_eq!(uow.categories().count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_failed_save_inside_transaction_keeps_earlier_saves() {
        let (_db, mut uow) = open().await;

        uow.begin_transaction().await.unwrap();
        let beverages = uow.categories().add(Category::new("Beverages", "Drinks"));
        uow.save().await.unwrap();

        uow.categories().add(Category::new("Beverages", "Duplicate"));
        let err = uow.save().await.unwrap_err();
        assert_eq!(err.constraint_kind(), Some(ConstraintKind::Unique));
        assert_eq!(uow.state(), TxState::InTransaction);

        uow.discard_changes();
        uow.commit_transaction().await.unwrap();

        assert_eq!(uow.assigned_id(beverages), Some(1));
        assert_eq!(uow.categories().count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_drop_mid_transaction_rolls_back() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();

        {
            let mut uow = db.unit_of_work().await.unwrap();
            uow.begin_transaction().await.unwrap();
            uow.categories().add(Category::new("Beverages", "Drinks"));
            uow.save().await.unwrap();
        }

        let mut uow = db.unit_of_work().await.unwrap();
        assert_eq!(uow.state(), TxState::Idle);
        assert_eq!(uow.categories().count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_close_rolls_back_open_transaction() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();

        let mut uow = db.unit_of_work().await.unwrap();
        uow.begin_transaction().await.unwrap();
        uow.categories().add(Category::new("Beverages", "Drinks"));
        uow.save().await.unwrap();
        uow.close().await.unwrap();

        let mut uow = db.unit_of_work().await.unwrap();
        assert_eq!(uow.categories().count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_cancelled_save_is_applied_at_most_once() {
        let (_db, mut uow) = open().await;

        for polls in 1..=8usize {
            let pending = uow
                .categories()
                .add(Category::new(format!("Category {polls}"), "Cut short"));
            poll_then_drop(uow.save(), polls).await;

            // Whether or not the COMMIT landed, the next save settles it
            uow.save().await.unwrap();

            assert!(!uow.has_pending_changes());
            assert!(uow.assigned_id(pending).is_some());
            assert_eq!(uow.state(), TxState::Idle);
            assert_eq!(uow.categories().count().await.unwrap(), polls as i64);
        }
    }

    #[tokio::test]
    async fn test_cancelled_save_inside_transaction_is_applied_at_most_once() {
        let (_db, mut uow) = open().await;
        uow.begin_transaction().await.unwrap();

        let mut tickets = Vec::new();
        for polls in 1..=8usize {
            tickets.push(
                uow.categories()
                    .add(Category::new(format!("Category {polls}"), "Cut short")),
            );
            poll_then_drop(uow.save(), polls).await;
            uow.save().await.unwrap();
            assert_eq!(uow.state(), TxState::InTransaction);
        }

        uow.commit_transaction().await.unwrap();
        assert_eq!(uow.categories().count().await.unwrap(), 8);
        assert!(tickets.into_iter().all(|t| uow.assigned_id(t).is_some()));
    }

    #[tokio::test]
    async fn test_cancelled_commit_keeps_ids_consistent_with_store() {
        for polls in 1..=4usize {
            let (_db, mut uow) = open().await;
            uow.begin_transaction().await.unwrap();
            let pending = uow.categories().add(Category::new("Beverages", "Drinks"));
            uow.save().await.unwrap();

            poll_then_drop(uow.commit_transaction(), polls).await;

            let stored = uow.categories().count().await.unwrap();
            assert_eq!(uow.state(), TxState::Idle);
            assert_eq!(uow.assigned_id(pending).is_some(), stored == 1);
        }
    }

    #[tokio::test]
    async fn test_close_removes_save_marker() {
        let (db, mut uow) = open().await;
        uow.categories().add(Category::new("Beverages", "Drinks"));
        uow.save().await.unwrap();
        uow.close().await.unwrap();

        let markers: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM unit_of_work_markers")
            .fetch_one(db.pool())
            .await
            .unwrap();
        assert_eq!(markers, 0);
    }
}
