//! # Session
//!
//! The state a unit of work shares with the repositories it hands out:
//! one pooled connection, the change tracker, and the transaction flags.
//!
//! ## Recovery
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │               Interrupted Flush / Transaction Control                   │
//! │                                                                         │
//! │  set recovery = Some(..)                                               │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  BEGIN / SAVEPOINT                                                     │
//! │  UPSERT unit_of_work_markers (session_id, save_seq)                    │
//! │  ... staged statements ...                                             │
//! │  in_flight = Some(outcome)                                             │
//! │  COMMIT / RELEASE                                                      │
//! │       │                                     │                           │
//! │       │ future dropped or timed out          │ finished                 │
//! │       ▼                                     ▼                           │
//! │  recovery still set                   recovery = None                  │
//! │       │                                                                 │
//! │       ├── next operation ──► ROLLBACK (TO SAVEPOINT), then read the    │
//! │       │                      marker: save_seq matches → the save was    │
//! │       │                      applied, adopt its ids and drop staging    │
//! │       └── drop          ──► ROLLBACK spawned before the connection     │
//! │                             returns to the pool                        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The sqlite worker runs statements in the order they were queued, so the
//! recovery ROLLBACK and marker read always observe the interrupted
//! statements' effects.

use std::fmt;
use std::future::Future;
use std::time::Duration;

use chrono::Utc;
use sqlx::pool::PoolConnection;
use sqlx::{Sqlite, SqliteConnection};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use crate::tracker::ChangeTracker;

/// Name of the savepoint that wraps a save inside an explicit transaction.
pub(crate) const SAVE_SAVEPOINT: &str = "uow_save";

/// Transaction state of a unit of work.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxState {
    /// No explicit transaction; every save is its own transaction.
    Idle,
    /// Between `begin_transaction` and `commit`/`rollback`.
    InTransaction,
}

/// Cleanup owed by an interrupted operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Recovery {
    /// Roll back the whole transaction (implicit save or explicit control).
    RollbackTransaction,
    /// Roll back to the save savepoint and keep the outer transaction.
    RollbackSavepoint,
}

/// How a recovery settled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Settled {
    /// Nothing was owed.
    Clean,
    /// The interrupted work was undone.
    RolledBack,
    /// The interrupted save had already been applied.
    Applied { rows: u64 },
    /// The interrupted COMMIT of an explicit transaction had completed.
    Committed,
}

/// A save whose statements all ran, waiting on COMMIT or RELEASE.
#[derive(Debug, Clone)]
pub(crate) struct InFlightSave {
    pub(crate) seq: i64,
    pub(crate) rows: u64,
    pub(crate) assigned: Vec<(u64, i64)>,
    pub(crate) in_transaction: bool,
}

const UPSERT_MARKER_SQL: &str = r#"
    INSERT INTO unit_of_work_markers (session_id, save_seq, written_at)
    VALUES (?1, ?2, ?3)
    ON CONFLICT (session_id) DO UPDATE SET
        save_seq = excluded.save_seq,
        written_at = excluded.written_at
"#;

pub struct Session {
    conn: Option<PoolConnection<Sqlite>>,
    pub(crate) tracker: ChangeTracker,
    pub(crate) state: TxState,
    pub(crate) recovery: Option<Recovery>,
    /// Outcome of a save that reached COMMIT/RELEASE without confirmation.
    pub(crate) in_flight: Option<InFlightSave>,
    /// Marker of the last save inside the open transaction.
    pub(crate) txn_marker: Option<i64>,
    save_seq: i64,
    command_timeout: Duration,
    id: Uuid,
}

impl Session {
    pub(crate) fn new(conn: PoolConnection<Sqlite>, command_timeout: Duration) -> Self {
        Session {
            conn: Some(conn),
            tracker: ChangeTracker::new(),
            state: TxState::Idle,
            recovery: None,
            in_flight: None,
            txn_marker: None,
            save_seq: 0,
            command_timeout,
            id: Uuid::new_v4(),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn command_timeout(&self) -> Duration {
        self.command_timeout
    }

    /// Returns the connection after settling any owed recovery.
    pub(crate) async fn connection(&mut self) -> DbResult<&mut SqliteConnection> {
        self.recover().await?;
        self.raw_connection()
    }

    /// Returns the connection without recovering first.
    pub(crate) fn raw_connection(&mut self) -> DbResult<&mut SqliteConnection> {
        self.conn
            .as_deref_mut()
            .ok_or_else(|| DbError::Internal("unit of work is closed".to_string()))
    }

    /// Borrows the connection and the staged changes together.
    pub(crate) fn split(&mut self) -> DbResult<(&mut SqliteConnection, &ChangeTracker)> {
        let conn = self
            .conn
            .as_deref_mut()
            .ok_or_else(|| DbError::Internal("unit of work is closed".to_string()))?;
        Ok((conn, &self.tracker))
    }

    /// Runs one control statement (BEGIN, COMMIT, SAVEPOINT ...) under the
    /// command timeout.
    pub(crate) async fn control(&mut self, sql: &str) -> DbResult<()> {
        let timeout = self.command_timeout;
        let conn = self.raw_connection()?;
        bounded(timeout, sqlx::query(sql).execute(conn)).await?;
        Ok(())
    }

    /// Next marker value for a save on this session.
    pub(crate) fn next_save_seq(&mut self) -> i64 {
        self.save_seq += 1;
        self.save_seq
    }

    /// True once any save has been attempted on this session.
    pub(crate) fn has_saved(&self) -> bool {
        self.save_seq > 0
    }

    /// Writes this session's marker inside the current transaction.
    pub(crate) async fn write_marker(&mut self, seq: i64) -> DbResult<()> {
        let timeout = self.command_timeout;
        let session_id = self.id.to_string();
        let conn = self.raw_connection()?;
        bounded(
            timeout,
            sqlx::query(UPSERT_MARKER_SQL)
                .bind(session_id)
                .bind(seq)
                .bind(Utc::now())
                .execute(conn),
        )
        .await?;
        Ok(())
    }

    async fn read_marker(&mut self) -> DbResult<Option<i64>> {
        let timeout = self.command_timeout;
        let session_id = self.id.to_string();
        let conn = self.raw_connection()?;
        bounded(
            timeout,
            sqlx::query_scalar::<_, i64>(
                "SELECT save_seq FROM unit_of_work_markers WHERE session_id = ?1",
            )
            .bind(session_id)
            .fetch_optional(conn),
        )
        .await
    }

    /// Removes this session's marker row. Only valid outside a transaction.
    pub(crate) async fn clear_marker(&mut self) -> DbResult<()> {
        let timeout = self.command_timeout;
        let session_id = self.id.to_string();
        let conn = self.raw_connection()?;
        bounded(
            timeout,
            sqlx::query("DELETE FROM unit_of_work_markers WHERE session_id = ?1")
                .bind(session_id)
                .execute(conn),
        )
        .await?;
        Ok(())
    }

    /// Settles a recovery left behind by an interrupted or failed operation.
    ///
    /// The rollback may find nothing to undo: either the interrupted
    /// statement never reached the store, or its COMMIT/RELEASE did. The
    /// marker row tells the two apart. Connectivity failures leave the
    /// recovery pending for the next attempt.
    pub(crate) async fn recover(&mut self) -> DbResult<Settled> {
        let Some(recovery) = self.recovery else {
            return Ok(Settled::Clean);
        };

        warn!(session = %self.id, ?recovery, "Rolling back interrupted operation");

        let steps = match recovery {
            Recovery::RollbackTransaction => vec!["ROLLBACK".to_string()],
            Recovery::RollbackSavepoint => vec![
                format!("ROLLBACK TO SAVEPOINT {SAVE_SAVEPOINT}"),
                format!("RELEASE SAVEPOINT {SAVE_SAVEPOINT}"),
            ],
        };

        for step in &steps {
            match self.control(step).await {
                Ok(()) => {}
                Err(err) if err.is_retryable() => return Err(err),
                Err(err) => debug!(session = %self.id, error = %err, "Nothing to roll back"),
            }
        }

        let open_commit = recovery == Recovery::RollbackTransaction
            && self.state == TxState::InTransaction
            && self.txn_marker.is_some();
        let marker = if self.in_flight.is_some() || open_commit {
            match self.read_marker().await {
                Ok(marker) => marker,
                Err(err) if err.is_retryable() => return Err(err),
                Err(err) => {
                    warn!(session = %self.id, error = %err, "Save marker unreadable, assuming rolled back");
                    None
                }
            }
        } else {
            None
        };

        let mut settled = Settled::RolledBack;
        if let Some(flight) = self.in_flight.take() {
            if marker == Some(flight.seq) {
                info!(
                    session = %self.id,
                    rows = flight.rows,
                    "Interrupted save had already been applied"
                );
                if flight.in_transaction {
                    self.tracker.record_provisional(flight.assigned);
                    self.txn_marker = Some(flight.seq);
                } else {
                    self.tracker.record_assigned(flight.assigned);
                }
                self.tracker.clear();
                settled = Settled::Applied { rows: flight.rows };
            }
        }

        if recovery == Recovery::RollbackTransaction {
            if open_commit && marker == self.txn_marker {
                info!(session = %self.id, "Interrupted commit had completed");
                self.tracker.promote_provisional();
                settled = Settled::Committed;
            } else {
                self.tracker.forget_provisional();
            }
            self.state = TxState::Idle;
            self.txn_marker = None;
        }
        self.recovery = None;
        Ok(settled)
    }

    /// True if dropping now would leave an open transaction behind.
    fn needs_rollback(&self) -> bool {
        self.state == TxState::InTransaction || self.recovery.is_some()
    }

    /// Releases the connection to the pool. Only called once nothing is
    /// owed.
    pub(crate) fn release(&mut self) {
        self.conn.take();
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("state", &self.state)
            .field("recovery", &self.recovery)
            .field("in_flight", &self.in_flight.as_ref().map(|f| f.seq))
            .field("pending_changes", &self.tracker.changes().len())
            .field("open", &self.conn.is_some())
            .finish()
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if !self.needs_rollback() {
            return;
        }
        let Some(mut conn) = self.conn.take() else {
            return;
        };

        warn!(
            session = %self.id,
            state = ?self.state,
            "Unit of work dropped with an open transaction, rolling back"
        );

        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                // The connection returns to the pool when the task drops it
                handle.spawn(async move {
                    if let Err(e) = sqlx::query("ROLLBACK").execute(&mut *conn).await {
                        debug!(error = %e, "Rollback on drop found nothing to undo");
                    }
                });
            }
            Err(_) => {
                // No runtime to run the rollback on; closing the connection
                // makes SQLite discard the transaction
                drop(conn.detach());
            }
        }
    }
}

/// Bounds a store call by `timeout`. Expiry is a connectivity failure.
pub(crate) async fn bounded<T, F>(timeout: Duration, fut: F) -> DbResult<T>
where
    F: Future<Output = Result<T, sqlx::Error>>,
{
    match tokio::time::timeout(timeout, fut).await {
        Ok(result) => result.map_err(DbError::from),
        Err(_) => Err(DbError::ConnectivityFailure(format!(
            "command timed out after {}ms",
            timeout.as_millis()
        ))),
    }
}
