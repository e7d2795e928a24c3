//! # Database Error Types
//!
//! Error types for persistence operations.
//!
//! ## Error Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Error Propagation                                    │
//! │                                                                         │
//! │  SQLite Error (sqlx::Error)                                            │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  DbError (this module) ← Categorised: NotFound / ConstraintViolation / │
//! │       │                   ConnectivityFailure / ...                     │
//! │       ▼                                                                 │
//! │  ServiceError (catalog-service)                                        │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  Controller maps to a response (404 / 409 / 503 ...)                   │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Retry Policy
//! Only [`DbError::ConnectivityFailure`] is retryable: the outcome of the
//! failed call is unknown but nothing was committed. A constraint violation
//! fails identically on retry because the staged state is unchanged.

use std::fmt;

use sqlx::error::ErrorKind;
use thiserror::Error;

/// Which store-level invariant a write violated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConstraintKind {
    /// UNIQUE index (e.g. duplicate active category name).
    Unique,
    /// FOREIGN KEY (unknown category, or removing a referenced category).
    ForeignKey,
    /// NOT NULL column left empty.
    NotNull,
    /// CHECK constraint (length, negative price or stock).
    Check,
}

impl fmt::Display for ConstraintKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ConstraintKind::Unique => "unique",
            ConstraintKind::ForeignKey => "foreign key",
            ConstraintKind::NotNull => "not null",
            ConstraintKind::Check => "check",
        };
        f.write_str(name)
    }
}

/// Database operation errors.
///
/// These errors wrap sqlx errors and sort them into the categories a
/// caller actually branches on.
#[derive(Debug, Error)]
pub enum DbError {
    /// Entity not found in database.
    ///
    /// ## When This Occurs
    /// - A staged update or delete matched no row at save time
    /// - A service-level precondition fetch found nothing
    ///
    /// Plain reads return `Ok(None)` instead.
    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    /// A staged write violated a store-level invariant.
    ///
    /// ## When This Occurs
    /// - Duplicate active category name (Unique)
    /// - Product referencing a missing category (ForeignKey)
    /// - Hard-deleting a category that products still reference (ForeignKey)
    /// - Negative price/stock, over-long text (Check)
    ///
    /// Only raised by `save()` / `commit_transaction()`; staging never
    /// touches the store.
    #[error("Constraint violation ({kind}): {message}")]
    ConstraintViolation {
        kind: ConstraintKind,
        message: String,
    },

    /// The store is unreachable, busy, or a command timed out.
    ///
    /// The operation did not commit; retrying is reasonable.
    #[error("Connectivity failure: {0}")]
    ConnectivityFailure(String),

    /// Transaction control called in the wrong state
    /// (commit/rollback while idle, begin while already in a transaction).
    #[error("Invalid transaction state: {0}")]
    TransactionState(String),

    /// Migration failed.
    #[error("Migration failed: {0}")]
    MigrationFailed(String),

    /// Query execution failed for a reason not covered above.
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// Internal database error (decode failures, broken invariants).
    #[error("Internal database error: {0}")]
    Internal(String),
}

impl DbError {
    /// Creates a NotFound error for a given entity type and ID.
    pub fn not_found(entity: impl Into<String>, id: impl ToString) -> Self {
        DbError::NotFound {
            entity: entity.into(),
            id: id.to_string(),
        }
    }

    /// Creates a ConstraintViolation error.
    pub fn constraint(kind: ConstraintKind, message: impl Into<String>) -> Self {
        DbError::ConstraintViolation {
            kind,
            message: message.into(),
        }
    }

    /// Returns the violated constraint kind, if this is a constraint error.
    pub fn constraint_kind(&self) -> Option<ConstraintKind> {
        match self {
            DbError::ConstraintViolation { kind, .. } => Some(*kind),
            _ => None,
        }
    }

    /// True for "nothing was found".
    pub fn is_not_found(&self) -> bool {
        matches!(self, DbError::NotFound { .. })
    }

    /// True when the same call may succeed if retried.
    pub fn is_retryable(&self) -> bool {
        matches!(self, DbError::ConnectivityFailure(_))
    }
}

/// SQLite primary result codes that mean "try again later".
const SQLITE_BUSY: i32 = 5;
const SQLITE_LOCKED: i32 = 6;

/// Convert sqlx errors to DbError.
///
/// ## Error Mapping
/// ```text
/// sqlx::Error::RowNotFound          → DbError::NotFound
/// sqlx::Error::Database (UNIQUE)    → ConstraintViolation(Unique)
/// sqlx::Error::Database (FK)        → ConstraintViolation(ForeignKey)
/// sqlx::Error::Database (NOT NULL)  → ConstraintViolation(NotNull)
/// sqlx::Error::Database (CHECK)     → ConstraintViolation(Check)
/// sqlx::Error::Database (BUSY/LOCK) → ConnectivityFailure
/// PoolTimedOut / PoolClosed / Io    → ConnectivityFailure
/// Other                             → DbError::Internal
/// ```
impl From<sqlx::Error> for DbError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => DbError::NotFound {
                entity: "Record".to_string(),
                id: "unknown".to_string(),
            },

            sqlx::Error::Database(db_err) => {
                let msg = db_err.message().to_string();

                match db_err.kind() {
                    ErrorKind::UniqueViolation => {
                        return DbError::constraint(ConstraintKind::Unique, msg)
                    }
                    ErrorKind::ForeignKeyViolation => {
                        return DbError::constraint(ConstraintKind::ForeignKey, msg)
                    }
                    ErrorKind::NotNullViolation => {
                        return DbError::constraint(ConstraintKind::NotNull, msg)
                    }
                    ErrorKind::CheckViolation => {
                        return DbError::constraint(ConstraintKind::Check, msg)
                    }
                    _ => {}
                }

                // Extended result codes carry the primary code in the low byte
                let primary = db_err
                    .code()
                    .and_then(|code| code.parse::<i32>().ok())
                    .map(|code| code & 0xff);
                if matches!(primary, Some(SQLITE_BUSY | SQLITE_LOCKED)) {
                    return DbError::ConnectivityFailure(msg);
                }

                // Fall back to SQLite's message text:
                // "UNIQUE constraint failed: <table>.<column>"
                // "FOREIGN KEY constraint failed"
                if msg.contains("UNIQUE constraint failed") {
                    DbError::constraint(ConstraintKind::Unique, msg)
                } else if msg.contains("FOREIGN KEY constraint failed") {
                    DbError::constraint(ConstraintKind::ForeignKey, msg)
                } else if msg.contains("NOT NULL constraint failed") {
                    DbError::constraint(ConstraintKind::NotNull, msg)
                } else if msg.contains("CHECK constraint failed") {
                    DbError::constraint(ConstraintKind::Check, msg)
                } else {
                    DbError::QueryFailed(msg)
                }
            }

            sqlx::Error::PoolTimedOut => {
                DbError::ConnectivityFailure("Timed out acquiring a connection".to_string())
            }

            sqlx::Error::PoolClosed => {
                DbError::ConnectivityFailure("Pool is closed".to_string())
            }

            sqlx::Error::Io(e) => DbError::ConnectivityFailure(e.to_string()),

            sqlx::Error::WorkerCrashed => {
                DbError::ConnectivityFailure("SQLite worker thread crashed".to_string())
            }

            _ => DbError::Internal(err.to_string()),
        }
    }
}

impl From<sqlx::migrate::MigrateError> for DbError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        DbError::MigrationFailed(err.to_string())
    }
}

/// Result type for database operations.
pub type DbResult<T> = Result<T, DbError>;
