//! # Service Error Type
//!
//! What a controller receives when a catalog operation fails.
//!
//! ## Mapping
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Source                              ServiceError          Typical HTTP │
//! │  ──────                              ────────────          ──────────── │
//! │  ValidationError (catalog-core) ───► Validation            400          │
//! │  missing / soft-deleted row     ───► NotFound              404          │
//! │  DbError::NotFound              ───► NotFound              404          │
//! │  category still has products    ───► Conflict              409          │
//! │  any other DbError              ───► Db (kind preserved)   409 / 500    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Store constraint failures stay wrapped in [`ServiceError::Db`] so the
//! caller can still branch on [`ConstraintKind`].

use std::fmt::Display;

use catalog_core::ValidationError;
use catalog_db::{ConstraintKind, DbError};
use thiserror::Error;

/// Errors returned by the catalog services.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// Input rejected before anything was staged.
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// The target row does not exist or is soft-deleted.
    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    /// The operation conflicts with the current state of the catalog.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Store failure, including constraint violations.
    #[error("Database error: {0}")]
    Db(DbError),
}

impl ServiceError {
    /// Creates a not found error.
    pub fn not_found(entity: &str, id: impl Display) -> Self {
        ServiceError::NotFound {
            entity: entity.to_string(),
            id: id.to_string(),
        }
    }

    /// Constraint kind of a wrapped store violation, if any.
    pub fn constraint_kind(&self) -> Option<ConstraintKind> {
        match self {
            ServiceError::Db(err) => err.constraint_kind(),
            _ => None,
        }
    }

    /// Whether retrying the same call may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ServiceError::Db(err) if err.is_retryable())
    }
}

impl From<DbError> for ServiceError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::NotFound { entity, id } => ServiceError::NotFound { entity, id },
            other => ServiceError::Db(other),
        }
    }
}

/// Convenience type alias for service results.
pub type ServiceResult<T> = Result<T, ServiceError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_db_not_found_becomes_service_not_found() {
        let err = ServiceError::from(DbError::not_found("Product", 42));
        assert!(matches!(err, ServiceError::NotFound { .. }));
        assert_eq!(err.to_string(), "Product not found: 42");
    }

    #[test]
    fn test_constraint_kind_survives_wrapping() {
        let err = ServiceError::from(DbError::constraint(
            ConstraintKind::ForeignKey,
            "FOREIGN KEY constraint failed",
        ));
        assert_eq!(err.constraint_kind(), Some(ConstraintKind::ForeignKey));
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_connectivity_is_retryable() {
        let err = ServiceError::from(DbError::ConnectivityFailure("database is locked".into()));
        assert!(err.is_retryable());
        assert_eq!(err.constraint_kind(), None);
    }
}
