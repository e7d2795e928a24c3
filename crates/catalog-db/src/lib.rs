//! # catalog-db: Persistence Layer for the Catalog
//!
//! Repositories and a unit of work over SQLite, using sqlx for async
//! access.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Catalog Data Flow                                │
//! │                                                                         │
//! │  catalog-service (CategoryService / ProductService)                    │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                   catalog-db (THIS CRATE)                       │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐   ┌────────────────┐   ┌──────────────┐   │   │
//! │  │   │   Database    │   │  UnitOfWork    │   │  Migrations  │   │   │
//! │  │   │   (pool.rs)   │──►│ categories()   │   │  (embedded)  │   │   │
//! │  │   │               │   │ products()     │   │              │   │   │
//! │  │   │ SqlitePool    │   │ save()         │   │ 001_catalog_ │   │   │
//! │  │   │               │   │ begin/commit/  │   │   schema.sql │   │   │
//! │  │   │               │   │   rollback     │   │              │   │   │
//! │  │   └───────────────┘   └────────────────┘   └──────────────┘   │   │
//! │  │                                                                 │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  SQLite Database                                                       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`config`] - Database configuration (builder and environment)
//! - [`pool`] - Connection pool creation
//! - [`unit_of_work`] - Transaction boundary over both repositories
//! - [`repository`] - Generic and specialized repositories
//! - [`migrations`] - Embedded database migrations
//! - [`error`] - Database error types
//!
//! ## Usage
//!
//! ```rust,no_run
//! use catalog_core::{Category, Product};
//! use catalog_db::{Database, DbConfig};
//!
//! # async fn demo() -> Result<(), Box<dyn std::error::Error>> {
//! let db = Database::new(DbConfig::new("catalog.db")).await?;
//! let mut uow = db.unit_of_work().await?;
//!
//! let beverages = uow.categories().add(Category::new("Beverages", "Drinks"));
//! uow.save().await?;
//!
//! let category_id = uow.assigned_id(beverages).unwrap_or_default();
//! uow.products()
//!     .add(Product::new("Cola", "Fizzy", "1.50".parse()?, 10, category_id));
//! uow.save().await?;
//!
//! let view = uow.categories().get_category_with_products(category_id).await?;
//! assert_eq!(view.map(|v| v.product_count()), Some(1));
//! # Ok(())
//! # }
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod config;
pub mod error;
pub mod migrations;
pub mod pool;
pub mod repository;
mod session;
pub mod tracker;
pub mod unit_of_work;

// =============================================================================
// Re-exports
// =============================================================================

pub use config::{ConfigError, DbConfig};
pub use error::{ConstraintKind, DbError, DbResult};
pub use pool::Database;
pub use session::TxState;
pub use tracker::Pending;
pub use unit_of_work::UnitOfWork;

// Repository re-exports for convenience
pub use repository::{
    CategoryColumn, CategoryRepository, Predicate, ProductColumn, ProductRepository, Repository,
};
