//! # Entity Mapping
//!
//! Table metadata and bindings for the entity types the generic
//! repository works over.
//!
//! ```text
//! ┌──────────────┬────────────┬──────────────────────────────────────────┐
//! │ Entity       │ Table      │ Column enum                              │
//! ├──────────────┼────────────┼──────────────────────────────────────────┤
//! │ Category     │ categories │ CategoryColumn                           │
//! │ Product      │ products   │ ProductColumn                            │
//! └──────────────┴────────────┴──────────────────────────────────────────┘
//! ```
//!
//! ## Write Path
//! - INSERT binds every column; a transient id binds as NULL so SQLite
//!   assigns the rowid, and `updated_at` always starts NULL.
//! - UPDATE never touches `created_at` and stamps `updated_at` with the
//!   flush time.

use chrono::{DateTime, Utc};
use sqlx::query::Query;
use sqlx::sqlite::{SqliteArguments, SqliteRow};
use sqlx::{FromRow, Sqlite};

use catalog_core::{Category, Product};

use crate::repository::predicate::Column;
use crate::tracker::{Change, StagedChange};

/// A query with SQLite bindings.
pub type SqliteQuery<'q> = Query<'q, Sqlite, SqliteArguments<'q>>;

/// An entity type persisted in one table.
pub trait Entity:
    for<'r> FromRow<'r, SqliteRow> + Clone + Send + Sync + Unpin + 'static
{
    /// Typed column names usable in predicates.
    type Column: Column;

    /// Name used in errors and logs.
    const NAME: &'static str;

    /// Table name.
    const TABLE: &'static str;

    /// `SELECT <all columns> FROM <table>`, without a WHERE clause.
    const SELECT_SQL: &'static str;

    /// INSERT with one placeholder per column.
    const INSERT_SQL: &'static str;

    /// UPDATE of every mutable column, keyed by the trailing `id` placeholder.
    const UPDATE_SQL: &'static str;

    /// DELETE keyed by id.
    const DELETE_SQL: &'static str;

    fn id(&self) -> i64;

    fn bind_insert<'q>(&self, query: SqliteQuery<'q>) -> SqliteQuery<'q>;

    fn bind_update<'q>(&self, query: SqliteQuery<'q>, now: DateTime<Utc>) -> SqliteQuery<'q>;

    /// Wraps a change for the shared tracker.
    fn stage(change: Change<Self>) -> StagedChange;
}

fn id_or_null(id: i64) -> Option<i64> {
    (id != catalog_core::TRANSIENT_ID).then_some(id)
}

// =============================================================================
// Category
// =============================================================================

/// Columns of the `categories` table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CategoryColumn {
    Id,
    Name,
    Description,
    CreatedAt,
    UpdatedAt,
    IsDeleted,
}

impl Column for CategoryColumn {
    fn as_str(&self) -> &'static str {
        match self {
            CategoryColumn::Id => "id",
            CategoryColumn::Name => "name",
            CategoryColumn::Description => "description",
            CategoryColumn::CreatedAt => "created_at",
            CategoryColumn::UpdatedAt => "updated_at",
            CategoryColumn::IsDeleted => "is_deleted",
        }
    }
}

impl Entity for Category {
    type Column = CategoryColumn;

    const NAME: &'static str = "Category";
    const TABLE: &'static str = "categories";
    const SELECT_SQL: &'static str =
        "SELECT id, name, description, created_at, updated_at, is_deleted FROM categories";
    const INSERT_SQL: &'static str = r#"
        INSERT INTO categories (id, name, description, created_at, updated_at, is_deleted)
        VALUES (?1, ?2, ?3, ?4, NULL, ?5)
    "#;
    const UPDATE_SQL: &'static str = r#"
        UPDATE categories SET
            name = ?1,
            description = ?2,
            updated_at = ?3,
            is_deleted = ?4
        WHERE id = ?5
    "#;
    const DELETE_SQL: &'static str = "DELETE FROM categories WHERE id = ?1";

    fn id(&self) -> i64 {
        self.id
    }

    fn bind_insert<'q>(&self, query: SqliteQuery<'q>) -> SqliteQuery<'q> {
        query
            .bind(id_or_null(self.id))
            .bind(self.name.clone())
            .bind(self.description.clone())
            .bind(self.created_at)
            .bind(self.is_deleted)
    }

    fn bind_update<'q>(&self, query: SqliteQuery<'q>, now: DateTime<Utc>) -> SqliteQuery<'q> {
        query
            .bind(self.name.clone())
            .bind(self.description.clone())
            .bind(now)
            .bind(self.is_deleted)
            .bind(self.id)
    }

    fn stage(change: Change<Self>) -> StagedChange {
        StagedChange::Category(change)
    }
}

// =============================================================================
// Product
// =============================================================================

/// Columns of the `products` table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProductColumn {
    Id,
    Name,
    Description,
    PriceCents,
    Stock,
    CategoryId,
    CreatedAt,
    UpdatedAt,
    IsDeleted,
}

impl Column for ProductColumn {
    fn as_str(&self) -> &'static str {
        match self {
            ProductColumn::Id => "id",
            ProductColumn::Name => "name",
            ProductColumn::Description => "description",
            ProductColumn::PriceCents => "price_cents",
            ProductColumn::Stock => "stock",
            ProductColumn::CategoryId => "category_id",
            ProductColumn::CreatedAt => "created_at",
            ProductColumn::UpdatedAt => "updated_at",
            ProductColumn::IsDeleted => "is_deleted",
        }
    }
}

impl Entity for Product {
    type Column = ProductColumn;

    const NAME: &'static str = "Product";
    const TABLE: &'static str = "products";
    const SELECT_SQL: &'static str = r#"
        SELECT id, name, description, price_cents, stock, category_id,
               created_at, updated_at, is_deleted
        FROM products
    "#;
    const INSERT_SQL: &'static str = r#"
        INSERT INTO products (
            id, name, description, price_cents, stock, category_id,
            created_at, updated_at, is_deleted
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, NULL, ?8)
    "#;
    const UPDATE_SQL: &'static str = r#"
        UPDATE products SET
            name = ?1,
            description = ?2,
            price_cents = ?3,
            stock = ?4,
            category_id = ?5,
            updated_at = ?6,
            is_deleted = ?7
        WHERE id = ?8
    "#;
    const DELETE_SQL: &'static str = "DELETE FROM products WHERE id = ?1";

    fn id(&self) -> i64 {
        self.id
    }

    fn bind_insert<'q>(&self, query: SqliteQuery<'q>) -> SqliteQuery<'q> {
        query
            .bind(id_or_null(self.id))
            .bind(self.name.clone())
            .bind(self.description.clone())
            .bind(self.price_cents)
            .bind(self.stock)
            .bind(self.category_id)
            .bind(self.created_at)
            .bind(self.is_deleted)
    }

    fn bind_update<'q>(&self, query: SqliteQuery<'q>, now: DateTime<Utc>) -> SqliteQuery<'q> {
        query
            .bind(self.name.clone())
            .bind(self.description.clone())
            .bind(self.price_cents)
            .bind(self.stock)
            .bind(self.category_id)
            .bind(now)
            .bind(self.is_deleted)
            .bind(self.id)
    }

    fn stage(change: Change<Self>) -> StagedChange {
        StagedChange::Product(change)
    }
}
