//! # Domain Types
//!
//! The two catalog entities and the eager-loaded views built from them.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐  1     *  ┌─────────────────┐                      │
//! │  │    Category     │◄──────────│     Product     │                      │
//! │  │  ─────────────  │           │  ─────────────  │                      │
//! │  │  id (i64)       │           │  id (i64)       │                      │
//! │  │  name (unique*) │           │  name           │                      │
//! │  │  description    │           │  price_cents    │                      │
//! │  │  is_deleted     │           │  stock          │                      │
//! │  └─────────────────┘           │  category_id FK │                      │
//! │                                └─────────────────┘                      │
//! │  * unique among categories that are not soft-deleted                    │
//! │                                                                         │
//! │  Eager views (what relationship fetches return):                        │
//! │  CategoryWithProducts { category, products }  → product_count()         │
//! │  ProductWithCategory  { product, category }   → category always loaded  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Identity
//! Ids are generated by the store. An entity built in memory carries
//! `id == 0` ([`TRANSIENT_ID`]) until the unit of work that staged it saves.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::money::Money;

/// Id carried by entities that have not been persisted yet.
pub const TRANSIENT_ID: i64 = 0;

// =============================================================================
// Soft Delete
// =============================================================================

/// Entities that are logically removed by flag instead of physically.
pub trait SoftDelete {
    /// Whether the row is logically removed.
    fn is_deleted(&self) -> bool;

    /// Flags the entity as removed. Persisting it is the caller's job
    /// (stage an update and save).
    fn mark_deleted(&mut self);
}

// =============================================================================
// Category
// =============================================================================

/// A product category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Category {
    /// Store-generated identity (`0` while transient).
    pub id: i64,

    /// Display name, 1..=100 characters, unique among active categories.
    pub name: String,

    /// Description, 1..=500 characters.
    pub description: String,

    /// When the category was created. Never rewritten after insert.
    pub created_at: DateTime<Utc>,

    /// When the category was last mutated; `None` until the first update.
    pub updated_at: Option<DateTime<Utc>>,

    /// Soft-delete flag.
    pub is_deleted: bool,
}

impl Category {
    /// Creates a transient category stamped with the current time.
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Category {
            id: TRANSIENT_ID,
            name: name.into(),
            description: description.into(),
            created_at: Utc::now(),
            updated_at: None,
            is_deleted: false,
        }
    }

    /// True until the store has assigned an id.
    #[inline]
    pub fn is_transient(&self) -> bool {
        self.id == TRANSIENT_ID
    }
}

impl SoftDelete for Category {
    fn is_deleted(&self) -> bool {
        self.is_deleted
    }

    fn mark_deleted(&mut self) {
        self.is_deleted = true;
    }
}

// =============================================================================
// Product
// =============================================================================

/// A product listed under exactly one category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Product {
    /// Store-generated identity (`0` while transient).
    pub id: i64,

    /// Display name, 1..=100 characters.
    pub name: String,

    /// Description, 1..=500 characters.
    pub description: String,

    /// Price in cents (fixed-point, two decimals). Non-negative.
    pub price_cents: i64,

    /// Units on hand. Non-negative.
    pub stock: i64,

    /// Owning category. Required; the store rejects unknown ids.
    pub category_id: i64,

    /// When the product was created. Never rewritten after insert.
    pub created_at: DateTime<Utc>,

    /// When the product was last mutated; `None` until the first update.
    pub updated_at: Option<DateTime<Utc>>,

    /// Soft-delete flag.
    pub is_deleted: bool,
}

impl Product {
    /// Creates a transient product stamped with the current time.
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        price: Money,
        stock: i64,
        category_id: i64,
    ) -> Self {
        Product {
            id: TRANSIENT_ID,
            name: name.into(),
            description: description.into(),
            price_cents: price.cents(),
            stock,
            category_id,
            created_at: Utc::now(),
            updated_at: None,
            is_deleted: false,
        }
    }

    /// Returns the price as a Money type.
    #[inline]
    pub fn price(&self) -> Money {
        Money::from_cents(self.price_cents)
    }

    /// True until the store has assigned an id.
    #[inline]
    pub fn is_transient(&self) -> bool {
        self.id == TRANSIENT_ID
    }
}

impl SoftDelete for Product {
    fn is_deleted(&self) -> bool {
        self.is_deleted
    }

    fn mark_deleted(&mut self) {
        self.is_deleted = true;
    }
}

// =============================================================================
// Eager-Loaded Views
// =============================================================================

/// A category together with its (non-deleted) products.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryWithProducts {
    pub category: Category,
    pub products: Vec<Product>,
}

impl CategoryWithProducts {
    /// Derived product count; never persisted.
    #[inline]
    pub fn product_count(&self) -> usize {
        self.products.len()
    }
}

/// A product together with its owning category.
///
/// The category is not optional: every fetch that returns this type has
/// loaded it, so callers never hit an unloaded relationship.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductWithCategory {
    pub product: Product,
    pub category: Category,
}

// =============================================================================
// Unit Tests
// =============================================================================
