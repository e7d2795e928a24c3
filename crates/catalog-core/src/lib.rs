//! # catalog-core: Pure Domain Types for the Catalog
//!
//! This crate holds the catalog's entities, money type, DTOs and validation
//! rules as plain data and pure functions with zero I/O dependencies.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Catalog Architecture                             │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │              Controllers (external, not in this workspace)      │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │ DTOs                                   │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                    catalog-service                              │   │
//! │  │    CategoryService, ProductService                              │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ catalog-core (THIS CRATE) ★                     │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────┐  ┌───────────┐  ┌───────────┐  ┌───────────┐  │   │
//! │  │   │   types   │  │   money   │  │    dto    │  │ validation│  │   │
//! │  │   │ Category  │  │   Money   │  │CategoryDto│  │   rules   │  │   │
//! │  │   │ Product   │  │  (cents)  │  │ProductDto │  │  checks   │  │   │
//! │  │   └───────────┘  └───────────┘  └───────────┘  └───────────┘  │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO NETWORK • PURE FUNCTIONS           │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                    catalog-db (Persistence Layer)               │   │
//! │  │         SQLite, repositories, unit of work, migrations          │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Entities (Category, Product) and their eager-loaded views
//! - [`money`] - Money type stored as integer cents (no floating point!)
//! - [`dto`] - Wire shapes and entity mapping
//! - [`error`] - Domain error types
//! - [`validation`] - Field rules applied before anything reaches the store
//!
//! ## Example Usage
//!
//! ```rust
//! use catalog_core::{Category, Money, Product};
//!
//! let beverages = Category::new("Beverages", "Drinks");
//! assert!(beverages.is_transient());
//!
//! let price: Money = "1.50".parse().unwrap();
//! let cola = Product::new("Cola", "Fizzy", price, 10, 1);
//! assert_eq!(cola.price_cents, 150);
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod dto;
pub mod error;
pub mod money;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use dto::{
    CategoryDto, CreateCategoryDto, CreateProductDto, ProductDto, UpdateCategoryDto,
    UpdateProductDto,
};
pub use error::{CoreError, CoreResult, ValidationError};
pub use money::Money;
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Maximum length (in characters) of a category or product name.
pub const MAX_NAME_LENGTH: usize = 100;

/// Maximum length (in characters) of a category or product description.
pub const MAX_DESCRIPTION_LENGTH: usize = 500;
