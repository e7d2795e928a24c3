//! # Repository Module
//!
//! Repositories over the catalog tables.
//!
//! ## Repository Pattern
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Repository Layout                                    │
//! │                                                                         │
//! │  Service                                                               │
//! │       │                                                                 │
//! │       │  uow.products().get_products_by_category(1)                    │
//! │       ▼                                                                 │
//! │  Repository<'uow, E: Entity>          (generic.rs)                     │
//! │  ├── get_by_id / get_all / find / first_or_default                     │
//! │  ├── count / count_where / any                                         │
//! │  └── add / update / delete / soft_delete  (staged)                     │
//! │       │                                                                 │
//! │       ├── impl Repository<'_, Category>  (category.rs)                 │
//! │       │     └── get_categories_with_products / get_category_with_...   │
//! │       └── impl Repository<'_, Product>   (product.rs)                  │
//! │             └── get_products_by_category / get_product(s)_with_...     │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  Session (one connection + change tracker, owned by the unit of work)  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Available Repositories
//!
//! - [`CategoryRepository`] - Category CRUD and eager product loading
//! - [`ProductRepository`] - Product CRUD and eager category loading

pub mod category;
pub mod entity;
pub mod generic;
pub mod predicate;
pub mod product;

pub use category::CategoryRepository;
pub use entity::{CategoryColumn, Entity, ProductColumn};
pub use generic::Repository;
pub use predicate::{Column, Predicate, Value};
pub use product::ProductRepository;
