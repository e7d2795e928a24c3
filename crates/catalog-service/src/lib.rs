//! # catalog-service: Catalog Operations for Controllers
//!
//! Services that validate DTOs, stage changes on a unit of work, save them
//! and hand back DTOs read fresh from the store.
//!
//! ## Request Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       One Request, One Unit of Work                     │
//! │                                                                         │
//! │  Controller                                                             │
//! │       │  let mut uow = db.unit_of_work().await?;                        │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │  CategoryService::new(&mut uow)   ProductService::new(&mut uow)  │   │
//! │  │       │                                  │                       │   │
//! │  │       ├── validate (catalog-core)        │                       │   │
//! │  │       ├── stage on uow.categories() / uow.products()             │   │
//! │  │       ├── uow.save()   ← store constraints decide here           │   │
//! │  │       └── re-read → CategoryDto / ProductDto                     │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ServiceResult<Dto>  →  response                                        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Services borrow the unit of work, so several of them can run one after
//! another inside the same explicit transaction.

pub mod category;
pub mod error;
pub mod product;

pub use category::CategoryService;
pub use error::{ServiceError, ServiceResult};
pub use product::ProductService;

use catalog_db::UnitOfWork;
use tracing::warn;

/// Saves the staged changes; on failure drops them so the next call on the
/// same unit of work does not replay them.
pub(crate) async fn save_or_discard(uow: &mut UnitOfWork) -> ServiceResult<u64> {
    match uow.save().await {
        Ok(rows) => Ok(rows),
        Err(err) => {
            warn!(session = %uow.session_id(), error = %err, "Save failed, discarding staged changes");
            uow.discard_changes();
            Err(err.into())
        }
    }
}
