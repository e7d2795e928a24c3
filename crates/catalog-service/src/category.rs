//! # Category Service
//!
//! Create, read, update and soft-delete categories over a borrowed unit of
//! work.
//!
//! ## Write Flow
//! ```text
//! create(dto)
//!     │
//!     ├── dto.validate()                      ← 400 on failure, nothing staged
//!     ├── uow.categories().add(entity)
//!     ├── uow.save()                          ← unique name enforced here
//!     └── get_category_with_products(id)      ← re-read, product_count = 0
//!
//! delete(id)
//!     │
//!     ├── get_by_id(id)                       ← missing or deleted → NotFound
//!     ├── products().any(category_id = id AND is_deleted = 0)
//!     │        └── true → Conflict
//!     └── soft_delete + save
//! ```

use catalog_core::validation::validate_matching_id;
use catalog_core::{CategoryDto, CreateCategoryDto, SoftDelete, UpdateCategoryDto};
use catalog_db::{DbError, Predicate, ProductColumn, UnitOfWork};
use tracing::{debug, info};

use crate::error::{ServiceError, ServiceResult};
use crate::save_or_discard;

/// Category operations scoped to one unit of work.
pub struct CategoryService<'u> {
    uow: &'u mut UnitOfWork,
}

impl<'u> CategoryService<'u> {
    pub fn new(uow: &'u mut UnitOfWork) -> Self {
        CategoryService { uow }
    }

    /// Every non-deleted category with its product count.
    pub async fn get_all(&mut self) -> ServiceResult<Vec<CategoryDto>> {
        debug!("get_all categories");

        let views = self.uow.categories().get_categories_with_products().await?;
        Ok(views.iter().map(CategoryDto::from).collect())
    }

    /// One non-deleted category, or `None`.
    pub async fn get_by_id(&mut self, id: i64) -> ServiceResult<Option<CategoryDto>> {
        debug!(id, "get category");

        let view = self.uow.categories().get_category_with_products(id).await?;
        Ok(view.as_ref().map(CategoryDto::from))
    }

    /// Creates a category and returns it as stored.
    pub async fn create(&mut self, dto: CreateCategoryDto) -> ServiceResult<CategoryDto> {
        dto.validate()?;

        let pending = self.uow.categories().add(dto.into_entity());
        save_or_discard(self.uow).await?;

        let id = self.uow.assigned_id(pending).ok_or_else(|| {
            ServiceError::Db(DbError::Internal("no id assigned to new category".into()))
        })?;

        info!(id, "Category created");
        self.reload(id).await
    }

    /// Replaces the name and description of the category at `id`. The body's
    /// id must match it.
    pub async fn update(
        &mut self,
        id: i64,
        dto: UpdateCategoryDto,
    ) -> ServiceResult<CategoryDto> {
        validate_matching_id(id, dto.id)?;
        dto.validate()?;

        let mut category = self
            .uow
            .categories()
            .get_by_id(dto.id)
            .await?
            .filter(|c| !c.is_deleted())
            .ok_or_else(|| ServiceError::not_found("Category", dto.id))?;

        dto.apply_to(&mut category);
        self.uow.categories().update(&category);
        save_or_discard(self.uow).await?;

        info!(id = dto.id, "Category updated");
        self.reload(dto.id).await
    }

    /// Soft-deletes a category that no live product references.
    ///
    /// ## Returns
    /// * `Err(ServiceError::NotFound)` - Missing or already deleted
    /// * `Err(ServiceError::Conflict)` - Non-deleted products still
    ///   reference it
    pub async fn delete(&mut self, id: i64) -> ServiceResult<()> {
        let mut category = self
            .uow
            .categories()
            .get_by_id(id)
            .await?
            .filter(|c| !c.is_deleted())
            .ok_or_else(|| ServiceError::not_found("Category", id))?;

        let in_use = self
            .uow
            .products()
            .any(&Predicate::and(vec![
                Predicate::eq(ProductColumn::CategoryId, id),
                Predicate::eq(ProductColumn::IsDeleted, false),
            ]))
            .await?;

        if in_use {
            return Err(ServiceError::Conflict(format!(
                "Category {} still has products",
                id
            )));
        }

        self.uow.categories().soft_delete(&mut category);
        save_or_discard(self.uow).await?;

        info!(id, "Category deleted");
        Ok(())
    }

    async fn reload(&mut self, id: i64) -> ServiceResult<CategoryDto> {
        self.get_by_id(id)
            .await?
            .ok_or_else(|| ServiceError::not_found("Category", id))
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
