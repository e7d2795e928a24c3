//! # Product Service
//!
//! Product operations over a borrowed unit of work. Every product returned
//! carries its category name, loaded in the same round trip.
//!
//! A create or update naming a category that does not exist is not checked
//! up front; the store's foreign key rejects it at save time and the caller
//! sees `ServiceError::Db` with `ConstraintKind::ForeignKey`.

use catalog_core::validation::validate_matching_id;
use catalog_core::{CreateProductDto, ProductDto, SoftDelete, UpdateProductDto};
use catalog_db::{DbError, UnitOfWork};
use tracing::{debug, info};

use crate::error::{ServiceError, ServiceResult};
use crate::save_or_discard;

/// Product operations scoped to one unit of work.
pub struct ProductService<'u> {
    uow: &'u mut UnitOfWork,
}

impl<'u> ProductService<'u> {
    pub fn new(uow: &'u mut UnitOfWork) -> Self {
        ProductService { uow }
    }

    /// Every non-deleted product.
    pub async fn get_all(&mut self) -> ServiceResult<Vec<ProductDto>> {
        debug!("get_all products");

        let views = self.uow.products().get_products_with_category().await?;
        Ok(views.iter().map(ProductDto::from).collect())
    }

    /// One non-deleted product, or `None`.
    pub async fn get_by_id(&mut self, id: i64) -> ServiceResult<Option<ProductDto>> {
        debug!(id, "get product");

        let view = self.uow.products().get_product_with_category(id).await?;
        Ok(view.as_ref().map(ProductDto::from))
    }

    /// Non-deleted products of one category. Empty if the category is unknown.
    pub async fn get_by_category(&mut self, category_id: i64) -> ServiceResult<Vec<ProductDto>> {
        debug!(category_id, "get products by category");

        let views = self
            .uow
            .products()
            .get_products_by_category(category_id)
            .await?;
        Ok(views.iter().map(ProductDto::from).collect())
    }

    /// Creates a product and returns it with its category name.
    pub async fn create(&mut self, dto: CreateProductDto) -> ServiceResult<ProductDto> {
        dto.validate()?;

        let category_id = dto.category_id;
        let pending = self.uow.products().add(dto.into_entity());
        save_or_discard(self.uow).await?;

        let id = self.uow.assigned_id(pending).ok_or_else(|| {
            ServiceError::Db(DbError::Internal("no id assigned to new product".into()))
        })?;

        info!(id, category_id, "Product created");
        self.reload(id).await
    }

    /// Replaces every mutable field of the product at `id`. The body's id must
    /// match it.
    pub async fn update(
        &mut self,
        id: i64,
        dto: UpdateProductDto,
    ) -> ServiceResult<ProductDto> {
        validate_matching_id(id, dto.id)?;
        dto.validate()?;

        let mut product = self
            .uow
            .products()
            .get_by_id(dto.id)
            .await?
            .filter(|p| !p.is_deleted())
            .ok_or_else(|| ServiceError::not_found("Product", dto.id))?;

        dto.apply_to(&mut product);
        self.uow.products().update(&product);
        save_or_discard(self.uow).await?;

        info!(id = dto.id, "Product updated");
        self.reload(dto.id).await
    }

    /// Soft-deletes a product.
    pub async fn delete(&mut self, id: i64) -> ServiceResult<()> {
        let mut product = self
            .uow
            .products()
            .get_by_id(id)
            .await?
            .filter(|p| !p.is_deleted())
            .ok_or_else(|| ServiceError::not_found("Product", id))?;

        self.uow.products().soft_delete(&mut product);
        save_or_discard(self.uow).await?;

        info!(id, "Product deleted");
        Ok(())
    }

    async fn reload(&mut self, id: i64) -> ServiceResult<ProductDto> {
        self.get_by_id(id)
            .await?
            .ok_or_else(|| ServiceError::not_found("Product", id))
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use catalog_core::{CreateCategoryDto, ValidationError};
    use catalog_db::{ConstraintKind, Database, DbConfig};

    use super::*;
    use crate::CategoryService;

    /// Opens an in-memory catalog with "Beverages" (id 1) and "Snacks" (id 2).
    async fn seeded_uow() -> (Database, UnitOfWork) {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let mut uow = db.unit_of_work().await.unwrap();

        let mut categories = CategoryService::new(&mut uow);
        for (name, description) in [("Beverages", "Drinks"), ("Snacks", "Crunchy")] {
            categories
                .create(CreateCategoryDto {
                    name: name.to_string(),
                    description: description.to_string(),
                })
                .await
                .unwrap();
        }

        (db, uow)
    }

    fn product(name: &str, category_id: i64) -> CreateProductDto {
        CreateProductDto {
            name: name.to_string(),
            description: format!("{name} description"),
            price_cents: 150,
            stock: 10,
            category_id,
        }
    }

    #[tokio::test]
    async fn test_create_includes_category_name() {
        let (_db, mut uow) = seeded_uow().await;
        let mut service = ProductService::new(&mut uow);

        let dto = service.create(product("Cola", 1)).await.unwrap();
        assert_eq!(dto.id, 1);
        assert_eq!(dto.category_id, 1);
        assert_eq!(dto.category_name, "Beverages");
        assert_eq!(dto.price_cents, 150);
    }

    #[tokio::test]
    async fn test_create_with_unknown_category_is_foreign_key_violation() {
        let (_db, mut uow) = seeded_uow().await;
        let mut service = ProductService::new(&mut uow);

        let err = service.create(product("Cola", 99)).await.unwrap_err();
        assert_eq!(err.constraint_kind(), Some(ConstraintKind::ForeignKey));
        assert!(service.get_all().await.unwrap().is_empty());
        assert!(!uow.has_pending_changes());
    }

    #[tokio::test]
    async fn test_create_rejects_negative_stock() {
        let (_db, mut uow) = seeded_uow().await;
        let mut service = ProductService::new(&mut uow);

        let mut dto = product("Cola", 1);
        dto.stock = -1;
        let err = service.create(dto).await.unwrap_err();
        assert!(matches!(
            err,
            ServiceError::Validation(ValidationError::Negative { .. })
        ));
    }

    #[tokio::test]
    async fn test_update_moves_product_between_categories() {
        let (_db, mut uow) = seeded_uow().await;
        let mut service = ProductService::new(&mut uow);

        let created = service.create(product("Pretzels", 1)).await.unwrap();
        let updated = service
            .update(
                created.id,
                UpdateProductDto {
                    id: created.id,
                    name: "Pretzels".to_string(),
                    description: "Salted".to_string(),
                    price_cents: 199,
                    stock: 4,
                    category_id: 2,
                },
            )
            .await
            .unwrap();

        assert_eq!(updated.category_name, "Snacks");
        assert_eq!(updated.price_cents, 199);
        assert!(updated.updated_at.is_some());

        assert!(service.get_by_category(1).await.unwrap().is_empty());
        assert_eq!(service.get_by_category(2).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_delete_hides_product_from_reads() {
        let (_db, mut uow) = seeded_uow().await;
        let mut service = ProductService::new(&mut uow);

        let cola = service.create(product("Cola", 1)).await.unwrap();
        service.create(product("Water", 1)).await.unwrap();

        service.delete(cola.id).await.unwrap();

        assert!(service.get_by_id(cola.id).await.unwrap().is_none());
        let remaining = service.get_all().await.unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].name, "Water");

        let err = service.delete(cola.id).await.unwrap_err();
        assert!(matches!(err, ServiceError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_update_of_deleted_product_is_not_found() {
        let (_db, mut uow) = seeded_uow().await;
        let mut service = ProductService::new(&mut uow);

        let cola = service.create(product("Cola", 1)).await.unwrap();
        service.delete(cola.id).await.unwrap();

        let err = service
            .update(
                cola.id,
                UpdateProductDto {
                    id: cola.id,
                    name: "Cola".to_string(),
                    description: "Back again".to_string(),
                    price_cents: 150,
                    stock: 1,
                    category_id: 1,
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_update_with_mismatched_body_id_is_rejected() {
        let (_db, mut uow) = seeded_uow().await;
        let mut service = ProductService::new(&mut uow);

        let cola = service.create(product("Cola", 1)).await.unwrap();
        let err = service
            .update(
                cola.id + 1,
                UpdateProductDto {
                    id: cola.id,
                    name: "Cola Zero".to_string(),
                    description: "No sugar".to_string(),
                    price_cents: 150,
                    stock: 1,
                    category_id: 1,
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ServiceError::Validation(ValidationError::Mismatch { .. })
        ));

        let stored = service.get_by_id(cola.id).await.unwrap().unwrap();
        assert_eq!(stored.name, "Cola");
        assert!(stored.updated_at.is_none());
    }
}
