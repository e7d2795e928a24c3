//! # Category Repository
//!
//! Relationship-aware fetches for categories, on top of the generic CRUD.
//!
//! ## Eager Loading
//! ```text
//! get_categories_with_products()
//!     │
//!     ├── 1. SELECT ... FROM categories WHERE is_deleted = 0
//!     ├── 2. SELECT ... FROM products   WHERE is_deleted = 0
//!     │         AND category_id IN (SELECT id FROM categories WHERE is_deleted = 0)
//!     └── 3. group products by category_id in memory
//!
//! Two queries no matter how many categories come back.
//! ```

use std::collections::HashMap;

use catalog_core::{Category, CategoryWithProducts, Product};
use tracing::debug;

use crate::error::DbResult;
use crate::repository::entity::Entity;
use crate::repository::generic::Repository;
use crate::session::bounded;

/// Repository for categories.
pub type CategoryRepository<'a> = Repository<'a, Category>;

impl Repository<'_, Category> {
    /// Every non-deleted category with its non-deleted products, in id order.
    pub async fn get_categories_with_products(&mut self) -> DbResult<Vec<CategoryWithProducts>> {
        let categories_sql = format!("{} WHERE is_deleted = 0 ORDER BY id", Category::SELECT_SQL);
        let products_sql = format!(
            "{} WHERE is_deleted = 0 \
             AND category_id IN (SELECT id FROM categories WHERE is_deleted = 0) \
             ORDER BY id",
            Product::SELECT_SQL
        );

        let timeout = self.session.command_timeout();
        let conn = self.session.connection().await?;
        let categories =
            bounded(timeout, sqlx::query_as::<_, Category>(&categories_sql).fetch_all(&mut *conn))
                .await?;
        let products =
            bounded(timeout, sqlx::query_as::<_, Product>(&products_sql).fetch_all(&mut *conn))
                .await?;

        debug!(
            categories = categories.len(),
            products = products.len(),
            "Loaded categories with products"
        );

        let mut by_category: HashMap<i64, Vec<Product>> = HashMap::new();
        for product in products {
            by_category.entry(product.category_id).or_default().push(product);
        }

        Ok(categories
            .into_iter()
            .map(|category| {
                let products = by_category.remove(&category.id).unwrap_or_default();
                CategoryWithProducts { category, products }
            })
            .collect())
    }

    /// One non-deleted category with its non-deleted products.
    ///
    /// A soft-deleted category is hidden even when asked for by id; use
    /// `get_by_id` to load it regardless of `is_deleted`.
    ///
    /// ## Returns
    /// * `Ok(None)` - No such id, or the category is soft-deleted
    pub async fn get_category_with_products(
        &mut self,
        id: i64,
    ) -> DbResult<Option<CategoryWithProducts>> {
        let category_sql = format!("{} WHERE id = ?1 AND is_deleted = 0", Category::SELECT_SQL);
        let products_sql = format!(
            "{} WHERE category_id = ?1 AND is_deleted = 0 ORDER BY id",
            Product::SELECT_SQL
        );

        let timeout = self.session.command_timeout();
        let conn = self.session.connection().await?;
        let category = bounded(
            timeout,
            sqlx::query_as::<_, Category>(&category_sql)
                .bind(id)
                .fetch_optional(&mut *conn),
        )
        .await?;

        let Some(category) = category else {
            debug!(id, "Category not found or deleted");
            return Ok(None);
        };

        let products = bounded(
            timeout,
            sqlx::query_as::<_, Product>(&products_sql)
                .bind(id)
                .fetch_all(&mut *conn),
        )
        .await?;

        Ok(Some(CategoryWithProducts { category, products }))
    }
}

#[cfg(test)]
mod tests {
    use catalog_core::{Category, Money, Product};

    use crate::{Database, DbConfig};

    #[tokio::test]
    async fn test_with_products_excludes_deleted_rows() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let mut uow = db.unit_of_work().await.unwrap();

        uow.categories().add_range(vec![
            Category::new("Beverages", "Drinks"),
            Category::new("Snacks", "Crunchy"),
            Category::new("Seasonal", "Limited"),
        ]);
        uow.save().await.unwrap();

        uow.products().add_range(vec![
            Product::new("Cola", "Fizzy", Money::from_cents(150), 10, 1),
            Product::new("Lemonade", "Sour", Money::from_cents(175), 4, 1),
            Product::new("Chips", "Salted", Money::from_cents(199), 5, 2),
        ]);
        uow.save().await.unwrap();

        let mut lemonade = uow.products().get_by_id(2).await.unwrap().unwrap();
        uow.products().soft_delete(&mut lemonade);
        let mut seasonal = uow.categories().get_by_id(3).await.unwrap().unwrap();
        uow.categories().soft_delete(&mut seasonal);
        uow.save().await.unwrap();

        let all = uow.categories().get_categories_with_products().await.unwrap();
        let summary: Vec<_> = all
            .iter()
            .map(|c| (c.category.name.as_str(), c.product_count()))
            .collect();
        assert_eq!(summary, vec![("Beverages", 1), ("Snacks", 1)]);

        let beverages = uow
            .categories()
            .get_category_with_products(1)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(beverages.products[0].name, "Cola");

        assert!(uow
            .categories()
            .get_category_with_products(3)
            .await
            .unwrap()
            .is_none());
        assert!(uow
            .categories()
            .get_category_with_products(42)
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_empty_category_has_zero_products() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let mut uow = db.unit_of_work().await.unwrap();

        let pending = uow.categories().add(Category::new("Frozen", "Cold"));
        uow.save().await.unwrap();
        let id = uow.assigned_id(pending).unwrap();

        let frozen = uow
            .categories()
            .get_category_with_products(id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(frozen.product_count(), 0);
    }
}
