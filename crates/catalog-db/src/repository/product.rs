//! # Product Repository
//!
//! Relationship-aware fetches for products, on top of the generic CRUD.
//!
//! Every fetch here returns [`ProductWithCategory`], whose category is
//! always loaded. Products come back in one query and their categories in
//! a second, joined up in memory.

use std::collections::HashMap;

use catalog_core::{Category, Product, ProductWithCategory};
use sqlx::{QueryBuilder, Sqlite, SqliteConnection};
use tracing::debug;

use crate::error::{DbError, DbResult};
use crate::repository::entity::Entity;
use crate::repository::generic::Repository;
use crate::session::bounded;

/// Repository for products.
pub type ProductRepository<'a> = Repository<'a, Product>;

impl Repository<'_, Product> {
    /// Non-deleted products of one category, each with its category.
    pub async fn get_products_by_category(
        &mut self,
        category_id: i64,
    ) -> DbResult<Vec<ProductWithCategory>> {
        debug!(category_id, "Fetching products by category");

        let sql = format!(
            "{} WHERE category_id = ?1 AND is_deleted = 0 ORDER BY id",
            Product::SELECT_SQL
        );
        let timeout = self.session.command_timeout();
        let conn = self.session.connection().await?;
        let products = bounded(
            timeout,
            sqlx::query_as::<_, Product>(&sql)
                .bind(category_id)
                .fetch_all(&mut *conn),
        )
        .await?;

        attach_categories(conn, timeout, products).await
    }

    /// Every non-deleted product with its category.
    pub async fn get_products_with_category(&mut self) -> DbResult<Vec<ProductWithCategory>> {
        let sql = format!("{} WHERE is_deleted = 0 ORDER BY id", Product::SELECT_SQL);
        let timeout = self.session.command_timeout();
        let conn = self.session.connection().await?;
        let products =
            bounded(timeout, sqlx::query_as::<_, Product>(&sql).fetch_all(&mut *conn)).await?;

        debug!(count = products.len(), "Loaded products with category");
        attach_categories(conn, timeout, products).await
    }

    /// One non-deleted product with its category.
    ///
    /// A soft-deleted product is hidden even when asked for by id; use
    /// `get_by_id` to load it regardless of `is_deleted`.
    ///
    /// ## Returns
    /// * `Ok(None)` - No such id, or the product is soft-deleted
    pub async fn get_product_with_category(
        &mut self,
        id: i64,
    ) -> DbResult<Option<ProductWithCategory>> {
        let sql = format!("{} WHERE id = ?1 AND is_deleted = 0", Product::SELECT_SQL);
        let timeout = self.session.command_timeout();
        let conn = self.session.connection().await?;
        let product = bounded(
            timeout,
            sqlx::query_as::<_, Product>(&sql)
                .bind(id)
                .fetch_optional(&mut *conn),
        )
        .await?;

        match product {
            Some(product) => Ok(attach_categories(conn, timeout, vec![product])
                .await?
                .into_iter()
                .next()),
            None => Ok(None),
        }
    }
}

/// Loads the categories of `products` in one query and pairs them up.
///
/// The category is loaded even if soft-deleted: the product still belongs
/// to it.
async fn attach_categories(
    conn: &mut SqliteConnection,
    timeout: std::time::Duration,
    products: Vec<Product>,
) -> DbResult<Vec<ProductWithCategory>> {
    if products.is_empty() {
        return Ok(Vec::new());
    }

    let mut ids: Vec<i64> = products.iter().map(|p| p.category_id).collect();
    ids.sort_unstable();
    ids.dedup();

    let mut qb = QueryBuilder::<Sqlite>::new(Category::SELECT_SQL);
    qb.push(" WHERE id IN (");
    {
        let mut separated = qb.separated(", ");
        for id in &ids {
            separated.push_bind(*id);
        }
    }
    qb.push(")");

    let categories: HashMap<i64, Category> =
        bounded(timeout, qb.build_query_as::<Category>().fetch_all(conn))
            .await?
            .into_iter()
            .map(|c| (c.id, c))
            .collect();

    products
        .into_iter()
        .map(|product| {
            let category = categories.get(&product.category_id).cloned().ok_or_else(|| {
                DbError::Internal(format!(
                    "product {} references missing category {}",
                    product.id, product.category_id
                ))
            })?;
            Ok::<_, DbError>(ProductWithCategory { product, category })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use catalog_core::{Category, Money, Product};

    use crate::{Database, DbConfig};

    async fn seeded() -> Database {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let mut uow = db.unit_of_work().await.unwrap();
        uow.categories().add_range(vec![
            Category::new("Beverages", "Drinks"),
            Category::new("Snacks", "Crunchy"),
        ]);
        uow.save().await.unwrap();
        uow.products().add_range(vec![
            Product::new("Cola", "Fizzy", Money::from_cents(150), 10, 1),
            Product::new("Chips", "Salted", Money::from_cents(199), 5, 2),
            Product::new("Water", "Still", Money::from_cents(90), 20, 1),
        ]);
        uow.save().await.unwrap();
        db
    }

    #[tokio::test]
    async fn test_products_by_category_carry_their_category() {
        let db = seeded().await;
        let mut uow = db.unit_of_work().await.unwrap();

        let beverages = uow.products().get_products_by_category(1).await.unwrap();
        let names: Vec<_> = beverages.iter().map(|p| p.product.name.as_str()).collect();
        assert_eq!(names, vec!["Cola", "Water"]);
        assert!(beverages.iter().all(|p| p.category.name == "Beverages"));

        assert!(uow.products().get_products_by_category(9).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_products_with_category_skip_deleted() {
        let db = seeded().await;
        let mut uow = db.unit_of_work().await.unwrap();

        let mut water = uow.products().get_by_id(3).await.unwrap().unwrap();
        uow.products().soft_delete(&mut water);
        uow.save().await.unwrap();

        let all = uow.products().get_products_with_category().await.unwrap();
        let pairs: Vec<_> = all
            .iter()
            .map(|p| (p.product.name.as_str(), p.category.name.as_str()))
            .collect();
        assert_eq!(pairs, vec![("Cola", "Beverages"), ("Chips", "Snacks")]);

        assert!(uow.products().get_product_with_category(3).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_product_with_category_reflects_current_category() {
        let db = seeded().await;
        let mut uow = db.unit_of_work().await.unwrap();

        let mut snacks = uow.categories().get_by_id(2).await.unwrap().unwrap();
        snacks.name = "Savoury Snacks".to_string();
        uow.categories().update(&snacks);
        uow.save().await.unwrap();

        let chips = uow.products().get_product_with_category(2).await.unwrap().unwrap();
        assert_eq!(chips.category.id, 2);
        assert_eq!(chips.category.name, "Savoury Snacks");
    }
}
