//! # Generic Repository
//!
//! CRUD over one entity table, shared by every entity type.
//!
//! ## Reads vs Writes
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Reads  (get_by_id, get_all, find, count, any ...)                      │
//! │     └── run now on the unit of work's connection                        │
//! │                                                                         │
//! │  Writes (add, update, delete, soft_delete ...)                          │
//! │     └── staged in the change tracker; nothing reaches the store        │
//! │         until UnitOfWork::save()                                       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Reads do not filter soft-deleted rows. Pass a predicate on
//! `is_deleted` to exclude them, or use the relationship fetches on the
//! specialized repositories.

use std::marker::PhantomData;

use catalog_core::SoftDelete;
use sqlx::{QueryBuilder, Sqlite};
use tracing::debug;

use crate::error::DbResult;
use crate::repository::entity::Entity;
use crate::repository::predicate::Predicate;
use crate::session::{bounded, Session};
use crate::tracker::Pending;

/// Repository over the entity type `E`.
///
/// Borrowed from a [`UnitOfWork`](crate::UnitOfWork); every handle onto the
/// same unit of work shares its connection and change tracker.
pub struct Repository<'a, E: Entity> {
    pub(crate) session: &'a mut Session,
    _entity: PhantomData<E>,
}

impl<'a, E: Entity> Repository<'a, E> {
    pub(crate) fn new(session: &'a mut Session) -> Self {
        Repository {
            session,
            _entity: PhantomData,
        }
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// Gets an entity by its primary key, soft-deleted or not.
    ///
    /// ## Returns
    /// * `Ok(Some(E))` - Row found
    /// * `Ok(None)` - No such id
    pub async fn get_by_id(&mut self, id: i64) -> DbResult<Option<E>> {
        debug!(entity = E::NAME, id, "Fetching by id");

        let sql = format!("{} WHERE id = ?1", E::SELECT_SQL);
        let timeout = self.session.command_timeout();
        let conn = self.session.connection().await?;

        bounded(timeout, sqlx::query_as::<_, E>(&sql).bind(id).fetch_optional(conn)).await
    }

    /// Gets every row in id order.
    pub async fn get_all(&mut self) -> DbResult<Vec<E>> {
        let sql = format!("{} ORDER BY id", E::SELECT_SQL);
        let timeout = self.session.command_timeout();
        let conn = self.session.connection().await?;

        let rows = bounded(timeout, sqlx::query_as::<_, E>(&sql).fetch_all(conn)).await?;
        debug!(entity = E::NAME, count = rows.len(), "Fetched all");
        Ok(rows)
    }

    /// Gets every row matching `predicate`, in id order.
    pub async fn find(&mut self, predicate: &Predicate<E::Column>) -> DbResult<Vec<E>> {
        let mut qb = QueryBuilder::<Sqlite>::new(E::SELECT_SQL);
        qb.push(" WHERE ");
        predicate.push_sql(&mut qb);
        qb.push(" ORDER BY id");

        let timeout = self.session.command_timeout();
        let conn = self.session.connection().await?;
        let rows = bounded(timeout, qb.build_query_as::<E>().fetch_all(conn)).await?;

        debug!(entity = E::NAME, count = rows.len(), "Find returned rows");
        Ok(rows)
    }

    /// Gets the lowest-id row matching `predicate`, if any.
    pub async fn first_or_default(
        &mut self,
        predicate: &Predicate<E::Column>,
    ) -> DbResult<Option<E>> {
        let mut qb = QueryBuilder::<Sqlite>::new(E::SELECT_SQL);
        qb.push(" WHERE ");
        predicate.push_sql(&mut qb);
        qb.push(" ORDER BY id LIMIT 1");

        let timeout = self.session.command_timeout();
        let conn = self.session.connection().await?;
        bounded(timeout, qb.build_query_as::<E>().fetch_optional(conn)).await
    }

    // =========================================================================
    // Aggregates
    // =========================================================================

    /// Counts every row.
    pub async fn count(&mut self) -> DbResult<i64> {
        let sql = format!("SELECT COUNT(*) FROM {}", E::TABLE);
        let timeout = self.session.command_timeout();
        let conn = self.session.connection().await?;

        bounded(timeout, sqlx::query_scalar::<_, i64>(&sql).fetch_one(conn)).await
    }

    /// Counts rows matching `predicate`.
    pub async fn count_where(&mut self, predicate: &Predicate<E::Column>) -> DbResult<i64> {
        let mut qb = QueryBuilder::<Sqlite>::new(format!("SELECT COUNT(*) FROM {} WHERE ", E::TABLE));
        predicate.push_sql(&mut qb);

        let timeout = self.session.command_timeout();
        let conn = self.session.connection().await?;
        bounded(timeout, qb.build_query_scalar::<i64>().fetch_one(conn)).await
    }

    /// True if any row matches `predicate`.
    pub async fn any(&mut self, predicate: &Predicate<E::Column>) -> DbResult<bool> {
        let mut qb =
            QueryBuilder::<Sqlite>::new(format!("SELECT EXISTS (SELECT 1 FROM {} WHERE ", E::TABLE));
        predicate.push_sql(&mut qb);
        qb.push(")");

        let timeout = self.session.command_timeout();
        let conn = self.session.connection().await?;
        let exists = bounded(timeout, qb.build_query_scalar::<i64>().fetch_one(conn)).await?;
        Ok(exists != 0)
    }

    // =========================================================================
    // Staged Writes
    // =========================================================================

    /// Stages an insert. The store assigns the id when the unit of work
    /// saves; resolve the returned ticket with
    /// [`UnitOfWork::assigned_id`](crate::UnitOfWork::assigned_id).
    pub fn add(&mut self, entity: E) -> Pending<E> {
        debug!(entity = E::NAME, session = %self.session.id(), "Staging insert");
        self.session.tracker.stage_insert(entity)
    }

    /// Stages several inserts, in order.
    pub fn add_range(&mut self, entities: impl IntoIterator<Item = E>) -> Vec<Pending<E>> {
        entities.into_iter().map(|e| self.add(e)).collect()
    }

    /// Stages the entity's current state as an update of its row.
    pub fn update(&mut self, entity: &E) {
        debug!(entity = E::NAME, id = entity.id(), session = %self.session.id(), "Staging update");
        self.session.tracker.stage_update(entity.clone());
    }

    /// Stages several updates, in order.
    pub fn update_range<'e>(&mut self, entities: impl IntoIterator<Item = &'e E>) {
        for entity in entities {
            self.update(entity);
        }
    }

    /// Stages physical removal of the entity's row.
    pub fn delete(&mut self, entity: &E) {
        debug!(entity = E::NAME, id = entity.id(), session = %self.session.id(), "Staging delete");
        self.session.tracker.stage_delete(entity.clone());
    }

    /// Stages several deletes, in order.
    pub fn delete_range<'e>(&mut self, entities: impl IntoIterator<Item = &'e E>) {
        for entity in entities {
            self.delete(entity);
        }
    }
}

impl<E: Entity + SoftDelete> Repository<'_, E> {
    /// Flags the entity as deleted and stages the update.
    pub fn soft_delete(&mut self, entity: &mut E) {
        entity.mark_deleted();
        self.update(entity);
    }
}

#[cfg(test)]
mod tests {
    use catalog_core::{Category, Money, Product};

    use crate::repository::entity::{CategoryColumn, ProductColumn};
    use crate::repository::predicate::Predicate;
    use crate::{Database, DbConfig};

    async fn seeded() -> Database {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let mut uow = db.unit_of_work().await.unwrap();
        uow.categories().add(Category::new("Beverages", "Drinks"));
        uow.categories().add(Category::new("Snacks", "Crunchy"));
        uow.save().await.unwrap();
        uow.products().add_range(vec![
            Product::new("Cola", "Fizzy", Money::from_cents(150), 10, 1),
            Product::new("Water", "Still", Money::from_cents(90), 0, 1),
            Product::new("Chips", "Salted", Money::from_cents(199), 5, 2),
        ]);
        uow.save().await.unwrap();
        db
    }

    #[tokio::test]
    async fn test_get_by_id_and_get_all() {
        let db = seeded().await;
        let mut uow = db.unit_of_work().await.unwrap();

        let cola = uow.products().get_by_id(1).await.unwrap().unwrap();
        assert_eq!(cola.name, "Cola");
        assert!(uow.products().get_by_id(99).await.unwrap().is_none());

        let names: Vec<_> = uow
            .categories()
            .get_all()
            .await
            .unwrap()
            .into_iter()
            .map(|c| c.name)
            .collect();
        assert_eq!(names, vec!["Beverages", "Snacks"]);
    }

    #[tokio::test]
    async fn test_find_and_first_or_default() {
        let db = seeded().await;
        let mut uow = db.unit_of_work().await.unwrap();
        let mut products = uow.products();

        let in_stock = products
            .find(&Predicate::and(vec![
                Predicate::eq(ProductColumn::CategoryId, 1),
                Predicate::gt(ProductColumn::Stock, 0),
            ]))
            .await
            .unwrap();
        assert_eq!(in_stock.len(), 1);
        assert_eq!(in_stock[0].name, "Cola");

        let first = products
            .first_or_default(&Predicate::like(ProductColumn::Name, "%a%"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(first.name, "Cola");

        let none = products
            .first_or_default(&Predicate::eq(ProductColumn::Name, "Tea"))
            .await
            .unwrap();
        assert!(none.is_none());
    }

    #[tokio::test]
    async fn test_aggregates() {
        let db = seeded().await;
        let mut uow = db.unit_of_work().await.unwrap();

        assert_eq!(uow.products().count().await.unwrap(), 3);
        assert_eq!(
            uow.products()
                .count_where(&Predicate::eq(ProductColumn::CategoryId, 1))
                .await
                .unwrap(),
            2
        );
        assert!(uow
            .categories()
            .any(&Predicate::eq(CategoryColumn::Name, "Snacks"))
            .await
            .unwrap());
        assert!(!uow
            .categories()
            .any(&Predicate::eq(CategoryColumn::Name, "Frozen"))
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_staging_does_not_touch_store() {
        let db = seeded().await;
        let mut uow = db.unit_of_work().await.unwrap();

        uow.categories().add(Category::new("Frozen", "Cold"));
        assert!(uow.has_pending_changes());
        assert_eq!(uow.categories().count().await.unwrap(), 2);

        uow.discard_changes();
        assert_eq!(uow.save().await.unwrap(), 0);
        assert_eq!(uow.categories().count().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_soft_delete_keeps_row() {
        let db = seeded().await;
        let mut uow = db.unit_of_work().await.unwrap();

        let mut water = uow.products().get_by_id(2).await.unwrap().unwrap();
        uow.products().soft_delete(&mut water);
        assert!(water.is_deleted);
        uow.save().await.unwrap();

        assert_eq!(uow.products().count().await.unwrap(), 3);
        let stored = uow.products().get_by_id(2).await.unwrap().unwrap();
        assert!(stored.is_deleted);
        assert!(stored.updated_at.is_some());
    }

    #[tokio::test]
    async fn test_delete_range_removes_rows() {
        let db = seeded().await;
        let mut uow = db.unit_of_work().await.unwrap();

        let beverages = uow
            .products()
            .find(&Predicate::eq(ProductColumn::CategoryId, 1))
            .await
            .unwrap();
        uow.products().delete_range(&beverages);
        assert_eq!(uow.save().await.unwrap(), 2);
        assert_eq!(uow.products().count().await.unwrap(), 1);
    }
}
