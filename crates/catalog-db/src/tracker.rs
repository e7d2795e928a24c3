//! # Change Tracker
//!
//! Holds the writes staged through repositories until the unit of work
//! flushes them.
//!
//! ```text
//! categories().add(beverages)   ──► [Insert#0 Category]
//! products().add(cola)          ──► [Insert#0 Category, Insert#1 Product]
//! products().update(&chips)     ──► [..., Update Product(3)]
//! products().update(&chips')    ──► [..., Update Product(3)']   (replaced)
//!
//! save() ──► flush in order ──► ok:  clear(), record ids
//!                           └─► err: keep everything staged
//! ```

use std::collections::HashMap;
use std::fmt;
use std::marker::PhantomData;

use catalog_core::{Category, Product};

use crate::repository::entity::Entity;

/// One staged write for a single entity type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Change<E> {
    /// Insert; `seq` identifies the [`Pending`] ticket handed to the caller.
    Insert { seq: u64, entity: E },
    /// Overwrite the row with this id using the entity's current state.
    Update(E),
    /// Physically remove the row with this id.
    Delete(E),
}

/// A staged write for either entity type, in staging order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StagedChange {
    Category(Change<Category>),
    Product(Change<Product>),
}

/// Ticket for a staged insert.
///
/// The store assigns ids at save time, so `add` cannot return one.
/// Resolve the ticket with [`UnitOfWork::assigned_id`](crate::UnitOfWork::assigned_id)
/// once the save has succeeded.
pub struct Pending<E> {
    seq: u64,
    _entity: PhantomData<fn() -> E>,
}

impl<E> Pending<E> {
    pub(crate) fn new(seq: u64) -> Self {
        Pending {
            seq,
            _entity: PhantomData,
        }
    }

    pub(crate) fn seq(&self) -> u64 {
        self.seq
    }
}

impl<E> Clone for Pending<E> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<E> Copy for Pending<E> {}

impl<E> fmt::Debug for Pending<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Pending").field(&self.seq).finish()
    }
}

/// Staged writes plus the ids the store handed back for earlier inserts.
#[derive(Debug, Default)]
pub struct ChangeTracker {
    next_seq: u64,
    changes: Vec<StagedChange>,
    /// Ids from saves that are durable.
    assigned: HashMap<u64, i64>,
    /// Ids from saves inside an open transaction; dropped on rollback.
    provisional: HashMap<u64, i64>,
}

impl ChangeTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stages an insert and returns its ticket.
    pub fn stage_insert<E: Entity>(&mut self, entity: E) -> Pending<E> {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.changes.push(E::stage(Change::Insert { seq, entity }));
        Pending::new(seq)
    }

    /// Stages an update. Updates of the same row are kept separately and
    /// applied in staging order.
    pub fn stage_update<E: Entity>(&mut self, entity: E) {
        self.changes.push(E::stage(Change::Update(entity)));
    }

    /// Stages a physical delete.
    pub fn stage_delete<E: Entity>(&mut self, entity: E) {
        self.changes.push(E::stage(Change::Delete(entity)));
    }

    pub fn changes(&self) -> &[StagedChange] {
        &self.changes
    }

    pub fn has_changes(&self) -> bool {
        !self.changes.is_empty()
    }

    /// Drops every staged change. Ids already assigned are kept.
    pub fn clear(&mut self) {
        self.changes.clear();
    }

    /// Records ids returned by a durable save.
    pub fn record_assigned(&mut self, ids: impl IntoIterator<Item = (u64, i64)>) {
        self.assigned.extend(ids);
    }

    /// Records ids returned by a save inside an open transaction.
    pub fn record_provisional(&mut self, ids: impl IntoIterator<Item = (u64, i64)>) {
        self.provisional.extend(ids);
    }

    /// The enclosing transaction committed; provisional ids are now durable.
    pub fn promote_provisional(&mut self) {
        let provisional = std::mem::take(&mut self.provisional);
        self.assigned.extend(provisional);
    }

    /// The enclosing transaction rolled back; its ids never existed.
    pub fn forget_provisional(&mut self) {
        self.provisional.clear();
    }

    pub fn assigned_id<E>(&self, pending: Pending<E>) -> Option<i64> {
        let seq = pending.seq();
        self.assigned
            .get(&seq)
            .or_else(|| self.provisional.get(&seq))
            .copied()
    }
}
