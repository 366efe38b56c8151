use std::collections::HashSet;
use std::marker::PhantomData;

use hearth_core::Key;
use hearth_core::model::{Association, Identified};
use hearth_storage::{RowMapping, TableRole, TableRow, sqlite};

use crate::context::DataContext;
use crate::error::EngineError;

#[derive(Debug, Clone, PartialEq)]
pub struct ReconcilePlan<T> {
    pub obsolete: Vec<T>,
    pub update: Vec<T>,
    pub insert: Vec<T>,
    /// Every surviving desired item, keyed, in desired order.
    pub result: Vec<T>,
}

/// Drops empty items, defaults their source to `parent` and adopts the key
/// of a stored item the identity rule matches. Stored keys no longer desired
/// are removed, stored keys whose value changed are updated and the rest are
/// inserted.
pub fn plan<T: Association>(existing: &[T], desired: Vec<T>, parent: Key) -> ReconcilePlan<T> {
    let mut desired: Vec<T> = desired.into_iter().filter(|d| !d.is_empty()).collect();
    for item in &mut desired {
        if item.source_key().is_none() {
            item.set_source_key(parent);
        }
    }

    let mut claimed: HashSet<Key> = desired.iter().filter_map(|d| d.key()).collect();
    for item in desired.iter_mut().filter(|d| d.key().is_none()) {
        let adopted = existing
            .iter()
            .filter_map(|e| e.key().map(|k| (k, e)))
            .find(|(k, e)| !claimed.contains(k) && item.identity_matches(e));
        if let Some((key, _)) = adopted {
            item.set_key(key);
            claimed.insert(key);
        }
    }

    let obsolete = existing
        .iter()
        .filter(|e| e.key().is_none_or(|k| !claimed.contains(&k)))
        .cloned()
        .collect();

    let mut update = Vec::new();
    let mut insert = Vec::new();
    for item in &mut desired {
        let stored = item
            .key()
            .and_then(|k| existing.iter().find(|e| e.key() == Some(k)));
        match stored {
            Some(stored) => {
                if item.value_changed(stored) {
                    update.push(item.clone());
                }
            }
            None => {
                if item.key().is_none() {
                    item.set_key(Key::new());
                }
                insert.push(item.clone());
            }
        }
    }

    ReconcilePlan {
        obsolete,
        update,
        insert,
        result: desired,
    }
}

/// Where one association collection is stored.
pub trait AssociationStore<T: Association> {
    fn load(&self, ctx: &DataContext<'_>, parent: Key) -> Result<Vec<T>, EngineError>;
    fn remove(&self, ctx: &DataContext<'_>, parent: Key, item: &T) -> Result<(), EngineError>;
    fn update(&self, ctx: &DataContext<'_>, item: &T) -> Result<(), EngineError>;
    fn insert(&self, ctx: &DataContext<'_>, item: &T) -> Result<(), EngineError>;
}

/// An association table read and written through its row mapping.
/// Component tables also carry the owning record's key in `root_key`.
pub struct RowStore<M> {
    root: Option<Key>,
    mapping: PhantomData<fn() -> M>,
}

impl<M> RowStore<M> {
    pub fn new() -> Self {
        Self {
            root: None,
            mapping: PhantomData,
        }
    }

    pub fn components(root: Key) -> Self {
        Self {
            root: Some(root),
            mapping: PhantomData,
        }
    }
}

impl<M> Default for RowStore<M> {
    fn default() -> Self {
        Self::new()
    }
}

impl<M> RowStore<M>
where
    M: RowMapping,
    M::Model: Association,
{
    fn row(&self, item: &M::Model) -> Result<TableRow, EngineError> {
        let key = item.key().ok_or_else(|| {
            EngineError::Storage(hearth_storage::StorageError::Serialization(format!(
                "{} row without key",
                M::table().name
            )))
        })?;
        let mut row = M::to_row(key, item)?;
        if let Some(root) = self.root {
            row.put_key("root_key", Some(root));
        }
        Ok(row)
    }
}

impl<M> AssociationStore<M::Model> for RowStore<M>
where
    M: RowMapping,
    M::Model: Association,
{
    fn load(&self, ctx: &DataContext<'_>, parent: Key) -> Result<Vec<M::Model>, EngineError> {
        sqlite::load_where(ctx.conn(), M::table(), "source_key", parent)?
            .iter()
            .map(|row| M::from_row(row).map_err(EngineError::from))
            .collect()
    }

    fn remove(&self, ctx: &DataContext<'_>, parent: Key, item: &M::Model) -> Result<(), EngineError> {
        if let Some(key) = item.key() {
            sqlite::delete_child_row(ctx.conn(), M::table(), parent, key)?;
        }
        Ok(())
    }

    fn update(&self, ctx: &DataContext<'_>, item: &M::Model) -> Result<(), EngineError> {
        // Link rows are their own identity; there is nothing to update.
        if M::table().role == TableRole::Link {
            return Ok(());
        }
        sqlite::update_row(ctx.conn(), &self.row(item)?)?;
        Ok(())
    }

    fn insert(&self, ctx: &DataContext<'_>, item: &M::Model) -> Result<(), EngineError> {
        sqlite::insert_row(ctx.conn(), &self.row(item)?)?;
        Ok(())
    }
}

/// Plans against the stored collection of `parent` and applies the plan:
/// removals, then updates, then inserts.
pub fn reconcile<T, S>(
    ctx: &DataContext<'_>,
    store: &S,
    parent: Key,
    desired: Vec<T>,
) -> Result<ReconcilePlan<T>, EngineError>
where
    T: Association,
    S: AssociationStore<T>,
{
    let existing = store.load(ctx, parent)?;
    let plan = plan(&existing, desired, parent);
    for item in &plan.obsolete {
        store.remove(ctx, parent, item)?;
    }
    for item in &plan.update {
        store.update(ctx, item)?;
    }
    for item in &plan.insert {
        store.insert(ctx, item)?;
    }
    Ok(plan)
}
