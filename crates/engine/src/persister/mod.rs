mod act;
mod concept;
mod entity;
mod security;

pub use act::ActPersister;
pub use concept::{ConceptPersister, ConceptSetPersister};
pub use entity::EntityPersister;
pub use security::{SecurityRolePersister, SecurityUserPersister};

use std::fmt::Debug;

use hearth_core::model::{Association, Identified, RecordMeta, SoftDeletable};
use hearth_core::{Key, ModelType, QueryId};
use hearth_storage::{Predicate, QueryOptions, RowMapping, TableMap, TableRow};

use crate::cache::LoadDepth;
use crate::context::DataContext;
use crate::error::EngineError;
use crate::persistence::{base, identified};
use crate::query::{self, KeyQuery, QueryResult};
use crate::reconcile::{AssociationStore, RowStore, reconcile};

pub trait Persister {
    type Model: Identified + Clone + Debug + Send + Sync + 'static;

    fn model_type(&self) -> ModelType;

    /// The most-derived table queries run against.
    fn query_table(&self) -> &'static TableMap;

    fn insert(&self, ctx: &DataContext<'_>, model: Self::Model) -> Result<Self::Model, EngineError>;

    fn update(&self, ctx: &DataContext<'_>, model: Self::Model) -> Result<Self::Model, EngineError>;

    /// Soft-deletes. Obsoleting an obsolete record returns it unchanged.
    fn obsolete(&self, ctx: &DataContext<'_>, model: Self::Model) -> Result<Self::Model, EngineError>;

    /// `None` when no row exists under `key`.
    fn load(
        &self,
        ctx: &DataContext<'_>,
        key: Key,
        depth: LoadDepth,
    ) -> Result<Option<Self::Model>, EngineError>;

    fn get(&self, ctx: &DataContext<'_>, key: Key) -> Result<Self::Model, EngineError> {
        self.load(ctx, key, LoadDepth::Full)?
            .ok_or_else(|| EngineError::not_found(self.model_type().name(), key))
    }

    fn exists(&self, ctx: &DataContext<'_>, key: Key) -> Result<bool, EngineError> {
        identified::exists(ctx, self.query_table().root(), key)
    }

    /// Results are hydrated shallow; `get` deepens them on demand.
    fn query(
        &self,
        ctx: &DataContext<'_>,
        predicate: &Predicate,
        options: &QueryOptions,
        query_id: Option<QueryId>,
    ) -> Result<QueryResult<Self::Model>, EngineError> {
        let statements = KeyQuery::typed(self.query_table(), predicate, options)?;
        let (keys, total) = query::execute(ctx, statements, options, query_id)?;
        hydrate_page(self, ctx, keys, total, query_id)
    }
}

pub(crate) fn hydrate_page<P: Persister + ?Sized>(
    persister: &P,
    ctx: &DataContext<'_>,
    keys: Vec<Key>,
    total: usize,
    query_id: Option<QueryId>,
) -> Result<QueryResult<P::Model>, EngineError> {
    let mut results = Vec::with_capacity(keys.len());
    for key in keys {
        if let Some(model) = persister.load(ctx, key, LoadDepth::Shallow)? {
            results.push(model);
        }
    }
    Ok(QueryResult {
        results,
        total,
        query_id,
    })
}

/// Saves a referenced record that is not stored yet and returns its key.
/// The saved instance replaces `model`.
pub fn ensure_exists<P: Persister>(
    ctx: &DataContext<'_>,
    persister: &P,
    model: &mut P::Model,
) -> Result<Key, EngineError> {
    if let Some(key) = model.key() {
        if persister.exists(ctx, key)? {
            return Ok(key);
        }
    }
    let saved = persister.insert(ctx, model.clone())?;
    let key = saved
        .key()
        .ok_or_else(|| EngineError::not_found(persister.model_type().name(), "unsaved"))?;
    *model = saved;
    Ok(key)
}

/// The key an update or obsolete acts on.
pub(crate) fn required_key<T: Identified>(model: &T, model_type: ModelType) -> Result<Key, EngineError> {
    model.key().ok_or_else(|| EngineError::MissingRequiredField {
        field: "key".into(),
        model: model_type.name().into(),
    })
}

/// Reconciles one stored collection of `parent` and returns it keyed.
pub(crate) fn sync<M>(
    ctx: &DataContext<'_>,
    parent: Key,
    desired: Vec<M::Model>,
) -> Result<Vec<M::Model>, EngineError>
where
    M: RowMapping,
    M::Model: Association,
{
    Ok(reconcile(ctx, &RowStore::<M>::new(), parent, desired)?.result)
}

/// Reconciles a collection whose items own component rows, then each
/// item's components. Components of removed items go with them.
pub(crate) fn sync_with_components<P, C>(
    ctx: &DataContext<'_>,
    root: Key,
    desired: Vec<P::Model>,
    components: fn(&mut P::Model) -> &mut Vec<C::Model>,
) -> Result<Vec<P::Model>, EngineError>
where
    P: RowMapping,
    P::Model: Association,
    C: RowMapping,
    C::Model: Association,
{
    let plan = reconcile(ctx, &RowStore::<P>::new(), root, desired)?;
    let store = RowStore::<C>::components(root);
    for removed in &plan.obsolete {
        if let Some(key) = removed.key() {
            reconcile(ctx, &store, key, Vec::new())?;
        }
    }
    let mut result = plan.result;
    for item in &mut result {
        let Some(key) = item.key() else { continue };
        let parts = std::mem::take(components(item));
        *components(item) = reconcile(ctx, &store, key, parts)?.result;
    }
    Ok(result)
}

pub(crate) fn fetch<M>(ctx: &DataContext<'_>, parent: Key) -> Result<Vec<M::Model>, EngineError>
where
    M: RowMapping,
    M::Model: Association,
{
    RowStore::<M>::new().load(ctx, parent)
}

pub(crate) fn fetch_with_components<P, C>(
    ctx: &DataContext<'_>,
    root: Key,
    components: fn(&mut P::Model) -> &mut Vec<C::Model>,
    sequence: fn(&C::Model) -> i64,
) -> Result<Vec<P::Model>, EngineError>
where
    P: RowMapping,
    P::Model: Association,
    C: RowMapping,
    C::Model: Association,
{
    let store = RowStore::<C>::components(root);
    let mut items = fetch::<P>(ctx, root)?;
    for item in &mut items {
        let Some(key) = item.key() else { continue };
        let mut parts = store.load(ctx, key)?;
        parts.sort_by_key(sequence);
        *components(item) = parts;
    }
    Ok(items)
}

/// Stamps the stored record obsolete with the incoming obsoletion fields.
/// `None` when it already was.
pub(crate) fn obsolete_stored<M>(
    ctx: &DataContext<'_>,
    key: Key,
    incoming: &RecordMeta,
    write: impl FnOnce(&DataContext<'_>, &mut M::Model, &TableRow) -> Result<TableRow, EngineError>,
) -> Result<Option<M::Model>, EngineError>
where
    M: RowMapping,
    M::Model: SoftDeletable,
{
    let existing = identified::load_existing::<M>(ctx, key)?;
    if base::is_obsolete(&existing) {
        log::debug!("event=obsolete_noop module=persister table={} key={key}", M::table().name);
        return Ok(None);
    }
    let mut current = M::from_row(&existing)?;
    let meta = current.meta_mut();
    meta.obsoleted_by = incoming.obsoleted_by;
    meta.obsoletion_time = incoming.obsoletion_time;
    write(ctx, &mut current, &existing)?;
    Ok(Some(current))
}
