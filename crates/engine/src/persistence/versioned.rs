use std::fmt::Debug;

use hearth_core::model::{SoftDeletable, VersionInfo, VersionSnapshot, Versioned};
use hearth_core::{Key, Timestamp, VersionKey};
use hearth_storage::mapper::VersionChainMapping;
use hearth_storage::{RowMapping, TableRow, sqlite, tables};

use super::{base, identified};
use crate::context::DataContext;
use crate::error::EngineError;

/// Staged writes see only faulted-in chains locally, so the staged store
/// also checks the primary.
fn chained(ctx: &DataContext<'_>, version: VersionKey) -> Result<bool, EngineError> {
    if let Some(store) = ctx.staged_store() {
        return Ok(store.version_in_use(version)?);
    }
    let exists = ctx
        .conn()
        .prepare_cached("SELECT EXISTS(SELECT 1 FROM version_chain WHERE version_key = ?1)")?
        .query_row([version.as_bytes().as_slice()], |r| r.get::<_, bool>(0))?;
    Ok(exists)
}

/// A caller-supplied version key survives only if no chain uses it yet.
fn fresh_or_minted(
    ctx: &DataContext<'_>,
    supplied: Option<VersionKey>,
    stored: Option<VersionKey>,
) -> Result<VersionKey, EngineError> {
    match VersionKey::present(supplied) {
        Some(v) if Some(v) != stored && !chained(ctx, v)? => Ok(v),
        _ => Ok(VersionKey::new()),
    }
}

pub fn mint_first<T: Versioned>(ctx: &DataContext<'_>, model: &mut T) -> Result<(), EngineError> {
    let version_key = fresh_or_minted(ctx, model.version().version_key, None)?;
    *model.version_mut() = VersionInfo {
        version_key: Some(version_key),
        version_sequence: Some(1),
        previous_version_key: None,
        superseded: None,
    };
    Ok(())
}

/// Chains a new version after the one stored in `existing`, keeping the
/// superseded version's metadata on the model.
pub fn mint_next<T: Versioned>(
    ctx: &DataContext<'_>,
    model: &mut T,
    existing: &TableRow,
) -> Result<(), EngineError> {
    let stored = existing.version("version_key")?;
    let sequence = existing.int("version_sequence").unwrap_or(0) + 1;
    let version_key = fresh_or_minted(ctx, model.version().version_key, stored)?;
    let superseded = match stored {
        Some(v) => Some(snapshot(ctx, v, existing)?),
        None => None,
    };
    *model.version_mut() = VersionInfo {
        version_key: Some(version_key),
        version_sequence: Some(sequence),
        previous_version_key: stored,
        superseded,
    };
    Ok(())
}

fn snapshot(
    ctx: &DataContext<'_>,
    version: VersionKey,
    existing: &TableRow,
) -> Result<VersionSnapshot, EngineError> {
    let chain_key = Key::from_bytes(*version.as_bytes());
    if let Some(row) = sqlite::load_row(ctx.conn(), &tables::VERSION_CHAIN, chain_key)? {
        return Ok(VersionChainMapping::from_row(&row)?);
    }
    Ok(VersionSnapshot {
        version_key: version,
        version_sequence: existing.int("version_sequence").unwrap_or(1),
        previous_version_key: existing.version("previous_version_key")?,
        created_by: existing.key("created_by")?,
        creation_time: existing.time("creation_time"),
    })
}

fn record<T: Versioned>(
    ctx: &DataContext<'_>,
    key: Key,
    model: &T,
    author: Option<Key>,
    at: Option<Timestamp>,
) -> Result<(), EngineError> {
    let version = model.version();
    let Some(version_key) = version.version_key else {
        return Ok(());
    };
    let link = VersionSnapshot {
        version_key,
        version_sequence: version.version_sequence.unwrap_or(1),
        previous_version_key: version.previous_version_key,
        created_by: author,
        creation_time: Some(at.unwrap_or_else(|| ctx.now())),
    };
    sqlite::insert_row(ctx.conn(), &VersionChainMapping::to_row(key, &link)?)?;
    Ok(())
}

pub fn insert<M>(ctx: &DataContext<'_>, model: &mut M::Model) -> Result<TableRow, EngineError>
where
    M: RowMapping,
    M::Model: Versioned + Debug,
{
    mint_first(ctx, model)?;
    let row = base::insert::<M>(ctx, model)?;
    let key = identified::assign_key(model);
    let meta = model.meta().clone();
    record(ctx, key, model, meta.created_by, meta.creation_time)?;
    Ok(row)
}

pub fn update<M>(
    ctx: &DataContext<'_>,
    model: &mut M::Model,
    existing: &TableRow,
) -> Result<TableRow, EngineError>
where
    M: RowMapping,
    M::Model: Versioned + Debug,
{
    mint_next(ctx, model, existing)?;
    let merged = base::update::<M>(ctx, model, existing)?;
    let key = identified::assign_key(model);
    record(ctx, key, model, ctx.principal(), None)?;
    Ok(merged)
}

pub fn obsolete<M>(
    ctx: &DataContext<'_>,
    model: &mut M::Model,
    existing: &TableRow,
) -> Result<TableRow, EngineError>
where
    M: RowMapping,
    M::Model: Versioned + Debug,
{
    mint_next(ctx, model, existing)?;
    let merged = base::obsolete::<M>(ctx, model, existing)?;
    let key = identified::assign_key(model);
    let meta = model.meta().clone();
    record(ctx, key, model, meta.obsoleted_by, meta.obsoletion_time)?;
    Ok(merged)
}

/// Every version of `key`, oldest first.
pub fn chain(ctx: &DataContext<'_>, key: Key) -> Result<Vec<VersionSnapshot>, EngineError> {
    ctx.fault_in(key)?;
    let mut links = sqlite::load_where(ctx.conn(), &tables::VERSION_CHAIN, "record_key", key)?
        .iter()
        .map(VersionChainMapping::from_row)
        .collect::<Result<Vec<_>, _>>()?;
    links.sort_by_key(|v| v.version_sequence);
    Ok(links)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::tests::services;
    use hearth_core::model::Concept;
    use hearth_storage::SqliteStore;
    use hearth_storage::mapper::ConceptMapping;

    #[test]
    fn two_updates_chain_monotonically() {
        let store = SqliteStore::open_in_memory().unwrap();
        let services = services();
        let ctx = DataContext::new(store.conn(), &services);

        let mut concept = Concept::new("Male");
        insert::<ConceptMapping>(&ctx, &mut concept).unwrap();
        let key = concept.key.unwrap();
        let v1 = concept.version.version_key.unwrap();
        assert_eq!(concept.version.version_sequence, Some(1));

        let existing = identified::load_existing::<ConceptMapping>(&ctx, key).unwrap();
        update::<ConceptMapping>(&ctx, &mut concept, &existing).unwrap();
        let v2 = concept.version.version_key.unwrap();
        assert_ne!(v1, v2);
        assert_eq!(concept.version.previous_version_key, Some(v1));
        assert_eq!(concept.version.version_sequence, Some(2));
        assert_eq!(concept.version.superseded.as_ref().map(|s| s.version_key), Some(v1));

        let existing = identified::load_existing::<ConceptMapping>(&ctx, key).unwrap();
        update::<ConceptMapping>(&ctx, &mut concept, &existing).unwrap();
        assert_eq!(concept.version.previous_version_key, Some(v2));
        assert_eq!(concept.version.version_sequence, Some(3));

        let links = chain(&ctx, key).unwrap();
        assert_eq!(links.iter().map(|l| l.version_sequence).collect::<Vec<_>>(), vec![1, 2, 3]);
        assert_eq!(links[1].previous_version_key, Some(v1));
    }

    #[test]
    fn reused_version_key_is_replaced() {
        let store = SqliteStore::open_in_memory().unwrap();
        let services = services();
        let ctx = DataContext::new(store.conn(), &services);

        let mut first = Concept::new("A");
        insert::<ConceptMapping>(&ctx, &mut first).unwrap();
        let taken = first.version.version_key;

        let mut second = Concept::new("B");
        second.version.version_key = taken;
        insert::<ConceptMapping>(&ctx, &mut second).unwrap();
        assert_ne!(second.version.version_key, taken);

        let fresh = VersionKey::new();
        let mut third = Concept::new("C");
        third.version.version_key = Some(fresh);
        insert::<ConceptMapping>(&ctx, &mut third).unwrap();
        assert_eq!(third.version.version_key, Some(fresh));
    }
}
