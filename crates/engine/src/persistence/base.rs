use std::fmt::Debug;

use hearth_core::model::SoftDeletable;
use hearth_storage::{RowMapping, TableRow};

use super::identified;
use crate::context::DataContext;
use crate::error::EngineError;

/// Defaults `created_by` to the acting principal and `creation_time` to now.
pub fn stamp_creation<T: SoftDeletable>(ctx: &DataContext<'_>, model: &mut T) {
    let meta = model.meta_mut();
    if meta.created_by.is_none() {
        meta.created_by = ctx.principal();
    }
    if meta.creation_time.is_none() {
        meta.creation_time = Some(ctx.now());
    }
}

pub fn stamp_obsoletion<T: SoftDeletable>(ctx: &DataContext<'_>, model: &mut T) {
    let meta = model.meta_mut();
    if meta.obsoleted_by.is_none() {
        meta.obsoleted_by = ctx.principal();
    }
    if meta.obsoletion_time.is_none() {
        meta.obsoletion_time = Some(ctx.now());
    }
}

pub fn is_obsolete(row: &TableRow) -> bool {
    !row.is_null("obsoletion_time")
}

pub fn insert<M>(ctx: &DataContext<'_>, model: &mut M::Model) -> Result<TableRow, EngineError>
where
    M: RowMapping,
    M::Model: SoftDeletable + Debug,
{
    stamp_creation(ctx, model);
    identified::insert::<M>(ctx, model)
}

/// Overlays the model's non-null values on `existing`. An obsolete row
/// whose incoming model carries no obsoletion time is undeleted. The
/// model's stamps are refreshed from the merged row.
pub fn update<M>(
    ctx: &DataContext<'_>,
    model: &mut M::Model,
    existing: &TableRow,
) -> Result<TableRow, EngineError>
where
    M: RowMapping,
    M::Model: SoftDeletable + Debug,
{
    let key = identified::assign_key(model);
    let mut merged = existing.merged_with(&M::to_row(key, model)?);
    if is_obsolete(existing) && model.meta().obsoletion_time.is_none() {
        merged.put_key("obsoleted_by", None);
        merged.put_time("obsoletion_time", None);
        log::info!(
            "event=record_undeleted module=persistence table={} key={key}",
            existing.table().name
        );
    }
    identified::write_merged(ctx, &merged, model)?;
    let stored = M::from_row(&merged)?;
    *model.meta_mut() = stored.meta().clone();
    Ok(merged)
}

/// Stamps obsoletion and writes it. Callers check [`is_obsolete`] first;
/// obsoleting twice is their no-op, not an error.
pub fn obsolete<M>(
    ctx: &DataContext<'_>,
    model: &mut M::Model,
    existing: &TableRow,
) -> Result<TableRow, EngineError>
where
    M: RowMapping,
    M::Model: SoftDeletable + Debug,
{
    stamp_obsoletion(ctx, model);
    let key = identified::assign_key(model);
    let merged = existing.merged_with(&M::to_row(key, model)?);
    identified::write_merged(ctx, &merged, model)?;
    Ok(merged)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::tests::services;
    use hearth_core::Key;
    use hearth_core::model::SecurityRole;
    use hearth_storage::SqliteStore;
    use hearth_storage::mapper::SecurityRoleMapping;

    fn role(name: &str) -> SecurityRole {
        SecurityRole {
            name: Some(name.into()),
            ..Default::default()
        }
    }

    #[test]
    fn creation_defaults_to_principal_and_now() {
        let store = SqliteStore::open_in_memory().unwrap();
        let services = services();
        let principal = Key::new();
        let ctx = DataContext::new(store.conn(), &services).with_principal(Some(principal));

        let mut r = role("clerk");
        insert::<SecurityRoleMapping>(&ctx, &mut r).unwrap();
        assert_eq!(r.meta.created_by, Some(principal));
        assert!(r.meta.creation_time.is_some());
    }

    #[test]
    fn update_keeps_creation_stamps_and_undeletes() {
        let store = SqliteStore::open_in_memory().unwrap();
        let services = services();
        let ctx = DataContext::new(store.conn(), &services).with_principal(Some(Key::new()));

        let mut r = role("clerk");
        insert::<SecurityRoleMapping>(&ctx, &mut r).unwrap();
        let created = r.meta.clone();

        let existing = identified::load_existing::<SecurityRoleMapping>(&ctx, r.key.unwrap()).unwrap();
        let mut gone = r.clone();
        let obsoleted = obsolete::<SecurityRoleMapping>(&ctx, &mut gone, &existing).unwrap();
        assert!(is_obsolete(&obsoleted));

        let mut back = SecurityRole {
            key: r.key,
            description: Some("front desk".into()),
            ..Default::default()
        };
        let merged = update::<SecurityRoleMapping>(&ctx, &mut back, &obsoleted).unwrap();
        assert!(!is_obsolete(&merged));
        assert_eq!(back.meta.created_by, created.created_by);
        assert_eq!(back.meta.creation_time, created.creation_time);
        assert_eq!(merged.text("name").as_deref(), Some("clerk"));
    }
}
