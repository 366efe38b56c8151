use std::fmt::Debug;

use hearth_core::Key;
use hearth_core::model::Identified;
use hearth_storage::{RowMapping, TableMap, TableRow, sqlite};

use crate::context::DataContext;
use crate::error::EngineError;

/// The model's key, minting one when absent.
pub fn assign_key<T: Identified>(model: &mut T) -> Key {
    match model.key() {
        Some(key) => key,
        None => {
            let key = Key::new();
            model.set_key(key);
            key
        }
    }
}

pub fn require_complete(row: &TableRow, model: &dyn Debug) -> Result<(), EngineError> {
    match row.missing_required() {
        Some(field) => Err(EngineError::MissingRequiredField {
            field: format!("{}.{field}", row.table().name),
            model: format!("{model:?}"),
        }),
        None => Ok(()),
    }
}

/// Maps, validates and upserts the root row.
pub fn insert<M>(ctx: &DataContext<'_>, model: &mut M::Model) -> Result<TableRow, EngineError>
where
    M: RowMapping,
    M::Model: Identified + Debug,
{
    let key = assign_key(model);
    let row = M::to_row(key, model)?;
    require_complete(&row, model)?;
    sqlite::replace_row(ctx.conn(), &row)?;
    Ok(row)
}

pub fn load_existing<M: RowMapping>(ctx: &DataContext<'_>, key: Key) -> Result<TableRow, EngineError> {
    sqlite::load_row(ctx.conn(), M::table(), key)?
        .ok_or_else(|| EngineError::not_found(M::table().name, key))
}

pub fn write_merged(ctx: &DataContext<'_>, merged: &TableRow, model: &dyn Debug) -> Result<(), EngineError> {
    require_complete(merged, model)?;
    sqlite::update_row(ctx.conn(), merged)?;
    Ok(())
}

/// Merges `row` onto the stored row under the same key, or inserts it.
pub fn upsert(ctx: &DataContext<'_>, row: TableRow, model: &dyn Debug) -> Result<TableRow, EngineError> {
    let key = row
        .row_key()?
        .ok_or_else(|| EngineError::MissingRequiredField {
            field: format!("{}.{}", row.table().name, row.table().key_column),
            model: format!("{model:?}"),
        })?;
    match sqlite::load_row(ctx.conn(), row.table(), key)? {
        Some(existing) => {
            let merged = existing.merged_with(&row);
            write_merged(ctx, &merged, model)?;
            Ok(merged)
        }
        None => {
            require_complete(&row, model)?;
            sqlite::insert_row(ctx.conn(), &row)?;
            Ok(row)
        }
    }
}

pub fn load<M: RowMapping>(ctx: &DataContext<'_>, key: Key) -> Result<Option<M::Model>, EngineError> {
    ctx.fault_in(key)?;
    match sqlite::load_row(ctx.conn(), M::table(), key)? {
        Some(row) => Ok(Some(M::from_row(&row)?)),
        None => Ok(None),
    }
}

pub fn exists(ctx: &DataContext<'_>, table: &TableMap, key: Key) -> Result<bool, EngineError> {
    ctx.fault_in(key)?;
    Ok(sqlite::row_exists(ctx.conn(), table, key)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::tests::services;
    use hearth_core::model::SecurityRole;
    use hearth_storage::SqliteStore;
    use hearth_storage::mapper::SecurityRoleMapping;

    #[test]
    fn mints_missing_key_and_keeps_supplied_one() {
        let mut role = SecurityRole::default();
        let minted = assign_key(&mut role);
        assert_eq!(role.key, Some(minted));

        let supplied = Key::new();
        let mut role = SecurityRole {
            key: Some(supplied),
            ..Default::default()
        };
        assert_eq!(assign_key(&mut role), supplied);

        let mut nil = SecurityRole {
            key: Some(Key::nil()),
            ..Default::default()
        };
        assert_ne!(assign_key(&mut nil), Key::nil());
    }

    #[test]
    fn missing_required_column_is_reported() {
        let store = SqliteStore::open_in_memory().unwrap();
        let services = services();
        let ctx = DataContext::new(store.conn(), &services);
        let mut role = SecurityRole::default();

        let err = insert::<SecurityRoleMapping>(&ctx, &mut role).unwrap_err();
        match err {
            EngineError::MissingRequiredField { field, model } => {
                assert!(field.starts_with("security_role."));
                assert!(model.contains("SecurityRole"));
            }
            other => panic!("unexpected {other:?}"),
        }
    }
}
