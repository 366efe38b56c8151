pub mod act;
pub mod association;
pub mod concept;
pub mod entity;
pub mod security;
pub mod version;

pub use act::*;
pub use association::*;
pub use concept::*;
pub use entity::*;
pub use security::*;
pub use version::*;

use hearth_core::model::{RecordMeta, VersionInfo};

use crate::error::StorageError;
use crate::mapping::TableRow;

pub(crate) fn put_meta(row: &mut TableRow, meta: &RecordMeta) {
    row.put_key("created_by", meta.created_by);
    row.put_time("creation_time", meta.creation_time);
    row.put_key("obsoleted_by", meta.obsoleted_by);
    row.put_time("obsoletion_time", meta.obsoletion_time);
    row.put_bool("hidden", meta.hidden);
}

pub(crate) fn read_meta(row: &TableRow) -> Result<RecordMeta, StorageError> {
    Ok(RecordMeta {
        created_by: row.key("created_by")?,
        creation_time: row.time("creation_time"),
        obsoleted_by: row.key("obsoleted_by")?,
        obsoletion_time: row.time("obsoletion_time"),
        hidden: row.bool("hidden"),
    })
}

pub(crate) fn put_version_info(row: &mut TableRow, version: &VersionInfo) {
    row.put_version("version_key", version.version_key);
    row.put_int("version_sequence", version.version_sequence);
    row.put_version("previous_version_key", version.previous_version_key);
}

pub(crate) fn read_version_info(row: &TableRow) -> Result<VersionInfo, StorageError> {
    Ok(VersionInfo {
        version_key: row.version("version_key")?,
        version_sequence: row.int("version_sequence"),
        previous_version_key: row.version("previous_version_key")?,
        superseded: None,
    })
}

/// Declares a mapping struct per table for a model shape that several
/// tables share, delegating to one pair of conversion functions.
macro_rules! shared_mapping {
    ($model:ty, $to:ident, $from:ident; $($name:ident => $table:path),+ $(,)?) => {
        $(
            pub struct $name;

            impl $crate::mapping::RowMapping for $name {
                type Model = $model;

                fn table() -> &'static $crate::mapping::TableMap {
                    &$table
                }

                fn to_row(
                    key: hearth_core::Key,
                    model: &Self::Model,
                ) -> Result<$crate::mapping::TableRow, $crate::error::StorageError> {
                    $to(&$table, key, model)
                }

                fn from_row(
                    row: &$crate::mapping::TableRow,
                ) -> Result<Self::Model, $crate::error::StorageError> {
                    $from(row)
                }
            }
        )+
    };
}
pub(crate) use shared_mapping;
