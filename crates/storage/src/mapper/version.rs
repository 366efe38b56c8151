use hearth_core::Key;
use hearth_core::model::VersionSnapshot;

use crate::error::StorageError;
use crate::mapping::{RowMapping, TableMap, TableRow};
use crate::tables;

/// Chain rows are keyed by the record they belong to; the version key is
/// the row's own primary key.
pub struct VersionChainMapping;

impl RowMapping for VersionChainMapping {
    type Model = VersionSnapshot;

    fn table() -> &'static TableMap {
        &tables::VERSION_CHAIN
    }

    fn to_row(record_key: Key, v: &VersionSnapshot) -> Result<TableRow, StorageError> {
        let mut row = TableRow::new(Self::table());
        row.put_version("version_key", Some(v.version_key));
        row.put_key("record_key", Some(record_key));
        row.put_int("version_sequence", Some(v.version_sequence));
        row.put_version("previous_version_key", v.previous_version_key);
        row.put_key("author_key", v.created_by);
        row.put_time("created_at", v.creation_time);
        Ok(row)
    }

    fn from_row(row: &TableRow) -> Result<VersionSnapshot, StorageError> {
        let version_key = row.version("version_key")?.ok_or_else(|| {
            StorageError::Serialization("version_chain row without version_key".into())
        })?;
        Ok(VersionSnapshot {
            version_key,
            version_sequence: row.int("version_sequence").unwrap_or_default(),
            previous_version_key: row.version("previous_version_key")?,
            created_by: row.key("author_key")?,
            creation_time: row.time("created_at"),
        })
    }
}
