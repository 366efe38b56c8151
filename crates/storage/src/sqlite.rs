use std::path::{Path, PathBuf};
use std::time::Duration;

use rusqlite::{Connection, OpenFlags, OptionalExtension};

use hearth_core::Key;

use crate::error::StorageError;
use crate::mapping::{TableMap, TableRow};

/// An open store: one connection plus where it lives.
pub struct SqliteStore {
    conn: Connection,
    path: Option<PathBuf>,
}

impl SqliteStore {
    pub fn open(path: impl AsRef<Path>, busy_timeout: Duration) -> Result<Self, StorageError> {
        let path = path.as_ref().to_path_buf();
        let conn = Connection::open(&path)?;
        crate::schema::init_schema(&conn)?;
        conn.busy_timeout(busy_timeout)?;
        log::debug!("event=store_open module=sqlite path={}", path.display());
        Ok(Self {
            conn,
            path: Some(path),
        })
    }

    pub fn open_in_memory() -> Result<Self, StorageError> {
        let conn = Connection::open_in_memory()?;
        crate::schema::init_schema(&conn)?;
        Ok(Self { conn, path: None })
    }

    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    /// `None` for in-memory stores.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }
}

/// A second, read-only connection to an existing file store, for
/// background readers.
pub fn open_read_only(path: &Path, busy_timeout: Duration) -> Result<Connection, StorageError> {
    let conn = Connection::open_with_flags(
        path,
        OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX | OpenFlags::SQLITE_OPEN_URI,
    )?;
    conn.busy_timeout(busy_timeout)?;
    Ok(conn)
}

pub(crate) fn column_list(table: &TableMap, alias: Option<&str>) -> String {
    table
        .columns
        .iter()
        .map(|c| match alias {
            Some(a) => format!("{a}.{}", c.name),
            None => c.name.to_string(),
        })
        .collect::<Vec<_>>()
        .join(", ")
}

pub fn load_row(
    conn: &Connection,
    table: &'static TableMap,
    key: Key,
) -> Result<Option<TableRow>, StorageError> {
    let sql = format!(
        "SELECT {} FROM {} WHERE {} = ?1",
        column_list(table, None),
        table.name,
        table.key_column
    );
    let mut stmt = conn.prepare_cached(&sql)?;
    let row = stmt
        .query_row(rusqlite::params![key.as_bytes().as_slice()], |row| {
            TableRow::from_sql(table, row)
        })
        .optional()?;
    Ok(row)
}

/// All rows whose `column` equals `key`, in insertion order.
pub fn load_where(
    conn: &Connection,
    table: &'static TableMap,
    column: &str,
    key: Key,
) -> Result<Vec<TableRow>, StorageError> {
    let sql = format!(
        "SELECT {} FROM {} WHERE {column} = ?1 ORDER BY rowid",
        column_list(table, None),
        table.name
    );
    let mut stmt = conn.prepare_cached(&sql)?;
    let rows = stmt
        .query_map(rusqlite::params![key.as_bytes().as_slice()], |row| {
            TableRow::from_sql(table, row)
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn row_exists(conn: &Connection, table: &TableMap, key: Key) -> Result<bool, StorageError> {
    let sql = format!(
        "SELECT EXISTS(SELECT 1 FROM {} WHERE {} = ?1)",
        table.name, table.key_column
    );
    let mut stmt = conn.prepare_cached(&sql)?;
    let exists: bool = stmt.query_row(rusqlite::params![key.as_bytes().as_slice()], |row| {
        row.get(0)
    })?;
    Ok(exists)
}

pub fn insert_row(conn: &Connection, row: &TableRow) -> Result<(), StorageError> {
    let table = row.table();
    let placeholders = (1..=table.columns.len())
        .map(|i| format!("?{i}"))
        .collect::<Vec<_>>()
        .join(", ");
    let sql = format!(
        "INSERT INTO {} ({}) VALUES ({placeholders})",
        table.name,
        column_list(table, None)
    );
    let mut stmt = conn.prepare_cached(&sql)?;
    stmt.execute(rusqlite::params_from_iter(row.values()))?;
    Ok(())
}

/// Delete-then-insert, tolerating a stale row under the same key.
pub fn replace_row(conn: &Connection, row: &TableRow) -> Result<(), StorageError> {
    let key = row.row_key()?.ok_or_else(|| {
        StorageError::Serialization(format!("{} row without key", row.table().name))
    })?;
    delete_row(conn, row.table(), key)?;
    insert_row(conn, row)
}

pub fn update_row(conn: &Connection, row: &TableRow) -> Result<usize, StorageError> {
    let table = row.table();
    let key_pos = table
        .position(table.key_column)
        .ok_or_else(|| StorageError::Serialization(format!("{} has no key column", table.name)))?;
    let assignments = table
        .columns
        .iter()
        .enumerate()
        .map(|(i, c)| format!("{} = ?{}", c.name, i + 1))
        .collect::<Vec<_>>()
        .join(", ");
    let sql = format!(
        "UPDATE {} SET {assignments} WHERE {} = ?{}",
        table.name,
        table.key_column,
        key_pos + 1
    );
    let mut stmt = conn.prepare_cached(&sql)?;
    Ok(stmt.execute(rusqlite::params_from_iter(row.values()))?)
}

pub fn delete_row(conn: &Connection, table: &TableMap, key: Key) -> Result<usize, StorageError> {
    let sql = format!("DELETE FROM {} WHERE {} = ?1", table.name, table.key_column);
    let mut stmt = conn.prepare_cached(&sql)?;
    Ok(stmt.execute(rusqlite::params![key.as_bytes().as_slice()])?)
}

/// Deletes one child row, scoped to its parent.
pub fn delete_child_row(
    conn: &Connection,
    table: &TableMap,
    source: Key,
    key: Key,
) -> Result<usize, StorageError> {
    let sql = format!(
        "DELETE FROM {} WHERE {} = ?1 AND source_key = ?2",
        table.name, table.key_column
    );
    let mut stmt = conn.prepare_cached(&sql)?;
    Ok(stmt.execute(rusqlite::params![
        key.as_bytes().as_slice(),
        source.as_bytes().as_slice()
    ])?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mapper::{ConceptMapping, SecurityUserRoleMapping};
    use crate::mapping::RowMapping;
    use crate::tables;
    use hearth_core::model::{Concept, Membership};
    use hearth_core::{Timestamp, VersionKey};

    fn concept_row(key: Key, mnemonic: &str) -> TableRow {
        let mut c = Concept::new(mnemonic);
        c.meta.creation_time = Some(Timestamp::now());
        c.version.version_key = Some(VersionKey::new());
        c.version.version_sequence = Some(1);
        ConceptMapping::to_row(key, &c).unwrap()
    }

    #[test]
    fn insert_load_update_delete() {
        let store = SqliteStore::open_in_memory().unwrap();
        let conn = store.conn();
        let key = Key::new();

        insert_row(conn, &concept_row(key, "Male")).unwrap();
        assert!(row_exists(conn, &tables::CONCEPT, key).unwrap());

        let mut row = load_row(conn, &tables::CONCEPT, key).unwrap().unwrap();
        assert_eq!(row.text("mnemonic").as_deref(), Some("Male"));

        row.put_text("mnemonic", Some("M"));
        assert_eq!(update_row(conn, &row).unwrap(), 1);
        let again = load_row(conn, &tables::CONCEPT, key).unwrap().unwrap();
        assert_eq!(again, row);

        assert_eq!(delete_row(conn, &tables::CONCEPT, key).unwrap(), 1);
        assert!(load_row(conn, &tables::CONCEPT, key).unwrap().is_none());
    }

    #[test]
    fn replace_tolerates_stale_row() {
        let store = SqliteStore::open_in_memory().unwrap();
        let key = Key::new();
        insert_row(store.conn(), &concept_row(key, "stale")).unwrap();
        replace_row(store.conn(), &concept_row(key, "fresh")).unwrap();
        let row = load_row(store.conn(), &tables::CONCEPT, key).unwrap().unwrap();
        assert_eq!(row.text("mnemonic").as_deref(), Some("fresh"));
    }

    #[test]
    fn child_delete_is_scoped_to_parent() {
        let store = SqliteStore::open_in_memory().unwrap();
        let conn = store.conn();
        let role = Key::new();
        let (alice, bob) = (Key::new(), Key::new());
        for user in [alice, bob] {
            let m = Membership::to(role).with_source(user);
            insert_row(conn, &SecurityUserRoleMapping::to_row(role, &m).unwrap()).unwrap();
        }

        delete_child_row(conn, &tables::SECURITY_USER_ROLE, alice, role).unwrap();
        assert!(load_where(conn, &tables::SECURITY_USER_ROLE, "source_key", alice).unwrap().is_empty());
        assert_eq!(load_where(conn, &tables::SECURITY_USER_ROLE, "source_key", bob).unwrap().len(), 1);
    }
}
