use std::fmt;

use rusqlite::types::Value as SqlValue;

use hearth_core::{Key, Timestamp, Value, VersionKey};

use crate::error::StorageError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    /// 128-bit key stored as a 16-byte blob.
    Key,
    Text,
    Integer,
    Real,
    /// Stored as 0/1.
    Boolean,
    /// Milliseconds since the Unix epoch.
    Timestamp,
    /// Opaque bytes (msgpack payloads).
    Blob,
}

impl ColumnType {
    pub fn sql_type(&self) -> &'static str {
        match self {
            ColumnType::Key | ColumnType::Blob => "BLOB",
            ColumnType::Text => "TEXT",
            ColumnType::Integer | ColumnType::Boolean | ColumnType::Timestamp => "INTEGER",
            ColumnType::Real => "REAL",
        }
    }
}

pub struct ColumnDef {
    pub name: &'static str,
    pub ty: ColumnType,
    pub required: bool,
    /// Never overwritten once the stored value is non-null.
    pub immutable: bool,
    /// Parent table this column always joins to (subtype key columns).
    pub join: Option<&'static TableMap>,
}

impl ColumnDef {
    pub const fn new(name: &'static str, ty: ColumnType) -> Self {
        Self {
            name,
            ty,
            required: false,
            immutable: false,
            join: None,
        }
    }

    pub const fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub const fn immutable(mut self) -> Self {
        self.immutable = true;
        self
    }

    pub const fn joins(mut self, parent: &'static TableMap) -> Self {
        self.join = Some(parent);
        self
    }
}

impl fmt::Debug for ColumnDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ColumnDef")
            .field("name", &self.name)
            .field("ty", &self.ty)
            .field("required", &self.required)
            .field("immutable", &self.immutable)
            .field("join", &self.join.map(|t| t.name))
            .finish()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableRole {
    /// Root of a model family; carries the record metadata.
    Root,
    /// Shares the primary key of its parent table.
    Subtype,
    /// Keyed child rows owned by a parent record.
    Association,
    /// Keyless membership rows; the target is the key within one owner.
    Link,
    /// Version chain bookkeeping.
    Chain,
}

/// A has-many edge from a table to the table holding its children.
#[derive(Debug)]
pub struct CollectionDef {
    pub name: &'static str,
    pub table: &'static TableMap,
}

pub struct TableMap {
    pub name: &'static str,
    pub key_column: &'static str,
    /// Column naming the root record that owns a row. Staging faults rows in
    /// and merges them out by this column.
    pub owner_column: &'static str,
    pub role: TableRole,
    pub columns: &'static [ColumnDef],
    pub collections: &'static [CollectionDef],
}

impl fmt::Debug for TableMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TableMap({})", self.name)
    }
}

impl PartialEq for TableMap {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::eq(self, other)
    }
}

impl TableMap {
    pub fn column(&self, name: &str) -> Option<&'static ColumnDef> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn position(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    pub fn collection(&self, name: &str) -> Option<&'static TableMap> {
        self.collections.iter().find(|c| c.name == name).map(|c| c.table)
    }

    pub fn column_names(&self) -> Vec<&'static str> {
        self.columns.iter().map(|c| c.name).collect()
    }

    /// Model field name to column name. `key` always names the key column.
    pub fn resolve_field(&self, field: &str) -> Option<&'static ColumnDef> {
        if field == "key" {
            return self.column(self.key_column);
        }
        self.column(field)
    }

    /// The table joined through the key column, if this is a subtype table.
    pub fn parent(&self) -> Option<&'static TableMap> {
        self.column(self.key_column).and_then(|c| c.join)
    }

    /// This table followed by each ancestor up to the root.
    pub fn join_chain(&'static self) -> Vec<&'static TableMap> {
        let mut chain = vec![self];
        let mut current = self;
        while let Some(parent) = current.parent() {
            chain.push(parent);
            current = parent;
        }
        chain
    }

    pub fn root(&'static self) -> &'static TableMap {
        self.join_chain().last().copied().unwrap_or(self)
    }

    pub fn soft_deletes(&self) -> bool {
        self.column("obsoletion_time").is_some()
    }

    pub fn hides(&self) -> bool {
        self.column("hidden").is_some()
    }

    pub fn versioned(&self) -> bool {
        self.column("version_key").is_some() && self.role == TableRole::Root
    }
}

/// One row of a mapped table, cells in column order.
#[derive(Clone, PartialEq)]
pub struct TableRow {
    table: &'static TableMap,
    values: Vec<SqlValue>,
}

impl fmt::Debug for TableRow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut map = f.debug_map();
        for (col, value) in self.table.columns.iter().zip(&self.values) {
            if *value != SqlValue::Null {
                map.entry(&col.name, value);
            }
        }
        map.finish()
    }
}

impl TableRow {
    pub fn new(table: &'static TableMap) -> Self {
        Self {
            table,
            values: vec![SqlValue::Null; table.columns.len()],
        }
    }

    /// Reads a row selected with `table.column_names()` in order.
    pub fn from_sql(table: &'static TableMap, row: &rusqlite::Row) -> rusqlite::Result<Self> {
        let values = (0..table.columns.len())
            .map(|i| row.get::<_, SqlValue>(i))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { table, values })
    }

    pub fn table(&self) -> &'static TableMap {
        self.table
    }

    pub fn values(&self) -> &[SqlValue] {
        &self.values
    }

    pub fn get(&self, column: &str) -> &SqlValue {
        match self.table.position(column) {
            Some(i) => &self.values[i],
            None => &SqlValue::Null,
        }
    }

    pub fn is_null(&self, column: &str) -> bool {
        *self.get(column) == SqlValue::Null
    }

    pub fn set(&mut self, column: &str, value: SqlValue) {
        match self.table.position(column) {
            Some(i) => self.values[i] = value,
            None => debug_assert!(false, "{} has no column {column}", self.table.name),
        }
    }

    pub fn put_key(&mut self, column: &str, key: Option<Key>) {
        let value = match Key::present(key) {
            Some(k) => SqlValue::Blob(k.as_bytes().to_vec()),
            None => SqlValue::Null,
        };
        self.set(column, value);
    }

    pub fn put_version(&mut self, column: &str, key: Option<VersionKey>) {
        let value = match VersionKey::present(key) {
            Some(k) => SqlValue::Blob(k.as_bytes().to_vec()),
            None => SqlValue::Null,
        };
        self.set(column, value);
    }

    pub fn put_text(&mut self, column: &str, text: Option<&str>) {
        self.set(column, text.map_or(SqlValue::Null, |t| SqlValue::Text(t.to_string())));
    }

    pub fn put_int(&mut self, column: &str, value: Option<i64>) {
        self.set(column, value.map_or(SqlValue::Null, SqlValue::Integer));
    }

    pub fn put_real(&mut self, column: &str, value: Option<f64>) {
        self.set(column, value.map_or(SqlValue::Null, SqlValue::Real));
    }

    pub fn put_bool(&mut self, column: &str, value: bool) {
        self.set(column, SqlValue::Integer(i64::from(value)));
    }

    pub fn put_time(&mut self, column: &str, value: Option<Timestamp>) {
        self.put_int(column, value.map(|t| t.ticks()));
    }

    pub fn put_value(&mut self, column: &str, value: Option<&Value>) -> Result<(), StorageError> {
        let cell = match value {
            Some(v) if !v.is_null() => SqlValue::Blob(
                v.to_msgpack()
                    .map_err(|e| StorageError::Serialization(e.to_string()))?,
            ),
            _ => SqlValue::Null,
        };
        self.set(column, cell);
        Ok(())
    }

    pub fn key(&self, column: &str) -> Result<Option<Key>, StorageError> {
        match self.get(column) {
            SqlValue::Null => Ok(None),
            SqlValue::Blob(b) => Ok(Some(Key::from_slice(b)?)),
            other => Err(self.type_error(column, "key", other)),
        }
    }

    pub fn version(&self, column: &str) -> Result<Option<VersionKey>, StorageError> {
        match self.get(column) {
            SqlValue::Null => Ok(None),
            SqlValue::Blob(b) => Ok(Some(VersionKey::from_slice(b)?)),
            other => Err(self.type_error(column, "version key", other)),
        }
    }

    pub fn text(&self, column: &str) -> Option<String> {
        match self.get(column) {
            SqlValue::Text(t) => Some(t.clone()),
            _ => None,
        }
    }

    pub fn int(&self, column: &str) -> Option<i64> {
        match self.get(column) {
            SqlValue::Integer(n) => Some(*n),
            _ => None,
        }
    }

    pub fn real(&self, column: &str) -> Option<f64> {
        match self.get(column) {
            SqlValue::Real(n) => Some(*n),
            SqlValue::Integer(n) => Some(*n as f64),
            _ => None,
        }
    }

    pub fn bool(&self, column: &str) -> bool {
        matches!(self.get(column), SqlValue::Integer(n) if *n != 0)
    }

    pub fn time(&self, column: &str) -> Option<Timestamp> {
        self.int(column).map(Timestamp::from_ticks)
    }

    pub fn value(&self, column: &str) -> Result<Option<Value>, StorageError> {
        match self.get(column) {
            SqlValue::Null => Ok(None),
            SqlValue::Blob(b) => Value::from_msgpack(b)
                .map(Some)
                .map_err(|e| StorageError::Serialization(e.to_string())),
            other => Err(self.type_error(column, "msgpack value", other)),
        }
    }

    /// The row's own key.
    pub fn row_key(&self) -> Result<Option<Key>, StorageError> {
        self.key(self.table.key_column)
    }

    pub fn owner_key(&self) -> Result<Option<Key>, StorageError> {
        self.key(self.table.owner_column)
    }

    /// Overlays the non-null cells of `incoming` on a copy of `self`,
    /// keeping immutable columns that already hold a value.
    pub fn merged_with(&self, incoming: &TableRow) -> TableRow {
        let mut merged = self.clone();
        for (i, col) in self.table.columns.iter().enumerate() {
            let new = &incoming.values[i];
            if *new == SqlValue::Null {
                continue;
            }
            if col.immutable && merged.values[i] != SqlValue::Null {
                continue;
            }
            merged.values[i] = new.clone();
        }
        merged
    }

    /// First required column holding null.
    pub fn missing_required(&self) -> Option<&'static str> {
        self.table
            .columns
            .iter()
            .zip(&self.values)
            .find(|(c, v)| c.required && **v == SqlValue::Null)
            .map(|(c, _)| c.name)
    }

    fn type_error(&self, column: &str, expected: &str, found: &SqlValue) -> StorageError {
        StorageError::Serialization(format!(
            "{}.{column}: expected {expected}, found {:?}",
            self.table.name,
            found.data_type()
        ))
    }
}

/// Bidirectional conversion between one model shape and one table.
pub trait RowMapping {
    type Model;

    fn table() -> &'static TableMap;
    fn to_row(key: Key, model: &Self::Model) -> Result<TableRow, StorageError>;
    fn from_row(row: &TableRow) -> Result<Self::Model, StorageError>;
}
