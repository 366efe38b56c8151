use std::path::{Path, PathBuf};

use rusqlite::types::Value as SqlValue;
use tempfile::TempDir;

use hearth_engine::{DataContext, Engine, EngineError, StoreConfig};

/// An engine over a throwaway store, in memory or in a temp directory.
pub struct TestStore {
    pub engine: Engine,
    path: Option<PathBuf>,
    _dir: Option<TempDir>,
}

impl TestStore {
    pub fn in_memory() -> Result<Self, EngineError> {
        Self::in_memory_with(StoreConfig::default())
    }

    pub fn in_memory_with(config: StoreConfig) -> Result<Self, EngineError> {
        Ok(Self {
            engine: Engine::open_in_memory(config)?,
            path: None,
            _dir: None,
        })
    }

    /// A file-backed store, needed for staged imports and background
    /// query registration.
    pub fn file() -> Result<Self, Box<dyn std::error::Error>> {
        Self::file_with(StoreConfig::default())
    }

    pub fn file_with(config: StoreConfig) -> Result<Self, Box<dyn std::error::Error>> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("hearth.db");
        let engine = Engine::open(&path, config)?;
        Ok(Self {
            engine,
            path: Some(path),
            _dir: Some(dir),
        })
    }

    pub fn ctx(&self) -> DataContext<'_> {
        self.engine.context()
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn count_rows(&self, table: &str) -> Result<i64, rusqlite::Error> {
        self.engine
            .store()
            .conn()
            .query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |r| r.get(0))
    }

    /// `columns` of every row in `table`, rendered and sorted, for comparing
    /// two stores without minted keys or timestamps getting in the way.
    pub fn digest(&self, table: &str, columns: &[&str]) -> Result<Vec<String>, rusqlite::Error> {
        let sql = format!("SELECT {} FROM {table}", columns.join(", "));
        let conn = self.engine.store().conn();
        let mut stmt = conn.prepare(&sql)?;
        let mut rows = stmt
            .query_map([], |row| {
                (0..columns.len())
                    .map(|i| row.get::<_, SqlValue>(i).map(|v| render(&v)))
                    .collect::<Result<Vec<_>, _>>()
                    .map(|cells| cells.join("|"))
            })?
            .collect::<Result<Vec<_>, _>>()?;
        rows.sort();
        Ok(rows)
    }
}

fn render(value: &SqlValue) -> String {
    match value {
        SqlValue::Null => "null".into(),
        SqlValue::Integer(i) => i.to_string(),
        SqlValue::Real(r) => r.to_string(),
        SqlValue::Text(t) => t.clone(),
        SqlValue::Blob(b) => b.iter().map(|byte| format!("{byte:02x}")).collect(),
    }
}
