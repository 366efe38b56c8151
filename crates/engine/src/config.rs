use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use hearth_storage::TableMap;
use hearth_storage::tables::{self, DEFAULT_REFERENCE_TABLES};

use crate::error::EngineError;

pub const DEFAULT_BULK_THRESHOLD: usize = 250;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Bundles with more items than this are staged.
    pub bulk_threshold: usize,
    /// Tables copied wholesale into a staging database.
    pub reference_tables: Vec<String>,
    pub background_query_registration: bool,
    pub worker_threads: usize,
    pub cache_capacity: usize,
    pub busy_timeout_ms: u64,
    /// When false, queries report the page length as the total.
    pub count_totals: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            bulk_threshold: DEFAULT_BULK_THRESHOLD,
            reference_tables: DEFAULT_REFERENCE_TABLES.iter().map(|t| t.to_string()).collect(),
            background_query_registration: true,
            worker_threads: 1,
            cache_capacity: 1024,
            busy_timeout_ms: 5000,
            count_totals: true,
        }
    }
}

impl StoreConfig {
    pub fn from_json(json: &str) -> Result<Self, EngineError> {
        let config: StoreConfig =
            serde_json::from_str(json).map_err(|e| EngineError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, EngineError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)
            .map_err(|e| EngineError::Config(format!("{}: {e}", path.display())))?;
        Self::from_json(&json)
    }

    pub fn validate(&self) -> Result<(), EngineError> {
        if self.bulk_threshold == 0 {
            return Err(EngineError::Config("bulk_threshold must be positive".into()));
        }
        if self.cache_capacity == 0 {
            return Err(EngineError::Config("cache_capacity must be positive".into()));
        }
        self.resolved_reference_tables().map(|_| ())
    }

    pub fn busy_timeout(&self) -> Duration {
        Duration::from_millis(self.busy_timeout_ms)
    }

    pub fn resolved_reference_tables(&self) -> Result<Vec<&'static TableMap>, EngineError> {
        self.reference_tables
            .iter()
            .map(|name| {
                tables::by_name(name)
                    .ok_or_else(|| EngineError::Config(format!("unknown reference table {name}")))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_fill_missing_fields() {
        let config = StoreConfig::from_json(r#"{ "bulk_threshold": 10 }"#).unwrap();
        assert_eq!(config.bulk_threshold, 10);
        assert_eq!(config.cache_capacity, 1024);
        assert!(config.background_query_registration);
        assert_eq!(config.reference_tables.len(), DEFAULT_REFERENCE_TABLES.len());
    }

    #[test]
    fn rejects_zero_threshold_and_capacity() {
        assert!(StoreConfig::from_json(r#"{ "bulk_threshold": 0 }"#).is_err());
        assert!(StoreConfig::from_json(r#"{ "cache_capacity": 0 }"#).is_err());
    }

    #[test]
    fn rejects_unknown_reference_table() {
        let err = StoreConfig::from_json(r#"{ "reference_tables": ["nope"] }"#).unwrap_err();
        assert!(err.to_string().contains("nope"));
    }

    #[test]
    fn loads_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.json");
        std::fs::write(&path, r#"{ "worker_threads": 3, "count_totals": false }"#).unwrap();
        let config = StoreConfig::load(&path).unwrap();
        assert_eq!(config.worker_threads, 3);
        assert!(!config.count_totals);
        assert_eq!(config.busy_timeout(), Duration::from_millis(5000));
    }
}
