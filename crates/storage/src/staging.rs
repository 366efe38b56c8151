use std::cell::RefCell;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use rusqlite::{Connection, TransactionBehavior};

use hearth_core::{Key, VersionKey};

use crate::error::StorageError;
use crate::mapping::TableMap;
use crate::schema::init_schema;
use crate::tables::ALL_TABLES;

const PRIMARY_ALIAS: &str = "primary_db";

/// Progress of a merge, reported once per table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MergeProgress {
    pub table: &'static str,
    /// 1-based.
    pub index: usize,
    pub total: usize,
    pub rows: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergeReport {
    pub keys: usize,
    pub tables: usize,
    pub rows: usize,
}

/// Creates staged stores over some primary store.
pub trait StagingBackend {
    type Store: StagedStore;

    fn begin_staging(&self, reference_tables: &[&'static TableMap]) -> Result<Self::Store, StorageError>;
}

/// A staging database. Callers fault a key in before reading it and mark it
/// touched before writing it; only touched keys are merged.
pub trait StagedStore {
    fn connection(&self) -> &Connection;

    /// Copies the primary's rows owned by `key` on first call. Returns
    /// whether this call did the copy.
    fn fault_in(&self, key: Key) -> Result<bool, StorageError>;

    fn mark_touched(&self, key: Key) -> Result<(), StorageError>;

    /// Whether a staged or primary chain already uses `version`, whether or
    /// not its record was faulted in.
    fn version_in_use(&self, version: VersionKey) -> Result<bool, StorageError>;

    fn merge_into_primary(
        self,
        progress: &mut dyn FnMut(&MergeProgress),
    ) -> Result<MergeReport, StorageError>
    where
        Self: Sized;
}

/// Stages into an in-memory SQLite database with the primary file attached.
#[derive(Debug, Clone)]
pub struct SqliteStaging {
    primary_path: PathBuf,
    busy_timeout: Duration,
}

impl SqliteStaging {
    pub fn new(primary_path: impl AsRef<Path>, busy_timeout: Duration) -> Self {
        Self {
            primary_path: primary_path.as_ref().to_path_buf(),
            busy_timeout,
        }
    }
}

impl StagingBackend for SqliteStaging {
    type Store = SqliteStagedStore;

    fn begin_staging(&self, reference_tables: &[&'static TableMap]) -> Result<SqliteStagedStore, StorageError> {
        if !self.primary_path.exists() {
            return Err(StorageError::Staging(format!(
                "primary store {} does not exist",
                self.primary_path.display()
            )));
        }
        let conn = Connection::open_in_memory()?;
        init_schema(&conn)?;
        conn.busy_timeout(self.busy_timeout)?;
        conn.execute(
            &format!("ATTACH DATABASE ?1 AS {PRIMARY_ALIAS}"),
            [self.primary_path.to_string_lossy().as_ref()],
        )?;
        conn.execute_batch("CREATE TEMP TABLE staged_keys (key BLOB PRIMARY KEY)")?;

        let mut copied = 0;
        for table in reference_tables {
            copied += conn.execute(
                &format!(
                    "INSERT OR IGNORE INTO main.{0} SELECT * FROM {PRIMARY_ALIAS}.{0}",
                    table.name
                ),
                [],
            )?;
        }
        log::debug!(
            "event=staging_begin module=staging reference_tables={} rows={copied}",
            reference_tables.len()
        );
        Ok(SqliteStagedStore {
            conn,
            faulted: RefCell::new(HashSet::new()),
        })
    }
}

pub struct SqliteStagedStore {
    conn: Connection,
    faulted: RefCell<HashSet<Key>>,
}

impl StagedStore for SqliteStagedStore {
    fn connection(&self) -> &Connection {
        &self.conn
    }

    fn fault_in(&self, key: Key) -> Result<bool, StorageError> {
        if !self.faulted.borrow_mut().insert(key) {
            return Ok(false);
        }
        let bytes = key.as_bytes().to_vec();
        for table in ALL_TABLES {
            let sql = format!(
                "INSERT OR IGNORE INTO main.{0} SELECT * FROM {PRIMARY_ALIAS}.{0} WHERE {1} = ?1",
                table.name, table.owner_column
            );
            self.conn.prepare_cached(&sql)?.execute([&bytes])?;
        }
        Ok(true)
    }

    fn mark_touched(&self, key: Key) -> Result<(), StorageError> {
        self.conn
            .prepare_cached("INSERT OR IGNORE INTO temp.staged_keys (key) VALUES (?1)")?
            .execute([key.as_bytes().as_slice()])?;
        Ok(())
    }

    fn version_in_use(&self, version: VersionKey) -> Result<bool, StorageError> {
        let sql = format!(
            "SELECT EXISTS(SELECT 1 FROM main.version_chain WHERE version_key = ?1) \
             OR EXISTS(SELECT 1 FROM {PRIMARY_ALIAS}.version_chain WHERE version_key = ?1)"
        );
        let in_use = self
            .conn
            .prepare_cached(&sql)?
            .query_row([version.as_bytes().as_slice()], |r| r.get::<_, bool>(0))?;
        Ok(in_use)
    }

    fn merge_into_primary(
        self,
        progress: &mut dyn FnMut(&MergeProgress),
    ) -> Result<MergeReport, StorageError> {
        let mut conn = self.conn;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Exclusive)?;
        let keys: usize = tx.query_row("SELECT COUNT(*) FROM temp.staged_keys", [], |r| {
            r.get::<_, i64>(0)
        })? as usize;

        let mut report = MergeReport {
            keys,
            ..Default::default()
        };
        let total = ALL_TABLES.len();
        for (i, table) in ALL_TABLES.iter().enumerate() {
            let owned = format!("{} IN (SELECT key FROM temp.staged_keys)", table.owner_column);
            tx.execute(
                &format!("DELETE FROM {PRIMARY_ALIAS}.{} WHERE {owned}", table.name),
                [],
            )?;
            let rows = tx.execute(
                &format!(
                    "INSERT OR REPLACE INTO {PRIMARY_ALIAS}.{0} SELECT * FROM main.{0} WHERE {owned}",
                    table.name
                ),
                [],
            )?;
            report.tables += 1;
            report.rows += rows;
            progress(&MergeProgress {
                table: table.name,
                index: i + 1,
                total,
                rows,
            });
        }
        tx.commit()?;
        log::info!(
            "event=staging_merge module=staging keys={} tables={} rows={}",
            report.keys,
            report.tables,
            report.rows
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mapper::{ConceptMapping, EntityMapping, EntityTagMapping};
    use crate::mapping::RowMapping;
    use crate::sqlite::{SqliteStore, insert_row, load_row, load_where, update_row};
    use crate::tables::{self, DEFAULT_REFERENCE_TABLES};
    use crate::mapper::VersionChainMapping;
    use hearth_core::concepts::status;
    use hearth_core::model::{Concept, Entity, EntityKind, Tag, VersionSnapshot};
    use hearth_core::Timestamp;

    fn stamped_entity() -> Entity {
        let mut e = Entity::of_kind(EntityKind::Place);
        e.status_concept_key = Some(status::NEW);
        e.meta.creation_time = Some(Timestamp::now());
        e.version.version_key = Some(VersionKey::new());
        e.version.version_sequence = Some(1);
        e
    }

    fn primary() -> (tempfile::TempDir, SqliteStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = SqliteStore::open(dir.path().join("primary.db"), Duration::from_secs(5)).unwrap();
        (dir, store)
    }

    #[test]
    fn reference_tables_are_copied() {
        let (dir, store) = primary();
        let mut concept = Concept::new("Female");
        concept.meta.creation_time = Some(Timestamp::now());
        concept.version.version_key = Some(VersionKey::new());
        concept.version.version_sequence = Some(1);
        let key = Key::new();
        insert_row(store.conn(), &ConceptMapping::to_row(key, &concept).unwrap()).unwrap();

        let reference: Vec<_> = DEFAULT_REFERENCE_TABLES
            .iter()
            .filter_map(|name| tables::by_name(name))
            .collect();
        let staging = SqliteStaging::new(dir.path().join("primary.db"), Duration::from_secs(5));
        let staged = staging.begin_staging(&reference).unwrap();
        assert!(load_row(staged.connection(), &tables::CONCEPT, key).unwrap().is_some());
    }

    #[test]
    fn missing_primary_is_a_staging_error() {
        let dir = tempfile::tempdir().unwrap();
        let staging = SqliteStaging::new(dir.path().join("absent.db"), Duration::from_secs(5));
        assert!(matches!(
            staging.begin_staging(&[]),
            Err(StorageError::Staging(_))
        ));
    }

    #[test]
    fn fault_in_copies_owned_rows_once() {
        let (dir, store) = primary();
        let key = Key::new();
        insert_row(store.conn(), &EntityMapping::to_row(key, &stamped_entity()).unwrap()).unwrap();
        let tag = Tag::new("colour", "red").with_source(key);
        insert_row(store.conn(), &EntityTagMapping::to_row(Key::new(), &tag).unwrap()).unwrap();

        let staged = SqliteStaging::new(dir.path().join("primary.db"), Duration::from_secs(5))
            .begin_staging(&[])
            .unwrap();
        assert!(staged.fault_in(key).unwrap());
        assert!(!staged.fault_in(key).unwrap());
        assert!(load_row(staged.connection(), &tables::ENTITY, key).unwrap().is_some());
        assert_eq!(
            load_where(staged.connection(), &tables::ENTITY_TAG, "source_key", key).unwrap().len(),
            1
        );
    }

    #[test]
    fn merge_replaces_only_touched_keys() {
        let (dir, store) = primary();
        let (touched, untouched) = (Key::new(), Key::new());
        for key in [touched, untouched] {
            insert_row(store.conn(), &EntityMapping::to_row(key, &stamped_entity()).unwrap()).unwrap();
            let tag = Tag::new("colour", "red").with_source(key);
            insert_row(store.conn(), &EntityTagMapping::to_row(Key::new(), &tag).unwrap()).unwrap();
        }

        let staged = SqliteStaging::new(dir.path().join("primary.db"), Duration::from_secs(5))
            .begin_staging(&[])
            .unwrap();
        staged.fault_in(touched).unwrap();
        staged.fault_in(untouched).unwrap();
        staged.mark_touched(touched).unwrap();
        let conn = staged.connection();
        let mut row = load_row(conn, &tables::ENTITY, touched).unwrap().unwrap();
        row.put_bool("hidden", true);
        update_row(conn, &row).unwrap();
        conn.execute("DELETE FROM entity_tag", []).unwrap();

        let mut seen = Vec::new();
        let report = staged
            .merge_into_primary(&mut |p| seen.push((p.table, p.index, p.total)))
            .unwrap();

        assert_eq!(report.keys, 1);
        assert_eq!(report.tables, ALL_TABLES.len());
        assert_eq!(seen.len(), ALL_TABLES.len());
        assert_eq!(seen[0], ("entity", 1, ALL_TABLES.len()));

        let primary = store.conn();
        assert!(load_row(primary, &tables::ENTITY, touched).unwrap().unwrap().bool("hidden"));
        assert!(load_where(primary, &tables::ENTITY_TAG, "source_key", touched).unwrap().is_empty());
        assert_eq!(load_where(primary, &tables::ENTITY_TAG, "source_key", untouched).unwrap().len(), 1);
    }

    #[test]
    fn version_in_use_sees_chains_never_faulted_in() {
        let (dir, store) = primary();
        let entity = stamped_entity();
        let used = entity.version.version_key.unwrap();
        let key = Key::new();
        insert_row(store.conn(), &EntityMapping::to_row(key, &entity).unwrap()).unwrap();
        let link = VersionSnapshot {
            version_key: used,
            version_sequence: 1,
            previous_version_key: None,
            created_by: None,
            creation_time: entity.meta.creation_time,
        };
        insert_row(store.conn(), &VersionChainMapping::to_row(key, &link).unwrap()).unwrap();

        let staged = SqliteStaging::new(dir.path().join("primary.db"), Duration::from_secs(5))
            .begin_staging(&[])
            .unwrap();
        assert!(staged.version_in_use(used).unwrap());
        assert!(!staged.version_in_use(VersionKey::new()).unwrap());
    }
}
