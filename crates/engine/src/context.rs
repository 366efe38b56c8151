use std::any::Any;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use rusqlite::Connection;

use hearth_core::{Key, Timestamp};
use hearth_storage::StagedStore;

use crate::cache::{CacheEntry, IdentityCache, LoadDepth};
use crate::config::StoreConfig;
use crate::error::EngineError;
use crate::registry::QueryRegistry;
use crate::worker::WorkQueue;

/// Shared, thread-safe collaborators.
pub struct Services {
    pub config: StoreConfig,
    pub cache: Option<Arc<dyn IdentityCache>>,
    pub registry: Arc<dyn QueryRegistry>,
    pub work: Option<Arc<dyn WorkQueue>>,
    /// Where the primary store lives; `None` for in-memory stores.
    pub store_path: Option<PathBuf>,
}

static SAVEPOINT_SEQ: AtomicU64 = AtomicU64::new(0);

/// Rolls back to the savepoint unless released.
struct Savepoint<'a> {
    conn: &'a Connection,
    name: String,
    released: bool,
}

impl<'a> Savepoint<'a> {
    fn begin(conn: &'a Connection) -> Result<Self, EngineError> {
        let name = format!("hearth_sp_{}", SAVEPOINT_SEQ.fetch_add(1, Ordering::Relaxed));
        conn.execute_batch(&format!("SAVEPOINT {name}"))?;
        Ok(Self {
            conn,
            name,
            released: false,
        })
    }

    fn release(mut self) -> Result<(), EngineError> {
        self.conn.execute_batch(&format!("RELEASE {}", self.name))?;
        self.released = true;
        Ok(())
    }
}

impl Drop for Savepoint<'_> {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        if let Err(e) = self
            .conn
            .execute_batch(&format!("ROLLBACK TO {0}; RELEASE {0}", self.name))
        {
            log::error!("event=savepoint_rollback_failed module=context savepoint={} error={e}", self.name);
        }
    }
}

/// Not shareable across threads: it borrows one connection.
pub struct DataContext<'c> {
    conn: &'c Connection,
    services: &'c Services,
    principal: Option<Key>,
    staged: Option<&'c dyn StagedStore>,
}

impl<'c> DataContext<'c> {
    pub fn new(conn: &'c Connection, services: &'c Services) -> Self {
        Self {
            conn,
            services,
            principal: None,
            staged: None,
        }
    }

    /// A context writing into a staging database.
    pub fn staged(store: &'c dyn StagedStore, services: &'c Services, principal: Option<Key>) -> Self {
        Self {
            conn: store.connection(),
            services,
            principal,
            staged: Some(store),
        }
    }

    pub fn with_principal(mut self, principal: Option<Key>) -> Self {
        self.principal = principal;
        self
    }

    pub fn conn(&self) -> &'c Connection {
        self.conn
    }

    pub fn services(&self) -> &'c Services {
        self.services
    }

    pub fn config(&self) -> &'c StoreConfig {
        &self.services.config
    }

    pub fn principal(&self) -> Option<Key> {
        self.principal
    }

    pub fn is_staged(&self) -> bool {
        self.staged.is_some()
    }

    pub fn staged_store(&self) -> Option<&'c dyn StagedStore> {
        self.staged
    }

    pub fn in_write_tx(&self) -> bool {
        !self.conn.is_autocommit()
    }

    pub fn now(&self) -> Timestamp {
        Timestamp::now()
    }

    /// Makes `key`'s rows readable. A no-op outside staging.
    pub fn fault_in(&self, key: Key) -> Result<(), EngineError> {
        if let Some(store) = self.staged {
            store.fault_in(key)?;
        }
        Ok(())
    }

    /// Faults `key` in and marks it for merging. Call before writing.
    pub fn touch(&self, key: Key) -> Result<(), EngineError> {
        if let Some(store) = self.staged {
            store.fault_in(key)?;
            store.mark_touched(key)?;
        }
        Ok(())
    }

    /// Runs `f` inside a savepoint, rolling back if it fails.
    pub fn in_transaction<T>(
        &self,
        f: impl FnOnce(&Self) -> Result<T, EngineError>,
    ) -> Result<T, EngineError> {
        let savepoint = Savepoint::begin(self.conn)?;
        let value = f(self)?;
        savepoint.release()?;
        Ok(value)
    }

    pub fn cached<T: Any + Clone>(&self, key: Key) -> Option<(T, LoadDepth)> {
        if self.is_staged() {
            return None;
        }
        let entry = self.services.cache.as_ref()?.get(key)?;
        entry.downcast::<T>().map(|model| (model, entry.depth))
    }

    /// Caches `model` unless a write transaction is open.
    pub fn remember<T: Any + Clone + Send + Sync>(&self, key: Key, model: &T, depth: LoadDepth) {
        if self.is_staged() || self.in_write_tx() {
            return;
        }
        if let Some(cache) = &self.services.cache {
            cache.add(key, CacheEntry::new(model.clone(), depth));
        }
    }

    pub fn forget(&self, key: Key) {
        if let Some(cache) = &self.services.cache {
            cache.remove(key);
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::cache::LruIdentityCache;
    use crate::registry::MemoryQueryRegistry;
    use hearth_storage::SqliteStore;
    use std::num::NonZeroUsize;

    pub(crate) fn services() -> Services {
        Services {
            config: StoreConfig::default(),
            cache: Some(Arc::new(LruIdentityCache::new(NonZeroUsize::new(64).unwrap()))),
            registry: Arc::new(MemoryQueryRegistry::new()),
            work: None,
            store_path: None,
        }
    }

    #[test]
    fn failed_transaction_rolls_back() {
        let store = SqliteStore::open_in_memory().unwrap();
        let services = services();
        let ctx = DataContext::new(store.conn(), &services);
        store.conn().execute_batch("CREATE TABLE t (x INTEGER)").unwrap();

        let result: Result<(), EngineError> = ctx.in_transaction(|ctx| {
            ctx.conn().execute("INSERT INTO t VALUES (1)", [])?;
            assert!(ctx.in_write_tx());
            Err(EngineError::Config("boom".into()))
        });
        assert!(result.is_err());
        assert!(!ctx.in_write_tx());
        let n: i64 = store.conn().query_row("SELECT COUNT(*) FROM t", [], |r| r.get(0)).unwrap();
        assert_eq!(n, 0);

        ctx.in_transaction(|ctx| {
            ctx.in_transaction(|ctx| Ok(ctx.conn().execute("INSERT INTO t VALUES (2)", [])?))
        })
        .unwrap();
        let n: i64 = store.conn().query_row("SELECT COUNT(*) FROM t", [], |r| r.get(0)).unwrap();
        assert_eq!(n, 1);
    }

    #[test]
    fn cache_is_not_populated_inside_a_write() {
        let store = SqliteStore::open_in_memory().unwrap();
        let services = services();
        let ctx = DataContext::new(store.conn(), &services);
        let (inside, outside) = (Key::new(), Key::new());

        ctx.in_transaction(|ctx| {
            ctx.remember(inside, &1_i64, LoadDepth::Full);
            Ok(())
        })
        .unwrap();
        ctx.remember(outside, &2_i64, LoadDepth::Full);

        assert!(ctx.cached::<i64>(inside).is_none());
        assert_eq!(ctx.cached::<i64>(outside), Some((2, LoadDepth::Full)));
        ctx.forget(outside);
        assert!(ctx.cached::<i64>(outside).is_none());
    }
}
