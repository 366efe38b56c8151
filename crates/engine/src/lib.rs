pub mod bundle;
pub mod cache;
pub mod config;
pub mod context;
pub mod dispatch;
pub mod error;
pub mod locator;
pub mod logging;
pub mod persistence;
pub mod persister;
pub mod query;
pub mod reconcile;
pub mod registry;
pub mod worker;

pub use bundle::{BundleCoordinator, ImportOutcome, ImportStrategy};
pub use cache::{IdentityCache, LoadDepth, LruIdentityCache};
pub use config::StoreConfig;
pub use context::{DataContext, Services};
pub use error::EngineError;
pub use locator::{ItemPersister, PersisterRegistry};
pub use persister::{
    ActPersister, ConceptPersister, ConceptSetPersister, EntityPersister, Persister,
    SecurityRolePersister, SecurityUserPersister,
};
pub use query::QueryResult;
pub use registry::{MemoryQueryRegistry, QueryRegistry};
pub use worker::{WorkQueue, WorkerPool};

use std::num::NonZeroUsize;
use std::path::Path;
use std::sync::Arc;

use hearth_core::{Bundle, Key};
use hearth_storage::SqliteStore;

/// One open store with its shared services and persister registry.
///
/// Hands out [`DataContext`]s over its connection. Not shareable across
/// threads; background query registration opens its own read-only
/// connections.
pub struct Engine {
    store: SqliteStore,
    services: Services,
    persisters: PersisterRegistry,
    workers: Option<Arc<WorkerPool>>,
    principal: Option<Key>,
}

impl Engine {
    pub fn open(path: impl AsRef<Path>, config: StoreConfig) -> Result<Self, EngineError> {
        config.validate()?;
        let store = SqliteStore::open(path, config.busy_timeout())?;
        let workers = if config.background_query_registration {
            Some(Arc::new(WorkerPool::new(config.worker_threads)?))
        } else {
            None
        };
        Self::assemble(store, config, workers)
    }

    pub fn open_in_memory(config: StoreConfig) -> Result<Self, EngineError> {
        config.validate()?;
        let store = SqliteStore::open_in_memory()?;
        Self::assemble(store, config, None)
    }

    fn assemble(
        store: SqliteStore,
        config: StoreConfig,
        workers: Option<Arc<WorkerPool>>,
    ) -> Result<Self, EngineError> {
        let capacity = NonZeroUsize::new(config.cache_capacity)
            .ok_or_else(|| EngineError::Config("cache_capacity must be positive".into()))?;
        let services = Services {
            cache: Some(Arc::new(LruIdentityCache::new(capacity))),
            registry: Arc::new(MemoryQueryRegistry::new()),
            work: workers.clone().map(|pool| pool as Arc<dyn WorkQueue>),
            store_path: store.path().map(Path::to_path_buf),
            config,
        };
        log::info!(
            "event=engine_open module=engine path={} bulk_threshold={} workers={}",
            services
                .store_path
                .as_deref()
                .map(|p| p.display().to_string())
                .unwrap_or_else(|| ":memory:".into()),
            services.config.bulk_threshold,
            workers.as_ref().map_or(0, |_| services.config.worker_threads.max(1))
        );
        Ok(Self {
            store,
            services,
            persisters: PersisterRegistry::with_defaults(),
            workers,
            principal: None,
        })
    }

    /// Principal recorded as creator or obsoleter on subsequent writes.
    pub fn with_principal(mut self, principal: Key) -> Self {
        self.principal = Some(principal);
        self
    }

    pub fn context(&self) -> DataContext<'_> {
        DataContext::new(self.store.conn(), &self.services).with_principal(self.principal)
    }

    pub fn import(&self, bundle: Bundle) -> Result<ImportOutcome, EngineError> {
        BundleCoordinator::new(&self.persisters).import(&self.context(), bundle)
    }

    /// Blocks until background query registrations have finished.
    pub fn wait_idle(&self) {
        if let Some(workers) = &self.workers {
            workers.wait_idle();
        }
    }

    pub fn store(&self) -> &SqliteStore {
        &self.store
    }

    pub fn services(&self) -> &Services {
        &self.services
    }

    pub fn persisters(&self) -> &PersisterRegistry {
        &self.persisters
    }

    pub fn persisters_mut(&mut self) -> &mut PersisterRegistry {
        &mut self.persisters
    }
}
