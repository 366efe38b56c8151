use std::any::Any;
use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex, MutexGuard};

use lru::LruCache;

use hearth_core::Key;

/// How much of a record a hydration loaded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum LoadDepth {
    /// Root and subtype rows.
    Shallow,
    /// Plus every association collection.
    Full,
}

#[derive(Clone)]
pub struct CacheEntry {
    pub model: Arc<dyn Any + Send + Sync>,
    pub depth: LoadDepth,
}

impl CacheEntry {
    pub fn new<T: Any + Send + Sync>(model: T, depth: LoadDepth) -> Self {
        Self {
            model: Arc::new(model),
            depth,
        }
    }

    pub fn downcast<T: Any + Clone>(&self) -> Option<T> {
        self.model.downcast_ref::<T>().cloned()
    }
}

impl std::fmt::Debug for CacheEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheEntry").field("depth", &self.depth).finish_non_exhaustive()
    }
}

pub trait IdentityCache: Send + Sync {
    fn get(&self, key: Key) -> Option<CacheEntry>;
    fn add(&self, key: Key, entry: CacheEntry);
    fn remove(&self, key: Key);
}

pub struct LruIdentityCache {
    entries: Mutex<LruCache<Key, CacheEntry>>,
}

impl LruIdentityCache {
    pub fn new(capacity: NonZeroUsize) -> Self {
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
        }
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> MutexGuard<'_, LruCache<Key, CacheEntry>> {
        // A panic while holding the lock cannot leave the map half-updated.
        self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl IdentityCache for LruIdentityCache {
    fn get(&self, key: Key) -> Option<CacheEntry> {
        self.lock().get(&key).cloned()
    }

    fn add(&self, key: Key, entry: CacheEntry) {
        let mut entries = self.lock();
        if let Some(existing) = entries.peek(&key) {
            if existing.depth > entry.depth {
                return;
            }
        }
        entries.put(key, entry);
    }

    fn remove(&self, key: Key) {
        self.lock().pop(&key);
    }
}
