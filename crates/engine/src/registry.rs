use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use hearth_core::{Key, QueryId};

pub trait QueryRegistry: Send + Sync {
    fn is_registered(&self, id: QueryId) -> bool;

    /// Replaces any set already registered under `id`.
    fn register_query_set(&self, id: QueryId, keys: Vec<Key>);

    /// Empty when `id` is unknown or `offset` is past the end.
    fn get_results(&self, id: QueryId, offset: usize, count: Option<usize>) -> Vec<Key>;

    fn result_total(&self, id: QueryId) -> Option<usize>;
}

#[derive(Default)]
pub struct MemoryQueryRegistry {
    sets: RwLock<HashMap<QueryId, Vec<Key>>>,
}

impl MemoryQueryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<QueryId, Vec<Key>>> {
        self.sets.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<QueryId, Vec<Key>>> {
        self.sets.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl QueryRegistry for MemoryQueryRegistry {
    fn is_registered(&self, id: QueryId) -> bool {
        self.read().contains_key(&id)
    }

    fn register_query_set(&self, id: QueryId, keys: Vec<Key>) {
        log::debug!("event=query_registered module=registry query_id={id} keys={}", keys.len());
        self.write().insert(id, keys);
    }

    fn get_results(&self, id: QueryId, offset: usize, count: Option<usize>) -> Vec<Key> {
        let sets = self.read();
        let Some(keys) = sets.get(&id) else {
            return Vec::new();
        };
        let rest = keys.iter().skip(offset).copied();
        match count {
            Some(n) => rest.take(n).collect(),
            None => rest.collect(),
        }
    }

    fn result_total(&self, id: QueryId) -> Option<usize> {
        self.read().get(&id).map(Vec::len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pages_a_registered_set() {
        let registry = MemoryQueryRegistry::new();
        let id = QueryId::new();
        let keys: Vec<Key> = (0..5).map(|_| Key::new()).collect();
        assert!(!registry.is_registered(id));

        registry.register_query_set(id, keys.clone());
        assert!(registry.is_registered(id));
        assert_eq!(registry.result_total(id), Some(5));
        assert_eq!(registry.get_results(id, 1, Some(2)), keys[1..3].to_vec());
        assert_eq!(registry.get_results(id, 3, None), keys[3..].to_vec());
        assert!(registry.get_results(id, 9, Some(2)).is_empty());
        assert!(registry.get_results(QueryId::new(), 0, None).is_empty());
    }
}
