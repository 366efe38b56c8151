use std::collections::HashMap;

use hearth_core::model::Identified;
use hearth_core::{BundleItem, BundleModel, Key, ModelType};

use crate::context::DataContext;
use crate::error::EngineError;
use crate::persister::{
    ActPersister, ConceptPersister, ConceptSetPersister, EntityPersister, Persister,
    SecurityRolePersister, SecurityUserPersister,
};

/// The type-erased face of a persister, as the bundle coordinator sees it.
pub trait ItemPersister: Send + Sync {
    fn model_type(&self) -> ModelType;

    fn exists(&self, ctx: &DataContext<'_>, key: Key) -> Result<bool, EngineError>;

    /// Updates a stored record, inserts anything else.
    fn save(&self, ctx: &DataContext<'_>, item: BundleItem) -> Result<BundleItem, EngineError>;
}

impl<P> ItemPersister for P
where
    P: Persister + Send + Sync,
    P::Model: BundleModel,
{
    fn model_type(&self) -> ModelType {
        Persister::model_type(self)
    }

    fn exists(&self, ctx: &DataContext<'_>, key: Key) -> Result<bool, EngineError> {
        Persister::exists(self, ctx, key)
    }

    fn save(&self, ctx: &DataContext<'_>, item: BundleItem) -> Result<BundleItem, EngineError> {
        let model = P::Model::from_item(item).map_err(|other| {
            EngineError::NoPersister(format!(
                "{} item routed to the {} persister",
                other.model_type().name(),
                Persister::model_type(self).name()
            ))
        })?;
        let saved = match model.key() {
            Some(key) if Persister::exists(self, ctx, key)? => self.update(ctx, model)?,
            _ => self.insert(ctx, model)?,
        };
        Ok(saved.into_item())
    }
}

#[derive(Default)]
pub struct PersisterRegistry {
    persisters: HashMap<ModelType, Box<dyn ItemPersister>>,
}

impl PersisterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// One persister per model type the core knows.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(EntityPersister::new());
        registry.register(ActPersister::new());
        registry.register(ConceptPersister);
        registry.register(ConceptSetPersister);
        registry.register(SecurityUserPersister);
        registry.register(SecurityRolePersister);
        registry
    }

    /// Replaces any persister already registered for the same type.
    pub fn register(&mut self, persister: impl ItemPersister + 'static) {
        self.persisters.insert(persister.model_type(), Box::new(persister));
    }

    pub fn resolve(&self, model_type: ModelType) -> Result<&dyn ItemPersister, EngineError> {
        self.persisters
            .get(&model_type)
            .map(|p| p.as_ref())
            .ok_or_else(|| EngineError::NoPersister(model_type.name().to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::tests::services;
    use hearth_core::model::{Concept, SecurityRole};
    use hearth_storage::SqliteStore;

    #[test]
    fn save_inserts_then_updates() {
        let store = SqliteStore::open_in_memory().unwrap();
        let services = services();
        let ctx = DataContext::new(store.conn(), &services);
        let registry = PersisterRegistry::with_defaults();
        let persister = registry.resolve(ModelType::Concept).unwrap();

        let first = persister.save(&ctx, Concept::new("Male").into()).unwrap();
        let BundleItem::Concept(saved) = first else {
            panic!("expected a concept");
        };
        assert_eq!(saved.version.version_sequence, Some(1));

        let second = persister.save(&ctx, BundleItem::Concept(saved)).unwrap();
        let BundleItem::Concept(updated) = second else {
            panic!("expected a concept");
        };
        assert_eq!(updated.version.version_sequence, Some(2));
    }

    #[test]
    fn unregistered_type_is_an_error() {
        let registry = PersisterRegistry::new();
        assert!(matches!(
            registry.resolve(ModelType::SecurityRole),
            Err(EngineError::NoPersister(_))
        ));
    }

    #[test]
    fn mismatched_item_is_rejected() {
        let store = SqliteStore::open_in_memory().unwrap();
        let services = services();
        let ctx = DataContext::new(store.conn(), &services);
        let registry = PersisterRegistry::with_defaults();
        let persister = registry.resolve(ModelType::Concept).unwrap();
        let err = persister
            .save(&ctx, SecurityRole::default().into())
            .unwrap_err();
        assert!(matches!(err, EngineError::NoPersister(_)));
    }
}
