use std::mem;

use hearth_core::model::{Concept, ConceptSet, VersionSnapshot};
use hearth_core::{Key, ModelType};
use hearth_storage::mapper::{ConceptMapping, ConceptNameMapping, ConceptSetMapping, ConceptSetMemberMapping};
use hearth_storage::{Predicate, QueryOptions, TableMap, tables};

use super::{Persister, fetch, obsolete_stored, required_key, sync};
use crate::cache::LoadDepth;
use crate::context::DataContext;
use crate::error::EngineError;
use crate::persistence::{base, hydrate, identified, versioned};

/// Versioned vocabulary terms and their display names.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConceptPersister;

impl ConceptPersister {
    /// The live concept with this mnemonic, if any.
    pub fn find_by_mnemonic(&self, ctx: &DataContext<'_>, mnemonic: &str) -> Result<Option<Concept>, EngineError> {
        let page = self.query(ctx, &Predicate::eq("mnemonic", mnemonic), &QueryOptions::page(0, 1), None)?;
        Ok(page.results.into_iter().next())
    }

    pub fn version_chain(&self, ctx: &DataContext<'_>, key: Key) -> Result<Vec<VersionSnapshot>, EngineError> {
        versioned::chain(ctx, key)
    }
}

impl Persister for ConceptPersister {
    type Model = Concept;

    fn model_type(&self) -> ModelType {
        ModelType::Concept
    }

    fn query_table(&self) -> &'static TableMap {
        &tables::CONCEPT
    }

    fn insert(&self, ctx: &DataContext<'_>, mut concept: Concept) -> Result<Concept, EngineError> {
        ctx.in_transaction(|ctx| {
            let key = identified::assign_key(&mut concept);
            ctx.touch(key)?;
            versioned::insert::<ConceptMapping>(ctx, &mut concept)?;
            concept.names = sync::<ConceptNameMapping>(ctx, key, mem::take(&mut concept.names))?;
            ctx.forget(key);
            Ok(concept)
        })
    }

    fn update(&self, ctx: &DataContext<'_>, mut concept: Concept) -> Result<Concept, EngineError> {
        let key = required_key(&concept, ModelType::Concept)?;
        ctx.in_transaction(|ctx| {
            ctx.touch(key)?;
            let existing = identified::load_existing::<ConceptMapping>(ctx, key)?;
            versioned::update::<ConceptMapping>(ctx, &mut concept, &existing)?;
            concept.names = sync::<ConceptNameMapping>(ctx, key, mem::take(&mut concept.names))?;
            ctx.forget(key);
            Ok(concept)
        })
    }

    fn obsolete(&self, ctx: &DataContext<'_>, concept: Concept) -> Result<Concept, EngineError> {
        let key = required_key(&concept, ModelType::Concept)?;
        ctx.in_transaction(|ctx| {
            ctx.touch(key)?;
            let obsoleted = obsolete_stored::<ConceptMapping>(ctx, key, &concept.meta, versioned::obsolete::<ConceptMapping>)?;
            ctx.forget(key);
            let mut stored = self.get(ctx, key)?;
            if let Some(current) = obsoleted {
                stored.version = current.version;
            }
            Ok(stored)
        })
    }

    fn load(&self, ctx: &DataContext<'_>, key: Key, depth: LoadDepth) -> Result<Option<Concept>, EngineError> {
        hydrate(
            ctx,
            key,
            depth,
            |ctx| identified::load::<ConceptMapping>(ctx, key),
            |ctx, concept| {
                concept.names = fetch::<ConceptNameMapping>(ctx, key)?;
                Ok(())
            },
        )
    }
}

/// Soft-deletable sets of concepts. Members are link rows keyed by concept.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConceptSetPersister;

impl Persister for ConceptSetPersister {
    type Model = ConceptSet;

    fn model_type(&self) -> ModelType {
        ModelType::ConceptSet
    }

    fn query_table(&self) -> &'static TableMap {
        &tables::CONCEPT_SET
    }

    fn insert(&self, ctx: &DataContext<'_>, mut set: ConceptSet) -> Result<ConceptSet, EngineError> {
        ctx.in_transaction(|ctx| {
            let key = identified::assign_key(&mut set);
            ctx.touch(key)?;
            base::insert::<ConceptSetMapping>(ctx, &mut set)?;
            set.members = sync::<ConceptSetMemberMapping>(ctx, key, mem::take(&mut set.members))?;
            ctx.forget(key);
            Ok(set)
        })
    }

    fn update(&self, ctx: &DataContext<'_>, mut set: ConceptSet) -> Result<ConceptSet, EngineError> {
        let key = required_key(&set, ModelType::ConceptSet)?;
        ctx.in_transaction(|ctx| {
            ctx.touch(key)?;
            let existing = identified::load_existing::<ConceptSetMapping>(ctx, key)?;
            base::update::<ConceptSetMapping>(ctx, &mut set, &existing)?;
            set.members = sync::<ConceptSetMemberMapping>(ctx, key, mem::take(&mut set.members))?;
            ctx.forget(key);
            Ok(set)
        })
    }

    fn obsolete(&self, ctx: &DataContext<'_>, set: ConceptSet) -> Result<ConceptSet, EngineError> {
        let key = required_key(&set, ModelType::ConceptSet)?;
        ctx.in_transaction(|ctx| {
            ctx.touch(key)?;
            obsolete_stored::<ConceptSetMapping>(ctx, key, &set.meta, base::obsolete::<ConceptSetMapping>)?;
            ctx.forget(key);
            self.get(ctx, key)
        })
    }

    fn load(&self, ctx: &DataContext<'_>, key: Key, depth: LoadDepth) -> Result<Option<ConceptSet>, EngineError> {
        hydrate(
            ctx,
            key,
            depth,
            |ctx| identified::load::<ConceptSetMapping>(ctx, key),
            |ctx, set| {
                set.members = fetch::<ConceptSetMemberMapping>(ctx, key)?;
                Ok(())
            },
        )
    }
}
