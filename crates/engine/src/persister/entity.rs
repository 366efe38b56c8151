use std::mem;

use hearth_core::concepts::status;
use hearth_core::model::{
    AddressComponent, Entity, EntityAddress, EntityDetail, EntityKind, EntityName, NameComponent,
    VersionSnapshot,
};
use hearth_core::{Key, ModelType, QueryId};
use hearth_storage::mapper::{
    AddressComponentMapping, EntityAddressMapping, EntityExtensionMapping,
    EntityIdentifierMapping, EntityMapping, EntityNameMapping, EntityNoteMapping,
    EntityRelationshipMapping, EntityTagMapping, NameComponentMapping, PlaceServiceMapping,
    TelecomMapping,
};
use hearth_storage::{NamedFilters, QueryOptions, RowMapping, TableMap, TableRow, compile_filters, named, sqlite, tables};

use super::{
    Persister, ensure_exists, fetch, fetch_with_components, hydrate_page, obsolete_stored,
    required_key, sync, sync_with_components,
};
use crate::cache::LoadDepth;
use crate::context::DataContext;
use crate::dispatch::entity_handler;
use crate::error::EngineError;
use crate::persistence::{hydrate, identified, versioned};
use crate::query::{self, KeyQuery, QueryResult};

fn name_components(name: &mut EntityName) -> &mut Vec<NameComponent> {
    &mut name.components
}

fn address_components(address: &mut EntityAddress) -> &mut Vec<AddressComponent> {
    &mut address.components
}

/// Persists the entity family. A persister bound to a kind defaults the
/// class of unclassified entities and queries that kind's table.
#[derive(Debug, Clone, Copy, Default)]
pub struct EntityPersister {
    kind: Option<EntityKind>,
}

impl EntityPersister {
    pub fn new() -> Self {
        Self { kind: None }
    }

    pub fn for_kind(kind: EntityKind) -> Self {
        Self { kind: Some(kind) }
    }

    /// Fills a missing class and reshapes the detail to match it.
    fn conform(&self, entity: &mut Entity, stored_class: Option<Key>) -> EntityKind {
        if entity.class_concept_key.is_none() {
            let fallback = self.kind.unwrap_or_else(|| entity.detail.kind());
            entity.class_concept_key = stored_class.or(Some(fallback.class_key()));
        }
        let kind = entity.kind();
        entity.detail = mem::take(&mut entity.detail).conform_to(kind);
        kind
    }

    fn write_subtype_and_collections(
        &self,
        ctx: &DataContext<'_>,
        key: Key,
        kind: EntityKind,
        entity: &mut Entity,
    ) -> Result<(), EngineError> {
        entity_handler(kind).write(ctx, key, entity)?;

        entity.identifiers = sync::<EntityIdentifierMapping>(ctx, key, mem::take(&mut entity.identifiers))?;
        entity.names = sync_with_components::<EntityNameMapping, NameComponentMapping>(
            ctx,
            key,
            mem::take(&mut entity.names),
            name_components,
        )?;
        entity.addresses = sync_with_components::<EntityAddressMapping, AddressComponentMapping>(
            ctx,
            key,
            mem::take(&mut entity.addresses),
            address_components,
        )?;
        entity.telecoms = sync::<TelecomMapping>(ctx, key, mem::take(&mut entity.telecoms))?;
        entity.tags = sync::<EntityTagMapping>(ctx, key, mem::take(&mut entity.tags))?;
        entity.extensions = sync::<EntityExtensionMapping>(ctx, key, mem::take(&mut entity.extensions))?;
        entity.notes = sync::<EntityNoteMapping>(ctx, key, mem::take(&mut entity.notes))?;

        for relationship in &mut entity.relationships {
            if let Some(target) = relationship.target_entity.as_deref_mut() {
                relationship.target_key = Some(ensure_exists(ctx, &EntityPersister::new(), target)?);
            }
        }
        entity.relationships =
            sync::<EntityRelationshipMapping>(ctx, key, mem::take(&mut entity.relationships))?;

        if let EntityDetail::Place(place) = &mut entity.detail {
            place.services = sync::<PlaceServiceMapping>(ctx, key, mem::take(&mut place.services))?;
        }
        Ok(())
    }

    fn load_shallow(&self, ctx: &DataContext<'_>, key: Key) -> Result<Option<Entity>, EngineError> {
        ctx.fault_in(key)?;
        let Some(row) = sqlite::load_row(ctx.conn(), &tables::ENTITY, key)? else {
            return Ok(None);
        };
        let mut entity = EntityMapping::from_row(&row)?;
        let kind = entity.kind();
        entity.detail = EntityDetail::default_for(kind);
        entity_handler(kind).read(ctx, key, &mut entity)?;
        Ok(Some(entity))
    }

    fn load_collections(&self, ctx: &DataContext<'_>, key: Key, entity: &mut Entity) -> Result<(), EngineError> {
        entity.identifiers = fetch::<EntityIdentifierMapping>(ctx, key)?;
        entity.names = fetch_with_components::<EntityNameMapping, NameComponentMapping>(
            ctx,
            key,
            name_components,
            |c| c.sequence,
        )?;
        entity.addresses = fetch_with_components::<EntityAddressMapping, AddressComponentMapping>(
            ctx,
            key,
            address_components,
            |c| c.sequence,
        )?;
        entity.telecoms = fetch::<TelecomMapping>(ctx, key)?;
        entity.tags = fetch::<EntityTagMapping>(ctx, key)?;
        entity.extensions = fetch::<EntityExtensionMapping>(ctx, key)?;
        entity.notes = fetch::<EntityNoteMapping>(ctx, key)?;
        entity.relationships = fetch::<EntityRelationshipMapping>(ctx, key)?;
        if let EntityDetail::Place(place) = &mut entity.detail {
            place.services = fetch::<PlaceServiceMapping>(ctx, key)?;
        }
        Ok(())
    }

    /// String-filter query over the entity search view.
    pub fn query_named(
        &self,
        ctx: &DataContext<'_>,
        filters: &NamedFilters,
        options: &QueryOptions,
        query_id: Option<QueryId>,
    ) -> Result<QueryResult<Entity>, EngineError> {
        let filter = compile_filters(&named::ENTITY_SEARCH, filters, options)?;
        let (keys, total) = query::execute(ctx, KeyQuery::named(&filter, options), options, query_id)?;
        hydrate_page(self, ctx, keys, total, query_id)
    }

    pub fn version_chain(&self, ctx: &DataContext<'_>, key: Key) -> Result<Vec<VersionSnapshot>, EngineError> {
        versioned::chain(ctx, key)
    }
}

impl Persister for EntityPersister {
    type Model = Entity;

    fn model_type(&self) -> ModelType {
        ModelType::Entity
    }

    fn query_table(&self) -> &'static TableMap {
        match self.kind {
            Some(kind) => entity_handler(kind).table(),
            None => &tables::ENTITY,
        }
    }

    fn insert(&self, ctx: &DataContext<'_>, mut entity: Entity) -> Result<Entity, EngineError> {
        ctx.in_transaction(|ctx| {
            let key = identified::assign_key(&mut entity);
            ctx.touch(key)?;
            let kind = self.conform(&mut entity, None);
            entity.status_concept_key.get_or_insert(status::NEW);
            versioned::insert::<EntityMapping>(ctx, &mut entity)?;
            self.write_subtype_and_collections(ctx, key, kind, &mut entity)?;
            ctx.forget(key);
            log::debug!("event=entity_inserted module=persister key={key} kind={kind:?}");
            Ok(entity)
        })
    }

    fn update(&self, ctx: &DataContext<'_>, mut entity: Entity) -> Result<Entity, EngineError> {
        let key = required_key(&entity, ModelType::Entity)?;
        ctx.in_transaction(|ctx| {
            ctx.touch(key)?;
            let existing = identified::load_existing::<EntityMapping>(ctx, key)?;
            let kind = self.conform(&mut entity, existing.key("class_concept_key")?);
            versioned::update::<EntityMapping>(ctx, &mut entity, &existing)?;
            self.write_subtype_and_collections(ctx, key, kind, &mut entity)?;
            ctx.forget(key);
            Ok(entity)
        })
    }

    fn obsolete(&self, ctx: &DataContext<'_>, entity: Entity) -> Result<Entity, EngineError> {
        let key = required_key(&entity, ModelType::Entity)?;
        ctx.in_transaction(|ctx| {
            ctx.touch(key)?;
            let obsoleted = obsolete_stored::<EntityMapping>(
                ctx,
                key,
                &entity.meta,
                |ctx: &DataContext<'_>, current: &mut Entity, existing: &TableRow| {
                    current.status_concept_key = Some(status::OBSOLETE);
                    versioned::obsolete::<EntityMapping>(ctx, current, existing)
                },
            )?;
            ctx.forget(key);
            let mut stored = self.get(ctx, key)?;
            if let Some(current) = obsoleted {
                stored.version = current.version;
            }
            Ok(stored)
        })
    }

    fn load(&self, ctx: &DataContext<'_>, key: Key, depth: LoadDepth) -> Result<Option<Entity>, EngineError> {
        hydrate(
            ctx,
            key,
            depth,
            |ctx| self.load_shallow(ctx, key),
            |ctx, entity| self.load_collections(ctx, key, entity),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::tests::services;
    use hearth_core::Timestamp;
    use hearth_core::concepts::relationship;
    use hearth_core::model::{EntityRelationship, Identifier, PatientDetail, PersonDetail, PlaceDetail, PlaceService};
    use hearth_storage::SqliteStore;

    fn patient() -> Entity {
        Entity::patient(PatientDetail {
            person: PersonDetail {
                date_of_birth: Some(Timestamp::from_ymd(1984, 3, 9).unwrap()),
                ..Default::default()
            },
            ..Default::default()
        })
    }

    #[test]
    fn patient_round_trips_typed() {
        let store = SqliteStore::open_in_memory().unwrap();
        let services = services();
        let ctx = DataContext::new(store.conn(), &services);
        let persister = EntityPersister::new();

        let mut entity = patient();
        entity.names.push(EntityName::from_parts(None, &["Ada", "Lovelace"]));
        entity.identifiers.push(Identifier::new("NHS", "943 476 5919"));
        let saved = persister.insert(&ctx, entity).unwrap();
        let key = saved.key.unwrap();

        let loaded = persister.get(&ctx, key).unwrap();
        assert_eq!(loaded.kind(), EntityKind::Patient);
        assert_eq!(
            loaded.detail.person().and_then(|p| p.date_of_birth),
            Some(Timestamp::from_ymd(1984, 3, 9).unwrap())
        );
        assert_eq!(loaded.names.len(), 1);
        let parts: Vec<_> = loaded.names[0]
            .components
            .iter()
            .filter_map(|c| c.value.clone())
            .collect();
        assert_eq!(parts, ["Ada", "Lovelace"]);
        assert_eq!(loaded.identifiers[0].source_key, Some(key));
    }

    #[test]
    fn unclassified_entity_takes_its_class_from_the_detail() {
        let store = SqliteStore::open_in_memory().unwrap();
        let services = services();
        let ctx = DataContext::new(store.conn(), &services);

        let entity = Entity {
            detail: EntityDetail::Place(PlaceDetail {
                services: vec![
                    PlaceService {
                        service_concept_key: Some(Key::new()),
                        schedule: Some("Mon-Fri".into()),
                        ..Default::default()
                    },
                    // No service concept: dropped as empty.
                    PlaceService::default(),
                ],
                ..Default::default()
            }),
            ..Default::default()
        };
        let saved = EntityPersister::new().insert(&ctx, entity).unwrap();
        let loaded = EntityPersister::new().get(&ctx, saved.key.unwrap()).unwrap();
        assert_eq!(loaded.kind(), EntityKind::Place);
        assert_eq!(loaded.detail.as_place().map(|p| p.services.len()), Some(1));
    }

    #[test]
    fn update_replaces_names_and_their_components() {
        let store = SqliteStore::open_in_memory().unwrap();
        let services = services();
        let ctx = DataContext::new(store.conn(), &services);
        let persister = EntityPersister::new();

        let mut entity = patient();
        entity.names.push(EntityName::from_parts(None, &["Old", "Name"]));
        let mut saved = persister.insert(&ctx, entity).unwrap();
        saved.names = vec![EntityName::from_parts(None, &["New"])];
        let updated = persister.update(&ctx, saved).unwrap();

        let key = updated.key.unwrap();
        let loaded = persister.get(&ctx, key).unwrap();
        assert_eq!(loaded.names.len(), 1);
        assert_eq!(loaded.names[0].components.len(), 1);
        let orphans: i64 = store
            .conn()
            .query_row("SELECT COUNT(*) FROM entity_name_component", [], |r| r.get(0))
            .unwrap();
        assert_eq!(orphans, 1);
    }

    #[test]
    fn relationship_target_is_saved_on_demand() {
        let store = SqliteStore::open_in_memory().unwrap();
        let services = services();
        let ctx = DataContext::new(store.conn(), &services);
        let persister = EntityPersister::new();

        let mother = Entity::person(PersonDetail::default());
        let mut child = patient();
        child.relationships.push(EntityRelationship {
            relationship_type_key: Some(relationship::MOTHER),
            target_entity: Some(Box::new(mother)),
            ..Default::default()
        });
        let saved = persister.insert(&ctx, child).unwrap();
        let target = saved.relationships[0].target_key.unwrap();
        assert!(persister.exists(&ctx, target).unwrap());
        assert_eq!(persister.get(&ctx, target).unwrap().kind(), EntityKind::Person);
    }

    #[test]
    fn obsolete_is_idempotent() {
        let store = SqliteStore::open_in_memory().unwrap();
        let services = services();
        let principal = Key::new();
        let ctx = DataContext::new(store.conn(), &services).with_principal(Some(principal));
        let persister = EntityPersister::new();

        let saved = persister.insert(&ctx, patient()).unwrap();
        let first = persister.obsolete(&ctx, saved.clone()).unwrap();
        assert_eq!(first.meta.obsoleted_by, Some(principal));
        assert_eq!(first.status_concept_key, Some(status::OBSOLETE));
        assert_eq!(first.version.version_sequence, Some(2));

        let other = DataContext::new(store.conn(), &services).with_principal(Some(Key::new()));
        let second = persister.obsolete(&other, saved).unwrap();
        assert_eq!(second.meta.obsoleted_by, Some(principal));
        assert_eq!(second.version.version_sequence, Some(2));
        assert_eq!(persister.version_chain(&ctx, first.key.unwrap()).unwrap().len(), 2);
    }
}
