use std::mem;

use hearth_core::concepts::{mood, status};
use hearth_core::model::{Act, ActDetail, ActKind, VersionSnapshot};
use hearth_core::{Key, ModelType};
use hearth_storage::mapper::{
    ActExtensionMapping, ActIdentifierMapping, ActMapping, ActNoteMapping,
    ActParticipationMapping, ActRelationshipMapping, ActTagMapping,
};
use hearth_storage::{RowMapping, TableMap, TableRow, sqlite, tables};

use super::{EntityPersister, Persister, ensure_exists, fetch, obsolete_stored, required_key, sync};
use crate::cache::LoadDepth;
use crate::context::DataContext;
use crate::dispatch::{act_handler, stored_act_kind};
use crate::error::EngineError;
use crate::persistence::{hydrate, identified, versioned};

/// Whether `detail` is the shape the class family expects.
fn fits_class(detail: &ActDetail, family: ActKind) -> bool {
    matches!(
        (detail, family),
        (ActDetail::Generic, ActKind::Generic)
            | (ActDetail::Observation(_), ActKind::Observation)
            | (ActDetail::SubstanceAdministration(_), ActKind::SubstanceAdministration)
            | (ActDetail::PatientEncounter(_), ActKind::PatientEncounter)
            | (ActDetail::ControlAct, ActKind::ControlAct)
    )
}

fn detail_family(detail: &ActDetail) -> ActKind {
    match detail {
        ActDetail::Generic => ActKind::Generic,
        ActDetail::Observation(_) => ActKind::Observation,
        ActDetail::SubstanceAdministration(_) => ActKind::SubstanceAdministration,
        ActDetail::PatientEncounter(_) => ActKind::PatientEncounter,
        ActDetail::ControlAct => ActKind::ControlAct,
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ActPersister {
    kind: Option<ActKind>,
}

impl ActPersister {
    pub fn new() -> Self {
        Self { kind: None }
    }

    pub fn for_kind(kind: ActKind) -> Self {
        Self { kind: Some(kind) }
    }

    fn conform(&self, act: &mut Act, stored_class: Option<Key>) -> ActKind {
        if act.class_concept_key.is_none() {
            let fallback = self.kind.unwrap_or_else(|| detail_family(&act.detail));
            act.class_concept_key = stored_class.or(Some(fallback.class_key()));
        }
        let family = ActKind::resolve(act.class_concept_key, None);
        if !fits_class(&act.detail, family) {
            act.detail = ActDetail::default_for(family);
        }
        act.kind()
    }

    fn write_subtype_and_collections(
        &self,
        ctx: &DataContext<'_>,
        key: Key,
        kind: ActKind,
        act: &mut Act,
    ) -> Result<(), EngineError> {
        act_handler(kind).write(ctx, key, act)?;

        act.identifiers = sync::<ActIdentifierMapping>(ctx, key, mem::take(&mut act.identifiers))?;
        act.tags = sync::<ActTagMapping>(ctx, key, mem::take(&mut act.tags))?;
        act.extensions = sync::<ActExtensionMapping>(ctx, key, mem::take(&mut act.extensions))?;
        act.notes = sync::<ActNoteMapping>(ctx, key, mem::take(&mut act.notes))?;
        act.relationships = sync::<ActRelationshipMapping>(ctx, key, mem::take(&mut act.relationships))?;

        for participation in &mut act.participations {
            if let Some(player) = participation.player_entity.as_deref_mut() {
                participation.player_key = Some(ensure_exists(ctx, &EntityPersister::new(), player)?);
            }
        }
        act.participations =
            sync::<ActParticipationMapping>(ctx, key, mem::take(&mut act.participations))?;
        Ok(())
    }

    fn load_shallow(&self, ctx: &DataContext<'_>, key: Key) -> Result<Option<Act>, EngineError> {
        ctx.fault_in(key)?;
        let Some(row) = sqlite::load_row(ctx.conn(), &tables::ACT, key)? else {
            return Ok(None);
        };
        let mut act = ActMapping::from_row(&row)?;
        let kind = stored_act_kind(ctx, key, act.class_concept_key)?;
        act.detail = ActDetail::default_for(kind);
        act_handler(kind).read(ctx, key, &mut act)?;
        Ok(Some(act))
    }

    fn load_collections(&self, ctx: &DataContext<'_>, key: Key, act: &mut Act) -> Result<(), EngineError> {
        act.identifiers = fetch::<ActIdentifierMapping>(ctx, key)?;
        act.tags = fetch::<ActTagMapping>(ctx, key)?;
        act.extensions = fetch::<ActExtensionMapping>(ctx, key)?;
        act.notes = fetch::<ActNoteMapping>(ctx, key)?;
        act.relationships = fetch::<ActRelationshipMapping>(ctx, key)?;
        act.participations = fetch::<ActParticipationMapping>(ctx, key)?;
        Ok(())
    }

    pub fn version_chain(&self, ctx: &DataContext<'_>, key: Key) -> Result<Vec<VersionSnapshot>, EngineError> {
        versioned::chain(ctx, key)
    }
}

impl Persister for ActPersister {
    type Model = Act;

    fn model_type(&self) -> ModelType {
        ModelType::Act
    }

    fn query_table(&self) -> &'static TableMap {
        match self.kind {
            Some(kind) => act_handler(kind).table(),
            None => &tables::ACT,
        }
    }

    fn insert(&self, ctx: &DataContext<'_>, mut act: Act) -> Result<Act, EngineError> {
        ctx.in_transaction(|ctx| {
            let key = identified::assign_key(&mut act);
            ctx.touch(key)?;
            let kind = self.conform(&mut act, None);
            act.status_concept_key.get_or_insert(status::NEW);
            act.mood_concept_key.get_or_insert(mood::EVENT_OCCURRENCE);
            versioned::insert::<ActMapping>(ctx, &mut act)?;
            self.write_subtype_and_collections(ctx, key, kind, &mut act)?;
            ctx.forget(key);
            log::debug!("event=act_inserted module=persister key={key} kind={kind:?}");
            Ok(act)
        })
    }

    fn update(&self, ctx: &DataContext<'_>, mut act: Act) -> Result<Act, EngineError> {
        let key = required_key(&act, ModelType::Act)?;
        ctx.in_transaction(|ctx| {
            ctx.touch(key)?;
            let existing = identified::load_existing::<ActMapping>(ctx, key)?;
            let kind = self.conform(&mut act, existing.key("class_concept_key")?);
            versioned::update::<ActMapping>(ctx, &mut act, &existing)?;
            self.write_subtype_and_collections(ctx, key, kind, &mut act)?;
            ctx.forget(key);
            Ok(act)
        })
    }

    fn obsolete(&self, ctx: &DataContext<'_>, act: Act) -> Result<Act, EngineError> {
        let key = required_key(&act, ModelType::Act)?;
        ctx.in_transaction(|ctx| {
            ctx.touch(key)?;
            let obsoleted = obsolete_stored::<ActMapping>(
                ctx,
                key,
                &act.meta,
                |ctx: &DataContext<'_>, current: &mut Act, existing: &TableRow| {
                    current.status_concept_key = Some(status::OBSOLETE);
                    versioned::obsolete::<ActMapping>(ctx, current, existing)
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

    fn load(&self, ctx: &DataContext<'_>, key: Key, depth: LoadDepth) -> Result<Option<Act>, EngineError> {
        hydrate(
            ctx,
            key,
            depth,
            |ctx| self.load_shallow(ctx, key),
            |ctx, act| self.load_collections(ctx, key, act),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::tests::services;
    use hearth_core::concepts::{act_class, participation};
    use hearth_core::model::{ActParticipation, Entity, ObservationValue, PersonDetail};
    use hearth_storage::SqliteStore;

    #[test]
    fn quantity_observation_reads_back_its_value() {
        let store = SqliteStore::open_in_memory().unwrap();
        let services = services();
        let ctx = DataContext::new(store.conn(), &services);
        let persister = ActPersister::new();

        let unit = Key::new();
        let act = Act::observation(ObservationValue::Quantity {
            value: 72.5,
            unit_concept_key: Some(unit),
        });
        let saved = persister.insert(&ctx, act).unwrap();
        let loaded = persister.get(&ctx, saved.key.unwrap()).unwrap();
        assert_eq!(loaded.kind(), ActKind::QuantityObservation);
        assert_eq!(
            loaded.detail.as_observation().map(|o| o.value.clone()),
            Some(ObservationValue::Quantity {
                value: 72.5,
                unit_concept_key: Some(unit),
            })
        );
    }

    #[test]
    fn mismatched_detail_is_reshaped_to_the_class() {
        let store = SqliteStore::open_in_memory().unwrap();
        let services = services();
        let ctx = DataContext::new(store.conn(), &services);

        let act = Act {
            class_concept_key: Some(act_class::CONTROL_ACT),
            ..Default::default()
        };
        let saved = ActPersister::new().insert(&ctx, act).unwrap();
        assert_eq!(saved.detail, ActDetail::ControlAct);
        let loaded = ActPersister::new().get(&ctx, saved.key.unwrap()).unwrap();
        assert_eq!(loaded.kind(), ActKind::ControlAct);
    }

    #[test]
    fn participation_player_is_saved_on_demand() {
        let store = SqliteStore::open_in_memory().unwrap();
        let services = services();
        let ctx = DataContext::new(store.conn(), &services);

        let mut act = Act::observation(ObservationValue::Text("negative".into()));
        act.participations.push(ActParticipation {
            role_key: Some(participation::RECORD_TARGET),
            player_entity: Some(Box::new(Entity::person(PersonDetail::default()))),
            ..Default::default()
        });
        let saved = ActPersister::new().insert(&ctx, act).unwrap();
        let player = saved.participations[0].player_key.unwrap();
        assert!(EntityPersister::new().exists(&ctx, player).unwrap());

        let loaded = ActPersister::new().get(&ctx, saved.key.unwrap()).unwrap();
        assert_eq!(loaded.participations.len(), 1);
        assert_eq!(loaded.participations[0].player_key, Some(player));
    }
}
