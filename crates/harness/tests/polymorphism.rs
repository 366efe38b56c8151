use hearth_core::concepts::entity_class;
use hearth_core::model::{
    Act, ActDetail, ActKind, Entity, EntityDetail, EntityKind, ObservationValue, PersonDetail,
    PlaceDetail, SubstanceAdministrationDetail,
};
use hearth_core::{Key, Timestamp};
use hearth_engine::{ActPersister, EntityPersister, Persister};
use hearth_harness::{TestStore, fixtures};
use hearth_storage::{CompareOp, Predicate, QueryOptions};

#[test]
fn patient_reads_back_as_patient_with_birth_date() -> Result<(), Box<dyn std::error::Error>> {
    let store = TestStore::in_memory()?;
    let ctx = store.ctx();

    let saved = EntityPersister::new().insert(&ctx, fixtures::patient("Mary", "Seacole", (1805, 11, 23))?)?;
    let key = saved.key.ok_or("no key")?;
    assert_eq!(store.count_rows("person")?, 1);
    assert_eq!(store.count_rows("patient")?, 1);

    let loaded = EntityPersister::new().get(&ctx, key)?;
    assert_eq!(loaded.kind(), EntityKind::Patient);
    let patient = loaded.detail.as_patient().ok_or("not a patient")?;
    assert_eq!(patient.person.date_of_birth, Some(Timestamp::from_ymd(1805, 11, 23)?));
    assert_eq!(loaded.names.len(), 1);
    assert_eq!(loaded.names[0].components.len(), 2);
    Ok(())
}

#[test]
fn class_is_inferred_from_the_detail() -> Result<(), Box<dyn std::error::Error>> {
    let store = TestStore::in_memory()?;
    let ctx = store.ctx();

    let place = Entity {
        detail: EntityDetail::Place(PlaceDetail {
            is_mobile: true,
            ..Default::default()
        }),
        ..Default::default()
    };
    let saved = EntityPersister::new().insert(&ctx, place)?;
    assert_eq!(saved.class_concept_key, Some(entity_class::PLACE));
    let loaded = EntityPersister::new().get(&ctx, saved.key.ok_or("no key")?)?;
    assert_eq!(loaded.detail.as_place().map(|p| p.is_mobile), Some(true));
    Ok(())
}

#[test]
fn typed_query_only_sees_its_subtype() -> Result<(), Box<dyn std::error::Error>> {
    let store = TestStore::in_memory()?;
    let ctx = store.ctx();

    EntityPersister::new().insert(&ctx, fixtures::patient("Florence", "Nightingale", (1820, 5, 12))?)?;
    EntityPersister::new().insert(&ctx, Entity::person(PersonDetail::default()))?;

    let patients = EntityPersister::for_kind(EntityKind::Patient).query(
        &ctx,
        &Predicate::All,
        &QueryOptions::default(),
        None,
    )?;
    assert_eq!(patients.total, 1);
    assert_eq!(patients.results[0].kind(), EntityKind::Patient);

    let everyone = EntityPersister::new().query(&ctx, &Predicate::All, &QueryOptions::default(), None)?;
    assert_eq!(everyone.total, 2);
    Ok(())
}

#[test]
fn subtype_fields_are_queryable_through_the_join_chain() -> Result<(), Box<dyn std::error::Error>> {
    let store = TestStore::in_memory()?;
    let ctx = store.ctx();

    EntityPersister::new().insert(&ctx, fixtures::patient("Old", "Timer", (1950, 1, 1))?)?;
    EntityPersister::new().insert(&ctx, fixtures::patient("Young", "Sprout", (2010, 1, 1))?)?;

    let born_late = EntityPersister::for_kind(EntityKind::Patient).query(
        &ctx,
        &Predicate::compare(
            "date_of_birth",
            CompareOp::Gt,
            Timestamp::from_ymd(2000, 1, 1)?,
        ),
        &QueryOptions::default(),
        None,
    )?;
    assert_eq!(born_late.total, 1);
    let person = born_late.results[0].detail.person().ok_or("not a person")?;
    assert_eq!(person.date_of_birth, Some(Timestamp::from_ymd(2010, 1, 1)?));
    Ok(())
}

#[test]
fn observation_values_pick_their_own_tables() -> Result<(), Box<dyn std::error::Error>> {
    let store = TestStore::in_memory()?;
    let ctx = store.ctx();
    let persister = ActPersister::new();

    let quantity = persister.insert(
        &ctx,
        Act::observation(ObservationValue::Quantity {
            value: 37.2,
            unit_concept_key: None,
        }),
    )?;
    let text = persister.insert(&ctx, Act::observation(ObservationValue::Text("clear".into())))?;
    let coded = Key::new();
    let code = persister.insert(&ctx, Act::observation(ObservationValue::Coded(Some(coded))))?;

    assert_eq!(store.count_rows("observation")?, 3);
    assert_eq!(store.count_rows("quantity_observation")?, 1);
    assert_eq!(store.count_rows("text_observation")?, 1);
    assert_eq!(store.count_rows("coded_observation")?, 1);

    assert_eq!(persister.get(&ctx, quantity.key.ok_or("no key")?)?.kind(), ActKind::QuantityObservation);
    assert_eq!(persister.get(&ctx, text.key.ok_or("no key")?)?.kind(), ActKind::TextObservation);
    let loaded = persister.get(&ctx, code.key.ok_or("no key")?)?;
    assert_eq!(
        loaded.detail.as_observation().map(|o| o.value.clone()),
        Some(ObservationValue::Coded(Some(coded)))
    );
    Ok(())
}

#[test]
fn substance_administration_round_trips() -> Result<(), Box<dyn std::error::Error>> {
    let store = TestStore::in_memory()?;
    let ctx = store.ctx();

    let act = Act {
        detail: ActDetail::SubstanceAdministration(SubstanceAdministrationDetail {
            dose_quantity: Some(0.5),
            sequence_id: Some(2),
            ..Default::default()
        }),
        ..Act::of_kind(ActKind::SubstanceAdministration)
    };
    let saved = ActPersister::new().insert(&ctx, act)?;
    let loaded = ActPersister::for_kind(ActKind::SubstanceAdministration).get(&ctx, saved.key.ok_or("no key")?)?;
    match loaded.detail {
        ActDetail::SubstanceAdministration(detail) => {
            assert_eq!(detail.dose_quantity, Some(0.5));
            assert_eq!(detail.sequence_id, Some(2));
        }
        other => return Err(format!("unexpected detail {other:?}").into()),
    }
    Ok(())
}
