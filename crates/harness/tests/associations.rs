use hearth_core::concepts::relationship;
use hearth_core::model::{Entity, EntityName, EntityRelationship, Identifier, PersonDetail, Tag};
use hearth_engine::{EntityPersister, Persister};
use hearth_harness::{TestStore, fixtures};

#[test]
fn identifiers_reconcile_to_the_desired_list() -> Result<(), Box<dyn std::error::Error>> {
    let store = TestStore::in_memory()?;
    let ctx = store.ctx();
    let persister = EntityPersister::new();

    let mut entity = Entity::person(PersonDetail::default());
    entity.identifiers = vec![Identifier::new("A", "x"), Identifier::new("B", "y")];
    let saved = persister.insert(&ctx, entity)?;
    let key = saved.key.ok_or("no key")?;
    let a = saved.identifiers[0].key.ok_or("A unkeyed")?;
    let b = saved.identifiers[1].key.ok_or("B unkeyed")?;

    // Drop A, change B, add C.
    let mut desired = saved.clone();
    let mut changed = saved.identifiers[1].clone();
    changed.value = Some("z".into());
    desired.identifiers = vec![changed, Identifier::new("C", "w")];
    let updated = persister.update(&ctx, desired)?;

    assert_eq!(updated.identifiers.len(), 2);
    assert_eq!(updated.identifiers[0].key, Some(b));
    let c = &updated.identifiers[1];
    assert!(c.key.is_some_and(|k| k != a && k != b));
    assert_eq!(c.source_key, Some(key));

    let loaded = persister.get(&ctx, key)?;
    let mut values: Vec<_> = loaded
        .identifiers
        .iter()
        .filter_map(|i| i.value.clone())
        .collect();
    values.sort();
    assert_eq!(values, ["w", "z"]);
    assert_eq!(store.count_rows("entity_identifier")?, 2);
    Ok(())
}

#[test]
fn keyless_relationship_matches_by_type_and_target() -> Result<(), Box<dyn std::error::Error>> {
    let store = TestStore::in_memory()?;
    let ctx = store.ctx();
    let persister = EntityPersister::new();

    let mother = persister.insert(&ctx, fixtures::patient("Mum", "Doe", (1970, 3, 3))?)?;
    let mother_key = mother.key.ok_or("no key")?;
    let mut child = fixtures::patient("Kid", "Doe", (2001, 4, 4))?;
    child.relationships.push(EntityRelationship::new(relationship::MOTHER, mother_key));
    let saved = persister.insert(&ctx, child)?;
    let original = saved.relationships[0].key;

    // Re-sent without its key, with a new quantity.
    let mut resent = saved.clone();
    resent.relationships = vec![EntityRelationship {
        quantity: Some(1),
        ..EntityRelationship::new(relationship::MOTHER, mother_key)
    }];
    let updated = persister.update(&ctx, resent)?;

    assert_eq!(updated.relationships.len(), 1);
    assert_eq!(updated.relationships[0].key, original);
    assert_eq!(store.count_rows("entity_relationship")?, 1);
    let loaded = persister.get(&ctx, saved.key.ok_or("no key")?)?;
    assert_eq!(loaded.relationships[0].quantity, Some(1));
    Ok(())
}

#[test]
fn empty_associations_are_dropped() -> Result<(), Box<dyn std::error::Error>> {
    let store = TestStore::in_memory()?;
    let ctx = store.ctx();

    let mut entity = Entity::person(PersonDetail::default());
    entity.identifiers.push(Identifier::default());
    entity.tags.push(Tag::new("flag", "  "));
    entity.names.push(EntityName::from_parts(None, &[]));
    entity.tags.push(Tag::new("flag", "vip"));
    let saved = EntityPersister::new().insert(&ctx, entity)?;

    assert!(saved.identifiers.is_empty());
    assert!(saved.names.is_empty());
    assert_eq!(saved.tags.len(), 1);
    assert_eq!(store.count_rows("entity_identifier")?, 0);
    assert_eq!(store.count_rows("entity_tag")?, 1);
    Ok(())
}

#[test]
fn removing_a_name_removes_its_components() -> Result<(), Box<dyn std::error::Error>> {
    let store = TestStore::in_memory()?;
    let ctx = store.ctx();
    let persister = EntityPersister::new();

    let mut entity = fixtures::patient("Jane", "Roe", (1990, 2, 2))?;
    entity.names.push(EntityName::from_parts(None, &["J", "R"]));
    let saved = persister.insert(&ctx, entity)?;
    assert_eq!(store.count_rows("entity_name_component")?, 4);

    let mut desired = saved.clone();
    desired.names.truncate(1);
    persister.update(&ctx, desired)?;

    assert_eq!(store.count_rows("entity_name")?, 1);
    assert_eq!(store.count_rows("entity_name_component")?, 2);
    Ok(())
}

#[test]
fn inline_relationship_target_is_saved_first() -> Result<(), Box<dyn std::error::Error>> {
    let store = TestStore::in_memory()?;
    let ctx = store.ctx();

    let mut child = fixtures::patient("New", "Born", (2024, 1, 1))?;
    child.relationships.push(EntityRelationship {
        relationship_type_key: Some(relationship::MOTHER),
        target_entity: Some(Box::new(fixtures::patient("New", "Mum", (1995, 1, 1))?)),
        ..Default::default()
    });
    let saved = EntityPersister::new().insert(&ctx, child)?;

    let target = saved.relationships[0].target_key.ok_or("target not keyed")?;
    let mother = EntityPersister::new().get(&ctx, target)?;
    assert_eq!(mother.names[0].components[1].value.as_deref(), Some("Mum"));
    assert_eq!(store.count_rows("entity")?, 2);
    Ok(())
}
