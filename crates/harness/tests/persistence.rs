use hearth_core::model::{Concept, Identified, Versioned};
use hearth_core::Key;
use hearth_engine::{ConceptPersister, EngineError, EntityPersister, Persister};
use hearth_harness::{TestStore, fixtures};
use hearth_storage::{Predicate, QueryOptions};

// ============================================================================
// Keys
// ============================================================================

#[test]
fn insert_mints_a_key_when_none_is_given() -> Result<(), Box<dyn std::error::Error>> {
    let store = TestStore::in_memory()?;
    let ctx = store.ctx();

    let saved = EntityPersister::new().insert(&ctx, fixtures::patient("Ada", "Lovelace", (1815, 12, 10))?)?;
    let key = saved.key().ok_or("no key minted")?;
    assert!(!key.is_nil());
    assert!(EntityPersister::new().exists(&ctx, key)?);
    Ok(())
}

#[test]
fn insert_preserves_a_supplied_key() -> Result<(), Box<dyn std::error::Error>> {
    let store = TestStore::in_memory()?;
    let ctx = store.ctx();

    let key = Key::new();
    let mut concept = Concept::new("Supplied");
    concept.key = Some(key);
    let saved = ConceptPersister.insert(&ctx, concept)?;
    assert_eq!(saved.key, Some(key));
    assert_eq!(ConceptPersister.get(&ctx, key)?.mnemonic.as_deref(), Some("Supplied"));
    Ok(())
}

#[test]
fn get_of_unknown_key_is_not_found() -> Result<(), Box<dyn std::error::Error>> {
    let store = TestStore::in_memory()?;
    let err = EntityPersister::new().get(&store.ctx(), Key::new()).unwrap_err();
    assert!(matches!(err, EngineError::NotFound { .. }));
    Ok(())
}

#[test]
fn update_without_key_is_rejected() -> Result<(), Box<dyn std::error::Error>> {
    let store = TestStore::in_memory()?;
    let err = ConceptPersister.update(&store.ctx(), Concept::new("Keyless")).unwrap_err();
    assert!(matches!(err, EngineError::MissingRequiredField { .. }));
    Ok(())
}

// ============================================================================
// Versions
// ============================================================================

#[test]
fn two_updates_chain_three_versions() -> Result<(), Box<dyn std::error::Error>> {
    let store = TestStore::in_memory()?;
    let ctx = store.ctx();
    let persister = EntityPersister::new();

    let first = persister.insert(&ctx, fixtures::patient("Grace", "Hopper", (1906, 12, 9))?)?;
    let second = persister.update(&ctx, first.clone())?;
    let third = persister.update(&ctx, second.clone())?;

    assert_eq!(first.version().version_sequence, Some(1));
    assert_eq!(second.version().version_sequence, Some(2));
    assert_eq!(third.version().version_sequence, Some(3));
    assert_eq!(third.version().previous_version_key, second.version().version_key);
    assert_ne!(third.version().version_key, second.version().version_key);

    let chain = persister.version_chain(&ctx, third.key.ok_or("no key")?)?;
    assert_eq!(chain.len(), 3);
    assert_eq!(chain[0].previous_version_key, None);
    assert_eq!(chain[1].previous_version_key, Some(chain[0].version_key));
    assert_eq!(chain[2].previous_version_key, Some(chain[1].version_key));
    assert_eq!(Some(chain[2].version_key), third.version().version_key);
    Ok(())
}

#[test]
fn stored_row_holds_the_current_version_only() -> Result<(), Box<dyn std::error::Error>> {
    let store = TestStore::in_memory()?;
    let ctx = store.ctx();

    let saved = ConceptPersister.insert(&ctx, Concept::new("Draft"))?;
    let mut edited = saved.clone();
    edited.mnemonic = Some("Final".into());
    let updated = ConceptPersister.update(&ctx, edited)?;

    assert_eq!(store.count_rows("concept")?, 1);
    let loaded = ConceptPersister.get(&ctx, saved.key.ok_or("no key")?)?;
    assert_eq!(loaded.mnemonic.as_deref(), Some("Final"));
    assert_eq!(loaded.version.version_key, updated.version.version_key);
    Ok(())
}

// ============================================================================
// Soft delete
// ============================================================================

#[test]
fn obsolete_stamps_principal_and_hides_from_queries() -> Result<(), Box<dyn std::error::Error>> {
    let store = TestStore::in_memory()?;
    let clerk = Key::new();
    let ctx = store.ctx().with_principal(Some(clerk));
    let persister = EntityPersister::new();

    let saved = persister.insert(&ctx, fixtures::patient("Alan", "Turing", (1912, 6, 23))?)?;
    let key = saved.key.ok_or("no key")?;
    let obsoleted = persister.obsolete(&ctx, saved)?;
    assert!(obsoleted.meta.is_obsolete());
    assert_eq!(obsoleted.meta.obsoleted_by, Some(clerk));

    let live = persister.query(&ctx, &Predicate::key(key), &QueryOptions::default(), None)?;
    assert!(live.results.is_empty());

    let all = persister.query(
        &ctx,
        &Predicate::key(key),
        &QueryOptions {
            include_obsolete: true,
            ..Default::default()
        },
        None,
    )?;
    assert_eq!(all.results.len(), 1);
    Ok(())
}

#[test]
fn obsolete_twice_keeps_the_first_obsoleter() -> Result<(), Box<dyn std::error::Error>> {
    let store = TestStore::in_memory()?;
    let (first, second) = (Key::new(), Key::new());
    let persister = EntityPersister::new();

    let saved = persister.insert(&store.ctx(), fixtures::patient("Edsger", "Dijkstra", (1930, 5, 11))?)?;
    let once = persister.obsolete(&store.ctx().with_principal(Some(first)), saved.clone())?;
    let twice = persister.obsolete(&store.ctx().with_principal(Some(second)), saved)?;

    assert_eq!(twice.meta.obsoleted_by, Some(first));
    assert_eq!(twice.meta.obsoletion_time, once.meta.obsoletion_time);
    assert_eq!(twice.version.version_key, once.version.version_key);
    Ok(())
}

// ============================================================================
// Identity cache
// ============================================================================

#[test]
fn deepening_a_cached_model_leaves_earlier_copies_alone() -> Result<(), Box<dyn std::error::Error>> {
    let store = TestStore::in_memory()?;
    let ctx = store.ctx();
    let key = ConceptPersister.insert(&ctx, fixtures::concept("Cached", "Shown"))?.key.ok_or("no key")?;

    let shallow = ConceptPersister.query(&ctx, &Predicate::key(key), &QueryOptions::default(), None)?;
    let mut held = shallow.results.into_iter().next().ok_or("no result")?;
    assert!(held.names.is_empty());

    let full = ConceptPersister.get(&ctx, key)?;
    assert_eq!(full.names.len(), 1);
    assert!(held.names.is_empty());

    held.mnemonic = Some("Edited".into());
    let again = ConceptPersister.get(&ctx, key)?;
    assert_eq!(again.mnemonic.as_deref(), Some("Cached"));
    assert_eq!(again.names.len(), 1);
    Ok(())
}
