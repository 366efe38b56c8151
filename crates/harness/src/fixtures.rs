use hearth_core::model::{
    Concept, ConceptName, Entity, EntityName, Identifier, PatientDetail, PersonDetail,
};
use hearth_core::{Bundle, CoreError, Key, Timestamp};

pub const MRN_AUTHORITY: &str = "MRN";

pub fn patient(given: &str, family: &str, born: (i32, u32, u32)) -> Result<Entity, CoreError> {
    let (year, month, day) = born;
    let mut entity = Entity::patient(PatientDetail {
        person: PersonDetail {
            date_of_birth: Some(Timestamp::from_ymd(year, month, day)?),
            ..Default::default()
        },
        ..Default::default()
    });
    entity.names.push(EntityName::from_parts(None, &[given, family]));
    Ok(entity)
}

pub fn concept(mnemonic: &str, display: &str) -> Concept {
    let mut concept = Concept::new(mnemonic);
    concept.names.push(ConceptName::new("en", display));
    concept
}

/// `count` patients with pre-assigned keys and one MRN each, so two
/// imports of the same bundle produce comparable rows.
pub fn patient_bundle(count: usize) -> Result<Bundle, CoreError> {
    let mut bundle = Bundle::new();
    for i in 0..count {
        let day = (i % 28) as u32 + 1;
        let mut entity = patient(&format!("Given{i}"), "Bulk", (1980, 1, day))?;
        entity.key = Some(Key::new());
        entity.identifiers.push(Identifier::new(MRN_AUTHORITY, &format!("{i:06}")));
        bundle.push(entity);
    }
    Ok(bundle)
}
