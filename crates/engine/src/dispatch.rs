use std::fmt::Debug;
use std::marker::PhantomData;

use hearth_core::Key;
use hearth_core::model::{
    Act, ActDetail, ActKind, ApplicationDetail, DeviceDetail, Entity, EntityDetail, EntityKind,
    ManufacturedMaterialDetail, MaterialDetail, ObservationDetail, ObservationValue,
    OrganizationDetail, PatientDetail, PatientEncounterDetail, PersonDetail, PlaceDetail,
    ProviderDetail, SubstanceAdministrationDetail, UserEntityDetail,
};
use hearth_storage::mapper::{
    ApplicationMapping, CodedObservationMapping, ControlActMapping, DeviceMapping,
    ManufacturedMaterialMapping, MaterialMapping, ObservationMapping, OrganizationMapping,
    PatientEncounterMapping, PatientMapping, PersonMapping, PlaceMapping, ProviderMapping,
    QuantityObservationMapping, SubstanceAdministrationMapping, TextObservationMapping,
    UserEntityMapping,
};
use hearth_storage::{RowMapping, TableMap, sqlite, tables};

use crate::context::DataContext;
use crate::error::EngineError;
use crate::persistence::identified;
use crate::persister::{ConceptPersister, ensure_exists};

/// A record family with a discriminated subtype shape.
pub trait Polymorphic: Debug + 'static {
    type Kind: Copy + Eq + Debug + Send + Sync + 'static;
}

impl Polymorphic for Entity {
    type Kind = EntityKind;
}

impl Polymorphic for Act {
    type Kind = ActKind;
}

pub trait Handler<R: Polymorphic>: Sync {
    fn kind(&self) -> R::Kind;

    /// Most-derived table for this kind; queries join up from here.
    fn table(&self) -> &'static TableMap;

    fn parent(&self) -> Option<&'static dyn Handler<R>>;

    /// Writes the subtype rows from this level up. The root row is written
    /// by the persistence core before this runs.
    fn write(&self, ctx: &DataContext<'_>, key: Key, record: &mut R) -> Result<(), EngineError>;

    /// Fills the record's subtype detail from this level up.
    fn read(&self, ctx: &DataContext<'_>, key: Key, record: &mut R) -> Result<(), EngineError>;
}

pub type EntityHandler = dyn Handler<Entity>;
pub type ActHandler = dyn Handler<Act>;

pub struct RootHandler<R: Polymorphic> {
    kind: R::Kind,
    table: &'static TableMap,
    record: PhantomData<fn() -> R>,
}

impl<R: Polymorphic> Handler<R> for RootHandler<R> {
    fn kind(&self) -> R::Kind {
        self.kind
    }

    fn table(&self) -> &'static TableMap {
        self.table
    }

    fn parent(&self) -> Option<&'static dyn Handler<R>> {
        None
    }

    fn write(&self, _ctx: &DataContext<'_>, _key: Key, _record: &mut R) -> Result<(), EngineError> {
        Ok(())
    }

    fn read(&self, _ctx: &DataContext<'_>, _key: Key, _record: &mut R) -> Result<(), EngineError> {
        Ok(())
    }
}

type Prepare<R> = fn(&DataContext<'_>, &mut R) -> Result<(), EngineError>;

/// One subtype table below `parent`. `part` selects this level's slice of
/// the record (`None` skips the row); `fill` puts a loaded slice back.
pub struct SubtypeHandler<R: Polymorphic, M: RowMapping> {
    kind: R::Kind,
    parent: &'static dyn Handler<R>,
    part: fn(&R) -> Option<&M::Model>,
    fill: fn(&mut R, M::Model),
    prepare: Prepare<R>,
    mapping: PhantomData<fn() -> M>,
}

impl<R, M> Handler<R> for SubtypeHandler<R, M>
where
    R: Polymorphic,
    M: RowMapping + 'static,
{
    fn kind(&self) -> R::Kind {
        self.kind
    }

    fn table(&self) -> &'static TableMap {
        M::table()
    }

    fn parent(&self) -> Option<&'static dyn Handler<R>> {
        Some(self.parent)
    }

    fn write(&self, ctx: &DataContext<'_>, key: Key, record: &mut R) -> Result<(), EngineError> {
        (self.prepare)(ctx, record)?;
        self.parent.write(ctx, key, record)?;
        if let Some(part) = (self.part)(record) {
            let row = M::to_row(key, part)?;
            identified::upsert(ctx, row, &*record)?;
        }
        Ok(())
    }

    fn read(&self, ctx: &DataContext<'_>, key: Key, record: &mut R) -> Result<(), EngineError> {
        self.parent.read(ctx, key, record)?;
        if let Some(row) = sqlite::load_row(ctx.conn(), M::table(), key)? {
            (self.fill)(record, M::from_row(&row)?);
        }
        Ok(())
    }
}

fn no_prerequisites<R>(_ctx: &DataContext<'_>, _record: &mut R) -> Result<(), EngineError> {
    Ok(())
}

macro_rules! subtype {
    ($name:ident: $record:ty, $mapping:ty, $kind:expr, $parent:expr, $part:expr, $fill:expr) => {
        subtype!($name: $record, $mapping, $kind, $parent, $part, $fill, no_prerequisites);
    };
    ($name:ident: $record:ty, $mapping:ty, $kind:expr, $parent:expr, $part:expr, $fill:expr, $prepare:expr) => {
        static $name: SubtypeHandler<$record, $mapping> = SubtypeHandler {
            kind: $kind,
            parent: &$parent,
            part: $part,
            fill: $fill,
            prepare: $prepare,
            mapping: PhantomData,
        };
    };
}

// ---- entities ----

static ENTITY_ROOT: RootHandler<Entity> = RootHandler {
    kind: EntityKind::Generic,
    table: &tables::ENTITY,
    record: PhantomData,
};

fn person_part(e: &Entity) -> Option<&PersonDetail> {
    e.detail.person()
}

fn fill_person(e: &mut Entity, person: PersonDetail) {
    if let Some(slot) = e.detail.person_mut() {
        *slot = person;
    }
}

fn patient_part(e: &Entity) -> Option<&PatientDetail> {
    e.detail.as_patient()
}

fn fill_patient(e: &mut Entity, loaded: PatientDetail) {
    if let EntityDetail::Patient(p) = &mut e.detail {
        let person = std::mem::take(&mut p.person);
        *p = PatientDetail { person, ..loaded };
    }
}

/// Saves an inline gender concept and writes its key back.
fn prepare_patient(ctx: &DataContext<'_>, e: &mut Entity) -> Result<(), EngineError> {
    if let EntityDetail::Patient(p) = &mut e.detail {
        if let Some(concept) = p.gender_concept.as_deref_mut() {
            p.gender_concept_key = Some(ensure_exists(ctx, &ConceptPersister, concept)?);
        }
    }
    Ok(())
}

fn provider_part(e: &Entity) -> Option<&ProviderDetail> {
    match &e.detail {
        EntityDetail::Provider(p) => Some(p),
        _ => None,
    }
}

fn fill_provider(e: &mut Entity, loaded: ProviderDetail) {
    if let EntityDetail::Provider(p) = &mut e.detail {
        p.specialty_concept_key = loaded.specialty_concept_key;
    }
}

fn user_entity_part(e: &Entity) -> Option<&UserEntityDetail> {
    match &e.detail {
        EntityDetail::UserEntity(u) => Some(u),
        _ => None,
    }
}

fn fill_user_entity(e: &mut Entity, loaded: UserEntityDetail) {
    if let EntityDetail::UserEntity(u) = &mut e.detail {
        u.security_user_key = loaded.security_user_key;
    }
}

fn place_part(e: &Entity) -> Option<&PlaceDetail> {
    e.detail.as_place()
}

fn fill_place(e: &mut Entity, loaded: PlaceDetail) {
    if let EntityDetail::Place(p) = &mut e.detail {
        let services = std::mem::take(&mut p.services);
        *p = PlaceDetail { services, ..loaded };
    }
}

fn organization_part(e: &Entity) -> Option<&OrganizationDetail> {
    match &e.detail {
        EntityDetail::Organization(o) => Some(o),
        _ => None,
    }
}

fn fill_organization(e: &mut Entity, loaded: OrganizationDetail) {
    if let EntityDetail::Organization(o) = &mut e.detail {
        *o = loaded;
    }
}

fn material_part(e: &Entity) -> Option<&MaterialDetail> {
    e.detail.material()
}

fn fill_material(e: &mut Entity, loaded: MaterialDetail) {
    if let Some(slot) = e.detail.material_mut() {
        *slot = loaded;
    }
}

fn manufactured_part(e: &Entity) -> Option<&ManufacturedMaterialDetail> {
    match &e.detail {
        EntityDetail::ManufacturedMaterial(m) => Some(m),
        _ => None,
    }
}

fn fill_manufactured(e: &mut Entity, loaded: ManufacturedMaterialDetail) {
    if let EntityDetail::ManufacturedMaterial(m) = &mut e.detail {
        m.lot_number = loaded.lot_number;
    }
}

fn device_part(e: &Entity) -> Option<&DeviceDetail> {
    match &e.detail {
        EntityDetail::Device(d) => Some(d),
        _ => None,
    }
}

fn fill_device(e: &mut Entity, loaded: DeviceDetail) {
    if let EntityDetail::Device(d) = &mut e.detail {
        *d = loaded;
    }
}

fn application_part(e: &Entity) -> Option<&ApplicationDetail> {
    match &e.detail {
        EntityDetail::Application(a) => Some(a),
        _ => None,
    }
}

fn fill_application(e: &mut Entity, loaded: ApplicationDetail) {
    if let EntityDetail::Application(a) = &mut e.detail {
        *a = loaded;
    }
}

subtype!(PERSON: Entity, PersonMapping, EntityKind::Person, ENTITY_ROOT, person_part, fill_person);
subtype!(PATIENT: Entity, PatientMapping, EntityKind::Patient, PERSON, patient_part, fill_patient, prepare_patient);
subtype!(PROVIDER: Entity, ProviderMapping, EntityKind::Provider, PERSON, provider_part, fill_provider);
subtype!(USER_ENTITY: Entity, UserEntityMapping, EntityKind::UserEntity, PERSON, user_entity_part, fill_user_entity);
subtype!(PLACE: Entity, PlaceMapping, EntityKind::Place, ENTITY_ROOT, place_part, fill_place);
subtype!(ORGANIZATION: Entity, OrganizationMapping, EntityKind::Organization, ENTITY_ROOT, organization_part, fill_organization);
subtype!(MATERIAL: Entity, MaterialMapping, EntityKind::Material, ENTITY_ROOT, material_part, fill_material);
subtype!(MANUFACTURED_MATERIAL: Entity, ManufacturedMaterialMapping, EntityKind::ManufacturedMaterial, MATERIAL, manufactured_part, fill_manufactured);
subtype!(DEVICE: Entity, DeviceMapping, EntityKind::Device, ENTITY_ROOT, device_part, fill_device);
subtype!(APPLICATION: Entity, ApplicationMapping, EntityKind::Application, ENTITY_ROOT, application_part, fill_application);

pub fn entity_handler(kind: EntityKind) -> &'static EntityHandler {
    match kind {
        EntityKind::Generic => &ENTITY_ROOT,
        EntityKind::Person => &PERSON,
        EntityKind::Patient => &PATIENT,
        EntityKind::Provider => &PROVIDER,
        EntityKind::UserEntity => &USER_ENTITY,
        EntityKind::Place => &PLACE,
        EntityKind::Organization => &ORGANIZATION,
        EntityKind::Material => &MATERIAL,
        EntityKind::ManufacturedMaterial => &MANUFACTURED_MATERIAL,
        EntityKind::Device => &DEVICE,
        EntityKind::Application => &APPLICATION,
    }
}

// ---- acts ----

static ACT_ROOT: RootHandler<Act> = RootHandler {
    kind: ActKind::Generic,
    table: &tables::ACT,
    record: PhantomData,
};

fn observation_part(a: &Act) -> Option<&ObservationDetail> {
    a.detail.as_observation()
}

fn fill_observation(a: &mut Act, loaded: ObservationDetail) {
    if let Some(o) = a.detail.observation_mut() {
        o.interpretation_concept_key = loaded.interpretation_concept_key;
    }
}

fn quantity_part(a: &Act) -> Option<&ObservationValue> {
    a.detail
        .as_observation()
        .map(|o| &o.value)
        .filter(|v| matches!(v, ObservationValue::Quantity { .. }))
}

fn text_part(a: &Act) -> Option<&ObservationValue> {
    a.detail
        .as_observation()
        .map(|o| &o.value)
        .filter(|v| matches!(v, ObservationValue::Text(_)))
}

fn coded_part(a: &Act) -> Option<&ObservationValue> {
    a.detail
        .as_observation()
        .map(|o| &o.value)
        .filter(|v| matches!(v, ObservationValue::Coded(_)))
}

fn fill_value(a: &mut Act, value: ObservationValue) {
    if let Some(o) = a.detail.observation_mut() {
        o.value = value;
    }
}

fn substance_part(a: &Act) -> Option<&SubstanceAdministrationDetail> {
    match &a.detail {
        ActDetail::SubstanceAdministration(s) => Some(s),
        _ => None,
    }
}

fn fill_substance(a: &mut Act, loaded: SubstanceAdministrationDetail) {
    a.detail = ActDetail::SubstanceAdministration(loaded);
}

fn encounter_part(a: &Act) -> Option<&PatientEncounterDetail> {
    match &a.detail {
        ActDetail::PatientEncounter(p) => Some(p),
        _ => None,
    }
}

fn fill_encounter(a: &mut Act, loaded: PatientEncounterDetail) {
    a.detail = ActDetail::PatientEncounter(loaded);
}

fn control_part(a: &Act) -> Option<&()> {
    match a.detail {
        ActDetail::ControlAct => Some(&()),
        _ => None,
    }
}

fn fill_control(a: &mut Act, _loaded: ()) {
    a.detail = ActDetail::ControlAct;
}

subtype!(OBSERVATION: Act, ObservationMapping, ActKind::Observation, ACT_ROOT, observation_part, fill_observation);
subtype!(QUANTITY_OBSERVATION: Act, QuantityObservationMapping, ActKind::QuantityObservation, OBSERVATION, quantity_part, fill_value);
subtype!(TEXT_OBSERVATION: Act, TextObservationMapping, ActKind::TextObservation, OBSERVATION, text_part, fill_value);
subtype!(CODED_OBSERVATION: Act, CodedObservationMapping, ActKind::CodedObservation, OBSERVATION, coded_part, fill_value);
subtype!(SUBSTANCE_ADMINISTRATION: Act, SubstanceAdministrationMapping, ActKind::SubstanceAdministration, ACT_ROOT, substance_part, fill_substance);
subtype!(PATIENT_ENCOUNTER: Act, PatientEncounterMapping, ActKind::PatientEncounter, ACT_ROOT, encounter_part, fill_encounter);
subtype!(CONTROL_ACT: Act, ControlActMapping, ActKind::ControlAct, ACT_ROOT, control_part, fill_control);

pub fn act_handler(kind: ActKind) -> &'static ActHandler {
    match kind {
        ActKind::Generic => &ACT_ROOT,
        ActKind::Observation => &OBSERVATION,
        ActKind::QuantityObservation => &QUANTITY_OBSERVATION,
        ActKind::TextObservation => &TEXT_OBSERVATION,
        ActKind::CodedObservation => &CODED_OBSERVATION,
        ActKind::SubstanceAdministration => &SUBSTANCE_ADMINISTRATION,
        ActKind::PatientEncounter => &PATIENT_ENCOUNTER,
        ActKind::ControlAct => &CONTROL_ACT,
    }
}

/// Resolves a stored act's kind: the class, refined for observations by
/// the stored value type tag.
pub fn stored_act_kind(ctx: &DataContext<'_>, key: Key, class: Option<Key>) -> Result<ActKind, EngineError> {
    let kind = ActKind::resolve(class, None);
    if kind != ActKind::Observation {
        return Ok(kind);
    }
    let tag = sqlite::load_row(ctx.conn(), &tables::OBSERVATION, key)?
        .and_then(|row| row.text("value_type"));
    Ok(ActKind::resolve(class, tag.as_deref()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_handler_delegates_to_its_parent_kind() {
        for kind in EntityKind::ALL {
            let handler = entity_handler(kind);
            assert_eq!(handler.kind(), kind);
            if let Some(parent) = handler.parent() {
                assert_eq!(handler.table().parent().map(|t| t.name), Some(parent.table().name));
            }
        }
        assert_eq!(entity_handler(EntityKind::Patient).parent().map(|p| p.kind()), Some(EntityKind::Person));
        assert_eq!(entity_handler(EntityKind::Generic).table().name, "entity");
    }

    #[test]
    fn act_handlers_follow_table_parents() {
        let kinds = [
            ActKind::Generic,
            ActKind::Observation,
            ActKind::QuantityObservation,
            ActKind::TextObservation,
            ActKind::CodedObservation,
            ActKind::SubstanceAdministration,
            ActKind::PatientEncounter,
            ActKind::ControlAct,
        ];
        for kind in kinds {
            let handler = act_handler(kind);
            assert_eq!(handler.kind(), kind);
            if let Some(parent) = handler.parent() {
                assert_eq!(handler.table().parent().map(|t| t.name), Some(parent.table().name));
            }
        }
    }

    #[test]
    fn observation_value_parts_select_one_table() {
        let act = Act::observation(ObservationValue::Text("pos".into()));
        assert!(quantity_part(&act).is_none());
        assert!(text_part(&act).is_some());
        assert!(coded_part(&act).is_none());
    }
}
