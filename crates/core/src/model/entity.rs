use serde::{Deserialize, Serialize};

use super::association::{
    EntityAddress, EntityName, EntityRelationship, Extension, Identifier, Note, PlaceService, Tag,
    TelecomAddress,
};
use super::concept::Concept;
use super::meta::{RecordMeta, VersionInfo};
use crate::concepts::{determiner, entity_class};
use crate::ids::Key;
use crate::impl_record;
use crate::time::Timestamp;

/// A thing: person, place, organization, material, device or application.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    pub key: Option<Key>,
    pub version: VersionInfo,
    pub meta: RecordMeta,
    pub class_concept_key: Option<Key>,
    pub determiner_concept_key: Option<Key>,
    pub status_concept_key: Option<Key>,
    pub type_concept_key: Option<Key>,
    pub identifiers: Vec<Identifier>,
    pub names: Vec<EntityName>,
    pub addresses: Vec<EntityAddress>,
    pub telecoms: Vec<TelecomAddress>,
    pub tags: Vec<Tag>,
    pub extensions: Vec<Extension>,
    pub notes: Vec<Note>,
    pub relationships: Vec<EntityRelationship>,
    pub detail: EntityDetail,
}
impl_record!(versioned Entity);

impl Entity {
    /// A specific instance of the given kind with a default detail shape.
    pub fn of_kind(kind: EntityKind) -> Self {
        Self {
            class_concept_key: Some(kind.class_key()),
            determiner_concept_key: Some(determiner::SPECIFIC),
            detail: EntityDetail::default_for(kind),
            ..Default::default()
        }
    }

    pub fn patient(detail: PatientDetail) -> Self {
        Self {
            detail: EntityDetail::Patient(detail),
            ..Self::of_kind(EntityKind::Patient)
        }
    }

    pub fn person(detail: PersonDetail) -> Self {
        Self {
            detail: EntityDetail::Person(detail),
            ..Self::of_kind(EntityKind::Person)
        }
    }

    pub fn place(detail: PlaceDetail) -> Self {
        Self {
            detail: EntityDetail::Place(detail),
            ..Self::of_kind(EntityKind::Place)
        }
    }

    pub fn kind(&self) -> EntityKind {
        EntityKind::from_class(self.class_concept_key)
    }
}

/// Concrete entity shapes, one per discriminator code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    Generic,
    Person,
    Patient,
    Provider,
    UserEntity,
    Place,
    Organization,
    Material,
    ManufacturedMaterial,
    Device,
    Application,
}

impl EntityKind {
    pub const ALL: [EntityKind; 11] = [
        EntityKind::Generic,
        EntityKind::Person,
        EntityKind::Patient,
        EntityKind::Provider,
        EntityKind::UserEntity,
        EntityKind::Place,
        EntityKind::Organization,
        EntityKind::Material,
        EntityKind::ManufacturedMaterial,
        EntityKind::Device,
        EntityKind::Application,
    ];

    /// Unknown or absent class codes fall back to the generic shape.
    pub fn from_class(class: Option<Key>) -> Self {
        class
            .and_then(|c| Self::ALL.into_iter().find(|k| k.class_key() == c))
            .unwrap_or(EntityKind::Generic)
    }

    pub fn class_key(&self) -> Key {
        match self {
            EntityKind::Generic => entity_class::ENTITY,
            EntityKind::Person => entity_class::PERSON,
            EntityKind::Patient => entity_class::PATIENT,
            EntityKind::Provider => entity_class::PROVIDER,
            EntityKind::UserEntity => entity_class::USER_ENTITY,
            EntityKind::Place => entity_class::PLACE,
            EntityKind::Organization => entity_class::ORGANIZATION,
            EntityKind::Material => entity_class::MATERIAL,
            EntityKind::ManufacturedMaterial => entity_class::MANUFACTURED_MATERIAL,
            EntityKind::Device => entity_class::DEVICE,
            EntityKind::Application => entity_class::APPLICATION,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub enum EntityDetail {
    #[default]
    Generic,
    Person(PersonDetail),
    Patient(PatientDetail),
    Provider(ProviderDetail),
    UserEntity(UserEntityDetail),
    Place(PlaceDetail),
    Organization(OrganizationDetail),
    Material(MaterialDetail),
    ManufacturedMaterial(ManufacturedMaterialDetail),
    Device(DeviceDetail),
    Application(ApplicationDetail),
}

impl EntityDetail {
    pub fn default_for(kind: EntityKind) -> Self {
        match kind {
            EntityKind::Generic => EntityDetail::Generic,
            EntityKind::Person => EntityDetail::Person(Default::default()),
            EntityKind::Patient => EntityDetail::Patient(Default::default()),
            EntityKind::Provider => EntityDetail::Provider(Default::default()),
            EntityKind::UserEntity => EntityDetail::UserEntity(Default::default()),
            EntityKind::Place => EntityDetail::Place(Default::default()),
            EntityKind::Organization => EntityDetail::Organization(Default::default()),
            EntityKind::Material => EntityDetail::Material(Default::default()),
            EntityKind::ManufacturedMaterial => {
                EntityDetail::ManufacturedMaterial(Default::default())
            }
            EntityKind::Device => EntityDetail::Device(Default::default()),
            EntityKind::Application => EntityDetail::Application(Default::default()),
        }
    }

    pub fn kind(&self) -> EntityKind {
        match self {
            EntityDetail::Generic => EntityKind::Generic,
            EntityDetail::Person(_) => EntityKind::Person,
            EntityDetail::Patient(_) => EntityKind::Patient,
            EntityDetail::Provider(_) => EntityKind::Provider,
            EntityDetail::UserEntity(_) => EntityKind::UserEntity,
            EntityDetail::Place(_) => EntityKind::Place,
            EntityDetail::Organization(_) => EntityKind::Organization,
            EntityDetail::Material(_) => EntityKind::Material,
            EntityDetail::ManufacturedMaterial(_) => EntityKind::ManufacturedMaterial,
            EntityDetail::Device(_) => EntityKind::Device,
            EntityDetail::Application(_) => EntityKind::Application,
        }
    }

    /// Reshape to `kind`, keeping the shared person or material part.
    pub fn conform_to(self, kind: EntityKind) -> Self {
        if self.kind() == kind {
            return self;
        }
        let person = self.person().cloned().unwrap_or_default();
        let material = self.material().cloned().unwrap_or_default();
        match kind {
            EntityKind::Person => EntityDetail::Person(person),
            EntityKind::Patient => EntityDetail::Patient(PatientDetail {
                person,
                ..Default::default()
            }),
            EntityKind::Provider => EntityDetail::Provider(ProviderDetail {
                person,
                ..Default::default()
            }),
            EntityKind::UserEntity => EntityDetail::UserEntity(UserEntityDetail {
                person,
                ..Default::default()
            }),
            EntityKind::Material => EntityDetail::Material(material),
            EntityKind::ManufacturedMaterial => {
                EntityDetail::ManufacturedMaterial(ManufacturedMaterialDetail {
                    material,
                    ..Default::default()
                })
            }
            other => EntityDetail::default_for(other),
        }
    }

    pub fn person(&self) -> Option<&PersonDetail> {
        match self {
            EntityDetail::Person(p) => Some(p),
            EntityDetail::Patient(p) => Some(&p.person),
            EntityDetail::Provider(p) => Some(&p.person),
            EntityDetail::UserEntity(u) => Some(&u.person),
            _ => None,
        }
    }

    pub fn person_mut(&mut self) -> Option<&mut PersonDetail> {
        match self {
            EntityDetail::Person(p) => Some(p),
            EntityDetail::Patient(p) => Some(&mut p.person),
            EntityDetail::Provider(p) => Some(&mut p.person),
            EntityDetail::UserEntity(u) => Some(&mut u.person),
            _ => None,
        }
    }

    pub fn material(&self) -> Option<&MaterialDetail> {
        match self {
            EntityDetail::Material(m) => Some(m),
            EntityDetail::ManufacturedMaterial(m) => Some(&m.material),
            _ => None,
        }
    }

    pub fn material_mut(&mut self) -> Option<&mut MaterialDetail> {
        match self {
            EntityDetail::Material(m) => Some(m),
            EntityDetail::ManufacturedMaterial(m) => Some(&mut m.material),
            _ => None,
        }
    }

    pub fn as_patient(&self) -> Option<&PatientDetail> {
        match self {
            EntityDetail::Patient(p) => Some(p),
            _ => None,
        }
    }

    pub fn as_place(&self) -> Option<&PlaceDetail> {
        match self {
            EntityDetail::Place(p) => Some(p),
            _ => None,
        }
    }
}

/// How much of a date of birth is known.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DatePrecision {
    Year,
    Month,
    Day,
    Hour,
    Minute,
    Second,
}

impl DatePrecision {
    pub fn as_str(&self) -> &'static str {
        match self {
            DatePrecision::Year => "Y",
            DatePrecision::Month => "m",
            DatePrecision::Day => "D",
            DatePrecision::Hour => "H",
            DatePrecision::Minute => "M",
            DatePrecision::Second => "S",
        }
    }

    pub fn parse(code: &str) -> Option<Self> {
        match code {
            "Y" => Some(DatePrecision::Year),
            "m" => Some(DatePrecision::Month),
            "D" => Some(DatePrecision::Day),
            "H" => Some(DatePrecision::Hour),
            "M" => Some(DatePrecision::Minute),
            "S" => Some(DatePrecision::Second),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PersonDetail {
    pub date_of_birth: Option<Timestamp>,
    pub date_of_birth_precision: Option<DatePrecision>,
    pub language: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PatientDetail {
    pub person: PersonDetail,
    pub gender_concept_key: Option<Key>,
    /// Saved on demand when not yet persisted; its key is written back to
    /// `gender_concept_key`.
    #[serde(skip)]
    pub gender_concept: Option<Box<Concept>>,
    pub deceased_time: Option<Timestamp>,
    pub multiple_birth_order: Option<i64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProviderDetail {
    pub person: PersonDetail,
    pub specialty_concept_key: Option<Key>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserEntityDetail {
    pub person: PersonDetail,
    pub security_user_key: Option<Key>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlaceDetail {
    pub is_mobile: bool,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub services: Vec<PlaceService>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OrganizationDetail {
    pub industry_concept_key: Option<Key>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MaterialDetail {
    pub quantity: Option<f64>,
    pub form_concept_key: Option<Key>,
    pub quantity_concept_key: Option<Key>,
    pub expiry_time: Option<Timestamp>,
    pub is_administrable: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ManufacturedMaterialDetail {
    pub material: MaterialDetail,
    pub lot_number: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeviceDetail {
    pub manufacturer_model: Option<String>,
    pub operating_system: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ApplicationDetail {
    pub software_name: Option<String>,
    pub version_name: Option<String>,
    pub vendor_name: Option<String>,
}
