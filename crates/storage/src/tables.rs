use crate::mapping::ColumnDef as C;
use crate::mapping::ColumnType as T;
use crate::mapping::{CollectionDef, TableMap, TableRole};

/// Key plus record metadata, followed by the table's own columns.
macro_rules! record_columns {
    ($($col:expr),* $(,)?) => {
        &[
            C::new("uuid", T::Key).required(),
            C::new("created_by", T::Key).immutable(),
            C::new("creation_time", T::Timestamp).required().immutable(),
            C::new("obsoleted_by", T::Key),
            C::new("obsoletion_time", T::Timestamp),
            C::new("hidden", T::Boolean),
            $($col),*
        ]
    };
}

/// Record columns plus the current version's chain position.
macro_rules! versioned_columns {
    ($($col:expr),* $(,)?) => {
        record_columns![
            C::new("version_key", T::Key).required(),
            C::new("version_sequence", T::Integer).required(),
            C::new("previous_version_key", T::Key),
            $($col),*
        ]
    };
}

macro_rules! association_columns {
    ($($col:expr),* $(,)?) => {
        &[
            C::new("uuid", T::Key).required(),
            C::new("source_key", T::Key).required(),
            $($col),*
        ]
    };
}

macro_rules! table {
    ($role:ident, $name:literal, $key:literal, $owner:literal, $cols:expr, [$($coll:literal => $table:ident),* $(,)?]) => {
        TableMap {
            name: $name,
            key_column: $key,
            owner_column: $owner,
            role: TableRole::$role,
            columns: $cols,
            collections: &[$(CollectionDef { name: $coll, table: &$table }),*],
        }
    };
}

macro_rules! root {
    ($name:literal, $cols:expr, &[$($coll:tt)*] $(,)?) => {
        table!(Root, $name, "uuid", "uuid", $cols, [$($coll)*])
    };
}

macro_rules! subtype {
    ($name:literal, $cols:expr, &[$($coll:tt)*] $(,)?) => {
        table!(Subtype, $name, "uuid", "uuid", $cols, [$($coll)*])
    };
}

macro_rules! association {
    ($name:literal, $cols:expr, &[$($coll:tt)*] $(,)?) => {
        table!(Association, $name, "uuid", "source_key", $cols, [$($coll)*])
    };
}

/// Keyless membership rows; the target is the key within one owner.
macro_rules! link {
    ($name:literal) => {
        table!(
            Link,
            $name,
            "target_key",
            "source_key",
            &[
                C::new("source_key", T::Key).required(),
                C::new("target_key", T::Key).required(),
            ],
            []
        )
    };
}

/// Component rows hang off a name or address but are owned by the entity.
macro_rules! component {
    ($name:literal) => {
        table!(
            Association,
            $name,
            "uuid",
            "root_key",
            &[
                C::new("uuid", T::Key).required(),
                C::new("source_key", T::Key).required(),
                C::new("root_key", T::Key).required(),
                C::new("component_type_key", T::Key),
                C::new("value", T::Text).required(),
                C::new("sequence", T::Integer),
            ],
            []
        )
    };
}

// ---- entity family ----

pub static ENTITY: TableMap = root!(
    "entity",
    versioned_columns![
        C::new("class_concept_key", T::Key).required(),
        C::new("determiner_concept_key", T::Key),
        C::new("status_concept_key", T::Key).required(),
        C::new("type_concept_key", T::Key),
    ],
    &[
        "identifiers" => ENTITY_IDENTIFIER,
        "names" => ENTITY_NAME,
        "addresses" => ENTITY_ADDRESS,
        "telecoms" => ENTITY_TELECOM,
        "tags" => ENTITY_TAG,
        "extensions" => ENTITY_EXTENSION,
        "notes" => ENTITY_NOTE,
        "relationships" => ENTITY_RELATIONSHIP,
    ],
);

pub static PERSON: TableMap = subtype!(
    "person",
    &[
        C::new("uuid", T::Key).required().joins(&ENTITY),
        C::new("date_of_birth", T::Timestamp),
        C::new("date_of_birth_precision", T::Text),
        C::new("language", T::Text),
    ],
    &[],
);

pub static PATIENT: TableMap = subtype!(
    "patient",
    &[
        C::new("uuid", T::Key).required().joins(&PERSON),
        C::new("gender_concept_key", T::Key),
        C::new("deceased_time", T::Timestamp),
        C::new("multiple_birth_order", T::Integer),
    ],
    &[],
);

pub static PROVIDER: TableMap = subtype!(
    "provider",
    &[
        C::new("uuid", T::Key).required().joins(&PERSON),
        C::new("specialty_concept_key", T::Key),
    ],
    &[],
);

pub static USER_ENTITY: TableMap = subtype!(
    "user_entity",
    &[
        C::new("uuid", T::Key).required().joins(&PERSON),
        C::new("security_user_key", T::Key),
    ],
    &[],
);

pub static PLACE: TableMap = subtype!(
    "place",
    &[
        C::new("uuid", T::Key).required().joins(&ENTITY),
        C::new("is_mobile", T::Boolean),
        C::new("latitude", T::Real),
        C::new("longitude", T::Real),
    ],
    &["services" => PLACE_SERVICE],
);

pub static ORGANIZATION: TableMap = subtype!(
    "organization",
    &[
        C::new("uuid", T::Key).required().joins(&ENTITY),
        C::new("industry_concept_key", T::Key),
    ],
    &[],
);

pub static MATERIAL: TableMap = subtype!(
    "material",
    &[
        C::new("uuid", T::Key).required().joins(&ENTITY),
        C::new("quantity", T::Real),
        C::new("form_concept_key", T::Key),
        C::new("quantity_concept_key", T::Key),
        C::new("expiry_time", T::Timestamp),
        C::new("is_administrable", T::Boolean),
    ],
    &[],
);

pub static MANUFACTURED_MATERIAL: TableMap = subtype!(
    "manufactured_material",
    &[
        C::new("uuid", T::Key).required().joins(&MATERIAL),
        C::new("lot_number", T::Text),
    ],
    &[],
);

pub static DEVICE: TableMap = subtype!(
    "device",
    &[
        C::new("uuid", T::Key).required().joins(&ENTITY),
        C::new("manufacturer_model", T::Text),
        C::new("operating_system", T::Text),
    ],
    &[],
);

pub static APPLICATION: TableMap = subtype!(
    "application",
    &[
        C::new("uuid", T::Key).required().joins(&ENTITY),
        C::new("software_name", T::Text),
        C::new("version_name", T::Text),
        C::new("vendor_name", T::Text),
    ],
    &[],
);

// ---- entity associations ----

pub static ENTITY_IDENTIFIER: TableMap = association!(
    "entity_identifier",
    association_columns![
        C::new("authority", T::Text),
        C::new("value", T::Text).required(),
        C::new("issue_time", T::Timestamp),
    ],
    &[],
);

pub static ENTITY_NAME: TableMap = association!(
    "entity_name",
    association_columns![C::new("use_concept_key", T::Key)],
    &["components" => ENTITY_NAME_COMPONENT],
);

pub static ENTITY_NAME_COMPONENT: TableMap = component!("entity_name_component");

pub static ENTITY_ADDRESS: TableMap = association!(
    "entity_address",
    association_columns![C::new("use_concept_key", T::Key)],
    &["components" => ENTITY_ADDRESS_COMPONENT],
);

pub static ENTITY_ADDRESS_COMPONENT: TableMap = component!("entity_address_component");

pub static ENTITY_TELECOM: TableMap = association!(
    "entity_telecom",
    association_columns![
        C::new("use_concept_key", T::Key),
        C::new("value", T::Text).required(),
    ],
    &[],
);

pub static ENTITY_TAG: TableMap = association!(
    "entity_tag",
    association_columns![
        C::new("tag_key", T::Text).required(),
        C::new("value", T::Text),
    ],
    &[],
);

pub static ENTITY_EXTENSION: TableMap = association!(
    "entity_extension",
    association_columns![
        C::new("extension_type", T::Text),
        C::new("value", T::Blob).required(),
    ],
    &[],
);

pub static ENTITY_NOTE: TableMap = association!(
    "entity_note",
    association_columns![
        C::new("author_key", T::Key),
        C::new("text", T::Text).required(),
    ],
    &[],
);

pub static ENTITY_RELATIONSHIP: TableMap = association!(
    "entity_relationship",
    association_columns![
        C::new("relationship_type_key", T::Key),
        C::new("target_key", T::Key).required(),
        C::new("quantity", T::Integer),
    ],
    &[],
);

pub static PLACE_SERVICE: TableMap = association!(
    "place_service",
    association_columns![
        C::new("service_concept_key", T::Key).required(),
        C::new("schedule", T::Text),
    ],
    &[],
);

// ---- act family ----

pub static ACT: TableMap = root!(
    "act",
    versioned_columns![
        C::new("class_concept_key", T::Key).required(),
        C::new("mood_concept_key", T::Key).required(),
        C::new("status_concept_key", T::Key).required(),
        C::new("type_concept_key", T::Key),
        C::new("act_time", T::Timestamp),
        C::new("start_time", T::Timestamp),
        C::new("stop_time", T::Timestamp),
        C::new("is_negated", T::Boolean),
    ],
    &[
        "identifiers" => ACT_IDENTIFIER,
        "tags" => ACT_TAG,
        "extensions" => ACT_EXTENSION,
        "notes" => ACT_NOTE,
        "relationships" => ACT_RELATIONSHIP,
        "participations" => ACT_PARTICIPATION,
    ],
);

pub static OBSERVATION: TableMap = subtype!(
    "observation",
    &[
        C::new("uuid", T::Key).required().joins(&ACT),
        C::new("interpretation_concept_key", T::Key),
        C::new("value_type", T::Text),
    ],
    &[],
);

pub static QUANTITY_OBSERVATION: TableMap = subtype!(
    "quantity_observation",
    &[
        C::new("uuid", T::Key).required().joins(&OBSERVATION),
        C::new("value", T::Real).required(),
        C::new("unit_concept_key", T::Key),
    ],
    &[],
);

pub static TEXT_OBSERVATION: TableMap = subtype!(
    "text_observation",
    &[
        C::new("uuid", T::Key).required().joins(&OBSERVATION),
        C::new("value", T::Text),
    ],
    &[],
);

pub static CODED_OBSERVATION: TableMap = subtype!(
    "coded_observation",
    &[
        C::new("uuid", T::Key).required().joins(&OBSERVATION),
        C::new("value", T::Key),
    ],
    &[],
);

pub static SUBSTANCE_ADMINISTRATION: TableMap = subtype!(
    "substance_administration",
    &[
        C::new("uuid", T::Key).required().joins(&ACT),
        C::new("route_concept_key", T::Key),
        C::new("dose_quantity", T::Real),
        C::new("dose_unit_concept_key", T::Key),
        C::new("sequence_id", T::Integer),
    ],
    &[],
);

pub static PATIENT_ENCOUNTER: TableMap = subtype!(
    "patient_encounter",
    &[
        C::new("uuid", T::Key).required().joins(&ACT),
        C::new("discharge_disposition_key", T::Key),
    ],
    &[],
);

pub static CONTROL_ACT: TableMap = subtype!(
    "control_act",
    &[C::new("uuid", T::Key).required().joins(&ACT)],
    &[],
);

// ---- act associations ----

pub static ACT_IDENTIFIER: TableMap = association!(
    "act_identifier",
    association_columns![
        C::new("authority", T::Text),
        C::new("value", T::Text).required(),
        C::new("issue_time", T::Timestamp),
    ],
    &[],
);

pub static ACT_TAG: TableMap = association!(
    "act_tag",
    association_columns![
        C::new("tag_key", T::Text).required(),
        C::new("value", T::Text),
    ],
    &[],
);

pub static ACT_EXTENSION: TableMap = association!(
    "act_extension",
    association_columns![
        C::new("extension_type", T::Text),
        C::new("value", T::Blob).required(),
    ],
    &[],
);

pub static ACT_NOTE: TableMap = association!(
    "act_note",
    association_columns![
        C::new("author_key", T::Key),
        C::new("text", T::Text).required(),
    ],
    &[],
);

pub static ACT_RELATIONSHIP: TableMap = association!(
    "act_relationship",
    association_columns![
        C::new("relationship_type_key", T::Key),
        C::new("target_key", T::Key).required(),
    ],
    &[],
);

pub static ACT_PARTICIPATION: TableMap = association!(
    "act_participation",
    association_columns![
        C::new("role_key", T::Key),
        C::new("player_key", T::Key).required(),
        C::new("quantity", T::Integer),
    ],
    &[],
);

// ---- vocabulary ----

pub static CONCEPT: TableMap = root!(
    "concept",
    versioned_columns![
        C::new("mnemonic", T::Text).required(),
        C::new("class_concept_key", T::Key),
        C::new("status_concept_key", T::Key),
    ],
    &["names" => CONCEPT_NAME],
);

pub static CONCEPT_NAME: TableMap = association!(
    "concept_name",
    association_columns![
        C::new("language", T::Text),
        C::new("name", T::Text).required(),
    ],
    &[],
);

pub static CONCEPT_SET: TableMap = root!(
    "concept_set",
    record_columns![
        C::new("mnemonic", T::Text).required(),
        C::new("name", T::Text),
        C::new("url", T::Text),
    ],
    &["members" => CONCEPT_SET_MEMBER],
);

pub static CONCEPT_SET_MEMBER: TableMap = link!("concept_set_member");

// ---- security ----

pub static SECURITY_ROLE: TableMap = root!(
    "security_role",
    record_columns![
        C::new("name", T::Text).required(),
        C::new("description", T::Text),
    ],
    &[],
);

pub static SECURITY_USER: TableMap = root!(
    "security_user",
    record_columns![
        C::new("user_name", T::Text).required(),
        C::new("email", T::Text),
        C::new("phone_number", T::Text),
        C::new("lockout_time", T::Timestamp),
    ],
    &["roles" => SECURITY_USER_ROLE],
);

pub static SECURITY_USER_ROLE: TableMap = link!("security_user_role");

// ---- versioning ----

/// One row per minted version of any versioned record.
pub static VERSION_CHAIN: TableMap = TableMap {
    name: "version_chain",
    key_column: "version_key",
    owner_column: "record_key",
    role: TableRole::Chain,
    columns: &[
        C::new("version_key", T::Key).required(),
        C::new("record_key", T::Key).required(),
        C::new("version_sequence", T::Integer).required(),
        C::new("previous_version_key", T::Key),
        C::new("author_key", T::Key),
        C::new("created_at", T::Timestamp).required(),
    ],
    collections: &[],
};

/// Every table, parents before children.
pub static ALL_TABLES: &[&TableMap] = &[
    &ENTITY,
    &PERSON,
    &PATIENT,
    &PROVIDER,
    &USER_ENTITY,
    &PLACE,
    &ORGANIZATION,
    &MATERIAL,
    &MANUFACTURED_MATERIAL,
    &DEVICE,
    &APPLICATION,
    &ENTITY_IDENTIFIER,
    &ENTITY_NAME,
    &ENTITY_NAME_COMPONENT,
    &ENTITY_ADDRESS,
    &ENTITY_ADDRESS_COMPONENT,
    &ENTITY_TELECOM,
    &ENTITY_TAG,
    &ENTITY_EXTENSION,
    &ENTITY_NOTE,
    &ENTITY_RELATIONSHIP,
    &PLACE_SERVICE,
    &ACT,
    &OBSERVATION,
    &QUANTITY_OBSERVATION,
    &TEXT_OBSERVATION,
    &CODED_OBSERVATION,
    &SUBSTANCE_ADMINISTRATION,
    &PATIENT_ENCOUNTER,
    &CONTROL_ACT,
    &ACT_IDENTIFIER,
    &ACT_TAG,
    &ACT_EXTENSION,
    &ACT_NOTE,
    &ACT_RELATIONSHIP,
    &ACT_PARTICIPATION,
    &CONCEPT,
    &CONCEPT_NAME,
    &CONCEPT_SET,
    &CONCEPT_SET_MEMBER,
    &SECURITY_ROLE,
    &SECURITY_USER,
    &SECURITY_USER_ROLE,
    &VERSION_CHAIN,
];

/// Shared vocabulary copied wholesale into a staging database.
pub const DEFAULT_REFERENCE_TABLES: &[&str] = &[
    "concept",
    "concept_name",
    "concept_set",
    "concept_set_member",
    "security_role",
];

pub fn by_name(name: &str) -> Option<&'static TableMap> {
    ALL_TABLES.iter().copied().find(|t| t.name == name)
}
