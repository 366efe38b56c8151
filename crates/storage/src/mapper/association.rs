use hearth_core::Key;
use hearth_core::model::{
    ActParticipation, ActRelationship, AddressComponent, ConceptName, EntityAddress, EntityName,
    EntityRelationship, Extension, Identifier, Membership, NameComponent, Note, PlaceService, Tag,
    TelecomAddress,
};

use super::shared_mapping;
use crate::error::StorageError;
use crate::mapping::{RowMapping, TableMap, TableRow};
use crate::tables;

fn keyed(table: &'static TableMap, key: Key, source: Option<Key>) -> TableRow {
    let mut row = TableRow::new(table);
    row.put_key("uuid", Some(key));
    row.put_key("source_key", source);
    row
}

fn identifier_to_row(table: &'static TableMap, key: Key, m: &Identifier) -> Result<TableRow, StorageError> {
    let mut row = keyed(table, key, m.source_key);
    row.put_text("authority", m.authority.as_deref());
    row.put_text("value", m.value.as_deref());
    row.put_time("issue_time", m.issue_time);
    Ok(row)
}

fn identifier_from_row(row: &TableRow) -> Result<Identifier, StorageError> {
    Ok(Identifier {
        key: row.key("uuid")?,
        source_key: row.key("source_key")?,
        authority: row.text("authority"),
        value: row.text("value"),
        issue_time: row.time("issue_time"),
    })
}

shared_mapping!(Identifier, identifier_to_row, identifier_from_row;
    EntityIdentifierMapping => tables::ENTITY_IDENTIFIER,
    ActIdentifierMapping => tables::ACT_IDENTIFIER,
);

fn tag_to_row(table: &'static TableMap, key: Key, m: &Tag) -> Result<TableRow, StorageError> {
    let mut row = keyed(table, key, m.source_key);
    row.put_text("tag_key", m.tag_key.as_deref());
    row.put_text("value", m.value.as_deref());
    Ok(row)
}

fn tag_from_row(row: &TableRow) -> Result<Tag, StorageError> {
    Ok(Tag {
        key: row.key("uuid")?,
        source_key: row.key("source_key")?,
        tag_key: row.text("tag_key"),
        value: row.text("value"),
    })
}

shared_mapping!(Tag, tag_to_row, tag_from_row;
    EntityTagMapping => tables::ENTITY_TAG,
    ActTagMapping => tables::ACT_TAG,
);

fn extension_to_row(table: &'static TableMap, key: Key, m: &Extension) -> Result<TableRow, StorageError> {
    let mut row = keyed(table, key, m.source_key);
    row.put_text("extension_type", m.extension_type.as_deref());
    row.put_value("value", m.value.as_ref())?;
    Ok(row)
}

fn extension_from_row(row: &TableRow) -> Result<Extension, StorageError> {
    Ok(Extension {
        key: row.key("uuid")?,
        source_key: row.key("source_key")?,
        extension_type: row.text("extension_type"),
        value: row.value("value")?,
    })
}

shared_mapping!(Extension, extension_to_row, extension_from_row;
    EntityExtensionMapping => tables::ENTITY_EXTENSION,
    ActExtensionMapping => tables::ACT_EXTENSION,
);

fn note_to_row(table: &'static TableMap, key: Key, m: &Note) -> Result<TableRow, StorageError> {
    let mut row = keyed(table, key, m.source_key);
    row.put_key("author_key", m.author_key);
    row.put_text("text", m.text.as_deref());
    Ok(row)
}

fn note_from_row(row: &TableRow) -> Result<Note, StorageError> {
    Ok(Note {
        key: row.key("uuid")?,
        source_key: row.key("source_key")?,
        author_key: row.key("author_key")?,
        text: row.text("text"),
    })
}

shared_mapping!(Note, note_to_row, note_from_row;
    EntityNoteMapping => tables::ENTITY_NOTE,
    ActNoteMapping => tables::ACT_NOTE,
);

fn membership_to_row(table: &'static TableMap, key: Key, m: &Membership) -> Result<TableRow, StorageError> {
    let mut row = TableRow::new(table);
    row.put_key("source_key", m.source_key);
    row.put_key("target_key", Some(key));
    Ok(row)
}

fn membership_from_row(row: &TableRow) -> Result<Membership, StorageError> {
    Ok(Membership {
        source_key: row.key("source_key")?,
        target_key: row.key("target_key")?,
    })
}

shared_mapping!(Membership, membership_to_row, membership_from_row;
    ConceptSetMemberMapping => tables::CONCEPT_SET_MEMBER,
    SecurityUserRoleMapping => tables::SECURITY_USER_ROLE,
);

/// Name header; components map through `NameComponentMapping`.
pub struct EntityNameMapping;

impl RowMapping for EntityNameMapping {
    type Model = EntityName;

    fn table() -> &'static TableMap {
        &tables::ENTITY_NAME
    }

    fn to_row(key: Key, m: &EntityName) -> Result<TableRow, StorageError> {
        let mut row = keyed(Self::table(), key, m.source_key);
        row.put_key("use_concept_key", m.use_concept_key);
        Ok(row)
    }

    fn from_row(row: &TableRow) -> Result<EntityName, StorageError> {
        Ok(EntityName {
            key: row.key("uuid")?,
            source_key: row.key("source_key")?,
            use_concept_key: row.key("use_concept_key")?,
            components: Vec::new(),
        })
    }
}

/// `root_key` is stamped by the writer, which knows the owning entity.
pub struct NameComponentMapping;

impl RowMapping for NameComponentMapping {
    type Model = NameComponent;

    fn table() -> &'static TableMap {
        &tables::ENTITY_NAME_COMPONENT
    }

    fn to_row(key: Key, m: &NameComponent) -> Result<TableRow, StorageError> {
        let mut row = keyed(Self::table(), key, m.source_key);
        row.put_key("component_type_key", m.component_type_key);
        row.put_text("value", m.value.as_deref());
        row.put_int("sequence", Some(m.sequence));
        Ok(row)
    }

    fn from_row(row: &TableRow) -> Result<NameComponent, StorageError> {
        Ok(NameComponent {
            key: row.key("uuid")?,
            source_key: row.key("source_key")?,
            component_type_key: row.key("component_type_key")?,
            value: row.text("value"),
            sequence: row.int("sequence").unwrap_or_default(),
        })
    }
}

pub struct EntityAddressMapping;

impl RowMapping for EntityAddressMapping {
    type Model = EntityAddress;

    fn table() -> &'static TableMap {
        &tables::ENTITY_ADDRESS
    }

    fn to_row(key: Key, m: &EntityAddress) -> Result<TableRow, StorageError> {
        let mut row = keyed(Self::table(), key, m.source_key);
        row.put_key("use_concept_key", m.use_concept_key);
        Ok(row)
    }

    fn from_row(row: &TableRow) -> Result<EntityAddress, StorageError> {
        Ok(EntityAddress {
            key: row.key("uuid")?,
            source_key: row.key("source_key")?,
            use_concept_key: row.key("use_concept_key")?,
            components: Vec::new(),
        })
    }
}

pub struct AddressComponentMapping;

impl RowMapping for AddressComponentMapping {
    type Model = AddressComponent;

    fn table() -> &'static TableMap {
        &tables::ENTITY_ADDRESS_COMPONENT
    }

    fn to_row(key: Key, m: &AddressComponent) -> Result<TableRow, StorageError> {
        let mut row = keyed(Self::table(), key, m.source_key);
        row.put_key("component_type_key", m.component_type_key);
        row.put_text("value", m.value.as_deref());
        row.put_int("sequence", Some(m.sequence));
        Ok(row)
    }

    fn from_row(row: &TableRow) -> Result<AddressComponent, StorageError> {
        Ok(AddressComponent {
            key: row.key("uuid")?,
            source_key: row.key("source_key")?,
            component_type_key: row.key("component_type_key")?,
            value: row.text("value"),
            sequence: row.int("sequence").unwrap_or_default(),
        })
    }
}

pub struct TelecomMapping;

impl RowMapping for TelecomMapping {
    type Model = TelecomAddress;

    fn table() -> &'static TableMap {
        &tables::ENTITY_TELECOM
    }

    fn to_row(key: Key, m: &TelecomAddress) -> Result<TableRow, StorageError> {
        let mut row = keyed(Self::table(), key, m.source_key);
        row.put_key("use_concept_key", m.use_concept_key);
        row.put_text("value", m.value.as_deref());
        Ok(row)
    }

    fn from_row(row: &TableRow) -> Result<TelecomAddress, StorageError> {
        Ok(TelecomAddress {
            key: row.key("uuid")?,
            source_key: row.key("source_key")?,
            use_concept_key: row.key("use_concept_key")?,
            value: row.text("value"),
        })
    }
}

pub struct EntityRelationshipMapping;

impl RowMapping for EntityRelationshipMapping {
    type Model = EntityRelationship;

    fn table() -> &'static TableMap {
        &tables::ENTITY_RELATIONSHIP
    }

    fn to_row(key: Key, m: &EntityRelationship) -> Result<TableRow, StorageError> {
        let mut row = keyed(Self::table(), key, m.source_key);
        row.put_key("relationship_type_key", m.relationship_type_key);
        row.put_key("target_key", m.target_key);
        row.put_int("quantity", m.quantity);
        Ok(row)
    }

    fn from_row(row: &TableRow) -> Result<EntityRelationship, StorageError> {
        Ok(EntityRelationship {
            key: row.key("uuid")?,
            source_key: row.key("source_key")?,
            relationship_type_key: row.key("relationship_type_key")?,
            target_key: row.key("target_key")?,
            quantity: row.int("quantity"),
            target_entity: None,
        })
    }
}

pub struct PlaceServiceMapping;

impl RowMapping for PlaceServiceMapping {
    type Model = PlaceService;

    fn table() -> &'static TableMap {
        &tables::PLACE_SERVICE
    }

    fn to_row(key: Key, m: &PlaceService) -> Result<TableRow, StorageError> {
        let mut row = keyed(Self::table(), key, m.source_key);
        row.put_key("service_concept_key", m.service_concept_key);
        row.put_text("schedule", m.schedule.as_deref());
        Ok(row)
    }

    fn from_row(row: &TableRow) -> Result<PlaceService, StorageError> {
        Ok(PlaceService {
            key: row.key("uuid")?,
            source_key: row.key("source_key")?,
            service_concept_key: row.key("service_concept_key")?,
            schedule: row.text("schedule"),
        })
    }
}

pub struct ActRelationshipMapping;

impl RowMapping for ActRelationshipMapping {
    type Model = ActRelationship;

    fn table() -> &'static TableMap {
        &tables::ACT_RELATIONSHIP
    }

    fn to_row(key: Key, m: &ActRelationship) -> Result<TableRow, StorageError> {
        let mut row = keyed(Self::table(), key, m.source_key);
        row.put_key("relationship_type_key", m.relationship_type_key);
        row.put_key("target_key", m.target_key);
        Ok(row)
    }

    fn from_row(row: &TableRow) -> Result<ActRelationship, StorageError> {
        Ok(ActRelationship {
            key: row.key("uuid")?,
            source_key: row.key("source_key")?,
            relationship_type_key: row.key("relationship_type_key")?,
            target_key: row.key("target_key")?,
        })
    }
}

pub struct ActParticipationMapping;

impl RowMapping for ActParticipationMapping {
    type Model = ActParticipation;

    fn table() -> &'static TableMap {
        &tables::ACT_PARTICIPATION
    }

    fn to_row(key: Key, m: &ActParticipation) -> Result<TableRow, StorageError> {
        let mut row = keyed(Self::table(), key, m.source_key);
        row.put_key("role_key", m.role_key);
        row.put_key("player_key", m.player_key);
        row.put_int("quantity", m.quantity);
        Ok(row)
    }

    fn from_row(row: &TableRow) -> Result<ActParticipation, StorageError> {
        Ok(ActParticipation {
            key: row.key("uuid")?,
            source_key: row.key("source_key")?,
            role_key: row.key("role_key")?,
            player_key: row.key("player_key")?,
            quantity: row.int("quantity"),
            player_entity: None,
        })
    }
}

pub struct ConceptNameMapping;

impl RowMapping for ConceptNameMapping {
    type Model = ConceptName;

    fn table() -> &'static TableMap {
        &tables::CONCEPT_NAME
    }

    fn to_row(key: Key, m: &ConceptName) -> Result<TableRow, StorageError> {
        let mut row = keyed(Self::table(), key, m.source_key);
        row.put_text("language", m.language.as_deref());
        row.put_text("name", m.name.as_deref());
        Ok(row)
    }

    fn from_row(row: &TableRow) -> Result<ConceptName, StorageError> {
        Ok(ConceptName {
            key: row.key("uuid")?,
            source_key: row.key("source_key")?,
            language: row.text("language"),
            name: row.text("name"),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hearth_core::Value;

    #[test]
    fn extension_value_is_msgpack() {
        let ext = Extension {
            extension_type: Some("weight-history".into()),
            value: Some(Value::Integer(42)),
            source_key: Some(Key::new()),
            ..Default::default()
        };
        let key = Key::new();
        let row = EntityExtensionMapping::to_row(key, &ext).unwrap();
        assert!(matches!(row.get("value"), rusqlite::types::Value::Blob(_)));

        let back = ActExtensionMapping::from_row(&row).unwrap();
        assert_eq!(back.key, Some(key));
        assert_eq!(back.value, Some(Value::Integer(42)));
    }

    #[test]
    fn shared_shapes_target_their_own_tables() {
        assert_eq!(EntityTagMapping::table().name, "entity_tag");
        assert_eq!(ActTagMapping::table().name, "act_tag");
        assert_eq!(SecurityUserRoleMapping::table().key_column, "target_key");
    }

    #[test]
    fn membership_key_is_target() {
        let target = Key::new();
        let m = Membership::to(target).with_source(Key::new());
        let row = ConceptSetMemberMapping::to_row(target, &m).unwrap();
        assert_eq!(row.row_key().unwrap(), Some(target));
        assert_eq!(ConceptSetMemberMapping::from_row(&row).unwrap(), m);
    }
}
