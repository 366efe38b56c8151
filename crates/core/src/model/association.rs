use serde::{Deserialize, Serialize};

use super::entity::Entity;
use super::meta::Identified;
use crate::ids::Key;
use crate::impl_record;
use crate::time::Timestamp;
use crate::value::Value;

/// A child record tying a parent (`source_key`) to a value or target.
pub trait Association: Identified + Clone {
    fn source_key(&self) -> Option<Key>;
    fn set_source_key(&mut self, key: Key);

    /// Empty associations carry no payload and are never persisted.
    fn is_empty(&self) -> bool;

    /// Whether `self` differs from the persisted `stored` in any mapped value.
    fn value_changed(&self, stored: &Self) -> bool;

    /// Identity rule for desired items that arrive without a key.
    fn identity_matches(&self, _stored: &Self) -> bool {
        false
    }
}

/// Relationship identity: same relationship type pointing at the same target.
///
/// Both entity and act relationships use this rule so that a relationship
/// re-sent without its key is matched rather than duplicated.
pub fn same_relationship(
    type_a: Option<Key>,
    target_a: Option<Key>,
    type_b: Option<Key>,
    target_b: Option<Key>,
) -> bool {
    match (type_a, target_a, type_b, target_b) {
        (Some(ta), Some(xa), Some(tb), Some(xb)) => ta == tb && xa == xb,
        _ => false,
    }
}

fn blank(value: &Option<String>) -> bool {
    value.as_deref().is_none_or(|v| v.trim().is_empty())
}

macro_rules! sourced {
    ($ty:ty) => {
        impl_record!(identified $ty);

        impl $ty {
            pub fn with_source(mut self, source: Key) -> Self {
                self.source_key = Some(source);
                self
            }
        }
    };
}

macro_rules! association_basics {
    () => {
        fn source_key(&self) -> Option<Key> {
            Key::present(self.source_key)
        }

        fn set_source_key(&mut self, key: Key) {
            self.source_key = Some(key);
        }
    };
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Identifier {
    pub key: Option<Key>,
    pub source_key: Option<Key>,
    pub authority: Option<String>,
    pub value: Option<String>,
    pub issue_time: Option<Timestamp>,
}
sourced!(Identifier);

impl Identifier {
    pub fn new(authority: &str, value: &str) -> Self {
        Self {
            authority: Some(authority.to_string()),
            value: Some(value.to_string()),
            ..Default::default()
        }
    }
}

impl Association for Identifier {
    association_basics!();

    fn is_empty(&self) -> bool {
        blank(&self.value)
    }

    fn value_changed(&self, stored: &Self) -> bool {
        self.authority != stored.authority
            || self.value != stored.value
            || self.issue_time != stored.issue_time
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NameComponent {
    pub key: Option<Key>,
    pub source_key: Option<Key>,
    pub component_type_key: Option<Key>,
    pub value: Option<String>,
    pub sequence: i64,
}
sourced!(NameComponent);

impl Association for NameComponent {
    association_basics!();

    fn is_empty(&self) -> bool {
        blank(&self.value)
    }

    fn value_changed(&self, stored: &Self) -> bool {
        self.component_type_key != stored.component_type_key
            || self.value != stored.value
            || self.sequence != stored.sequence
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EntityName {
    pub key: Option<Key>,
    pub source_key: Option<Key>,
    pub use_concept_key: Option<Key>,
    pub components: Vec<NameComponent>,
}
sourced!(EntityName);

impl EntityName {
    /// A name built from plain component values, in order.
    pub fn from_parts(use_concept_key: Option<Key>, parts: &[&str]) -> Self {
        let components = parts
            .iter()
            .enumerate()
            .map(|(i, p)| NameComponent {
                value: Some((*p).to_string()),
                sequence: i as i64,
                ..Default::default()
            })
            .collect();
        Self {
            use_concept_key,
            components,
            ..Default::default()
        }
    }
}

impl Association for EntityName {
    association_basics!();

    fn is_empty(&self) -> bool {
        self.components.iter().all(Association::is_empty)
    }

    // Components are reconciled on their own.
    fn value_changed(&self, stored: &Self) -> bool {
        self.use_concept_key != stored.use_concept_key
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AddressComponent {
    pub key: Option<Key>,
    pub source_key: Option<Key>,
    pub component_type_key: Option<Key>,
    pub value: Option<String>,
    pub sequence: i64,
}
sourced!(AddressComponent);

impl Association for AddressComponent {
    association_basics!();

    fn is_empty(&self) -> bool {
        blank(&self.value)
    }

    fn value_changed(&self, stored: &Self) -> bool {
        self.component_type_key != stored.component_type_key
            || self.value != stored.value
            || self.sequence != stored.sequence
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EntityAddress {
    pub key: Option<Key>,
    pub source_key: Option<Key>,
    pub use_concept_key: Option<Key>,
    pub components: Vec<AddressComponent>,
}
sourced!(EntityAddress);

impl Association for EntityAddress {
    association_basics!();

    fn is_empty(&self) -> bool {
        self.components.iter().all(Association::is_empty)
    }

    fn value_changed(&self, stored: &Self) -> bool {
        self.use_concept_key != stored.use_concept_key
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TelecomAddress {
    pub key: Option<Key>,
    pub source_key: Option<Key>,
    pub use_concept_key: Option<Key>,
    pub value: Option<String>,
}
sourced!(TelecomAddress);

impl Association for TelecomAddress {
    association_basics!();

    fn is_empty(&self) -> bool {
        blank(&self.value)
    }

    fn value_changed(&self, stored: &Self) -> bool {
        self.use_concept_key != stored.use_concept_key || self.value != stored.value
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Tag {
    pub key: Option<Key>,
    pub source_key: Option<Key>,
    pub tag_key: Option<String>,
    pub value: Option<String>,
}
sourced!(Tag);

impl Tag {
    pub fn new(tag_key: &str, value: &str) -> Self {
        Self {
            tag_key: Some(tag_key.to_string()),
            value: Some(value.to_string()),
            ..Default::default()
        }
    }
}

impl Association for Tag {
    association_basics!();

    fn is_empty(&self) -> bool {
        blank(&self.tag_key) || blank(&self.value)
    }

    fn value_changed(&self, stored: &Self) -> bool {
        self.tag_key != stored.tag_key || self.value != stored.value
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Extension {
    pub key: Option<Key>,
    pub source_key: Option<Key>,
    pub extension_type: Option<String>,
    pub value: Option<Value>,
}
sourced!(Extension);

impl Association for Extension {
    association_basics!();

    fn is_empty(&self) -> bool {
        self.value.as_ref().is_none_or(Value::is_null)
    }

    fn value_changed(&self, stored: &Self) -> bool {
        self.extension_type != stored.extension_type || self.value != stored.value
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Note {
    pub key: Option<Key>,
    pub source_key: Option<Key>,
    pub author_key: Option<Key>,
    pub text: Option<String>,
}
sourced!(Note);

impl Association for Note {
    association_basics!();

    fn is_empty(&self) -> bool {
        blank(&self.text)
    }

    fn value_changed(&self, stored: &Self) -> bool {
        self.author_key != stored.author_key || self.text != stored.text
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EntityRelationship {
    pub key: Option<Key>,
    pub source_key: Option<Key>,
    pub relationship_type_key: Option<Key>,
    pub target_key: Option<Key>,
    pub quantity: Option<i64>,
    /// Inline target saved on demand before the relationship is written.
    #[serde(skip)]
    pub target_entity: Option<Box<Entity>>,
}
sourced!(EntityRelationship);

impl EntityRelationship {
    pub fn new(relationship_type_key: Key, target_key: Key) -> Self {
        Self {
            relationship_type_key: Some(relationship_type_key),
            target_key: Some(target_key),
            ..Default::default()
        }
    }
}

impl Association for EntityRelationship {
    association_basics!();

    fn is_empty(&self) -> bool {
        Key::present(self.target_key).is_none() && self.target_entity.is_none()
    }

    fn value_changed(&self, stored: &Self) -> bool {
        self.relationship_type_key != stored.relationship_type_key
            || self.target_key != stored.target_key
            || self.quantity != stored.quantity
    }

    fn identity_matches(&self, stored: &Self) -> bool {
        same_relationship(
            self.relationship_type_key,
            self.target_key,
            stored.relationship_type_key,
            stored.target_key,
        )
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlaceService {
    pub key: Option<Key>,
    pub source_key: Option<Key>,
    pub service_concept_key: Option<Key>,
    pub schedule: Option<String>,
}
sourced!(PlaceService);

impl Association for PlaceService {
    association_basics!();

    fn is_empty(&self) -> bool {
        Key::present(self.service_concept_key).is_none()
    }

    fn value_changed(&self, stored: &Self) -> bool {
        self.service_concept_key != stored.service_concept_key || self.schedule != stored.schedule
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ActRelationship {
    pub key: Option<Key>,
    pub source_key: Option<Key>,
    pub relationship_type_key: Option<Key>,
    pub target_key: Option<Key>,
}
sourced!(ActRelationship);

impl Association for ActRelationship {
    association_basics!();

    fn is_empty(&self) -> bool {
        Key::present(self.target_key).is_none()
    }

    fn value_changed(&self, stored: &Self) -> bool {
        self.relationship_type_key != stored.relationship_type_key
            || self.target_key != stored.target_key
    }

    fn identity_matches(&self, stored: &Self) -> bool {
        same_relationship(
            self.relationship_type_key,
            self.target_key,
            stored.relationship_type_key,
            stored.target_key,
        )
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ActParticipation {
    pub key: Option<Key>,
    pub source_key: Option<Key>,
    pub role_key: Option<Key>,
    pub player_key: Option<Key>,
    pub quantity: Option<i64>,
    #[serde(skip)]
    pub player_entity: Option<Box<Entity>>,
}
sourced!(ActParticipation);

impl ActParticipation {
    pub fn new(role_key: Key, player_key: Key) -> Self {
        Self {
            role_key: Some(role_key),
            player_key: Some(player_key),
            ..Default::default()
        }
    }
}

impl Association for ActParticipation {
    association_basics!();

    fn is_empty(&self) -> bool {
        Key::present(self.player_key).is_none() && self.player_entity.is_none()
    }

    fn value_changed(&self, stored: &Self) -> bool {
        self.role_key != stored.role_key
            || self.player_key != stored.player_key
            || self.quantity != stored.quantity
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConceptName {
    pub key: Option<Key>,
    pub source_key: Option<Key>,
    pub language: Option<String>,
    pub name: Option<String>,
}
sourced!(ConceptName);

impl ConceptName {
    pub fn new(language: &str, name: &str) -> Self {
        Self {
            language: Some(language.to_string()),
            name: Some(name.to_string()),
            ..Default::default()
        }
    }
}

impl Association for ConceptName {
    association_basics!();

    fn is_empty(&self) -> bool {
        blank(&self.name)
    }

    fn value_changed(&self, stored: &Self) -> bool {
        self.language != stored.language || self.name != stored.name
    }
}

/// Link-table membership; the target doubles as the association key.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Membership {
    pub source_key: Option<Key>,
    pub target_key: Option<Key>,
}

impl Membership {
    pub fn to(target_key: Key) -> Self {
        Self {
            source_key: None,
            target_key: Some(target_key),
        }
    }

    pub fn with_source(mut self, source: Key) -> Self {
        self.source_key = Some(source);
        self
    }
}

impl Identified for Membership {
    fn key(&self) -> Option<Key> {
        Key::present(self.target_key)
    }

    fn set_key(&mut self, key: Key) {
        self.target_key = Some(key);
    }
}

impl Association for Membership {
    association_basics!();

    fn is_empty(&self) -> bool {
        Key::present(self.target_key).is_none()
    }

    fn value_changed(&self, _stored: &Self) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::concepts::relationship;

    #[test]
    fn relationship_identity_needs_type_and_target() {
        let target = Key::new();
        let a = EntityRelationship::new(relationship::MOTHER, target);
        let mut b = EntityRelationship::new(relationship::MOTHER, target);
        b.key = Some(Key::new());
        assert!(a.identity_matches(&b));

        let c = EntityRelationship::new(relationship::FATHER, target);
        assert!(!a.identity_matches(&c));

        let untyped = EntityRelationship {
            target_key: Some(target),
            ..Default::default()
        };
        assert!(!untyped.identity_matches(&untyped.clone()));
    }

    #[test]
    fn emptiness() {
        assert!(Identifier::default().is_empty());
        assert!(Identifier::new("NHS", " ").is_empty());
        assert!(!Identifier::new("NHS", "123").is_empty());
        assert!(EntityName::from_parts(None, &["", " "]).is_empty());
        assert!(Extension {
            value: Some(Value::Null),
            ..Default::default()
        }
        .is_empty());
        assert!(Membership::to(Key::nil()).is_empty());
    }
}
