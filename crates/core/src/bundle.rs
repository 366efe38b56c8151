use serde::{Deserialize, Serialize};

use crate::ids::Key;
use crate::model::{Act, Concept, ConceptSet, Entity, Identified, SecurityRole, SecurityUser};

/// Runtime type tag used to resolve a persister for a bundle item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ModelType {
    Entity,
    Act,
    Concept,
    ConceptSet,
    SecurityUser,
    SecurityRole,
}

impl ModelType {
    pub fn name(&self) -> &'static str {
        match self {
            ModelType::Entity => "Entity",
            ModelType::Act => "Act",
            ModelType::Concept => "Concept",
            ModelType::ConceptSet => "ConceptSet",
            ModelType::SecurityUser => "SecurityUser",
            ModelType::SecurityRole => "SecurityRole",
        }
    }
}

/// One record carried in a bundle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum BundleItem {
    Entity(Entity),
    Act(Act),
    Concept(Concept),
    ConceptSet(ConceptSet),
    SecurityUser(SecurityUser),
    SecurityRole(SecurityRole),
}

impl BundleItem {
    pub fn model_type(&self) -> ModelType {
        match self {
            BundleItem::Entity(_) => ModelType::Entity,
            BundleItem::Act(_) => ModelType::Act,
            BundleItem::Concept(_) => ModelType::Concept,
            BundleItem::ConceptSet(_) => ModelType::ConceptSet,
            BundleItem::SecurityUser(_) => ModelType::SecurityUser,
            BundleItem::SecurityRole(_) => ModelType::SecurityRole,
        }
    }

    pub fn key(&self) -> Option<Key> {
        match self {
            BundleItem::Entity(m) => m.key(),
            BundleItem::Act(m) => m.key(),
            BundleItem::Concept(m) => m.key(),
            BundleItem::ConceptSet(m) => m.key(),
            BundleItem::SecurityUser(m) => m.key(),
            BundleItem::SecurityRole(m) => m.key(),
        }
    }
}

/// Models that can travel in a bundle.
pub trait BundleModel: Sized {
    const MODEL_TYPE: ModelType;

    fn into_item(self) -> BundleItem;
    fn from_item(item: BundleItem) -> Result<Self, BundleItem>;
}

macro_rules! bundle_model {
    ($ty:ident) => {
        impl BundleModel for $ty {
            const MODEL_TYPE: ModelType = ModelType::$ty;

            fn into_item(self) -> BundleItem {
                BundleItem::$ty(self)
            }

            fn from_item(item: BundleItem) -> Result<Self, BundleItem> {
                match item {
                    BundleItem::$ty(m) => Ok(m),
                    other => Err(other),
                }
            }
        }

        impl From<$ty> for BundleItem {
            fn from(model: $ty) -> Self {
                model.into_item()
            }
        }
    };
}

bundle_model!(Entity);
bundle_model!(Act);
bundle_model!(Concept);
bundle_model!(ConceptSet);
bundle_model!(SecurityUser);
bundle_model!(SecurityRole);

/// An ordered, heterogeneous set of records written as one transaction.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Bundle {
    pub items: Vec<BundleItem>,
}

impl Bundle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, item: impl Into<BundleItem>) {
        self.items.push(item.into());
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

impl FromIterator<BundleItem> for Bundle {
    fn from_iter<I: IntoIterator<Item = BundleItem>>(iter: I) -> Self {
        Self {
            items: iter.into_iter().collect(),
        }
    }
}
