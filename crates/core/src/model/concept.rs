use serde::{Deserialize, Serialize};

use super::association::{ConceptName, Membership};
use super::meta::{RecordMeta, VersionInfo};
use crate::ids::Key;
use crate::impl_record;

/// A coded vocabulary term.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Concept {
    pub key: Option<Key>,
    pub version: VersionInfo,
    pub meta: RecordMeta,
    pub mnemonic: Option<String>,
    pub class_concept_key: Option<Key>,
    pub status_concept_key: Option<Key>,
    pub names: Vec<ConceptName>,
}
impl_record!(versioned Concept);

impl Concept {
    pub fn new(mnemonic: &str) -> Self {
        Self {
            mnemonic: Some(mnemonic.to_string()),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConceptSet {
    pub key: Option<Key>,
    pub meta: RecordMeta,
    pub mnemonic: Option<String>,
    pub name: Option<String>,
    pub url: Option<String>,
    pub members: Vec<Membership>,
}
impl_record!(soft_deletable ConceptSet);
