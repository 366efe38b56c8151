use serde::{Deserialize, Serialize};

use crate::ids::{Key, VersionKey};
use crate::time::Timestamp;

/// Anything persisted under a globally unique key.
pub trait Identified {
    fn key(&self) -> Option<Key>;
    fn set_key(&mut self, key: Key);
}

/// Records that are obsoleted rather than deleted.
pub trait SoftDeletable: Identified {
    fn meta(&self) -> &RecordMeta;
    fn meta_mut(&mut self) -> &mut RecordMeta;
}

/// Records whose every update mints a new version in a chain.
pub trait Versioned: SoftDeletable {
    fn version(&self) -> &VersionInfo;
    fn version_mut(&mut self) -> &mut VersionInfo;
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordMeta {
    pub created_by: Option<Key>,
    pub creation_time: Option<Timestamp>,
    pub obsoleted_by: Option<Key>,
    pub obsoletion_time: Option<Timestamp>,
    /// Suppressed from default queries without being obsolete.
    pub hidden: bool,
}

impl RecordMeta {
    pub fn is_obsolete(&self) -> bool {
        self.obsoletion_time.is_some()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionInfo {
    pub version_key: Option<VersionKey>,
    pub version_sequence: Option<i64>,
    pub previous_version_key: Option<VersionKey>,
    /// The version that was current before the last update or obsolete on
    /// this instance. Never persisted with the record.
    #[serde(skip)]
    pub superseded: Option<VersionSnapshot>,
}

/// Identifying metadata of one link in a version chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionSnapshot {
    pub version_key: VersionKey,
    pub version_sequence: i64,
    pub previous_version_key: Option<VersionKey>,
    pub created_by: Option<Key>,
    pub creation_time: Option<Timestamp>,
}

/// Implements the capability traits for a struct with `key`, `meta` and
/// (optionally) `version` fields.
#[macro_export]
macro_rules! impl_record {
    (identified $ty:ty) => {
        impl $crate::model::Identified for $ty {
            fn key(&self) -> Option<$crate::ids::Key> {
                $crate::ids::Key::present(self.key)
            }

            fn set_key(&mut self, key: $crate::ids::Key) {
                self.key = Some(key);
            }
        }
    };
    (soft_deletable $ty:ty) => {
        $crate::impl_record!(identified $ty);

        impl $crate::model::SoftDeletable for $ty {
            fn meta(&self) -> &$crate::model::RecordMeta {
                &self.meta
            }

            fn meta_mut(&mut self) -> &mut $crate::model::RecordMeta {
                &mut self.meta
            }
        }
    };
    (versioned $ty:ty) => {
        $crate::impl_record!(soft_deletable $ty);

        impl $crate::model::Versioned for $ty {
            fn version(&self) -> &$crate::model::VersionInfo {
                &self.version
            }

            fn version_mut(&mut self) -> &mut $crate::model::VersionInfo {
                &mut self.version
            }
        }
    };
}
