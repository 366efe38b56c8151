use serde::{Deserialize, Serialize};

use super::association::Membership;
use super::meta::RecordMeta;
use crate::ids::Key;
use crate::impl_record;
use crate::time::Timestamp;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecurityRole {
    pub key: Option<Key>,
    pub meta: RecordMeta,
    pub name: Option<String>,
    pub description: Option<String>,
}
impl_record!(soft_deletable SecurityRole);

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecurityUser {
    pub key: Option<Key>,
    pub meta: RecordMeta,
    pub user_name: Option<String>,
    pub email: Option<String>,
    pub phone_number: Option<String>,
    pub lockout_time: Option<Timestamp>,
    /// Role memberships, keyed by role.
    pub roles: Vec<Membership>,
}
impl_record!(soft_deletable SecurityUser);

impl SecurityUser {
    pub fn named(user_name: &str) -> Self {
        Self {
            user_name: Some(user_name.to_string()),
            ..Default::default()
        }
    }
}
