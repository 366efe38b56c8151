use hearth_core::Key;
use hearth_core::model::{SecurityRole, SecurityUser};

use super::{put_meta, read_meta};
use crate::error::StorageError;
use crate::mapping::{RowMapping, TableMap, TableRow};
use crate::tables;

pub struct SecurityRoleMapping;

impl RowMapping for SecurityRoleMapping {
    type Model = SecurityRole;

    fn table() -> &'static TableMap {
        &tables::SECURITY_ROLE
    }

    fn to_row(key: Key, r: &SecurityRole) -> Result<TableRow, StorageError> {
        let mut row = TableRow::new(Self::table());
        row.put_key("uuid", Some(key));
        put_meta(&mut row, &r.meta);
        row.put_text("name", r.name.as_deref());
        row.put_text("description", r.description.as_deref());
        Ok(row)
    }

    fn from_row(row: &TableRow) -> Result<SecurityRole, StorageError> {
        Ok(SecurityRole {
            key: row.key("uuid")?,
            meta: read_meta(row)?,
            name: row.text("name"),
            description: row.text("description"),
        })
    }
}

pub struct SecurityUserMapping;

impl RowMapping for SecurityUserMapping {
    type Model = SecurityUser;

    fn table() -> &'static TableMap {
        &tables::SECURITY_USER
    }

    fn to_row(key: Key, u: &SecurityUser) -> Result<TableRow, StorageError> {
        let mut row = TableRow::new(Self::table());
        row.put_key("uuid", Some(key));
        put_meta(&mut row, &u.meta);
        row.put_text("user_name", u.user_name.as_deref());
        row.put_text("email", u.email.as_deref());
        row.put_text("phone_number", u.phone_number.as_deref());
        row.put_time("lockout_time", u.lockout_time);
        Ok(row)
    }

    fn from_row(row: &TableRow) -> Result<SecurityUser, StorageError> {
        Ok(SecurityUser {
            key: row.key("uuid")?,
            meta: read_meta(row)?,
            user_name: row.text("user_name"),
            email: row.text("email"),
            phone_number: row.text("phone_number"),
            lockout_time: row.time("lockout_time"),
            roles: Vec::new(),
        })
    }
}
