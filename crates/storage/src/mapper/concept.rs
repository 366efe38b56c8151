use hearth_core::Key;
use hearth_core::model::{Concept, ConceptSet};

use super::{put_meta, put_version_info, read_meta, read_version_info};
use crate::error::StorageError;
use crate::mapping::{RowMapping, TableMap, TableRow};
use crate::tables;

pub struct ConceptMapping;

impl RowMapping for ConceptMapping {
    type Model = Concept;

    fn table() -> &'static TableMap {
        &tables::CONCEPT
    }

    fn to_row(key: Key, c: &Concept) -> Result<TableRow, StorageError> {
        let mut row = TableRow::new(Self::table());
        row.put_key("uuid", Some(key));
        put_version_info(&mut row, &c.version);
        put_meta(&mut row, &c.meta);
        row.put_text("mnemonic", c.mnemonic.as_deref());
        row.put_key("class_concept_key", c.class_concept_key);
        row.put_key("status_concept_key", c.status_concept_key);
        Ok(row)
    }

    fn from_row(row: &TableRow) -> Result<Concept, StorageError> {
        Ok(Concept {
            key: row.key("uuid")?,
            version: read_version_info(row)?,
            meta: read_meta(row)?,
            mnemonic: row.text("mnemonic"),
            class_concept_key: row.key("class_concept_key")?,
            status_concept_key: row.key("status_concept_key")?,
            names: Vec::new(),
        })
    }
}

pub struct ConceptSetMapping;

impl RowMapping for ConceptSetMapping {
    type Model = ConceptSet;

    fn table() -> &'static TableMap {
        &tables::CONCEPT_SET
    }

    fn to_row(key: Key, s: &ConceptSet) -> Result<TableRow, StorageError> {
        let mut row = TableRow::new(Self::table());
        row.put_key("uuid", Some(key));
        put_meta(&mut row, &s.meta);
        row.put_text("mnemonic", s.mnemonic.as_deref());
        row.put_text("name", s.name.as_deref());
        row.put_text("url", s.url.as_deref());
        Ok(row)
    }

    fn from_row(row: &TableRow) -> Result<ConceptSet, StorageError> {
        Ok(ConceptSet {
            key: row.key("uuid")?,
            meta: read_meta(row)?,
            mnemonic: row.text("mnemonic"),
            name: row.text("name"),
            url: row.text("url"),
            members: Vec::new(),
        })
    }
}
