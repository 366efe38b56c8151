use hearth_core::Key;
use hearth_core::model::{
    Act, ObservationDetail, ObservationValue, PatientEncounterDetail, SubstanceAdministrationDetail,
};

use super::{put_meta, put_version_info, read_meta, read_version_info};
use crate::error::StorageError;
use crate::mapping::{RowMapping, TableMap, TableRow};
use crate::tables;

pub struct ActMapping;

impl RowMapping for ActMapping {
    type Model = Act;

    fn table() -> &'static TableMap {
        &tables::ACT
    }

    fn to_row(key: Key, a: &Act) -> Result<TableRow, StorageError> {
        let mut row = TableRow::new(Self::table());
        row.put_key("uuid", Some(key));
        put_version_info(&mut row, &a.version);
        put_meta(&mut row, &a.meta);
        row.put_key("class_concept_key", a.class_concept_key);
        row.put_key("mood_concept_key", a.mood_concept_key);
        row.put_key("status_concept_key", a.status_concept_key);
        row.put_key("type_concept_key", a.type_concept_key);
        row.put_time("act_time", a.act_time);
        row.put_time("start_time", a.start_time);
        row.put_time("stop_time", a.stop_time);
        row.put_bool("is_negated", a.is_negated);
        Ok(row)
    }

    fn from_row(row: &TableRow) -> Result<Act, StorageError> {
        Ok(Act {
            key: row.key("uuid")?,
            version: read_version_info(row)?,
            meta: read_meta(row)?,
            class_concept_key: row.key("class_concept_key")?,
            mood_concept_key: row.key("mood_concept_key")?,
            status_concept_key: row.key("status_concept_key")?,
            type_concept_key: row.key("type_concept_key")?,
            act_time: row.time("act_time"),
            start_time: row.time("start_time"),
            stop_time: row.time("stop_time"),
            is_negated: row.bool("is_negated"),
            ..Default::default()
        })
    }
}

/// Observation columns plus the value type tag. The value itself lives in
/// one of the value tables.
pub struct ObservationMapping;

impl RowMapping for ObservationMapping {
    type Model = ObservationDetail;

    fn table() -> &'static TableMap {
        &tables::OBSERVATION
    }

    fn to_row(key: Key, o: &ObservationDetail) -> Result<TableRow, StorageError> {
        let mut row = TableRow::new(Self::table());
        row.put_key("uuid", Some(key));
        row.put_key("interpretation_concept_key", o.interpretation_concept_key);
        row.put_text("value_type", o.value.tag());
        Ok(row)
    }

    fn from_row(row: &TableRow) -> Result<ObservationDetail, StorageError> {
        Ok(ObservationDetail {
            interpretation_concept_key: row.key("interpretation_concept_key")?,
            value: ObservationValue::None,
        })
    }
}

fn wrong_variant(table: &TableMap, value: &ObservationValue) -> StorageError {
    StorageError::Serialization(format!(
        "{} cannot hold observation value {:?}",
        table.name,
        value.tag()
    ))
}

pub struct QuantityObservationMapping;

impl RowMapping for QuantityObservationMapping {
    type Model = ObservationValue;

    fn table() -> &'static TableMap {
        &tables::QUANTITY_OBSERVATION
    }

    fn to_row(key: Key, value: &ObservationValue) -> Result<TableRow, StorageError> {
        let ObservationValue::Quantity {
            value: quantity,
            unit_concept_key,
        } = value
        else {
            return Err(wrong_variant(Self::table(), value));
        };
        let mut row = TableRow::new(Self::table());
        row.put_key("uuid", Some(key));
        row.put_real("value", Some(*quantity));
        row.put_key("unit_concept_key", *unit_concept_key);
        Ok(row)
    }

    fn from_row(row: &TableRow) -> Result<ObservationValue, StorageError> {
        Ok(ObservationValue::Quantity {
            value: row.real("value").unwrap_or_default(),
            unit_concept_key: row.key("unit_concept_key")?,
        })
    }
}

pub struct TextObservationMapping;

impl RowMapping for TextObservationMapping {
    type Model = ObservationValue;

    fn table() -> &'static TableMap {
        &tables::TEXT_OBSERVATION
    }

    fn to_row(key: Key, value: &ObservationValue) -> Result<TableRow, StorageError> {
        let ObservationValue::Text(text) = value else {
            return Err(wrong_variant(Self::table(), value));
        };
        let mut row = TableRow::new(Self::table());
        row.put_key("uuid", Some(key));
        row.put_text("value", Some(text));
        Ok(row)
    }

    fn from_row(row: &TableRow) -> Result<ObservationValue, StorageError> {
        Ok(ObservationValue::Text(row.text("value").unwrap_or_default()))
    }
}

pub struct CodedObservationMapping;

impl RowMapping for CodedObservationMapping {
    type Model = ObservationValue;

    fn table() -> &'static TableMap {
        &tables::CODED_OBSERVATION
    }

    fn to_row(key: Key, value: &ObservationValue) -> Result<TableRow, StorageError> {
        let ObservationValue::Coded(code) = value else {
            return Err(wrong_variant(Self::table(), value));
        };
        let mut row = TableRow::new(Self::table());
        row.put_key("uuid", Some(key));
        row.put_key("value", *code);
        Ok(row)
    }

    fn from_row(row: &TableRow) -> Result<ObservationValue, StorageError> {
        Ok(ObservationValue::Coded(row.key("value")?))
    }
}

pub struct SubstanceAdministrationMapping;

impl RowMapping for SubstanceAdministrationMapping {
    type Model = SubstanceAdministrationDetail;

    fn table() -> &'static TableMap {
        &tables::SUBSTANCE_ADMINISTRATION
    }

    fn to_row(key: Key, s: &SubstanceAdministrationDetail) -> Result<TableRow, StorageError> {
        let mut row = TableRow::new(Self::table());
        row.put_key("uuid", Some(key));
        row.put_key("route_concept_key", s.route_concept_key);
        row.put_real("dose_quantity", s.dose_quantity);
        row.put_key("dose_unit_concept_key", s.dose_unit_concept_key);
        row.put_int("sequence_id", s.sequence_id);
        Ok(row)
    }

    fn from_row(row: &TableRow) -> Result<SubstanceAdministrationDetail, StorageError> {
        Ok(SubstanceAdministrationDetail {
            route_concept_key: row.key("route_concept_key")?,
            dose_quantity: row.real("dose_quantity"),
            dose_unit_concept_key: row.key("dose_unit_concept_key")?,
            sequence_id: row.int("sequence_id"),
        })
    }
}

pub struct PatientEncounterMapping;

impl RowMapping for PatientEncounterMapping {
    type Model = PatientEncounterDetail;

    fn table() -> &'static TableMap {
        &tables::PATIENT_ENCOUNTER
    }

    fn to_row(key: Key, p: &PatientEncounterDetail) -> Result<TableRow, StorageError> {
        let mut row = TableRow::new(Self::table());
        row.put_key("uuid", Some(key));
        row.put_key("discharge_disposition_key", p.discharge_disposition_key);
        Ok(row)
    }

    fn from_row(row: &TableRow) -> Result<PatientEncounterDetail, StorageError> {
        Ok(PatientEncounterDetail {
            discharge_disposition_key: row.key("discharge_disposition_key")?,
        })
    }
}

/// Control acts carry no columns of their own beyond the shared key.
pub struct ControlActMapping;

impl RowMapping for ControlActMapping {
    type Model = ();

    fn table() -> &'static TableMap {
        &tables::CONTROL_ACT
    }

    fn to_row(key: Key, _: &()) -> Result<TableRow, StorageError> {
        let mut row = TableRow::new(Self::table());
        row.put_key("uuid", Some(key));
        Ok(row)
    }

    fn from_row(_: &TableRow) -> Result<(), StorageError> {
        Ok(())
    }
}
