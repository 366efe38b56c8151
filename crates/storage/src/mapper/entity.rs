use hearth_core::Key;
use hearth_core::model::{
    ApplicationDetail, DatePrecision, DeviceDetail, Entity, ManufacturedMaterialDetail,
    MaterialDetail, OrganizationDetail, PatientDetail, PersonDetail, PlaceDetail, ProviderDetail,
    UserEntityDetail,
};

use super::{put_meta, put_version_info, read_meta, read_version_info};
use crate::error::StorageError;
use crate::mapping::{RowMapping, TableMap, TableRow};
use crate::tables;

/// Root entity columns. Collections and subtype detail load separately.
pub struct EntityMapping;

impl RowMapping for EntityMapping {
    type Model = Entity;

    fn table() -> &'static TableMap {
        &tables::ENTITY
    }

    fn to_row(key: Key, e: &Entity) -> Result<TableRow, StorageError> {
        let mut row = TableRow::new(Self::table());
        row.put_key("uuid", Some(key));
        put_version_info(&mut row, &e.version);
        put_meta(&mut row, &e.meta);
        row.put_key("class_concept_key", e.class_concept_key);
        row.put_key("determiner_concept_key", e.determiner_concept_key);
        row.put_key("status_concept_key", e.status_concept_key);
        row.put_key("type_concept_key", e.type_concept_key);
        Ok(row)
    }

    fn from_row(row: &TableRow) -> Result<Entity, StorageError> {
        Ok(Entity {
            key: row.key("uuid")?,
            version: read_version_info(row)?,
            meta: read_meta(row)?,
            class_concept_key: row.key("class_concept_key")?,
            determiner_concept_key: row.key("determiner_concept_key")?,
            status_concept_key: row.key("status_concept_key")?,
            type_concept_key: row.key("type_concept_key")?,
            ..Default::default()
        })
    }
}

pub struct PersonMapping;

impl RowMapping for PersonMapping {
    type Model = PersonDetail;

    fn table() -> &'static TableMap {
        &tables::PERSON
    }

    fn to_row(key: Key, p: &PersonDetail) -> Result<TableRow, StorageError> {
        let mut row = TableRow::new(Self::table());
        row.put_key("uuid", Some(key));
        row.put_time("date_of_birth", p.date_of_birth);
        row.put_text(
            "date_of_birth_precision",
            p.date_of_birth_precision.as_ref().map(DatePrecision::as_str),
        );
        row.put_text("language", p.language.as_deref());
        Ok(row)
    }

    fn from_row(row: &TableRow) -> Result<PersonDetail, StorageError> {
        Ok(PersonDetail {
            date_of_birth: row.time("date_of_birth"),
            date_of_birth_precision: row
                .text("date_of_birth_precision")
                .as_deref()
                .and_then(DatePrecision::parse),
            language: row.text("language"),
        })
    }
}

/// Patient columns only; the person part comes from `PersonMapping`.
pub struct PatientMapping;

impl RowMapping for PatientMapping {
    type Model = PatientDetail;

    fn table() -> &'static TableMap {
        &tables::PATIENT
    }

    fn to_row(key: Key, p: &PatientDetail) -> Result<TableRow, StorageError> {
        let mut row = TableRow::new(Self::table());
        row.put_key("uuid", Some(key));
        row.put_key("gender_concept_key", p.gender_concept_key);
        row.put_time("deceased_time", p.deceased_time);
        row.put_int("multiple_birth_order", p.multiple_birth_order);
        Ok(row)
    }

    fn from_row(row: &TableRow) -> Result<PatientDetail, StorageError> {
        Ok(PatientDetail {
            gender_concept_key: row.key("gender_concept_key")?,
            deceased_time: row.time("deceased_time"),
            multiple_birth_order: row.int("multiple_birth_order"),
            ..Default::default()
        })
    }
}

pub struct ProviderMapping;

impl RowMapping for ProviderMapping {
    type Model = ProviderDetail;

    fn table() -> &'static TableMap {
        &tables::PROVIDER
    }

    fn to_row(key: Key, p: &ProviderDetail) -> Result<TableRow, StorageError> {
        let mut row = TableRow::new(Self::table());
        row.put_key("uuid", Some(key));
        row.put_key("specialty_concept_key", p.specialty_concept_key);
        Ok(row)
    }

    fn from_row(row: &TableRow) -> Result<ProviderDetail, StorageError> {
        Ok(ProviderDetail {
            specialty_concept_key: row.key("specialty_concept_key")?,
            ..Default::default()
        })
    }
}

pub struct UserEntityMapping;

impl RowMapping for UserEntityMapping {
    type Model = UserEntityDetail;

    fn table() -> &'static TableMap {
        &tables::USER_ENTITY
    }

    fn to_row(key: Key, u: &UserEntityDetail) -> Result<TableRow, StorageError> {
        let mut row = TableRow::new(Self::table());
        row.put_key("uuid", Some(key));
        row.put_key("security_user_key", u.security_user_key);
        Ok(row)
    }

    fn from_row(row: &TableRow) -> Result<UserEntityDetail, StorageError> {
        Ok(UserEntityDetail {
            security_user_key: row.key("security_user_key")?,
            ..Default::default()
        })
    }
}

pub struct PlaceMapping;

impl RowMapping for PlaceMapping {
    type Model = PlaceDetail;

    fn table() -> &'static TableMap {
        &tables::PLACE
    }

    fn to_row(key: Key, p: &PlaceDetail) -> Result<TableRow, StorageError> {
        let mut row = TableRow::new(Self::table());
        row.put_key("uuid", Some(key));
        row.put_bool("is_mobile", p.is_mobile);
        row.put_real("latitude", p.latitude);
        row.put_real("longitude", p.longitude);
        Ok(row)
    }

    fn from_row(row: &TableRow) -> Result<PlaceDetail, StorageError> {
        Ok(PlaceDetail {
            is_mobile: row.bool("is_mobile"),
            latitude: row.real("latitude"),
            longitude: row.real("longitude"),
            services: Vec::new(),
        })
    }
}

pub struct OrganizationMapping;

impl RowMapping for OrganizationMapping {
    type Model = OrganizationDetail;

    fn table() -> &'static TableMap {
        &tables::ORGANIZATION
    }

    fn to_row(key: Key, o: &OrganizationDetail) -> Result<TableRow, StorageError> {
        let mut row = TableRow::new(Self::table());
        row.put_key("uuid", Some(key));
        row.put_key("industry_concept_key", o.industry_concept_key);
        Ok(row)
    }

    fn from_row(row: &TableRow) -> Result<OrganizationDetail, StorageError> {
        Ok(OrganizationDetail {
            industry_concept_key: row.key("industry_concept_key")?,
        })
    }
}

pub struct MaterialMapping;

impl RowMapping for MaterialMapping {
    type Model = MaterialDetail;

    fn table() -> &'static TableMap {
        &tables::MATERIAL
    }

    fn to_row(key: Key, m: &MaterialDetail) -> Result<TableRow, StorageError> {
        let mut row = TableRow::new(Self::table());
        row.put_key("uuid", Some(key));
        row.put_real("quantity", m.quantity);
        row.put_key("form_concept_key", m.form_concept_key);
        row.put_key("quantity_concept_key", m.quantity_concept_key);
        row.put_time("expiry_time", m.expiry_time);
        row.put_bool("is_administrable", m.is_administrable);
        Ok(row)
    }

    fn from_row(row: &TableRow) -> Result<MaterialDetail, StorageError> {
        Ok(MaterialDetail {
            quantity: row.real("quantity"),
            form_concept_key: row.key("form_concept_key")?,
            quantity_concept_key: row.key("quantity_concept_key")?,
            expiry_time: row.time("expiry_time"),
            is_administrable: row.bool("is_administrable"),
        })
    }
}

pub struct ManufacturedMaterialMapping;

impl RowMapping for ManufacturedMaterialMapping {
    type Model = ManufacturedMaterialDetail;

    fn table() -> &'static TableMap {
        &tables::MANUFACTURED_MATERIAL
    }

    fn to_row(key: Key, m: &ManufacturedMaterialDetail) -> Result<TableRow, StorageError> {
        let mut row = TableRow::new(Self::table());
        row.put_key("uuid", Some(key));
        row.put_text("lot_number", m.lot_number.as_deref());
        Ok(row)
    }

    fn from_row(row: &TableRow) -> Result<ManufacturedMaterialDetail, StorageError> {
        Ok(ManufacturedMaterialDetail {
            lot_number: row.text("lot_number"),
            ..Default::default()
        })
    }
}

pub struct DeviceMapping;

impl RowMapping for DeviceMapping {
    type Model = DeviceDetail;

    fn table() -> &'static TableMap {
        &tables::DEVICE
    }

    fn to_row(key: Key, d: &DeviceDetail) -> Result<TableRow, StorageError> {
        let mut row = TableRow::new(Self::table());
        row.put_key("uuid", Some(key));
        row.put_text("manufacturer_model", d.manufacturer_model.as_deref());
        row.put_text("operating_system", d.operating_system.as_deref());
        Ok(row)
    }

    fn from_row(row: &TableRow) -> Result<DeviceDetail, StorageError> {
        Ok(DeviceDetail {
            manufacturer_model: row.text("manufacturer_model"),
            operating_system: row.text("operating_system"),
        })
    }
}

pub struct ApplicationMapping;

impl RowMapping for ApplicationMapping {
    type Model = ApplicationDetail;

    fn table() -> &'static TableMap {
        &tables::APPLICATION
    }

    fn to_row(key: Key, a: &ApplicationDetail) -> Result<TableRow, StorageError> {
        let mut row = TableRow::new(Self::table());
        row.put_key("uuid", Some(key));
        row.put_text("software_name", a.software_name.as_deref());
        row.put_text("version_name", a.version_name.as_deref());
        row.put_text("vendor_name", a.vendor_name.as_deref());
        Ok(row)
    }

    fn from_row(row: &TableRow) -> Result<ApplicationDetail, StorageError> {
        Ok(ApplicationDetail {
            software_name: row.text("software_name"),
            version_name: row.text("version_name"),
            vendor_name: row.text("vendor_name"),
        })
    }
}
