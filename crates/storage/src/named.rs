use crate::mapping::ColumnType;

#[derive(Debug)]
pub struct ViewColumn {
    pub name: &'static str,
    pub ty: ColumnType,
}

const fn col(name: &'static str, ty: ColumnType) -> ViewColumn {
    ViewColumn { name, ty }
}

#[derive(Debug)]
pub struct NamedCollection {
    pub prefix: &'static str,
    pub view: &'static str,
    /// Every collection view exposes its owner as `source_key`.
    pub columns: &'static [ViewColumn],
}

impl NamedCollection {
    pub fn column(&self, name: &str) -> Option<&ViewColumn> {
        self.columns.iter().find(|c| c.name == name)
    }
}

#[derive(Debug)]
pub struct NamedQuery {
    pub name: &'static str,
    pub view: &'static str,
    pub key_column: &'static str,
    pub columns: &'static [ViewColumn],
    pub collections: &'static [NamedCollection],
    pub views: &'static [&'static str],
}

impl NamedQuery {
    pub fn column(&self, name: &str) -> Option<&ViewColumn> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn collection(&self, prefix: &str) -> Option<&NamedCollection> {
        self.collections.iter().find(|c| c.prefix == prefix)
    }
}

pub static ENTITY_SEARCH: NamedQuery = NamedQuery {
    name: "entity",
    view: "entity_search",
    key_column: "uuid",
    columns: &[
        col("uuid", ColumnType::Key),
        col("class_concept_key", ColumnType::Key),
        col("status_concept_key", ColumnType::Key),
        col("type_concept_key", ColumnType::Key),
        col("creation_time", ColumnType::Timestamp),
        col("obsoletion_time", ColumnType::Timestamp),
        col("hidden", ColumnType::Boolean),
        col("date_of_birth", ColumnType::Timestamp),
        col("gender_concept_key", ColumnType::Key),
        col("deceased_time", ColumnType::Timestamp),
        col("is_mobile", ColumnType::Boolean),
    ],
    collections: &[
        NamedCollection {
            prefix: "identifier",
            view: "entity_identifier_search",
            columns: &[
                col("identifier_guard", ColumnType::Text),
                col("identifier", ColumnType::Text),
            ],
        },
        NamedCollection {
            prefix: "name",
            view: "entity_name_search",
            columns: &[
                col("name_guard", ColumnType::Key),
                col("name_component", ColumnType::Text),
            ],
        },
        NamedCollection {
            prefix: "relationship",
            view: "entity_relationship_search",
            columns: &[
                col("relationship_guard", ColumnType::Key),
                col("relationship_target", ColumnType::Key),
                col("relationship_quantity", ColumnType::Integer),
            ],
        },
        NamedCollection {
            prefix: "tag",
            view: "entity_tag_search",
            columns: &[col("tag_guard", ColumnType::Text), col("tag", ColumnType::Text)],
        },
    ],
    views: &[
        "CREATE VIEW IF NOT EXISTS entity_search AS
         SELECT entity.uuid AS uuid,
                entity.class_concept_key AS class_concept_key,
                entity.status_concept_key AS status_concept_key,
                entity.type_concept_key AS type_concept_key,
                entity.creation_time AS creation_time,
                entity.obsoletion_time AS obsoletion_time,
                entity.hidden AS hidden,
                person.date_of_birth AS date_of_birth,
                patient.gender_concept_key AS gender_concept_key,
                patient.deceased_time AS deceased_time,
                place.is_mobile AS is_mobile
         FROM entity
         LEFT JOIN person ON person.uuid = entity.uuid
         LEFT JOIN patient ON patient.uuid = entity.uuid
         LEFT JOIN place ON place.uuid = entity.uuid",
        "CREATE VIEW IF NOT EXISTS entity_identifier_search AS
         SELECT source_key, authority AS identifier_guard, value AS identifier
         FROM entity_identifier",
        "CREATE VIEW IF NOT EXISTS entity_name_search AS
         SELECT entity_name.source_key AS source_key,
                entity_name.use_concept_key AS name_guard,
                entity_name_component.value AS name_component
         FROM entity_name
         JOIN entity_name_component ON entity_name_component.source_key = entity_name.uuid",
        "CREATE VIEW IF NOT EXISTS entity_relationship_search AS
         SELECT source_key,
                relationship_type_key AS relationship_guard,
                target_key AS relationship_target,
                quantity AS relationship_quantity
         FROM entity_relationship",
        "CREATE VIEW IF NOT EXISTS entity_tag_search AS
         SELECT source_key, tag_key AS tag_guard, value AS tag
         FROM entity_tag",
    ],
};

pub static ALL_NAMED_QUERIES: &[&NamedQuery] = &[&ENTITY_SEARCH];

pub fn named_query(name: &str) -> Option<&'static NamedQuery> {
    ALL_NAMED_QUERIES.iter().copied().find(|q| q.name == name)
}
