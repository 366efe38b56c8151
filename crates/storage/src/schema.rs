use rusqlite::Connection;

use crate::error::StorageError;
use crate::mapping::{TableMap, TableRole};
use crate::named;
use crate::tables::ALL_TABLES;

pub const SCHEMA_VERSION: i32 = 1;

pub fn init_schema(conn: &Connection) -> Result<(), StorageError> {
    conn.execute_batch(
        "
        PRAGMA journal_mode = WAL;
        PRAGMA synchronous = NORMAL;
        PRAGMA foreign_keys = ON;
        PRAGMA cache_size = -32000;
        PRAGMA busy_timeout = 5000;
    ",
    )?;
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY,
            applied_at INTEGER NOT NULL
        );
        INSERT OR IGNORE INTO schema_version (version, applied_at) VALUES (1, unixepoch());
    ",
    )?;
    conn.execute_batch(&schema_sql())?;
    Ok(())
}

/// DDL for every mapped table, its indexes and the named query views.
pub fn schema_sql() -> String {
    let mut sql = String::new();
    for table in ALL_TABLES {
        sql.push_str(&table_ddl(table));
    }
    for query in named::ALL_NAMED_QUERIES {
        for view in query.views {
            sql.push_str(view);
            sql.push_str(";\n");
        }
    }
    sql
}

pub fn table_ddl(table: &TableMap) -> String {
    let mut lines: Vec<String> = table
        .columns
        .iter()
        .map(|c| {
            let not_null = if c.required { " NOT NULL" } else { "" };
            format!("    {} {}{not_null}", c.name, c.ty.sql_type())
        })
        .collect();
    let primary_key = match table.role {
        TableRole::Link => format!("    PRIMARY KEY ({}, {})", table.owner_column, table.key_column),
        _ => format!("    PRIMARY KEY ({})", table.key_column),
    };
    lines.push(primary_key);

    let mut ddl = format!(
        "CREATE TABLE IF NOT EXISTS {} (\n{}\n);\n",
        table.name,
        lines.join(",\n")
    );
    if table.owner_column != table.key_column && table.role != TableRole::Link {
        ddl.push_str(&format!(
            "CREATE INDEX IF NOT EXISTS idx_{0}_{1} ON {0} ({1});\n",
            table.name, table.owner_column
        ));
    }
    if table.owner_column != "source_key" && table.column("source_key").is_some() {
        ddl.push_str(&format!(
            "CREATE INDEX IF NOT EXISTS idx_{0}_source_key ON {0} (source_key);\n",
            table.name
        ));
    }
    ddl
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tables;

    #[test]
    fn init_schema_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();
        init_schema(&conn).unwrap();

        let count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = 'entity'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(count, 1);
    }

    #[test]
    fn columns_follow_table_map_order() {
        let conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();
        for table in ALL_TABLES {
            let mut stmt = conn
                .prepare(&format!("SELECT name FROM pragma_table_info('{}')", table.name))
                .unwrap();
            let names: Vec<String> = stmt
                .query_map([], |row| row.get(0))
                .unwrap()
                .collect::<Result<_, _>>()
                .unwrap();
            assert_eq!(names, table.column_names(), "{}", table.name);
        }
    }

    #[test]
    fn link_tables_use_composite_key() {
        let ddl = table_ddl(&tables::CONCEPT_SET_MEMBER);
        assert!(ddl.contains("PRIMARY KEY (source_key, target_key)"));
        assert!(!ddl.contains("CREATE INDEX"));
        let ddl = table_ddl(&tables::ENTITY_NAME_COMPONENT);
        assert!(ddl.contains("idx_entity_name_component_root_key"));
        assert!(ddl.contains("idx_entity_name_component_source_key"));
    }
}
