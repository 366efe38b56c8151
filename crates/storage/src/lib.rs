pub mod error;
pub mod filter;
pub mod mapper;
pub mod mapping;
pub mod named;
pub mod schema;
pub mod sql;
pub mod sqlite;
pub mod staging;
pub mod tables;

pub use error::StorageError;
pub use filter::{CompiledFilter, NamedFilters, compile_filters};
pub use mapping::{ColumnDef, ColumnType, TableMap, TableRole, TableRow, RowMapping};
pub use named::{NamedQuery, named_query};
pub use sql::{CompareOp, OrderBy, Predicate, QueryOptions, SelectBuilder, SqlStatement};
pub use sqlite::SqliteStore;
pub use staging::{MergeProgress, MergeReport, SqliteStaging, SqliteStagedStore, StagedStore, StagingBackend};
