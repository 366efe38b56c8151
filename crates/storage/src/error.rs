use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("unknown field {field} on {table}")]
    UnknownField { table: String, field: String },

    #[error("unknown collection {collection} on {table}")]
    UnknownCollection { table: String, collection: String },

    #[error("unknown named query: {0}")]
    UnknownNamedQuery(String),

    #[error("invalid filter {key}={value}: {reason}")]
    InvalidFilter {
        key: String,
        value: String,
        reason: String,
    },

    #[error("staging unavailable: {0}")]
    Staging(String),

    #[error("core error: {0}")]
    Core(#[from] hearth_core::CoreError),
}
