use hearth_core::CoreError;
use hearth_storage::StorageError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("core error: {0}")]
    Core(#[from] CoreError),

    /// Not retryable: the same input fails the same way.
    #[error("missing required field {field}: {model}")]
    MissingRequiredField { field: String, model: String },

    #[error("{model} not found: {key}")]
    NotFound { model: String, key: String },

    #[error("no persister for {0}")]
    NoPersister(String),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("logging error: {0}")]
    Logging(String),

    #[error("worker error: {0}")]
    Worker(String),
}

impl From<rusqlite::Error> for EngineError {
    fn from(e: rusqlite::Error) -> Self {
        EngineError::Storage(StorageError::Sqlite(e))
    }
}

impl EngineError {
    pub fn not_found(model: &str, key: impl std::fmt::Display) -> Self {
        EngineError::NotFound {
            model: model.to_string(),
            key: key.to_string(),
        }
    }
}
