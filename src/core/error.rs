use thiserror::Error;

/// Errors raised by the knowledge base and its collaborators.
///
/// Lookups that miss are not errors: they surface as `None`, an empty list
/// or `false`. Only a failing embedder or index ends up here.
#[derive(Debug, Error)]
pub enum KbError {
    #[error("Embedding error: {0}")]
    Embedding(String),

    #[error("Index error: {0}")]
    Index(#[from] rusqlite::Error),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Embedding dimension mismatch: index holds {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<serde_yaml::Error> for KbError {
    fn from(err: serde_yaml::Error) -> Self {
        KbError::Config(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, KbError>;
