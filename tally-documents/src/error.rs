use thiserror::Error;

/// Result alias for document-store operations.
pub type DocumentResult<T> = Result<T, DocumentError>;

/// Error type surfaced by document-store operations.
#[derive(Debug, Error)]
pub enum DocumentError {
    #[error("storage error: {0}")]
    Storage(String),
    #[error("serialization error: {0}")]
    Serialization(String),
    #[error("invalid document state: {0}")]
    InvalidState(String),
}

impl From<rusqlite::Error> for DocumentError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Storage(value.to_string())
    }
}

impl From<std::io::Error> for DocumentError {
    fn from(value: std::io::Error) -> Self {
        Self::Storage(value.to_string())
    }
}
