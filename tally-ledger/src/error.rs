use serde::Serialize;
use thiserror::Error;

use tally_documents::DocumentError;

/// Result alias for ledger operations.
pub type LedgerResult<T> = Result<T, LedgerError>;

/// A single field-level input violation.
#[derive(Clone, Debug, Serialize)]
pub struct FieldViolation {
    pub field: &'static str,
    pub message: String,
}

impl FieldViolation {
    pub fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

/// Error type surfaced by ledger operations.
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("invalid payment input: {}", summarize(.0))]
    Validation(Vec<FieldViolation>),
    #[error("parent document not found")]
    ParentNotFound,
    #[error("parent document belongs to a different tenant")]
    TenantMismatch,
    #[error("write conflict: {0}")]
    Conflict(String),
    #[error("storage error: {0}")]
    Storage(String),
    #[error("serialization error: {0}")]
    Serialization(String),
}

fn summarize(violations: &[FieldViolation]) -> String {
    violations
        .iter()
        .map(|violation| format!("{} {}", violation.field, violation.message))
        .collect::<Vec<_>>()
        .join(", ")
}

impl From<rusqlite::Error> for LedgerError {
    fn from(value: rusqlite::Error) -> Self {
        match &value {
            rusqlite::Error::SqliteFailure(err, _)
                if matches!(
                    err.code,
                    rusqlite::ErrorCode::DatabaseBusy | rusqlite::ErrorCode::DatabaseLocked
                ) =>
            {
                Self::Conflict(value.to_string())
            }
            _ => Self::Storage(value.to_string()),
        }
    }
}

impl From<std::io::Error> for LedgerError {
    fn from(value: std::io::Error) -> Self {
        Self::Storage(value.to_string())
    }
}

impl From<csv::Error> for LedgerError {
    fn from(value: csv::Error) -> Self {
        Self::Serialization(value.to_string())
    }
}

impl From<DocumentError> for LedgerError {
    fn from(value: DocumentError) -> Self {
        match value {
            DocumentError::Serialization(message) => Self::Serialization(message),
            DocumentError::Storage(message) | DocumentError::InvalidState(message) => {
                Self::Storage(message)
            }
        }
    }
}
