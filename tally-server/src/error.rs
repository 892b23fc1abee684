use std::collections::BTreeMap;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use tally_ledger::LedgerError;

use crate::tenant::ResolveError;

/// JSON error envelope returned by every endpoint.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: &'static str,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fields: Option<BTreeMap<&'static str, String>>,
}

#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    body: ErrorBody,
}

impl ApiError {
    pub fn new(status: StatusCode, error: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            body: ErrorBody {
                error,
                message: message.into(),
                fields: None,
            },
        }
    }

    pub fn validation(fields: BTreeMap<&'static str, String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            body: ErrorBody {
                error: "validation_failed",
                message: "payment input failed validation".into(),
                fields: Some(fields),
            },
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "bad_request", message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, "not_found", message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, "internal", message)
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}

impl From<LedgerError> for ApiError {
    fn from(value: LedgerError) -> Self {
        match value {
            LedgerError::Validation(violations) => {
                let fields = violations
                    .into_iter()
                    .map(|violation| (violation.field, violation.message))
                    .collect();
                Self::validation(fields)
            }
            LedgerError::ParentNotFound => Self::not_found("parent document not found"),
            LedgerError::TenantMismatch => Self::new(
                StatusCode::FORBIDDEN,
                "tenant_mismatch",
                "parent document belongs to a different tenant",
            ),
            LedgerError::Conflict(message) => {
                Self::new(StatusCode::CONFLICT, "conflict", message)
            }
            LedgerError::Storage(message) | LedgerError::Serialization(message) => {
                tracing::error!(error = %message, "ledger failure");
                Self::internal("internal storage error")
            }
        }
    }
}

impl From<ResolveError> for ApiError {
    fn from(value: ResolveError) -> Self {
        match value {
            ResolveError::Storage(message) => {
                tracing::error!(error = %message, "tenant resolution failure");
                Self::internal("internal storage error")
            }
            other => Self::new(StatusCode::UNAUTHORIZED, "unauthorized", other.to_string()),
        }
    }
}
