//! Typed errors and HTTP mapping.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Which pagination constraint a collection violated.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PaginationViolation {
    DefaultLimitNotPositive,
    MaxLimitNotPositive,
    MaxLimitBelowDefault,
}

impl std::fmt::Display for PaginationViolation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            PaginationViolation::DefaultLimitNotPositive => "defaultLimit must be greater than zero",
            PaginationViolation::MaxLimitNotPositive => "maxLimit must be greater than zero",
            PaginationViolation::MaxLimitBelowDefault => "maxLimit must be greater than or equal to defaultLimit",
        })
    }
}

/// Startup errors: any of these aborts hub construction.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("unable to find primary key for table '{table}'")]
    MissingPrimaryKey { table: String },
    #[error("invalid pagination for collection '{slug}': {violation}")]
    InvalidPaginationConfig { slug: String, violation: PaginationViolation },
    #[error("query key '{key}' of collection '{slug}' is not a column")]
    UnknownQueryKey { slug: String, key: String },
    #[error("invalid collection slug '{0}'")]
    InvalidSlug(String),
    #[error("duplicate collection slug: {0}")]
    DuplicateSlug(String),
    #[error("config load: {0}")]
    Load(String),
}

/// Failure reported by a plugin's `register` or `bootstrap`. Never fatal.
#[derive(Error, Debug)]
#[error("{0}")]
pub struct PluginError(pub String);

impl PluginError {
    pub fn new(message: impl Into<String>) -> Self {
        PluginError(message.into())
    }
}

/// One field-level validation failure.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        FieldError {
            field: field.into(),
            message: message.into(),
        }
    }
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error("access denied")]
    AccessDenied,
    #[error("request body is missing or empty")]
    EmptyBody,
    #[error("document id is missing")]
    MissingId,
    #[error("validation failed")]
    ValidationFailed(Vec<FieldError>),
    #[error("document not found: {0}")]
    NotFound(String),
    #[error("the limit value {limit} exceeds the maximum allowed limit {max}")]
    LimitExceeded { limit: u32, max: u32 },
    #[error("unable to complete the action")]
    ActionFailed,
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("database: {0}")]
    Db(#[from] sqlx::Error),
    #[error("internal: {0}")]
    Internal(String),
}

#[derive(Serialize)]
pub struct ErrorBody {
    pub error: ErrorDetail,
}

#[derive(Serialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl AppError {
    pub fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            AppError::AccessDenied => (StatusCode::FORBIDDEN, "access_denied"),
            AppError::EmptyBody => (StatusCode::NOT_FOUND, "empty_body"),
            AppError::MissingId => (StatusCode::NOT_FOUND, "missing_id"),
            AppError::ValidationFailed(_) => (StatusCode::BAD_REQUEST, "validation_failed"),
            AppError::NotFound(_) => (StatusCode::NOT_FOUND, "not_found"),
            AppError::LimitExceeded { .. } => (StatusCode::BAD_REQUEST, "limit_exceeded"),
            AppError::ActionFailed => (StatusCode::BAD_REQUEST, "action_failed"),
            AppError::BadRequest(_) => (StatusCode::BAD_REQUEST, "bad_request"),
            AppError::Conflict(_) => (StatusCode::CONFLICT, "conflict"),
            AppError::Db(e) => {
                if let sqlx::Error::RowNotFound = e {
                    (StatusCode::NOT_FOUND, "not_found")
                } else {
                    (StatusCode::INTERNAL_SERVER_ERROR, "database_error")
                }
            }
            AppError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "internal_error"),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();
        let details = match &self {
            AppError::ValidationFailed(errors) => serde_json::to_value(errors).ok(),
            _ => None,
        };
        let body = ErrorBody {
            error: ErrorDetail {
                code: code.to_string(),
                message: self.to_string(),
                details,
            },
        };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_mapping_follows_error_kind() {
        assert_eq!(AppError::AccessDenied.status_and_code().0, StatusCode::FORBIDDEN);
        assert_eq!(AppError::EmptyBody.status_and_code().0, StatusCode::NOT_FOUND);
        assert_eq!(AppError::MissingId.status_and_code().0, StatusCode::NOT_FOUND);
        assert_eq!(AppError::ActionFailed.status_and_code().0, StatusCode::BAD_REQUEST);
        assert_eq!(
            AppError::LimitExceeded { limit: 20, max: 10 }.status_and_code().0,
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AppError::Db(sqlx::Error::RowNotFound).status_and_code().1,
            "not_found"
        );
    }

    #[test]
    fn action_failure_hides_cause() {
        assert_eq!(AppError::ActionFailed.to_string(), "unable to complete the action");
    }
}
