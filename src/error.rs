//! Typed errors and HTTP mapping.

use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Problems detected while describing a table or constructing a service.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("table {table} has no primary key")]
    MissingPrimaryKey { table: String },
    #[error("invalid primary key: table {table} field {field}")]
    InvalidPrimaryKey { table: String, field: String },
    #[error("duplicate field {field} in table {table}")]
    DuplicateColumn { table: String, field: String },
    #[error("invalid soft delete marker: table {table} field {field}")]
    InvalidSoftDelete { table: String, field: String },
    #[error("filter {key} is not a field of table {table}")]
    UnknownFilterField { table: String, key: String },
    #[error("invalid include {name}: {reason}")]
    InvalidInclude { name: String, reason: String },
    #[error("config load: {0}")]
    Load(String),
}

/// One field-level validation failure.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ValidationIssue {
    pub field: String,
    pub message: String,
}

impl ValidationIssue {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        ValidationIssue {
            field: field.into(),
            message: message.into(),
        }
    }
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Duplicate(String),
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    Forbidden(String),
    #[error("{0}")]
    Unauthorized(String),
    #[error("{0}")]
    PayloadTooLarge(String),
    #[error("Validation failed")]
    Validation(Vec<ValidationIssue>),
    #[error("database: {0}")]
    Db(#[from] sqlx::Error),
}

impl AppError {
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn duplicate(msg: impl Into<String>) -> Self {
        Self::Duplicate(msg.into())
    }

    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::BadRequest(msg.into())
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Duplicate(_) => StatusCode::CONFLICT,
            AppError::BadRequest(_) | AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            AppError::Config(_) | AppError::Db(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// True for the kinds a caller can act on (everything except config and storage faults).
    pub fn is_domain(&self) -> bool {
        !matches!(self, AppError::Config(_) | AppError::Db(_))
    }
}

/// Body extraction failures keep the common error shape.
impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
            AppError::PayloadTooLarge(rejection.body_text())
        } else {
            AppError::BadRequest(rejection.body_text())
        }
    }
}

#[derive(Serialize, Debug)]
pub struct ErrorBody {
    pub success: bool,
    pub code: u16,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub errors: Option<Vec<ValidationIssue>>,
}

impl From<&AppError> for ErrorBody {
    fn from(err: &AppError) -> Self {
        let code = err.status_code().as_u16();
        let (message, errors) = match err {
            AppError::Validation(issues) => (err.to_string(), Some(issues.clone())),
            AppError::Config(_) | AppError::Db(_) => ("internal server error".to_string(), None),
            _ => (err.to_string(), None),
        };
        ErrorBody {
            success: false,
            code,
            message,
            errors,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if !self.is_domain() {
            tracing::error!(error = %self, "unhandled error");
        }
        let body = ErrorBody::from(&self);
        (self.status_code(), Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(AppError::not_found("x").status_code(), StatusCode::NOT_FOUND);
        assert_eq!(AppError::duplicate("x").status_code(), StatusCode::CONFLICT);
        assert_eq!(AppError::bad_request("x").status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(AppError::Forbidden("x".into()).status_code(), StatusCode::FORBIDDEN);
        assert_eq!(AppError::Unauthorized("x".into()).status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            AppError::PayloadTooLarge("x".into()).status_code(),
            StatusCode::PAYLOAD_TOO_LARGE
        );
        assert_eq!(
            AppError::Db(sqlx::Error::RowNotFound).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_domain_message_is_verbatim() {
        let err = AppError::not_found("inscription with idStudent=9999 and idEvent=7 not found");
        let body = ErrorBody::from(&err);
        assert!(!body.success);
        assert_eq!(body.code, 404);
        assert_eq!(body.message, "inscription with idStudent=9999 and idEvent=7 not found");
        assert!(body.errors.is_none());
    }

    #[test]
    fn test_validation_body_carries_issues() {
        let err = AppError::Validation(vec![ValidationIssue::new("email", "email is required")]);
        let json = serde_json::to_value(ErrorBody::from(&err)).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "success": false,
                "code": 400,
                "message": "Validation failed",
                "errors": [{ "field": "email", "message": "email is required" }]
            })
        );
    }

    #[test]
    fn test_storage_errors_are_not_leaked() {
        let err = AppError::Db(sqlx::Error::PoolTimedOut);
        let body = ErrorBody::from(&err);
        assert_eq!(body.code, 500);
        assert_eq!(body.message, "internal server error");
    }

    #[test]
    fn test_config_error_message() {
        let err = ConfigError::MissingPrimaryKey { table: "users".into() };
        assert_eq!(err.to_string(), "table users has no primary key");
    }
}
