//! Service-wide error type and its HTTP mapping.

use std::collections::BTreeMap;

use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::http::{Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

/// Validation messages keyed by field name.
pub type FieldErrors = BTreeMap<String, Vec<String>>;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Not found.")]
    NotFound,

    #[error("Invalid page.")]
    InvalidPage,

    #[error("Authentication credentials were not provided.")]
    NotAuthenticated,

    #[error("{0}")]
    AuthenticationFailed(String),

    #[error("You do not have permission to perform this action.")]
    PermissionDenied,

    #[error("Invalid input: {0:?}")]
    Validation(FieldErrors),

    /// A delete refused because other records still reference the target.
    #[error("{0}")]
    Protected(&'static str),

    #[error("Method \"{0}\" not allowed.")]
    MethodNotAllowed(Method),

    #[error("Storage error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl StoreError {
    pub fn field(name: impl Into<String>, message: impl Into<String>) -> Self {
        let mut errors = FieldErrors::new();
        errors.insert(name.into(), vec![message.into()]);
        Self::Validation(errors)
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::NotFound | Self::InvalidPage => StatusCode::NOT_FOUND,
            Self::NotAuthenticated | Self::AuthenticationFailed(_) => StatusCode::UNAUTHORIZED,
            Self::PermissionDenied => StatusCode::FORBIDDEN,
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::Protected(_) | Self::MethodNotAllowed(_) => StatusCode::METHOD_NOT_ALLOWED,
            Self::Database(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for StoreError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match &self {
            Self::Validation(errors) => json!(errors),
            Self::Protected(message) => json!({ "error": message }),
            Self::Database(e) => {
                tracing::error!(error = %e, "Database operation failed");
                json!({ "detail": "A server error occurred." })
            }
            Self::Internal(e) => {
                tracing::error!(error = %e, "Internal error");
                json!({ "detail": "A server error occurred." })
            }
            other => json!({ "detail": other.to_string() }),
        };
        (status, Json(body)).into_response()
    }
}

impl From<validator::ValidationErrors> for StoreError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let fields = errors
            .field_errors()
            .into_iter()
            .map(|(field, errs)| {
                let messages = errs
                    .iter()
                    .map(|e| e.message.as_ref().map(|m| m.to_string()).unwrap_or_else(|| format!("Invalid value ({}).", e.code)))
                    .collect();
                (field.to_string(), messages)
            })
            .collect();
        Self::Validation(fields)
    }
}

impl From<JsonRejection> for StoreError {
    fn from(rejection: JsonRejection) -> Self {
        Self::field("non_field_errors", rejection.body_text())
    }
}

impl From<QueryRejection> for StoreError {
    fn from(rejection: QueryRejection) -> Self {
        Self::field("non_field_errors", rejection.body_text())
    }
}

impl From<PathRejection> for StoreError {
    fn from(_: PathRejection) -> Self {
        Self::NotFound
    }
}

pub type Result<T> = std::result::Result<T, StoreError>;
