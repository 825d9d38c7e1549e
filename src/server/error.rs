//! Uniform JSON error responses
//!
//! Every failure renders as `{"error": {"code", "message", "validation"?}}`.
//! Internal failures are logged server-side and answered with a generic
//! message.

use crate::auth::permissions::ValidationErrors;
use crate::storage::StorageError;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub validation: Option<ValidationErrors>,
}

#[derive(Debug, Serialize)]
struct ErrorEnvelope<'a> {
    error: &'a ErrorBody,
}

/// Error returned by handlers and the authorization layer
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub body: ErrorBody,
}

impl ApiError {
    fn new(status: StatusCode, code: &str, message: impl Into<String>) -> Self {
        Self {
            status,
            body: ErrorBody {
                code: code.to_string(),
                message: message.into(),
                validation: None,
            },
        }
    }

    /// Valid credential without a matching grant. Says nothing about
    /// whether the target exists.
    pub fn forbidden() -> Self {
        Self::new(StatusCode::FORBIDDEN, "access_token_denied", "access denied")
    }

    /// Unknown or expired token
    pub fn unauthenticated() -> Self {
        Self::new(
            StatusCode::UNAUTHORIZED,
            "access_token_denied",
            "invalid or expired access token",
        )
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, "resource_not_found", message)
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(StatusCode::CONFLICT, "resource_already_exists", message)
    }

    pub fn path_not_found() -> Self {
        Self::new(
            StatusCode::NOT_FOUND,
            "request_path_not_found",
            "request path is not found",
        )
    }

    pub fn method_not_allowed() -> Self {
        Self::new(
            StatusCode::METHOD_NOT_ALLOWED,
            "request_method_not_allowed",
            "method not allowed",
        )
    }

    pub fn validation(errors: ValidationErrors) -> Self {
        let mut err = Self::new(
            StatusCode::BAD_REQUEST,
            "request_data_invalid",
            "request data is invalid",
        );
        err.body.validation = Some(errors);
        err
    }

    pub fn not_json(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "request_not_json", message)
    }

    pub fn internal(err: &StorageError) -> Self {
        tracing::error!(error = %err, "Storage failure");
        Self::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            "internal",
            "internal server error",
        )
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(ErrorEnvelope { error: &self.body })).into_response()
    }
}

impl From<StorageError> for ApiError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound(message) => ApiError::not_found(message),
            StorageError::Conflict(message) => ApiError::conflict(message),
            StorageError::Validation(errors) => ApiError::validation(errors),
            ref internal @ (StorageError::Database(_) | StorageError::Serialization(_)) => {
                ApiError::internal(internal)
            }
        }
    }
}

impl From<ValidationErrors> for ApiError {
    fn from(errors: ValidationErrors) -> Self {
        ApiError::validation(errors)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        match rejection {
            JsonRejection::JsonDataError(e) => {
                ApiError::validation(ValidationErrors::single("body", e.body_text()))
            }
            other => ApiError::not_json(other.body_text()),
        }
    }
}
