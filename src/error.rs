//! Error taxonomy and the uniform response envelope.
//!
//! Handlers return `Result<ApiOk<T>, AppError>`; the `IntoResponse`
//! impls here are the only place responses are formatted. Successful
//! operations wrap their payload as `{success: true, data, message}`,
//! failures as `{success: false, error: {code, message, details?}}`.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Operational and unexpected failures raised by handlers and the layers
/// below them.
#[derive(Debug, Error)]
pub enum AppError {
    /// No valid identity could be resolved for the caller.
    #[error("{0}")]
    Authentication(String),

    /// The caller's identity lacks the required capability.
    #[error("{0}")]
    Authorization(String),

    /// Malformed input, optionally with structured field details.
    #[error("{message}")]
    Validation {
        message: String,
        details: Option<Value>,
    },

    /// A referenced entity does not exist.
    #[error("{0} not found")]
    NotFound(String),

    /// A uniqueness constraint was violated.
    #[error("{0}")]
    Conflict(String),

    /// Anything else, including persistence-layer failures. Reported to
    /// the caller with a generic message; the real cause is only logged.
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    pub fn authentication() -> Self {
        Self::Authentication("Authentication required".to_string())
    }

    pub fn authorization(message: impl Into<String>) -> Self {
        Self::Authorization(message.into())
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
            details: None,
        }
    }

    pub fn validation_with_details(message: impl Into<String>, details: Value) -> Self {
        Self::Validation {
            message: message.into(),
            details: Some(details),
        }
    }

    pub fn not_found(resource: impl Into<String>) -> Self {
        Self::NotFound(resource.into())
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict(message.into())
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Authentication(_) => StatusCode::UNAUTHORIZED,
            Self::Authorization(_) => StatusCode::FORBIDDEN,
            Self::Validation { .. } => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            Self::Authentication(_) => "AUTHENTICATION_ERROR",
            Self::Authorization(_) => "AUTHORIZATION_ERROR",
            Self::Validation { .. } => "VALIDATION_ERROR",
            Self::NotFound(_) => "NOT_FOUND",
            Self::Conflict(_) => "CONFLICT",
            Self::Internal(_) => "INTERNAL_SERVER_ERROR",
        }
    }
}

/// Map a persistence error to `Conflict` when it is a SQLite uniqueness
/// violation, passing everything else through as internal.
pub fn map_unique_violation(err: anyhow::Error, message: &str) -> AppError {
    let is_unique = err
        .downcast_ref::<rusqlite::Error>()
        .map(|e| {
            matches!(
                e.sqlite_error_code(),
                Some(rusqlite::ErrorCode::ConstraintViolation)
            )
        })
        .unwrap_or(false);

    if is_unique {
        AppError::conflict(message)
    } else {
        AppError::Internal(err)
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub success: bool,
    pub error: ErrorDetail,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let code = self.code();

        // Operational errors are expected and user-facing; anything
        // untyped is logged loudly and reported with a generic message.
        let (message, details) = match &self {
            Self::Internal(err) => {
                tracing::error!("Internal error: {:#}", err);
                ("An unexpected error occurred".to_string(), None)
            }
            Self::Validation { message, details } => {
                tracing::warn!("{}: {}", code, message);
                (message.clone(), details.clone())
            }
            other => {
                tracing::warn!("{}: {}", code, other);
                (other.to_string(), None)
            }
        };

        let body = ErrorBody {
            success: false,
            error: ErrorDetail {
                code: code.to_string(),
                message,
                details,
            },
        };

        (status, Json(body)).into_response()
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SuccessBody<T> {
    pub success: bool,
    pub data: T,
    pub message: String,
}

/// A successful handler result: payload plus human-readable message,
/// wrapped in the success envelope on the way out.
#[derive(Debug)]
pub struct ApiOk<T> {
    status: StatusCode,
    data: T,
    message: String,
}

impl<T> ApiOk<T> {
    pub fn new(data: T, message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::OK,
            data,
            message: message.into(),
        }
    }

    /// 201 variant for create operations.
    pub fn created(data: T, message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::CREATED,
            data,
            message: message.into(),
        }
    }
}

impl<T: Serialize> IntoResponse for ApiOk<T> {
    fn into_response(self) -> Response {
        let body = SuccessBody {
            success: true,
            data: self.data,
            message: self.message,
        };
        (self.status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes_match_error_kinds() {
        assert_eq!(
            AppError::authentication().status_code(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            AppError::authorization("nope").status_code(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            AppError::validation("bad").status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AppError::not_found("Objective").status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            AppError::conflict("dup").status_code(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            AppError::Internal(anyhow::anyhow!("boom")).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn not_found_formats_resource_name() {
        let err = AppError::not_found("Objective");
        assert_eq!(err.to_string(), "Objective not found");
        assert_eq!(err.code(), "NOT_FOUND");
    }

    #[test]
    fn unique_violation_maps_to_conflict() {
        let sqlite_err = rusqlite::Error::SqliteFailure(
            rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE),
            Some("UNIQUE constraint failed".to_string()),
        );
        let err = map_unique_violation(anyhow::Error::new(sqlite_err), "Email already in use");
        assert!(matches!(err, AppError::Conflict(_)));
        assert_eq!(err.to_string(), "Email already in use");
    }

    #[test]
    fn other_errors_stay_internal() {
        let err = map_unique_violation(anyhow::anyhow!("disk on fire"), "ignored");
        assert!(matches!(err, AppError::Internal(_)));
    }
}
