//! Error handling module for the LexMatch backend.
//!
//! Provides centralized error types with mapping to HTTP status codes and response envelopes.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

/// Error codes as constants to avoid stringly-typed errors.
pub mod codes {
    pub const UNAUTHORIZED: &str = "UNAUTHORIZED";
    pub const FORBIDDEN: &str = "FORBIDDEN";
    pub const INVALID_CREDENTIALS: &str = "INVALID_CREDENTIALS";
    pub const EMAIL_NOT_CONFIRMED: &str = "EMAIL_NOT_CONFIRMED";
    pub const NOT_FOUND: &str = "NOT_FOUND";
    pub const VALIDATION_ERROR: &str = "VALIDATION_ERROR";
    pub const CONFLICT: &str = "CONFLICT";
    pub const SESSION_PENDING: &str = "SESSION_PENDING";
    pub const INTERNAL_ERROR: &str = "INTERNAL_ERROR";
    pub const DATABASE_ERROR: &str = "DATABASE_ERROR";
}

/// Application error type.
#[derive(Debug)]
pub enum AppError {
    /// Authentication required or rejected
    Unauthorized(String),
    /// Wrong credentials on sign-in
    InvalidCredentials(String),
    /// Account exists but the email was never confirmed
    EmailNotConfirmed(String),
    /// Route guard redirect
    Redirect {
        status: StatusCode,
        to: &'static str,
        notice: String,
    },
    /// Session still resolving after the settle delay
    SessionPending,
    /// Resource not found
    NotFound(String),
    /// Validation error
    Validation(String),
    /// Duplicate or in-flight write
    Conflict(String),
    /// Database error
    Database(String),
    /// Internal server error
    Internal(String),
}

impl AppError {
    /// Get the HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::InvalidCredentials(_) => StatusCode::UNAUTHORIZED,
            AppError::EmailNotConfirmed(_) => StatusCode::FORBIDDEN,
            AppError::Redirect { status, .. } => *status,
            AppError::SessionPending => StatusCode::SERVICE_UNAVAILABLE,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Get the error code for this error.
    pub fn error_code(&self) -> &'static str {
        match self {
            AppError::Unauthorized(_) => codes::UNAUTHORIZED,
            AppError::InvalidCredentials(_) => codes::INVALID_CREDENTIALS,
            AppError::EmailNotConfirmed(_) => codes::EMAIL_NOT_CONFIRMED,
            AppError::Redirect { status, .. } if *status == StatusCode::UNAUTHORIZED => {
                codes::UNAUTHORIZED
            }
            AppError::Redirect { .. } => codes::FORBIDDEN,
            AppError::SessionPending => codes::SESSION_PENDING,
            AppError::NotFound(_) => codes::NOT_FOUND,
            AppError::Validation(_) => codes::VALIDATION_ERROR,
            AppError::Conflict(_) => codes::CONFLICT,
            AppError::Database(_) => codes::DATABASE_ERROR,
            AppError::Internal(_) => codes::INTERNAL_ERROR,
        }
    }

    /// Get the error message.
    pub fn message(&self) -> String {
        match self {
            AppError::Unauthorized(msg)
            | AppError::InvalidCredentials(msg)
            | AppError::EmailNotConfirmed(msg)
            | AppError::NotFound(msg)
            | AppError::Validation(msg)
            | AppError::Conflict(msg)
            | AppError::Database(msg)
            | AppError::Internal(msg) => msg.clone(),
            AppError::Redirect { notice, .. } => notice.clone(),
            AppError::SessionPending => "Sessão ainda carregando, tente novamente.".to_string(),
        }
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.error_code(), self.message())
    }
}

impl std::error::Error for AppError {}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        tracing::error!("Database error: {:?}", err);
        AppError::Database(format!("Database error: {}", err))
    }
}

/// Error details in the response envelope.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorDetails {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

/// Error response envelope.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub error: ErrorDetails,
}

impl ErrorResponse {
    pub fn new(error: &AppError) -> Self {
        let details = match error {
            AppError::Redirect { to, notice, .. } => {
                Some(serde_json::json!({ "redirectTo": to, "notice": notice }))
            }
            _ => None,
        };

        Self {
            success: false,
            error: ErrorDetails {
                code: error.error_code().to_string(),
                message: error.message(),
                details,
            },
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = ErrorResponse::new(&self);
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_redirect_envelope_carries_target() {
        let err = AppError::Redirect {
            status: StatusCode::UNAUTHORIZED,
            to: "/login",
            notice: "Faça login".to_string(),
        };
        assert_eq!(err.status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(err.error_code(), codes::UNAUTHORIZED);

        let body = ErrorResponse::new(&err);
        let details = body.error.details.unwrap();
        assert_eq!(details["redirectTo"], "/login");
        assert_eq!(details["notice"], "Faça login");
    }

    #[test]
    fn test_forbidden_redirect_code() {
        let err = AppError::Redirect {
            status: StatusCode::FORBIDDEN,
            to: "/admin",
            notice: String::new(),
        };
        assert_eq!(err.error_code(), codes::FORBIDDEN);
    }

    #[test]
    fn test_plain_errors_have_no_details() {
        let body = ErrorResponse::new(&AppError::Validation("bad".into()));
        assert!(body.error.details.is_none());
        assert_eq!(body.error.code, codes::VALIDATION_ERROR);
    }
}
