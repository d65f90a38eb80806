//! Error types for RustCircle
//!
//! All errors in the application are converted to `AppError`,
//! which implements `IntoResponse` for proper HTTP error responses.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

/// Application-wide error type
///
/// Validation, not-found and conflict errors are recoverable and map to
/// 4xx responses with a stable `code`. Storage and other internal
/// failures map to 5xx without leaking details.
#[derive(Debug, Error)]
pub enum AppError {
    /// Missing or self-referential input (400)
    #[error("Validation error: {0}")]
    Validation(String),

    /// Missing user, content or request (404)
    #[error("{0} not found")]
    NotFound(String),

    /// Duplicate request, already friends, already (un)blocked (409)
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Acting on another actor's content or relationship (403)
    #[error("Access denied: {0}")]
    Forbidden(String),

    /// Authentication required (401)
    #[error("Authentication required")]
    Unauthorized,

    /// Signature verification failed (401)
    #[error("Invalid signature")]
    InvalidSignature,

    /// Database error (500)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Configuration error (500)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Token signing error (500)
    #[error("Encryption error: {0}")]
    Encryption(String),

    /// Internal server error (500)
    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    /// Stable machine-readable code for the error body and metrics
    pub fn code(&self) -> &'static str {
        match self {
            AppError::Validation(_) => "validation",
            AppError::NotFound(_) => "not_found",
            AppError::Conflict(_) => "conflict",
            AppError::Forbidden(_) => "forbidden",
            AppError::Unauthorized => "unauthorized",
            AppError::InvalidSignature => "invalid_signature",
            AppError::Database(_) => "database",
            AppError::Config(_) => "config",
            AppError::Encryption(_) => "encryption",
            AppError::Internal(_) => "internal",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::Unauthorized | AppError::InvalidSignature => StatusCode::UNAUTHORIZED,
            AppError::Database(_)
            | AppError::Config(_)
            | AppError::Encryption(_)
            | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        AppError::Config(err.to_string())
    }
}

impl From<axum::extract::rejection::JsonRejection> for AppError {
    fn from(rejection: axum::extract::rejection::JsonRejection) -> Self {
        AppError::Validation(rejection.body_text())
    }
}

impl IntoResponse for AppError {
    /// Convert error to HTTP response
    ///
    /// Body: `{"status": false, "error": <message>, "code": <code>}`.
    fn into_response(self) -> Response {
        use axum::Json;

        let status = self.status();
        let error_type = self.code();
        let error_message = match &self {
            AppError::Validation(msg) | AppError::Conflict(msg) | AppError::Forbidden(msg) => {
                msg.clone()
            }
            AppError::Database(error) => {
                tracing::error!(%error, "Database error");
                "Database error".to_string()
            }
            AppError::Internal(error) => {
                tracing::error!(%error, "Internal error");
                "Internal server error".to_string()
            }
            _ => self.to_string(),
        };

        // Record error metric
        use crate::metrics::ERRORS_TOTAL;
        ERRORS_TOTAL.with_label_values(&[error_type]).inc();

        let body = Json(serde_json::json!({
            "status": false,
            "error": error_message,
            "code": error_type,
        }));

        (status, body).into_response()
    }
}

/// Result type alias using AppError
pub type Result<T> = std::result::Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn taxonomy_maps_to_http_status() {
        assert_eq!(
            AppError::Validation("self".into()).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AppError::NotFound("User".into()).status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            AppError::Conflict("dup".into()).status(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            AppError::Forbidden("blocked".into()).status(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(AppError::Unauthorized.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            AppError::Internal(anyhow::anyhow!("boom")).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn not_found_message_names_the_resource() {
        assert_eq!(
            AppError::NotFound("Friend request".into()).to_string(),
            "Friend request not found"
        );
    }
}
