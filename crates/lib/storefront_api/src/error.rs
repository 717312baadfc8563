//! Application error types.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use storefront_core::auth::{AuthError, InitDataError, TokenError};
use thiserror::Error;
use tracing::{debug, error, warn};

use crate::middleware::auth::AccessError;
use crate::models::ErrorResponse;

/// Convenience alias for handler return types.
pub type AppResult<T> = Result<T, AppError>;

/// Message returned for every failed identity check. Callers learn nothing
/// about which check failed.
pub const REAUTHENTICATE_MESSAGE: &str = "could not verify your session";

/// Application-level errors with HTTP status mapping.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Store unavailable: {0}")]
    DbUnavailable(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Internal server error")]
    Internal(String),
}

impl AppError {
    /// Generic 401 that tells the client to restart authentication.
    pub fn reauthenticate() -> Self {
        AppError::Unauthorized(REAUTHENTICATE_MESSAGE.into())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error, message) = match &self {
            AppError::Validation(m) => (StatusCode::BAD_REQUEST, "validation_error", m.as_str()),
            AppError::NotFound(m) => (StatusCode::NOT_FOUND, "not_found", m.as_str()),
            AppError::DbUnavailable(_) => (
                StatusCode::SERVICE_UNAVAILABLE,
                "store_unavailable",
                "Service temporarily unavailable",
            ),
            AppError::Unauthorized(m) => (StatusCode::UNAUTHORIZED, "unauthorized", m.as_str()),
            AppError::Forbidden(m) => (StatusCode::FORBIDDEN, "forbidden", m.as_str()),
            AppError::Internal(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal_error",
                "Internal server error",
            ),
        };
        match &self {
            AppError::DbUnavailable(detail) => warn!(%detail, "store unavailable"),
            AppError::Internal(detail) => error!(%detail, "internal error"),
            _ => {}
        }
        let body = Json(ErrorResponse {
            error: error.to_string(),
            message: message.to_string(),
            reauthenticate: status == StatusCode::UNAUTHORIZED,
        });
        (status, body).into_response()
    }
}

impl From<sqlx::Error> for AppError {
    fn from(e: sqlx::Error) -> Self {
        match e {
            sqlx::Error::RowNotFound => AppError::NotFound("row not found".into()),
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
                AppError::DbUnavailable(e.to_string())
            }
            _ => AppError::Internal(e.to_string()),
        }
    }
}

impl From<AuthError> for AppError {
    fn from(e: AuthError) -> Self {
        match e {
            AuthError::TokenError(TokenError::MissingSecret) => {
                AppError::Internal("admin session secret is not configured".into())
            }
            AuthError::TokenError(kind) => {
                debug!(kind = kind.kind(), "token rejected");
                AppError::reauthenticate()
            }
            AuthError::DbError(e) => match e {
                sqlx::Error::RowNotFound => AppError::NotFound("row not found".into()),
                other => AppError::DbUnavailable(other.to_string()),
            },
            AuthError::StoreUnavailable(msg) => AppError::DbUnavailable(msg),
            AuthError::Internal(msg) => AppError::Internal(msg),
        }
    }
}

impl From<InitDataError> for AppError {
    fn from(e: InitDataError) -> Self {
        debug!(kind = e.kind(), "launch data rejected");
        match e {
            InitDataError::MissingSecret => {
                AppError::Internal("bot token is not configured".into())
            }
            _ => AppError::reauthenticate(),
        }
    }
}

impl From<AccessError> for AppError {
    fn from(e: AccessError) -> Self {
        match e {
            AccessError::Unauthorized => AppError::reauthenticate(),
            AccessError::Forbidden => AppError::Forbidden("admin role required".into()),
            AccessError::Store(e) => AppError::from(e),
        }
    }
}
