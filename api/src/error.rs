use std::fmt::Display;

use attune_core::error::{self, ApiError};
use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use crate::auth::AuthFailure;
use crate::bridge::RetriesExhausted;
use crate::seed::{SeedError, StoreError};

/// Internal error type that converts to structured API responses
#[derive(Debug)]
pub enum AppError {
    /// Validation error (400)
    Validation {
        message: String,
        field: Option<String>,
        received: Option<serde_json::Value>,
        docs_hint: Option<String>,
    },
    /// Missing, malformed, invalid or expired credential (401)
    Unauthorized(AuthFailure),
    /// Email/password rejected at sign-in (401)
    InvalidCredentials { message: String },
    /// Authenticated, but not allowed to touch this resource (403)
    Forbidden {
        message: String,
        docs_hint: Option<String>,
    },
    /// Resource or account absent (404)
    NotFound { resource: String },
    /// External computation kept failing (502)
    RetriesExhausted { attempts: u32, cause: String },
    /// Guest demo data could not be written (503)
    SeedingFailed { attempts: u32, cause: String },
    /// Database error (500)
    Database(sqlx::Error),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let request_id = uuid::Uuid::now_v7().to_string();

        let api_error = |code: &str, message: String, docs_hint: Option<String>| ApiError {
            error: code.to_string(),
            message,
            field: None,
            received: None,
            request_id: request_id.clone(),
            docs_hint,
        };

        let (status, body) = match self {
            AppError::Validation {
                message,
                field,
                received,
                docs_hint,
            } => (
                StatusCode::BAD_REQUEST,
                ApiError {
                    field,
                    received,
                    ..api_error(error::codes::VALIDATION_FAILED, message, docs_hint)
                },
            ),
            AppError::Unauthorized(failure) => {
                let (code, hint) = match failure {
                    AuthFailure::MissingOrMalformedCredential => (
                        error::codes::MISSING_OR_MALFORMED_CREDENTIAL,
                        "Include 'Authorization: Bearer <token>'.",
                    ),
                    AuthFailure::InvalidOrExpiredCredential => (
                        error::codes::INVALID_OR_EXPIRED_CREDENTIAL,
                        "Sign in again to obtain a fresh access token.",
                    ),
                };
                (
                    StatusCode::UNAUTHORIZED,
                    api_error(code, failure.to_string(), Some(hint.to_string())),
                )
            }
            AppError::InvalidCredentials { message } => (
                StatusCode::UNAUTHORIZED,
                api_error(error::codes::INVALID_CREDENTIALS, message, None),
            ),
            AppError::Forbidden { message, docs_hint } => (
                StatusCode::FORBIDDEN,
                api_error(error::codes::FORBIDDEN, message, docs_hint),
            ),
            AppError::NotFound { resource } => (
                StatusCode::NOT_FOUND,
                api_error(
                    error::codes::NOT_FOUND,
                    format!("{resource} not found"),
                    None,
                ),
            ),
            AppError::RetriesExhausted { attempts, cause } => {
                tracing::error!(attempts, cause = %cause, "external computation failed");
                (
                    StatusCode::BAD_GATEWAY,
                    api_error(
                        error::codes::RETRIES_EXHAUSTED,
                        format!("External computation failed after {attempts} attempts: {cause}"),
                        Some("The request is safe to retry later.".to_string()),
                    ),
                )
            }
            AppError::SeedingFailed { attempts, cause } => {
                tracing::error!(attempts, cause = %cause, "guest seeding failed");
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    api_error(
                        error::codes::SEEDING_FAILED,
                        format!("Demo account could not be prepared after {attempts} attempts"),
                        Some("Retry guest login; progress so far is kept.".to_string()),
                    ),
                )
            }
            AppError::Database(err) => {
                tracing::error!("Database error: {:?}", err);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    api_error(
                        error::codes::INTERNAL_ERROR,
                        "An internal error occurred".to_string(),
                        None,
                    ),
                )
            }
        };

        (status, Json(body)).into_response()
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        AppError::Database(err)
    }
}

impl From<AuthFailure> for AppError {
    fn from(failure: AuthFailure) -> Self {
        AppError::Unauthorized(failure)
    }
}

impl<E: Display> From<RetriesExhausted<E>> for AppError {
    fn from(err: RetriesExhausted<E>) -> Self {
        AppError::RetriesExhausted {
            attempts: err.attempts,
            cause: err.last.to_string(),
        }
    }
}

impl From<SeedError> for AppError {
    fn from(err: SeedError) -> Self {
        match err {
            SeedError::Store(StoreError::Database(db)) => AppError::Database(db),
            SeedError::SeedingFailed(exhausted) => AppError::SeedingFailed {
                attempts: exhausted.attempts,
                cause: exhausted.last.to_string(),
            },
        }
    }
}
