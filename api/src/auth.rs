use std::fmt;
use std::sync::Arc;

use attune_core::auth::{extract_bearer, token_fingerprint};
use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;

use crate::error::AppError;
use crate::idp::IdentityProvider;
use crate::state::AppState;

/// Verified subject identifier.
///
/// Only [`IdentityVerifier::verify`] produces one, and only for a credential the
/// identity provider accepted.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Identity(String);

impl Identity {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    #[cfg(test)]
    pub(crate) fn for_tests(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Caller-visible authentication failures. Provider outages and rejected
/// tokens deliberately share one variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum AuthFailure {
    #[error("Missing or invalid authorization header")]
    MissingOrMalformedCredential,
    #[error("Invalid or expired token")]
    InvalidOrExpiredCredential,
}

#[derive(Clone)]
pub struct IdentityVerifier {
    provider: Arc<dyn IdentityProvider>,
}

impl IdentityVerifier {
    pub fn new(provider: Arc<dyn IdentityProvider>) -> Self {
        Self { provider }
    }

    /// Validate a raw `Authorization` header value. Never retries.
    pub async fn verify(&self, raw_header: Option<&str>) -> Result<Identity, AuthFailure> {
        let token = extract_bearer(raw_header).ok_or(AuthFailure::MissingOrMalformedCredential)?;

        match self.provider.resolve_subject(token).await {
            Ok(Some(subject)) if !subject.id.is_empty() => Ok(Identity(subject.id)),
            Ok(_) => {
                tracing::debug!(
                    token = %token_fingerprint(token),
                    "identity provider did not accept token"
                );
                Err(AuthFailure::InvalidOrExpiredCredential)
            }
            Err(err) => {
                tracing::warn!(
                    token = %token_fingerprint(token),
                    error = %err,
                    "identity provider call failed"
                );
                Err(AuthFailure::InvalidOrExpiredCredential)
            }
        }
    }
}

/// Authenticated caller, extracted from `Authorization: Bearer <token>`.
///
/// Extraction runs the verifier before the handler body, so every protected
/// handler starts with a settled identity.
#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    pub identity: Identity,
}

impl AuthenticatedUser {
    pub fn user_id(&self) -> &str {
        self.identity.as_str()
    }

    /// Ownership check for `/{user_id}` style resources.
    pub fn require_owner(&self, resource_user_id: &str, operation: &str) -> Result<(), AppError> {
        if self.identity.as_str() == resource_user_id {
            tracing::info!(
                user_id = %self.identity,
                operation = operation,
                decision = "allow",
                "ownership decision"
            );
            return Ok(());
        }

        tracing::warn!(
            user_id = %self.identity,
            resource_user_id = resource_user_id,
            operation = operation,
            decision = "deny",
            "ownership decision"
        );
        Err(AppError::Forbidden {
            message: format!("Operation '{operation}' is only allowed on your own data"),
            docs_hint: Some(
                "Use the userId returned at login; the path must match the authenticated user."
                    .to_string(),
            ),
        })
    }
}

impl FromRequestParts<AppState> for AuthenticatedUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok());
        let identity = state.verifier.verify(header).await?;
        Ok(AuthenticatedUser { identity })
    }
}
