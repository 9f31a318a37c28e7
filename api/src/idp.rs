//! Identity provider boundary.
//!
//! The API never validates credentials itself; it asks a GoTrue-compatible
//! auth service. Handlers and the verifier only see the [`IdentityProvider`]
//! trait so tests can swap in fakes.

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::json;
use url::Url;

use crate::config::IdentityProviderConfig;

/// Subject as reported by the identity provider.
#[derive(Debug, Clone, Deserialize)]
pub struct Subject {
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub user_metadata: serde_json::Value,
}

impl Subject {
    pub fn display_name(&self) -> Option<&str> {
        self.user_metadata.get("name").and_then(|v| v.as_str())
    }
}

/// Result of a sign-up or password sign-in.
///
/// `access_token` is `None` when the provider requires email confirmation
/// before issuing a session.
#[derive(Debug, Clone)]
pub struct Session {
    pub subject: Subject,
    pub access_token: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("identity provider request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("identity provider rejected the request ({status}): {message}")]
    Rejected { status: u16, message: String },
    #[error("identity provider response was malformed: {0}")]
    Malformed(String),
    #[error("identity provider operation not configured: {0}")]
    NotConfigured(&'static str),
}

#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Resolve a bearer token to its subject. `Ok(None)` means the provider
    /// does not recognise the token.
    async fn resolve_subject(&self, token: &str) -> Result<Option<Subject>, ProviderError>;

    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        name: &str,
    ) -> Result<Session, ProviderError>;

    async fn sign_in_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<Session, ProviderError>;

    async fn sign_out(&self, token: &str) -> Result<(), ProviderError>;

    /// Remove the subject from the provider. Requires the service key.
    async fn delete_subject(&self, user_id: &str) -> Result<(), ProviderError>;

    /// Cheap reachability check used by `/health`.
    async fn ping(&self) -> Result<(), ProviderError>;
}

/// `reqwest` client for a GoTrue (Supabase Auth) REST endpoint.
pub struct GoTrueProvider {
    http: reqwest::Client,
    base_url: Url,
    anon_key: String,
    service_key: Option<String>,
}

impl GoTrueProvider {
    pub fn new(config: &IdentityProviderConfig) -> Result<Self, ProviderError> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()?;
        Ok(Self {
            http,
            base_url: with_trailing_slash(config.url.clone()),
            anon_key: config.anon_key.clone(),
            service_key: config.service_key.clone(),
        })
    }

    fn endpoint(&self, path: &str) -> Result<Url, ProviderError> {
        self.base_url
            .join(path)
            .map_err(|e| ProviderError::Malformed(format!("invalid endpoint '{path}': {e}")))
    }
}

#[async_trait]
impl IdentityProvider for GoTrueProvider {
    async fn resolve_subject(&self, token: &str) -> Result<Option<Subject>, ProviderError> {
        let response = self
            .http
            .get(self.endpoint("auth/v1/user")?)
            .header("apikey", &self.anon_key)
            .bearer_auth(token)
            .send()
            .await?;

        match response.status() {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN | StatusCode::NOT_FOUND => Ok(None),
            status if status.is_success() => Ok(Some(response.json::<Subject>().await?)),
            _ => Err(rejection(response).await),
        }
    }

    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        name: &str,
    ) -> Result<Session, ProviderError> {
        let response = self
            .http
            .post(self.endpoint("auth/v1/signup")?)
            .header("apikey", &self.anon_key)
            .json(&json!({
                "email": email,
                "password": password,
                "data": { "name": name },
            }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(rejection(response).await);
        }
        parse_session(response.json().await?)
    }

    async fn sign_in_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<Session, ProviderError> {
        let mut url = self.endpoint("auth/v1/token")?;
        url.query_pairs_mut().append_pair("grant_type", "password");

        let response = self
            .http
            .post(url)
            .header("apikey", &self.anon_key)
            .json(&json!({ "email": email, "password": password }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(rejection(response).await);
        }
        parse_session(response.json().await?)
    }

    async fn sign_out(&self, token: &str) -> Result<(), ProviderError> {
        let response = self
            .http
            .post(self.endpoint("auth/v1/logout")?)
            .header("apikey", &self.anon_key)
            .bearer_auth(token)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(rejection(response).await);
        }
        Ok(())
    }

    async fn delete_subject(&self, user_id: &str) -> Result<(), ProviderError> {
        let service_key = self
            .service_key
            .as_deref()
            .ok_or(ProviderError::NotConfigured("IDENTITY_PROVIDER_SERVICE_KEY"))?;

        let response = self
            .http
            .delete(self.endpoint(&format!("auth/v1/admin/users/{user_id}"))?)
            .header("apikey", service_key)
            .bearer_auth(service_key)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(rejection(response).await);
        }
        Ok(())
    }

    async fn ping(&self) -> Result<(), ProviderError> {
        let response = self
            .http
            .get(self.endpoint("auth/v1/health")?)
            .header("apikey", &self.anon_key)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(rejection(response).await);
        }
        Ok(())
    }
}

async fn rejection(response: reqwest::Response) -> ProviderError {
    let status = response.status().as_u16();
    let message = response.text().await.unwrap_or_default();
    ProviderError::Rejected { status, message }
}

/// GoTrue answers sign-up/sign-in either with a session (`access_token` + `user`)
/// or, when confirmation is pending, with the bare user object.
fn parse_session(body: serde_json::Value) -> Result<Session, ProviderError> {
    let access_token = body
        .get("access_token")
        .and_then(|v| v.as_str())
        .map(str::to_owned);
    let user = body.get("user").cloned().unwrap_or(body);
    let subject: Subject = serde_json::from_value(user)
        .map_err(|e| ProviderError::Malformed(format!("missing user in session: {e}")))?;
    Ok(Session {
        subject,
        access_token,
    })
}

/// `Url::join` replaces the last path segment unless the base ends in `/`.
fn with_trailing_slash(mut url: Url) -> Url {
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    url
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoints_keep_base_path() {
        let base = with_trailing_slash(Url::parse("https://auth.example.com/project").unwrap());
        assert_eq!(
            base.join("auth/v1/user").unwrap().as_str(),
            "https://auth.example.com/project/auth/v1/user"
        );

        let root = with_trailing_slash(Url::parse("https://auth.example.com").unwrap());
        assert_eq!(
            root.join("auth/v1/user").unwrap().as_str(),
            "https://auth.example.com/auth/v1/user"
        );
    }

    #[test]
    fn parse_session_reads_token_and_nested_user() {
        let session = parse_session(json!({
            "access_token": "at-123",
            "user": { "id": "u-1", "email": "a@b.c", "user_metadata": { "name": "Sam" } }
        }))
        .unwrap();
        assert_eq!(session.access_token.as_deref(), Some("at-123"));
        assert_eq!(session.subject.id, "u-1");
        assert_eq!(session.subject.display_name(), Some("Sam"));
    }

    #[test]
    fn parse_session_accepts_bare_user_when_confirmation_pending() {
        let session = parse_session(json!({ "id": "u-2", "email": "x@y.z" })).unwrap();
        assert_eq!(session.access_token, None);
        assert_eq!(session.subject.id, "u-2");
        assert_eq!(session.subject.display_name(), None);
    }

    #[test]
    fn parse_session_rejects_body_without_user() {
        let err = parse_session(json!({ "access_token": "at" })).unwrap_err();
        assert!(matches!(err, ProviderError::Malformed(_)));
    }
}
