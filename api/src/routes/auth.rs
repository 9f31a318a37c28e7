use attune_core::auth::extract_bearer;
use attune_core::models::{
    AuthResponse, GuestLoginResponse, LoginRequest, SignupRequest, StatusResponse,
};
use axum::extract::State;
use axum::http::HeaderMap;
use axum::http::header::AUTHORIZATION;
use axum::routing::post;
use axum::{Json, Router};

use crate::auth::AuthFailure;
use crate::error::AppError;
use crate::extract::{AppJson, invalid_field};
use crate::seed::{DEMO_NAME, SeedScope};
use crate::state::AppState;

pub fn guest_router() -> Router<AppState> {
    Router::new().route("/v1/auth/guest", post(guest_login))
}

pub fn signup_router() -> Router<AppState> {
    Router::new().route("/v1/auth/signup", post(signup))
}

pub fn login_router() -> Router<AppState> {
    Router::new().route("/v1/auth/login", post(login))
}

pub fn logout_router() -> Router<AppState> {
    Router::new().route("/v1/auth/logout", post(logout))
}

fn authorization_header(headers: &HeaderMap) -> Option<&str> {
    headers.get(AUTHORIZATION).and_then(|v| v.to_str().ok())
}

// ──────────────────────────────────────────────
// POST /v1/auth/guest
// ──────────────────────────────────────────────

/// Create or resume the "Alex" demo account with pre-seeded data.
///
/// With a valid bearer token (e.g. from an anonymous sign-in) the demo data is
/// seeded for that identity; otherwise the reserved fallback account is used.
#[utoipa::path(
    post,
    path = "/v1/auth/guest",
    responses(
        (status = 200, description = "Demo account ready", body = GuestLoginResponse),
        (status = 503, description = "Seeding failed after retries", body = attune_core::error::ApiError)
    ),
    tag = "auth"
)]
pub async fn guest_login(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<GuestLoginResponse>, AppError> {
    let header = authorization_header(&headers);
    let scope = match state.verifier.verify(header).await {
        Ok(identity) => SeedScope::for_identity(&identity),
        Err(failure) => {
            if header.is_some() {
                tracing::info!(
                    reason = %failure,
                    "guest login credential not accepted, using demo fallback"
                );
            }
            SeedScope::demo_fallback()
        }
    };

    let outcome = state.seeder.ensure_seeded(&scope).await?;

    tracing::info!(
        user_id = %outcome.user_id,
        principal = scope.principal(),
        fallback = outcome.fallback,
        previous_state = ?outcome.previous,
        seeded = outcome.seeded,
        "guest login"
    );

    Ok(Json(GuestLoginResponse {
        user_id: outcome.user_id,
        name: DEMO_NAME.to_string(),
        is_guest: true,
        has_profile: outcome.has_profile,
    }))
}

// ──────────────────────────────────────────────
// POST /v1/auth/signup
// ──────────────────────────────────────────────

#[utoipa::path(
    post,
    path = "/v1/auth/signup",
    request_body = SignupRequest,
    responses(
        (status = 200, description = "Account created", body = AuthResponse),
        (status = 400, description = "Validation error or provider refused", body = attune_core::error::ApiError)
    ),
    tag = "auth"
)]
pub async fn signup(
    State(state): State<AppState>,
    AppJson(req): AppJson<SignupRequest>,
) -> Result<Json<AuthResponse>, AppError> {
    if !req.email.contains('@') {
        return Err(invalid_field(
            "email",
            "email must be a valid address",
            Some(serde_json::Value::String(req.email)),
        ));
    }
    if req.password.len() < 6 {
        return Err(invalid_field(
            "password",
            "password must be at least 6 characters",
            None,
        ));
    }
    if req.name.trim().is_empty() {
        return Err(invalid_field("name", "name must not be empty", None));
    }

    let session = state
        .identity_provider
        .sign_up(&req.email, &req.password, &req.name)
        .await
        .map_err(|e| AppError::Validation {
            message: format!("Signup failed: {e}"),
            field: None,
            received: None,
            docs_hint: Some("The email may already be registered.".to_string()),
        })?;

    sqlx::query(
        "INSERT INTO users (id, email, name, is_guest) VALUES ($1, $2, $3, FALSE) \
         ON CONFLICT (id) DO NOTHING",
    )
    .bind(&session.subject.id)
    .bind(&req.email)
    .bind(&req.name)
    .execute(&state.db)
    .await?;

    Ok(Json(AuthResponse {
        user_id: session.subject.id,
        name: req.name,
        is_guest: false,
        has_profile: false,
        access_token: session.access_token.unwrap_or_default(),
    }))
}

// ──────────────────────────────────────────────
// POST /v1/auth/login
// ──────────────────────────────────────────────

#[utoipa::path(
    post,
    path = "/v1/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Signed in", body = AuthResponse),
        (status = 401, description = "Invalid credentials", body = attune_core::error::ApiError)
    ),
    tag = "auth"
)]
pub async fn login(
    State(state): State<AppState>,
    AppJson(req): AppJson<LoginRequest>,
) -> Result<Json<AuthResponse>, AppError> {
    let session = state
        .identity_provider
        .sign_in_with_password(&req.email, &req.password)
        .await
        .map_err(|e| {
            tracing::info!(error = %e, "password sign-in rejected");
            AppError::InvalidCredentials {
                message: "Invalid credentials".to_string(),
            }
        })?;

    let access_token = session
        .access_token
        .ok_or_else(|| AppError::InvalidCredentials {
            message: "Account is not confirmed yet".to_string(),
        })?;

    let has_profile: bool = sqlx::query_scalar(
        "SELECT EXISTS(SELECT 1 FROM cognitive_profiles WHERE user_id = $1)",
    )
    .bind(&session.subject.id)
    .fetch_one(&state.db)
    .await?;

    let name = session
        .subject
        .display_name()
        .or(session.subject.email.as_deref())
        .unwrap_or("User")
        .to_string();

    Ok(Json(AuthResponse {
        name,
        user_id: session.subject.id,
        is_guest: false,
        has_profile,
        access_token,
    }))
}

// ──────────────────────────────────────────────
// POST /v1/auth/logout
// ──────────────────────────────────────────────

/// Sign out at the identity provider. Best-effort: provider failures are
/// logged and the call still succeeds.
#[utoipa::path(
    post,
    path = "/v1/auth/logout",
    responses(
        (status = 200, description = "Signed out", body = StatusResponse),
        (status = 401, description = "Missing authorization header", body = attune_core::error::ApiError)
    ),
    security(("bearer_auth" = [])),
    tag = "auth"
)]
pub async fn logout(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<StatusResponse>, AppError> {
    let token = extract_bearer(authorization_header(&headers))
        .ok_or(AuthFailure::MissingOrMalformedCredential)?;

    if let Err(e) = state.identity_provider.sign_out(token).await {
        tracing::warn!(error = %e, "sign-out at identity provider failed");
    }

    Ok(Json(StatusResponse::new("logged_out")))
}
