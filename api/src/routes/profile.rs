use attune_core::models::{ProfileResponse, RadarDimension};
use axum::extract::{Path, State};
use axum::routing::get;
use axum::{Json, Router};
use sqlx::types::Json as SqlJson;

use crate::auth::AuthenticatedUser;
use crate::error::AppError;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/v1/profile/{user_id}", get(get_profile))
}

/// Latest cognitive profile for the caller.
#[utoipa::path(
    get,
    path = "/v1/profile/{user_id}",
    params(("user_id" = String, Path, description = "Must equal the authenticated user")),
    responses(
        (status = 200, description = "Most recent profile", body = ProfileResponse),
        (status = 401, description = "Not authenticated", body = attune_core::error::ApiError),
        (status = 403, description = "Not your profile", body = attune_core::error::ApiError),
        (status = 404, description = "No profile yet", body = attune_core::error::ApiError)
    ),
    security(("bearer_auth" = [])),
    tag = "profile"
)]
pub async fn get_profile(
    user: AuthenticatedUser,
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<Json<ProfileResponse>, AppError> {
    user.require_owner(&user_id, "read_profile")?;

    let row: Option<(SqlJson<Vec<RadarDimension>>, Vec<String>, Option<String>)> =
        sqlx::query_as(
            "SELECT dimensions, profile_tags, summary FROM cognitive_profiles \
             WHERE user_id = $1 ORDER BY created_at DESC LIMIT 1",
        )
        .bind(&user_id)
        .fetch_optional(&state.db)
        .await?;

    let (dimensions, profile_tags, summary) = row.ok_or_else(|| AppError::NotFound {
        resource: format!("Cognitive profile for user {user_id}"),
    })?;

    Ok(Json(ProfileResponse {
        dimensions: dimensions.0,
        profile_tags,
        summary: summary.unwrap_or_default(),
    }))
}
