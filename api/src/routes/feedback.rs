use attune_core::models::{FeedbackRequest, StatusResponse};
use axum::extract::State;
use axum::routing::post;
use axum::{Json, Router};
use uuid::Uuid;

use crate::auth::AuthenticatedUser;
use crate::error::AppError;
use crate::extract::{AppJson, invalid_field};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/v1/feedback/intervention", post(submit_intervention_feedback))
}

fn validate_feedback(req: &FeedbackRequest) -> Result<Uuid, AppError> {
    if !(1..=5).contains(&req.rating) {
        return Err(invalid_field(
            "rating",
            "rating must be between 1 and 5",
            Some(serde_json::json!(req.rating)),
        ));
    }
    Uuid::parse_str(&req.intervention_id).map_err(|_| {
        invalid_field(
            "interventionId",
            "interventionId must be a UUID",
            Some(serde_json::Value::String(req.intervention_id.clone())),
        )
    })
}

/// Rate an intervention (1-5) with optional free text.
#[utoipa::path(
    post,
    path = "/v1/feedback/intervention",
    request_body = FeedbackRequest,
    responses(
        (status = 200, description = "Feedback saved", body = StatusResponse),
        (status = 400, description = "Invalid rating or id", body = attune_core::error::ApiError),
        (status = 401, description = "Not authenticated", body = attune_core::error::ApiError),
        (status = 404, description = "Intervention not found for this user", body = attune_core::error::ApiError)
    ),
    security(("bearer_auth" = [])),
    tag = "feedback"
)]
pub async fn submit_intervention_feedback(
    user: AuthenticatedUser,
    State(state): State<AppState>,
    AppJson(req): AppJson<FeedbackRequest>,
) -> Result<Json<StatusResponse>, AppError> {
    let intervention_id = validate_feedback(&req)?;

    let result = sqlx::query(
        "UPDATE interventions \
         SET user_rating = $3, user_feedback = $4, feedback_at = NOW() \
         WHERE id = $1 AND user_id = $2",
    )
    .bind(intervention_id)
    .bind(user.user_id())
    .bind(req.rating)
    .bind(&req.feedback)
    .execute(&state.db)
    .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound {
            resource: format!("Intervention {intervention_id}"),
        });
    }

    tracing::info!(
        user_id = %user.identity,
        intervention_id = %intervention_id,
        rating = req.rating,
        "intervention feedback saved"
    );

    Ok(Json(StatusResponse::new("saved")))
}
