use attune_core::models::{
    ASRS_POSITIVE_THRESHOLD, AsrsAnswer, ScreeningInput, ScreeningOutput, ScreeningRequest,
    ScreeningResponse,
};
use axum::extract::State;
use axum::routing::post;
use axum::{Json, Router};
use sqlx::types::Json as SqlJson;
use uuid::Uuid;

use crate::auth::AuthenticatedUser;
use crate::error::AppError;
use crate::extract::{AppJson, invalid_field};
use crate::seed::answer_label;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/v1/screening/evaluate", post(evaluate_screening))
}

fn validate_answers(answers: &[AsrsAnswer]) -> Result<(), AppError> {
    if answers.is_empty() {
        return Err(invalid_field("answers", "at least one answer is required", None));
    }
    for (i, answer) in answers.iter().enumerate() {
        if !(0..=4).contains(&answer.score) {
            return Err(invalid_field(
                &format!("answers[{i}].score"),
                "score must be between 0 (Never) and 4 (Very Often)",
                Some(serde_json::json!(answer.score)),
            ));
        }
        if answer.question_index < 0 {
            return Err(invalid_field(
                &format!("answers[{i}].questionIndex"),
                "questionIndex must not be negative",
                Some(serde_json::json!(answer.question_index)),
            ));
        }
    }
    Ok(())
}

/// Total and positive flag, preferring what the agent reported.
fn score_screening(answers: &[AsrsAnswer], output: &ScreeningOutput) -> (i32, bool) {
    let total = output
        .asrs_total_score
        .unwrap_or_else(|| answers.iter().map(|a| a.score).sum());
    let positive = output
        .is_positive_screen
        .unwrap_or(total >= ASRS_POSITIVE_THRESHOLD);
    (total, positive)
}

/// Run the ASRS screening agent and store the resulting cognitive profile.
#[utoipa::path(
    post,
    path = "/v1/screening/evaluate",
    request_body = ScreeningRequest,
    responses(
        (status = 200, description = "Profile computed", body = ScreeningResponse),
        (status = 400, description = "Invalid answers", body = attune_core::error::ApiError),
        (status = 401, description = "Not authenticated", body = attune_core::error::ApiError),
        (status = 502, description = "Screening agent failed after retries", body = attune_core::error::ApiError)
    ),
    security(("bearer_auth" = [])),
    tag = "screening"
)]
pub async fn evaluate_screening(
    user: AuthenticatedUser,
    State(state): State<AppState>,
    AppJson(req): AppJson<ScreeningRequest>,
) -> Result<Json<ScreeningResponse>, AppError> {
    validate_answers(&req.answers)?;
    let user_id = user.user_id().to_string();

    let mut tx = state.db.begin().await?;
    for answer in &req.answers {
        sqlx::query(
            "INSERT INTO asrs_responses \
             (id, user_id, question_index, question_text, answer_label, score) \
             VALUES ($1, $2, $3, $4, $5, $6) \
             ON CONFLICT (user_id, question_index) DO UPDATE SET \
               question_text = EXCLUDED.question_text, \
               answer_label = EXCLUDED.answer_label, \
               score = EXCLUDED.score, \
               created_at = NOW()",
        )
        .bind(Uuid::now_v7())
        .bind(&user_id)
        .bind(answer.question_index)
        .bind(&answer.question_text)
        .bind(answer_label(answer.score))
        .bind(answer.score)
        .execute(&mut *tx)
        .await?;
    }
    tx.commit().await?;

    let agent = state.agent.clone();
    let input = ScreeningInput {
        user_id: user_id.clone(),
        answers: req.answers.clone(),
    };
    let output = state.retry.run(move || agent.screen(&input)).await?;

    let (total, positive) = score_screening(&req.answers, &output);
    let profile_id = Uuid::now_v7();

    let mut tx = state.db.begin().await?;
    sqlx::query(
        "INSERT INTO cognitive_profiles \
         (id, user_id, dimensions, profile_tags, summary, asrs_total_score, is_positive_screen) \
         VALUES ($1, $2, $3, $4, $5, $6, $7)",
    )
    .bind(profile_id)
    .bind(&user_id)
    .bind(SqlJson(&output.dimensions))
    .bind(&output.profile_tags)
    .bind(&output.summary)
    .bind(total)
    .bind(positive)
    .execute(&mut *tx)
    .await?;

    sqlx::query("UPDATE users SET cognitive_profile_summary = $2 WHERE id = $1")
        .bind(&user_id)
        .bind(&output.summary)
        .execute(&mut *tx)
        .await?;
    tx.commit().await?;

    tracing::info!(
        user_id = %user_id,
        profile_id = %profile_id,
        asrs_total_score = total,
        is_positive_screen = positive,
        "screening evaluated"
    );

    Ok(Json(ScreeningResponse {
        profile_id: profile_id.to_string(),
        dimensions: output.dimensions,
        profile_tags: output.profile_tags,
        summary: output.summary,
        asrs_total_score: total,
        is_positive_screen: positive,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{FakeIdentityProvider, MemoryBackend, test_state};
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use std::sync::Arc;
    use tower::ServiceExt;

    fn answer(index: i32, score: i32) -> AsrsAnswer {
        AsrsAnswer {
            question_index: index,
            question_text: format!("Question {index}"),
            score,
        }
    }

    fn output(total: Option<i32>, positive: Option<bool>) -> ScreeningOutput {
        ScreeningOutput {
            dimensions: vec![],
            profile_tags: vec![],
            summary: String::new(),
            asrs_total_score: total,
            is_positive_screen: positive,
        }
    }

    #[test]
    fn score_defaults_to_answer_sum_and_threshold() {
        let answers: Vec<_> = (0..6).map(|i| answer(i, 3)).collect();
        assert_eq!(score_screening(&answers, &output(None, None)), (18, true));

        let low: Vec<_> = (0..6).map(|i| answer(i, 2)).collect();
        assert_eq!(score_screening(&low, &output(None, None)), (12, false));
    }

    #[test]
    fn score_prefers_agent_values() {
        let answers = vec![answer(0, 4)];
        assert_eq!(score_screening(&answers, &output(Some(9), Some(true))), (9, true));
    }

    #[test]
    fn threshold_is_inclusive() {
        let answers = vec![answer(0, 4), answer(1, 4), answer(2, 4), answer(3, 2)];
        assert_eq!(score_screening(&answers, &output(None, None)), (14, true));
    }

    #[test]
    fn validate_rejects_out_of_range_scores() {
        let err = validate_answers(&[answer(0, 2), answer(1, 5)]).unwrap_err();
        match err {
            AppError::Validation { field, .. } => {
                assert_eq!(field.as_deref(), Some("answers[1].score"))
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(validate_answers(&[]).is_err());
        assert!(validate_answers(&[answer(0, 0), answer(1, 4)]).is_ok());
    }

    async fn evaluate(auth: Option<&str>, body: serde_json::Value) -> StatusCode {
        let provider = Arc::new(FakeIdentityProvider::default().with_token("tok", "user-1"));
        let app = router().with_state(test_state(provider, Arc::new(MemoryBackend::default())));

        let mut builder = Request::builder()
            .method("POST")
            .uri("/v1/screening/evaluate")
            .header("content-type", "application/json");
        if let Some(auth) = auth {
            builder = builder.header("authorization", auth);
        }
        app.oneshot(builder.body(Body::from(body.to_string())).expect("request"))
            .await
            .expect("response")
            .status()
    }

    #[tokio::test]
    async fn evaluate_requires_authentication() {
        let status = evaluate(None, serde_json::json!({ "answers": [] })).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let status = evaluate(Some("Bearer stale"), serde_json::json!({ "answers": [] })).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn evaluate_rejects_invalid_scores_before_storage() {
        let body = serde_json::json!({
            "answers": [{ "questionIndex": 0, "questionText": "Q", "score": 7 }]
        });
        assert_eq!(evaluate(Some("Bearer tok"), body).await, StatusCode::BAD_REQUEST);
    }
}
