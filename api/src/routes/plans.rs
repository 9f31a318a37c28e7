use std::time::Instant;

use attune_core::models::{
    InterventionInput, InterventionRequest, InterventionResponse, PlanInput, PlanRequest,
    PlanResponse, Task,
};
use axum::extract::State;
use axum::routing::post;
use axum::{Json, Router};
use sqlx::types::Json as SqlJson;
use uuid::Uuid;

use crate::auth::AuthenticatedUser;
use crate::error::AppError;
use crate::extract::{AppJson, invalid_field};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/v1/plans/generate", post(generate_plan))
        .route("/v1/plans/intervene", post(intervene))
}

/// Trimmed, non-empty task titles from the request.
fn normalize_tasks(tasks: Option<Vec<String>>) -> Vec<String> {
    tasks
        .unwrap_or_default()
        .into_iter()
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .collect()
}

fn stuck_task_in_range(index: i32, tasks: &[Task]) -> bool {
    usize::try_from(index).is_ok_and(|i| i < tasks.len())
}

// ──────────────────────────────────────────────
// POST /v1/plans/generate
// ──────────────────────────────────────────────

#[utoipa::path(
    post,
    path = "/v1/plans/generate",
    request_body = PlanRequest,
    responses(
        (status = 200, description = "Plan generated", body = PlanResponse),
        (status = 400, description = "Missing brain state", body = attune_core::error::ApiError),
        (status = 401, description = "Not authenticated", body = attune_core::error::ApiError),
        (status = 502, description = "Planning agent failed after retries", body = attune_core::error::ApiError)
    ),
    security(("bearer_auth" = [])),
    tag = "plans"
)]
pub async fn generate_plan(
    user: AuthenticatedUser,
    State(state): State<AppState>,
    AppJson(req): AppJson<PlanRequest>,
) -> Result<Json<PlanResponse>, AppError> {
    let brain_state = req.brain_state.trim().to_string();
    if brain_state.is_empty() {
        return Err(invalid_field("brainState", "brainState must not be empty", None));
    }
    let user_id = user.user_id().to_string();

    let profile_summary = sqlx::query_scalar::<_, Option<String>>(
        "SELECT cognitive_profile_summary FROM users WHERE id = $1",
    )
    .bind(&user_id)
    .fetch_optional(&state.db)
    .await?
    .flatten();

    let agent = state.agent.clone();
    let input = PlanInput {
        user_id: user_id.clone(),
        brain_state: brain_state.clone(),
        tasks: normalize_tasks(req.tasks),
        profile_summary,
    };
    let started = Instant::now();
    let output = state.retry.run(move || agent.plan(&input)).await?;
    let elapsed_ms = started.elapsed().as_millis() as u64;

    let plan_id = Uuid::now_v7();
    sqlx::query(
        "INSERT INTO daily_plans (id, user_id, brain_state, tasks, overall_rationale) \
         VALUES ($1, $2, $3, $4, $5)",
    )
    .bind(plan_id)
    .bind(&user_id)
    .bind(&brain_state)
    .bind(SqlJson(&output.tasks))
    .bind(&output.overall_rationale)
    .execute(&state.db)
    .await?;

    tracing::info!(
        user_id = %user_id,
        plan_id = %plan_id,
        tasks = output.tasks.len(),
        elapsed_ms,
        "plan generated"
    );

    Ok(Json(PlanResponse {
        plan_id: plan_id.to_string(),
        tasks: output.tasks,
        overall_rationale: output.overall_rationale,
    }))
}

// ──────────────────────────────────────────────
// POST /v1/plans/intervene
// ──────────────────────────────────────────────

/// Restructure an owned plan around the task the user is stuck on.
#[utoipa::path(
    post,
    path = "/v1/plans/intervene",
    request_body = InterventionRequest,
    responses(
        (status = 200, description = "Intervention stored", body = InterventionResponse),
        (status = 400, description = "Invalid plan id or task index", body = attune_core::error::ApiError),
        (status = 401, description = "Not authenticated", body = attune_core::error::ApiError),
        (status = 404, description = "Plan not found for this user", body = attune_core::error::ApiError),
        (status = 502, description = "Intervention agent failed after retries", body = attune_core::error::ApiError)
    ),
    security(("bearer_auth" = [])),
    tag = "plans"
)]
pub async fn intervene(
    user: AuthenticatedUser,
    State(state): State<AppState>,
    AppJson(req): AppJson<InterventionRequest>,
) -> Result<Json<InterventionResponse>, AppError> {
    let plan_id = Uuid::parse_str(&req.plan_id).map_err(|_| {
        invalid_field(
            "planId",
            "planId must be a UUID",
            Some(serde_json::Value::String(req.plan_id.clone())),
        )
    })?;
    let user_id = user.user_id().to_string();

    // Ownership is part of the lookup: someone else's plan is indistinguishable
    // from a missing one.
    let tasks: SqlJson<Vec<Task>> =
        sqlx::query_scalar("SELECT tasks FROM daily_plans WHERE id = $1 AND user_id = $2")
            .bind(plan_id)
            .bind(&user_id)
            .fetch_optional(&state.db)
            .await?
            .ok_or_else(|| AppError::NotFound {
                resource: format!("Plan {plan_id}"),
            })?;
    let tasks = tasks.0;

    if !stuck_task_in_range(req.stuck_task_index, &tasks) {
        return Err(invalid_field(
            "stuckTaskIndex",
            format!("stuckTaskIndex must be within the plan's {} tasks", tasks.len()),
            Some(serde_json::json!(req.stuck_task_index)),
        ));
    }

    let agent = state.agent.clone();
    let input = InterventionInput {
        user_id: user_id.clone(),
        plan_id: plan_id.to_string(),
        stuck_task_index: req.stuck_task_index,
        user_message: req.user_message.clone(),
        tasks,
    };
    let output = state.retry.run(move || agent.intervene(&input)).await?;

    let intervention_id = Uuid::now_v7();
    sqlx::query(
        "INSERT INTO interventions \
         (id, user_id, plan_id, stuck_task_index, user_message, acknowledgment, \
          restructured_tasks, agent_reasoning, followup_hint) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
    )
    .bind(intervention_id)
    .bind(&user_id)
    .bind(plan_id)
    .bind(req.stuck_task_index)
    .bind(&req.user_message)
    .bind(&output.acknowledgment)
    .bind(SqlJson(&output.restructured_tasks))
    .bind(&output.agent_reasoning)
    .bind(&output.followup_hint)
    .execute(&state.db)
    .await?;

    tracing::info!(
        user_id = %user_id,
        plan_id = %plan_id,
        intervention_id = %intervention_id,
        stuck_task_index = req.stuck_task_index,
        "intervention stored"
    );

    Ok(Json(InterventionResponse {
        intervention_id: intervention_id.to_string(),
        acknowledgment: output.acknowledgment,
        restructured_tasks: output.restructured_tasks,
        agent_reasoning: output.agent_reasoning,
        followup_hint: output.followup_hint,
    }))
}
