use attune_core::models::{AnalyticsEventRequest, AnalyticsSummary, StatusResponse};
use axum::extract::{Path, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde_json::json;
use sqlx::PgPool;
use uuid::Uuid;

use crate::auth::AuthenticatedUser;
use crate::error::AppError;
use crate::extract::{AppJson, invalid_field};
use crate::state::AppState;

/// Events returned in full by the summary.
const RECENT_EVENTS: i64 = 50;

/// Upper bound for a reported duration: one day.
const MAX_DURATION_MS: i64 = 86_400_000;

const SCREENING_COMPLETED: &str = "screening_completed";
const PLAN_GENERATED: &str = "plan_generated";
const INTERVENTION_TRIGGERED: &str = "intervention_triggered";

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/v1/analytics/event", post(track_event))
        .route("/v1/analytics/summary/{user_id}", get(get_analytics_summary))
}

#[derive(Debug, sqlx::FromRow)]
struct EventRow {
    id: Uuid,
    user_id: String,
    event_type: String,
    event_data: serde_json::Value,
    duration_ms: Option<i64>,
    created_at: DateTime<Utc>,
}

impl EventRow {
    fn to_json(&self) -> serde_json::Value {
        json!({
            "id": self.id,
            "user_id": self.user_id,
            "event_type": self.event_type,
            "event_data": self.event_data,
            "duration_ms": self.duration_ms,
            "created_at": self.created_at,
        })
    }
}

/// Per-user aggregates computed by Postgres. The average is taken over
/// NUMERIC so large durations cannot overflow.
#[derive(Debug, Default, sqlx::FromRow)]
struct SummaryTotals {
    screenings: i64,
    plans: i64,
    interventions: i64,
    avg_plan_ms: i64,
}

/// `recent` arrives newest first and is returned oldest first.
fn assemble_summary(totals: SummaryTotals, mut recent: Vec<EventRow>) -> AnalyticsSummary {
    recent.reverse();
    AnalyticsSummary {
        total_screenings: totals.screenings,
        total_plans: totals.plans,
        total_interventions: totals.interventions,
        avg_plan_generation_ms: totals.avg_plan_ms,
        events: recent.iter().map(EventRow::to_json).collect(),
    }
}

fn validate_duration(duration_ms: Option<i64>) -> Result<(), AppError> {
    match duration_ms {
        Some(ms) if ms < 0 => Err(invalid_field(
            "durationMs",
            "durationMs must not be negative",
            Some(json!(ms)),
        )),
        Some(ms) if ms > MAX_DURATION_MS => Err(invalid_field(
            "durationMs",
            format!("durationMs must be at most {MAX_DURATION_MS}"),
            Some(json!(ms)),
        )),
        _ => Ok(()),
    }
}

async fn load_summary(db: &PgPool, user_id: &str) -> Result<AnalyticsSummary, AppError> {
    let totals: SummaryTotals = sqlx::query_as(
        "SELECT \
           COUNT(*) FILTER (WHERE event_type = $2) AS screenings, \
           COUNT(*) FILTER (WHERE event_type = $3) AS plans, \
           COUNT(*) FILTER (WHERE event_type = $4) AS interventions, \
           COALESCE(ROUND(AVG(duration_ms) FILTER ( \
             WHERE event_type = $3 AND duration_ms > 0))::BIGINT, 0) AS avg_plan_ms \
         FROM analytics_events WHERE user_id = $1",
    )
    .bind(user_id)
    .bind(SCREENING_COMPLETED)
    .bind(PLAN_GENERATED)
    .bind(INTERVENTION_TRIGGERED)
    .fetch_one(db)
    .await?;

    let recent: Vec<EventRow> = sqlx::query_as(
        "SELECT id, user_id, event_type, event_data, duration_ms, created_at \
         FROM analytics_events WHERE user_id = $1 \
         ORDER BY created_at DESC, id DESC LIMIT $2",
    )
    .bind(user_id)
    .bind(RECENT_EVENTS)
    .fetch_all(db)
    .await?;

    Ok(assemble_summary(totals, recent))
}

#[utoipa::path(
    post,
    path = "/v1/analytics/event",
    request_body = AnalyticsEventRequest,
    responses(
        (status = 200, description = "Event recorded", body = StatusResponse),
        (status = 400, description = "Invalid event", body = attune_core::error::ApiError),
        (status = 401, description = "Not authenticated", body = attune_core::error::ApiError)
    ),
    security(("bearer_auth" = [])),
    tag = "analytics"
)]
pub async fn track_event(
    user: AuthenticatedUser,
    State(state): State<AppState>,
    AppJson(event): AppJson<AnalyticsEventRequest>,
) -> Result<Json<StatusResponse>, AppError> {
    let event_type = event.event_type.trim();
    if event_type.is_empty() {
        return Err(invalid_field("eventType", "eventType must not be empty", None));
    }
    validate_duration(event.duration_ms)?;
    let event_data = if event.event_data.is_null() {
        json!({})
    } else {
        event.event_data
    };

    sqlx::query(
        "INSERT INTO analytics_events (id, user_id, event_type, event_data, duration_ms) \
         VALUES ($1, $2, $3, $4, $5)",
    )
    .bind(Uuid::now_v7())
    .bind(user.user_id())
    .bind(event_type)
    .bind(&event_data)
    .bind(event.duration_ms)
    .execute(&state.db)
    .await?;

    Ok(Json(StatusResponse::new("tracked")))
}

#[utoipa::path(
    get,
    path = "/v1/analytics/summary/{user_id}",
    params(("user_id" = String, Path, description = "Must equal the authenticated user")),
    responses(
        (status = 200, description = "Aggregated analytics", body = AnalyticsSummary),
        (status = 401, description = "Not authenticated", body = attune_core::error::ApiError),
        (status = 403, description = "Not your analytics", body = attune_core::error::ApiError)
    ),
    security(("bearer_auth" = [])),
    tag = "analytics"
)]
pub async fn get_analytics_summary(
    user: AuthenticatedUser,
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<Json<AnalyticsSummary>, AppError> {
    user.require_owner(&user_id, "read_analytics")?;

    Ok(Json(load_summary(&state.db, &user_id).await?))
}
