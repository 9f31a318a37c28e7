use axum::extract::{Path, State};
use axum::routing::{delete, get};
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::PgPool;

use crate::auth::AuthenticatedUser;
use crate::error::AppError;
use crate::idp::ProviderError;
use crate::state::AppState;

/// Tables holding per-user rows, children before parents.
const USER_TABLES: [&str; 7] = [
    "analytics_events",
    "interventions",
    "hypothesis_cards",
    "checkins",
    "daily_plans",
    "cognitive_profiles",
    "asrs_responses",
];

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/v1/users/{user_id}", delete(delete_user_data))
        .route("/v1/users/{user_id}/export", get(export_user_data))
}

#[derive(Serialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UserExport {
    pub export_date: DateTime<Utc>,
    pub user_id: String,
    pub user: Vec<serde_json::Value>,
    pub screening_answers: Vec<serde_json::Value>,
    pub cognitive_profiles: Vec<serde_json::Value>,
    pub daily_plans: Vec<serde_json::Value>,
    pub checkins: Vec<serde_json::Value>,
    pub interventions: Vec<serde_json::Value>,
    pub hypothesis_cards: Vec<serde_json::Value>,
    pub analytics_events: Vec<serde_json::Value>,
}

#[derive(Serialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UserDeletedResponse {
    pub status: String,
    pub user_id: String,
    pub rows_deleted: i64,
}

/// Every row of `table` owned by the user, as JSON objects.
async fn rows_as_json(
    pool: &PgPool,
    table: &str,
    owner_column: &str,
    user_id: &str,
) -> Result<Vec<serde_json::Value>, AppError> {
    let rows = sqlx::query_scalar(&format!(
        "SELECT to_jsonb(t) FROM {table} t WHERE t.{owner_column} = $1 ORDER BY t.created_at"
    ))
    .bind(user_id)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

/// GET /v1/users/{user_id}/export: everything stored about the caller (GDPR Art. 20)
#[utoipa::path(
    get,
    path = "/v1/users/{user_id}/export",
    params(("user_id" = String, Path, description = "Must equal the authenticated user")),
    responses(
        (status = 200, description = "Full data export", body = UserExport),
        (status = 401, description = "Not authenticated", body = attune_core::error::ApiError),
        (status = 403, description = "Not your data", body = attune_core::error::ApiError)
    ),
    security(("bearer_auth" = [])),
    tag = "users"
)]
pub async fn export_user_data(
    user: AuthenticatedUser,
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<Json<UserExport>, AppError> {
    user.require_owner(&user_id, "export_user_data")?;
    let db = &state.db;

    let export = UserExport {
        export_date: Utc::now(),
        user: rows_as_json(db, "users", "id", &user_id).await?,
        screening_answers: rows_as_json(db, "asrs_responses", "user_id", &user_id).await?,
        cognitive_profiles: rows_as_json(db, "cognitive_profiles", "user_id", &user_id).await?,
        daily_plans: rows_as_json(db, "daily_plans", "user_id", &user_id).await?,
        checkins: rows_as_json(db, "checkins", "user_id", &user_id).await?,
        interventions: rows_as_json(db, "interventions", "user_id", &user_id).await?,
        hypothesis_cards: rows_as_json(db, "hypothesis_cards", "user_id", &user_id).await?,
        analytics_events: rows_as_json(db, "analytics_events", "user_id", &user_id).await?,
        user_id,
    };

    tracing::info!(user_id = %export.user_id, "user data exported (GDPR Art. 20)");
    Ok(Json(export))
}

/// DELETE /v1/users/{user_id}: erase the caller's data (GDPR Art. 17)
#[utoipa::path(
    delete,
    path = "/v1/users/{user_id}",
    params(("user_id" = String, Path, description = "Must equal the authenticated user")),
    responses(
        (status = 200, description = "All data permanently deleted", body = UserDeletedResponse),
        (status = 401, description = "Not authenticated", body = attune_core::error::ApiError),
        (status = 403, description = "Not your data", body = attune_core::error::ApiError)
    ),
    security(("bearer_auth" = [])),
    tag = "users"
)]
pub async fn delete_user_data(
    user: AuthenticatedUser,
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<Json<UserDeletedResponse>, AppError> {
    user.require_owner(&user_id, "delete_user_data")?;

    let rows_deleted = execute_user_deletion(&state.db, &user_id).await?;

    // Guests that never reached the provider have no subject to delete.
    match state.identity_provider.delete_subject(&user_id).await {
        Ok(()) => {}
        Err(ProviderError::NotConfigured(setting)) => {
            tracing::debug!(user_id = %user_id, setting, "provider deletion skipped");
        }
        Err(e) => {
            tracing::warn!(user_id = %user_id, error = %e, "provider deletion failed");
        }
    }

    Ok(Json(UserDeletedResponse {
        status: "deleted".to_string(),
        user_id,
        rows_deleted,
    }))
}

async fn execute_user_deletion(pool: &PgPool, user_id: &str) -> Result<i64, AppError> {
    let mut tx = pool.begin().await?;
    let mut rows_deleted = 0i64;

    for table in USER_TABLES {
        let result = sqlx::query(&format!("DELETE FROM {table} WHERE user_id = $1"))
            .bind(user_id)
            .execute(&mut *tx)
            .await?;
        rows_deleted += result.rows_affected() as i64;
    }
    let result = sqlx::query("DELETE FROM users WHERE id = $1")
        .bind(user_id)
        .execute(&mut *tx)
        .await?;
    rows_deleted += result.rows_affected() as i64;

    tx.commit().await?;

    tracing::info!(
        user_id = %user_id,
        rows_deleted,
        "user data permanently deleted (GDPR Art. 17)"
    );
    Ok(rows_deleted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{FakeIdentityProvider, MemoryBackend, test_state};
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use sqlx::postgres::PgPoolOptions;
    use std::sync::Arc;
    use tower::ServiceExt;

    async fn status_of(method: &str, uri: &str) -> StatusCode {
        let provider = Arc::new(FakeIdentityProvider::default().with_token("tok", "user-1"));
        let app = router().with_state(test_state(provider, Arc::new(MemoryBackend::default())));
        app.oneshot(
            Request::builder()
                .method(method)
                .uri(uri)
                .header("authorization", "Bearer tok")
                .body(Body::empty())
                .expect("request"),
        )
        .await
        .expect("response")
        .status()
    }

    #[tokio::test]
    async fn deleting_someone_else_is_forbidden() {
        assert_eq!(status_of("DELETE", "/v1/users/user-2").await, StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn exporting_someone_else_is_forbidden() {
        assert_eq!(
            status_of("GET", "/v1/users/user-2/export").await,
            StatusCode::FORBIDDEN
        );
    }

    #[test]
    fn children_are_deleted_before_profiles() {
        let position = |name: &str| USER_TABLES.iter().position(|t| *t == name).unwrap();
        assert!(position("interventions") < position("daily_plans"));
        assert!(position("cognitive_profiles") < position("asrs_responses"));
        assert!(!USER_TABLES.contains(&"users"));
    }

    async fn db_pool_if_available() -> Option<PgPool> {
        let url = std::env::var("DATABASE_URL").ok()?;
        let pool = PgPoolOptions::new()
            .max_connections(2)
            .connect(&url)
            .await
            .ok()?;
        sqlx::migrate!("../migrations")
            .run(&pool)
            .await
            .expect("migrations should run");
        Some(pool)
    }

    #[tokio::test]
    async fn deletion_removes_seeded_account_completely() {
        let Some(pool) = db_pool_if_available().await else {
            return;
        };
        let user_id = format!("delete-test-{}", uuid::Uuid::now_v7());
        sqlx::query("INSERT INTO users (id, name, is_guest) VALUES ($1, 'Alex', TRUE)")
            .bind(&user_id)
            .execute(&pool)
            .await
            .unwrap();
        crate::seed::seed_demo_data(&pool, &user_id).await.unwrap();

        let exported = rows_as_json(&pool, "checkins", "user_id", &user_id)
            .await
            .unwrap();
        assert_eq!(exported.len(), 14);

        let deleted = execute_user_deletion(&pool, &user_id).await.unwrap();
        assert!(deleted > 14);

        let remaining: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM checkins WHERE user_id = $1")
                .bind(&user_id)
                .fetch_one(&pool)
                .await
                .unwrap();
        assert_eq!(remaining, 0);
        let user_left: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM users WHERE id = $1)")
            .bind(&user_id)
            .fetch_one(&pool)
            .await
            .unwrap();
        assert!(!user_left);
    }
}
