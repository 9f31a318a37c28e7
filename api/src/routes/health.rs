use std::time::Duration;

use axum::extract::State;
use axum::http::StatusCode;
use axum::{Json, Router, routing::get};
use serde::Serialize;

use crate::state::AppState;

/// Upper bound for the database round-trip.
const DATABASE_CHECK_TIMEOUT: Duration = Duration::from_secs(2);

pub fn router() -> Router<AppState> {
    Router::new().route("/health", get(health_check))
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DependencyChecks {
    pub database: bool,
    pub identity_provider: bool,
}

/// `status` is `ok`, `degraded` (identity provider down) or `unavailable`
/// (database down).
#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub checks: DependencyChecks,
}

fn overall_status(checks: &DependencyChecks) -> (StatusCode, &'static str) {
    match (checks.database, checks.identity_provider) {
        (false, _) => (StatusCode::SERVICE_UNAVAILABLE, "unavailable"),
        (true, false) => (StatusCode::OK, "degraded"),
        (true, true) => (StatusCode::OK, "ok"),
    }
}

async fn database_reachable(state: &AppState) -> bool {
    let probe = sqlx::query_scalar::<_, i32>("SELECT 1").fetch_one(&state.db);
    match tokio::time::timeout(DATABASE_CHECK_TIMEOUT, probe).await {
        Ok(Ok(_)) => true,
        Ok(Err(e)) => {
            tracing::warn!(error = %e, "health check: database unreachable");
            false
        }
        Err(_) => {
            tracing::warn!("health check: database did not answer in time");
            false
        }
    }
}

async fn identity_provider_reachable(state: &AppState) -> bool {
    match state.identity_provider.ping().await {
        Ok(()) => true,
        Err(e) => {
            tracing::warn!(error = %e, "health check: identity provider unreachable");
            false
        }
    }
}

/// Liveness plus reachability of the database and identity provider.
#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Serving, possibly degraded", body = HealthResponse),
        (status = 503, description = "Database unreachable", body = HealthResponse)
    ),
    tag = "system"
)]
pub async fn health_check(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let (database, identity_provider) = tokio::join!(
        database_reachable(&state),
        identity_provider_reachable(&state)
    );
    let checks = DependencyChecks {
        database,
        identity_provider,
    };
    let (http_status, status) = overall_status(&checks);

    (
        http_status,
        Json(HealthResponse {
            status: status.to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            checks,
        }),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{FakeIdentityProvider, MemoryBackend, test_state};
    use axum::body::Body;
    use axum::http::Request;
    use std::sync::Arc;
    use tower::ServiceExt;

    async fn get_health(provider: FakeIdentityProvider) -> (StatusCode, serde_json::Value) {
        let state = test_state(Arc::new(provider), Arc::new(MemoryBackend::default()));
        let response = router()
            .with_state(state)
            .oneshot(Request::builder().uri("/health").body(Body::empty()).expect("request"))
            .await
            .expect("response");

        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body");
        (status, serde_json::from_slice(&bytes).expect("json"))
    }

    #[tokio::test]
    async fn unreachable_database_reports_unavailable() {
        let (status, body) = get_health(FakeIdentityProvider::default()).await;

        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["status"], "unavailable");
        assert_eq!(body["checks"]["database"], false);
        assert_eq!(body["checks"]["identityProvider"], true);
    }

    #[tokio::test]
    async fn provider_outage_is_reported_per_dependency() {
        let (_, body) = get_health(FakeIdentityProvider::default().unavailable()).await;
        assert_eq!(body["checks"]["identityProvider"], false);
    }

    #[test]
    fn identity_provider_outage_alone_only_degrades() {
        let status = |database, identity_provider| {
            overall_status(&DependencyChecks {
                database,
                identity_provider,
            })
        };
        assert_eq!(status(true, true), (StatusCode::OK, "ok"));
        assert_eq!(status(true, false), (StatusCode::OK, "degraded"));
        assert_eq!(
            status(false, true),
            (StatusCode::SERVICE_UNAVAILABLE, "unavailable")
        );
        assert_eq!(
            status(false, false),
            (StatusCode::SERVICE_UNAVAILABLE, "unavailable")
        );
    }
}
