use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use sqlx::postgres::PgPoolOptions;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

mod agent;
mod auth;
mod bridge;
mod config;
mod error;
mod extract;
mod idp;
mod middleware;
mod routes;
mod seed;
mod state;
#[cfg(test)]
mod test_support;

use crate::agent::CommandAgentRunner;
use crate::config::AppConfig;
use crate::idp::GoTrueProvider;
use crate::seed::{GuestSeeder, PgAccountStore, PgDemoSeeder};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Attune API",
        version = "0.1.0",
        description = "Backend for Attune, an ADHD coaching app: screening, daily plans and interventions."
    ),
    paths(
        routes::health::health_check,
        routes::auth::guest_login,
        routes::auth::signup,
        routes::auth::login,
        routes::auth::logout,
        routes::screening::evaluate_screening,
        routes::plans::generate_plan,
        routes::plans::intervene,
        routes::profile::get_profile,
        routes::feedback::submit_intervention_feedback,
        routes::analytics::track_event,
        routes::analytics::get_analytics_summary,
        routes::users::export_user_data,
        routes::users::delete_user_data,
    ),
    components(schemas(
        routes::health::HealthResponse,
        routes::health::DependencyChecks,
        attune_core::error::ApiError,
        attune_core::models::GuestLoginResponse,
        attune_core::models::SignupRequest,
        attune_core::models::LoginRequest,
        attune_core::models::AuthResponse,
        attune_core::models::StatusResponse,
        attune_core::models::AsrsAnswer,
        attune_core::models::ScreeningRequest,
        attune_core::models::RadarDimension,
        attune_core::models::ScreeningResponse,
        attune_core::models::ProfileResponse,
        attune_core::models::Task,
        attune_core::models::PlanRequest,
        attune_core::models::PlanResponse,
        attune_core::models::InterventionRequest,
        attune_core::models::InterventionResponse,
        attune_core::models::FeedbackRequest,
        attune_core::models::AnalyticsEventRequest,
        attune_core::models::AnalyticsSummary,
        routes::users::UserExport,
        routes::users::UserDeletedResponse,
    )),
    modifiers(&SecurityAddon)
)]
struct ApiDoc;

struct SecurityAddon;

impl utoipa::Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer_auth",
            utoipa::openapi::security::SecurityScheme::Http(
                utoipa::openapi::security::Http::new(
                    utoipa::openapi::security::HttpAuthScheme::Bearer,
                ),
            ),
        );
    }
}

#[tokio::main]
async fn main() {
    // Load .env if present (dev only)
    let _ = dotenvy::dotenv();

    // Structured JSON logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "attune_api=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer().json())
        .init();

    let config = AppConfig::from_env().expect("Invalid configuration");

    let pool = PgPoolOptions::new()
        .max_connections(20)
        .connect(&config.database_url)
        .await
        .expect("Failed to connect to database");

    sqlx::migrate!("../migrations")
        .run(&pool)
        .await
        .expect("Failed to run migrations");

    let identity_provider = Arc::new(
        GoTrueProvider::new(&config.identity_provider)
            .expect("Failed to build identity provider client"),
    );
    let agent = Arc::new(CommandAgentRunner::new(&config.agent));
    let seeder = GuestSeeder::new(
        Arc::new(PgAccountStore::new(pool.clone())),
        Arc::new(PgDemoSeeder::new(
            pool.clone(),
            tokio::runtime::Handle::current(),
        )),
        config.retry,
        config.seed_threshold,
    );

    let app_state = state::AppState::new(
        pool,
        identity_provider,
        agent,
        Arc::new(seeder),
        config.retry,
    );

    tracing::info!(
        identity_provider = %config.identity_provider.url,
        agent = %config.agent.program,
        agent_timeout_ms = config.agent.timeout.as_millis() as u64,
        retry_max_attempts = config.retry.max_attempts,
        seed_threshold = config.seed_threshold,
        "configuration loaded"
    );

    let cors_layer = middleware::cors::build_cors_layer();

    // Per-endpoint rate limiting; auth and agent-backed routes are tighter.
    let app = Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-doc/openapi.json", ApiDoc::openapi()))
        .merge(routes::health::router())
        .merge(routes::auth::guest_router().layer(middleware::rate_limit::guest_layer()))
        .merge(routes::auth::signup_router().layer(middleware::rate_limit::signup_layer()))
        .merge(routes::auth::login_router().layer(middleware::rate_limit::login_layer()))
        .merge(routes::auth::logout_router().layer(middleware::rate_limit::logout_layer()))
        .merge(routes::screening::router().layer(middleware::rate_limit::agent_layer()))
        .merge(routes::plans::router().layer(middleware::rate_limit::agent_layer()))
        .merge(routes::profile::router().layer(middleware::rate_limit::data_layer()))
        .merge(routes::feedback::router().layer(middleware::rate_limit::data_layer()))
        .merge(routes::analytics::router().layer(middleware::rate_limit::data_layer()))
        .merge(routes::users::router().layer(middleware::rate_limit::data_layer()))
        .layer(axum::middleware::from_fn(middleware::security_headers::apply))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors_layer),
        )
        .with_state(app_state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!("Attune API listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind listener");
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await
    .expect("Server error");
}
