use attune_core::error::codes;
use axum::body::Body;
use axum::http::{HeaderValue, Response, StatusCode};
use tower_governor::{
    GovernorError, GovernorLayer, governor::GovernorConfigBuilder,
    key_extractor::SmartIpKeyExtractor,
};

type RateLimitLayer = GovernorLayer<SmartIpKeyExtractor, governor::middleware::NoOpMiddleware, Body>;

fn ip_layer(replenish_ms: u64, burst: u32, name: &str) -> RateLimitLayer {
    let config = GovernorConfigBuilder::default()
        .per_millisecond(replenish_ms)
        .burst_size(burst)
        .key_extractor(SmartIpKeyExtractor)
        .finish()
        .unwrap_or_else(|| panic!("invalid governor config for {name}"));
    GovernorLayer::new(config).error_handler(json_error_handler)
}

/// POST /v1/auth/guest: 20 per minute per IP. Every call may seed a dataset.
pub fn guest_layer() -> RateLimitLayer {
    ip_layer(3_000, 20, "guest")
}

/// POST /v1/auth/signup: 5 per hour per IP.
pub fn signup_layer() -> RateLimitLayer {
    ip_layer(720_000, 5, "signup")
}

/// POST /v1/auth/login: 10 per minute per IP.
pub fn login_layer() -> RateLimitLayer {
    ip_layer(6_000, 10, "login")
}

/// POST /v1/auth/logout: 30 per minute per IP.
pub fn logout_layer() -> RateLimitLayer {
    ip_layer(2_000, 30, "logout")
}

/// Agent-backed endpoints (screening, plans): 10 per minute per IP.
pub fn agent_layer() -> RateLimitLayer {
    ip_layer(6_000, 10, "agent")
}

/// Plain reads and writes: 120 per minute per IP.
pub fn data_layer() -> RateLimitLayer {
    ip_layer(500, 30, "data")
}

/// JSON body in `ApiError` shape, with `Retry-After` when known.
fn json_error_handler(err: GovernorError) -> Response<Body> {
    let (status, retry_after, message) = match err {
        GovernorError::TooManyRequests { wait_time, .. } => (
            StatusCode::TOO_MANY_REQUESTS,
            Some(wait_time),
            format!("Too many requests. Retry after {wait_time} seconds."),
        ),
        GovernorError::UnableToExtractKey => (
            StatusCode::INTERNAL_SERVER_ERROR,
            None,
            "Unable to determine client identity for rate limiting".to_string(),
        ),
        GovernorError::Other { code, msg, .. } => (code, None, msg.unwrap_or_default()),
    };

    let body = serde_json::json!({
        "error": codes::RATE_LIMITED,
        "message": message,
        "request_id": uuid::Uuid::now_v7().to_string(),
    });

    let mut response = Response::new(Body::from(body.to_string()));
    *response.status_mut() = status;
    let headers = response.headers_mut();
    headers.insert("content-type", HeaderValue::from_static("application/json"));
    if let Some(wait) = retry_after {
        headers.insert("retry-after", HeaderValue::from(wait));
    }
    response
}
