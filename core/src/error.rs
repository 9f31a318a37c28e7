use serde::Serialize;
use utoipa::ToSchema;

/// Structured error response returned by every endpoint.
///
/// Clients branch on `error`; `message` and `docs_hint` are for humans.
#[derive(Debug, Serialize, ToSchema)]
pub struct ApiError {
    /// Machine-readable error code (see [`codes`])
    pub error: String,
    /// Human-readable description of what went wrong
    pub message: String,
    /// Which field caused the error (if applicable)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    /// The value that was received (if applicable)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub received: Option<serde_json::Value>,
    /// Request ID for tracing and debugging
    pub request_id: String,
    /// Hint about what the correct usage looks like
    #[serde(skip_serializing_if = "Option::is_none")]
    pub docs_hint: Option<String>,
}

/// Error codes used across the API
pub mod codes {
    pub const VALIDATION_FAILED: &str = "validation_failed";
    pub const NOT_FOUND: &str = "not_found";
    pub const INTERNAL_ERROR: &str = "internal_error";
    pub const MISSING_OR_MALFORMED_CREDENTIAL: &str = "missing_or_malformed_credential";
    pub const INVALID_OR_EXPIRED_CREDENTIAL: &str = "invalid_or_expired_credential";
    pub const INVALID_CREDENTIALS: &str = "invalid_credentials";
    pub const FORBIDDEN: &str = "forbidden";
    pub const RETRIES_EXHAUSTED: &str = "retries_exhausted";
    pub const SEEDING_FAILED: &str = "seeding_failed";
    pub const RATE_LIMITED: &str = "rate_limited";
}
