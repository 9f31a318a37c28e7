//! Request/response bodies and agent I/O shapes.
//!
//! Top-level bodies use camelCase on the wire to stay compatible with the web
//! client. `Task` keeps snake_case because the agents emit it that way.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

// ──────────────────────────────────────────────
// Auth
// ──────────────────────────────────────────────

/// Guest sessions never get a token from this endpoint: an anonymous caller
/// keeps the one it presented, the fallback account has none.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct GuestLoginResponse {
    pub user_id: String,
    pub name: String,
    pub is_guest: bool,
    pub has_profile: bool,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct SignupRequest {
    pub email: String,
    pub password: String,
    pub name: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AuthResponse {
    pub user_id: String,
    pub name: String,
    pub is_guest: bool,
    pub has_profile: bool,
    pub access_token: String,
}

/// Generic `{"status": "..."}` acknowledgement.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct StatusResponse {
    pub status: String,
}

impl StatusResponse {
    pub fn new(status: &str) -> Self {
        Self {
            status: status.to_string(),
        }
    }
}

// ──────────────────────────────────────────────
// Screening
// ──────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AsrsAnswer {
    pub question_index: i32,
    pub question_text: String,
    /// 0 = Never … 4 = Very Often
    pub score: i32,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ScreeningRequest {
    pub answers: Vec<AsrsAnswer>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct RadarDimension {
    pub key: String,
    pub label: String,
    pub value: i32,
    pub insight: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ScreeningResponse {
    pub profile_id: String,
    pub dimensions: Vec<RadarDimension>,
    pub profile_tags: Vec<String>,
    pub summary: String,
    pub asrs_total_score: i32,
    pub is_positive_screen: bool,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ProfileResponse {
    pub dimensions: Vec<RadarDimension>,
    pub profile_tags: Vec<String>,
    pub summary: String,
}

// ──────────────────────────────────────────────
// Plans & interventions
// ──────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Task {
    pub index: i32,
    pub title: String,
    pub description: String,
    pub duration_minutes: i32,
    pub time_slot: String,
    pub category: String,
    pub rationale: String,
    pub priority: String,
    #[serde(default = "default_task_status")]
    pub status: String,
}

fn default_task_status() -> String {
    "pending".to_string()
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PlanRequest {
    pub brain_state: String,
    #[serde(default)]
    pub tasks: Option<Vec<String>>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PlanResponse {
    pub plan_id: String,
    pub tasks: Vec<Task>,
    pub overall_rationale: String,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct InterventionRequest {
    pub plan_id: String,
    pub stuck_task_index: i32,
    #[serde(default)]
    pub user_message: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct InterventionResponse {
    pub intervention_id: String,
    pub acknowledgment: String,
    pub restructured_tasks: Vec<Task>,
    pub agent_reasoning: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub followup_hint: Option<String>,
}

// ──────────────────────────────────────────────
// Feedback & analytics
// ──────────────────────────────────────────────

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct FeedbackRequest {
    pub intervention_id: String,
    /// 1-5
    pub rating: i32,
    #[serde(default)]
    pub feedback: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AnalyticsEventRequest {
    pub event_type: String,
    #[serde(default)]
    pub event_data: serde_json::Value,
    #[serde(default)]
    pub duration_ms: Option<i64>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AnalyticsSummary {
    pub total_screenings: i64,
    pub total_plans: i64,
    pub total_interventions: i64,
    pub avg_plan_generation_ms: i64,
    pub events: Vec<serde_json::Value>,
}

// ──────────────────────────────────────────────
// Agent computation I/O
// ──────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScreeningInput {
    pub user_id: String,
    pub answers: Vec<AsrsAnswer>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScreeningOutput {
    pub dimensions: Vec<RadarDimension>,
    pub profile_tags: Vec<String>,
    pub summary: String,
    #[serde(default)]
    pub asrs_total_score: Option<i32>,
    #[serde(default)]
    pub is_positive_screen: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanInput {
    pub user_id: String,
    pub brain_state: String,
    pub tasks: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub profile_summary: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanOutput {
    pub tasks: Vec<Task>,
    pub overall_rationale: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InterventionInput {
    pub user_id: String,
    pub plan_id: String,
    pub stuck_task_index: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_message: Option<String>,
    pub tasks: Vec<Task>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InterventionOutput {
    pub acknowledgment: String,
    pub restructured_tasks: Vec<Task>,
    pub agent_reasoning: String,
    #[serde(default)]
    pub followup_hint: Option<String>,
}

/// ASRS frequency labels, indexed by score.
pub const ASRS_ANSWER_LABELS: [&str; 5] = ["Never", "Rarely", "Sometimes", "Often", "Very Often"];

/// ASRS Part A total at or above which a screen counts as positive.
pub const ASRS_POSITIVE_THRESHOLD: i32 = 14;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn task_status_defaults_to_pending() {
        let task: Task = serde_json::from_value(serde_json::json!({
            "index": 0,
            "title": "Inbox zero",
            "description": "Clear the inbox",
            "duration_minutes": 15,
            "time_slot": "09:00",
            "category": "admin",
            "rationale": "Low activation cost",
            "priority": "low"
        }))
        .unwrap();
        assert_eq!(task.status, "pending");
    }

    #[test]
    fn guest_login_response_uses_camel_case() {
        let body = serde_json::to_value(GuestLoginResponse {
            user_id: "u".into(),
            name: "Alex".into(),
            is_guest: true,
            has_profile: false,
        })
        .unwrap();
        assert_eq!(body["userId"], "u");
        assert_eq!(body["isGuest"], true);
        assert!(body.get("accessToken").is_none());
    }

    #[test]
    fn analytics_event_data_defaults_to_null() {
        let req: AnalyticsEventRequest =
            serde_json::from_str(r#"{"eventType":"plan_generated"}"#).unwrap();
        assert!(req.event_data.is_null());
        assert_eq!(req.duration_ms, None);
    }
}
