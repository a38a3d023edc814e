//! Request and response bodies of the `/api/v1` surface.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use types::{FeedbackType, NewFeedback};

pub const DEFAULT_END_REASON: &str = "user_ended";

#[derive(Debug, Clone, Deserialize)]
pub struct ChatBody {
    pub user_text: String,
    #[serde(default)]
    pub session_id: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FeedbackBody {
    pub session_id: String,
    pub feedback_type: FeedbackType,
    #[serde(default)]
    pub feedback_text: Option<String>,
    #[serde(default)]
    pub turn_number: Option<u32>,
}

impl From<FeedbackBody> for NewFeedback {
    fn from(body: FeedbackBody) -> Self {
        Self {
            session_id: body.session_id,
            feedback_type: body.feedback_type,
            feedback_text: body.feedback_text,
            turn_number: body.turn_number,
        }
    }
}

fn default_end_reason() -> String {
    DEFAULT_END_REASON.to_owned()
}

#[derive(Debug, Clone, Deserialize)]
pub struct EndSessionBody {
    pub session_id: String,
    #[serde(default = "default_end_reason")]
    pub end_reason: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TransferBody {
    pub session_id: String,
    #[serde(default)]
    pub reason: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AckResponse {
    pub success: bool,
    pub message: String,
}

impl AckResponse {
    pub(crate) fn ok(message: &str) -> Self {
        Self {
            success: true,
            message: message.to_owned(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransferResponse {
    pub success: bool,
    pub message: String,
    pub transfer_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionStatsResponse {
    pub session_id: String,
    pub created_at: String,
    pub last_activity: String,
    pub total_turns: u64,
    pub intents_used: Vec<String>,
    pub avg_confidence: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthResponse {
    pub ok: bool,
    pub timestamp: String,
    pub version: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentStatus {
    pub intent_classifier: String,
    pub session_manager: String,
    pub response_policy: String,
}

impl ComponentStatus {
    pub(crate) fn all_active() -> Self {
        Self {
            intent_classifier: "active".to_owned(),
            session_manager: "active".to_owned(),
            response_policy: "active".to_owned(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusResponse {
    pub status: String,
    pub timestamp: String,
    pub version: String,
    pub session_statistics: Value,
    pub components: ComponentStatus,
}
