use std::{fmt, str::FromStr};

use async_trait::async_trait;
use chrono::{DateTime, Duration, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::{Emotion, StoreError, Urgency};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Active,
    Expired,
    Closed,
}

impl SessionStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Expired => "expired",
            Self::Closed => "closed",
        }
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SessionStatus {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "active" => Ok(Self::Active),
            "expired" => Ok(Self::Expired),
            "closed" => Ok(Self::Closed),
            other => Err(format!("unknown session status `{other}`")),
        }
    }
}

/// Durable session metadata. Turns are stored separately and referenced by
/// `session_id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionRecord {
    pub session_id: String,
    pub status: SessionStatus,
    pub created_at: DateTime<Utc>,
    pub last_activity_at: DateTime<Utc>,
    #[serde(default)]
    pub context: Map<String, Value>,
}

impl SessionRecord {
    pub fn new(session_id: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            session_id: session_id.into(),
            status: SessionStatus::Active,
            created_at: now,
            last_activity_at: now,
            context: Map::new(),
        }
    }

    /// True when the session has been idle for longer than `ttl` at `now`.
    pub fn is_expired_at(&self, now: DateTime<Utc>, ttl: Duration) -> bool {
        self.last_activity_at + ttl < now
    }

    pub fn is_active(&self) -> bool {
        self.status == SessionStatus::Active
    }
}

/// A turn that has not yet been assigned a turn number.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewTurn {
    pub user_input: String,
    pub intent: String,
    pub confidence: f64,
    pub bot_response: String,
    #[serde(default)]
    pub slots: Map<String, Value>,
    pub emotion: Emotion,
    pub urgency: Urgency,
    pub processing_time_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TurnRecord {
    pub session_id: String,
    pub turn_number: u32,
    pub user_input: String,
    pub intent: String,
    pub confidence: f64,
    pub bot_response: String,
    #[serde(default)]
    pub slots: Map<String, Value>,
    pub emotion: Emotion,
    pub urgency: Urgency,
    pub processing_time_ms: u64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeedbackType {
    Helpful,
    NotHelpful,
    Incorrect,
    Other,
}

impl FeedbackType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Helpful => "helpful",
            Self::NotHelpful => "not_helpful",
            Self::Incorrect => "incorrect",
            Self::Other => "other",
        }
    }
}

impl FromStr for FeedbackType {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "helpful" => Ok(Self::Helpful),
            "not_helpful" => Ok(Self::NotHelpful),
            "incorrect" => Ok(Self::Incorrect),
            "other" => Ok(Self::Other),
            other => Err(format!("unknown feedback type `{other}`")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewFeedback {
    pub session_id: String,
    pub feedback_type: FeedbackType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feedback_text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub turn_number: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedbackRecord {
    pub feedback_id: i64,
    pub session_id: String,
    pub feedback_type: FeedbackType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feedback_text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub turn_number: Option<u32>,
    pub created_at: DateTime<Utc>,
}

/// Aggregates over every durable turn of one session.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TurnSummary {
    pub total_turns: u64,
    pub intents_used: Vec<String>,
    pub avg_confidence: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SessionCounts {
    pub active: u64,
    pub expired: u64,
    pub closed: u64,
    pub total_turns: u64,
}

impl SessionCounts {
    pub fn total_sessions(&self) -> u64 {
        self.active + self.expired + self.closed
    }
}

/// Durable persistence for sessions, turns and feedback.
///
/// Implemented by `memory::LibsqlStore`. Methods returning `bool` report
/// whether a row was affected; misses are never errors.
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn create_session(&self, record: &SessionRecord) -> Result<(), StoreError>;

    async fn get_session(&self, session_id: &str) -> Result<Option<SessionRecord>, StoreError>;

    /// Refreshes `last_activity_at` of an active session.
    async fn touch_session(&self, session_id: &str, at: DateTime<Utc>)
    -> Result<bool, StoreError>;

    /// Closes an active session, merging `context` into the stored context map.
    async fn close_session(
        &self,
        session_id: &str,
        context: &Map<String, Value>,
    ) -> Result<bool, StoreError>;

    async fn mark_expired(&self, session_id: &str) -> Result<bool, StoreError>;

    /// Merges `context` into the stored context map of an active session.
    async fn update_context(
        &self,
        session_id: &str,
        context: &Map<String, Value>,
    ) -> Result<bool, StoreError>;

    /// Allocates the next turn number and appends the turn atomically.
    ///
    /// Returns `None` when the session is missing or not active.
    async fn append_turn(
        &self,
        session_id: &str,
        turn: &NewTurn,
        at: DateTime<Utc>,
    ) -> Result<Option<TurnRecord>, StoreError>;

    /// The most recent `limit` turns in chronological order.
    async fn recent_turns(
        &self,
        session_id: &str,
        limit: usize,
    ) -> Result<Vec<TurnRecord>, StoreError>;

    async fn turn_summary(&self, session_id: &str) -> Result<TurnSummary, StoreError>;

    async fn turn_exists(&self, session_id: &str, turn_number: u32) -> Result<bool, StoreError>;

    async fn save_feedback(
        &self,
        feedback: &NewFeedback,
        at: DateTime<Utc>,
    ) -> Result<FeedbackRecord, StoreError>;

    /// Marks every active session idle since before `cutoff` as expired.
    async fn expire_idle_sessions(&self, cutoff: DateTime<Utc>) -> Result<u64, StoreError>;

    async fn session_counts(&self) -> Result<SessionCounts, StoreError>;
}

/// RFC 3339 UTC with microsecond precision. Fixed width, so stored values
/// order lexicographically.
pub fn format_timestamp(value: DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub fn parse_timestamp(value: &str) -> Result<DateTime<Utc>, String> {
    DateTime::parse_from_rfc3339(value)
        .map(|parsed| parsed.with_timezone(&Utc))
        .map_err(|error| format!("invalid timestamp `{value}`: {error}"))
}
