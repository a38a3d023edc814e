use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use serde_json::{Map, Value, json};
use tokio::sync::Mutex;
use types::{
    NewFeedback, NewTurn, RuntimeError, SessionConfig, SessionRecord, SessionStatus, SessionStore,
    TurnRecord, ValidationError, format_timestamp,
};
use uuid::Uuid;

const MAX_TTL_MINUTES: u64 = 7 * 24 * 60;
const TRANSFER_ID_LENGTH: usize = 8;
pub const MAX_FEEDBACK_CHARS: usize = 1000;
pub const MAX_SESSION_ID_LEN: usize = 128;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionSettings {
    pub ttl: Duration,
    pub max_turns: usize,
    pub sweep_interval: Duration,
}

impl SessionSettings {
    pub fn from_config(config: &SessionConfig) -> Self {
        let ttl_minutes = config.ttl_minutes.min(MAX_TTL_MINUTES) as i64;
        let sweep_secs = config.sweep_interval_secs.min(MAX_TTL_MINUTES * 60) as i64;
        Self {
            ttl: Duration::minutes(ttl_minutes),
            max_turns: config.max_turns.max(1),
            sweep_interval: Duration::seconds(sweep_secs),
        }
    }
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self::from_config(&SessionConfig::default())
    }
}

/// Readable state of an active session: metadata plus the retained window
/// of recent turns, oldest first.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionView {
    pub session_id: String,
    pub status: SessionStatus,
    pub created_at: DateTime<Utc>,
    pub last_activity_at: DateTime<Utc>,
    pub context: Map<String, Value>,
    pub turns: Vec<TurnRecord>,
}

impl SessionView {
    pub fn last_intent(&self) -> Option<&str> {
        self.turns.last().map(|turn| turn.intent.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionStats {
    pub session_id: String,
    pub created_at: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
    pub total_turns: u64,
    pub intents_used: Vec<String>,
    pub avg_confidence: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionOverview {
    pub active_sessions: u64,
    pub expired_sessions: u64,
    pub closed_sessions: u64,
    pub total_sessions: u64,
    pub total_turns: u64,
    pub last_sweep_at: Option<DateTime<Utc>>,
}

/// Session lifecycle on top of a [`SessionStore`].
///
/// Expected misses come back as `None`/`false`; only storage failures are
/// errors. TTL expiry is applied lazily on every read and in bulk by the
/// throttled sweep.
pub struct SessionManager {
    store: Arc<dyn SessionStore>,
    settings: SessionSettings,
    last_sweep: Mutex<Option<DateTime<Utc>>>,
}

impl SessionManager {
    pub fn new(store: Arc<dyn SessionStore>, settings: SessionSettings) -> Self {
        Self {
            store,
            settings,
            last_sweep: Mutex::new(None),
        }
    }

    pub fn settings(&self) -> SessionSettings {
        self.settings
    }

    /// Resumes `requested` when it names an active session, otherwise starts
    /// a new one. Closed or expired ids are never reused, and ids that are
    /// not short visible ASCII are ignored.
    pub async fn create_or_resume(&self, requested: Option<&str>) -> Result<String, RuntimeError> {
        self.sweep_expired_if_due().await?;
        let now = Utc::now();

        let requested = requested
            .map(str::trim)
            .filter(|id| is_acceptable_session_id(id));
        if let Some(session_id) = requested {
            match self.store.get_session(session_id).await? {
                Some(record) if record.is_active() && !self.is_expired(&record, now) => {
                    self.store.touch_session(session_id, now).await?;
                    tracing::debug!(session_id, "resumed session");
                    return Ok(session_id.to_owned());
                }
                Some(record) => {
                    if record.is_active() {
                        self.store.mark_expired(session_id).await?;
                    }
                    tracing::debug!(
                        session_id,
                        status = %record.status,
                        "requested session is no longer active; starting a new one"
                    );
                }
                None => {
                    self.store
                        .create_session(&SessionRecord::new(session_id, now))
                        .await?;
                    tracing::info!(session_id, "created session with client-supplied id");
                    return Ok(session_id.to_owned());
                }
            }
        }

        let session_id = Uuid::new_v4().to_string();
        self.store
            .create_session(&SessionRecord::new(session_id.as_str(), now))
            .await?;
        tracing::info!(session_id = %session_id, "created session");
        Ok(session_id)
    }

    pub async fn get(&self, session_id: &str) -> Result<Option<SessionView>, RuntimeError> {
        let Some(record) = self.readable(session_id).await? else {
            return Ok(None);
        };
        let turns = self
            .store
            .recent_turns(session_id, self.settings.max_turns)
            .await?;
        Ok(Some(SessionView {
            session_id: record.session_id,
            status: record.status,
            created_at: record.created_at,
            last_activity_at: record.last_activity_at,
            context: record.context,
            turns,
        }))
    }

    /// Appends a turn and returns its turn number.
    pub async fn record_turn(&self, session_id: &str, turn: &NewTurn) -> Result<u32, RuntimeError> {
        let not_found = || RuntimeError::SessionNotFound {
            session_id: session_id.to_owned(),
        };
        if self.readable(session_id).await?.is_none() {
            return Err(not_found());
        }
        let record = self
            .store
            .append_turn(session_id, turn, Utc::now())
            .await?
            .ok_or_else(not_found)?;
        Ok(record.turn_number)
    }

    /// Closes the session. `false` when it is missing, closed or expired.
    pub async fn end(&self, session_id: &str, reason: &str) -> Result<bool, RuntimeError> {
        if self.readable(session_id).await?.is_none() {
            return Ok(false);
        }
        let mut context = Map::new();
        context.insert("end_reason".to_owned(), json!(reason));
        context.insert("ended_at".to_owned(), json!(format_timestamp(Utc::now())));
        let closed = self.store.close_session(session_id, &context).await?;
        if closed {
            tracing::info!(session_id, reason, "session ended");
        }
        Ok(closed)
    }

    /// Flags the session for a human agent and returns the transfer id.
    pub async fn request_transfer(
        &self,
        session_id: &str,
        reason: Option<&str>,
    ) -> Result<Option<String>, RuntimeError> {
        if self.readable(session_id).await?.is_none() {
            return Ok(None);
        }
        let transfer_id: String = Uuid::new_v4()
            .simple()
            .to_string()
            .chars()
            .take(TRANSFER_ID_LENGTH)
            .collect();
        let mut context = Map::new();
        context.insert("transfer_requested".to_owned(), json!(true));
        context.insert("transfer_id".to_owned(), json!(transfer_id));
        context.insert("transfer_reason".to_owned(), json!(reason));
        context.insert(
            "transfer_time".to_owned(),
            json!(format_timestamp(Utc::now())),
        );
        if !self.store.update_context(session_id, &context).await? {
            return Ok(None);
        }
        tracing::info!(session_id, transfer_id = %transfer_id, reason, "transfer requested");
        Ok(Some(transfer_id))
    }

    /// Stores feedback for a session in any status. `false` when the session
    /// or the referenced turn does not exist.
    pub async fn save_feedback(&self, feedback: &NewFeedback) -> Result<bool, RuntimeError> {
        if let Some(text) = &feedback.feedback_text
            && text.chars().count() > MAX_FEEDBACK_CHARS
        {
            return Err(ValidationError::InvalidInput {
                message: format!("feedback_text must be at most {MAX_FEEDBACK_CHARS} characters"),
            }
            .into());
        }
        if self.store.get_session(&feedback.session_id).await?.is_none() {
            return Ok(false);
        }
        if let Some(turn_number) = feedback.turn_number
            && !self
                .store
                .turn_exists(&feedback.session_id, turn_number)
                .await?
        {
            return Ok(false);
        }
        let record = self.store.save_feedback(feedback, Utc::now()).await?;
        tracing::info!(
            session_id = %record.session_id,
            feedback_id = record.feedback_id,
            feedback_type = record.feedback_type.as_str(),
            "feedback saved"
        );
        Ok(true)
    }

    pub async fn stats(&self, session_id: &str) -> Result<Option<SessionStats>, RuntimeError> {
        let Some(record) = self.readable(session_id).await? else {
            return Ok(None);
        };
        let summary = self.store.turn_summary(session_id).await?;
        Ok(Some(SessionStats {
            session_id: record.session_id,
            created_at: record.created_at,
            last_activity: record.last_activity_at,
            total_turns: summary.total_turns,
            intents_used: summary.intents_used,
            avg_confidence: summary.avg_confidence,
        }))
    }

    pub async fn overview(&self) -> Result<SessionOverview, RuntimeError> {
        let counts = self.store.session_counts().await?;
        let last_sweep_at = *self.last_sweep.lock().await;
        Ok(SessionOverview {
            active_sessions: counts.active,
            expired_sessions: counts.expired,
            closed_sessions: counts.closed,
            total_sessions: counts.total_sessions(),
            total_turns: counts.total_turns,
            last_sweep_at,
        })
    }

    /// Expires idle sessions unless a sweep ran within the sweep interval.
    /// Returns the number of sessions expired, or `None` when skipped.
    pub async fn sweep_expired_if_due(&self) -> Result<Option<u64>, RuntimeError> {
        let now = Utc::now();
        let mut last_sweep = self.last_sweep.lock().await;
        if let Some(previous) = *last_sweep
            && now - previous < self.settings.sweep_interval
        {
            return Ok(None);
        }

        let expired = self
            .store
            .expire_idle_sessions(now - self.settings.ttl)
            .await?;
        *last_sweep = Some(now);
        if expired > 0 {
            tracing::info!(expired, "expired idle sessions");
        }
        Ok(Some(expired))
    }

    fn is_expired(&self, record: &SessionRecord, now: DateTime<Utc>) -> bool {
        record.is_expired_at(now, self.settings.ttl)
    }

    /// Loads an active, unexpired session, expiring it first if its TTL ran out.
    async fn readable(&self, session_id: &str) -> Result<Option<SessionRecord>, RuntimeError> {
        let Some(record) = self.store.get_session(session_id).await? else {
            return Ok(None);
        };
        if !record.is_active() {
            return Ok(None);
        }
        if self.is_expired(&record, Utc::now()) {
            self.store.mark_expired(session_id).await?;
            tracing::debug!(session_id, "session expired on read");
            return Ok(None);
        }
        Ok(Some(record))
    }
}

fn is_acceptable_session_id(id: &str) -> bool {
    !id.is_empty()
        && id.len() <= MAX_SESSION_ID_LEN
        && id.bytes().all(|byte| byte.is_ascii_graphic())
}
