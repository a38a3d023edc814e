use async_trait::async_trait;
use chrono::{DateTime, Utc};
use libsql::{Connection, Row, params};
use serde_json::{Map, Value};
use types::{
    FeedbackRecord, NewFeedback, NewTurn, SessionCounts, SessionRecord, SessionStatus,
    SessionStore, StoreError, TurnRecord, TurnSummary, format_timestamp, parse_timestamp,
};

use crate::{LibsqlStore, schema::rollback_quietly};

const TURN_COLUMNS: &str = "session_id, turn_number, user_input, intent, confidence, bot_response,
     slots_json, emotion, urgency, processing_time_ms, created_at";

#[async_trait]
impl SessionStore for LibsqlStore {
    async fn create_session(&self, record: &SessionRecord) -> Result<(), StoreError> {
        let conn = self.open_connection().await?;
        let context_json = serde_json::to_string(&record.context)?;
        conn.execute(
            "INSERT INTO sessions (session_id, status, context_json, created_at, last_activity_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                record.session_id.as_str(),
                record.status.as_str(),
                context_json,
                format_timestamp(record.created_at),
                format_timestamp(record.last_activity_at),
            ],
        )
        .await
        .map_err(|e| StoreError::query(format!("failed to create session: {e}")))?;
        Ok(())
    }

    async fn get_session(&self, session_id: &str) -> Result<Option<SessionRecord>, StoreError> {
        let conn = self.open_connection().await?;
        let mut rows = conn
            .query(
                "SELECT session_id, status, context_json, created_at, last_activity_at
                 FROM sessions
                 WHERE session_id = ?1
                 LIMIT 1",
                params![session_id],
            )
            .await
            .map_err(|e| StoreError::query(format!("failed to get session: {e}")))?;

        let Some(row) = rows
            .next()
            .await
            .map_err(|e| StoreError::query(format!("failed to read session row: {e}")))?
        else {
            return Ok(None);
        };

        Ok(Some(session_from_row(&row)?))
    }

    async fn touch_session(
        &self,
        session_id: &str,
        at: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        let conn = self.open_connection().await?;
        let updated = conn
            .execute(
                "UPDATE sessions SET last_activity_at = ?2
                 WHERE session_id = ?1 AND status = 'active'",
                params![session_id, format_timestamp(at)],
            )
            .await
            .map_err(|e| StoreError::query(format!("failed to touch session: {e}")))?;
        Ok(updated > 0)
    }

    async fn close_session(
        &self,
        session_id: &str,
        context: &Map<String, Value>,
    ) -> Result<bool, StoreError> {
        let conn = self.open_connection().await?;
        let patch = serde_json::to_string(context)?;
        let updated = conn
            .execute(
                "UPDATE sessions
                 SET status = 'closed', context_json = json_patch(context_json, ?2)
                 WHERE session_id = ?1 AND status = 'active'",
                params![session_id, patch],
            )
            .await
            .map_err(|e| StoreError::query(format!("failed to close session: {e}")))?;
        Ok(updated > 0)
    }

    async fn mark_expired(&self, session_id: &str) -> Result<bool, StoreError> {
        let conn = self.open_connection().await?;
        let updated = conn
            .execute(
                "UPDATE sessions SET status = 'expired'
                 WHERE session_id = ?1 AND status = 'active'",
                params![session_id],
            )
            .await
            .map_err(|e| StoreError::query(format!("failed to expire session: {e}")))?;
        Ok(updated > 0)
    }

    async fn update_context(
        &self,
        session_id: &str,
        context: &Map<String, Value>,
    ) -> Result<bool, StoreError> {
        let conn = self.open_connection().await?;
        let patch = serde_json::to_string(context)?;
        let updated = conn
            .execute(
                "UPDATE sessions SET context_json = json_patch(context_json, ?2)
                 WHERE session_id = ?1 AND status = 'active'",
                params![session_id, patch],
            )
            .await
            .map_err(|e| StoreError::query(format!("failed to update session context: {e}")))?;
        Ok(updated > 0)
    }

    async fn append_turn(
        &self,
        session_id: &str,
        turn: &NewTurn,
        at: DateTime<Utc>,
    ) -> Result<Option<TurnRecord>, StoreError> {
        let conn = self.open_connection().await?;
        let slots_json = serde_json::to_string(&turn.slots)?;
        let processing_time_ms = i64::try_from(turn.processing_time_ms).map_err(|_| {
            StoreError::query("turn processing time exceeds sqlite integer range")
        })?;
        let created_at = format_timestamp(at);

        conn.execute("BEGIN IMMEDIATE TRANSACTION", params![])
            .await
            .map_err(|e| StoreError::query(e.to_string()))?;
        let transaction_result = async {
            if !session_is_active(&conn, session_id).await? {
                return Ok(None);
            }
            let turn_number = next_turn_number(&conn, session_id).await?;

            conn.execute(
                "INSERT INTO conversation_turns (
                    session_id, turn_number, user_input, intent, confidence, bot_response,
                    slots_json, emotion, urgency, processing_time_ms, created_at
                 ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
                params![
                    session_id,
                    i64::from(turn_number),
                    turn.user_input.as_str(),
                    turn.intent.as_str(),
                    turn.confidence,
                    turn.bot_response.as_str(),
                    slots_json.as_str(),
                    turn.emotion.as_str(),
                    turn.urgency.as_str(),
                    processing_time_ms,
                    created_at.as_str(),
                ],
            )
            .await
            .map_err(|e| StoreError::query(format!("failed to insert turn: {e}")))?;

            conn.execute(
                "UPDATE sessions SET last_activity_at = ?2 WHERE session_id = ?1",
                params![session_id, created_at.as_str()],
            )
            .await
            .map_err(|e| StoreError::query(format!("failed to refresh session activity: {e}")))?;

            Ok::<Option<u32>, StoreError>(Some(turn_number))
        }
        .await;
        let turn_number = match transaction_result {
            Ok(turn_number) => turn_number,
            Err(error) => {
                rollback_quietly(&conn).await;
                return Err(error);
            }
        };
        conn.execute("COMMIT TRANSACTION", params![])
            .await
            .map_err(|e| StoreError::query(e.to_string()))?;

        Ok(turn_number.map(|turn_number| TurnRecord {
            session_id: session_id.to_owned(),
            turn_number,
            user_input: turn.user_input.clone(),
            intent: turn.intent.clone(),
            confidence: turn.confidence,
            bot_response: turn.bot_response.clone(),
            slots: turn.slots.clone(),
            emotion: turn.emotion,
            urgency: turn.urgency,
            processing_time_ms: turn.processing_time_ms,
            created_at: at,
        }))
    }

    async fn recent_turns(
        &self,
        session_id: &str,
        limit: usize,
    ) -> Result<Vec<TurnRecord>, StoreError> {
        let conn = self.open_connection().await?;
        let limit = i64::try_from(limit)
            .map_err(|_| StoreError::query("turn limit exceeds sqlite integer range"))?;
        let mut rows = conn
            .query(
                &format!(
                    "SELECT {TURN_COLUMNS} FROM conversation_turns
                     WHERE session_id = ?1
                     ORDER BY turn_number DESC
                     LIMIT ?2"
                ),
                params![session_id, limit],
            )
            .await
            .map_err(|e| StoreError::query(format!("failed to load turns: {e}")))?;

        let mut turns = Vec::new();
        while let Some(row) = rows
            .next()
            .await
            .map_err(|e| StoreError::query(format!("failed to read turn row: {e}")))?
        {
            turns.push(turn_from_row(&row)?);
        }
        turns.reverse();
        Ok(turns)
    }

    async fn turn_summary(&self, session_id: &str) -> Result<TurnSummary, StoreError> {
        let conn = self.open_connection().await?;
        let mut rows = conn
            .query(
                "SELECT COUNT(*), COALESCE(AVG(confidence), 0.0)
                 FROM conversation_turns WHERE session_id = ?1",
                params![session_id],
            )
            .await
            .map_err(|e| StoreError::query(format!("failed to summarize turns: {e}")))?;
        let row = rows
            .next()
            .await
            .map_err(|e| StoreError::query(e.to_string()))?
            .ok_or_else(|| StoreError::query("turn summary returned no row"))?;
        let total_turns = row.get::<i64>(0).map_err(|e| StoreError::query(e.to_string()))?;
        let avg_confidence = row.get::<f64>(1).map_err(|e| StoreError::query(e.to_string()))?;

        let mut rows = conn
            .query(
                "SELECT DISTINCT intent FROM conversation_turns
                 WHERE session_id = ?1
                 ORDER BY intent ASC",
                params![session_id],
            )
            .await
            .map_err(|e| StoreError::query(format!("failed to list turn intents: {e}")))?;
        let mut intents_used = Vec::new();
        while let Some(row) = rows.next().await.map_err(|e| StoreError::query(e.to_string()))? {
            intents_used.push(row.get::<String>(0).map_err(|e| StoreError::query(e.to_string()))?);
        }

        Ok(TurnSummary {
            total_turns: u64::try_from(total_turns)
                .map_err(|_| StoreError::query("stored turn count is negative"))?,
            intents_used,
            avg_confidence,
        })
    }

    async fn turn_exists(&self, session_id: &str, turn_number: u32) -> Result<bool, StoreError> {
        let conn = self.open_connection().await?;
        let mut rows = conn
            .query(
                "SELECT 1 FROM conversation_turns
                 WHERE session_id = ?1 AND turn_number = ?2
                 LIMIT 1",
                params![session_id, i64::from(turn_number)],
            )
            .await
            .map_err(|e| StoreError::query(format!("failed to look up turn: {e}")))?;
        rows.next()
            .await
            .map(|row| row.is_some())
            .map_err(|e| StoreError::query(e.to_string()))
    }

    async fn save_feedback(
        &self,
        feedback: &NewFeedback,
        at: DateTime<Utc>,
    ) -> Result<FeedbackRecord, StoreError> {
        let conn = self.open_connection().await?;
        conn.execute(
            "INSERT INTO user_feedback (
                session_id, turn_number, feedback_type, feedback_text, created_at
             ) VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                feedback.session_id.as_str(),
                feedback.turn_number.map(i64::from),
                feedback.feedback_type.as_str(),
                feedback.feedback_text.as_deref(),
                format_timestamp(at),
            ],
        )
        .await
        .map_err(|e| StoreError::query(format!("failed to save feedback: {e}")))?;

        Ok(FeedbackRecord {
            feedback_id: conn.last_insert_rowid(),
            session_id: feedback.session_id.clone(),
            feedback_type: feedback.feedback_type,
            feedback_text: feedback.feedback_text.clone(),
            turn_number: feedback.turn_number,
            created_at: at,
        })
    }

    async fn expire_idle_sessions(&self, cutoff: DateTime<Utc>) -> Result<u64, StoreError> {
        let conn = self.open_connection().await?;
        conn.execute(
            "UPDATE sessions SET status = 'expired'
             WHERE status = 'active' AND last_activity_at < ?1",
            params![format_timestamp(cutoff)],
        )
        .await
        .map_err(|e| StoreError::query(format!("failed to expire idle sessions: {e}")))
    }

    async fn session_counts(&self) -> Result<SessionCounts, StoreError> {
        let conn = self.open_connection().await?;
        let mut counts = SessionCounts::default();
        let mut rows = conn
            .query(
                "SELECT status, COUNT(*) FROM sessions GROUP BY status",
                params![],
            )
            .await
            .map_err(|e| StoreError::query(format!("failed to count sessions: {e}")))?;
        while let Some(row) = rows.next().await.map_err(|e| StoreError::query(e.to_string()))? {
            let status = row.get::<String>(0).map_err(|e| StoreError::query(e.to_string()))?;
            let count = row.get::<i64>(1).map_err(|e| StoreError::query(e.to_string()))?;
            let count = u64::try_from(count)
                .map_err(|_| StoreError::query("stored session count is negative"))?;
            match status.parse::<SessionStatus>().map_err(query_error)? {
                SessionStatus::Active => counts.active = count,
                SessionStatus::Expired => counts.expired = count,
                SessionStatus::Closed => counts.closed = count,
            }
        }

        let mut rows = conn
            .query("SELECT COUNT(*) FROM conversation_turns", params![])
            .await
            .map_err(|e| StoreError::query(format!("failed to count turns: {e}")))?;
        if let Some(row) = rows.next().await.map_err(|e| StoreError::query(e.to_string()))? {
            let total = row.get::<i64>(0).map_err(|e| StoreError::query(e.to_string()))?;
            counts.total_turns = u64::try_from(total)
                .map_err(|_| StoreError::query("stored turn count is negative"))?;
        }
        Ok(counts)
    }
}

async fn session_is_active(conn: &Connection, session_id: &str) -> Result<bool, StoreError> {
    let mut rows = conn
        .query(
            "SELECT status FROM sessions WHERE session_id = ?1 LIMIT 1",
            params![session_id],
        )
        .await
        .map_err(|e| StoreError::query(e.to_string()))?;
    let Some(row) = rows.next().await.map_err(|e| StoreError::query(e.to_string()))? else {
        return Ok(false);
    };
    let status = row.get::<String>(0).map_err(|e| StoreError::query(e.to_string()))?;
    Ok(status == SessionStatus::Active.as_str())
}

async fn next_turn_number(conn: &Connection, session_id: &str) -> Result<u32, StoreError> {
    let mut rows = conn
        .query(
            "SELECT COALESCE(MAX(turn_number), 0) FROM conversation_turns WHERE session_id = ?1",
            params![session_id],
        )
        .await
        .map_err(|e| StoreError::query(e.to_string()))?;
    let row = rows
        .next()
        .await
        .map_err(|e| StoreError::query(e.to_string()))?
        .ok_or_else(|| StoreError::query("failed to inspect existing turn numbers"))?;
    let max_turn = row.get::<i64>(0).map_err(|e| StoreError::query(e.to_string()))?;
    u32::try_from(max_turn + 1)
        .map_err(|_| StoreError::query(format!("turn number overflow for session `{session_id}`")))
}

fn session_from_row(row: &Row) -> Result<SessionRecord, StoreError> {
    let session_id = row
        .get::<String>(0)
        .map_err(|e| StoreError::query(e.to_string()))?;
    let status = row
        .get::<String>(1)
        .map_err(|e| StoreError::query(e.to_string()))?
        .parse::<SessionStatus>()
        .map_err(query_error)?;
    let context_json = row
        .get::<String>(2)
        .map_err(|e| StoreError::query(e.to_string()))?;
    let created_at = row
        .get::<String>(3)
        .map_err(|e| StoreError::query(e.to_string()))?;
    let last_activity_at = row
        .get::<String>(4)
        .map_err(|e| StoreError::query(e.to_string()))?;

    Ok(SessionRecord {
        session_id,
        status,
        created_at: parse_timestamp(&created_at).map_err(query_error)?,
        last_activity_at: parse_timestamp(&last_activity_at).map_err(query_error)?,
        context: serde_json::from_str(&context_json)?,
    })
}

fn turn_from_row(row: &Row) -> Result<TurnRecord, StoreError> {
    let session_id = row
        .get::<String>(0)
        .map_err(|e| StoreError::query(e.to_string()))?;
    let turn_number = row.get::<i64>(1).map_err(|e| StoreError::query(e.to_string()))?;
    let user_input = row
        .get::<String>(2)
        .map_err(|e| StoreError::query(e.to_string()))?;
    let intent = row
        .get::<String>(3)
        .map_err(|e| StoreError::query(e.to_string()))?;
    let confidence = row.get::<f64>(4).map_err(|e| StoreError::query(e.to_string()))?;
    let bot_response = row
        .get::<String>(5)
        .map_err(|e| StoreError::query(e.to_string()))?;
    let slots_json = row
        .get::<String>(6)
        .map_err(|e| StoreError::query(e.to_string()))?;
    let emotion = row
        .get::<String>(7)
        .map_err(|e| StoreError::query(e.to_string()))?;
    let urgency = row
        .get::<String>(8)
        .map_err(|e| StoreError::query(e.to_string()))?;
    let processing_time_ms = row.get::<i64>(9).map_err(|e| StoreError::query(e.to_string()))?;
    let created_at = row
        .get::<String>(10)
        .map_err(|e| StoreError::query(e.to_string()))?;

    Ok(TurnRecord {
        session_id,
        turn_number: u32::try_from(turn_number)
            .map_err(|_| StoreError::query(format!("stored turn number {turn_number} out of range")))?,
        user_input,
        intent,
        confidence,
        bot_response,
        slots: serde_json::from_str(&slots_json)?,
        emotion: emotion.parse().map_err(query_error)?,
        urgency: urgency.parse().map_err(query_error)?,
        processing_time_ms: u64::try_from(processing_time_ms).unwrap_or_default(),
        created_at: parse_timestamp(&created_at).map_err(query_error)?,
    })
}

fn query_error(error: impl std::fmt::Display) -> StoreError {
    StoreError::query(error.to_string())
}
