use std::{sync::Arc, time::Instant};

use types::{ChatReply, ChatRequest, NewTurn, RuntimeError, ValidationError, clamp_unit};

use crate::{
    analyzers::{EmotionAnalyzer, UrgencyAnalyzer},
    policy::ResponsePolicy,
    rules::RuleSet,
    session_manager::SessionManager,
};

/// One chat exchange end to end: validation, session continuity, response
/// policy, emotion/urgency tagging and turn persistence.
pub struct ChatService {
    policy: ResponsePolicy,
    sessions: Arc<SessionManager>,
    emotion: EmotionAnalyzer,
    urgency: UrgencyAnalyzer,
    max_message_chars: usize,
}

impl ChatService {
    pub fn new(
        policy: ResponsePolicy,
        sessions: Arc<SessionManager>,
        rules: &RuleSet,
        max_message_chars: usize,
    ) -> Self {
        Self {
            policy,
            sessions,
            emotion: EmotionAnalyzer::new(rules),
            urgency: UrgencyAnalyzer::new(rules),
            max_message_chars,
        }
    }

    pub fn sessions(&self) -> &Arc<SessionManager> {
        &self.sessions
    }

    pub fn max_message_chars(&self) -> usize {
        self.max_message_chars
    }

    /// Returns the trimmed message. Length is counted in Unicode scalar
    /// values over the text as sent.
    pub fn validate<'a>(&self, user_text: &'a str) -> Result<&'a str, ValidationError> {
        let trimmed = user_text.trim();
        if trimmed.is_empty() {
            return Err(ValidationError::EmptyInput);
        }
        let length = user_text.chars().count();
        if length > self.max_message_chars {
            return Err(ValidationError::MessageTooLong {
                max_chars: self.max_message_chars,
                actual: length,
            });
        }
        Ok(trimmed)
    }

    pub async fn handle(&self, request: ChatRequest) -> Result<ChatReply, RuntimeError> {
        let started = Instant::now();
        let user_text = self.validate(&request.user_text)?;

        let session_id = self
            .sessions
            .create_or_resume(request.session_id.as_deref())
            .await?;
        let decision = self.policy.decide(user_text).await?;
        let emotion = self.emotion.analyze(user_text);
        let urgency = self.urgency.analyze(user_text);
        let confidence = clamp_unit(decision.confidence);
        let processing_time_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);

        let turn = NewTurn {
            user_input: user_text.to_owned(),
            intent: decision.source.as_str().to_owned(),
            confidence,
            bot_response: decision.response_text.clone(),
            slots: decision.metadata.clone(),
            emotion,
            urgency,
            processing_time_ms,
        };
        let turn_count = self.sessions.record_turn(&session_id, &turn).await?;

        tracing::info!(
            session_id = %session_id,
            turn = turn_count,
            intent = decision.source.as_str(),
            confidence,
            need_human = decision.need_human,
            emotion = emotion.as_str(),
            urgency = urgency.as_str(),
            processing_time_ms,
            "chat turn handled"
        );

        Ok(ChatReply {
            session_id,
            reply_text: decision.response_text,
            intent: decision.source,
            confidence,
            slots: decision.metadata,
            need_human: decision.need_human,
            turn_count,
            emotion,
            urgency,
        })
    }
}
