use serde_json::{Map, json};
use types::{IntentLabel, PolicyDecision, ResponseSource, RuntimeError};

use crate::{classifier::IntentClassifier, search::SemanticSearch};

pub const ESCALATION_MESSAGE: &str =
    "I apologize, but I need to escalate this to a human agent for better assistance.";

/// Casual reply, then FAQ answer, then human escalation. The first stage
/// that produces an answer decides the response.
pub struct ResponsePolicy {
    classifier: IntentClassifier,
    search: SemanticSearch,
}

impl ResponsePolicy {
    pub fn new(classifier: IntentClassifier, search: SemanticSearch) -> Self {
        Self { classifier, search }
    }

    pub async fn decide(&self, query: &str) -> Result<PolicyDecision, RuntimeError> {
        let classification = self.classifier.classify(query)?;
        if classification.label == IntentLabel::Casual {
            let mut metadata = Map::new();
            if let Some(category) = classification.category() {
                metadata.insert("category".to_owned(), json!(category));
            }
            return Ok(PolicyDecision {
                response_text: classification.response().unwrap_or_default().to_owned(),
                source: ResponseSource::Casual,
                confidence: classification.confidence,
                need_human: false,
                metadata,
            });
        }

        let outcome = self.search.search(query).await?;
        if let (true, Some(entry)) = (outcome.found, outcome.entry) {
            let mut metadata = Map::new();
            metadata.insert("faq_uuid".to_owned(), json!(entry.faq_uuid));
            metadata.insert("category".to_owned(), json!(entry.category));
            metadata.insert("matched_question".to_owned(), json!(entry.question));
            return Ok(PolicyDecision {
                response_text: entry.answer,
                source: ResponseSource::Faq,
                confidence: outcome.score,
                need_human: false,
                metadata,
            });
        }

        tracing::debug!(best_score = outcome.score, "no confident answer; escalating");
        Ok(PolicyDecision {
            response_text: ESCALATION_MESSAGE.to_owned(),
            source: ResponseSource::Human,
            confidence: 0.0,
            need_human: true,
            metadata: Map::new(),
        })
    }
}
