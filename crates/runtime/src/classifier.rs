use std::{collections::BTreeMap, fs, sync::Arc};

use rand::seq::SliceRandom;
use serde::Deserialize;
use serde_json::{Map, Value, json};
use types::{Embedder, IntentLabel, RuleError, RuntimeError, clamp_unit, cosine_similarity};

const BUNDLED_PATTERNS: &str = include_str!("../data/chat_patterns.json");
const PATTERNS_DOCUMENT: &str = "casual patterns";

/// Casual utterances and canned replies, keyed by category.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CasualPatterns {
    pub casual_patterns: BTreeMap<String, Vec<String>>,
    pub casual_responses: BTreeMap<String, Vec<String>>,
}

impl CasualPatterns {
    pub fn bundled() -> Result<Self, RuleError> {
        Self::from_json(BUNDLED_PATTERNS)
    }

    pub fn load(path: Option<&str>) -> Result<Self, RuleError> {
        let Some(path) = path else {
            return Self::bundled();
        };
        let raw = fs::read_to_string(path).map_err(|error| RuleError::Read {
            document: PATTERNS_DOCUMENT,
            path: path.to_owned(),
            message: error.to_string(),
        })?;
        Self::from_json(&raw)
    }

    pub fn from_json(raw: &str) -> Result<Self, RuleError> {
        serde_json::from_str(raw).map_err(|error| RuleError::Parse {
            document: PATTERNS_DOCUMENT,
            message: error.to_string(),
        })
    }

    fn validate(&self) -> Result<(), RuleError> {
        if self.casual_patterns.values().all(Vec::is_empty) {
            return Err(RuleError::EmptyPatterns);
        }
        for (category, patterns) in &self.casual_patterns {
            let has_responses = self
                .casual_responses
                .get(category)
                .is_some_and(|responses| !responses.is_empty());
            if !patterns.is_empty() && !has_responses {
                return Err(RuleError::MissingResponses {
                    category: category.clone(),
                });
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Classification {
    pub label: IntentLabel,
    pub confidence: f64,
    /// `{category, response, matched_pattern}` for casual results, empty
    /// otherwise.
    pub metadata: Map<String, Value>,
}

impl Classification {
    pub fn category(&self) -> Option<&str> {
        self.metadata.get("category").and_then(Value::as_str)
    }

    pub fn response(&self) -> Option<&str> {
        self.metadata.get("response").and_then(Value::as_str)
    }
}

struct ReferencePattern {
    category: String,
    utterance: String,
    embedding: Vec<f32>,
}

/// Decides between small talk and an information-seeking query by nearest
/// casual utterance.
pub struct IntentClassifier {
    embedder: Arc<dyn Embedder>,
    references: Vec<ReferencePattern>,
    responses: BTreeMap<String, Vec<String>>,
    threshold: f64,
}

impl IntentClassifier {
    /// Embeds every casual utterance once.
    pub fn new(
        embedder: Arc<dyn Embedder>,
        patterns: CasualPatterns,
        threshold: f64,
    ) -> Result<Self, RuntimeError> {
        patterns.validate()?;

        let mut categories = Vec::new();
        let mut utterances = Vec::new();
        for (category, category_patterns) in &patterns.casual_patterns {
            for utterance in category_patterns {
                categories.push(category.clone());
                utterances.push(utterance.clone());
            }
        }
        let embeddings = embedder.embed_batch(&utterances)?;
        let references = categories
            .into_iter()
            .zip(utterances)
            .zip(embeddings)
            .map(|((category, utterance), embedding)| ReferencePattern {
                category,
                utterance,
                embedding,
            })
            .collect::<Vec<_>>();
        tracing::debug!(
            patterns = references.len(),
            model = embedder.model_id(),
            "casual pattern embeddings ready"
        );

        Ok(Self {
            embedder,
            references,
            responses: patterns.casual_responses,
            threshold,
        })
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    pub fn classify(&self, query: &str) -> Result<Classification, RuntimeError> {
        let query_embedding = self.embedder.embed(query)?;
        let best = self
            .references
            .iter()
            .map(|reference| {
                (
                    reference,
                    cosine_similarity(&query_embedding, &reference.embedding),
                )
            })
            .max_by(|(_, left), (_, right)| left.total_cmp(right));
        let max_similarity = best.as_ref().map_or(0.0, |(_, similarity)| *similarity);

        if let Some((reference, similarity)) = best
            && similarity >= self.threshold
        {
            let response = self
                .responses
                .get(&reference.category)
                .and_then(|responses| responses.choose(&mut rand::thread_rng()))
                .cloned()
                .unwrap_or_default();
            let mut metadata = Map::new();
            metadata.insert("category".to_owned(), json!(reference.category));
            metadata.insert("response".to_owned(), json!(response));
            metadata.insert("matched_pattern".to_owned(), json!(reference.utterance));
            return Ok(Classification {
                label: IntentLabel::Casual,
                confidence: clamp_unit(similarity),
                metadata,
            });
        }

        // Inverted heuristic: distance from the nearest casual utterance.
        Ok(Classification {
            label: IntentLabel::Search,
            confidence: clamp_unit(1.0 - max_similarity),
            metadata: Map::new(),
        })
    }
}
