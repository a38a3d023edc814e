use std::sync::Arc;

use types::{Embedder, FaqEntry, FaqIndex, RuntimeError, clamp_unit};

#[derive(Debug, Clone, PartialEq)]
pub struct SearchOutcome {
    pub found: bool,
    /// Best candidate, present only when `found`.
    pub entry: Option<FaqEntry>,
    /// Clamped similarity of the best candidate, kept when below threshold.
    pub score: f64,
}

impl SearchOutcome {
    fn not_found(score: f64) -> Self {
        Self {
            found: false,
            entry: None,
            score,
        }
    }
}

/// Nearest-neighbour FAQ lookup with a similarity floor.
pub struct SemanticSearch {
    embedder: Arc<dyn Embedder>,
    index: Arc<dyn FaqIndex>,
    threshold: f64,
    top_k: usize,
}

impl SemanticSearch {
    pub fn new(
        embedder: Arc<dyn Embedder>,
        index: Arc<dyn FaqIndex>,
        threshold: f64,
        top_k: usize,
    ) -> Self {
        Self {
            embedder,
            index,
            threshold,
            top_k: top_k.max(1),
        }
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    pub async fn search(&self, query: &str) -> Result<SearchOutcome, RuntimeError> {
        let query_embedding = self.embedder.embed(query)?;
        if query_embedding.iter().all(|value| *value == 0.0) {
            return Ok(SearchOutcome::not_found(0.0));
        }

        let candidates = self.index.nearest(&query_embedding, self.top_k).await?;
        let Some(best) = candidates
            .into_iter()
            .max_by(|left, right| left.similarity.total_cmp(&right.similarity))
        else {
            tracing::debug!("faq index returned no candidates");
            return Ok(SearchOutcome::not_found(0.0));
        };

        let score = clamp_unit(best.similarity);
        if score < self.threshold {
            tracing::debug!(
                score,
                threshold = self.threshold,
                faq_uuid = %best.entry.faq_uuid,
                "best faq candidate below threshold"
            );
            return Ok(SearchOutcome::not_found(score));
        }

        Ok(SearchOutcome {
            found: true,
            entry: Some(best.entry),
            score,
        })
    }
}
