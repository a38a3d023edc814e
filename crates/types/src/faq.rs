use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::StoreError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FaqEntry {
    pub faq_uuid: String,
    pub category: String,
    pub question: String,
    pub answer: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FaqCandidate {
    pub entry: FaqEntry,
    /// Cosine similarity (`1 - distance`), not clamped.
    pub similarity: f64,
}

/// Vector index over the FAQ knowledge base.
#[async_trait]
pub trait FaqIndex: Send + Sync {
    /// Inserts or replaces the entry with the same `faq_uuid`.
    async fn upsert(
        &self,
        entry: &FaqEntry,
        embedding: &[f32],
        model_id: &str,
    ) -> Result<(), StoreError>;

    /// Nearest entries by cosine distance, best first.
    async fn nearest(&self, query: &[f32], limit: usize) -> Result<Vec<FaqCandidate>, StoreError>;

    async fn count(&self) -> Result<u64, StoreError>;
}
