use async_trait::async_trait;
use libsql::params;
use types::{EMBEDDING_DIMENSIONS, FaqCandidate, FaqEntry, FaqIndex, StoreError};

use crate::{LibsqlStore, embedding::encode_embedding_json};

#[async_trait]
impl FaqIndex for LibsqlStore {
    async fn upsert(
        &self,
        entry: &FaqEntry,
        embedding: &[f32],
        model_id: &str,
    ) -> Result<(), StoreError> {
        if embedding.len() != EMBEDDING_DIMENSIONS {
            return Err(StoreError::query(format!(
                "faq embedding for `{}` has {} dimensions; expected {EMBEDDING_DIMENSIONS}",
                entry.faq_uuid,
                embedding.len()
            )));
        }
        if embedding.iter().all(|value| *value == 0.0) {
            return Err(StoreError::query(format!(
                "faq embedding for `{}` is a zero vector",
                entry.faq_uuid
            )));
        }
        let conn = self.open_connection().await?;
        let embedding_json = encode_embedding_json(embedding)?;
        conn.execute(
            "INSERT INTO faq_entries (faq_uuid, category, question, answer, embedding, embedding_model)
             VALUES (?1, ?2, ?3, ?4, vector32(?5), ?6)
             ON CONFLICT(faq_uuid) DO UPDATE SET
                 category = excluded.category,
                 question = excluded.question,
                 answer = excluded.answer,
                 embedding = vector32(?5),
                 embedding_model = excluded.embedding_model,
                 updated_at = CURRENT_TIMESTAMP",
            params![
                entry.faq_uuid.as_str(),
                entry.category.as_str(),
                entry.question.as_str(),
                entry.answer.as_str(),
                embedding_json,
                model_id,
            ],
        )
        .await
        .map_err(|e| StoreError::query(format!("failed to upsert faq entry: {e}")))?;
        Ok(())
    }

    async fn nearest(&self, query: &[f32], limit: usize) -> Result<Vec<FaqCandidate>, StoreError> {
        if limit == 0 {
            return Ok(Vec::new());
        }
        let conn = self.open_connection().await?;
        let query_json = encode_embedding_json(query)?;
        let limit = i64::try_from(limit)
            .map_err(|_| StoreError::query("faq search limit exceeds sqlite integer range"))?;
        let mut rows = conn
            .query(
                "SELECT faq_uuid, category, question, answer, distance
                 FROM (
                     SELECT faq_uuid, category, question, answer,
                            vector_distance_cos(embedding, vector32(?1)) AS distance
                     FROM faq_entries
                 )
                 WHERE distance IS NOT NULL
                 ORDER BY distance ASC, faq_uuid ASC
                 LIMIT ?2",
                params![query_json, limit],
            )
            .await
            .map_err(|e| StoreError::query(format!("faq vector search failed: {e}")))?;

        let mut candidates = Vec::new();
        while let Some(row) = rows
            .next()
            .await
            .map_err(|e| StoreError::query(format!("failed to read faq row: {e}")))?
        {
            let faq_uuid = row
                .get::<String>(0)
                .map_err(|e| StoreError::query(e.to_string()))?;
            let category = row
                .get::<String>(1)
                .map_err(|e| StoreError::query(e.to_string()))?;
            let question = row
                .get::<String>(2)
                .map_err(|e| StoreError::query(e.to_string()))?;
            let answer = row
                .get::<String>(3)
                .map_err(|e| StoreError::query(e.to_string()))?;
            // Zero-norm rows have no cosine distance.
            let Some(distance) = row
                .get::<Option<f64>>(4)
                .map_err(|e| StoreError::query(e.to_string()))?
            else {
                continue;
            };
            candidates.push(FaqCandidate {
                entry: FaqEntry {
                    faq_uuid,
                    category,
                    question,
                    answer,
                },
                similarity: 1.0 - distance,
            });
        }
        Ok(candidates)
    }

    async fn count(&self) -> Result<u64, StoreError> {
        let conn = self.open_connection().await?;
        let mut rows = conn
            .query("SELECT COUNT(*) FROM faq_entries", params![])
            .await
            .map_err(|e| StoreError::query(format!("failed to count faq entries: {e}")))?;
        let row = rows
            .next()
            .await
            .map_err(|e| StoreError::query(e.to_string()))?
            .ok_or_else(|| StoreError::query("faq count returned no row"))?;
        let count = row.get::<i64>(0).map_err(|e| StoreError::query(e.to_string()))?;
        u64::try_from(count).map_err(|_| StoreError::query("stored faq count is negative"))
    }
}
