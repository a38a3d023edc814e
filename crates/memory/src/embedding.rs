use std::sync::Arc;

use model2vec_rs::model::StaticModel;
use types::{
    EMBEDDING_DIMENSIONS, Embedder, EmbeddingBackend, EmbeddingConfig, EmbeddingError,
    Model2vecModel,
};

const DETERMINISTIC_EMBEDDING_MODEL: &str = "deterministic-hash-v1";

/// Text encoder used for casual patterns, user queries and FAQ questions.
///
/// Every vector it returns is exactly [`EMBEDDING_DIMENSIONS`] wide, so the
/// output can go straight into the `F32_BLOB(512)` column.
#[derive(Debug, Clone)]
pub struct EmbeddingAdapter {
    backend: Backend,
}

#[derive(Debug, Clone)]
enum Backend {
    Deterministic,
    Model2vec(Model2vecBackend),
}

#[derive(Debug, Clone)]
struct Model2vecBackend {
    model_id: String,
    model: Arc<StaticModel>,
}

impl EmbeddingAdapter {
    pub fn from_config(config: &EmbeddingConfig) -> Result<Self, EmbeddingError> {
        match config.backend {
            EmbeddingBackend::Deterministic => Ok(Self::deterministic()),
            EmbeddingBackend::Model2vec => Self::model2vec(config.model2vec_model),
        }
    }

    /// Bag-of-words feature hashing. Needs no model download; texts sharing
    /// tokens score proportionally to the overlap.
    pub fn deterministic() -> Self {
        Self {
            backend: Backend::Deterministic,
        }
    }

    pub fn model2vec(model: Model2vecModel) -> Result<Self, EmbeddingError> {
        let model_id = model.model_id();
        let loaded = StaticModel::from_pretrained(model_id, None, None, None).map_err(|error| {
            EmbeddingError::ModelLoad {
                model: model_id.to_owned(),
                message: error.to_string(),
            }
        })?;
        tracing::info!(model = model_id, "loaded model2vec embedding model");
        Ok(Self {
            backend: Backend::Model2vec(Model2vecBackend {
                model_id: model_id.to_owned(),
                model: Arc::new(loaded),
            }),
        })
    }
}

impl Default for EmbeddingAdapter {
    fn default() -> Self {
        Self::deterministic()
    }
}

impl Embedder for EmbeddingAdapter {
    fn model_id(&self) -> &str {
        match &self.backend {
            Backend::Deterministic => DETERMINISTIC_EMBEDDING_MODEL,
            Backend::Model2vec(backend) => backend.model_id.as_str(),
        }
    }

    /// Whitespace-only input maps to the zero vector.
    fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        let normalized = normalize_text(text);
        if normalized.is_empty() {
            return Ok(vec![0.0; EMBEDDING_DIMENSIONS]);
        }
        let mut vectors = self.embed_batch(&[normalized])?;
        vectors.pop().ok_or(EmbeddingError::BatchLength {
            expected: 1,
            actual: 0,
        })
    }

    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let vectors = match &self.backend {
            Backend::Deterministic => texts
                .iter()
                .map(|text| deterministic_embedding(text))
                .collect::<Vec<_>>(),
            Backend::Model2vec(backend) => backend.model.encode(texts),
        };
        if vectors.len() != texts.len() {
            return Err(EmbeddingError::BatchLength {
                expected: texts.len(),
                actual: vectors.len(),
            });
        }
        vectors
            .into_iter()
            .map(normalize_embedding_dimensions)
            .collect()
    }
}

fn normalize_text(input: &str) -> String {
    input.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn deterministic_embedding(text: &str) -> Vec<f32> {
    let mut embedding = vec![0.0_f32; EMBEDDING_DIMENSIONS];
    for token in text
        .split(|ch: char| !ch.is_alphanumeric())
        .filter(|token| !token.is_empty())
    {
        let token = token.to_lowercase();
        let digest = blake3::hash(token.as_bytes());
        let bytes = digest.as_bytes();
        let bucket = u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]) as usize
            % EMBEDDING_DIMENSIONS;
        let sign = if bytes[4] & 1 == 0 { 1.0 } else { -1.0 };
        embedding[bucket] += sign;
    }

    let norm = embedding
        .iter()
        .map(|value| value * value)
        .sum::<f32>()
        .sqrt();
    if norm > f32::EPSILON {
        for value in &mut embedding {
            *value /= norm;
        }
    }
    embedding
}

fn normalize_embedding_dimensions(mut embedding: Vec<f32>) -> Result<Vec<f32>, EmbeddingError> {
    match embedding.len().cmp(&EMBEDDING_DIMENSIONS) {
        std::cmp::Ordering::Less => {
            embedding.resize(EMBEDDING_DIMENSIONS, 0.0);
            Ok(embedding)
        }
        std::cmp::Ordering::Equal => Ok(embedding),
        std::cmp::Ordering::Greater => Err(EmbeddingError::DimensionOverflow {
            actual: embedding.len(),
            max: EMBEDDING_DIMENSIONS,
        }),
    }
}

pub(crate) fn encode_embedding_json(embedding: &[f32]) -> Result<String, serde_json::Error> {
    serde_json::to_string(embedding)
}

#[cfg(test)]
mod tests {
    use types::cosine_similarity;

    use super::*;

    #[test]
    fn deterministic_vectors_have_index_width_and_unit_norm() {
        let adapter = EmbeddingAdapter::deterministic();
        let vector = adapter.embed("Where is my order?").expect("embed");
        assert_eq!(vector.len(), EMBEDDING_DIMENSIONS);
        let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
    }

    #[test]
    fn deterministic_embedding_ignores_case_and_punctuation() {
        let adapter = EmbeddingAdapter::deterministic();
        let left = adapter.embed("What are your business hours?").expect("embed");
        let right = adapter.embed("what are your business hours").expect("embed");
        assert!((cosine_similarity(&left, &right) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn blank_input_embeds_to_zero_vector() {
        let adapter = EmbeddingAdapter::deterministic();
        let vector = adapter.embed("   \n\t").expect("embed");
        assert_eq!(vector.len(), EMBEDDING_DIMENSIONS);
        assert!(vector.iter().all(|value| *value == 0.0));
    }

    #[test]
    fn batch_embedding_preserves_order() {
        let adapter = EmbeddingAdapter::deterministic();
        let texts = vec!["hello".to_owned(), "refund policy".to_owned()];
        let batch = adapter.embed_batch(&texts).expect("batch");
        assert_eq!(batch.len(), 2);
        assert_eq!(batch[0], adapter.embed("hello").expect("embed"));
        assert_eq!(batch[1], adapter.embed("refund policy").expect("embed"));
    }

    #[test]
    fn oversized_embeddings_are_rejected() {
        let error = normalize_embedding_dimensions(vec![0.5; EMBEDDING_DIMENSIONS + 1])
            .expect_err("oversized vector should fail");
        assert!(matches!(error, EmbeddingError::DimensionOverflow { .. }));
        let padded = normalize_embedding_dimensions(vec![1.0; 256]).expect("pad");
        assert_eq!(padded.len(), EMBEDDING_DIMENSIONS);
        assert_eq!(padded[300], 0.0);
    }

    #[test]
    fn model_id_names_the_backend() {
        assert_eq!(
            EmbeddingAdapter::deterministic().model_id(),
            DETERMINISTIC_EMBEDDING_MODEL
        );
    }
}
