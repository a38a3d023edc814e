use crate::EmbeddingError;

/// Width of the FAQ vector column. Shorter model outputs are zero-padded.
pub const EMBEDDING_DIMENSIONS: usize = 512;

/// Text → dense vector encoder shared by the classifier and FAQ search.
pub trait Embedder: Send + Sync {
    fn model_id(&self) -> &str;

    fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError>;

    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError>;
}

/// Cosine similarity of two vectors; `0.0` when either has zero norm.
///
/// Vectors of different length are compared over their common prefix, which
/// matches the zero-padding applied before indexing.
pub fn cosine_similarity(left: &[f32], right: &[f32]) -> f64 {
    let mut dot = 0.0_f64;
    let mut left_norm = 0.0_f64;
    let mut right_norm = 0.0_f64;
    for (a, b) in left.iter().zip(right.iter()) {
        let (a, b) = (f64::from(*a), f64::from(*b));
        dot += a * b;
        left_norm += a * a;
        right_norm += b * b;
    }
    if left_norm == 0.0 || right_norm == 0.0 {
        return 0.0;
    }
    dot / (left_norm.sqrt() * right_norm.sqrt())
}
