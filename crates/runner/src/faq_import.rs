use std::{
    io,
    path::{Path, PathBuf},
};

use serde::Deserialize;
use thiserror::Error;
use types::{Embedder, EmbeddingError, FaqEntry, FaqIndex, StoreError};
use uuid::Uuid;

const DEFAULT_CATEGORY: &str = "general";

/// One record of an FAQ import document.
#[derive(Debug, Clone, Deserialize)]
pub struct FaqImportRecord {
    #[serde(default)]
    pub faq_uuid: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    pub question: String,
    pub answer: String,
}

#[derive(Debug, Error)]
pub enum FaqImportError {
    #[error("failed to read FAQ file `{path}`: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("FAQ document is not a valid JSON array of entries: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("FAQ entry #{index} has an empty {field}")]
    EmptyField { index: usize, field: &'static str },
    #[error("FAQ entry `{faq_uuid}` has a question with no searchable words")]
    UnsearchableQuestion { faq_uuid: String },
    #[error(transparent)]
    Embedding(#[from] EmbeddingError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Parses an import document into entries, assigning a v4 uuid where the
/// record has none.
pub fn parse_faq_document(raw: &str) -> Result<Vec<FaqEntry>, FaqImportError> {
    let records: Vec<FaqImportRecord> = serde_json::from_str(raw)?;
    records
        .into_iter()
        .enumerate()
        .map(|(index, record)| {
            let question = record.question.trim();
            if question.is_empty() {
                return Err(FaqImportError::EmptyField {
                    index,
                    field: "question",
                });
            }
            let answer = record.answer.trim();
            if answer.is_empty() {
                return Err(FaqImportError::EmptyField {
                    index,
                    field: "answer",
                });
            }
            let faq_uuid = record
                .faq_uuid
                .map(|uuid| uuid.trim().to_owned())
                .filter(|uuid| !uuid.is_empty())
                .unwrap_or_else(|| Uuid::new_v4().to_string());
            let category = record
                .category
                .map(|category| category.trim().to_owned())
                .filter(|category| !category.is_empty())
                .unwrap_or_else(|| DEFAULT_CATEGORY.to_owned());
            Ok(FaqEntry {
                faq_uuid,
                category,
                question: question.to_owned(),
                answer: answer.to_owned(),
            })
        })
        .collect()
}

/// Embeds every question in one batch and upserts the entries. Returns the
/// number of entries written. Nothing is written when any question embeds to
/// a zero vector.
pub async fn import_faq_entries(
    entries: &[FaqEntry],
    embedder: &dyn Embedder,
    index: &dyn FaqIndex,
) -> Result<usize, FaqImportError> {
    let questions: Vec<String> = entries.iter().map(|entry| entry.question.clone()).collect();
    let embeddings = embedder.embed_batch(&questions)?;
    if let Some((entry, _)) = entries
        .iter()
        .zip(&embeddings)
        .find(|(_, embedding)| embedding.iter().all(|value| *value == 0.0))
    {
        return Err(FaqImportError::UnsearchableQuestion {
            faq_uuid: entry.faq_uuid.clone(),
        });
    }
    for (entry, embedding) in entries.iter().zip(&embeddings) {
        index.upsert(entry, embedding, embedder.model_id()).await?;
        tracing::debug!(faq_uuid = %entry.faq_uuid, category = %entry.category, "faq entry upserted");
    }
    tracing::info!(
        imported = entries.len(),
        model = embedder.model_id(),
        "faq import finished"
    );
    Ok(entries.len())
}

pub async fn import_faq_file(
    path: &Path,
    embedder: &dyn Embedder,
    index: &dyn FaqIndex,
) -> Result<usize, FaqImportError> {
    let raw = std::fs::read_to_string(path).map_err(|source| FaqImportError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let entries = parse_faq_document(&raw)?;
    import_faq_entries(&entries, embedder, index).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_assigns_missing_uuid_and_category() {
        let entries = parse_faq_document(
            r#"[
                {"faq_uuid": "faq-1", "category": "billing", "question": " Refunds? ", "answer": "Yes."},
                {"question": "Do you ship abroad?", "answer": "To 40 countries."}
            ]"#,
        )
        .expect("document should parse");

        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].faq_uuid, "faq-1");
        assert_eq!(entries[0].question, "Refunds?");
        assert_eq!(entries[1].category, DEFAULT_CATEGORY);
        assert!(Uuid::parse_str(&entries[1].faq_uuid).is_ok());
    }

    #[test]
    fn parse_rejects_blank_question() {
        let error = parse_faq_document(r#"[{"question": "  ", "answer": "x"}]"#)
            .expect_err("blank question should fail");
        assert!(matches!(
            error,
            FaqImportError::EmptyField {
                index: 0,
                field: "question"
            }
        ));
    }

    #[test]
    fn parse_rejects_non_array_documents() {
        let error = parse_faq_document(r#"{"question": "a", "answer": "b"}"#)
            .expect_err("object document should fail");
        assert!(matches!(error, FaqImportError::Parse(_)));
    }
}
