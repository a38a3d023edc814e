mod chat;
mod config;
mod embedding;
mod error;
mod faq;
mod session;
mod tracing;

pub use chat::{
    ChatReply, ChatRequest, Emotion, IntentLabel, PolicyDecision, ResponseSource, Urgency,
    clamp_unit,
};
pub use config::{
    AnalyzerConfig, ClassifierConfig, ConfigError, EmbeddingBackend, EmbeddingConfig,
    HelpdeskConfig, MIN_SWEEP_INTERVAL_SECS, Model2vecModel, SUPPORTED_CONFIG_MAJOR_VERSION,
    SearchConfig, ServerConfig, SessionConfig, StoreConfig, StoreLocation, validate_config_version,
};
pub use embedding::{EMBEDDING_DIMENSIONS, Embedder, cosine_similarity};
pub use error::{EmbeddingError, RuleError, RuntimeError, StoreError, ValidationError};
pub use faq::{FaqCandidate, FaqEntry, FaqIndex};
pub use session::{
    FeedbackRecord, FeedbackType, NewFeedback, NewTurn, SessionCounts, SessionRecord,
    SessionStatus, SessionStore, TurnRecord, TurnSummary, format_timestamp, parse_timestamp,
};
pub use tracing::init_tracing;
