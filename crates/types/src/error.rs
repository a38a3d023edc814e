use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store connection failed: {message}")]
    Connection { message: String },
    #[error("store initialization failed: {message}")]
    Initialization { message: String },
    #[error("store migration failed: {message}")]
    Migration { message: String },
    #[error("store query failed: {message}")]
    Query { message: String },
    #[error("store serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl StoreError {
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
        }
    }

    pub fn initialization(message: impl Into<String>) -> Self {
        Self::Initialization {
            message: message.into(),
        }
    }

    pub fn migration(message: impl Into<String>) -> Self {
        Self::Migration {
            message: message.into(),
        }
    }

    pub fn query(message: impl Into<String>) -> Self {
        Self::Query {
            message: message.into(),
        }
    }
}

#[derive(Debug, Error)]
pub enum EmbeddingError {
    #[error("embedding model `{model}` failed to load: {message}")]
    ModelLoad { model: String, message: String },
    #[error("embedding model `{model}` failed to encode input: {message}")]
    Encode { model: String, message: String },
    #[error("embedding has {actual} dimensions, index supports at most {max}")]
    DimensionOverflow { actual: usize, max: usize },
    #[error("embedding batch returned {actual} vectors for {expected} inputs")]
    BatchLength { expected: usize, actual: usize },
}

#[derive(Debug, Error)]
pub enum RuleError {
    #[error("failed to read {document} from `{path}`: {message}")]
    Read {
        document: &'static str,
        path: String,
        message: String,
    },
    #[error("failed to parse {document}: {message}")]
    Parse {
        document: &'static str,
        message: String,
    },
    #[error("casual pattern set is empty")]
    EmptyPatterns,
    #[error("casual pattern category `{category}` has no responses")]
    MissingResponses { category: String },
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("message is empty")]
    EmptyInput,
    #[error("message has {actual} characters; limit is {max_chars}")]
    MessageTooLong { max_chars: usize, actual: usize },
    #[error("invalid input: {message}")]
    InvalidInput { message: String },
}

#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Embedding(#[from] EmbeddingError),
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Rule(#[from] RuleError),
    #[error("session `{session_id}` not found")]
    SessionNotFound { session_id: String },
}
