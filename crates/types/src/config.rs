use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const SUPPORTED_CONFIG_MAJOR_VERSION: u64 = 1;
pub const MIN_SWEEP_INTERVAL_SECS: u64 = 300;
const MAX_TOP_K: usize = 50;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HelpdeskConfig {
    #[serde(default = "default_config_version")]
    pub config_version: String,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub classifier: ClassifierConfig,
    #[serde(default)]
    pub search: SearchConfig,
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub analyzers: AnalyzerConfig,
}

impl Default for HelpdeskConfig {
    fn default() -> Self {
        Self {
            config_version: default_config_version(),
            server: ServerConfig::default(),
            store: StoreConfig::default(),
            embedding: EmbeddingConfig::default(),
            classifier: ClassifierConfig::default(),
            search: SearchConfig::default(),
            session: SessionConfig::default(),
            analyzers: AnalyzerConfig::default(),
        }
    }
}

impl HelpdeskConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_config_version(&self.config_version)?;
        self.server.validate()?;
        self.store.validate()?;
        self.classifier.validate()?;
        self.search.validate()?;
        self.session.validate()?;
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
    #[serde(default = "default_max_message_chars")]
    pub max_message_chars: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            max_message_chars: default_max_message_chars(),
        }
    }
}

impl ServerConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.bind_address.trim().is_empty() {
            return Err(ConfigError::EmptyBindAddress);
        }
        if self.max_message_chars == 0 {
            return Err(ConfigError::InvalidLimit {
                field: "server.max_message_chars",
                value: 0,
            });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default = "default_store_db_path")]
    pub db_path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remote_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth_token: Option<String>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            db_path: default_store_db_path(),
            remote_url: None,
            auth_token: None,
        }
    }
}

/// Where the store lives once `StoreConfig` has been resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreLocation {
    Local(PathBuf),
    Remote { url: String, auth_token: String },
}

impl StoreConfig {
    /// A non-blank `remote_url` selects remote mode and then needs a token;
    /// otherwise the trimmed `db_path` is used.
    pub fn location(&self) -> Result<StoreLocation, ConfigError> {
        let Some(url) = non_blank(self.remote_url.as_deref()) else {
            let db_path = self.db_path.trim();
            if db_path.is_empty() {
                return Err(ConfigError::InvalidStoreDatabasePath);
            }
            return Ok(StoreLocation::Local(PathBuf::from(db_path)));
        };
        let auth_token = non_blank(self.auth_token.as_deref()).ok_or_else(|| {
            ConfigError::MissingStoreAuthToken {
                remote_url: url.to_owned(),
            }
        })?;
        Ok(StoreLocation::Remote {
            url: url.to_owned(),
            auth_token: auth_token.to_owned(),
        })
    }

    fn validate(&self) -> Result<(), ConfigError> {
        self.location().map(|_| ())
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|value| !value.is_empty())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmbeddingBackend {
    #[default]
    Model2vec,
    Deterministic,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Model2vecModel {
    #[default]
    Potion8m,
    Potion32m,
}

impl Model2vecModel {
    /// Hugging Face repository id of the static model.
    pub fn model_id(self) -> &'static str {
        match self {
            Self::Potion8m => "minishlab/potion-base-8M",
            Self::Potion32m => "minishlab/potion-base-32M",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    #[serde(default)]
    pub backend: EmbeddingBackend,
    #[serde(default)]
    pub model2vec_model: Model2vecModel,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassifierConfig {
    #[serde(default = "default_casual_threshold")]
    pub casual_threshold: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub patterns_path: Option<String>,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            casual_threshold: default_casual_threshold(),
            patterns_path: None,
        }
    }
}

impl ClassifierConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if !is_ratio(self.casual_threshold) {
            return Err(ConfigError::InvalidThreshold {
                field: "classifier.casual_threshold",
                value: self.casual_threshold,
            });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchConfig {
    #[serde(default = "default_similarity_threshold")]
    pub similarity_threshold: f64,
    #[serde(default = "default_top_k")]
    pub top_k: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            similarity_threshold: default_similarity_threshold(),
            top_k: default_top_k(),
        }
    }
}

impl SearchConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if !is_ratio(self.similarity_threshold) {
            return Err(ConfigError::InvalidThreshold {
                field: "search.similarity_threshold",
                value: self.similarity_threshold,
            });
        }
        if self.top_k == 0 || self.top_k > MAX_TOP_K {
            return Err(ConfigError::InvalidTopK {
                value: self.top_k,
                max: MAX_TOP_K,
            });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionConfig {
    #[serde(default = "default_ttl_minutes")]
    pub ttl_minutes: u64,
    #[serde(default = "default_max_turns")]
    pub max_turns: usize,
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            ttl_minutes: default_ttl_minutes(),
            max_turns: default_max_turns(),
            sweep_interval_secs: default_sweep_interval_secs(),
        }
    }
}

impl SessionConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.ttl_minutes == 0 {
            return Err(ConfigError::InvalidLimit {
                field: "session.ttl_minutes",
                value: 0,
            });
        }
        if self.max_turns == 0 {
            return Err(ConfigError::InvalidLimit {
                field: "session.max_turns",
                value: 0,
            });
        }
        if self.sweep_interval_secs < MIN_SWEEP_INTERVAL_SECS {
            return Err(ConfigError::SweepIntervalTooShort {
                value: self.sweep_interval_secs,
                min: MIN_SWEEP_INTERVAL_SECS,
            });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AnalyzerConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rules_path: Option<String>,
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ConfigError {
    #[error("unsupported config_version `{version}`; supported major is {supported_major}")]
    UnsupportedConfigVersion {
        version: String,
        supported_major: u64,
    },
    #[error("invalid config_version format `{version}`")]
    InvalidConfigVersionFormat { version: String },
    #[error("server bind_address must not be empty")]
    EmptyBindAddress,
    #[error("`{field}` must be greater than zero; got {value}")]
    InvalidLimit { field: &'static str, value: u64 },
    #[error("`{field}` must be within [0.0, 1.0]; got {value}")]
    InvalidThreshold { field: &'static str, value: f64 },
    #[error("search top_k must be within 1..={max}; got {value}")]
    InvalidTopK { value: usize, max: usize },
    #[error("session sweep_interval_secs must be at least {min}; got {value}")]
    SweepIntervalTooShort { value: u64, min: u64 },
    #[error("store database path must not be empty in local mode")]
    InvalidStoreDatabasePath,
    #[error("store remote mode requires an auth token for `{remote_url}`")]
    MissingStoreAuthToken { remote_url: String },
}

pub fn validate_config_version(config_version: &str) -> Result<(), ConfigError> {
    let major = parse_major_version(config_version)?;
    if major != SUPPORTED_CONFIG_MAJOR_VERSION {
        return Err(ConfigError::UnsupportedConfigVersion {
            version: config_version.trim().to_owned(),
            supported_major: SUPPORTED_CONFIG_MAJOR_VERSION,
        });
    }
    Ok(())
}

fn parse_major_version(config_version: &str) -> Result<u64, ConfigError> {
    let trimmed = config_version.trim();
    let invalid = || ConfigError::InvalidConfigVersionFormat {
        version: trimmed.to_owned(),
    };
    if trimmed.is_empty() {
        return Err(ConfigError::InvalidConfigVersionFormat {
            version: config_version.to_owned(),
        });
    }

    let mut parts = trimmed.split('.');
    let first = parts.next().ok_or_else(invalid)?;
    let is_numeric = |part: &str| !part.is_empty() && part.chars().all(|ch| ch.is_ascii_digit());
    if !is_numeric(first) || !parts.all(is_numeric) {
        return Err(invalid());
    }

    first.parse::<u64>().map_err(|_| invalid())
}

fn default_config_version() -> String {
    "1.0.0".to_owned()
}

fn default_bind_address() -> String {
    "127.0.0.1:8000".to_owned()
}

fn default_max_message_chars() -> usize {
    1_000
}

fn default_store_db_path() -> String {
    ".helpdesk/helpdesk.db".to_owned()
}

fn default_casual_threshold() -> f64 {
    0.65
}

fn default_similarity_threshold() -> f64 {
    0.6
}

fn default_top_k() -> usize {
    3
}

fn default_ttl_minutes() -> u64 {
    30
}

fn default_max_turns() -> usize {
    10
}

fn default_sweep_interval_secs() -> u64 {
    MIN_SWEEP_INTERVAL_SECS
}

fn is_ratio(value: f64) -> bool {
    value.is_finite() && (0.0..=1.0).contains(&value)
}
