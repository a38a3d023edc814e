use std::{
    env, io,
    path::{Path, PathBuf},
};

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::Serialize;
use thiserror::Error;
use types::{
    ConfigError, EmbeddingBackend, EmbeddingError, HelpdeskConfig, RuleError, RuntimeError,
    StoreError,
};

const SYSTEM_CONFIG_DIR: &str = "/etc/helpdesk";
const USER_CONFIG_DIR: &str = ".config/helpdesk";
const WORKSPACE_CONFIG_DIR: &str = ".helpdesk";
pub const CONFIG_FILE_NAME: &str = "helpdesk.toml";
const CONFIG_ENV_PREFIX: &str = "HELPDESK__";
const DEFAULT_PROFILE: &str = "default";

#[derive(Debug, Clone)]
pub struct ConfigSearchPaths {
    pub system_dir: PathBuf,
    pub user_dir: Option<PathBuf>,
    pub workspace_dir: PathBuf,
    /// File passed with `--config`; merged after the discovered directories.
    pub explicit_file: Option<PathBuf>,
}

impl ConfigSearchPaths {
    pub fn discover() -> Result<Self, BootstrapError> {
        let workspace_dir = env::current_dir()?.join(WORKSPACE_CONFIG_DIR);
        let user_dir = env::var_os("HOME")
            .map(PathBuf::from)
            .map(|home| home.join(USER_CONFIG_DIR));
        Ok(Self {
            system_dir: PathBuf::from(SYSTEM_CONFIG_DIR),
            user_dir,
            workspace_dir,
            explicit_file: None,
        })
    }

    pub fn with_explicit_file(mut self, path: Option<PathBuf>) -> Self {
        self.explicit_file = path;
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CliOverrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub server: Option<ServerOverrides>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub store: Option<StoreOverrides>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub embedding: Option<EmbeddingOverrides>,
}

impl CliOverrides {
    pub fn with_bind_address(bind_address: Option<String>) -> Self {
        Self {
            server: bind_address.map(|bind_address| ServerOverrides {
                bind_address: Some(bind_address),
            }),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ServerOverrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bind_address: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StoreOverrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub db_path: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct EmbeddingOverrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub backend: Option<EmbeddingBackend>,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error("failed to resolve configuration path: {0}")]
    Io(#[from] io::Error),
    #[error("failed to load configuration: {0}")]
    ConfigExtract(#[source] Box<figment::Error>),
    #[error(transparent)]
    ConfigValidation(#[from] ConfigError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Embedding(#[from] EmbeddingError),
    #[error(transparent)]
    Rules(#[from] RuleError),
    #[error(transparent)]
    Runtime(#[from] RuntimeError),
    #[error("failed to bind HTTP listener on `{bind_address}`: {source}")]
    Bind {
        bind_address: String,
        #[source]
        source: io::Error,
    },
    #[error("HTTP server terminated: {0}")]
    Serve(#[source] io::Error),
}

impl From<figment::Error> for BootstrapError {
    fn from(value: figment::Error) -> Self {
        Self::ConfigExtract(Box::new(value))
    }
}

pub fn load_config(
    profile: Option<&str>,
    config_file: Option<PathBuf>,
    cli_overrides: CliOverrides,
) -> Result<HelpdeskConfig, BootstrapError> {
    let paths = ConfigSearchPaths::discover()?.with_explicit_file(config_file);
    load_config_with_paths(&paths, profile, cli_overrides)
}

/// Layers defaults, config files (system, user, workspace, `--config`),
/// `HELPDESK__SECTION__KEY` environment variables and CLI overrides, in that
/// order, then validates the result.
pub fn load_config_with_paths(
    paths: &ConfigSearchPaths,
    profile: Option<&str>,
    cli_overrides: CliOverrides,
) -> Result<HelpdeskConfig, BootstrapError> {
    let selected_profile = profile
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .unwrap_or(DEFAULT_PROFILE);

    let mut figment = Figment::from(Serialized::defaults(HelpdeskConfig::default()));
    figment = merge_file(figment, &paths.system_dir.join(CONFIG_FILE_NAME), selected_profile);
    if let Some(user_dir) = &paths.user_dir {
        figment = merge_file(figment, &user_dir.join(CONFIG_FILE_NAME), selected_profile);
    }
    figment = merge_file(
        figment,
        &paths.workspace_dir.join(CONFIG_FILE_NAME),
        selected_profile,
    );
    if let Some(explicit_file) = &paths.explicit_file {
        if !explicit_file.is_file() {
            return Err(BootstrapError::Io(io::Error::new(
                io::ErrorKind::NotFound,
                format!("config file `{}` does not exist", explicit_file.display()),
            )));
        }
        figment = merge_file(figment, explicit_file, selected_profile);
    }
    figment = figment.merge(Env::prefixed(CONFIG_ENV_PREFIX).split("__"));
    figment = figment.merge(Serialized::defaults(cli_overrides));

    let config: HelpdeskConfig = figment.select(selected_profile).extract()?;
    config.validate()?;
    tracing::debug!(profile = selected_profile, "configuration loaded");
    Ok(config)
}

fn merge_file(figment: Figment, path: &Path, selected_profile: &str) -> Figment {
    if !path.is_file() {
        return figment;
    }
    if file_uses_profiles(path, selected_profile) {
        figment.merge(Toml::file(path).nested())
    } else {
        figment.merge(Toml::file(path))
    }
}

fn file_uses_profiles(path: &Path, selected_profile: &str) -> bool {
    let Ok(contents) = std::fs::read_to_string(path) else {
        return false;
    };
    let Ok(value) = toml::from_str::<toml::Value>(&contents) else {
        return false;
    };
    let Some(table) = value.as_table() else {
        return false;
    };

    table.contains_key("default")
        || table.contains_key("global")
        || table.contains_key(selected_profile)
}
