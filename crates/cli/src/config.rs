//! Configuration loading from tackle.toml.

use runtime::{DEFAULT_BASE_URL, DEFAULT_MAX_TURNS};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Overrides `backend.model`.
pub const MODEL_ENV: &str = "TACKLE_MODEL";
/// Overrides `backend.base_url`.
pub const HOST_ENV: &str = "OLLAMA_HOST";

/// Top-level configuration.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub backend: BackendConfig,

    #[serde(default)]
    pub agent: AgentConfig,

    #[serde(default)]
    pub storage: StorageConfig,

    /// Log filter used when `RUST_LOG` is unset.
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

/// Model backend configuration.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BackendConfig {
    /// Provider name (currently only "ollama" supported).
    #[serde(default = "default_provider")]
    pub provider: String,

    #[serde(default = "default_model")]
    pub model: String,

    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Request timeout; none when unset.
    pub timeout_secs: Option<u64>,
}

/// Agent loop configuration.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AgentConfig {
    #[serde(default = "default_max_turns")]
    pub max_turns: usize,

    pub system: Option<String>,
}

/// Transcript storage configuration.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StorageConfig {
    /// Database file; the platform data directory when unset.
    pub path: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            backend: BackendConfig::default(),
            agent: AgentConfig::default(),
            storage: StorageConfig::default(),
            log_level: default_log_level(),
        }
    }
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: default_model(),
            base_url: default_base_url(),
            timeout_secs: None,
        }
    }
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_turns: default_max_turns(),
            system: None,
        }
    }
}

fn default_provider() -> String {
    "ollama".to_string()
}

fn default_model() -> String {
    "mistral-nemo".to_string()
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

fn default_max_turns() -> usize {
    DEFAULT_MAX_TURNS
}

fn default_log_level() -> String {
    "warn".to_string()
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::parse(&content)
    }

    /// Load `path` if it exists, defaults otherwise.
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        if path.as_ref().exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Parse configuration from TOML string.
    pub fn parse(toml: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(toml).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Apply `TACKLE_MODEL` and `OLLAMA_HOST`.
    pub fn with_env_overrides(self) -> Self {
        self.with_overrides(
            std::env::var(MODEL_ENV).ok(),
            std::env::var(HOST_ENV).ok(),
        )
    }

    fn with_overrides(mut self, model: Option<String>, host: Option<String>) -> Self {
        if let Some(model) = model.filter(|m| !m.trim().is_empty()) {
            self.backend.model = model;
        }
        if let Some(host) = host.filter(|h| !h.trim().is_empty()) {
            self.backend.base_url = normalize_host(&host);
        }
        self
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.backend.provider != "ollama" {
            return Err(ConfigError::UnsupportedProvider(self.backend.provider.clone()));
        }
        if self.agent.max_turns == 0 {
            return Err(ConfigError::Parse("agent.max_turns must be at least 1".into()));
        }
        Ok(())
    }
}

/// `OLLAMA_HOST` may omit the scheme, as the ollama CLI allows.
fn normalize_host(host: &str) -> String {
    let host = host.trim().trim_end_matches('/');
    if host.starts_with("http://") || host.starts_with("https://") {
        host.to_string()
    } else {
        format!("http://{host}")
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(String),

    #[error("unsupported backend provider '{0}' (only \"ollama\" is available)")]
    UnsupportedProvider(String),
}
