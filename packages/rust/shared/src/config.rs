//! Application configuration for Pathwise.
//!
//! User config lives at `~/.pathwise/pathwise.toml`.
//! CLI flags override config file values, which override defaults.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{PathwiseError, Result};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "pathwise.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".pathwise";

// ---------------------------------------------------------------------------
// Config structs (matching pathwise.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Research service settings.
    #[serde(default)]
    pub research: ResearchConfig,

    /// Batch enhancement policy.
    #[serde(default)]
    pub enhancement: EnhancementConfig,

    /// Durable cache location.
    #[serde(default)]
    pub storage: StorageConfig,
}

/// `[research]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResearchConfig {
    /// Chat-completions style endpoint of the research service.
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    /// Model ID sent with every request.
    #[serde(default = "default_model")]
    pub model: String,

    /// Name of the env var holding the API key (never store the key itself).
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,

    /// Per-request timeout.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

impl Default for ResearchConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            model: default_model(),
            api_key_env: default_api_key_env(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

impl ResearchConfig {
    /// Parse and check the configured endpoint.
    pub fn endpoint_url(&self) -> Result<Url> {
        let url = Url::parse(&self.endpoint).map_err(|e| {
            PathwiseError::config(format!("invalid research endpoint {:?}: {e}", self.endpoint))
        })?;
        match url.scheme() {
            "http" | "https" => Ok(url),
            other => Err(PathwiseError::config(format!(
                "research endpoint must be http(s), got {other}"
            ))),
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

fn default_endpoint() -> String {
    "https://api.perplexity.ai/chat/completions".into()
}
fn default_model() -> String {
    "sonar-pro".into()
}
fn default_api_key_env() -> String {
    "PATHWISE_RESEARCH_API_KEY".into()
}
fn default_request_timeout() -> u64 {
    30
}

/// `[enhancement]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnhancementConfig {
    /// Cached records below this confidence are re-enhanced.
    #[serde(default = "default_confidence_threshold")]
    pub confidence_threshold: f64,

    /// Maximum concurrent research calls per batch.
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: u32,

    /// Whole-batch deadline; 0 disables it.
    #[serde(default = "default_batch_timeout")]
    pub batch_timeout_secs: u64,

    /// Currency label applied when a salary figure carries no symbol or code.
    #[serde(default = "default_currency")]
    pub default_currency: String,
}

impl Default for EnhancementConfig {
    fn default() -> Self {
        Self {
            confidence_threshold: default_confidence_threshold(),
            max_concurrency: default_max_concurrency(),
            batch_timeout_secs: default_batch_timeout(),
            default_currency: default_currency(),
        }
    }
}

fn default_confidence_threshold() -> f64 {
    0.8
}
fn default_max_concurrency() -> u32 {
    4
}
fn default_batch_timeout() -> u64 {
    120
}
fn default_currency() -> String {
    "GBP".into()
}

/// `[storage]` section.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Path to the durable cache database. Empty means `~/.pathwise/cache.db`.
    #[serde(default)]
    pub db_path: String,
}

impl StorageConfig {
    /// Resolve the database path, falling back to the config directory.
    pub fn resolved_path(&self) -> Result<PathBuf> {
        if self.db_path.is_empty() {
            Ok(config_dir()?.join("cache.db"))
        } else {
            Ok(PathBuf::from(&self.db_path))
        }
    }
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.pathwise/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| PathwiseError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.pathwise/pathwise.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| PathwiseError::io(path, e))?;

    let config: AppConfig = toml::from_str(&content).map_err(|e| {
        PathwiseError::config(format!("failed to parse {}: {e}", path.display()))
    })?;
    validate_config(&config)?;
    Ok(config)
}

/// Reject values the pipeline cannot run with.
pub fn validate_config(config: &AppConfig) -> Result<()> {
    let threshold = config.enhancement.confidence_threshold;
    if !(0.0..=1.0).contains(&threshold) {
        return Err(PathwiseError::config(format!(
            "confidence_threshold must be within [0, 1], got {threshold}"
        )));
    }
    if config.enhancement.max_concurrency == 0 {
        return Err(PathwiseError::config("max_concurrency must be at least 1"));
    }
    if config.research.request_timeout_secs == 0 {
        return Err(PathwiseError::config("request_timeout_secs must be at least 1"));
    }
    config.research.endpoint_url()?;
    Ok(())
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| PathwiseError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| PathwiseError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| PathwiseError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}

/// Read the research API key from the env var named in config.
pub fn research_api_key(config: &AppConfig) -> Result<String> {
    let var_name = &config.research.api_key_env;
    match std::env::var(var_name) {
        Ok(val) if !val.is_empty() => Ok(val),
        _ => Err(PathwiseError::config(format!(
            "research API key not found. Set the {var_name} environment variable."
        ))),
    }
}
