//! Configuration management for ragrelay
//!
//! TOML-based configuration with defaults, an environment overlay and
//! validation. Location: ~/.ragrelay/config.toml
//!
//! The configuration is built once at startup and handed to the retriever
//! and generator constructors; nothing reads the environment at call time.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::errors::{RagError, Result};
use crate::generation::{DEFAULT_API_BASE, DEFAULT_MODEL};
use crate::rag::PipelineConfig;
use crate::retry::RetryConfig;

/// Environment variable holding the retrieval endpoint
pub const ENV_DATASTORE_QUERY_URL: &str = "DATASTORE_QUERY_URL";
/// Environment variable holding the retrieval bearer token
pub const ENV_BEARER_TOKEN: &str = "BEARER_TOKEN";
/// Environment variable holding the chat service API key
pub const ENV_OPENAI_API_KEY: &str = "OPENAI_API_KEY";
/// Environment variable overriding the chat service base URL
pub const ENV_OPENAI_API_BASE: &str = "OPENAI_API_BASE";
/// Environment variable overriding the chat model
pub const ENV_MODEL: &str = "RAGRELAY_MODEL";

const REDACTED: &str = "********";

/// Complete configuration for ragrelay
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub datastore: DatastoreConfig,
    pub chat: ChatConfig,
    pub retry: RetrySettings,
    pub pipeline: PipelineConfig,
}

/// Document retrieval service connection
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatastoreConfig {
    /// Full URL of the `/query` endpoint
    pub query_url: Option<String>,
    pub bearer_token: Option<String>,
    pub timeout_secs: u64,
}

/// Chat completion service connection
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatConfig {
    pub api_base: String,
    pub api_key: Option<String>,
    pub model: String,
    pub timeout_secs: u64,
}

/// Retry parameters as written in the config file
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrySettings {
    pub min_delay_ms: u64,
    pub max_delay_ms: u64,
    pub max_attempts: u32,
    pub deadline_ms: Option<u64>,
}

impl Default for DatastoreConfig {
    fn default() -> Self {
        Self {
            query_url: None,
            bearer_token: None,
            timeout_secs: 30,
        }
    }
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            api_base: DEFAULT_API_BASE.to_string(),
            api_key: None,
            model: DEFAULT_MODEL.to_string(),
            timeout_secs: 60,
        }
    }
}

impl Default for RetrySettings {
    fn default() -> Self {
        let defaults = RetryConfig::default();
        Self {
            min_delay_ms: defaults.min_delay.as_millis() as u64,
            max_delay_ms: defaults.max_delay.as_millis() as u64,
            max_attempts: defaults.max_attempts,
            deadline_ms: None,
        }
    }
}

impl fmt::Debug for DatastoreConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DatastoreConfig")
            .field("query_url", &self.query_url)
            .field("bearer_token", &self.bearer_token.as_ref().map(|_| REDACTED))
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

impl fmt::Debug for ChatConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChatConfig")
            .field("api_base", &self.api_base)
            .field("api_key", &self.api_key.as_ref().map(|_| REDACTED))
            .field("model", &self.model)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

impl DatastoreConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl ChatConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl RetrySettings {
    pub fn to_retry_config(&self) -> RetryConfig {
        RetryConfig {
            min_delay: Duration::from_millis(self.min_delay_ms),
            max_delay: Duration::from_millis(self.max_delay_ms),
            max_attempts: self.max_attempts,
            deadline: self.deadline_ms.map(Duration::from_millis),
        }
    }
}

impl Config {
    /// Load configuration from file or defaults, then apply the process environment
    pub fn load(path: Option<PathBuf>) -> Result<Self> {
        let mut config = if let Some(config_path) = path {
            Self::load_from_file(&config_path)?
        } else {
            Self::load_default()?
        };

        config.apply_env();
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from specific file
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| RagError::Config(format!("Failed to read config: {}", e)))?;

        Self::from_toml(&contents)
    }

    /// Parse configuration from TOML text
    pub fn from_toml(contents: &str) -> Result<Self> {
        toml::from_str(contents)
            .map_err(|e| RagError::Config(format!("Failed to parse config: {}", e)))
    }

    /// Load default configuration from standard location or use built-in defaults
    pub fn load_default() -> Result<Self> {
        match Self::default_path() {
            Some(config_path) if config_path.exists() => Self::load_from_file(&config_path),
            _ => Ok(Config::default()),
        }
    }

    /// Standard config location
    pub fn default_path() -> Option<PathBuf> {
        dirs::home_dir().map(|home| home.join(".ragrelay").join("config.toml"))
    }

    /// Overlay values from the process environment
    pub fn apply_env(&mut self) {
        self.apply_env_with(|key| std::env::var(key).ok());
    }

    /// Overlay values from an arbitrary lookup; empty values are ignored
    pub fn apply_env_with<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(url) = get(ENV_DATASTORE_QUERY_URL) {
            self.datastore.query_url = Some(url);
        }
        if let Some(token) = get(ENV_BEARER_TOKEN) {
            self.datastore.bearer_token = Some(token);
        }
        if let Some(key) = get(ENV_OPENAI_API_KEY) {
            self.chat.api_key = Some(key);
        }
        if let Some(base) = get(ENV_OPENAI_API_BASE) {
            self.chat.api_base = base;
        }
        if let Some(model) = get(ENV_MODEL) {
            self.chat.model = model;
        }
    }

    /// Validate configuration values.
    ///
    /// Missing endpoints and credentials are not rejected here; they fail
    /// the first call that needs them.
    pub fn validate(&self) -> Result<()> {
        if self.retry.max_attempts == 0 {
            return Err(RagError::Config(
                "max_attempts must be greater than 0".to_string(),
            ));
        }

        if self.retry.min_delay_ms > self.retry.max_delay_ms {
            return Err(RagError::Config(
                "min_delay_ms must not exceed max_delay_ms".to_string(),
            ));
        }

        if self.pipeline.top_k == 0 {
            return Err(RagError::Config(
                "top_k must be greater than 0".to_string(),
            ));
        }

        if self.chat.model.trim().is_empty() {
            return Err(RagError::Config("chat model must not be empty".to_string()));
        }

        Ok(())
    }

    /// Copy with secrets masked, for display
    pub fn redacted(&self) -> Self {
        let mut copy = self.clone();
        if copy.datastore.bearer_token.is_some() {
            copy.datastore.bearer_token = Some(REDACTED.to_string());
        }
        if copy.chat.api_key.is_some() {
            copy.chat.api_key = Some(REDACTED.to_string());
        }
        copy
    }

    /// Render as TOML
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self)
            .map_err(|e| RagError::Config(format!("Failed to serialize config: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rag::RetrievalFailurePolicy;
    use std::collections::HashMap;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert!(config.datastore.query_url.is_none());
        assert_eq!(config.chat.model, "gpt-3.5-turbo");
        assert_eq!(config.retry.max_attempts, 3);
        assert_eq!(config.retry.min_delay_ms, 1000);
        assert_eq!(config.retry.max_delay_ms, 20000);
        assert_eq!(config.pipeline.top_k, 3);
    }

    #[test]
    fn test_config_validation_success() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn test_config_validation_zero_attempts() {
        let mut config = Config::default();
        config.retry.max_attempts = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_validation_delay_order() {
        let mut config = Config::default();
        config.retry.min_delay_ms = 30_000;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_validation_top_k() {
        let mut config = Config::default();
        config.pipeline.top_k = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config = Config::from_toml(
            r#"
            [datastore]
            query_url = "http://0.0.0.0:8000/query"

            [retry]
            max_attempts = 5

            [pipeline]
            on_retrieval_failure = "proceed"
            "#,
        )
        .unwrap();

        assert_eq!(config.datastore.query_url.as_deref(), Some("http://0.0.0.0:8000/query"));
        assert_eq!(config.datastore.timeout_secs, 30);
        assert_eq!(config.retry.max_attempts, 5);
        assert_eq!(config.retry.min_delay_ms, 1000);
        assert_eq!(
            config.pipeline.on_retrieval_failure,
            RetrievalFailurePolicy::ProceedWithoutContext
        );
    }

    #[test]
    fn test_env_overlay() {
        let env: HashMap<&str, &str> = [
            (ENV_DATASTORE_QUERY_URL, "http://localhost:8000/query"),
            (ENV_BEARER_TOKEN, "test1234"),
            (ENV_OPENAI_API_KEY, "sk-test"),
            (ENV_MODEL, ""),
        ]
        .into_iter()
        .collect();

        let mut config = Config::default();
        config.apply_env_with(|key| env.get(key).map(|v| v.to_string()));

        assert_eq!(config.datastore.query_url.as_deref(), Some("http://localhost:8000/query"));
        assert_eq!(config.datastore.bearer_token.as_deref(), Some("test1234"));
        assert_eq!(config.chat.api_key.as_deref(), Some("sk-test"));
        // empty values do not clobber defaults
        assert_eq!(config.chat.model, DEFAULT_MODEL);
    }

    #[test]
    fn test_secrets_never_printed() {
        let mut config = Config::default();
        config.datastore.bearer_token = Some("test1234".to_string());
        config.chat.api_key = Some("sk-secret".to_string());

        let debug = format!("{:?}", config);
        assert!(!debug.contains("test1234"));
        assert!(!debug.contains("sk-secret"));

        let rendered = config.redacted().to_toml().unwrap();
        assert!(!rendered.contains("test1234"));
        assert!(!rendered.contains("sk-secret"));
    }

    #[test]
    fn test_retry_settings_conversion() {
        let settings = RetrySettings {
            min_delay_ms: 10,
            max_delay_ms: 200,
            max_attempts: 4,
            deadline_ms: Some(1500),
        };
        let retry = settings.to_retry_config();
        assert_eq!(retry.min_delay, Duration::from_millis(10));
        assert_eq!(retry.max_delay, Duration::from_millis(200));
        assert_eq!(retry.max_attempts, 4);
        assert_eq!(retry.deadline, Some(Duration::from_millis(1500)));
    }
}
