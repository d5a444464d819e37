use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use anyhow::{Result, anyhow};
use tracing::{info, warn};
use url::Url;

use crate::error::{ScholarError, ScholarResult};
use crate::logging::LoggingConfig;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScholarConfig {
    pub api: ApiSettings,
    pub typing: TypingConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiSettings {
    /// Where the runtime API document (`config.json`) lives: a file path or an http(s) URL
    pub config_source: String,

    /// Per-request timeout for backend calls (seconds)
    pub request_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TypingConfig {
    /// Delay between revealed characters (milliseconds)
    pub tick_interval_ms: u64,
}

impl Default for ScholarConfig {
    fn default() -> Self {
        Self {
            api: ApiSettings {
                config_source: "config.json".to_string(),
                request_timeout_secs: 120,
            },
            typing: TypingConfig {
                tick_interval_ms: 10,
            },
            logging: LoggingConfig::default(),
        }
    }
}

impl TypingConfig {
    pub fn tick_interval(&self) -> Duration {
        // A zero interval would make tokio's interval panic
        Duration::from_millis(self.tick_interval_ms.max(1))
    }
}

impl ApiSettings {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl ScholarConfig {
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| anyhow!("Failed to read config file: {}", e))?;

        let config: ScholarConfig = toml::from_str(&content)
            .map_err(|e| anyhow!("Failed to parse config file: {}", e))?;

        Ok(config)
    }

    pub fn load_from_env() -> Self {
        let mut config = Self::default();
        config.apply_env_overrides();
        config
    }

    /// Override fields from `SCHOLARLY_*` environment variables
    pub fn apply_env_overrides(&mut self) {
        if let Ok(source) = std::env::var("SCHOLARLY_CONFIG_URL") {
            if !source.trim().is_empty() {
                self.api.config_source = source;
            }
        }

        if let Ok(tick) = std::env::var("SCHOLARLY_TICK_MS") {
            if let Ok(value) = tick.parse::<u64>() {
                self.typing.tick_interval_ms = value;
            }
        }

        if let Ok(timeout) = std::env::var("SCHOLARLY_TIMEOUT_SECS") {
            if let Ok(value) = timeout.parse::<u64>() {
                self.api.request_timeout_secs = value;
            }
        }
    }

    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| anyhow!("Failed to serialize config: {}", e))?;

        std::fs::write(path.as_ref(), content)
            .map_err(|e| anyhow!("Failed to write config file: {}", e))?;

        Ok(())
    }
}

/// Runtime API document, fetched once per session before any network action is enabled
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ApiConfig {
    /// Backend base URL
    pub localapi: String,
}

impl ApiConfig {
    pub fn new(localapi: impl Into<String>) -> Self {
        Self {
            localapi: localapi.into(),
        }
    }

    pub fn from_json(content: &str) -> ScholarResult<Self> {
        let config: ApiConfig = serde_json::from_str(content)
            .map_err(|e| ScholarError::configuration(format!("invalid API config: {}", e)))?;

        if config.localapi.trim().is_empty() {
            return Err(ScholarError::configuration("`localapi` is empty"));
        }

        // Validate eagerly so a bad URL surfaces at start-up, not on first upload
        config.base_url()?;
        Ok(config)
    }

    /// Load from a file path or an http(s) URL
    pub async fn load(source: &str, timeout: Duration) -> ScholarResult<Self> {
        let content = if source.starts_with("http://") || source.starts_with("https://") {
            let client = reqwest::Client::builder().timeout(timeout).build()?;
            let response = client.get(source).send().await.map_err(|e| {
                ScholarError::configuration(format!("failed to fetch {}: {}", source, e))
            })?;

            if !response.status().is_success() {
                return Err(ScholarError::configuration(format!(
                    "failed to fetch {}: {}",
                    source,
                    response.status()
                )));
            }

            response.text().await.map_err(|e| {
                ScholarError::configuration(format!("failed to read {}: {}", source, e))
            })?
        } else {
            tokio::fs::read_to_string(source).await.map_err(|e| {
                ScholarError::configuration(format!("failed to read {}: {}", source, e))
            })?
        };

        let config = Self::from_json(&content)?;
        info!(localapi = %config.localapi, "API configuration loaded");
        Ok(config)
    }

    /// Base URL, always with a trailing slash so endpoint joins append rather than replace
    pub fn base_url(&self) -> ScholarResult<Url> {
        let mut raw = self.localapi.trim().to_string();
        if !raw.ends_with('/') {
            raw.push('/');
        }

        Url::parse(&raw).map_err(|e| {
            warn!(localapi = %self.localapi, "Rejected API base URL");
            ScholarError::configuration(format!("invalid localapi URL `{}`: {}", self.localapi, e))
        })
    }

    pub fn endpoint(&self, path: &str) -> ScholarResult<Url> {
        self.base_url()?
            .join(path)
            .map_err(|e| ScholarError::configuration(format!("invalid endpoint `{}`: {}", path, e)))
    }
}
