//! Configuration types for sheet-classifier

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::{info, warn};

/// Default model used when neither the secret store nor `config.txt` names one
pub const DEFAULT_MODEL_NAME: &str = "gemini-2.5-flash-lite";

/// Default Gemini API endpoint
pub const DEFAULT_API_BASE_URL: &str = "https://generativelanguage.googleapis.com";

/// Generative model endpoint settings
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Model identifier (default: "gemini-2.5-flash-lite")
    #[serde(default = "default_model_name")]
    pub model_name: String,

    /// Base URL of the API, without the `/v1beta` path (default: Google endpoint)
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,

    /// Timeout for a single classification request (default: 120 seconds)
    #[serde(default = "default_request_timeout", with = "duration_serde")]
    pub request_timeout: Duration,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            model_name: default_model_name(),
            api_base_url: default_api_base_url(),
            request_timeout: default_request_timeout(),
        }
    }
}

/// Per-row attempt budget and rate-limit backoff
///
/// Only rate-limit failures consume extra attempts; any other failure ends the
/// row immediately.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Total attempts per row, including the first one (default: 3)
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Fixed wait after a rate-limit signal, before the next attempt (default: 5 seconds)
    #[serde(default = "default_backoff", with = "duration_serde")]
    pub backoff: Duration,

    /// Add random jitter to the backoff (default: false)
    #[serde(default)]
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            backoff: default_backoff(),
            jitter: false,
        }
    }
}

/// How often the result table is written to disk
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PersistenceConfig {
    /// Flush the full table after this many processed rows (default: 2)
    ///
    /// The table is always flushed after the last row regardless of this value.
    #[serde(default = "default_flush_interval")]
    pub flush_interval: usize,

    /// Release spare table buffers after this many processed rows (default: 100)
    #[serde(default = "default_compact_interval")]
    pub compact_interval: usize,
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            flush_interval: default_flush_interval(),
            compact_interval: default_compact_interval(),
        }
    }
}

/// Main configuration for [`ClassificationRunner`](crate::runner::ClassificationRunner)
///
/// Works out of the box via `Config::default()`; every field has a serde
/// default so partial JSON documents deserialize cleanly.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Config {
    /// Model endpoint settings
    #[serde(default)]
    pub model: ModelConfig,

    /// Per-row retry policy
    #[serde(default)]
    pub retry: RetryConfig,

    /// Flush cadence
    #[serde(default)]
    pub persistence: PersistenceConfig,
}

impl Config {
    /// Read a JSON settings document; absent sections keep their defaults
    pub async fn from_json_file(path: &Path) -> crate::error::Result<Self> {
        let content = tokio::fs::read_to_string(path).await?;
        let config = serde_json::from_str(&content).inspect_err(|e| {
            warn!(path = %path.display(), error = %e, "invalid settings file");
        })?;
        info!(path = %path.display(), "loaded settings");
        Ok(config)
    }
}

fn default_model_name() -> String {
    DEFAULT_MODEL_NAME.to_string()
}

fn default_api_base_url() -> String {
    DEFAULT_API_BASE_URL.to_string()
}

fn default_request_timeout() -> Duration {
    Duration::from_secs(120)
}

fn default_max_attempts() -> u32 {
    3
}

fn default_backoff() -> Duration {
    Duration::from_secs(5)
}

fn default_flush_interval() -> usize {
    2
}

fn default_compact_interval() -> usize {
    100
}

// Duration serialization helper (whole seconds)
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}
