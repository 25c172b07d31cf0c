// Client defaults and configuration layering: built-in defaults, then
// environment variables, then an optional YAML override file.
use campus_common::{ApiError, Result};
use serde::Deserialize;
use std::fs;
use std::time::Duration;

/// Hardcoded fallback for local development against a locally run backend.
pub const DEFAULT_BASE_URL: &str = "http://localhost:50501/api";

pub(crate) const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 30_000;
pub(crate) const DEFAULT_STALE_TIME_MS: u64 = 30_000;
pub(crate) const DEFAULT_CACHE_TIME_MS: u64 = 5 * 60_000;

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub base_url: String,
    pub request_timeout: Duration,
    // Query-cache defaults; individual queries may override.
    pub default_stale_time: Duration,
    pub default_cache_time: Duration,
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
struct ClientConfigOverride {
    base_url: Option<String>,
    request_timeout_ms: Option<u64>,
    default_stale_time_ms: Option<u64>,
    default_cache_time_ms: Option<u64>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            request_timeout: Duration::from_millis(DEFAULT_REQUEST_TIMEOUT_MS),
            default_stale_time: Duration::from_millis(DEFAULT_STALE_TIME_MS),
            default_cache_time: Duration::from_millis(DEFAULT_CACHE_TIME_MS),
        }
    }
}

impl ClientConfig {
    /// Defaults layered with env vars and an optional YAML override file.
    /// `config_path` wins over the `CAMPUS_CLIENT_CONFIG` env var.
    pub fn from_env_or_yaml(config_path: Option<&str>) -> Result<Self> {
        let mut config = Self::from_env();
        let override_path = config_path
            .map(|value| value.to_string())
            .or_else(|| std::env::var("CAMPUS_CLIENT_CONFIG").ok());
        let contents = match override_path.as_deref() {
            Some(path) => match fs::read_to_string(path) {
                Ok(contents) => Some(contents),
                Err(err) => {
                    return Err(ApiError::Validation(format!(
                        "read client config {path}: {err}"
                    )));
                }
            },
            None => None,
        };
        if let Some(contents) = contents {
            let override_cfg: ClientConfigOverride = serde_yaml::from_str(&contents)
                .map_err(|err| ApiError::Validation(format!("parse client config yaml: {err}")))?;
            override_cfg.apply(&mut config);
        }
        Ok(config)
    }

    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Some(value) = read_string_env("CAMPUS_API_BASE_URL") {
            config.base_url = value;
        }
        if let Some(value) = read_u64_env("CAMPUS_REQUEST_TIMEOUT_MS") {
            config.request_timeout = Duration::from_millis(value);
        }
        if let Some(value) = read_u64_env("CAMPUS_STALE_TIME_MS") {
            config.default_stale_time = Duration::from_millis(value);
        }
        if let Some(value) = read_u64_env("CAMPUS_CACHE_TIME_MS") {
            config.default_cache_time = Duration::from_millis(value);
        }
        config
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

impl ClientConfigOverride {
    fn apply(&self, config: &mut ClientConfig) {
        if let Some(value) = &self.base_url {
            if !value.is_empty() {
                config.base_url = value.clone();
            }
        }
        if let Some(value) = self.request_timeout_ms {
            if value > 0 {
                config.request_timeout = Duration::from_millis(value);
            }
        }
        if let Some(value) = self.default_stale_time_ms {
            config.default_stale_time = Duration::from_millis(value);
        }
        if let Some(value) = self.default_cache_time_ms {
            config.default_cache_time = Duration::from_millis(value);
        }
    }
}

fn read_string_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|value| !value.is_empty())
}

fn read_u64_env(key: &str) -> Option<u64> {
    std::env::var(key)
        .ok()
        .and_then(|value| value.parse::<u64>().ok())
        .filter(|value| *value > 0)
}
