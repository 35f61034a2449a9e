use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

const ENV_BACKEND_URL: &str = "DOCQA_BACKEND_URL";
const ENV_HEALTH_INTERVAL: &str = "DOCQA_HEALTH_INTERVAL_SECS";
const ENV_HEALTH_TIMEOUT: &str = "DOCQA_HEALTH_TIMEOUT_SECS";
const ENV_REQUEST_TIMEOUT: &str = "DOCQA_REQUEST_TIMEOUT_SECS";

/// Where the backend lives and how the client talks to it.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct ClientConfig {
    pub backend_url: String,
    pub health_interval_secs: u64,
    pub health_timeout_secs: u64,
    // None: foreground calls wait as long as the backend takes
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_timeout_secs: Option<u64>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            backend_url: "http://localhost:8000".to_string(),
            health_interval_secs: 30,
            health_timeout_secs: 5,
            request_timeout_secs: None,
        }
    }
}

impl ClientConfig {
    /// Defaults, overridden by any `DOCQA_*` environment variables that are set.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Loads a JSON config file; missing fields take their defaults.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config: Self = serde_json::from_str(&raw)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Self::default();
        if let Some(url) = lookup(ENV_BACKEND_URL) {
            log::debug!("Backend URL from environment variable {}", ENV_BACKEND_URL);
            config.backend_url = url;
        }
        if let Some(secs) = parse_secs(&lookup, ENV_HEALTH_INTERVAL)? {
            config.health_interval_secs = secs;
        }
        if let Some(secs) = parse_secs(&lookup, ENV_HEALTH_TIMEOUT)? {
            config.health_timeout_secs = secs;
        }
        if let Some(secs) = parse_secs(&lookup, ENV_REQUEST_TIMEOUT)? {
            config.request_timeout_secs = Some(secs);
        }
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        reqwest::Url::parse(&self.backend_url)
            .with_context(|| format!("Invalid backend URL '{}'", self.backend_url))?;
        if self.health_interval_secs == 0 {
            return Err(anyhow::anyhow!("Health check interval must be at least one second"));
        }
        if self.health_timeout_secs == 0 {
            return Err(anyhow::anyhow!("Health check timeout must be at least one second"));
        }
        Ok(())
    }

    pub fn health_interval(&self) -> Duration {
        Duration::from_secs(self.health_interval_secs)
    }

    pub fn health_timeout(&self) -> Duration {
        Duration::from_secs(self.health_timeout_secs)
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_secs.map(Duration::from_secs)
    }
}

fn parse_secs(lookup: &impl Fn(&str) -> Option<String>, name: &str) -> Result<Option<u64>> {
    lookup(name)
        .map(|raw| {
            raw.trim().parse::<u64>().context(format!(
                "Failed to parse environment variable '{}' as whole seconds: '{}'",
                name, raw
            ))
        })
        .transpose()
}
