use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

/// The Bot API accepts at most this many updates per `getUpdates` call.
const MAX_BATCH_LIMIT: u8 = 100;

/// Upper bound on the long-poll wait; a zero wait turns polling into a busy loop.
const MAX_TIMEOUT_SECS: u64 = 50;

#[derive(Debug, Deserialize, Clone, Default, PartialEq)]
pub struct Config {
    #[serde(default)]
    pub polling: PollingConfig,
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct PollingConfig {
    /// Maximum updates per fetch
    #[serde(default = "default_limit")]
    pub limit: u8,
    /// Long-poll wait
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Cursor value at startup
    #[serde(default)]
    pub initial_offset: i64,
    /// First delay after a failed fetch; doubles on each consecutive failure
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
    #[serde(default = "default_max_retry_delay_ms")]
    pub max_retry_delay_ms: u64,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            limit: default_limit(),
            timeout_secs: default_timeout_secs(),
            initial_offset: 0,
            retry_delay_ms: default_retry_delay_ms(),
            max_retry_delay_ms: default_max_retry_delay_ms(),
        }
    }
}

impl PollingConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    pub fn max_retry_delay(&self) -> Duration {
        Duration::from_millis(self.max_retry_delay_ms)
    }

    fn validate(&self) -> Result<()> {
        if self.limit == 0 || self.limit > MAX_BATCH_LIMIT {
            anyhow::bail!(
                "polling.limit must be between 1 and {}, got {}",
                MAX_BATCH_LIMIT,
                self.limit
            );
        }
        if self.timeout_secs == 0 || self.timeout_secs > MAX_TIMEOUT_SECS {
            anyhow::bail!(
                "polling.timeout_secs must be between 1 and {}, got {}",
                MAX_TIMEOUT_SECS,
                self.timeout_secs
            );
        }
        if self.initial_offset < 0 {
            anyhow::bail!(
                "polling.initial_offset must not be negative, got {}",
                self.initial_offset
            );
        }
        if self.retry_delay_ms == 0 {
            anyhow::bail!("polling.retry_delay_ms must be greater than zero");
        }
        if self.max_retry_delay_ms < self.retry_delay_ms {
            anyhow::bail!(
                "polling.max_retry_delay_ms ({}) is below polling.retry_delay_ms ({})",
                self.max_retry_delay_ms,
                self.retry_delay_ms
            );
        }
        Ok(())
    }
}

fn default_limit() -> u8 {
    MAX_BATCH_LIMIT
}

fn default_timeout_secs() -> u64 {
    5
}

fn default_retry_delay_ms() -> u64 {
    1000
}

fn default_max_retry_delay_ms() -> u64 {
    60_000
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        Self::parse(&content)
            .with_context(|| format!("Invalid config file: {}", path.display()))
    }

    fn parse(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content).context("Failed to parse TOML")?;
        config.polling.validate()?;
        Ok(config)
    }

    /// Apply command line overrides on top of the file settings.
    pub fn with_offset(mut self, offset: Option<i64>) -> Result<Self> {
        if let Some(offset) = offset {
            self.polling.initial_offset = offset;
            self.polling.validate()?;
        }
        Ok(self)
    }
}
