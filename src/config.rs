//! Retry settings loaded from TOML.

use crate::retry::{Backoff, Constant, Exponential, Linear};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Backoff schedule selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackoffStrategy {
    Constant,
    Linear,
    #[default]
    Exponential,
}

/// Backoff parameters. Negative values are treated as zero.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BackoffConfig {
    pub strategy: BackoffStrategy,
    /// Base wait in milliseconds (constant wait for "constant").
    pub base_wait_ms: i64,
    /// Cap in milliseconds; 0 or less than the base disables it.
    pub max_wait_ms: i64,
    /// Upper bound (exclusive) of the random jitter added to each wait.
    pub max_jitter_ms: i64,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            strategy: BackoffStrategy::Exponential,
            base_wait_ms: 1000,
            max_wait_ms: 30_000,
            max_jitter_ms: 100,
        }
    }
}

impl BackoffConfig {
    /// Build the configured backoff policy.
    pub fn policy(&self) -> ConfiguredBackoff {
        let base = clamp_ms(self.base_wait_ms);
        let max = clamp_ms(self.max_wait_ms);
        let jitter = clamp_ms(self.max_jitter_ms);
        match self.strategy {
            BackoffStrategy::Constant => {
                ConfiguredBackoff::Constant(Constant::new(base).with_jitter(jitter))
            }
            BackoffStrategy::Linear => {
                let mut b = Linear::new(base).with_jitter(jitter);
                if !max.is_zero() {
                    b = b.with_max(max);
                }
                ConfiguredBackoff::Linear(b)
            }
            BackoffStrategy::Exponential => {
                let mut b = Exponential::new(base).with_jitter(jitter);
                if !max.is_zero() {
                    b = b.with_max(max);
                }
                ConfiguredBackoff::Exponential(b)
            }
        }
    }
}

/// One of the built-in backoff policies, chosen by configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfiguredBackoff {
    Constant(Constant),
    Linear(Linear),
    Exponential(Exponential),
}

impl Backoff for ConfiguredBackoff {
    fn backoff(&self, attempt: u32) -> Duration {
        match self {
            ConfiguredBackoff::Constant(b) => b.backoff(attempt),
            ConfiguredBackoff::Linear(b) => b.backoff(attempt),
            ConfiguredBackoff::Exponential(b) => b.backoff(attempt),
        }
    }
}

/// Retry configuration (`config.toml`).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Retries after the first attempt. Negative values mean no retries.
    pub max_retries: i64,
    /// Buffer streamed request bodies so they can be replayed. When false,
    /// such requests are attempted once.
    pub buffer_bodies: bool,
    pub backoff: BackoffConfig,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            buffer_bodies: true,
            backoff: BackoffConfig::default(),
        }
    }
}

impl RetryConfig {
    /// `max_retries` clamped into `0..=u32::MAX`.
    pub fn max_retries(&self) -> u32 {
        u32::try_from(self.max_retries.max(0)).unwrap_or(u32::MAX)
    }

    pub fn from_toml_str(s: &str) -> Result<Self> {
        toml::from_str(s).context("invalid retry config")
    }

    pub fn to_toml_string(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Load configuration from `path`.
    pub fn load(path: &Path) -> Result<Self> {
        let data = fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        Self::from_toml_str(&data).with_context(|| format!("parsing {}", path.display()))
    }
}

/// `$XDG_CONFIG_HOME/httpretry/config.toml`.
pub fn default_config_path() -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("httpretry")?;
    Ok(xdg_dirs.get_config_file("config.toml"))
}

/// Load the config file at the default path, or the built-in defaults if it
/// does not exist.
pub fn load_or_default() -> Result<RetryConfig> {
    let path = default_config_path()?;
    if !path.exists() {
        tracing::debug!("no config at {}, using defaults", path.display());
        return Ok(RetryConfig::default());
    }
    RetryConfig::load(&path)
}

fn clamp_ms(ms: i64) -> Duration {
    Duration::from_millis(u64::try_from(ms).unwrap_or(0))
}
