//! Configuration loading and validation for the Vireo agent engine.
//!
//! Loads a `RuntimeConfig` from TOML with per-field defaults, so an empty
//! file (or no file) yields a fully usable configuration.

use serde::{Deserialize, Serialize};
use std::path::Path;
use vireo_core::error::Error;

/// The root runtime configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuntimeConfig {
    /// Model identifier passed through to the provider
    #[serde(default = "default_model")]
    pub model: String,

    /// Maximum tokens per model response
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// Maximum agent steps before the loop gives up
    #[serde(default = "default_max_steps")]
    pub max_steps: u32,

    /// Pacing delay between successive steps (never before the first),
    /// independent of any rate-limit backoff
    #[serde(default = "default_step_delay_ms")]
    pub step_delay_ms: u64,

    /// Retry/backoff tunables
    #[serde(default)]
    pub retry: RetryConfig,

    /// Tool dispatch tunables
    #[serde(default)]
    pub dispatch: DispatchConfig,

    /// Sub-agent profiles
    #[serde(default)]
    pub subagents: Vec<SubAgentProfileConfig>,
}

fn default_model() -> String {
    "claude-sonnet-4-20250514".into()
}
fn default_max_tokens() -> u32 {
    4096
}
fn default_max_steps() -> u32 {
    25
}
fn default_step_delay_ms() -> u64 {
    1000
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            model: default_model(),
            max_tokens: default_max_tokens(),
            max_steps: default_max_steps(),
            step_delay_ms: default_step_delay_ms(),
            retry: RetryConfig::default(),
            dispatch: DispatchConfig::default(),
            subagents: Vec::new(),
        }
    }
}

/// Backoff tunables for the provider retry policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    #[serde(default = "default_base_delay_secs")]
    pub base_delay_secs: f64,

    #[serde(default = "default_max_delay_secs")]
    pub max_delay_secs: f64,

    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Jitter as a fraction of the computed delay, drawn uniformly
    /// from [0, fraction * delay]
    #[serde(default = "default_jitter_fraction")]
    pub jitter_fraction: f64,
}

fn default_base_delay_secs() -> f64 {
    2.0
}
fn default_max_delay_secs() -> f64 {
    60.0
}
fn default_max_retries() -> u32 {
    5
}
fn default_jitter_fraction() -> f64 {
    0.1
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            base_delay_secs: default_base_delay_secs(),
            max_delay_secs: default_max_delay_secs(),
            max_retries: default_max_retries(),
            jitter_fraction: default_jitter_fraction(),
        }
    }
}

/// Tool dispatch tunables.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchConfig {
    /// Result content longer than this is truncated head/tail-preserving
    #[serde(default = "default_max_result_chars")]
    pub max_result_chars: usize,

    /// How often in-flight tool progress snapshots are published
    #[serde(default = "default_progress_interval_ms")]
    pub progress_interval_ms: u64,
}

fn default_max_result_chars() -> usize {
    30_000
}
fn default_progress_interval_ms() -> u64 {
    1000
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            max_result_chars: default_max_result_chars(),
            progress_interval_ms: default_progress_interval_ms(),
        }
    }
}

/// A named sub-agent profile: the tools it may use, the prompt it runs
/// under, and its step budget.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubAgentProfileConfig {
    pub name: String,

    /// Allow-list of tool names; anything else is rejected
    pub tools: Vec<String>,

    pub system_prompt: String,

    #[serde(default = "default_subagent_max_steps")]
    pub max_steps: u32,
}

fn default_subagent_max_steps() -> u32 {
    10
}

impl RuntimeConfig {
    /// Parse a configuration from a TOML string.
    pub fn from_toml_str(toml_str: &str) -> Result<Self, Error> {
        let config: Self = toml::from_str(toml_str).map_err(|e| Error::Config {
            message: format!("invalid TOML: {e}"),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Load a configuration from a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, Error> {
        let raw = std::fs::read_to_string(path.as_ref()).map_err(|e| Error::Config {
            message: format!("cannot read {}: {e}", path.as_ref().display()),
        })?;
        Self::from_toml_str(&raw)
    }

    /// Check cross-field constraints the serde defaults cannot express.
    pub fn validate(&self) -> Result<(), Error> {
        if self.max_steps == 0 {
            return Err(Error::Config {
                message: "max_steps must be at least 1".into(),
            });
        }
        if self.retry.base_delay_secs <= 0.0 {
            return Err(Error::Config {
                message: "retry.base_delay_secs must be positive".into(),
            });
        }
        if self.retry.max_delay_secs < self.retry.base_delay_secs {
            return Err(Error::Config {
                message: "retry.max_delay_secs must be >= retry.base_delay_secs".into(),
            });
        }
        if !(0.0..=1.0).contains(&self.retry.jitter_fraction) {
            return Err(Error::Config {
                message: "retry.jitter_fraction must be within [0, 1]".into(),
            });
        }
        for profile in &self.subagents {
            if profile.max_steps == 0 {
                return Err(Error::Config {
                    message: format!("subagent '{}': max_steps must be at least 1", profile.name),
                });
            }
        }
        Ok(())
    }
}
