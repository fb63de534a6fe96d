//! # Databonsai Configuration System
//!
//! Layered configuration for column processing, provider retry policy, LLM
//! providers and logging.
//!
//! ## Architecture
//!
//! - **Defaults first**: every section has a working `Default`, so an empty or
//!   missing configuration file is valid
//! - **Environment Awareness**: `bonsai.toml` is overlaid by `bonsai.{env}.toml`
//!   and then by `BONSAI__SECTION__FIELD` environment variables
//! - **Explicit Validation**: invalid values fail loading instead of being clamped
//!
//! ## Usage
//!
//! ```rust,no_run
//! use databonsai_core::config::ConfigManager;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let manager = ConfigManager::load()?;
//!
//! let adaptive = &manager.config().apply.adaptive;
//! println!("starting batch size: {}", adaptive.batch_size);
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod loader;

use serde::{Deserialize, Serialize};
use std::time::Duration;

pub use error::{ConfigResult, ConfigurationError};
pub use loader::ConfigManager;

/// Root configuration structure mirroring `bonsai.toml`
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct BonsaiConfig {
    /// Console logging settings
    pub logging: LoggingConfig,

    /// Column driver defaults
    pub apply: ApplyConfig,

    /// Backoff policy applied to every remote provider call
    pub retry: RetryConfig,

    /// Per-provider connection settings
    pub providers: ProvidersConfig,
}

impl BonsaiConfig {
    /// Validate every section
    pub fn validate(&self) -> ConfigResult<()> {
        self.logging.validate()?;
        self.apply.validate()?;
        self.retry.validate()?;
        self.providers.validate()?;
        Ok(())
    }
}

/// Console logging configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter directive, e.g. `info` or `databonsai_core=debug`. Falls back to
    /// the environment default when unset.
    pub level: Option<String>,

    /// Emit JSON lines instead of human-readable output
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: None,
            json: false,
        }
    }
}

impl LoggingConfig {
    fn validate(&self) -> ConfigResult<()> {
        if let Some(level) = &self.level {
            if level.trim().is_empty() {
                return Err(ConfigurationError::invalid_value(
                    "logging.level",
                    level.clone(),
                    "must not be blank when set",
                ));
            }
        }
        Ok(())
    }
}

/// Column driver defaults
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ApplyConfig {
    /// Chunk size used by the fixed-batch driver
    pub batch_size: usize,

    /// Control-loop settings for the adaptive driver
    pub adaptive: AdaptiveBatchConfig,
}

impl Default for ApplyConfig {
    fn default() -> Self {
        Self {
            batch_size: 5,
            adaptive: AdaptiveBatchConfig::default(),
        }
    }
}

impl ApplyConfig {
    fn validate(&self) -> ConfigResult<()> {
        if self.batch_size == 0 {
            return Err(ConfigurationError::invalid_value(
                "apply.batch_size",
                "0",
                "must be at least 1",
            ));
        }
        self.adaptive.validate()
    }
}

/// Adaptive batch-size control settings
///
/// Batch size grows by `ramp_factor` after each successful batch and shrinks by
/// `reduce_factor` after each failure. Both factors drift toward 1.0 as their
/// decay multipliers are applied, so growth slows over a success streak and
/// shrinking softens over a failure streak.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct AdaptiveBatchConfig {
    /// Failed attempts tolerated in a row before the run is abandoned
    pub max_retries: u32,

    /// Upper bound for the batch size
    pub max_batch_size: usize,

    /// Initial batch size
    pub batch_size: usize,

    /// Growth multiplier applied after a success (>= 1.0)
    pub ramp_factor: f64,

    /// Multiplier applied to `ramp_factor` after each success
    pub ramp_factor_decay: f64,

    /// Shrink multiplier applied after a failure (0.0, 1.0]
    pub reduce_factor: f64,

    /// Multiplier applied to `reduce_factor` after each failure
    pub reduce_factor_decay: f64,
}

impl Default for AdaptiveBatchConfig {
    fn default() -> Self {
        Self {
            max_retries: 5,
            max_batch_size: 50,
            batch_size: 5,
            ramp_factor: 1.5,
            ramp_factor_decay: 0.9,
            reduce_factor: 0.5,
            reduce_factor_decay: 1.2,
        }
    }
}

impl AdaptiveBatchConfig {
    /// Validate batch-size bounds and factor ranges
    pub fn validate(&self) -> ConfigResult<()> {
        if self.max_batch_size == 0 {
            return Err(ConfigurationError::invalid_value(
                "max_batch_size",
                "0",
                "must be at least 1",
            ));
        }

        if self.batch_size == 0 || self.batch_size > self.max_batch_size {
            return Err(ConfigurationError::invalid_value(
                "batch_size",
                self.batch_size.to_string(),
                format!("must be between 1 and max_batch_size ({})", self.max_batch_size),
            ));
        }

        if !self.ramp_factor.is_finite() || self.ramp_factor < 1.0 {
            return Err(ConfigurationError::invalid_value(
                "ramp_factor",
                self.ramp_factor.to_string(),
                "must be a finite value >= 1.0",
            ));
        }

        if !self.reduce_factor.is_finite() || self.reduce_factor <= 0.0 || self.reduce_factor > 1.0
        {
            return Err(ConfigurationError::invalid_value(
                "reduce_factor",
                self.reduce_factor.to_string(),
                "must be in (0.0, 1.0]",
            ));
        }

        for (field, value) in [
            ("ramp_factor_decay", self.ramp_factor_decay),
            ("reduce_factor_decay", self.reduce_factor_decay),
        ] {
            if !value.is_finite() || value <= 0.0 {
                return Err(ConfigurationError::invalid_value(
                    field,
                    value.to_string(),
                    "must be a finite value > 0.0",
                ));
            }
        }

        Ok(())
    }
}

/// Exponential backoff policy for remote provider calls
///
/// The wait before retry `n` (0-based) is `multiplier * 2^n` seconds, clamped to
/// `[min_wait_seconds, max_wait_seconds]`.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct RetryConfig {
    pub multiplier: f64,
    pub min_wait_seconds: f64,
    pub max_wait_seconds: f64,
    /// Total attempts, including the first one
    pub max_tries: u32,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            multiplier: 1.0,
            min_wait_seconds: 1.0,
            max_wait_seconds: 60.0,
            max_tries: 10,
        }
    }
}

impl RetryConfig {
    /// Get the minimum wait as Duration
    pub fn min_wait(&self) -> Duration {
        Duration::from_secs_f64(self.min_wait_seconds)
    }

    /// Get the maximum wait as Duration
    pub fn max_wait(&self) -> Duration {
        Duration::from_secs_f64(self.max_wait_seconds)
    }

    pub fn validate(&self) -> ConfigResult<()> {
        if self.max_tries == 0 {
            return Err(ConfigurationError::invalid_value(
                "retry.max_tries",
                "0",
                "must be at least 1",
            ));
        }

        for (field, value) in [
            ("retry.multiplier", self.multiplier),
            ("retry.min_wait_seconds", self.min_wait_seconds),
            ("retry.max_wait_seconds", self.max_wait_seconds),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(ConfigurationError::invalid_value(
                    field,
                    value.to_string(),
                    "must be a finite, non-negative number",
                ));
            }
        }

        if self.min_wait_seconds > self.max_wait_seconds {
            return Err(ConfigurationError::validation_error(format!(
                "retry.min_wait_seconds ({}) exceeds retry.max_wait_seconds ({})",
                self.min_wait_seconds, self.max_wait_seconds
            )));
        }

        Ok(())
    }
}

/// Connection settings for every supported provider
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct ProvidersConfig {
    pub openai: OpenAiConfig,
    pub anthropic: AnthropicConfig,
    pub ollama: OllamaConfig,
}

impl ProvidersConfig {
    fn validate(&self) -> ConfigResult<()> {
        validate_endpoint("providers.openai", &self.openai.base_url, self.openai.temperature)?;
        validate_endpoint(
            "providers.anthropic",
            &self.anthropic.base_url,
            self.anthropic.temperature,
        )?;
        validate_endpoint("providers.ollama", &self.ollama.host, self.ollama.temperature)?;
        Ok(())
    }
}

fn validate_endpoint(section: &str, url: &str, temperature: f64) -> ConfigResult<()> {
    if !(url.starts_with("http://") || url.starts_with("https://")) {
        return Err(ConfigurationError::invalid_value(
            format!("{section}.base_url"),
            url.to_string(),
            "must be an http(s) URL",
        ));
    }
    if !(0.0..=2.0).contains(&temperature) {
        return Err(ConfigurationError::invalid_value(
            format!("{section}.temperature"),
            temperature.to_string(),
            "must be between 0.0 and 2.0",
        ));
    }
    Ok(())
}

/// OpenAI chat-completions settings
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct OpenAiConfig {
    /// Explicit key; `OPENAI_API_KEY` is used when unset
    pub api_key: Option<String>,
    pub base_url: String,
    pub model: String,
    pub temperature: f64,
    /// Request a JSON object response format
    pub json_mode: bool,
    pub request_timeout_seconds: u64,
}

impl Default for OpenAiConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: "https://api.openai.com/v1".to_string(),
            model: "gpt-4-turbo".to_string(),
            temperature: 0.0,
            json_mode: false,
            request_timeout_seconds: 120,
        }
    }
}

impl OpenAiConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_seconds)
    }
}

/// Anthropic messages API settings
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AnthropicConfig {
    /// Explicit key; `ANTHROPIC_API_KEY` is used when unset
    pub api_key: Option<String>,
    pub base_url: String,
    pub model: String,
    pub temperature: f64,
    pub api_version: String,
    pub request_timeout_seconds: u64,
}

impl Default for AnthropicConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: "https://api.anthropic.com/v1".to_string(),
            model: "claude-3-haiku-20240307".to_string(),
            temperature: 0.0,
            api_version: "2023-06-01".to_string(),
            request_timeout_seconds: 120,
        }
    }
}

impl AnthropicConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_seconds)
    }
}

/// Local Ollama server settings
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct OllamaConfig {
    pub host: String,
    pub model: String,
    pub temperature: f64,
    pub request_timeout_seconds: u64,
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            host: "http://localhost:11434".to_string(),
            model: "llama3".to_string(),
            temperature: 0.0,
            request_timeout_seconds: 300,
        }
    }
}

impl OllamaConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_seconds)
    }
}
