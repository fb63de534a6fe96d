//! Configuration Loader
//!
//! Environment-aware configuration loading. Layers, lowest priority first:
//!
//! 1. Built-in defaults (`BonsaiConfig::default()`)
//! 2. `<config_dir>/bonsai.toml`
//! 3. `<config_dir>/bonsai.<environment>.toml`
//! 4. `BONSAI__<SECTION>__<FIELD>` environment variables
//!
//! Files are optional; a missing config directory simply yields the defaults.

use super::error::{ConfigResult, ConfigurationError};
use super::BonsaiConfig;
use std::env;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

/// Base name of the configuration files
const CONFIG_FILE_STEM: &str = "bonsai";

/// Prefix for environment variable overrides
const ENV_PREFIX: &str = "BONSAI";

/// Loaded configuration plus the context it was loaded from
#[derive(Debug)]
pub struct ConfigManager {
    config: BonsaiConfig,
    environment: String,
    config_directory: PathBuf,
}

impl ConfigManager {
    /// Load configuration with environment auto-detection
    pub fn load() -> ConfigResult<Arc<ConfigManager>> {
        Self::load_from_directory(None)
    }

    /// Load configuration from a specific directory
    pub fn load_from_directory(config_dir: Option<PathBuf>) -> ConfigResult<Arc<ConfigManager>> {
        let environment = Self::detect_environment();
        Self::load_from_directory_with_env(config_dir, &environment)
    }

    /// Load configuration from a specific directory with explicit environment
    /// This is useful for testing without modifying global environment variables
    pub fn load_from_directory_with_env(
        config_dir: Option<PathBuf>,
        environment: &str,
    ) -> ConfigResult<Arc<ConfigManager>> {
        let config_directory = config_dir.unwrap_or_else(Self::default_config_directory);

        debug!(
            "Loading configuration for environment '{}' from directory: {}",
            environment,
            config_directory.display()
        );

        let config = Self::load_and_merge_config(&config_directory, environment)?;
        config.validate()?;

        info!(
            environment = environment,
            config_directory = %config_directory.display(),
            batch_size = config.apply.batch_size,
            adaptive_max_batch_size = config.apply.adaptive.max_batch_size,
            "Configuration loaded successfully"
        );

        Ok(Arc::new(ConfigManager {
            config,
            environment: environment.to_string(),
            config_directory,
        }))
    }

    /// Wrap an already-built configuration, validating it first
    pub fn from_config(config: BonsaiConfig, environment: &str) -> ConfigResult<ConfigManager> {
        config.validate()?;
        Ok(ConfigManager {
            config,
            environment: environment.to_string(),
            config_directory: Self::default_config_directory(),
        })
    }

    /// Get the loaded configuration
    pub fn config(&self) -> &BonsaiConfig {
        &self.config
    }

    /// Get configuration for debugging/logging with API keys masked
    pub fn debug_config(&self) -> serde_json::Value {
        let mut value = serde_json::json!(self.config);
        Self::mask_secrets(&mut value);
        value
    }

    /// Get the current environment
    pub fn environment(&self) -> &str {
        &self.environment
    }

    /// Get the configuration directory
    pub fn config_directory(&self) -> &Path {
        &self.config_directory
    }

    /// Detect current environment from environment variables
    pub fn detect_environment() -> String {
        env::var("BONSAI_ENV")
            .or_else(|_| env::var("APP_ENV"))
            .unwrap_or_else(|_| "development".to_string())
            .to_lowercase()
    }

    /// `BONSAI_CONFIG_DIR` when set, otherwise `./config`
    fn default_config_directory() -> PathBuf {
        env::var("BONSAI_CONFIG_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("config"))
    }

    fn load_and_merge_config(
        config_directory: &Path,
        environment: &str,
    ) -> ConfigResult<BonsaiConfig> {
        let defaults = config::Config::try_from(&BonsaiConfig::default())
            .map_err(|e| ConfigurationError::build_error(environment, e))?;

        let base_file = config_directory.join(format!("{CONFIG_FILE_STEM}.toml"));
        let env_file = config_directory.join(format!("{CONFIG_FILE_STEM}.{environment}.toml"));

        for path in [&base_file, &env_file] {
            debug!(
                layer = %path.display(),
                present = path.is_file(),
                "Configuration file layer"
            );
        }

        let merged = config::Config::builder()
            .add_source(defaults)
            .add_source(
                config::File::from(base_file.as_path())
                    .format(config::FileFormat::Toml)
                    .required(false),
            )
            .add_source(
                config::File::from(env_file.as_path())
                    .format(config::FileFormat::Toml)
                    .required(false),
            )
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| ConfigurationError::build_error(environment, e))?;

        merged
            .try_deserialize::<BonsaiConfig>()
            .map_err(ConfigurationError::deserialization_error)
    }

    fn mask_secrets(value: &mut serde_json::Value) {
        match value {
            serde_json::Value::Object(map) => {
                for (key, val) in map.iter_mut() {
                    let key_lower = key.to_lowercase();
                    if key_lower.contains("key") || key_lower.contains("secret") {
                        if let serde_json::Value::String(s) = val {
                            let chars: Vec<char> = s.chars().collect();
                            *val = serde_json::Value::String(if chars.len() > 4 {
                                let head: String = chars[..2].iter().collect();
                                let tail: String = chars[chars.len() - 2..].iter().collect();
                                format!("[MASKED: {head}***{tail}]")
                            } else {
                                "[MASKED]".to_string()
                            });
                        }
                    } else {
                        Self::mask_secrets(val);
                    }
                }
            }
            serde_json::Value::Array(items) => {
                for item in items.iter_mut() {
                    Self::mask_secrets(item);
                }
            }
            _ => {}
        }
    }
}
