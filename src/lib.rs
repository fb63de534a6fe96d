#![allow(clippy::missing_errors_doc)] // Allow public functions without # Errors sections
#![allow(clippy::must_use_candidate)] // Allow methods without must_use when context is clear

//! # Databonsai Core
//!
//! Categorize and transform columns of text with LLMs, resumably.
//!
//! ## Overview
//!
//! A column is processed by a driver that calls a processing function per item
//! or per batch and writes results into a positional output column. When a call
//! fails the driver stops and reports the last index with a valid result, so a
//! later call can resume from exactly that point without redoing work.
//!
//! ## Module Organization
//!
//! - [`apply`] - Single-item, fixed-batch and adaptive-batch column drivers
//! - [`categorize`] - Single- and multi-label classifiers over a category set
//! - [`transform`] - Free-text and schema-decomposing transformers
//! - [`providers`] - OpenAI, Anthropic and Ollama clients with retry
//! - [`config`] - Layered TOML and environment configuration
//! - [`logging`] - Structured `tracing` setup
//! - [`error`] - Structured error handling
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use databonsai_core::categorize::Categorizer;
//! use databonsai_core::config::ConfigManager;
//! use databonsai_core::providers::{OpenAiProvider, RetryPolicy};
//! use std::sync::Arc;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let manager = ConfigManager::load()?;
//! let config = manager.config();
//! databonsai_core::logging::init_structured_logging_with(&config.logging);
//!
//! let provider = Arc::new(OpenAiProvider::new(
//!     config.providers.openai.clone(),
//!     RetryPolicy::from_config(&config.retry)?,
//! )?);
//! let categorizer = Categorizer::new(
//!     [
//!         ("Weather", "Insights and remarks about weather conditions."),
//!         ("Sports", "Observations and comments on sports events."),
//!     ],
//!     provider,
//! )?;
//!
//! let headlines = vec!["Heavy rain expected tomorrow", "Local team wins the cup"];
//! let mut categories = Vec::new();
//! let report = categorizer.categorize_column_adaptive(
//!     &headlines,
//!     &mut categories,
//!     &config.apply.adaptive,
//!     0,
//! )?;
//!
//! if !report.is_complete() {
//!     println!("resume from {}: {}", report.success_idx, report.outcome);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Testing
//!
//! ```bash
//! cargo test --lib    # Unit tests
//! cargo test          # Unit, integration and property tests
//! cargo bench --features benchmarks
//! ```

pub mod apply;
pub mod categorize;
pub mod config;
pub mod constants;
pub mod error;
pub mod logging;
pub mod providers;
pub mod test_utils;
pub mod transform;

pub use apply::{
    apply_to_column, apply_to_column_autobatch, apply_to_column_batch, AdaptiveBatchConfig,
    ApplyOptions, ApplyOutcome, ApplyReport,
};
pub use categorize::{Categorizer, MultiCategorizer};
pub use config::{BonsaiConfig, ConfigManager};
pub use error::{BonsaiError, BonsaiResult};
pub use providers::{
    AnthropicProvider, LlmProvider, OllamaProvider, OpenAiProvider, RetryPolicy, TokenUsage,
};
pub use transform::{DecomposeTransformer, Transformer};
