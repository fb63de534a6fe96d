//! # LLM Providers
//!
//! Blocking clients for the completion backends used by categorizers and
//! transformers. Every provider exposes the same [`LlmProvider`] surface:
//! a single `generate` call taking a system and a user prompt, a batched
//! variant that packs several inputs into one user prompt, and cumulative
//! token usage.
//!
//! Remote calls are wrapped in a [`RetryPolicy`]; prompt validation happens
//! before the policy runs, so invalid prompts are never retried.

mod anthropic;
mod ollama;
mod openai;
mod retry;

pub use anthropic::AnthropicProvider;
pub use ollama::OllamaProvider;
pub use openai::OpenAiProvider;
pub use retry::RetryPolicy;

use crate::constants::separators;
use crate::error::{BonsaiError, BonsaiResult};
use parking_lot::Mutex;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Cumulative token counts reported by a provider
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub input_tokens: u64,
    pub output_tokens: u64,
}

impl TokenUsage {
    pub fn total(&self) -> u64 {
        self.input_tokens + self.output_tokens
    }
}

/// A completion backend
///
/// Implementations must be shareable across categorizers and transformers, so
/// any mutable bookkeeping (usage counters) lives behind interior mutability.
pub trait LlmProvider: Send + Sync + fmt::Debug {
    /// Short identifier used in logs
    fn name(&self) -> &str;

    /// Generate a completion for one user prompt
    ///
    /// # Errors
    ///
    /// `BonsaiError::Validation` for an empty system or user prompt; any
    /// transport or response error once retries are exhausted.
    fn generate(
        &self,
        system_prompt: &str,
        user_prompt: &str,
        max_tokens: u32,
    ) -> BonsaiResult<String>;

    /// Generate one completion covering several inputs
    ///
    /// The inputs are packed into a single user prompt with
    /// [`encode_batch_prompt`]; the system prompt tells the model how to
    /// separate the answers.
    ///
    /// The HTTP providers override this to send a single attempt without
    /// their retry policy. A failed batch goes back to the column driver,
    /// which can shrink it and try again.
    fn generate_batch(
        &self,
        system_prompt: &str,
        user_prompts: &[String],
        max_tokens: u32,
    ) -> BonsaiResult<String> {
        validate_batch_prompts(system_prompt, user_prompts)?;
        self.generate(system_prompt, &encode_batch_prompt(user_prompts), max_tokens)
    }

    /// Token usage accumulated so far
    fn usage(&self) -> TokenUsage {
        TokenUsage::default()
    }
}

/// Reject prompts no backend can answer
pub fn validate_prompts(system_prompt: &str, user_prompt: &str) -> BonsaiResult<()> {
    if system_prompt.is_empty() {
        return Err(BonsaiError::Validation(
            "System prompt is required.".to_string(),
        ));
    }
    if user_prompt.is_empty() {
        return Err(BonsaiError::Validation("User prompt is required.".to_string()));
    }
    Ok(())
}

pub fn validate_batch_prompts(system_prompt: &str, user_prompts: &[String]) -> BonsaiResult<()> {
    if system_prompt.is_empty() {
        return Err(BonsaiError::Validation(
            "System prompt is required.".to_string(),
        ));
    }
    if user_prompts.is_empty() {
        return Err(BonsaiError::Validation("User prompt is required.".to_string()));
    }
    Ok(())
}

/// Pack inputs as `Content 1: a, Content 2: b, ...`
pub fn encode_batch_prompt(user_prompts: &[String]) -> String {
    user_prompts
        .iter()
        .enumerate()
        .map(|(idx, prompt)| format!("Content {}: {prompt}", idx + 1))
        .collect::<Vec<_>>()
        .join(separators::BATCH_CONTENT)
}

/// One chat turn in the role/content shape shared by the HTTP APIs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

/// Thread-safe token counter shared by the HTTP providers
#[derive(Debug, Default)]
pub(crate) struct UsageTracker {
    usage: Mutex<TokenUsage>,
}

impl UsageTracker {
    pub(crate) fn record(&self, input_tokens: u64, output_tokens: u64) {
        let mut usage = self.usage.lock();
        usage.input_tokens += input_tokens;
        usage.output_tokens += output_tokens;
    }

    pub(crate) fn snapshot(&self) -> TokenUsage {
        *self.usage.lock()
    }
}

/// Map a non-success HTTP status to an error
///
/// Rate limiting, timeouts and server errors are transient and come back as
/// `Http` so the retry policy repeats them. Other client errors will not
/// improve on retry.
pub(crate) fn status_error(provider: &str, status: StatusCode, body: &str) -> BonsaiError {
    let message = format!("{provider} returned HTTP {status}: {body}");
    if status == StatusCode::TOO_MANY_REQUESTS
        || status == StatusCode::REQUEST_TIMEOUT
        || status.is_server_error()
    {
        BonsaiError::Http(message)
    } else if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        BonsaiError::InvalidConfiguration(message)
    } else {
        BonsaiError::InvalidResponse(message)
    }
}

/// Decode a successful response body or turn a failed one into an error
pub(crate) fn read_json<T>(provider: &str, response: reqwest::blocking::Response) -> BonsaiResult<T>
where
    T: serde::de::DeserializeOwned,
{
    let status = response.status();
    if status.is_success() {
        return response.json::<T>().map_err(|e| {
            BonsaiError::InvalidResponse(format!("Failed to parse {provider} response: {e}"))
        });
    }

    let body = response
        .text()
        .unwrap_or_else(|_| "Unknown error".to_string());
    tracing::error!(provider = %provider, status = %status, error = %body, "Provider request failed");
    Err(status_error(provider, status, &body))
}

/// Resolve an API key from explicit settings or the environment
pub(crate) fn resolve_api_key(
    explicit: Option<&str>,
    env_var: &str,
    provider: &str,
) -> BonsaiResult<String> {
    if let Some(key) = explicit.filter(|k| !k.is_empty()) {
        return Ok(key.to_string());
    }
    match std::env::var(env_var) {
        Ok(key) if !key.is_empty() => Ok(key),
        _ => Err(BonsaiError::InvalidConfiguration(format!(
            "{provider} API key not provided. Set it in configuration or {env_var}."
        ))),
    }
}

pub(crate) fn build_http_client(
    timeout: std::time::Duration,
) -> BonsaiResult<reqwest::blocking::Client> {
    reqwest::blocking::Client::builder()
        .timeout(timeout)
        .user_agent(format!("databonsai/{}", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|e| BonsaiError::InvalidConfiguration(format!("Failed to create HTTP client: {e}")))
}
