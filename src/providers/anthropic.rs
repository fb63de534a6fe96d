//! Anthropic messages API provider.

use super::{
    build_http_client, encode_batch_prompt, read_json, resolve_api_key, validate_batch_prompts,
    validate_prompts, LlmProvider, RetryPolicy, TokenUsage, UsageTracker,
};
use crate::config::AnthropicConfig;
use crate::constants::env_vars;
use crate::error::{BonsaiError, BonsaiResult};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

const PROVIDER: &str = "anthropic";

#[derive(Debug, Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    temperature: f64,
    system: &'a str,
    messages: Vec<UserMessage<'a>>,
}

#[derive(Debug, Serialize)]
struct UserMessage<'a> {
    role: &'static str,
    content: Vec<TextBlock<'a>>,
}

#[derive(Debug, Serialize)]
struct TextBlock<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    text: &'a str,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    content: Vec<ContentBlock>,
    usage: Usage,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Usage {
    input_tokens: u64,
    output_tokens: u64,
}

/// Client for `POST {base_url}/messages`
pub struct AnthropicProvider {
    client: reqwest::blocking::Client,
    config: AnthropicConfig,
    api_key: String,
    retry: RetryPolicy,
    usage: UsageTracker,
}

impl std::fmt::Debug for AnthropicProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnthropicProvider")
            .field("base_url", &self.config.base_url)
            .field("model", &self.config.model)
            .field("api_version", &self.config.api_version)
            .field("max_tries", &self.retry.max_tries())
            .finish()
    }
}

impl AnthropicProvider {
    /// Create a provider. The key comes from `config.api_key` or `ANTHROPIC_API_KEY`.
    pub fn new(config: AnthropicConfig, retry: RetryPolicy) -> BonsaiResult<Self> {
        let api_key = resolve_api_key(
            config.api_key.as_deref(),
            env_vars::ANTHROPIC_API_KEY,
            "Anthropic",
        )?;
        let client = build_http_client(config.request_timeout())?;

        info!(
            base_url = %config.base_url,
            model = %config.model,
            "Created Anthropic provider"
        );

        Ok(Self {
            client,
            config,
            api_key,
            retry,
            usage: UsageTracker::default(),
        })
    }

    pub fn model(&self) -> &str {
        &self.config.model
    }

    fn build_request<'a>(
        &'a self,
        system_prompt: &'a str,
        user_prompt: &'a str,
        max_tokens: u32,
    ) -> MessagesRequest<'a> {
        MessagesRequest {
            model: &self.config.model,
            max_tokens,
            temperature: self.config.temperature,
            system: system_prompt,
            messages: vec![UserMessage {
                role: "user",
                content: vec![TextBlock {
                    kind: "text",
                    text: user_prompt,
                }],
            }],
        }
    }

    fn endpoint(&self) -> String {
        format!("{}/messages", self.config.base_url.trim_end_matches('/'))
    }

    fn send(&self, request: &MessagesRequest<'_>, url: &str) -> BonsaiResult<String> {
        let response = self
            .client
            .post(url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", &self.config.api_version)
            .json(request)
            .send()
            .map_err(|e| {
                warn!(error = %e, "Error occurred during generation");
                BonsaiError::from(e)
            })?;
        let (text, usage) = message_text(read_json(PROVIDER, response)?)?;
        self.usage.record(usage.input_tokens, usage.output_tokens);
        Ok(text)
    }
}

fn message_text(response: MessagesResponse) -> BonsaiResult<(String, TokenUsage)> {
    let usage = TokenUsage {
        input_tokens: response.usage.input_tokens,
        output_tokens: response.usage.output_tokens,
    };

    let text = response
        .content
        .into_iter()
        .find(|block| block.kind == "text")
        .and_then(|block| block.text)
        .ok_or_else(|| {
            BonsaiError::InvalidResponse("Anthropic response contained no text block".to_string())
        })?;

    Ok((text, usage))
}

impl LlmProvider for AnthropicProvider {
    fn name(&self) -> &str {
        PROVIDER
    }

    fn generate(
        &self,
        system_prompt: &str,
        user_prompt: &str,
        max_tokens: u32,
    ) -> BonsaiResult<String> {
        validate_prompts(system_prompt, user_prompt)?;
        let request = self.build_request(system_prompt, user_prompt, max_tokens);
        let url = self.endpoint();

        self.retry.run("anthropic.generate", || self.send(&request, &url))
    }

    /// Batch calls are attempted once. Shrinking and retrying a failed batch
    /// is left to the adaptive column driver.
    fn generate_batch(
        &self,
        system_prompt: &str,
        user_prompts: &[String],
        max_tokens: u32,
    ) -> BonsaiResult<String> {
        validate_batch_prompts(system_prompt, user_prompts)?;
        let user_prompt = encode_batch_prompt(user_prompts);
        let request = self.build_request(system_prompt, &user_prompt, max_tokens);
        self.send(&request, &self.endpoint())
    }

    fn usage(&self) -> TokenUsage {
        self.usage.snapshot()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn provider() -> AnthropicProvider {
        AnthropicProvider::new(
            AnthropicConfig {
                api_key: Some("test-key".to_string()),
                ..Default::default()
            },
            RetryPolicy::immediate(1),
        )
        .unwrap()
    }

    #[test]
    fn test_request_body_shape() {
        let provider = provider();
        let body = serde_json::to_value(provider.build_request("sys", "hello", 100)).unwrap();

        assert_eq!(
            body,
            json!({
                "model": "claude-3-haiku-20240307",
                "max_tokens": 100,
                "temperature": 0.0,
                "system": "sys",
                "messages": [{
                    "role": "user",
                    "content": [{"type": "text", "text": "hello"}]
                }]
            })
        );
        assert_eq!(provider.endpoint(), "https://api.anthropic.com/v1/messages");
    }

    #[test]
    fn test_response_parsing_picks_first_text_block() {
        let response: MessagesResponse = serde_json::from_value(json!({
            "id": "msg_1",
            "content": [{"type": "text", "text": "Sports"}],
            "usage": {"input_tokens": 30, "output_tokens": 2}
        }))
        .unwrap();

        let (text, usage) = message_text(response).unwrap();
        assert_eq!(text, "Sports");
        assert_eq!(usage.total(), 32);
    }

    #[test]
    fn test_missing_text_block_is_invalid_response() {
        let response: MessagesResponse = serde_json::from_value(json!({
            "content": [],
            "usage": {"input_tokens": 1, "output_tokens": 0}
        }))
        .unwrap();
        assert!(matches!(
            message_text(response),
            Err(BonsaiError::InvalidResponse(_))
        ));
    }
}
