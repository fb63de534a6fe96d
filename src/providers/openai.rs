//! OpenAI chat-completions provider.

use super::{
    build_http_client, encode_batch_prompt, read_json, resolve_api_key, validate_batch_prompts,
    validate_prompts, ChatMessage, LlmProvider, RetryPolicy, TokenUsage, UsageTracker,
};
use crate::config::OpenAiConfig;
use crate::constants::env_vars;
use crate::error::{BonsaiError, BonsaiResult};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

const PROVIDER: &str = "openai";

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    temperature: f64,
    max_tokens: u32,
    top_p: f64,
    frequency_penalty: f64,
    presence_penalty: f64,
    response_format: ResponseFormat,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<Choice>,
    #[serde(default)]
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Usage {
    prompt_tokens: u64,
    completion_tokens: u64,
}

/// Client for `POST {base_url}/chat/completions`
pub struct OpenAiProvider {
    client: reqwest::blocking::Client,
    config: OpenAiConfig,
    api_key: String,
    retry: RetryPolicy,
    usage: UsageTracker,
}

impl std::fmt::Debug for OpenAiProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiProvider")
            .field("base_url", &self.config.base_url)
            .field("model", &self.config.model)
            .field("json_mode", &self.config.json_mode)
            .field("max_tries", &self.retry.max_tries())
            .finish()
    }
}

impl OpenAiProvider {
    /// Create a provider. The key comes from `config.api_key` or `OPENAI_API_KEY`.
    ///
    /// No request is made here; call [`verify_model`](Self::verify_model) to
    /// check the model name against the API.
    pub fn new(config: OpenAiConfig, retry: RetryPolicy) -> BonsaiResult<Self> {
        let api_key = resolve_api_key(
            config.api_key.as_deref(),
            env_vars::OPENAI_API_KEY,
            "OpenAI",
        )?;
        let client = build_http_client(config.request_timeout())?;

        info!(
            base_url = %config.base_url,
            model = %config.model,
            json_mode = config.json_mode,
            "Created OpenAI provider"
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

    /// Confirm the configured model exists
    pub fn verify_model(&self) -> BonsaiResult<()> {
        let url = format!(
            "{}/models/{}",
            self.config.base_url.trim_end_matches('/'),
            self.config.model
        );
        let response = self.client.get(&url).bearer_auth(&self.api_key).send()?;
        if response.status().is_success() {
            debug!(model = %self.config.model, "Verified OpenAI model");
            Ok(())
        } else {
            Err(BonsaiError::InvalidConfiguration(format!(
                "Invalid OpenAI model: {} (HTTP {})",
                self.config.model,
                response.status()
            )))
        }
    }

    fn build_request<'a>(
        &'a self,
        system_prompt: &str,
        user_prompt: &str,
        max_tokens: u32,
    ) -> ChatCompletionRequest<'a> {
        ChatCompletionRequest {
            model: &self.config.model,
            messages: vec![
                ChatMessage::system(system_prompt),
                ChatMessage::user(user_prompt),
            ],
            temperature: self.config.temperature,
            max_tokens,
            top_p: 0.1,
            frequency_penalty: 0.0,
            presence_penalty: 0.0,
            response_format: ResponseFormat {
                kind: if self.config.json_mode {
                    "json_object"
                } else {
                    "text"
                },
            },
        }
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.config.base_url.trim_end_matches('/'))
    }

    fn send(&self, request: &ChatCompletionRequest<'_>, url: &str) -> BonsaiResult<String> {
        let response = self
            .client
            .post(url)
            .bearer_auth(&self.api_key)
            .json(request)
            .send()?;
        let (content, usage) = completion_text(read_json(PROVIDER, response)?)?;
        self.usage.record(usage.input_tokens, usage.output_tokens);
        Ok(content)
    }
}

fn completion_text(response: ChatCompletionResponse) -> BonsaiResult<(String, TokenUsage)> {
    let usage = response
        .usage
        .map(|u| TokenUsage {
            input_tokens: u.prompt_tokens,
            output_tokens: u.completion_tokens,
        })
        .unwrap_or_default();

    let content = response
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .ok_or_else(|| {
            BonsaiError::InvalidResponse("OpenAI response contained no message content".to_string())
        })?;

    Ok((content, usage))
}

impl LlmProvider for OpenAiProvider {
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

        self.retry.run("openai.generate", || self.send(&request, &url))
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

    fn provider(json_mode: bool) -> OpenAiProvider {
        OpenAiProvider::new(
            OpenAiConfig {
                api_key: Some("sk-test".to_string()),
                json_mode,
                ..Default::default()
            },
            RetryPolicy::immediate(1),
        )
        .unwrap()
    }

    #[test]
    fn test_request_body_shape() {
        let provider = provider(false);
        let body = serde_json::to_value(provider.build_request("sys", "hello", 42)).unwrap();

        assert_eq!(body["model"], "gpt-4-turbo");
        assert_eq!(body["max_tokens"], 42);
        assert_eq!(body["messages"][0], json!({"role": "system", "content": "sys"}));
        assert_eq!(body["messages"][1], json!({"role": "user", "content": "hello"}));
        assert_eq!(body["response_format"]["type"], "text");
        assert_eq!(
            provider.endpoint(),
            "https://api.openai.com/v1/chat/completions"
        );
    }

    #[test]
    fn test_json_mode_request() {
        let body = serde_json::to_value(provider(true).build_request("sys", "hello", 1)).unwrap();
        assert_eq!(body["response_format"]["type"], "json_object");
    }

    #[test]
    fn test_completion_parsing() {
        let response: ChatCompletionResponse = serde_json::from_value(json!({
            "choices": [{"message": {"role": "assistant", "content": "Weather"}}],
            "usage": {"prompt_tokens": 12, "completion_tokens": 1, "total_tokens": 13}
        }))
        .unwrap();

        let (content, usage) = completion_text(response).unwrap();
        assert_eq!(content, "Weather");
        assert_eq!(usage.input_tokens, 12);
        assert_eq!(usage.output_tokens, 1);
    }

    #[test]
    fn test_empty_choices_is_invalid_response() {
        let response: ChatCompletionResponse =
            serde_json::from_value(json!({"choices": []})).unwrap();
        assert!(matches!(
            completion_text(response),
            Err(BonsaiError::InvalidResponse(_))
        ));
    }

    #[test]
    fn test_empty_prompt_fails_without_request() {
        let provider = provider(false);
        assert!(matches!(
            provider.generate("sys", "", 10),
            Err(BonsaiError::Validation(_))
        ));
        assert_eq!(provider.usage(), TokenUsage::default());
    }
}
