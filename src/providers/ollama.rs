//! Local Ollama provider.

use super::{
    build_http_client, encode_batch_prompt, read_json, validate_batch_prompts, validate_prompts,
    ChatMessage, LlmProvider, RetryPolicy, TokenUsage, UsageTracker,
};
use crate::config::OllamaConfig;
use crate::error::BonsaiResult;
use serde::{Deserialize, Serialize};
use tracing::info;

const PROVIDER: &str = "ollama";

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    stream: bool,
    options: ChatOptions,
}

#[derive(Debug, Serialize)]
struct ChatOptions {
    temperature: f64,
    num_predict: u32,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    message: ChatMessage,
    #[serde(default)]
    prompt_eval_count: u64,
    #[serde(default)]
    eval_count: u64,
}

/// Client for `POST {host}/api/chat`. No API key is needed.
#[derive(Debug)]
pub struct OllamaProvider {
    client: reqwest::blocking::Client,
    config: OllamaConfig,
    retry: RetryPolicy,
    usage: UsageTracker,
}

impl OllamaProvider {
    pub fn new(config: OllamaConfig, retry: RetryPolicy) -> BonsaiResult<Self> {
        let client = build_http_client(config.request_timeout())?;
        info!(host = %config.host, model = %config.model, "Created Ollama provider");
        Ok(Self {
            client,
            config,
            retry,
            usage: UsageTracker::default(),
        })
    }

    pub fn model(&self) -> &str {
        &self.config.model
    }

    fn build_request(&self, system_prompt: &str, user_prompt: &str, max_tokens: u32) -> ChatRequest<'_> {
        ChatRequest {
            model: &self.config.model,
            messages: vec![
                ChatMessage::system(system_prompt),
                ChatMessage::user(user_prompt),
            ],
            stream: false,
            options: ChatOptions {
                temperature: self.config.temperature,
                num_predict: max_tokens,
            },
        }
    }

    fn endpoint(&self) -> String {
        format!("{}/api/chat", self.config.host.trim_end_matches('/'))
    }

    fn send(&self, request: &ChatRequest<'_>, url: &str) -> BonsaiResult<String> {
        let response = self.client.post(url).json(request).send()?;
        let chat: ChatResponse = read_json(PROVIDER, response)?;
        self.usage.record(chat.prompt_eval_count, chat.eval_count);
        Ok(chat.message.content)
    }
}

impl LlmProvider for OllamaProvider {
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

        self.retry.run("ollama.generate", || self.send(&request, &url))
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
    use crate::error::BonsaiError;
    use serde_json::json;

    #[test]
    fn test_request_body_shape() {
        let provider = OllamaProvider::new(
            OllamaConfig {
                host: "http://gpu-box:11434/".to_string(),
                ..Default::default()
            },
            RetryPolicy::immediate(1),
        )
        .unwrap();

        let body = serde_json::to_value(provider.build_request("sys", "hi", 64)).unwrap();
        assert_eq!(body["model"], "llama3");
        assert_eq!(body["stream"], false);
        assert_eq!(body["options"], json!({"temperature": 0.0, "num_predict": 64}));
        assert_eq!(body["messages"][1]["content"], "hi");
        assert_eq!(provider.endpoint(), "http://gpu-box:11434/api/chat");
    }

    #[test]
    fn test_batch_calls_bypass_the_retry_policy() {
        // nothing listens on the discard port, so every request is refused
        let provider = OllamaProvider::new(
            OllamaConfig {
                host: "http://127.0.0.1:9".to_string(),
                ..Default::default()
            },
            RetryPolicy::immediate(3),
        )
        .unwrap();

        let single = provider.generate("sys", "hi", 16);
        assert!(matches!(
            single,
            Err(BonsaiError::RetriesExhausted { attempts: 3, .. })
        ));

        let batch = provider.generate_batch("sys", &["a".to_string(), "b".to_string()], 16);
        assert!(matches!(batch, Err(BonsaiError::Http(_))));
        assert_eq!(provider.usage(), TokenUsage::default());
    }

    #[test]
    fn test_response_parsing_tolerates_missing_counts() {
        let response: ChatResponse = serde_json::from_value(json!({
            "model": "llama3",
            "message": {"role": "assistant", "content": "Positive"},
            "done": true
        }))
        .unwrap();
        assert_eq!(response.message.content, "Positive");
        assert_eq!(response.eval_count, 0);
    }
}
