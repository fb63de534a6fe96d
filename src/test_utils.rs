//! # Test Utilities
//!
//! An in-process [`LlmProvider`] for exercising categorizers, transformers and
//! the column drivers without network access. Replies are either scripted in
//! order or computed from the prompts.

use crate::error::{BonsaiError, BonsaiResult};
use crate::providers::{LlmProvider, TokenUsage};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::fmt;

type Responder = Box<dyn Fn(&str, &str) -> BonsaiResult<String> + Send + Sync>;

/// One `generate` call as seen by the provider
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedCall {
    pub system_prompt: String,
    pub user_prompt: String,
    pub max_tokens: u32,
}

/// Deterministic provider for tests
///
/// Usage is counted in whitespace-separated words so assertions stay stable.
pub struct ScriptedProvider {
    script: Mutex<VecDeque<BonsaiResult<String>>>,
    responder: Option<Responder>,
    calls: Mutex<Vec<RecordedCall>>,
    usage: Mutex<TokenUsage>,
}

impl fmt::Debug for ScriptedProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScriptedProvider")
            .field("pending", &self.script.lock().len())
            .field("calls", &self.calls.lock().len())
            .field("has_responder", &self.responder.is_some())
            .finish()
    }
}

impl ScriptedProvider {
    /// Reply with each string in order
    pub fn with_replies<I, S>(replies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::with_results(replies.into_iter().map(|r| Ok(r.into())))
    }

    /// Return each result in order; failures are returned as-is
    pub fn with_results<I>(results: I) -> Self
    where
        I: IntoIterator<Item = BonsaiResult<String>>,
    {
        Self {
            script: Mutex::new(results.into_iter().collect()),
            responder: None,
            calls: Mutex::new(Vec::new()),
            usage: Mutex::new(TokenUsage::default()),
        }
    }

    /// Compute every reply from `(system_prompt, user_prompt)`
    pub fn with_responder<F>(responder: F) -> Self
    where
        F: Fn(&str, &str) -> BonsaiResult<String> + Send + Sync + 'static,
    {
        Self {
            script: Mutex::new(VecDeque::new()),
            responder: Some(Box::new(responder)),
            calls: Mutex::new(Vec::new()),
            usage: Mutex::new(TokenUsage::default()),
        }
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }

    pub fn last_call(&self) -> Option<RecordedCall> {
        self.calls.lock().last().cloned()
    }
}

impl LlmProvider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    fn generate(
        &self,
        system_prompt: &str,
        user_prompt: &str,
        max_tokens: u32,
    ) -> BonsaiResult<String> {
        crate::providers::validate_prompts(system_prompt, user_prompt)?;

        self.calls.lock().push(RecordedCall {
            system_prompt: system_prompt.to_string(),
            user_prompt: user_prompt.to_string(),
            max_tokens,
        });

        let reply = match self.script.lock().pop_front() {
            Some(scripted) => scripted,
            None => match &self.responder {
                Some(responder) => responder(system_prompt, user_prompt),
                None => Err(BonsaiError::Provider("scripted replies exhausted".to_string())),
            },
        }?;

        let mut usage = self.usage.lock();
        usage.input_tokens += user_prompt.split_whitespace().count() as u64;
        usage.output_tokens += reply.split_whitespace().count() as u64;
        Ok(reply)
    }

    fn usage(&self) -> TokenUsage {
        *self.usage.lock()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_script_then_exhaustion() {
        let provider = ScriptedProvider::with_replies(["one", "two words"]);
        assert_eq!(provider.generate("sys", "a", 5).unwrap(), "one");
        assert_eq!(provider.generate("sys", "b c", 5).unwrap(), "two words");
        assert!(matches!(
            provider.generate("sys", "d", 5),
            Err(BonsaiError::Provider(_))
        ));

        assert_eq!(provider.call_count(), 3);
        assert_eq!(provider.last_call().unwrap().user_prompt, "d");
        assert_eq!(provider.usage().input_tokens, 4);
        assert_eq!(provider.usage().output_tokens, 3);
    }

    #[test]
    fn test_responder_sees_prompts() {
        let provider = ScriptedProvider::with_responder(|_, user| Ok(user.to_uppercase()));
        assert_eq!(provider.generate("sys", "quiet", 5).unwrap(), "QUIET");
    }
}
