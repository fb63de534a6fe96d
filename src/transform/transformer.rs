//! Free-text transformer.

use crate::apply::{apply_to_column, apply_to_column_batch, ApplyOptions, ApplyReport};
use crate::constants::{labels, DEFAULT_MAX_TOKENS};
use crate::error::{BonsaiError, BonsaiResult};
use crate::providers::LlmProvider;
use std::sync::Arc;

/// Rewrites each snippet according to a fixed instruction
#[derive(Debug, Clone)]
pub struct Transformer {
    prompt: String,
    provider: Arc<dyn LlmProvider>,
    max_tokens: u32,
}

impl Transformer {
    /// # Errors
    ///
    /// `InvalidConfiguration` for an empty prompt.
    pub fn new(prompt: impl Into<String>, provider: Arc<dyn LlmProvider>) -> BonsaiResult<Self> {
        let prompt = prompt.into();
        if prompt.trim().is_empty() {
            return Err(BonsaiError::InvalidConfiguration(
                "Prompt cannot be empty.".to_string(),
            ));
        }
        Ok(Self {
            prompt,
            provider,
            max_tokens: DEFAULT_MAX_TOKENS,
        })
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    pub fn max_tokens(&self) -> u32 {
        self.max_tokens
    }

    pub(super) fn provider(&self) -> &Arc<dyn LlmProvider> {
        &self.provider
    }

    fn system_prompt(&self) -> String {
        format!(
            "Use the following prompt to transform the input data:\nPrompt: {}",
            self.prompt
        )
    }

    /// Transform one snippet; the reply is trimmed
    pub fn transform(&self, input: &str) -> BonsaiResult<String> {
        let reply = self
            .provider
            .generate(&self.system_prompt(), input, self.max_tokens)?;
        Ok(reply.trim().to_string())
    }

    /// Transform a column one snippet at a time
    pub fn transform_column<S: AsRef<str>>(
        &self,
        input: &[S],
        output: &mut Vec<Option<String>>,
        start_idx: usize,
    ) -> BonsaiResult<ApplyReport> {
        apply_to_column(
            input,
            output,
            |snippet: &S| self.transform(snippet.as_ref()),
            ApplyOptions::default()
                .starting_at(start_idx)
                .labeled(labels::TRANSFORMING),
        )
    }

    /// Transform a column in fixed-size chunks, one call per snippet
    ///
    /// Chunking only controls how much output is committed at a time: a
    /// failure anywhere in a chunk leaves the whole chunk unwritten.
    pub fn transform_column_chunked<S: AsRef<str>>(
        &self,
        input: &[S],
        output: &mut Vec<Option<String>>,
        chunk_size: usize,
        start_idx: usize,
    ) -> BonsaiResult<ApplyReport> {
        apply_to_column_batch(
            input,
            output,
            |chunk: &[S]| {
                chunk
                    .iter()
                    .map(|snippet| self.transform(snippet.as_ref()))
                    .collect::<BonsaiResult<Vec<_>>>()
            },
            chunk_size,
            ApplyOptions::default()
                .starting_at(start_idx)
                .labeled(labels::TRANSFORMING),
        )
    }
}
