//! Multi-label categorizer.

use super::{Categorizer, CategorySet};
use crate::apply::{apply_to_column, ApplyOptions, ApplyReport};
use crate::constants::{labels, separators};
use crate::error::{BonsaiError, BonsaiResult};
use crate::providers::LlmProvider;
use std::sync::Arc;

/// Assigns one or more categories to each snippet
#[derive(Debug, Clone)]
pub struct MultiCategorizer {
    inner: Categorizer,
}

impl MultiCategorizer {
    pub fn new<I, K, V>(categories: I, provider: Arc<dyn LlmProvider>) -> BonsaiResult<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Ok(Self {
            inner: Categorizer::new(categories, provider)?,
        })
    }

    pub fn with_max_tokens(self, max_tokens: u32) -> Self {
        Self {
            inner: self.inner.with_max_tokens(max_tokens),
        }
    }

    pub fn categories(&self) -> &CategorySet {
        self.inner.categories()
    }

    fn system_prompt(&self) -> String {
        let categories = self.inner.categories();
        format!(
            "Each category is formatted as <category>: <description of data that fits the category>\n\
             {}\n\
             Classify the given text snippet into one or more of the following categories:\n\
             {}\n\
             Reply with a comma-separated list of categories. Do not make any other conversation.",
            categories.describe(),
            categories.name_list()
        )
    }

    /// Classify one snippet into a subset of the categories, in reply order
    ///
    /// # Errors
    ///
    /// `Validation` when any listed category is unknown.
    pub fn categorize(&self, input: &str) -> BonsaiResult<Vec<String>> {
        let reply = self.inner.provider().generate(
            &self.system_prompt(),
            input,
            self.inner.max_tokens(),
        )?;

        let predicted: Vec<String> = reply
            .split(separators::MULTI_CATEGORY)
            .map(|category| category.trim().to_string())
            .collect();

        let unknown: Vec<&str> = predicted
            .iter()
            .map(String::as_str)
            .filter(|category| !self.inner.categories().contains(category))
            .collect();
        if !unknown.is_empty() {
            return Err(BonsaiError::Validation(format!(
                "Predicted categories {predicted:?} are not a subset of the provided categories (unknown: {unknown:?})."
            )));
        }

        Ok(predicted)
    }

    /// Categorize a column one snippet at a time
    pub fn categorize_column<S: AsRef<str>>(
        &self,
        input: &[S],
        output: &mut Vec<Option<Vec<String>>>,
        start_idx: usize,
    ) -> BonsaiResult<ApplyReport> {
        apply_to_column(
            input,
            output,
            |snippet: &S| self.categorize(snippet.as_ref()),
            ApplyOptions::default()
                .starting_at(start_idx)
                .labeled(labels::CATEGORIZING),
        )
    }
}
