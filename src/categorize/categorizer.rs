//! Single-label categorizer.

use super::CategorySet;
use crate::apply::{
    apply_to_column, apply_to_column_autobatch, AdaptiveBatchConfig, ApplyOptions, ApplyReport,
};
use crate::constants::{labels, separators, DEFAULT_MAX_TOKENS};
use crate::error::{BonsaiError, BonsaiResult};
use crate::providers::LlmProvider;
use std::sync::Arc;
use tracing::debug;

/// Assigns exactly one category to each snippet
#[derive(Debug, Clone)]
pub struct Categorizer {
    categories: CategorySet,
    provider: Arc<dyn LlmProvider>,
    max_tokens: u32,
}

impl Categorizer {
    /// # Errors
    ///
    /// `InvalidConfiguration` when fewer than two categories are given.
    pub fn new<I, K, V>(categories: I, provider: Arc<dyn LlmProvider>) -> BonsaiResult<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Ok(Self {
            categories: CategorySet::new(categories)?,
            provider,
            max_tokens: DEFAULT_MAX_TOKENS,
        })
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn categories(&self) -> &CategorySet {
        &self.categories
    }

    pub fn provider(&self) -> &Arc<dyn LlmProvider> {
        &self.provider
    }

    pub(super) fn max_tokens(&self) -> u32 {
        self.max_tokens
    }

    fn system_prompt(&self) -> String {
        format!(
            "Each category is formatted as <category>: <description of data that fits the category>\n\
             {}\n\
             Classify the given text snippet into one of the following categories:\n\
             {}\n\
             Only reply with the category. Do not make any other conversation.",
            self.categories.describe(),
            self.categories.name_list()
        )
    }

    fn batch_system_prompt(&self) -> String {
        format!(
            "Each category is formatted as <category>: <description of data that fits the category>\n\
             {}\n\
             Classify each given text snippet into one of the following categories:\n\
             {}. Reply with a list of categories, separated by {}, one for each snippet.\n\
             Only reply with the categories. Do not make any other conversation.",
            self.categories.describe(),
            self.categories.name_list(),
            separators::BATCH_CATEGORIES
        )
    }

    /// Classify one snippet
    ///
    /// # Errors
    ///
    /// `Validation` when the trimmed reply is not a known category, or any
    /// provider error.
    pub fn categorize(&self, input: &str) -> BonsaiResult<String> {
        let reply = self
            .provider
            .generate(&self.system_prompt(), input, self.max_tokens)?;
        let predicted = reply.trim();
        self.categories.ensure_known(predicted)?;
        Ok(predicted.to_string())
    }

    /// Classify several snippets with one completion
    ///
    /// The reply is split on `||`; it must hold exactly one known category per
    /// input, in input order.
    pub fn categorize_batch<S: AsRef<str>>(&self, inputs: &[S]) -> BonsaiResult<Vec<String>> {
        let prompts: Vec<String> = inputs.iter().map(|s| s.as_ref().to_string()).collect();
        let reply =
            self.provider
                .generate_batch(&self.batch_system_prompt(), &prompts, self.max_tokens)?;

        let predicted: Vec<String> = reply
            .split(separators::BATCH_CATEGORIES)
            .map(|category| category.trim().to_string())
            .collect();

        if predicted.len() != inputs.len() {
            debug!(reply = %reply, "Batch categorization reply had the wrong number of entries");
            return Err(BonsaiError::Validation(format!(
                "Number of predicted categories ({}) does not match the number of input data ({}).",
                predicted.len(),
                inputs.len()
            )));
        }
        for category in &predicted {
            self.categories.ensure_known(category)?;
        }

        Ok(predicted)
    }

    /// Categorize a column one snippet at a time
    pub fn categorize_column<S: AsRef<str>>(
        &self,
        input: &[S],
        output: &mut Vec<Option<String>>,
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

    /// Categorize a column with adaptively sized batches
    pub fn categorize_column_adaptive<S: AsRef<str>>(
        &self,
        input: &[S],
        output: &mut Vec<Option<String>>,
        config: &AdaptiveBatchConfig,
        start_idx: usize,
    ) -> BonsaiResult<ApplyReport> {
        apply_to_column_autobatch(
            input,
            output,
            |batch: &[S]| self.categorize_batch(batch),
            config,
            ApplyOptions::default()
                .starting_at(start_idx)
                .labeled(labels::CATEGORIZING),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::ScriptedProvider;

    fn categorizer(provider: Arc<ScriptedProvider>) -> Categorizer {
        Categorizer::new(
            [
                ("Weather", "Insights and remarks about weather conditions."),
                ("Sports", "Observations and comments on sports events."),
                ("Politics", "Political events related to governments, nations, or geopolitical issues."),
            ],
            provider,
        )
        .unwrap()
    }

    #[test]
    fn test_categorize_trims_and_validates() {
        let provider = Arc::new(ScriptedProvider::with_replies([" Weather\n", "Cooking"]));
        let categorizer = categorizer(provider.clone());

        assert_eq!(
            categorizer.categorize("Storm clouds over the city").unwrap(),
            "Weather"
        );
        let err = categorizer.categorize("A new pasta recipe").unwrap_err();
        assert!(matches!(err, BonsaiError::Validation(_)));
        assert!(err.to_string().contains("'Cooking'"));

        let call = provider.last_call().unwrap();
        assert!(call.system_prompt.contains("Politics: Political events"));
        assert!(call.system_prompt.contains("['Politics', 'Sports', 'Weather']"));
        assert_eq!(call.max_tokens, DEFAULT_MAX_TOKENS);
    }

    #[test]
    fn test_categorize_batch_splits_reply() {
        let provider = Arc::new(ScriptedProvider::with_replies(["Weather || Sports||Politics"]));
        let categorizer = categorizer(provider.clone());

        let inputs = ["rain", "match", "election"];
        let result = categorizer.categorize_batch(&inputs).unwrap();
        assert_eq!(result, vec!["Weather", "Sports", "Politics"]);

        let call = provider.last_call().unwrap();
        assert_eq!(
            call.user_prompt,
            "Content 1: rain, Content 2: match, Content 3: election"
        );
        assert!(call.system_prompt.contains("separated by ||"));
    }

    #[test]
    fn test_categorize_batch_count_mismatch() {
        let provider = Arc::new(ScriptedProvider::with_replies(["Weather||Sports"]));
        let err = categorizer(provider)
            .categorize_batch(&["a", "b", "c"])
            .unwrap_err();
        assert!(err.to_string().contains("(2) does not match"));
    }

    #[test]
    fn test_requires_two_categories() {
        let provider: Arc<dyn LlmProvider> = Arc::new(ScriptedProvider::with_replies(["x"]));
        assert!(Categorizer::new([("Only", "one")], provider).is_err());
    }

    #[test]
    fn test_categorize_column_stops_on_unknown_category() {
        let provider = Arc::new(ScriptedProvider::with_replies(["Sports", "Weather", "Gardening"]));
        let categorizer = categorizer(provider);
        let input = vec!["match", "rain", "roses", "vote"];
        let mut output = Vec::new();

        let report = categorizer.categorize_column(&input, &mut output, 0).unwrap();
        assert_eq!(report.success_idx, 2);
        assert_eq!(
            output,
            vec![Some("Sports".to_string()), Some("Weather".to_string())]
        );
    }
}
