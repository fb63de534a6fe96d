//! Schema-driven decomposition of one snippet into many records.

use super::Transformer;
use crate::apply::{apply_to_column, ApplyOptions, ApplyReport};
use crate::constants::labels;
use crate::error::{BonsaiError, BonsaiResult};
use crate::providers::LlmProvider;
use serde_json::{Map, Value};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

/// One decomposed record, keyed by schema field
pub type Record = Map<String, Value>;

/// Splits each snippet into a list of records matching `output_schema`
#[derive(Debug, Clone)]
pub struct DecomposeTransformer {
    transformer: Transformer,
    output_schema: BTreeMap<String, String>,
}

impl DecomposeTransformer {
    /// `output_schema` maps field name to a description of its content
    ///
    /// # Errors
    ///
    /// `InvalidConfiguration` for an empty prompt or an empty schema.
    pub fn new<I, K, V>(
        prompt: impl Into<String>,
        output_schema: I,
        provider: Arc<dyn LlmProvider>,
    ) -> BonsaiResult<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let transformer = Transformer::new(prompt, provider)?;
        let output_schema: BTreeMap<String, String> = output_schema
            .into_iter()
            .map(|(key, description)| (key.into(), description.into()))
            .collect();

        if output_schema.is_empty() {
            return Err(BonsaiError::InvalidConfiguration(
                "Schema dictionary cannot be empty.".to_string(),
            ));
        }

        Ok(Self {
            transformer,
            output_schema,
        })
    }

    pub fn with_max_tokens(self, max_tokens: u32) -> Self {
        Self {
            transformer: self.transformer.with_max_tokens(max_tokens),
            ..self
        }
    }

    pub fn output_schema(&self) -> &BTreeMap<String, String> {
        &self.output_schema
    }

    fn system_prompt(&self) -> BonsaiResult<String> {
        let schema = serde_json::to_string(&self.output_schema)?;
        Ok(format!(
            "Use the following prompt to transform the input data:\n\
             Input Data: {}\n\n\
             The transformed data should be a list of dictionaries, where each dictionary has the following schema:\n\
             {schema}\n\n\
             Reply with a JSON-formatted list of dictionaries. Do not make any conversation.",
            self.transformer.prompt()
        ))
    }

    /// Decompose one snippet
    ///
    /// # Errors
    ///
    /// `Validation` when the reply is not a JSON array of objects whose key
    /// sets equal the schema's.
    pub fn transform(&self, input: &str) -> BonsaiResult<Vec<Record>> {
        let reply = self.transformer.provider().generate(
            &self.system_prompt()?,
            input,
            self.transformer.max_tokens(),
        )?;
        self.parse_records(&reply)
    }

    fn parse_records(&self, reply: &str) -> BonsaiResult<Vec<Record>> {
        let value: Value = serde_json::from_str(strip_code_fence(reply)).map_err(|e| {
            BonsaiError::Validation(format!("Invalid format in the transformed data: {e}"))
        })?;

        let Value::Array(items) = value else {
            return Err(BonsaiError::Validation(
                "Transformed data must be a list.".to_string(),
            ));
        };

        let expected: BTreeSet<&str> = self.output_schema.keys().map(String::as_str).collect();
        items
            .into_iter()
            .map(|item| {
                let Value::Object(record) = item else {
                    return Err(BonsaiError::Validation(
                        "Each item in the transformed data must be a dictionary.".to_string(),
                    ));
                };
                let actual: BTreeSet<&str> = record.keys().map(String::as_str).collect();
                if actual != expected {
                    return Err(BonsaiError::Validation(format!(
                        "The keys in the transformed data do not match the schema: expected {expected:?}, got {actual:?}."
                    )));
                }
                Ok(record)
            })
            .collect()
    }

    /// Decompose a column one snippet at a time
    pub fn transform_column<S: AsRef<str>>(
        &self,
        input: &[S],
        output: &mut Vec<Option<Vec<Record>>>,
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
}

/// Models often wrap JSON in a ```json fence
fn strip_code_fence(reply: &str) -> &str {
    let trimmed = reply.trim();
    trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .and_then(|rest| rest.strip_suffix("```"))
        .map(str::trim)
        .unwrap_or(trimmed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::ScriptedProvider;

    fn decomposer(reply: &str) -> (Arc<ScriptedProvider>, DecomposeTransformer) {
        let provider = Arc::new(ScriptedProvider::with_replies([reply]));
        let transformer = DecomposeTransformer::new(
            "Decompose the expense report into line items",
            [
                ("category", "Expense category"),
                ("amount", "Amount in dollars"),
            ],
            provider.clone(),
        )
        .unwrap();
        (provider, transformer)
    }

    #[test]
    fn test_parses_records_matching_schema() {
        let (provider, transformer) = decomposer(
            r#"[{"category": "Travel", "amount": 120}, {"category": "Meals", "amount": "45.50"}]"#,
        );

        let records = transformer.transform("Flight 120, lunch 45.50").unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0]["category"], "Travel");
        assert_eq!(records[1]["amount"], "45.50");

        let call = provider.last_call().unwrap();
        assert!(call.system_prompt.contains(
            r#"{"amount":"Amount in dollars","category":"Expense category"}"#
        ));
    }

    #[test]
    fn test_fenced_reply_is_accepted() {
        let (_, transformer) = decomposer("```json\n[{\"category\": \"Travel\", \"amount\": 1}]\n```");
        assert_eq!(transformer.transform("taxi").unwrap().len(), 1);
    }

    #[test]
    fn test_rejects_malformed_replies() {
        for reply in [
            "not json at all",
            r#"{"category": "Travel", "amount": 1}"#,
            r#"["Travel"]"#,
            r#"[{"category": "Travel"}]"#,
            r#"[{"category": "Travel", "amount": 1, "note": "extra"}]"#,
        ] {
            let (_, transformer) = decomposer(reply);
            assert!(
                matches!(transformer.transform("x"), Err(BonsaiError::Validation(_))),
                "reply should be rejected: {reply}"
            );
        }
    }

    #[test]
    fn test_empty_schema_is_rejected() {
        let provider: Arc<dyn LlmProvider> = Arc::new(ScriptedProvider::with_replies(["[]"]));
        let result =
            DecomposeTransformer::new("Split", Vec::<(String, String)>::new(), provider);
        assert!(matches!(result, Err(BonsaiError::InvalidConfiguration(_))));
    }
}
