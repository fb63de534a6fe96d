//! # Categorization
//!
//! LLM-backed classifiers over a fixed, caller-defined category set.
//!
//! - [`Categorizer`]: exactly one category per snippet, with a batched variant
//!   that classifies several snippets in one completion
//! - [`MultiCategorizer`]: any non-empty subset of the categories per snippet
//!
//! Every reply is checked against the category set; an unknown category is a
//! [`BonsaiError::Validation`](crate::error::BonsaiError::Validation) failure,
//! which the column drivers treat like any other processing failure.

mod categorizer;
mod multi;

pub use categorizer::Categorizer;
pub use multi::MultiCategorizer;

use crate::error::{BonsaiError, BonsaiResult};
use std::collections::BTreeMap;

/// Validated category name to description map
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategorySet {
    categories: BTreeMap<String, String>,
}

impl CategorySet {
    /// At least two categories are required
    pub fn new<I, K, V>(categories: I) -> BonsaiResult<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let categories: BTreeMap<String, String> = categories
            .into_iter()
            .map(|(name, description)| (name.into(), description.into()))
            .collect();

        if categories.is_empty() {
            return Err(BonsaiError::InvalidConfiguration(
                "Categories dictionary cannot be empty.".to_string(),
            ));
        }
        if categories.len() < 2 {
            return Err(BonsaiError::InvalidConfiguration(
                "Categories dictionary must have more than one key-value pair.".to_string(),
            ));
        }
        if categories.keys().any(|name| name.trim().is_empty()) {
            return Err(BonsaiError::InvalidConfiguration(
                "Category names cannot be blank.".to_string(),
            ));
        }

        Ok(Self { categories })
    }

    pub fn contains(&self, name: &str) -> bool {
        self.categories.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.categories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.categories.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.categories.keys().map(String::as_str)
    }

    pub fn as_map(&self) -> &BTreeMap<String, String> {
        &self.categories
    }

    /// `<category>: <description>` lines for the system prompt
    fn describe(&self) -> String {
        self.categories
            .iter()
            .map(|(name, description)| format!("{name}: {description}"))
            .collect::<Vec<_>>()
            .join("\n")
    }

    fn name_list(&self) -> String {
        let quoted: Vec<String> = self.names().map(|name| format!("'{name}'")).collect();
        format!("[{}]", quoted.join(", "))
    }

    fn ensure_known(&self, predicted: &str) -> BonsaiResult<()> {
        if self.contains(predicted) {
            Ok(())
        } else {
            Err(BonsaiError::Validation(format!(
                "Predicted category '{predicted}' is not one of the provided categories."
            )))
        }
    }
}
