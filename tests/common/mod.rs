//! Shared helpers for the integration tests.

#![allow(dead_code)]

pub mod strategies;

use std::collections::BTreeSet;

/// Batch function that fails on every batch containing one of `poison`
/// and doubles each string otherwise
pub fn failing_on<'a>(
    poison: &'a [&'a str],
    seen: &'a mut Vec<usize>,
) -> impl FnMut(&[String]) -> anyhow::Result<Vec<String>> + 'a {
    move |batch: &[String]| {
        seen.push(batch.len());
        if batch.iter().any(|item| poison.contains(&item.as_str())) {
            anyhow::bail!("batch of {} rejected", batch.len());
        }
        Ok(batch.iter().map(|item| item.repeat(2)).collect())
    }
}

pub fn column(values: &[&str]) -> Vec<String> {
    values.iter().map(|value| value.to_string()).collect()
}

pub fn numbered_column(len: usize) -> Vec<String> {
    (0..len).map(|idx| format!("item-{idx}")).collect()
}

/// Indices that hold a result
pub fn filled_positions<R>(output: &[Option<R>]) -> BTreeSet<usize> {
    output
        .iter()
        .enumerate()
        .filter_map(|(idx, value)| value.as_ref().map(|_| idx))
        .collect()
}
