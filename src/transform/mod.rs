//! # Transformation
//!
//! Prompt-driven rewriting of text snippets.
//!
//! - [`Transformer`]: free-text output, trimmed
//! - [`DecomposeTransformer`]: splits a snippet into records that follow a
//!   fixed key schema, parsed from a JSON reply

mod decompose;
mod transformer;

pub use decompose::{DecomposeTransformer, Record};
pub use transformer::Transformer;
