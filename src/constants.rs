//! # System Constants
//!
//! Shared literals for progress labels, prompt encoding and provider defaults.

/// Progress labels reported by the column drivers
pub mod labels {
    pub const PROCESSING: &str = "Processing";
    pub const CATEGORIZING: &str = "Categorizing";
    pub const TRANSFORMING: &str = "Transforming";
}

/// Separators used when several answers share one completion
pub mod separators {
    /// Between per-snippet categories in a batch categorization reply
    pub const BATCH_CATEGORIES: &str = "||";

    /// Between categories in a multi-category reply
    pub const MULTI_CATEGORY: &str = ",";

    /// Between encoded inputs in a batched user prompt
    pub const BATCH_CONTENT: &str = ", ";
}

/// Default completion budget for a single generate call
pub const DEFAULT_MAX_TOKENS: u32 = 1000;

/// Environment variables consulted for provider credentials
pub mod env_vars {
    pub const OPENAI_API_KEY: &str = "OPENAI_API_KEY";
    pub const ANTHROPIC_API_KEY: &str = "ANTHROPIC_API_KEY";
}
