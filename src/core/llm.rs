//! The one capability the cost model needs from a language-model provider.
//!
//! Provider clients (self-hosted or hosted APIs) live outside this crate. Whatever
//! they are, a call ends in an [`LlmCompletion`]; the cost model only needs the
//! token counts and the model id used for rate lookup.

use serde::{Deserialize, Serialize};

/// Result of one model call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LlmCompletion {
    pub content: String,
    pub input_tokens: u64,
    pub output_tokens: u64,
}

impl LlmCompletion {
    pub fn new(content: impl Into<String>, input_tokens: u64, output_tokens: u64) -> Self {
        Self {
            content: content.into(),
            input_tokens,
            output_tokens,
        }
    }

    /// Build a completion for providers that do not report usage, counting tokens
    /// from the prompt and response text.
    pub fn from_text(prompt: &str, content: impl Into<String>) -> Self {
        let content = content.into();
        let input_tokens = estimate_text_tokens(prompt);
        let output_tokens = estimate_text_tokens(&content);
        Self {
            content,
            input_tokens,
            output_tokens,
        }
    }
}

/// Rough token count for a piece of text: four characters per token, at least one.
pub fn estimate_text_tokens(text: &str) -> u64 {
    (text.chars().count() as u64 / 4).max(1)
}
