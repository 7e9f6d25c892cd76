//! Text generation provider abstraction.

pub mod gemini;
pub mod sse;

use async_trait::async_trait;
use dastyar_shared::types::MessageRole;
use futures::stream::BoxStream;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("generation provider is not configured")]
    NotConfigured,

    #[error("request failed: {0}")]
    Transport(String),

    #[error("provider answered {status}: {body}")]
    Status { status: u16, body: String },

    #[error("malformed provider response: {0}")]
    Malformed(String),
}

/// Which configured model serves a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ModelTier {
    /// Full model: chat replies and weather captions.
    #[default]
    Chat,
    /// Lighter, faster model: search suggestions.
    Fast,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatMessage {
    pub role: MessageRole,
    pub content: String,
}

impl ChatMessage {
    pub fn new(role: MessageRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct GenerationRequest {
    pub tier: ModelTier,
    pub system: Option<String>,
    pub messages: Vec<ChatMessage>,
    pub temperature: Option<f32>,
    /// Let the model ground its answer with web search.
    pub grounded_search: bool,
    /// Ask for a JSON document instead of prose.
    pub json_output: bool,
}

/// Incremental text deltas of one reply.
pub type TextStream = BoxStream<'static, Result<String, LlmError>>;

#[async_trait]
pub trait ChatModel: Send + Sync {
    /// Start a reply and yield it as it is produced.
    async fn stream(&self, request: GenerationRequest) -> Result<TextStream, LlmError>;

    /// Produce a complete reply.
    async fn generate(&self, request: GenerationRequest) -> Result<String, LlmError>;
}

/// Strip a Markdown code fence (```` ```json ... ``` ````) that models like
/// to wrap JSON answers in.
pub fn strip_code_fence(text: &str) -> &str {
    let text = text.trim();
    let Some(inner) = text.strip_prefix("```") else {
        return text;
    };
    let inner = match inner.find('\n') {
        Some(newline) => &inner[newline + 1..],
        None => inner,
    };
    inner.strip_suffix("```").unwrap_or(inner).trim()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_code_fence() {
        assert_eq!(strip_code_fence("  [\"a\"]  "), "[\"a\"]");
        assert_eq!(strip_code_fence("```json\n[\"a\"]\n```"), "[\"a\"]");
        assert_eq!(strip_code_fence("```\n{}\n```\n"), "{}");
    }
}
