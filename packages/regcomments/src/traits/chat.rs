//! Chat-model trait for LLM operations.

use async_trait::async_trait;

use crate::error::LlmResult;

/// A chat-style language-model service.
///
/// Implementations wrap a specific provider and handle transport; callers
/// own prompting and response parsing. The pipeline invokes this at three
/// points: structured extraction, issue grouping, and category
/// consolidation.
#[async_trait]
pub trait ChatModel: Send + Sync {
    /// Send a system + user message pair and return the raw response text.
    ///
    /// The response is free-form: callers expect an embedded JSON payload
    /// and must parse leniently.
    async fn chat(&self, system: &str, user: &str, temperature: f32) -> LlmResult<String>;
}
