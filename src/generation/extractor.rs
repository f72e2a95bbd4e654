//! Provider-specific completion parsing
//!
//! Keeps knowledge of a provider's response shape out of the generator so
//! another provider only needs a new [`CompletionExtractor`].

use serde_json::Value;

use crate::errors::{RagError, Result};

/// Pulls the answer text out of a raw chat-completion response
pub trait CompletionExtractor: Send + Sync {
    /// Raw (untrimmed) content of the completion the caller should use
    fn extract_completion(&self, raw: &Value) -> Result<String>;
}

/// OpenAI-compatible `choices[0].message.content`
#[derive(Debug, Clone, Copy, Default)]
pub struct OpenAiExtractor;

impl CompletionExtractor for OpenAiExtractor {
    fn extract_completion(&self, raw: &Value) -> Result<String> {
        let choices = raw
            .get("choices")
            .and_then(Value::as_array)
            .ok_or_else(|| RagError::MalformedResponse("response has no choices array".to_string()))?;

        let first = choices
            .first()
            .ok_or_else(|| RagError::Generation("provider returned zero choices".to_string()))?;

        let message = first
            .get("message")
            .ok_or_else(|| RagError::MalformedResponse("first choice has no message".to_string()))?;

        match message.get("content") {
            Some(Value::String(content)) => Ok(content.clone()),
            Some(Value::Null) | None => Err(RagError::Generation(
                "first choice has no content".to_string(),
            )),
            Some(other) => Err(RagError::MalformedResponse(format!(
                "message content is not a string: {}",
                other
            ))),
        }
    }
}
