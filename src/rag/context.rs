// Message history assembly for grounded answers
use crate::rag::retrieval::ContextChunk;
use crate::types::{Message, MessageHistory, Prompt};

/// Instructions sent ahead of the retrieved context
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a helpful assistant. Answer the user's question \
using the context passages provided in the system messages that follow. If the context does not \
contain the answer, say that you do not know instead of guessing.";

/// Builds the conversation sent to the chat service
#[derive(Debug, Clone)]
pub struct ContextAssembler {
    system_prompt: String,
}

impl ContextAssembler {
    /// Create new assembler with the default instructions
    pub fn new() -> Self {
        Self::with_system_prompt(DEFAULT_SYSTEM_PROMPT)
    }

    /// Create with custom instructions
    pub fn with_system_prompt(system_prompt: impl Into<String>) -> Self {
        Self {
            system_prompt: system_prompt.into(),
        }
    }

    /// Extend `prior` (or a fresh history) with the instructions, one
    /// message per chunk in retrieval order, then the prompt.
    pub fn assemble(
        &self,
        prior: Option<MessageHistory>,
        chunks: &[ContextChunk],
        prompt: &Prompt,
    ) -> MessageHistory {
        let mut history = prior.unwrap_or_default();

        history.push(Message::system(self.system_prompt.as_str()));
        history.extend(
            chunks
                .iter()
                .enumerate()
                .map(|(idx, chunk)| Message::system(self.format_chunk(idx + 1, chunk))),
        );
        history.push(Message::user(prompt.as_str()));

        history
    }

    /// Format a single chunk
    fn format_chunk(&self, index: usize, chunk: &ContextChunk) -> String {
        match chunk.source() {
            Some(source) => format!("[Context {}] (source: {})\n{}", index, source, chunk.text),
            None => format!("[Context {}]\n{}", index, chunk.text),
        }
    }
}

impl Default for ContextAssembler {
    fn default() -> Self {
        Self::new()
    }
}
