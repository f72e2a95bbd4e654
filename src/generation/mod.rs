//! Chat completion module
//!
//! Provides the completion client and the provider response adapter.

pub mod client;
pub mod extractor;

// Re-export commonly used types
pub use client::{AnswerGenerator, ChatCompleter, DEFAULT_API_BASE, DEFAULT_MODEL, QUALITY_MODEL};
pub use extractor::{CompletionExtractor, OpenAiExtractor};
