//! Type definitions module
//!
//! Core types for chat messages and completions.

pub mod messages;

// Re-export commonly used types
pub use messages::{CompletionResult, Message, MessageHistory, Prompt, Role};
