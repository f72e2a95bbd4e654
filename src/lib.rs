//! ragrelay - retrieval-augmented chat completion
//!
//! Fetches ranked context for a prompt from a document retrieval service,
//! then asks a hosted chat-completion API for an answer grounded in it.
//!
//! # Architecture
//!
//! - **retry**: randomized exponential backoff around any fallible call
//! - **rag::retrieval**: document store client producing ordered chunks
//! - **generation**: chat completion client with a pluggable response adapter
//! - **rag::pipeline**: retrieve, assemble history, generate

pub mod errors;
pub mod types;
pub mod retry;
pub mod config;

// Re-export commonly used types
pub use errors::{RagError, Result};

pub mod rag;
pub mod generation;

pub mod cli;
pub mod logging;

pub use config::Config;
pub use rag::RagPipeline;
pub use retry::{RetryConfig, RetryPolicy};
