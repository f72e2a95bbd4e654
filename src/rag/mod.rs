// Retrieval-Augmented Generation pipeline
//
// Fetches ranked context for a prompt from the document store, folds it
// into the conversation, and asks the chat service for a grounded answer.
//
// Components:
// - Retrieval: document store client producing ordered context chunks
// - Context Assembler: builds the message history sent for completion
// - Pipeline: end-to-end orchestration

pub mod retrieval;
pub mod context;
pub mod pipeline;

// Re-export key types
pub use retrieval::{ContextChunk, ContextRetriever, ContextSource, QueryFilter};
pub use context::ContextAssembler;
pub use pipeline::{AnswerOptions, PipelineConfig, RagPipeline, RetrievalFailurePolicy};
