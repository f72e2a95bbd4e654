// Document store retrieval
pub mod engine;

pub use engine::{
    ChunkMetadata, ContextChunk, ContextRetriever, ContextSource, Query, QueryFilter,
    QueryRequest, DEFAULT_TOP_K,
};
