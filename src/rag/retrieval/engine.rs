//! Retrieval client for the document store's `/query` endpoint
//!
//! Sends the prompt as a single query with bearer authentication and
//! flattens the store's answer into an ordered list of [`ContextChunk`]s.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::config::DatastoreConfig;
use crate::errors::{RagError, Result};
use crate::retry::RetryPolicy;
use crate::types::Prompt;

/// Default number of chunks requested per query
pub const DEFAULT_TOP_K: usize = 3;

/// Metadata constraints narrowing a query. Absent fields are omitted from JSON.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryFilter {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub document_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_date: Option<String>,
}

impl QueryFilter {
    /// Restrict a query to one document
    pub fn document(document_id: impl Into<String>) -> Self {
        Self {
            document_id: Some(document_id.into()),
            ..Default::default()
        }
    }
}

/// Metadata attached to a stored chunk
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkMetadata {
    pub source: Option<String>,
    pub source_id: Option<String>,
    pub url: Option<String>,
    pub created_at: Option<String>,
    pub author: Option<String>,
    pub document_id: Option<String>,
}

/// Retrieved text with its relevance score (higher is more relevant)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextChunk {
    pub id: Option<String>,
    pub text: String,
    pub score: f32,
    pub metadata: ChunkMetadata,
}

impl ContextChunk {
    pub fn new(text: impl Into<String>, score: f32) -> Self {
        Self {
            id: None,
            text: text.into(),
            score,
            metadata: ChunkMetadata::default(),
        }
    }

    /// Most specific identifier of where the chunk came from, if any
    pub fn source(&self) -> Option<&str> {
        let meta = &self.metadata;
        meta.url
            .as_deref()
            .or(meta.source_id.as_deref())
            .or(meta.document_id.as_deref())
            .or(meta.source.as_deref())
    }
}

/// Request body for `POST /query`
#[derive(Debug, Clone, Serialize)]
pub struct QueryRequest {
    pub queries: Vec<Query>,
}

/// A single query inside a [`QueryRequest`]
#[derive(Debug, Clone, Serialize)]
pub struct Query {
    pub query: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filter: Option<QueryFilter>,
    pub top_k: usize,
}

#[derive(Debug, Deserialize)]
struct QueryResponse {
    results: Vec<QueryResult>,
}

#[derive(Debug, Deserialize)]
struct QueryResult {
    results: Vec<ChunkPayload>,
}

#[derive(Debug, Deserialize)]
struct ChunkPayload {
    #[serde(default)]
    id: Option<String>,
    text: String,
    score: f32,
    #[serde(default)]
    metadata: Option<ChunkMetadata>,
}

impl From<ChunkPayload> for ContextChunk {
    fn from(payload: ChunkPayload) -> Self {
        Self {
            id: payload.id,
            text: payload.text,
            score: payload.score,
            metadata: payload.metadata.unwrap_or_default(),
        }
    }
}

/// Anything that can supply ranked context for a prompt
#[async_trait]
pub trait ContextSource: Send + Sync {
    /// Chunks relevant to `prompt`, most relevant first, at most `top_k`
    async fn retrieve(
        &self,
        prompt: &Prompt,
        top_k: usize,
        filter: Option<&QueryFilter>,
    ) -> Result<Vec<ContextChunk>>;
}

/// HTTP client for the document store
pub struct ContextRetriever {
    client: Client,
    config: DatastoreConfig,
    retry: RetryPolicy,
    cancel: CancellationToken,
}

impl ContextRetriever {
    /// Create new retriever
    pub fn new(config: DatastoreConfig, retry: RetryPolicy) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| RagError::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            config,
            retry,
            cancel: CancellationToken::new(),
        })
    }

    /// Abort in-flight requests and pending retries when `token` fires
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Endpoint and token, or a configuration error naming what is missing
    fn credentials(&self) -> Result<(&str, &str)> {
        let url = self
            .config
            .query_url
            .as_deref()
            .filter(|u| !u.trim().is_empty())
            .ok_or_else(|| RagError::Config("datastore query URL is not set".to_string()))?;
        let token = self
            .config
            .bearer_token
            .as_deref()
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| RagError::Config("datastore bearer token is not set".to_string()))?;
        Ok((url, token))
    }

    /// Query the store once, without retry
    async fn query_once(&self, url: &str, token: &str, request: &QueryRequest) -> Result<Vec<ContextChunk>> {
        let response = self
            .client
            .post(url)
            .bearer_auth(token)
            .json(request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(RagError::from_status(status, body));
        }

        let body = response.text().await?;
        let top_k = request.queries.first().map_or(DEFAULT_TOP_K, |q| q.top_k);
        parse_query_response(&body, top_k)
    }
}

#[async_trait]
impl ContextSource for ContextRetriever {
    async fn retrieve(
        &self,
        prompt: &Prompt,
        top_k: usize,
        filter: Option<&QueryFilter>,
    ) -> Result<Vec<ContextChunk>> {
        if top_k == 0 {
            return Err(RagError::Config("top_k must be greater than 0".to_string()));
        }
        let (url, token) = self.credentials()?;

        let request = QueryRequest {
            queries: vec![Query {
                query: prompt.as_str().to_string(),
                filter: filter.cloned(),
                top_k,
            }],
        };

        debug!(url, top_k, filtered = filter.is_some(), "querying datastore");
        let chunks = self
            .retry
            .execute_cancellable(&self.cancel, || self.query_once(url, token, &request))
            .await?;

        info!(chunks = chunks.len(), "retrieved context");
        Ok(chunks)
    }
}

/// Flatten a single-query response into ordered chunks.
///
/// The store's descending score order is trusted but checked; a violation
/// means the response does not honour the contract.
fn parse_query_response(body: &str, top_k: usize) -> Result<Vec<ContextChunk>> {
    let response: QueryResponse = serde_json::from_str(body)
        .map_err(|e| RagError::MalformedResponse(format!("query response: {}", e)))?;

    let mut chunks: Vec<ContextChunk> = match response.results.into_iter().next() {
        Some(result) => result.results.into_iter().map(ContextChunk::from).collect(),
        None => Vec::new(),
    };

    if let Some(pos) = chunks.windows(2).position(|w| w[0].score < w[1].score) {
        return Err(RagError::MalformedResponse(format!(
            "chunks not ordered by descending score at index {}",
            pos + 1
        )));
    }

    chunks.truncate(top_k);
    Ok(chunks)
}
