//! Chat completion client
//!
//! Sends a full message history to an OpenAI-compatible
//! `POST {api_base}/chat/completions` endpoint and returns the trimmed
//! content of the first choice.

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::config::ChatConfig;
use crate::errors::{RagError, Result};
use crate::generation::extractor::{CompletionExtractor, OpenAiExtractor};
use crate::retry::RetryPolicy;
use crate::types::{CompletionResult, Message, MessageHistory};

/// Default chat API base URL
pub const DEFAULT_API_BASE: &str = "https://api.openai.com/v1";

/// Fast, cheap and versatile default model
pub const DEFAULT_MODEL: &str = "gpt-3.5-turbo";

/// Higher quality but slower model
pub const QUALITY_MODEL: &str = "gpt-4";

/// Anything that can turn a conversation into an answer
#[async_trait]
pub trait ChatCompleter: Send + Sync {
    /// Complete `history`; `None` selects the configured default model
    async fn generate(&self, history: &MessageHistory, model: Option<&str>) -> Result<CompletionResult>;
}

/// Chat completion request body
#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: &'a [Message],
}

/// HTTP client for the chat completion service
pub struct AnswerGenerator {
    client: Client,
    config: ChatConfig,
    retry: RetryPolicy,
    extractor: Arc<dyn CompletionExtractor>,
    cancel: CancellationToken,
}

impl AnswerGenerator {
    /// Create generator for an OpenAI-compatible provider
    pub fn new(config: ChatConfig, retry: RetryPolicy) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| RagError::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            config,
            retry,
            extractor: Arc::new(OpenAiExtractor),
            cancel: CancellationToken::new(),
        })
    }

    /// Use a different provider response adapter
    pub fn with_extractor(mut self, extractor: Arc<dyn CompletionExtractor>) -> Self {
        self.extractor = extractor;
        self
    }

    /// Abort in-flight requests and pending retries when `token` fires
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Get default model name
    pub fn default_model(&self) -> &str {
        &self.config.model
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.config.api_base.trim_end_matches('/'))
    }

    /// Request one completion, without retry
    async fn complete_once(&self, url: &str, api_key: &str, model: &str, history: &MessageHistory) -> Result<CompletionResult> {
        let request = ChatCompletionRequest {
            model,
            messages: history.as_slice(),
        };

        let response = self
            .client
            .post(url)
            .bearer_auth(api_key)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(RagError::from_status(status, body));
        }

        let body = response.text().await?;
        let raw: serde_json::Value = serde_json::from_str(&body)
            .map_err(|e| RagError::MalformedResponse(format!("completion response: {}", e)))?;

        let completion = self.extractor.extract_completion(&raw)?;
        let completion = completion.trim();
        if completion.is_empty() {
            return Err(RagError::Generation("completion is empty".to_string()));
        }

        Ok(CompletionResult::new(completion))
    }
}

#[async_trait]
impl ChatCompleter for AnswerGenerator {
    async fn generate(&self, history: &MessageHistory, model: Option<&str>) -> Result<CompletionResult> {
        let api_key = self
            .config
            .api_key
            .as_deref()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| RagError::Config("chat API key is not set".to_string()))?;
        let model = model.unwrap_or(self.config.model.as_str());
        let url = self.endpoint();

        debug!(model, messages = history.len(), "requesting chat completion");
        let completion = self
            .retry
            .execute_cancellable(&self.cancel, || {
                self.complete_once(&url, api_key, model, history)
            })
            .await?;

        info!(model, chars = completion.as_str().len(), "completion received");
        Ok(completion)
    }
}
