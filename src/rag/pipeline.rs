// End-to-end retrieval-augmented answer pipeline
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::config::Config;
use crate::errors::{RagError, Result};
use crate::generation::{AnswerGenerator, ChatCompleter};
use crate::rag::context::{ContextAssembler, DEFAULT_SYSTEM_PROMPT};
use crate::rag::retrieval::{ContextRetriever, ContextSource, QueryFilter, DEFAULT_TOP_K};
use crate::retry::RetryPolicy;
use crate::types::{CompletionResult, MessageHistory, Prompt};

/// What to do when retrieval fails after its retries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum RetrievalFailurePolicy {
    /// Propagate the retrieval error to the caller
    #[default]
    #[serde(rename = "abort")]
    Abort,
    /// Generate from the system and user messages alone
    #[serde(rename = "proceed")]
    ProceedWithoutContext,
}

/// Pipeline configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Chunks requested per prompt
    pub top_k: usize,
    /// Instructions placed ahead of the retrieved context
    pub system_prompt: String,
    pub on_retrieval_failure: RetrievalFailurePolicy,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            top_k: DEFAULT_TOP_K,
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            on_retrieval_failure: RetrievalFailurePolicy::Abort,
        }
    }
}

/// Per-call overrides
#[derive(Debug, Clone, Default)]
pub struct AnswerOptions {
    /// Restrict retrieval, e.g. to a single document
    pub filter: Option<QueryFilter>,
    /// Model identifier; `None` uses the generator's default
    pub model: Option<String>,
}

/// Retrieve context, then generate a grounded answer.
///
/// Retries happen only inside the retriever and generator; a failure that
/// reaches this level is returned as-is.
pub struct RagPipeline {
    retriever: Arc<dyn ContextSource>,
    generator: Arc<dyn ChatCompleter>,
    assembler: ContextAssembler,
    config: PipelineConfig,
}

impl RagPipeline {
    /// Create pipeline from its two collaborators
    pub fn new(
        retriever: Arc<dyn ContextSource>,
        generator: Arc<dyn ChatCompleter>,
        config: PipelineConfig,
    ) -> Self {
        let assembler = ContextAssembler::with_system_prompt(config.system_prompt.clone());
        Self {
            retriever,
            generator,
            assembler,
            config,
        }
    }

    /// Wire HTTP retriever and generator from application configuration
    pub fn from_config(config: &Config) -> Result<Self> {
        Self::from_config_with_cancellation(config, CancellationToken::new())
    }

    /// Same as [`RagPipeline::from_config`], with both network calls bound to `token`
    pub fn from_config_with_cancellation(config: &Config, token: CancellationToken) -> Result<Self> {
        let retry = RetryPolicy::new(config.retry.to_retry_config());

        let retriever = ContextRetriever::new(config.datastore.clone(), retry.clone())?
            .with_cancellation(token.clone());
        let generator = AnswerGenerator::new(config.chat.clone(), retry)?
            .with_cancellation(token);

        Ok(Self::new(
            Arc::new(retriever),
            Arc::new(generator),
            config.pipeline.clone(),
        ))
    }

    /// Answer `prompt`, continuing `prior` if given
    pub async fn answer(
        &self,
        prompt: &Prompt,
        prior: Option<MessageHistory>,
    ) -> Result<CompletionResult> {
        self.answer_with(prompt, prior, &AnswerOptions::default()).await
    }

    /// Answer with a retrieval filter and/or model override
    pub async fn answer_with(
        &self,
        prompt: &Prompt,
        prior: Option<MessageHistory>,
        options: &AnswerOptions,
    ) -> Result<CompletionResult> {
        let chunks = match self
            .retriever
            .retrieve(prompt, self.config.top_k, options.filter.as_ref())
            .await
        {
            Ok(chunks) => chunks,
            Err(RagError::Cancelled) => return Err(RagError::Cancelled),
            Err(e @ RagError::Config(_)) => return Err(e),
            Err(e) if self.config.on_retrieval_failure == RetrievalFailurePolicy::ProceedWithoutContext => {
                warn!(error = %e, "retrieval failed, answering without context");
                Vec::new()
            }
            Err(e) => return Err(e),
        };

        let history = self.assembler.assemble(prior, &chunks, prompt);
        info!(chunks = chunks.len(), messages = history.len(), "generating grounded answer");

        self.generator
            .generate(&history, options.model.as_deref())
            .await
    }
}
