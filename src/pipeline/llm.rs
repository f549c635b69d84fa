//! Chunk conversion: one model call turns one HTML chunk into Markdown.
//!
//! The pipeline talks to the model only through [`MarkdownModel`], so the
//! provider can be swapped (or scripted in tests) without touching chunking
//! or assembly. [`LlmModel`] is the production implementation on top of
//! `edgequake-llm`.
//!
//! ## Failure policy
//!
//! A failed call is not retried. The error is wrapped in
//! [`Html2MdError::Conversion`] and aborts the whole document; fragments that
//! were already converted are dropped by the caller.

use crate::config::ConversionConfig;
use crate::error::{Html2MdError, ModelError};
use crate::output::ChunkResult;
use crate::pipeline::chunk::Chunk;
use crate::prompts::{chunk_message, continuation_context, DEFAULT_SYSTEM_PROMPT};
use async_trait::async_trait;
use edgequake_llm::{ChatMessage, CompletionOptions, LLMProvider};
use std::sync::Arc;
use std::time::Instant;
use tokio::time::{timeout, Duration};
use tracing::{debug, warn};

/// Fixed instructions shared by every chunk of a document.
#[derive(Debug, Clone, PartialEq)]
pub struct RuleSet {
    /// System prompt holding the Markdown conversion rules.
    pub instructions: String,
    pub temperature: f32,
    /// Cap on generated tokens per chunk.
    pub max_tokens: usize,
}

impl RuleSet {
    pub fn from_config(config: &ConversionConfig) -> Self {
        Self {
            instructions: config
                .system_prompt
                .clone()
                .unwrap_or_else(|| DEFAULT_SYSTEM_PROMPT.to_string()),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
        }
    }
}

impl Default for RuleSet {
    fn default() -> Self {
        Self::from_config(&ConversionConfig::default())
    }
}

/// What the model is asked to convert.
#[derive(Debug, Clone, Copy)]
pub struct ChunkRequest<'a> {
    /// 0-based chunk index.
    pub index: usize,
    /// Number of chunks in the document.
    pub total: usize,
    /// HTML text of the chunk.
    pub html: &'a str,
    /// Markdown of the previous chunk, in `maintain_format` mode.
    pub prior_markdown: Option<&'a str>,
}

/// Markdown returned by a model, with the provider's token accounting.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModelReply {
    pub markdown: String,
    pub input_tokens: usize,
    pub output_tokens: usize,
}

impl ModelReply {
    pub fn new(markdown: impl Into<String>) -> Self {
        Self {
            markdown: markdown.into(),
            ..Self::default()
        }
    }
}

/// The external conversion step: `convert(html_chunk, rules) -> markdown`.
#[async_trait]
pub trait MarkdownModel: Send + Sync {
    /// Identifier used in logs, e.g. `"openai/gpt-4.1-nano"`.
    fn name(&self) -> &str;

    /// Convert one chunk. Exactly one outbound call per invocation.
    async fn convert(
        &self,
        request: &ChunkRequest<'_>,
        rules: &RuleSet,
    ) -> Result<ModelReply, ModelError>;
}

/// [`MarkdownModel`] backed by an `edgequake-llm` chat provider.
pub struct LlmModel {
    provider: Arc<dyn LLMProvider>,
    name: String,
}

impl LlmModel {
    pub fn new(provider: Arc<dyn LLMProvider>) -> Self {
        let name = format!("{}/{}", provider.name(), provider.model());
        Self { provider, name }
    }
}

/// Build the chat transcript for one chunk.
///
/// 1. **System message** — the conversion rules
/// 2. **Continuity message** *(only with prior Markdown)* — the previous
///    chunk's output as context
/// 3. **User message** — the HTML chunk itself
pub fn build_messages(request: &ChunkRequest<'_>, rules: &RuleSet) -> Vec<ChatMessage> {
    let mut messages = vec![ChatMessage::system(rules.instructions.as_str())];
    if let Some(prior) = request.prior_markdown.filter(|p| !p.is_empty()) {
        messages.push(ChatMessage::system(continuation_context(prior)));
    }
    messages.push(ChatMessage::user(chunk_message(request.html)));
    messages
}

fn build_options(rules: &RuleSet) -> CompletionOptions {
    CompletionOptions {
        temperature: Some(rules.temperature),
        max_tokens: Some(rules.max_tokens),
        ..Default::default()
    }
}

#[async_trait]
impl MarkdownModel for LlmModel {
    fn name(&self) -> &str {
        &self.name
    }

    async fn convert(
        &self,
        request: &ChunkRequest<'_>,
        rules: &RuleSet,
    ) -> Result<ModelReply, ModelError> {
        let messages = build_messages(request, rules);
        let options = build_options(rules);
        let response = self
            .provider
            .chat(&messages, Some(&options))
            .await
            .map_err(|e| ModelError::Api(e.to_string()))?;
        Ok(ModelReply {
            markdown: response.content,
            input_tokens: response.prompt_tokens,
            output_tokens: response.completion_tokens,
        })
    }
}

/// Convert one chunk through `model`, enforcing the per-call timeout.
///
/// `timeout_secs == 0` disables the timeout. A blank reply counts as a
/// malformed response.
pub async fn convert_chunk(
    model: &dyn MarkdownModel,
    chunk: &Chunk,
    total: usize,
    prior_markdown: Option<&str>,
    rules: &RuleSet,
    timeout_secs: u64,
) -> Result<ChunkResult, Html2MdError> {
    let start = Instant::now();
    let request = ChunkRequest {
        index: chunk.index,
        total,
        html: &chunk.text,
        prior_markdown,
    };

    let call = model.convert(&request, rules);
    let outcome = if timeout_secs == 0 {
        call.await
    } else {
        timeout(Duration::from_secs(timeout_secs), call)
            .await
            .unwrap_or(Err(ModelError::Timeout { secs: timeout_secs }))
    };

    let reply = outcome
        .and_then(|reply| {
            if reply.markdown.trim().is_empty() {
                Err(ModelError::EmptyResponse)
            } else {
                Ok(reply)
            }
        })
        .map_err(|source| {
            warn!(
                "Chunk {}/{}: {} failed — {}",
                chunk.index + 1,
                total,
                model.name(),
                source
            );
            Html2MdError::Conversion {
                chunk: chunk.index + 1,
                total,
                source,
            }
        })?;

    let duration = start.elapsed();
    debug!(
        "Chunk {}/{}: {} input tokens, {} output tokens, {:?}",
        chunk.index + 1,
        total,
        reply.input_tokens,
        reply.output_tokens,
        duration
    );

    Ok(ChunkResult {
        index: chunk.index,
        start_token: chunk.start,
        end_token: chunk.end,
        markdown: reply.markdown,
        input_tokens: reply.input_tokens,
        output_tokens: reply.output_tokens,
        duration_ms: duration.as_millis() as u64,
    })
}
