//! Conversion entry points.
//!
//! [`convert_html`] runs the whole pipeline on an in-memory document; the
//! other functions resolve input, write output, or skip the model entirely
//! ([`inspect`]). Every entry point returns either a complete document or an
//! error: a failed chunk discards the fragments converted before it.

use crate::config::ConversionConfig;
use crate::error::Html2MdError;
use crate::output::{ChunkResult, ConversionOutput, ConversionStats, DocumentInfo};
use crate::pipeline::chunk::{self, Chunk};
use crate::pipeline::llm::{self, LlmModel, MarkdownModel, RuleSet};
use crate::pipeline::tokenizer::{TiktokenCodec, TokenCodec};
use crate::pipeline::{assemble, escape, input, metadata, postprocess};
use edgequake_llm::{LLMProvider, ProviderFactory};
use futures::stream::{self, StreamExt};
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

/// Convert an HTML file or URL to Markdown.
///
/// # Arguments
/// * `input` — Local file path or HTTP/HTTPS URL to an HTML document
/// * `config` — Conversion configuration
///
/// # Errors
/// Input errors from resolving `input`, then everything [`convert_html`]
/// can return.
pub async fn convert(
    input_str: impl AsRef<str>,
    config: &ConversionConfig,
) -> Result<ConversionOutput, Html2MdError> {
    let input_str = input_str.as_ref();
    info!("Starting conversion: {}", input_str);
    let html = input::resolve_input(input_str, config.download_timeout_secs).await?;
    convert_html(&html, config).await
}

/// Convert an in-memory HTML document to Markdown.
///
/// This is the pipeline proper:
///
/// ```text
/// html ─▶ escape ─▶ metadata ─▶ chunk ─▶ llm (per chunk) ─▶ postprocess ─▶ assemble
/// ```
///
/// # Errors
/// * [`Html2MdError::InvalidConfig`] — budget/overlap/concurrency invalid
/// * [`Html2MdError::ProviderNotConfigured`] — no model could be resolved
/// * [`Html2MdError::Parse`] / [`Html2MdError::EmptyDocument`] — nothing to convert
/// * [`Html2MdError::Conversion`] — a model call failed; no output is produced
pub async fn convert_html(
    html: &str,
    config: &ConversionConfig,
) -> Result<ConversionOutput, Html2MdError> {
    let total_start = Instant::now();
    config.validate()?;

    // ── Step 1: Resolve model (fail before doing any work) ───────────────
    let model = resolve_model(config)?;
    let rules = RuleSet::from_config(config);

    // ── Step 2: Normalise escapes + extract metadata ─────────────────────
    let normalized = escape::normalize(html);
    let (metadata, body_html) = metadata::extract(&normalized)?;
    info!(
        "Extracted {} metadata entries; body is {} bytes",
        metadata.len(),
        body_html.len()
    );

    // ── Step 3: Split into token windows ─────────────────────────────────
    let codec = resolve_tokenizer(config).await?;
    let chunks = chunk::split(&body_html, codec.as_ref(), config.token_budget, config.overlap)?;
    let total_tokens = chunks.last().map(|c| c.end).unwrap_or(0);
    info!(
        "{} tokens ({}) → {} chunk(s), budget {}, overlap {}",
        total_tokens,
        codec.name(),
        chunks.len(),
        config.token_budget,
        config.overlap
    );

    // ── Step 4: Convert chunks through the model ─────────────────────────
    if let Some(ref cb) = config.progress_callback {
        cb.on_conversion_start(chunks.len());
    }
    let llm_start = Instant::now();
    let (mut results, failure) = if config.maintain_format || config.concurrency <= 1 {
        process_sequential(model.as_ref(), &chunks, &rules, config).await
    } else {
        process_concurrent(model.as_ref(), &chunks, &rules, config).await
    };
    let llm_duration_ms = llm_start.elapsed().as_millis() as u64;
    if let Some(ref cb) = config.progress_callback {
        cb.on_conversion_complete(chunks.len(), results.len());
    }
    if let Some(err) = failure {
        return Err(err);
    }

    // ── Step 5: Post-process + assemble ──────────────────────────────────
    for result in &mut results {
        result.markdown = postprocess::clean_markdown(&result.markdown);
    }
    let fragments: Vec<String> = results.iter().map(|r| r.markdown.clone()).collect();
    let front = if config.include_metadata {
        metadata.clone()
    } else {
        Default::default()
    };
    let markdown = assemble::assemble(&front, &fragments, config.overlap)?;

    let stats = ConversionStats {
        total_tokens,
        chunk_count: chunks.len(),
        token_budget: config.token_budget,
        overlap: config.overlap,
        total_input_tokens: results.iter().map(|r| r.input_tokens as u64).sum(),
        total_output_tokens: results.iter().map(|r| r.output_tokens as u64).sum(),
        total_duration_ms: total_start.elapsed().as_millis() as u64,
        llm_duration_ms,
    };

    info!(
        "Conversion complete: {} chunk(s), {} bytes of Markdown, {}ms total",
        stats.chunk_count,
        markdown.len(),
        stats.total_duration_ms
    );

    Ok(ConversionOutput {
        markdown,
        metadata,
        chunks: results,
        stats,
    })
}

/// Convert an HTML document and write the Markdown directly to a file.
///
/// Uses atomic write (temp file + rename) to prevent partial files.
pub async fn convert_to_file(
    input_str: impl AsRef<str>,
    output_path: impl AsRef<Path>,
    config: &ConversionConfig,
) -> Result<ConversionStats, Html2MdError> {
    let output = convert(input_str, config).await?;
    let path = output_path.as_ref();
    let write_err = |source| Html2MdError::OutputWriteFailed {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await.map_err(write_err)?;
    }

    let tmp_path = path.with_extension("md.tmp");
    tokio::fs::write(&tmp_path, &output.markdown)
        .await
        .map_err(write_err)?;
    tokio::fs::rename(&tmp_path, path).await.map_err(write_err)?;

    Ok(output.stats)
}

/// Synchronous wrapper around [`convert`].
///
/// Creates a temporary tokio runtime internally.
pub fn convert_sync(
    input_str: impl AsRef<str>,
    config: &ConversionConfig,
) -> Result<ConversionOutput, Html2MdError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| Html2MdError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(convert(input_str, config))
}

/// Report how a document would be split, without calling a model.
///
/// Does not require an LLM provider or API key.
pub async fn inspect(
    input_str: impl AsRef<str>,
    config: &ConversionConfig,
) -> Result<DocumentInfo, Html2MdError> {
    let html = input::resolve_input(input_str.as_ref(), config.download_timeout_secs).await?;
    inspect_html(&html, config).await
}

/// [`inspect`] for an in-memory document.
pub async fn inspect_html(
    html: &str,
    config: &ConversionConfig,
) -> Result<DocumentInfo, Html2MdError> {
    config.validate()?;
    let normalized = escape::normalize(html);
    let (metadata, body_html) = metadata::extract(&normalized)?;
    let codec = resolve_tokenizer(config).await?;
    let total_tokens = codec.count(&body_html);
    let chunks = chunk::plan(total_tokens, config.token_budget, config.overlap)?;

    Ok(DocumentInfo {
        metadata,
        body_bytes: body_html.len(),
        total_tokens,
        encoding: codec.name().to_string(),
        token_budget: config.token_budget,
        overlap: config.overlap,
        chunks,
    })
}

// ── Internal helpers ─────────────────────────────────────────────────────

/// Use the configured tokenizer, or load the BPE table for `config.encoding`.
///
/// Loading a BPE table takes a noticeable amount of CPU, so it runs on the
/// blocking pool.
async fn resolve_tokenizer(config: &ConversionConfig) -> Result<Arc<dyn TokenCodec>, Html2MdError> {
    if let Some(ref codec) = config.tokenizer {
        return Ok(Arc::clone(codec));
    }
    let encoding = config.encoding;
    let codec = tokio::task::spawn_blocking(move || TiktokenCodec::new(encoding))
        .await
        .map_err(|e| Html2MdError::Internal(format!("tokenizer task failed: {e}")))??;
    Ok(Arc::new(codec))
}

/// Resolve the conversion backend.
///
/// An explicit [`MarkdownModel`] wins; otherwise an LLM provider is resolved
/// and wrapped in [`LlmModel`].
fn resolve_model(config: &ConversionConfig) -> Result<Arc<dyn MarkdownModel>, Html2MdError> {
    if let Some(ref backend) = config.backend {
        return Ok(Arc::clone(backend));
    }
    let provider = resolve_provider(config)?;
    let model = LlmModel::new(provider);
    debug!("Using model {}", model.name());
    Ok(Arc::new(model))
}

fn create_provider(provider_name: &str, model: &str) -> Result<Arc<dyn LLMProvider>, Html2MdError> {
    ProviderFactory::create_llm_provider(provider_name, model).map_err(|e| {
        Html2MdError::ProviderNotConfigured {
            provider: provider_name.to_string(),
            hint: format!("{e}"),
        }
    })
}

/// Resolve the LLM provider, from most-specific to least-specific.
///
/// 1. **Pre-built provider** (`config.provider`)
/// 2. **Named provider + model** (`config.provider_name`), API key read from
///    the provider's usual environment variable
/// 3. **Environment pair** (`EDGEQUAKE_LLM_PROVIDER` + `EDGEQUAKE_MODEL`)
/// 4. **OpenAI** when `OPENAI_API_KEY` is set
/// 5. **Full auto-detection** (`ProviderFactory::from_env`)
fn resolve_provider(config: &ConversionConfig) -> Result<Arc<dyn LLMProvider>, Html2MdError> {
    if let Some(ref provider) = config.provider {
        return Ok(Arc::clone(provider));
    }

    let model = config.model.as_deref().unwrap_or("gpt-4.1-nano");

    if let Some(ref name) = config.provider_name {
        return create_provider(name, model);
    }

    if let (Ok(prov), Ok(env_model)) = (
        std::env::var("EDGEQUAKE_LLM_PROVIDER"),
        std::env::var("EDGEQUAKE_MODEL"),
    ) {
        if !prov.is_empty() && !env_model.is_empty() {
            return create_provider(&prov, &env_model);
        }
    }

    if std::env::var("OPENAI_API_KEY").is_ok_and(|k| !k.is_empty()) {
        return create_provider("openai", model);
    }

    let (llm_provider, _embedding) =
        ProviderFactory::from_env().map_err(|e| Html2MdError::ProviderNotConfigured {
            provider: "auto".to_string(),
            hint: format!(
                "No LLM provider could be auto-detected from environment.\n\
                Set OPENAI_API_KEY, ANTHROPIC_API_KEY, or configure a provider.\n\
                Error: {}",
                e
            ),
        })?;

    Ok(llm_provider)
}

fn report(config: &ConversionConfig, chunk_num: usize, total: usize, result: &Result<ChunkResult, Html2MdError>) {
    if let Some(ref cb) = config.progress_callback {
        match result {
            Ok(r) => cb.on_chunk_complete(chunk_num, total, r.markdown.len()),
            Err(e) => cb.on_chunk_error(chunk_num, total, &e.to_string()),
        }
    }
}

/// Convert chunks one at a time, in order.
///
/// With `maintain_format`, each chunk sees the previous chunk's Markdown.
/// Stops at the first failure, returning what converted so far alongside it.
async fn process_sequential(
    model: &dyn MarkdownModel,
    chunks: &[Chunk],
    rules: &RuleSet,
    config: &ConversionConfig,
) -> (Vec<ChunkResult>, Option<Html2MdError>) {
    let total = chunks.len();
    let mut results: Vec<ChunkResult> = Vec::with_capacity(total);

    for chunk in chunks {
        let chunk_num = chunk.index + 1;
        if let Some(ref cb) = config.progress_callback {
            cb.on_chunk_start(chunk_num, total);
        }
        let prior = if config.maintain_format {
            results.last().map(|r| r.markdown.as_str())
        } else {
            None
        };
        let result =
            llm::convert_chunk(model, chunk, total, prior, rules, config.api_timeout_secs).await;
        report(config, chunk_num, total, &result);

        match result {
            Ok(r) => results.push(r),
            Err(e) => return (results, Some(e)),
        }
    }

    (results, None)
}

/// Convert up to `config.concurrency` chunks at once.
///
/// `buffered` (not `buffer_unordered`) yields results in chunk order, so the
/// fragments need no re-sorting. In-flight calls are dropped at the first
/// failure.
async fn process_concurrent(
    model: &dyn MarkdownModel,
    chunks: &[Chunk],
    rules: &RuleSet,
    config: &ConversionConfig,
) -> (Vec<ChunkResult>, Option<Html2MdError>) {
    let total = chunks.len();
    let mut ordered = stream::iter(chunks.iter().map(|chunk| async move {
        let chunk_num = chunk.index + 1;
        if let Some(ref cb) = config.progress_callback {
            cb.on_chunk_start(chunk_num, total);
        }
        let result =
            llm::convert_chunk(model, chunk, total, None, rules, config.api_timeout_secs).await;
        report(config, chunk_num, total, &result);
        result
    }))
    .buffered(config.concurrency);

    let mut results = Vec::with_capacity(total);
    while let Some(result) = ordered.next().await {
        match result {
            Ok(r) => results.push(r),
            Err(e) => return (results, Some(e)),
        }
    }
    (results, None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ModelError;
    use crate::pipeline::chunk::tests::CharCodec;
    use crate::pipeline::llm::{ChunkRequest, ModelReply};
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Replies `[chunk N]` or fails on the configured chunk index.
    struct ScriptedModel {
        fail_on: Option<usize>,
        calls: Mutex<Vec<usize>>,
        priors: Mutex<Vec<Option<String>>>,
    }

    impl ScriptedModel {
        fn new(fail_on: Option<usize>) -> Arc<Self> {
            Arc::new(Self {
                fail_on,
                calls: Mutex::new(Vec::new()),
                priors: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl MarkdownModel for ScriptedModel {
        fn name(&self) -> &str {
            "scripted"
        }

        async fn convert(
            &self,
            request: &ChunkRequest<'_>,
            _rules: &RuleSet,
        ) -> Result<ModelReply, ModelError> {
            self.calls.lock().unwrap().push(request.index);
            self.priors
                .lock()
                .unwrap()
                .push(request.prior_markdown.map(str::to_string));
            if self.fail_on == Some(request.index) {
                return Err(ModelError::Api("network failure".into()));
            }
            Ok(ModelReply {
                markdown: format!("[chunk {}]", request.index),
                input_tokens: 3,
                output_tokens: 2,
            })
        }
    }

    fn config_with(model: Arc<ScriptedModel>, budget: usize, overlap: usize) -> ConversionConfig {
        ConversionConfig::builder()
            .backend(model)
            .tokenizer(Arc::new(CharCodec))
            .token_budget(budget)
            .overlap(overlap)
            .build()
            .unwrap()
    }

    fn long_html(body_chars: usize) -> String {
        let body: String = "x".repeat(body_chars);
        format!("<html><head><title>Long</title></head><body>{body}</body></html>")
    }

    #[tokio::test]
    async fn single_chunk_document() {
        let model = ScriptedModel::new(None);
        let config = config_with(model.clone(), 1000, 10);
        let html = r#"<html><head><title>T</title><meta name="x" content="y"></head><body><p>Hi</p></body></html>"#;
        let out = convert_html(html, &config).await.unwrap();
        assert_eq!(out.markdown, "---\ntitle: T\nx: y\n---\n\n[chunk 0]\n");
        assert_eq!(out.stats.chunk_count, 1);
        assert_eq!(out.stats.total_tokens, "<p>Hi</p>".len());
        assert_eq!(*model.calls.lock().unwrap(), vec![0]);
    }

    #[tokio::test]
    async fn chunks_are_assembled_in_order() {
        let model = ScriptedModel::new(None);
        let config = config_with(model.clone(), 40, 10);
        let out = convert_html(&long_html(100), &config).await.unwrap();
        // 100 tokens, stride 30: [0,40) [30,70) [60,100)
        assert_eq!(out.chunks.len(), 3);
        assert!(out.markdown.ends_with("[chunk 0]\n\n[chunk 1]\n\n[chunk 2]\n"));
        assert_eq!(out.stats.total_input_tokens, 9);
        assert_eq!(out.stats.total_output_tokens, 6);
    }

    #[tokio::test]
    async fn failure_discards_all_fragments() {
        let model = ScriptedModel::new(Some(1));
        let config = config_with(model.clone(), 40, 10);
        let err = convert_html(&long_html(100), &config).await.unwrap_err();
        match err {
            Html2MdError::Conversion { chunk, total, .. } => assert_eq!((chunk, total), (2, 3)),
            other => panic!("unexpected error: {other:?}"),
        }
        // Chunk 3 is never attempted.
        assert_eq!(*model.calls.lock().unwrap(), vec![0, 1]);
    }

    #[tokio::test]
    async fn maintain_format_passes_prior_markdown() {
        let model = ScriptedModel::new(None);
        let mut config = config_with(model.clone(), 40, 10);
        config.maintain_format = true;
        config.concurrency = 4;
        convert_html(&long_html(100), &config).await.unwrap();
        let priors = model.priors.lock().unwrap();
        assert_eq!(
            *priors,
            vec![None, Some("[chunk 0]".into()), Some("[chunk 1]".into())]
        );
    }

    #[tokio::test]
    async fn concurrent_mode_keeps_order() {
        let model = ScriptedModel::new(None);
        let mut config = config_with(model.clone(), 20, 5);
        config.concurrency = 4;
        let out = convert_html(&long_html(100), &config).await.unwrap();
        let indices: Vec<usize> = out.chunks.iter().map(|c| c.index).collect();
        let expected: Vec<usize> = (0..out.stats.chunk_count).collect();
        assert_eq!(indices, expected);
    }

    #[tokio::test]
    async fn metadata_can_be_left_out() {
        let model = ScriptedModel::new(None);
        let mut config = config_with(model, 1000, 10);
        config.include_metadata = false;
        let out = convert_html(&long_html(10), &config).await.unwrap();
        assert_eq!(out.markdown, "[chunk 0]\n");
        assert_eq!(out.metadata.get("title"), Some("Long"));
    }

    #[tokio::test]
    async fn invalid_overlap_fails_before_model_is_called() {
        let model = ScriptedModel::new(None);
        let mut config = config_with(model.clone(), 40, 10);
        config.overlap = 40;
        let err = convert_html(&long_html(100), &config).await.unwrap_err();
        assert!(matches!(err, Html2MdError::InvalidConfig(_)));
        assert!(model.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn plain_text_is_parse_error() {
        let model = ScriptedModel::new(None);
        let config = config_with(model, 40, 10);
        let err = convert_html("no markup here", &config).await.unwrap_err();
        assert!(matches!(err, Html2MdError::Parse { .. }));
    }

    #[tokio::test]
    async fn inspect_reports_plan_without_model() {
        let config = ConversionConfig::builder()
            .tokenizer(Arc::new(CharCodec))
            .token_budget(40)
            .overlap(10)
            .build()
            .unwrap();
        let info = inspect_html(&long_html(100), &config).await.unwrap();
        assert_eq!(info.total_tokens, 100);
        assert_eq!(info.chunks, vec![(0, 40), (30, 70), (60, 100)]);
        assert_eq!(info.encoding, "char");
        assert_eq!(info.metadata.get("title"), Some("Long"));
    }
}
