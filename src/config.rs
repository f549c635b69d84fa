//! Configuration types for HTML-to-Markdown conversion.
//!
//! All conversion behaviour is controlled through [`ConversionConfig`], built
//! via its [`ConversionConfigBuilder`]. Constraints between fields (the
//! overlap must be smaller than the token budget) are checked once, in
//! [`ConversionConfigBuilder::build`], before any document is touched.

use crate::error::Html2MdError;
use crate::pipeline::chunk;
use crate::pipeline::llm::MarkdownModel;
use crate::pipeline::tokenizer::{TokenCodec, TokenEncoding};
use crate::progress::ProgressCallback;
use edgequake_llm::LLMProvider;
use std::fmt;
use std::sync::Arc;

/// Configuration for an HTML-to-Markdown conversion.
///
/// Built via [`ConversionConfig::builder()`] or using
/// [`ConversionConfig::default()`].
///
/// # Example
/// ```rust
/// use edgequake_html2md::ConversionConfig;
///
/// let config = ConversionConfig::builder()
///     .token_budget(2000)
///     .overlap(200)
///     .model("gpt-4.1-nano")
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct ConversionConfig {
    /// Maximum tokens per chunk sent to the model. Default: 4000.
    ///
    /// Counted on the HTML, not the Markdown. The chunk plus the system
    /// prompt must fit the model's context window; 4000 leaves ample room on
    /// every current chat model.
    pub token_budget: usize,

    /// Tokens repeated at the start of the next chunk. Default: 100.
    ///
    /// Must be smaller than `token_budget`. The overlap shows the model the
    /// tail of the previous window so a list or table cut at a boundary is
    /// continued rather than restarted.
    pub overlap: usize,

    /// Which BPE table the default tokenizer uses. Default: `cl100k_base`.
    pub encoding: TokenEncoding,

    /// Pre-constructed tokenizer. Takes precedence over `encoding`.
    pub tokenizer: Option<Arc<dyn TokenCodec>>,

    /// LLM model identifier, e.g. "gpt-4.1-nano", "claude-sonnet-4-20250514".
    /// If None, uses `gpt-4.1-nano`.
    pub model: Option<String>,

    /// LLM provider name (e.g. "openai", "anthropic", "ollama").
    /// If None along with `provider`, the provider is auto-detected.
    pub provider_name: Option<String>,

    /// Pre-constructed LLM provider. Takes precedence over `provider_name`.
    pub provider: Option<Arc<dyn LLMProvider>>,

    /// Pre-constructed conversion backend. Takes precedence over everything
    /// else; useful for tests or non-chat backends.
    pub backend: Option<Arc<dyn MarkdownModel>>,

    /// Sampling temperature for the LLM completion. Default: 0.3.
    pub temperature: f32,

    /// Maximum tokens the LLM may generate per chunk. Default: 4096.
    ///
    /// Markdown is shorter than the HTML it came from, so a 4000-token chunk
    /// rarely needs more than half of this.
    pub max_tokens: usize,

    /// Custom system prompt. If None, uses [`crate::prompts::DEFAULT_SYSTEM_PROMPT`].
    pub system_prompt: Option<String>,

    /// Pass the previous chunk's Markdown to the model as context. Default: false.
    ///
    /// Helps heading levels and list numbering carry across chunks, at the
    /// cost of forcing sequential processing.
    pub maintain_format: bool,

    /// Number of chunks converted at once. Default: 1 (sequential).
    ///
    /// Fragments are always assembled in chunk order whatever the value.
    /// Ignored when `maintain_format` is on.
    pub concurrency: usize,

    /// Prepend YAML front matter with the extracted metadata. Default: true.
    pub include_metadata: bool,

    /// Download timeout for URL inputs in seconds. Default: 120.
    pub download_timeout_secs: u64,

    /// Per-chunk model call timeout in seconds; 0 disables it. Default: 60.
    pub api_timeout_secs: u64,

    /// Optional per-chunk progress events.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for ConversionConfig {
    fn default() -> Self {
        Self {
            token_budget: 4000,
            overlap: 100,
            encoding: TokenEncoding::default(),
            tokenizer: None,
            model: None,
            provider_name: None,
            provider: None,
            backend: None,
            temperature: 0.3,
            max_tokens: 4096,
            system_prompt: None,
            maintain_format: false,
            concurrency: 1,
            include_metadata: true,
            download_timeout_secs: 120,
            api_timeout_secs: 60,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for ConversionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConversionConfig")
            .field("token_budget", &self.token_budget)
            .field("overlap", &self.overlap)
            .field("encoding", &self.encoding)
            .field("tokenizer", &self.tokenizer.as_ref().map(|t| t.name().to_string()))
            .field("model", &self.model)
            .field("provider_name", &self.provider_name)
            .field("provider", &self.provider.as_ref().map(|_| "<dyn LLMProvider>"))
            .field("backend", &self.backend.as_ref().map(|b| b.name().to_string()))
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("maintain_format", &self.maintain_format)
            .field("concurrency", &self.concurrency)
            .field("include_metadata", &self.include_metadata)
            .field("api_timeout_secs", &self.api_timeout_secs)
            .finish()
    }
}

impl ConversionConfig {
    /// Create a new builder for `ConversionConfig`.
    pub fn builder() -> ConversionConfigBuilder {
        ConversionConfigBuilder {
            config: Self::default(),
        }
    }

    /// Check the constraints the builder enforces.
    ///
    /// Public because the fields are public: a config mutated after `build()`
    /// is validated again before conversion starts.
    pub fn validate(&self) -> Result<(), Html2MdError> {
        chunk::validate(self.token_budget, self.overlap)?;
        if self.concurrency == 0 {
            return Err(Html2MdError::InvalidConfig(
                "Concurrency must be ≥ 1".into(),
            ));
        }
        if self.max_tokens == 0 {
            return Err(Html2MdError::InvalidConfig(
                "max_tokens must be ≥ 1".into(),
            ));
        }
        Ok(())
    }
}

/// Builder for [`ConversionConfig`].
#[derive(Debug)]
pub struct ConversionConfigBuilder {
    config: ConversionConfig,
}

impl ConversionConfigBuilder {
    pub fn token_budget(mut self, n: usize) -> Self {
        self.config.token_budget = n;
        self
    }

    pub fn overlap(mut self, n: usize) -> Self {
        self.config.overlap = n;
        self
    }

    pub fn encoding(mut self, encoding: TokenEncoding) -> Self {
        self.config.encoding = encoding;
        self
    }

    pub fn tokenizer(mut self, tokenizer: Arc<dyn TokenCodec>) -> Self {
        self.config.tokenizer = Some(tokenizer);
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = Some(model.into());
        self
    }

    pub fn provider_name(mut self, name: impl Into<String>) -> Self {
        self.config.provider_name = Some(name.into());
        self
    }

    pub fn provider(mut self, provider: Arc<dyn LLMProvider>) -> Self {
        self.config.provider = Some(provider);
        self
    }

    pub fn backend(mut self, backend: Arc<dyn MarkdownModel>) -> Self {
        self.config.backend = Some(backend);
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn max_tokens(mut self, n: usize) -> Self {
        self.config.max_tokens = n;
        self
    }

    pub fn system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.config.system_prompt = Some(prompt.into());
        self
    }

    pub fn maintain_format(mut self, v: bool) -> Self {
        self.config.maintain_format = v;
        self
    }

    pub fn concurrency(mut self, n: usize) -> Self {
        self.config.concurrency = n.max(1);
        self
    }

    pub fn include_metadata(mut self, v: bool) -> Self {
        self.config.include_metadata = v;
        self
    }

    pub fn download_timeout_secs(mut self, secs: u64) -> Self {
        self.config.download_timeout_secs = secs;
        self
    }

    pub fn api_timeout_secs(mut self, secs: u64) -> Self {
        self.config.api_timeout_secs = secs;
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ConversionConfig, Html2MdError> {
        self.config.validate()?;
        Ok(self.config)
    }
}
