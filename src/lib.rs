//! # edgequake-html2md
//!
//! Convert HTML documents to Markdown using Large Language Models.
//!
//! The model does the conversion; this crate handles what a model cannot:
//! documents larger than its context window, and metadata that should end up
//! as front matter rather than body text.
//!
//! ## Pipeline Overview
//!
//! ```text
//! HTML
//!  │
//!  ├─ 1. Input     resolve local file or download from URL
//!  ├─ 2. Escape    drop stray `\n` / `\t` / `\:` sequences
//!  ├─ 3. Metadata  <title> + <meta name content> → front matter; body isolated
//!  ├─ 4. Chunk     token windows of `token_budget`, overlapping by `overlap`
//!  ├─ 5. LLM       one call per chunk (gpt-4.1-nano / claude / gemini / …)
//!  ├─ 6. Polish    deterministic post-processing (fences, tables, whitespace)
//!  └─ 7. Assemble  YAML front matter + fragments in chunk order
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use edgequake_html2md::{convert, ConversionConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Provider auto-detected from OPENAI_API_KEY / ANTHROPIC_API_KEY / GEMINI_API_KEY
//!     let config = ConversionConfig::builder()
//!         .token_budget(4000)
//!         .overlap(100)
//!         .build()?;
//!     let output = convert("page.html", &config).await?;
//!     println!("{}", output.markdown);
//!     eprintln!("{} chunks", output.stats.chunk_count);
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `html2md` binary (clap + anyhow + tracing-subscriber) |
//!
//! ## Chunk boundaries
//!
//! Overlap is applied to tokens *before* conversion. The converted fragments
//! are joined as-is, so text near a boundary can appear twice in the output.

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod convert;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod prompts;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{ConversionConfig, ConversionConfigBuilder};
pub use convert::{convert, convert_html, convert_sync, convert_to_file, inspect, inspect_html};
pub use error::{Html2MdError, ModelError};
pub use output::{ChunkResult, ConversionOutput, ConversionStats, DocumentInfo};
pub use pipeline::chunk::Chunk;
pub use pipeline::llm::{ChunkRequest, LlmModel, MarkdownModel, ModelReply, RuleSet};
pub use pipeline::metadata::Metadata;
pub use pipeline::tokenizer::{TiktokenCodec, TokenCodec, TokenEncoding};
pub use progress::{ConversionProgressCallback, NoopProgressCallback, ProgressCallback};
