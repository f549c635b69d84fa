//! Error types for the edgequake-html2md library.
//!
//! Two error types reflect two levels of failure:
//!
//! * [`Html2MdError`] — **Fatal** for the whole document. Returned as
//!   `Err(Html2MdError)` from every top-level `convert*` function. There is no
//!   partial output: a document either converts completely or fails.
//!
//! * [`ModelError`] — what a single model call can report. It never escapes
//!   on its own; the pipeline wraps it in [`Html2MdError::Conversion`] together
//!   with the index of the chunk that failed.

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the edgequake-html2md library.
#[derive(Debug, Error)]
pub enum Html2MdError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("HTML file not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// The input string is not a valid file path or URL.
    #[error("Invalid input '{input}': not a file path or a valid HTTP/HTTPS URL")]
    InvalidInput { input: String },

    /// HTTP URL was syntactically valid but download failed.
    #[error("Failed to download '{url}': {reason}\nCheck your internet connection.")]
    DownloadFailed { url: String, reason: String },

    /// Download exceeded the configured timeout.
    #[error("Download timed out after {secs}s for '{url}'\nIncrease --download-timeout.")]
    DownloadTimeout { url: String, secs: u64 },

    // ── Document errors ───────────────────────────────────────────────────
    /// The input could not be parsed as HTML at all.
    #[error("Input is not parseable HTML: {detail}")]
    Parse { detail: String },

    /// The document parsed, but its body carries no text to convert.
    #[error("Document body is empty: nothing to convert")]
    EmptyDocument,

    /// The tokenizer could not be loaded or could not decode a token window.
    #[error("Tokenizer error: {detail}")]
    Tokenizer { detail: String },

    // ── LLM errors ────────────────────────────────────────────────────────
    /// The configured provider is not initialised (missing API key etc.).
    #[error("LLM provider '{provider}' is not configured.\n{hint}")]
    ProviderNotConfigured { provider: String, hint: String },

    /// The model call for one chunk failed; the whole document is abandoned.
    #[error("Conversion failed on chunk {chunk}/{total}: {source}")]
    Conversion {
        chunk: usize,
        total: usize,
        #[source]
        source: ModelError,
    },

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not create or write the output Markdown file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder or splitter validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Html2MdError {
    /// Short name of the pipeline stage that produced the error.
    ///
    /// Used by the CLI to tell the user *where* a document failed.
    pub fn stage(&self) -> &'static str {
        match self {
            Html2MdError::FileNotFound { .. }
            | Html2MdError::PermissionDenied { .. }
            | Html2MdError::InvalidInput { .. }
            | Html2MdError::DownloadFailed { .. }
            | Html2MdError::DownloadTimeout { .. } => "input",
            Html2MdError::Parse { .. } | Html2MdError::EmptyDocument => "parse",
            Html2MdError::Tokenizer { .. } => "tokenize",
            Html2MdError::InvalidConfig(_) => "config",
            Html2MdError::ProviderNotConfigured { .. } | Html2MdError::Conversion { .. } => {
                "convert"
            }
            Html2MdError::OutputWriteFailed { .. } => "output",
            Html2MdError::Internal(_) => "internal",
        }
    }
}

/// Failure of a single model call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ModelError {
    /// The provider returned an error (network, throttling, auth, …).
    #[error("LLM API error: {0}")]
    Api(String),

    /// The provider answered, but with no usable Markdown.
    #[error("model returned an empty response")]
    EmptyResponse,

    /// The call did not finish within `api_timeout_secs`.
    #[error("LLM call timed out after {secs}s")]
    Timeout { secs: u64 },
}
