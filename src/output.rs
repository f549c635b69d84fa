//! Result types returned by the conversion entry points.

use crate::pipeline::metadata::Metadata;
use serde::Serialize;

/// Markdown produced for one chunk, paired with the chunk it came from.
#[derive(Debug, Clone, Serialize)]
pub struct ChunkResult {
    /// 0-based chunk index; fragments are always kept in this order.
    pub index: usize,
    /// First token offset of the source window (inclusive).
    pub start_token: usize,
    /// Last token offset of the source window (exclusive).
    pub end_token: usize,
    /// Post-processed Markdown for this chunk.
    pub markdown: String,
    /// Prompt tokens reported by the provider (0 when unknown).
    pub input_tokens: usize,
    /// Completion tokens reported by the provider (0 when unknown).
    pub output_tokens: usize,
    /// Wall-clock time of the model call.
    pub duration_ms: u64,
}

/// Aggregate numbers for one document.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ConversionStats {
    /// Tokens in the body HTML, measured with the configured tokenizer.
    pub total_tokens: usize,
    pub chunk_count: usize,
    pub token_budget: usize,
    pub overlap: usize,
    pub total_input_tokens: u64,
    pub total_output_tokens: u64,
    pub total_duration_ms: u64,
    pub llm_duration_ms: u64,
}

/// A fully converted document.
#[derive(Debug, Clone, Serialize)]
pub struct ConversionOutput {
    /// Front matter (when enabled) followed by the assembled Markdown body.
    pub markdown: String,
    pub metadata: Metadata,
    pub chunks: Vec<ChunkResult>,
    pub stats: ConversionStats,
}

/// What [`crate::convert::inspect`] reports: the split, without converting.
#[derive(Debug, Clone, Serialize)]
pub struct DocumentInfo {
    pub metadata: Metadata,
    /// Byte length of the body HTML after the head was removed.
    pub body_bytes: usize,
    pub total_tokens: usize,
    /// Name of the tokenizer encoding used for counting.
    pub encoding: String,
    pub token_budget: usize,
    pub overlap: usize,
    /// `(start, end)` token windows, one per chunk.
    pub chunks: Vec<(usize, usize)>,
}
