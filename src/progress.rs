//! Progress-callback trait for per-chunk conversion events.
//!
//! Inject an [`Arc<dyn ConversionProgressCallback>`] via
//! [`crate::config::ConversionConfigBuilder::progress_callback`] to receive
//! events as the pipeline converts each chunk. The library knows nothing
//! about how the host reports progress (terminal bar, channel, log line).
//!
//! # Example
//!
//! ```rust
//! use edgequake_html2md::{ConversionProgressCallback, ConversionConfig};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct CountingCallback {
//!     completed: Arc<AtomicUsize>,
//! }
//!
//! impl ConversionProgressCallback for CountingCallback {
//!     fn on_chunk_complete(&self, chunk_num: usize, total_chunks: usize, markdown_len: usize) {
//!         self.completed.fetch_add(1, Ordering::SeqCst);
//!         eprintln!("Chunk {}/{} done ({} bytes)", chunk_num, total_chunks, markdown_len);
//!     }
//! }
//!
//! let counter = Arc::new(CountingCallback {
//!     completed: Arc::new(AtomicUsize::new(0)),
//! });
//!
//! let config = ConversionConfig::builder()
//!     .progress_callback(counter as Arc<dyn ConversionProgressCallback>)
//!     .build()
//!     .unwrap();
//! ```

use std::sync::Arc;

/// Called by the conversion pipeline as it converts each chunk.
///
/// All methods have no-op defaults. Chunk numbers are 1-indexed. With
/// `concurrency > 1` the chunk events may arrive from several tasks at once.
pub trait ConversionProgressCallback: Send + Sync {
    /// Called once, after splitting and before the first model call.
    fn on_conversion_start(&self, total_chunks: usize) {
        let _ = total_chunks;
    }

    /// Called just before the model request for a chunk is sent.
    fn on_chunk_start(&self, chunk_num: usize, total_chunks: usize) {
        let _ = (chunk_num, total_chunks);
    }

    /// Called when a chunk converted successfully.
    ///
    /// `markdown_len` is the byte length of the produced Markdown.
    fn on_chunk_complete(&self, chunk_num: usize, total_chunks: usize, markdown_len: usize) {
        let _ = (chunk_num, total_chunks, markdown_len);
    }

    /// Called when a chunk failed. The document is abandoned afterwards.
    fn on_chunk_error(&self, chunk_num: usize, total_chunks: usize, error: &str) {
        let _ = (chunk_num, total_chunks, error);
    }

    /// Called once when the pipeline stops, successfully or not.
    ///
    /// `success_count` is the number of chunks that converted.
    fn on_conversion_complete(&self, total_chunks: usize, success_count: usize) {
        let _ = (total_chunks, success_count);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl ConversionProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::ConversionConfig`].
pub type ProgressCallback = Arc<dyn ConversionProgressCallback>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn noop_callback_does_not_panic() {
        let cb = NoopProgressCallback;
        cb.on_conversion_start(3);
        cb.on_chunk_start(1, 3);
        cb.on_chunk_complete(1, 3, 42);
        cb.on_chunk_error(2, 3, "some error");
        cb.on_conversion_complete(3, 1);
    }

    #[test]
    fn arc_dyn_callback_is_send_sync() {
        fn assert_send_sync<T: Send + Sync + ?Sized>() {}
        assert_send_sync::<dyn ConversionProgressCallback>();
        let cb: ProgressCallback = Arc::new(NoopProgressCallback);
        cb.on_chunk_start(1, 10);
    }
}
