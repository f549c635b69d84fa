//! Pipeline stages for HTML-to-Markdown conversion.
//!
//! Each submodule implements exactly one transformation step, so each is
//! testable on its own and the model or tokenizer can be swapped without
//! touching the others.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ escape ──▶ metadata ──▶ chunk ──▶ llm ──▶ postprocess ──▶ assemble
//! (path/URL) (fix \n)  (head/body)  (tokens)  (model)  (cleanup)     (front matter)
//! ```
//!
//! 1. [`input`]       — read the local file or download the URL
//! 2. [`escape`]      — remove stray backslash escapes before parsing
//! 3. [`metadata`]    — title + `<meta>` pairs, and the body without the head
//! 4. [`chunk`]       — overlapping token windows via [`tokenizer`]
//! 5. [`llm`]         — one model call per chunk; the only stage with network I/O
//! 6. [`postprocess`] — deterministic fixes for model quirks
//! 7. [`assemble`]    — YAML front matter + fragments in chunk order

pub mod assemble;
pub mod chunk;
pub mod escape;
pub mod input;
pub mod llm;
pub mod metadata;
pub mod postprocess;
pub mod tokenizer;
