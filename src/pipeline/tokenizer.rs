//! Tokenizer adapter: the unit against which chunk budgets are measured.
//!
//! The splitter only needs `encode` and `decode`, so any tokenizer can sit
//! behind [`TokenCodec`]. The default is OpenAI's `cl100k_base` BPE via
//! `tiktoken-rs`, whose tables are compiled into the binary (no download).

use crate::error::Html2MdError;
use serde::{Deserialize, Serialize};
use std::fmt;
use tiktoken_rs::CoreBPE;

/// Encode text to token ids and back.
///
/// Implementations must be pure: the same text always yields the same ids.
pub trait TokenCodec: Send + Sync {
    /// Human-readable encoding name, e.g. `"cl100k_base"`.
    fn name(&self) -> &str;

    /// Encode `text` into an ordered sequence of token ids.
    fn encode(&self, text: &str) -> Vec<u32>;

    /// Decode a window of token ids back into text.
    fn decode(&self, tokens: &[u32]) -> Result<String, Html2MdError>;

    /// Number of tokens in `text`.
    fn count(&self, text: &str) -> usize {
        self.encode(text).len()
    }
}

/// Which BPE table the default tokenizer loads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TokenEncoding {
    /// GPT-3.5 / GPT-4 encoding (default).
    #[default]
    Cl100k,
    /// GPT-4o / GPT-4.1 encoding.
    O200k,
}

impl TokenEncoding {
    pub fn as_str(&self) -> &'static str {
        match self {
            TokenEncoding::Cl100k => "cl100k_base",
            TokenEncoding::O200k => "o200k_base",
        }
    }
}

/// [`TokenCodec`] backed by a tiktoken BPE table.
pub struct TiktokenCodec {
    bpe: CoreBPE,
    encoding: TokenEncoding,
}

impl TiktokenCodec {
    /// Load the BPE table for `encoding`.
    pub fn new(encoding: TokenEncoding) -> Result<Self, Html2MdError> {
        let bpe = match encoding {
            TokenEncoding::Cl100k => tiktoken_rs::cl100k_base(),
            TokenEncoding::O200k => tiktoken_rs::o200k_base(),
        }
        .map_err(|e| Html2MdError::Tokenizer {
            detail: format!("failed to load {}: {e}", encoding.as_str()),
        })?;
        Ok(Self { bpe, encoding })
    }

    pub fn cl100k() -> Result<Self, Html2MdError> {
        Self::new(TokenEncoding::Cl100k)
    }
}

impl fmt::Debug for TiktokenCodec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TiktokenCodec")
            .field("encoding", &self.encoding)
            .finish()
    }
}

impl TokenCodec for TiktokenCodec {
    fn name(&self) -> &str {
        self.encoding.as_str()
    }

    // Special-token text such as `<|endoftext|>` inside a page is ordinary
    // content, never a control token.
    fn encode(&self, text: &str) -> Vec<u32> {
        self.bpe
            .encode_ordinary(text)
            .into_iter()
            .map(|t| t as u32)
            .collect()
    }

    // A window edge can fall inside a multi-byte character; the broken bytes
    // become U+FFFD instead of failing the document. Only unknown ids error.
    fn decode(&self, tokens: &[u32]) -> Result<String, Html2MdError> {
        let bytes = self
            .bpe
            .decode_bytes(tokens)
            .map_err(|e| Html2MdError::Tokenizer {
                detail: format!("cannot decode {} tokens: {e:?}", tokens.len()),
            })?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encoding_names() {
        assert_eq!(TokenEncoding::Cl100k.as_str(), "cl100k_base");
        assert_eq!(TokenEncoding::O200k.as_str(), "o200k_base");
        assert_eq!(TokenEncoding::default(), TokenEncoding::Cl100k);
    }

    #[test]
    fn cl100k_round_trip() {
        let codec = TiktokenCodec::cl100k().unwrap();
        let text = "<p>Hello, world! This is a <b>test</b>.</p>";
        let tokens = codec.encode(text);
        assert!(!tokens.is_empty());
        assert!(tokens.len() < text.len());
        assert_eq!(codec.decode(&tokens).unwrap(), text);
    }

    #[test]
    fn special_token_text_is_ordinary() {
        let codec = TiktokenCodec::cl100k().unwrap();
        let text = "before <|endoftext|> after";
        assert_eq!(codec.decode(&codec.encode(text)).unwrap(), text);
    }

    #[test]
    fn count_matches_encode() {
        let codec = TiktokenCodec::cl100k().unwrap();
        let text = "<ul><li>one</li><li>two</li></ul>";
        assert_eq!(codec.count(text), codec.encode(text).len());
        assert_eq!(codec.count(""), 0);
    }

    #[test]
    fn split_multibyte_character_decodes_lossily() {
        let codec = TiktokenCodec::cl100k().unwrap();
        let text = "絵文字 🎉🦀 中文";
        let tokens = codec.encode(text);
        // Single-token prefixes cut through at least one multi-byte character.
        for end in 1..tokens.len() {
            let decoded = codec.decode(&tokens[..end]).unwrap();
            assert!(text.starts_with(decoded.trim_end_matches('\u{FFFD}')));
        }
        assert_eq!(codec.decode(&tokens).unwrap(), text);
    }

    #[test]
    fn unknown_token_id_is_an_error() {
        let codec = TiktokenCodec::cl100k().unwrap();
        let err = codec.decode(&[u32::MAX]).unwrap_err();
        assert!(matches!(err, Html2MdError::Tokenizer { .. }));
    }

    #[test]
    fn debug_does_not_dump_tables() {
        let codec = TiktokenCodec::cl100k().unwrap();
        assert_eq!(format!("{codec:?}"), "TiktokenCodec { encoding: Cl100k }");
    }
}
