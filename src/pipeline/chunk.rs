//! Chunk splitting: cut the body HTML into overlapping, token-bounded windows.
//!
//! ## Algorithm
//!
//! ```text
//! tokens  ├──────────────────────────────────────────────┤ N
//! chunk 0 ├──────── budget ────────┤
//! chunk 1                  ├──────── budget ────────┤
//! chunk 2                                   ├───────────┤
//!                          ◀overlap▶
//!         ◀──── stride ────▶
//! ```
//!
//! The body is encoded once; window `i` covers token offsets
//! `[i·stride, min(i·stride + budget, N))` with `stride = budget - overlap`,
//! and each window is decoded on its own. Decoded windows need not align with
//! HTML tag boundaries; the model copes with partial markup, and the overlap
//! gives it the tail of the previous window as context.

use crate::error::Html2MdError;
use crate::pipeline::tokenizer::TokenCodec;
use serde::Serialize;
use tracing::debug;

/// One token window of the body, decoded back to text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Chunk {
    /// 0-based position in the chunk sequence.
    pub index: usize,
    /// First token offset (inclusive).
    pub start: usize,
    /// Last token offset (exclusive).
    pub end: usize,
    /// Decoded text of `tokens[start..end]`.
    pub text: String,
}

impl Chunk {
    pub fn token_count(&self) -> usize {
        self.end - self.start
    }
}

/// Reject budgets that cannot make progress.
pub fn validate(token_budget: usize, overlap: usize) -> Result<(), Html2MdError> {
    if token_budget == 0 {
        return Err(Html2MdError::InvalidConfig(
            "token budget must be ≥ 1".into(),
        ));
    }
    if overlap >= token_budget {
        return Err(Html2MdError::InvalidConfig(format!(
            "overlap ({overlap}) must be smaller than the token budget ({token_budget})"
        )));
    }
    Ok(())
}

/// Compute the `(start, end)` token windows for a sequence of `n` tokens.
///
/// Does not look at any text, so callers can preview how a document would be
/// split (see [`crate::convert::inspect`]).
pub fn plan(
    n: usize,
    token_budget: usize,
    overlap: usize,
) -> Result<Vec<(usize, usize)>, Html2MdError> {
    validate(token_budget, overlap)?;

    if n <= token_budget {
        return Ok(vec![(0, n)]);
    }

    let stride = token_budget - overlap;
    let mut windows = Vec::with_capacity((n - overlap).div_ceil(stride));
    let mut start = 0;
    loop {
        let end = (start + token_budget).min(n);
        windows.push((start, end));
        if end == n {
            break;
        }
        start += stride;
    }
    Ok(windows)
}

/// Split `body_html` into overlapping chunks of at most `token_budget` tokens.
///
/// When the whole body fits, the single chunk's text is `body_html` itself,
/// untouched by the encode/decode round trip.
///
/// # Errors
/// * [`Html2MdError::InvalidConfig`] when `overlap >= token_budget` or the
///   budget is zero — checked before the input is looked at
/// * [`Html2MdError::Tokenizer`] when the codec meets a token id it does not
///   know; a window that cuts through a character still decodes
pub fn split(
    body_html: &str,
    codec: &dyn TokenCodec,
    token_budget: usize,
    overlap: usize,
) -> Result<Vec<Chunk>, Html2MdError> {
    validate(token_budget, overlap)?;

    let tokens = codec.encode(body_html);
    let n = tokens.len();

    if n <= token_budget {
        debug!("{} tokens fit in budget {}: single chunk", n, token_budget);
        return Ok(vec![Chunk {
            index: 0,
            start: 0,
            end: n,
            text: body_html.to_string(),
        }]);
    }

    let windows = plan(n, token_budget, overlap)?;
    debug!(
        "{} tokens → {} chunks (budget {}, overlap {})",
        n,
        windows.len(),
        token_budget,
        overlap
    );

    windows
        .into_iter()
        .enumerate()
        .map(|(index, (start, end))| {
            Ok(Chunk {
                index,
                start,
                end,
                text: codec.decode(&tokens[start..end])?,
            })
        })
        .collect()
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::pipeline::tokenizer::TiktokenCodec;
    use proptest::prelude::*;

    /// One token per `char`; keeps token arithmetic obvious in tests.
    pub(crate) struct CharCodec;

    impl TokenCodec for CharCodec {
        fn name(&self) -> &str {
            "char"
        }

        fn encode(&self, text: &str) -> Vec<u32> {
            text.chars().map(u32::from).collect()
        }

        fn decode(&self, tokens: &[u32]) -> Result<String, Html2MdError> {
            tokens
                .iter()
                .map(|&t| {
                    char::from_u32(t).ok_or_else(|| Html2MdError::Tokenizer {
                        detail: format!("invalid scalar {t}"),
                    })
                })
                .collect()
        }
    }

    fn text_of_len(n: usize) -> String {
        (0..n).map(|i| (b'a' + (i % 26) as u8) as char).collect()
    }

    #[test]
    fn small_input_is_one_verbatim_chunk() {
        let chunks = split("<p>Hi</p>", &CharCodec, 100, 10).unwrap();
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].text, "<p>Hi</p>");
        assert_eq!((chunks[0].start, chunks[0].end), (0, 9));
    }

    #[test]
    fn exactly_budget_is_one_chunk() {
        let chunks = split(&text_of_len(50), &CharCodec, 50, 5).unwrap();
        assert_eq!(chunks.len(), 1);
    }

    #[test]
    fn ten_thousand_tokens_budget_4000_overlap_500() {
        let windows = plan(10_000, 4000, 500).unwrap();
        assert_eq!(windows, vec![(0, 4000), (3500, 7500), (7000, 10_000)]);

        let chunks = split(&text_of_len(10_000), &CharCodec, 4000, 500).unwrap();
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[2].token_count(), 3000);
    }

    #[test]
    fn consecutive_chunks_share_overlap_text() {
        let text = text_of_len(25);
        let chunks = split(&text, &CharCodec, 10, 3).unwrap();
        for pair in chunks.windows(2) {
            let tail = &pair[0].text[pair[0].text.len() - 3..];
            assert!(pair[1].text.starts_with(tail));
        }
    }

    #[test]
    fn overlap_not_below_budget_is_config_error() {
        for (budget, overlap) in [(10, 10), (10, 11), (0, 0)] {
            let err = split("<p>x</p>", &CharCodec, budget, overlap).unwrap_err();
            assert!(matches!(err, Html2MdError::InvalidConfig(_)), "got {err:?}");
        }
    }

    #[test]
    fn zero_overlap_tiles_exactly() {
        assert_eq!(plan(9, 3, 0).unwrap(), vec![(0, 3), (3, 6), (6, 9)]);
    }

    #[test]
    fn empty_body_is_single_empty_chunk() {
        let chunks = split("", &CharCodec, 4, 1).unwrap();
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].token_count(), 0);
    }

    #[test]
    fn multilingual_html_splits_with_real_bpe() {
        let codec = TiktokenCodec::cl100k().unwrap();
        let html = "<p>日本語のテキスト、絵文字 🎉🦀 と café naïve 中文内容</p>".repeat(40);
        let total = codec.count(&html);
        for budget in 5..60 {
            let chunks = split(&html, &codec, budget, budget / 5)
                .unwrap_or_else(|e| panic!("budget {budget}: {e}"));
            assert!(chunks.len() > 1);
            assert_eq!(chunks.last().map(|c| c.end), Some(total));
            for chunk in &chunks {
                assert!(chunk.token_count() <= budget);
                assert!(!chunk.text.is_empty());
            }
        }
    }

    #[test]
    fn ascii_windows_reencode_to_their_slice_with_real_bpe() {
        let codec = TiktokenCodec::cl100k().unwrap();
        let text = " the cat sat on the mat.".repeat(30);
        let tokens = codec.encode(&text);
        let chunks = split(&text, &codec, 7, 2).unwrap();
        assert!(chunks.len() > 1);
        for chunk in chunks {
            assert_eq!(codec.encode(&chunk.text), tokens[chunk.start..chunk.end].to_vec());
        }
    }

    proptest! {
        #[test]
        fn chunk_count_matches_formula(
            n in 1usize..3000,
            budget in 1usize..400,
            overlap_frac in 0.0f64..1.0,
        ) {
            let overlap = ((budget as f64) * overlap_frac) as usize;
            prop_assume!(overlap < budget);
            let windows = plan(n, budget, overlap).unwrap();
            if n <= budget {
                prop_assert_eq!(windows.len(), 1);
            } else {
                let stride = budget - overlap;
                prop_assert_eq!(windows.len(), (n - overlap).div_ceil(stride));
            }
            for &(s, e) in &windows {
                prop_assert!(e - s <= budget);
                prop_assert!(e > s);
            }
        }

        #[test]
        fn removing_overlaps_reconstructs_tokens(
            n in 1usize..2000,
            budget in 2usize..200,
            overlap_frac in 0.0f64..1.0,
        ) {
            let overlap = ((budget as f64) * overlap_frac) as usize;
            prop_assume!(overlap < budget);
            let text = text_of_len(n);
            let original = CharCodec.encode(&text);
            let chunks = split(&text, &CharCodec, budget, overlap).unwrap();

            let mut rebuilt: Vec<u32> = Vec::with_capacity(n);
            for (i, chunk) in chunks.iter().enumerate() {
                let toks = CharCodec.encode(&chunk.text);
                let skip = if i == 0 { 0 } else { overlap };
                prop_assert_eq!(chunk.start + skip, rebuilt.len());
                rebuilt.extend_from_slice(&toks[skip..]);
            }
            prop_assert_eq!(rebuilt, original);
        }

        #[test]
        fn decode_then_encode_matches_slice(
            n in 1usize..1500,
            budget in 2usize..300,
        ) {
            let overlap = budget / 4;
            let text = text_of_len(n);
            let original = CharCodec.encode(&text);
            for chunk in split(&text, &CharCodec, budget, overlap).unwrap() {
                prop_assert_eq!(
                    CharCodec.encode(&chunk.text),
                    original[chunk.start..chunk.end].to_vec()
                );
            }
        }
    }
}
