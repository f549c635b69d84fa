//! Escape normalisation: repair stray backslash sequences in raw HTML.
//!
//! HTML scraped from JSON payloads or templating systems often carries
//! double-escaped control sequences — a literal backslash followed by `n`
//! rather than a newline. They are noise to the parser and to the model, so
//! they are removed before anything else looks at the document.

use once_cell::sync::Lazy;
use regex::Regex;

static RE_LITERAL_CONTROL: Lazy<Regex> = Lazy::new(|| Regex::new(r"\\[ntr]").unwrap());

/// Rewrite malformed escape sequences. Total: never fails.
///
/// * `\:` becomes `:`
/// * literal `\n`, `\t`, `\r` (backslash + letter) are dropped
///
/// Any other backslash sequence passes through unchanged.
pub fn normalize(raw: &str) -> String {
    let s = raw.replace("\\:", ":");
    RE_LITERAL_CONTROL.replace_all(&s, "").into_owned()
}
