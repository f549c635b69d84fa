//! Assembly: front matter + converted fragments → one Markdown document.
//!
//! ## Known limitation: duplicated boundary content
//!
//! Chunks overlap at the *token* level before conversion, but what comes back
//! is free-form Markdown. There is no reliable way to map the overlapped
//! tokens onto the converted text, so fragments are joined as they are and
//! content near a chunk boundary may appear twice.

use crate::error::Html2MdError;
use crate::pipeline::metadata::Metadata;
use tracing::debug;

/// Join `fragments` in order under a YAML front-matter block.
///
/// * front matter is omitted entirely when `metadata` is empty
/// * fragments are trimmed and separated by exactly one blank line
/// * the result ends with a single newline
///
/// `overlap_tokens` is the overlap the fragments were produced with; it is
/// reported, not used to deduplicate.
pub fn assemble(
    metadata: &Metadata,
    fragments: &[String],
    overlap_tokens: usize,
) -> Result<String, Html2MdError> {
    let body = fragments
        .iter()
        .map(|f| f.trim())
        .filter(|f| !f.is_empty())
        .collect::<Vec<_>>()
        .join("\n\n");

    if fragments.len() > 1 && overlap_tokens > 0 {
        debug!(
            "Joined {} fragments; up to {} overlapped tokens per boundary may repeat",
            fragments.len(),
            overlap_tokens
        );
    }

    let mut out = format_front_matter(metadata)?;
    out.push_str(&body);
    out.push('\n');
    Ok(out)
}

/// Serialise metadata as a `---` delimited YAML block, or `""` when empty.
///
/// Keys keep their extraction order. Quoting is left to `serde_yaml`, so a
/// value such as `true` or `42` stays a string when read back.
pub fn format_front_matter(metadata: &Metadata) -> Result<String, Html2MdError> {
    if metadata.is_empty() {
        return Ok(String::new());
    }
    let yaml = serde_yaml::to_string(metadata)
        .map_err(|e| Html2MdError::Internal(format!("cannot serialise front matter: {e}")))?;
    let body = yaml.strip_prefix("---\n").unwrap_or(&yaml);
    Ok(format!("---\n{}\n---\n\n", body.trim_end()))
}
