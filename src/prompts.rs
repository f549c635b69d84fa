//! System prompts for LLM-based HTML-to-Markdown conversion.
//!
//! Every prompt lives here so the conversion rules can be changed in one
//! place and inspected by unit tests without calling a model.
//!
//! Callers can override the default via [`crate::config::ConversionConfig::system_prompt`];
//! the constants here are used only when no override is provided.

/// Default conversion rules sent as the system message for every chunk.
pub const DEFAULT_SYSTEM_PROMPT: &str = r####"You are a conversion engine that converts HTML to Markdown.

Follow these rules precisely:

1. STRUCTURE
   - For <h1> use "# ", for <h2> use "## ", for <h3> use "### ", and so on to <h6>
   - Convert paragraphs (<p>) to plain text separated by a blank line
   - Convert unordered lists (<ul>/<li>) to "- " items and ordered lists (<ol>/<li>) to "1. " items
   - Preserve list nesting with indentation
   - Use **bold** for <strong>/<b> and *italic* for <em>/<i>

2. LINKS, IMAGES, CODE, TABLES
   - Convert <a href> to [text](url) and <img> to ![alt](src)
   - Wrap <pre>/<code> blocks in triple backticks and inline <code> in single backticks
   - Convert tables to GFM pipe format

3. FRAGMENTS
   - The input may be one window of a larger document and may start or end in
     the middle of a tag. Convert what is there; do not invent the missing part
   - Drop tags that carry no content (scripts, styles, empty wrappers)

4. OUTPUT FORMAT
   - Output ONLY the Markdown content
   - Do NOT include any raw HTML tags
   - Do NOT output a YAML front matter block
   - Do NOT wrap the output in ```markdown fences
   - Do NOT add commentary or explanations"####;

/// Build the context message for `maintain_format` mode.
///
/// Sent as a separate system message holding the previous chunk's Markdown,
/// so headings, numbering and list depth carry across the chunk boundary.
pub fn continuation_context(prior_markdown: &str) -> String {
    format!(
        "You are continuing a conversion. The previous part of the document was converted to:\n\n\
\"\"\"{}\"\"\"\n\n\
Keep the same formatting conventions and continue any list or section that is still open. \
Do not repeat content that already appears above.",
        prior_markdown
    )
}

/// Build the user message for one chunk of HTML.
pub fn chunk_message(html_chunk: &str) -> String {
    format!(
        "Convert the following HTML to Markdown:\n\n{}\n\nMarkdown Output:",
        html_chunk
    )
}
