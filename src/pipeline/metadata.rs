//! Metadata extraction: split a parsed HTML document into front-matter
//! metadata and the body markup that actually gets converted.
//!
//! The head is dropped from the body on purpose: if the model saw `<title>`
//! and `<meta>` again it would repeat them in the Markdown, duplicating the
//! front matter.

use crate::error::Html2MdError;
use scraper::{Html, Selector};
use serde::ser::{Serialize, SerializeMap, Serializer};
use tracing::debug;

/// Ordered string → string mapping of document metadata.
///
/// Insertion order is kept so front matter is deterministic; inserting a key
/// that already exists replaces its value in place.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Metadata {
    entries: Vec<(String, String)>,
}

impl Metadata {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace `key`.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some(slot) => slot.1 = value,
            None => self.entries.push((key, value)),
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Metadata {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut meta = Metadata::new();
        for (k, v) in iter {
            meta.insert(k, v);
        }
        meta
    }
}

impl Serialize for Metadata {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (k, v) in &self.entries {
            map.serialize_entry(k, v)?;
        }
        map.end()
    }
}

/// Parse `html`, returning its metadata and the inner HTML of `<body>`.
///
/// * `title` — trimmed `<title>` text, omitted when blank
/// * every `<meta name=… content=…>` contributes `name → content`; a meta tag
///   lacking either attribute is skipped
///
/// # Errors
/// * [`Html2MdError::Parse`] when the input contains no markup at all
/// * [`Html2MdError::EmptyDocument`] when the body has no visible text
pub fn extract(html: &str) -> Result<(Metadata, String), Html2MdError> {
    if !is_html(html) {
        return Err(Html2MdError::Parse {
            detail: "no HTML elements found in input".into(),
        });
    }

    let doc = Html::parse_document(html);
    let mut metadata = Metadata::new();

    if let Some(title) = doc.select(&selector("title")?).next() {
        let text = title.text().collect::<String>();
        let text = text.trim();
        if !text.is_empty() {
            metadata.insert("title", text);
        }
    }

    for meta in doc.select(&selector("meta")?) {
        let el = meta.value();
        if let (Some(name), Some(content)) = (el.attr("name"), el.attr("content")) {
            let name = name.trim();
            if !name.is_empty() {
                metadata.insert(name, content.trim());
            }
        }
    }

    let body = doc
        .select(&selector("body")?)
        .next()
        .ok_or(Html2MdError::EmptyDocument)?;

    if !body.text().any(|t| !t.trim().is_empty()) {
        return Err(Html2MdError::EmptyDocument);
    }

    let body_html = body.inner_html();
    debug!(
        "Extracted {} metadata entries, body is {} bytes",
        metadata.len(),
        body_html.len()
    );
    Ok((metadata, body_html))
}

/// `true` when `content` contains at least one markup element.
///
/// html5ever never rejects input; it wraps plain text in a synthetic
/// document. Parsing as a fragment and looking past the synthetic root tells
/// real markup apart from plain text.
pub fn is_html(content: &str) -> bool {
    let fragment = Html::parse_fragment(content);
    fragment
        .root_element()
        .descendants()
        .skip(1)
        .any(|node| node.value().is_element())
}

fn selector(css: &str) -> Result<Selector, Html2MdError> {
    Selector::parse(css).map_err(|e| Html2MdError::Internal(format!("selector '{css}': {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SIMPLE: &str = r#"<html><head><title>T</title><meta name="x" content="y"></head><body><p>Hi</p></body></html>"#;

    #[test]
    fn extracts_title_meta_and_body() {
        let (meta, body) = extract(SIMPLE).unwrap();
        assert_eq!(meta.get("title"), Some("T"));
        assert_eq!(meta.get("x"), Some("y"));
        assert_eq!(meta.len(), 2);
        assert_eq!(body, "<p>Hi</p>");
    }

    #[test]
    fn head_never_leaks_into_body() {
        let (_, body) = extract(SIMPLE).unwrap();
        assert!(!body.contains("<title>"));
        assert!(!body.contains("<meta"));
    }

    #[test]
    fn title_is_first_key() {
        let html = r#"<html><head><meta name="author" content="A"><title> Doc </title></head><body>text</body></html>"#;
        let (meta, _) = extract(html).unwrap();
        let keys: Vec<&str> = meta.iter().map(|(k, _)| k).collect();
        // <meta> precedes <title> in the source, but title is read first
        assert_eq!(keys, vec!["title", "author"]);
        assert_eq!(meta.get("title"), Some("Doc"));
    }

    #[test]
    fn meta_without_content_or_name_is_skipped() {
        let html = r#"<html><head>
            <meta name="keywords">
            <meta content="orphan">
            <meta charset="utf-8">
            <meta name="description" content="  d  ">
        </head><body><p>x</p></body></html>"#;
        let (meta, _) = extract(html).unwrap();
        assert_eq!(meta.get("keywords"), None);
        assert_eq!(meta.get("description"), Some("d"));
        assert_eq!(meta.len(), 1);
    }

    #[test]
    fn blank_title_is_omitted() {
        let html = "<html><head><title>   </title></head><body><p>x</p></body></html>";
        let (meta, _) = extract(html).unwrap();
        assert!(meta.is_empty());
    }

    #[test]
    fn plain_text_is_a_parse_error() {
        let err = extract("just some words").unwrap_err();
        assert!(matches!(err, Html2MdError::Parse { .. }), "got {err:?}");
        assert!(matches!(extract("").unwrap_err(), Html2MdError::Parse { .. }));
    }

    #[test]
    fn empty_body_is_rejected() {
        let err = extract("<html><head><title>T</title></head><body>  </body></html>").unwrap_err();
        assert!(matches!(err, Html2MdError::EmptyDocument), "got {err:?}");
    }

    #[test]
    fn fragment_without_html_wrapper_is_accepted() {
        let (meta, body) = extract("<h1>Title</h1><p>para</p>").unwrap();
        assert!(meta.is_empty());
        assert_eq!(body, "<h1>Title</h1><p>para</p>");
    }

    #[test]
    fn metadata_insert_replaces_in_place() {
        let mut meta: Metadata = [("a", "1"), ("b", "2")].into_iter().collect();
        meta.insert("a", "3");
        let pairs: Vec<_> = meta.iter().collect();
        assert_eq!(pairs, vec![("a", "3"), ("b", "2")]);
    }

    #[test]
    fn metadata_serialises_as_object() {
        let meta: Metadata = [("title", "T"), ("x", "y")].into_iter().collect();
        let json = serde_json::to_string(&meta).unwrap();
        assert_eq!(json, r#"{"title":"T","x":"y"}"#);
    }

    #[test]
    fn is_html_detects_markup() {
        assert!(is_html("<p>x</p>"));
        assert!(is_html("text <b>bold</b>"));
        assert!(!is_html("plain"));
        assert!(!is_html("   "));
    }
}
