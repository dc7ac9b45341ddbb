//! Document identity and content as seen by the tracker.
//!
//! The editor owns the real text buffers; the tracker only needs a stable
//! identity to key its cache and the raw text to hand to the scanner.

use std::fmt;
use url::Url;

/// Stable cache key for a document, the canonical string form of its URI.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DocumentKey(String);

impl DocumentKey {
    pub fn from_url(url: &Url) -> Self {
        DocumentKey(url.as_str().to_owned())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DocumentKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&Url> for DocumentKey {
    fn from(url: &Url) -> Self {
        DocumentKey::from_url(url)
    }
}

/// A text document the tracker can scan.
pub trait TrackedDocument: Send + Sync + 'static {
    /// Backing location of the document, if any.
    ///
    /// Documents without one (e.g. scratch buffers) are scanned but never cached.
    fn uri(&self) -> Option<&Url>;

    /// Current text of the document.
    fn text(&self) -> &str;

    /// Cache key derived from [`uri`](TrackedDocument::uri). Must not have side effects.
    fn key(&self) -> Option<DocumentKey> {
        self.uri().map(DocumentKey::from_url)
    }
}

/// An owned, immutable snapshot of a document's text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextSnapshot {
    uri: Option<Url>,
    text: String,
}

impl TextSnapshot {
    /// Snapshot of a document backed by `uri`.
    pub fn new(uri: Url, text: impl Into<String>) -> Self {
        Self {
            uri: Some(uri),
            text: text.into(),
        }
    }

    /// Snapshot of a document with no backing location.
    pub fn untitled(text: impl Into<String>) -> Self {
        Self {
            uri: None,
            text: text.into(),
        }
    }
}

impl TrackedDocument for TextSnapshot {
    fn uri(&self) -> Option<&Url> {
        self.uri.as_ref()
    }

    fn text(&self) -> &str {
        &self.text
    }
}
