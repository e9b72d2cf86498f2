//! Documents handed to the engine by the editor or the CLI.

use std::path::{Path, PathBuf};

use crate::position::LineIndex;

/// How a document's text is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DocumentKind {
    /// HTML-like markup: embedded `<style>` blocks, `<link>` tags, attributes.
    Markup,
    /// A stylesheet (CSS, SCSS, LESS).
    Style,
    /// Script source: DOM API calls, JSX attributes, injected markup.
    Script,
}

/// Document text plus the metadata the engine needs.
#[derive(Debug, Clone)]
pub struct Document {
    /// Cache and style-map key (an editor URI or a path string).
    pub key: String,
    /// Edit version; the freshness token for the document's own selectors.
    pub version: i64,
    pub text: String,
    /// Location on disk, used to resolve relative stylesheet links.
    pub path: Option<PathBuf>,
    pub kind: DocumentKind,
}

impl Document {
    pub fn new(key: impl Into<String>, version: i64, text: impl Into<String>, kind: DocumentKind) -> Self {
        Self {
            key: key.into(),
            version,
            text: text.into(),
            path: None,
            kind,
        }
    }

    pub fn with_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = Some(path.into());
        self
    }

    /// Directory containing the document, if it lives on disk.
    pub fn dir(&self) -> Option<&Path> {
        self.path.as_deref().and_then(Path::parent)
    }

    pub fn line_index(&self) -> LineIndex {
        LineIndex::new(&self.text)
    }
}
