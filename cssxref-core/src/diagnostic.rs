//! Diagnostics produced by the usage and unused-declaration scanners.
//!
//! Ranges are byte offsets into the validated document; mapping to editor
//! positions happens at the presentation boundary.

use serde::Serialize;

/// Value of the `source` field on every diagnostic.
pub const SOURCE: &str = "cssxref";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Warning,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DiagnosticTag {
    /// Rendered faded or struck through by editors.
    Unnecessary,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum DiagnosticKind {
    UndefinedClass,
    UndefinedId,
    UnusedSelector,
    /// Produced by an injected lint engine.
    Lint,
}

impl DiagnosticKind {
    /// Stable code shown by editors.
    pub fn code(self) -> &'static str {
        match self {
            Self::UndefinedClass => "undefined-class",
            Self::UndefinedId => "undefined-id",
            Self::UnusedSelector => "unused-selector",
            Self::Lint => "lint",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
    pub offset: usize,
    pub len: usize,
    pub message: String,
    pub severity: Severity,
    pub tags: Vec<DiagnosticTag>,
    pub kind: DiagnosticKind,
}

impl Diagnostic {
    pub fn warning(kind: DiagnosticKind, offset: usize, len: usize, message: impl Into<String>) -> Self {
        Self {
            offset,
            len,
            message: message.into(),
            severity: Severity::Warning,
            tags: Vec::new(),
            kind,
        }
    }

    pub fn unnecessary(mut self) -> Self {
        self.tags.push(DiagnosticTag::Unnecessary);
        self
    }

    pub fn is_unnecessary(&self) -> bool {
        self.tags.contains(&DiagnosticTag::Unnecessary)
    }

    pub fn end(&self) -> usize {
        self.offset + self.len
    }
}
