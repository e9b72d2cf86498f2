//! Validation requests: one document in, sorted diagnostics out.
//!
//! ```rust,ignore
//! use cssxref_core::prelude::*;
//!
//! let cache = shared(StyleCache::new(300, DEFAULT_TTL)?);
//! let validator = Validator::from_config(Arc::new(config), cache)?
//!     .with_lint_engine(Box::new(MyLinter));
//!
//! let diags = validator.validate(&doc, Some(root), &CancelToken::new()).await;
//! ```

use std::path::Path;
use std::sync::Arc;

use globset::GlobSet;
use tracing::debug;

use crate::aggregator::{known_selectors, StyleAggregator};
use crate::cache::SharedStyleCache;
use crate::cancel::CancelToken;
use crate::config::XrefConfig;
use crate::diagnostic::Diagnostic;
use crate::document::{Document, DocumentKind};
use crate::error::XrefResult;
use crate::scan::is_excluded;
use crate::unused::{find_unused, local_used_names};
use crate::usage::{scan_usages, UsageOptions};

/// Optional structural linter whose findings are merged into the result.
pub trait LintEngine: Send + Sync {
    fn lint(&self, doc: &Document) -> Vec<Diagnostic>;
}

/// Runs the full pipeline for a document.
pub struct Validator {
    aggregator: StyleAggregator,
    exclude: GlobSet,
    lint: Option<Box<dyn LintEngine>>,
}

impl Validator {
    pub fn new(aggregator: StyleAggregator) -> XrefResult<Self> {
        let exclude = aggregator.config().exclude_set()?;
        Ok(Self {
            aggregator,
            exclude,
            lint: None,
        })
    }

    pub fn from_config(config: Arc<XrefConfig>, cache: SharedStyleCache) -> XrefResult<Self> {
        Self::new(StyleAggregator::from_config(config, cache)?)
    }

    /// Adds a lint engine.
    pub fn with_lint_engine(mut self, engine: Box<dyn LintEngine>) -> Self {
        self.lint = Some(engine);
        self
    }

    pub fn config(&self) -> &XrefConfig {
        self.aggregator.config()
    }

    pub fn aggregator(&self) -> &StyleAggregator {
        &self.aggregator
    }

    pub fn cache(&self) -> &SharedStyleCache {
        self.aggregator.cache()
    }

    /// Documents without a path are always analyzable; files must carry an
    /// allow-listed extension and escape the exclude globs.
    pub fn is_analyzable(&self, doc: &Document, workspace_root: Option<&Path>) -> bool {
        let Some(path) = doc.path.as_deref() else {
            return true;
        };
        if self.config().kind_for_path(path).is_none() {
            return false;
        }
        let root = workspace_root.unwrap_or(Path::new(""));
        !is_excluded(path, root, &self.exclude)
    }

    /// Diagnostics for `doc`, sorted by offset. Cancelled requests yield an
    /// empty list.
    pub async fn validate(&self, doc: &Document, workspace_root: Option<&Path>, cancel: &CancelToken) -> Vec<Diagnostic> {
        if !self.is_analyzable(doc, workspace_root) {
            debug!(key = %doc.key, "document not analyzable");
            return Vec::new();
        }

        let config = self.config();
        let mut diagnostics = match doc.kind {
            DocumentKind::Style => {
                let own = self.aggregator.local_selectors(doc);
                if config.check_unused {
                    let (classes, ids) = local_used_names(&doc.text);
                    find_unused(&own, &classes, &ids)
                } else {
                    Vec::new()
                }
            }
            DocumentKind::Markup | DocumentKind::Script => {
                let map = self.aggregator.collect_all(doc, workspace_root, cancel).await;
                if cancel.is_cancelled() {
                    return Vec::new();
                }

                let known = known_selectors(&map);
                let usage = scan_usages(&doc.text, &known, &UsageOptions::from(config));
                let mut out = usage.diagnostics;
                if doc.kind == DocumentKind::Markup && config.check_unused {
                    if let Some(own) = map.get(&doc.key) {
                        out.extend(find_unused(own, &usage.used_classes, &usage.used_ids));
                    }
                }
                out
            }
        };

        if let Some(engine) = &self.lint {
            diagnostics.extend(engine.lint(doc));
        }
        if cancel.is_cancelled() {
            return Vec::new();
        }

        diagnostics.sort_by_key(|d| (d.offset, d.len));
        debug!(key = %doc.key, count = diagnostics.len(), "document validated");
        diagnostics
    }
}
