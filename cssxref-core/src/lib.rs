//! cssxref-core: cross-references CSS selectors against markup and script.
//!
//! This library extracts class and id declarations from stylesheets, collects
//! them from every source visible to a document, and reports references that
//! resolve to nothing as well as declarations nothing references.
//!
//! # Features
//!
//! - **Selector tokenizer**: comment/string aware, escape aware, never fails
//! - **Style cache**: TTL plus frequency-then-recency eviction, freshness tokens
//! - **Aggregation**: embedded `<style>`, linked (local and remote) and
//!   workspace-wide stylesheets, with bounded concurrency
//! - **Usage scanning**: attributes, framework bindings, DOM API calls and
//!   injected markup
//! - **Unused detection**: per stylesheet and per markup document
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use cssxref_core::prelude::*;
//!
//! let cache = shared(StyleCache::new(DEFAULT_MAX_ENTRIES, DEFAULT_TTL)?);
//! let validator = Validator::from_config(Arc::new(XrefConfig::default()), cache)?;
//! let doc = Document::new("index.html", 1, html, DocumentKind::Markup);
//!
//! for diag in validator.validate(&doc, None, &CancelToken::new()).await {
//!     println!("{}: {}", diag.offset, diag.message);
//! }
//! ```
//!
//! # Module Organization
//!
//! - [`position`]: offset to line/column mapping
//! - [`tokenizer`]: selector extraction and the shared masking pass
//! - [`cache`]: the selector cache
//! - [`loader`]: filesystem and network collaborators
//! - [`aggregator`]: building the style map for a document
//! - [`usage`] / [`unused`]: the two diagnostic scanners
//! - [`validate`]: the request pipeline
//! - [`error`]: typed error handling
//!
//! # Cargo Features
//!
//! - `remote` (default): fetch linked stylesheets over HTTP(S) with `reqwest`

pub mod aggregator;
pub mod cache;
pub mod cancel;
pub mod config;
pub mod diagnostic;
pub mod document;
pub mod error;
pub mod loader;
pub mod logging;
pub mod markup;
pub mod position;
pub mod prelude;
pub mod report;
pub mod scan;
pub mod selector;
pub mod tokenizer;
pub mod unused;
pub mod usage;
pub mod validate;
pub mod workspace;

// ============================================================================
// Explicit Re-exports (avoiding glob imports for clear API surface)
// ============================================================================

// Error types
pub use error::{IoResultExt, XrefError, XrefResult};

// Positions and selectors
pub use position::{build_index, offset_to_line_col, LineCol, LineIndex};
pub use selector::{is_css_identifier, KnownSelectors, Selector, SelectorKind};

// Tokenizer
pub use tokenizer::{
    extract_rule_bodies, mask_non_code, parse_selectors, parse_selectors_at, rule_body_tokens,
    scan_selector_tokens, split_top_level_commas, Branch, SelectorToken,
};

// Cache types
pub use cache::{
    shared, CachedSelectors, Clock, ManualClock, SharedStyleCache, StyleCache, SystemClock,
    DEFAULT_MAX_ENTRIES, DEFAULT_TTL, REMOTE_FRESHNESS,
};

// Configuration
pub use config::{load_config, XrefConfig, CONFIG_FILE};

// Documents and diagnostics
pub use cancel::CancelToken;
pub use diagnostic::{Diagnostic, DiagnosticKind, DiagnosticTag, Severity};
pub use document::{Document, DocumentKind};

// Sources
#[cfg(feature = "remote")]
pub use loader::HttpFetcher;
pub use loader::{FileStat, FileSystem, LinkTarget, LoadLimits, OsFileSystem, RemoteFetcher, SourceLoader};
pub use markup::{extract_style_blocks, find_stylesheet_links, StyleBlock};

// Aggregation and scanning
pub use aggregator::{known_selectors, StyleAggregator, StyleMap};
pub use scan::{gather_documents, gather_style_files};
pub use unused::{find_unused, local_used_names};
pub use usage::{scan_usages, Candidate, UsageOptions, UsageResult, UsageSource};
pub use validate::{LintEngine, Validator};

// Logging
pub use logging::{init_structured_logging, log_error, log_info, log_warn};

// Reporting
pub use report::{entries_for, print_json, print_plain, ReportEntry};

// Workspace detection
pub use workspace::{find_workspace_root, is_workspace_root, workspace_root_for};
