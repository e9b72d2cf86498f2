//! Prelude module for convenient imports.
//!
//! Import commonly used types with a single line:
//!
//! ```rust,ignore
//! use cssxref_core::prelude::*;
//! ```

pub use std::sync::Arc;

// Errors
pub use crate::error::{XrefError, XrefResult};

// Documents in, diagnostics out
pub use crate::cancel::CancelToken;
pub use crate::diagnostic::{Diagnostic, DiagnosticKind};
pub use crate::document::{Document, DocumentKind};
pub use crate::validate::{LintEngine, Validator};

// Cache
pub use crate::cache::{shared, SharedStyleCache, StyleCache, DEFAULT_MAX_ENTRIES, DEFAULT_TTL};

// Configuration
pub use crate::config::{load_config, XrefConfig};

// Selectors
pub use crate::selector::{Selector, SelectorKind};
pub use crate::tokenizer::parse_selectors;

// Workspace
pub use crate::workspace::{find_workspace_root, workspace_root_for};
