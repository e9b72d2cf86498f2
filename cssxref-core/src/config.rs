//! Configuration loading from cssxref.toml (or LSP initialization options).
//!
//! Every field has a default, so an empty file, a partial file and a missing
//! file are all valid.

use anyhow::{Context, Result};
use globset::{Glob, GlobSet, GlobSetBuilder};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use std::{collections::BTreeSet, fs};

use crate::document::DocumentKind;
use crate::error::{XrefError, XrefResult};

/// Name of the per-project configuration file.
pub const CONFIG_FILE: &str = "cssxref.toml";

/// Exclusions applied on top of the user's patterns.
const DEFAULT_EXCLUDES: &[&str] = &["**/node_modules/**", "**/.git/**", "**/target/**"];

/// Main configuration structure for cssxref.toml.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct XrefConfig {
    /// Glob patterns for files that are never analyzed or scanned.
    pub exclude: Vec<String>,
    pub style_extensions: Vec<String>,
    pub markup_extensions: Vec<String>,
    pub script_extensions: Vec<String>,

    /// Report class/id references with no matching declaration.
    pub check_undefined: bool,
    /// Report declarations with no matching reference.
    pub check_unused: bool,
    /// Fetch `<link>`ed stylesheets over HTTP(S).
    pub remote_stylesheets: bool,
    /// Collect selectors from every style file under the workspace root.
    pub workspace_scan: bool,
    /// Diagnose `id="..."` attributes whose id is declared nowhere.
    pub report_unknown_id_attributes: bool,

    pub cache_max_entries: usize,
    pub cache_ttl_secs: u64,
    pub max_workspace_files: usize,
    pub batch_size: usize,
    pub max_concurrency: usize,
    /// Files larger than this many bytes are skipped.
    pub max_file_size: u64,
    /// Content longer than this many characters is truncated before parsing.
    pub max_content_length: usize,
    pub remote_timeout_ms: u64,
    pub max_redirects: usize,
}

impl Default for XrefConfig {
    fn default() -> Self {
        let strings = |items: &[&str]| items.iter().map(|s| s.to_string()).collect();
        Self {
            exclude: Vec::new(),
            style_extensions: strings(&["css", "scss", "less"]),
            markup_extensions: strings(&["html", "htm", "vue", "svelte", "php", "erb", "hbs"]),
            script_extensions: strings(&["js", "jsx", "ts", "tsx", "mjs", "cjs"]),
            check_undefined: true,
            check_unused: true,
            remote_stylesheets: true,
            workspace_scan: true,
            report_unknown_id_attributes: false,
            cache_max_entries: crate::cache::DEFAULT_MAX_ENTRIES,
            cache_ttl_secs: crate::cache::DEFAULT_TTL.as_secs(),
            max_workspace_files: 500,
            batch_size: 10,
            max_concurrency: 5,
            max_file_size: 2 * 1024 * 1024,
            max_content_length: 1_000_000,
            remote_timeout_ms: 10_000,
            max_redirects: 5,
        }
    }
}

impl XrefConfig {
    /// Parses LSP `initializationOptions`; `null` yields the defaults.
    pub fn from_json(value: serde_json::Value) -> XrefResult<Self> {
        if value.is_null() {
            return Ok(Self::default());
        }
        serde_json::from_value(value)
            .map_err(|e| XrefError::config("initializationOptions", e.to_string()))
    }

    /// Classifies a file extension (case-insensitive).
    pub fn kind_for_extension(&self, ext: &str) -> Option<DocumentKind> {
        let ext = ext.to_ascii_lowercase();
        let has = |list: &[String]| list.iter().any(|e| e.eq_ignore_ascii_case(&ext));
        if has(&self.style_extensions) {
            Some(DocumentKind::Style)
        } else if has(&self.markup_extensions) {
            Some(DocumentKind::Markup)
        } else if has(&self.script_extensions) {
            Some(DocumentKind::Script)
        } else {
            None
        }
    }

    /// Classifies a path by its extension.
    pub fn kind_for_path(&self, path: &Path) -> Option<DocumentKind> {
        path.extension()
            .and_then(|e| e.to_str())
            .and_then(|e| self.kind_for_extension(e))
    }

    /// Deduplicated `**/*.<ext>` patterns for workspace style files.
    pub fn style_globs(&self) -> Vec<String> {
        self.style_extensions
            .iter()
            .map(|e| format!("**/*.{}", e.trim_start_matches('.').to_ascii_lowercase()))
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// Compiles user and default exclusion patterns.
    pub fn exclude_set(&self) -> XrefResult<GlobSet> {
        build_globset(
            DEFAULT_EXCLUDES
                .iter()
                .copied()
                .chain(self.exclude.iter().map(String::as_str)),
        )
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    pub fn remote_timeout(&self) -> Duration {
        Duration::from_millis(self.remote_timeout_ms)
    }
}

/// Builds a glob set, rejecting invalid patterns.
pub fn build_globset<'a>(patterns: impl IntoIterator<Item = &'a str>) -> XrefResult<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        let glob = Glob::new(pattern)
            .map_err(|e| XrefError::config(CONFIG_FILE, format!("invalid glob '{}': {}", pattern, e)))?;
        builder.add(glob);
    }
    builder
        .build()
        .map_err(|e| XrefError::config(CONFIG_FILE, e.to_string()))
}

/// Loads configuration from cssxref.toml if it exists.
pub fn load_config(root: &Path) -> Result<Option<XrefConfig>> {
    let path = root.join(CONFIG_FILE);
    if !path.exists() {
        return Ok(None);
    }

    let content = fs::read_to_string(&path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let cfg = toml::from_str(&content).context("Invalid cssxref.toml")?;
    Ok(Some(cfg))
}
