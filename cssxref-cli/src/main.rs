//! cssxref CLI - CSS selector cross-reference checker.
//!
//! Features:
//! - Project configuration from cssxref.toml
//! - Linked, embedded and workspace-wide stylesheet resolution
//! - Rayon-powered parallel file loading
//! - One shared selector cache for the whole run
//! - Plain text or JSON output, exit code 1 when issues are found

use anyhow::{Context, Result};
use clap::Parser;
use rayon::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use cssxref_core::{
    entries_for, find_workspace_root, gather_documents, init_structured_logging, load_config, log_error,
    log_info, log_warn, print_json, print_plain, shared, CancelToken, Document, DocumentKind, StyleCache,
    Validator, XrefConfig,
};

#[derive(Parser, Debug)]
#[command(author, version, about = "Cross-reference CSS selectors against markup and scripts")]
pub struct Cli {
    /// Project directory or single file to check
    #[arg(default_value = ".")]
    path: String,

    /// Output results in JSON format
    #[arg(long)]
    json: bool,

    /// Additional glob patterns to exclude
    #[arg(long, num_args = 1..)]
    exclude: Vec<String>,

    /// Do not fetch remote stylesheets
    #[arg(long)]
    no_remote: bool,

    /// Do not collect selectors from every stylesheet in the project
    #[arg(long)]
    no_workspace: bool,

    /// Do not report unused selectors
    #[arg(long)]
    no_unused: bool,

    /// Do not report undefined classes and ids
    #[arg(long)]
    no_undefined: bool,
}

impl Cli {
    /// Applies command-line overrides on top of the file configuration.
    fn apply(&self, mut config: XrefConfig) -> XrefConfig {
        config.exclude.extend(self.exclude.iter().cloned());
        config.remote_stylesheets &= !self.no_remote;
        config.workspace_scan &= !self.no_workspace;
        config.check_unused &= !self.no_unused;
        config.check_undefined &= !self.no_undefined;
        config
    }
}

/// Resolves the input into (project root, files to check).
fn collect_targets(input: &Path, config: &XrefConfig) -> Result<(PathBuf, Vec<(PathBuf, DocumentKind)>)> {
    if input.is_file() {
        let kind = config
            .kind_for_path(input)
            .with_context(|| format!("Unsupported file type: {}", input.display()))?;
        let root = find_workspace_root(input)
            .or_else(|| input.parent().map(Path::to_path_buf))
            .unwrap_or_default();
        return Ok((root, vec![(input.to_path_buf(), kind)]));
    }

    let files = gather_documents(input, config)?;
    Ok((input.to_path_buf(), files))
}

fn display_path(path: &Path, root: &Path) -> String {
    path.strip_prefix(root)
        .unwrap_or(path)
        .display()
        .to_string()
}

fn main() -> Result<()> {
    std::panic::set_hook(Box::new(|info| {
        eprintln!("[PANIC] cssxref internal error: {}", info);
        eprintln!("[PANIC] The process will exit with code 2.");
    }));

    // Initialize structured logging (JSON to stderr, respects RUST_LOG)
    init_structured_logging();

    let cli = Cli::parse();

    let input = Path::new(&cli.path)
        .canonicalize()
        .with_context(|| format!("Failed to resolve path: {}", cli.path))?;
    let config_dir = if input.is_file() {
        find_workspace_root(&input).unwrap_or_else(|| input.parent().map(Path::to_path_buf).unwrap_or_default())
    } else {
        input.clone()
    };
    let config = cli.apply(load_config(&config_dir)?.unwrap_or_default());

    let (root, targets) = collect_targets(&input, &config)?;

    // Load every document in parallel; unreadable files are reported and skipped.
    let documents: Vec<Document> = targets
        .par_iter()
        .filter_map(|(path, kind)| match fs::read_to_string(path) {
            Ok(text) => Some(Document::new(path.display().to_string(), 0, text, *kind).with_path(path)),
            Err(e) => {
                log_warn(&format!("Skipping {}: {}", path.display(), e));
                None
            }
        })
        .collect();

    let cache = shared(StyleCache::new(config.cache_max_entries, config.cache_ttl())?);
    let validator = Validator::from_config(Arc::new(config), cache)?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to start async runtime")?;

    let cancel = CancelToken::new();
    let mut entries = Vec::new();
    for doc in &documents {
        let diagnostics = runtime.block_on(validator.validate(doc, Some(&root), &cancel));
        let Some(path) = doc.path.as_deref() else {
            continue;
        };
        entries.extend(entries_for(Path::new(&display_path(path, &root)), &doc.text, &diagnostics));
    }

    if cli.json {
        print_json(&entries, documents.len());
    } else {
        print_plain(&entries, documents.len());
    }

    log_info(&format!(
        "Checked {} file(s) under {}, {} issue(s)",
        documents.len(),
        root.display(),
        entries.len()
    ));

    if documents.len() < targets.len() {
        log_error(&format!("{} file(s) could not be read", targets.len() - documents.len()));
    }
    if !entries.is_empty() {
        std::process::exit(1);
    }
    Ok(())
}
