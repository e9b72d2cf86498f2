//! Parallel, deterministic file discovery with directory pruning.
//!
//! Performance characteristics:
//! - Early directory pruning via `WalkDir::filter_entry` (O(1) subtree skip)
//! - Parallel glob matching via Rayon's `par_bridge`
//! - Results sorted, so the file cap always keeps the same files

use anyhow::{Context, Result};
use globset::GlobSet;
use rayon::prelude::*;
use std::path::{Path, PathBuf};
use tracing::info;
use walkdir::WalkDir;

use crate::config::{build_globset, XrefConfig};
use crate::document::DocumentKind;

/// Directories never descended into, whatever the exclude globs say.
const EXCLUDED_DIRS: &[&str] = &["node_modules", ".git", "target", ".hg", ".svn"];

#[inline]
fn is_excluded_dir(entry: &walkdir::DirEntry) -> bool {
    entry.depth() > 0
        && entry.file_type().is_dir()
        && entry
            .file_name()
            .to_str()
            .is_some_and(|name| EXCLUDED_DIRS.contains(&name))
}

/// Whether `path` matches the exclude set, tested both relative to `root`
/// and as given.
pub fn is_excluded(path: &Path, root: &Path, excludes: &GlobSet) -> bool {
    excludes.is_match(path)
        || path
            .strip_prefix(root)
            .is_ok_and(|rel| excludes.is_match(rel))
}

/// Walks `root` and returns files accepted by `accept` and not excluded,
/// sorted.
fn gather_files(root: &Path, excludes: &GlobSet, accept: impl Fn(&Path) -> bool + Sync) -> Result<Vec<PathBuf>> {
    let mut files = WalkDir::new(root)
        .into_iter()
        .filter_entry(|e| !is_excluded_dir(e))
        .par_bridge()
        .filter_map(|entry| match entry {
            Ok(e) => {
                let path = e.path();
                if e.file_type().is_file() && accept(path) && !is_excluded(path, root, excludes) {
                    Some(Ok(path.to_path_buf()))
                } else {
                    None
                }
            }
            Err(e) => Some(Err(e.into())),
        })
        .collect::<Result<Vec<_>>>()
        .with_context(|| format!("Failed to gather files from {}", root.display()))?;

    files.sort();
    Ok(files)
}

/// Style files under `root` matching the configured extensions, capped at
/// `max_workspace_files`.
pub fn gather_style_files(root: &Path, config: &XrefConfig) -> Result<Vec<PathBuf>> {
    let style_globs = config.style_globs();
    let styles = build_globset(style_globs.iter().map(String::as_str))?;
    let excludes = config.exclude_set()?;

    let mut files = gather_files(root, &excludes, |path| {
        path.file_name().is_some_and(|name| styles.is_match(Path::new(name)))
            || styles.is_match(path)
    })?;

    if files.len() > config.max_workspace_files {
        info!(
            root = %root.display(),
            found = files.len(),
            cap = config.max_workspace_files,
            "workspace style files capped"
        );
        files.truncate(config.max_workspace_files);
    }

    Ok(files)
}

/// Every analyzable document (style, markup or script) under `root`.
pub fn gather_documents(root: &Path, config: &XrefConfig) -> Result<Vec<(PathBuf, DocumentKind)>> {
    let excludes = config.exclude_set()?;
    let files = gather_files(root, &excludes, |path| config.kind_for_path(path).is_some())?;

    Ok(files
        .into_iter()
        .filter_map(|path| config.kind_for_path(&path).map(|kind| (path, kind)))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn temp_tree(name: &str) -> PathBuf {
        let dir = std::env::temp_dir()
            .join("cssxref_scan_test")
            .join(format!("{}_{}", name, std::process::id()));
        if dir.exists() {
            fs::remove_dir_all(&dir).ok();
        }
        for (rel, body) in [
            ("a.css", ".a{}"),
            ("sub/b.scss", ".b{}"),
            ("sub/c.less", ".c{}"),
            ("node_modules/lib/d.css", ".d{}"),
            ("dist/e.css", ".e{}"),
            ("index.html", "<div></div>"),
            ("app.ts", ""),
            ("notes.txt", ""),
        ] {
            let path = dir.join(rel);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(path, body).unwrap();
        }
        dir
    }

    #[test]
    fn test_gather_style_files() {
        let root = temp_tree("styles");
        let files = gather_style_files(&root, &XrefConfig::default()).unwrap();
        let names: Vec<_> = files
            .iter()
            .map(|p| p.strip_prefix(&root).unwrap().to_string_lossy().replace('\\', "/"))
            .collect();
        assert_eq!(names, vec!["a.css", "dist/e.css", "sub/b.scss", "sub/c.less"]);
        fs::remove_dir_all(&root).ok();
    }

    #[test]
    fn test_exclude_globs_and_cap() {
        let root = temp_tree("excluded");
        let cfg = XrefConfig {
            exclude: vec!["dist/**".into()],
            max_workspace_files: 2,
            ..XrefConfig::default()
        };
        let files = gather_style_files(&root, &cfg).unwrap();
        assert_eq!(files.len(), 2);
        assert!(files.iter().all(|p| !p.to_string_lossy().contains("dist")));
        fs::remove_dir_all(&root).ok();
    }

    #[test]
    fn test_gather_documents() {
        let root = temp_tree("docs");
        let docs = gather_documents(&root, &XrefConfig::default()).unwrap();
        assert_eq!(docs.len(), 6);
        assert!(docs.iter().any(|(p, k)| p.ends_with("index.html") && *k == DocumentKind::Markup));
        assert!(docs.iter().any(|(p, k)| p.ends_with("app.ts") && *k == DocumentKind::Script));
        assert!(!docs.iter().any(|(p, _)| p.ends_with("notes.txt")));
        fs::remove_dir_all(&root).ok();
    }
}
