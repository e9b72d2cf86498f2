//! Workspace root detection.
//!
//! The root decides where workspace-wide stylesheets are collected from and
//! what root-relative `<link href="/...">` paths resolve against.

use std::path::{Path, PathBuf};

use crate::config::CONFIG_FILE;

/// Files whose presence marks a directory as a project root, in priority order.
pub const ROOT_MARKERS: &[&str] = &[CONFIG_FILE, "package.json", ".git"];

/// Whether `dir` contains one of the [`ROOT_MARKERS`].
pub fn is_workspace_root(dir: &Path) -> bool {
    ROOT_MARKERS.iter().any(|marker| dir.join(marker).exists())
}

/// Walks up from `path` (a file or directory) to the nearest directory that
/// holds a root marker. Returns `None` when no ancestor qualifies.
pub fn find_workspace_root(path: &Path) -> Option<PathBuf> {
    let start = if path.is_dir() { Some(path) } else { path.parent() };

    let mut current = start;
    while let Some(dir) = current {
        if is_workspace_root(dir) {
            return Some(dir.to_path_buf());
        }
        current = dir.parent();
    }
    None
}

/// Picks the editor workspace folder containing `file`, preferring the
/// longest (innermost) match. Falls back to marker detection.
pub fn workspace_root_for(file: &Path, folders: &[PathBuf]) -> Option<PathBuf> {
    folders
        .iter()
        .filter(|folder| file.starts_with(folder))
        .max_by_key(|folder| folder.components().count())
        .cloned()
        .or_else(|| find_workspace_root(file))
}
