//! Output formatting - plaintext and JSON.

use std::path::Path;

use serde::Serialize;
use serde_json::json;

use crate::diagnostic::{Diagnostic, Severity, SOURCE};
use crate::position::LineIndex;

/// A diagnostic located by 1-based line and column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReportEntry {
    pub path: String,
    pub line: u32,
    pub col: u32,
    pub severity: Severity,
    pub code: &'static str,
    pub message: String,
    pub unnecessary: bool,
}

/// Maps a file's diagnostics to report entries.
pub fn entries_for(path: &Path, text: &str, diagnostics: &[Diagnostic]) -> Vec<ReportEntry> {
    let index = LineIndex::new(text);
    diagnostics
        .iter()
        .map(|d| {
            let pos = index.offset_to_line_col(d.offset).unwrap_or_default();
            ReportEntry {
                path: path.display().to_string(),
                line: pos.line + 1,
                col: pos.col + 1,
                severity: d.severity,
                code: d.kind.code(),
                message: d.message.clone(),
                unnecessary: d.is_unnecessary(),
            }
        })
        .collect()
}

/// `path:line:col: warning: message` lines.
pub fn format_plain(entries: &[ReportEntry]) -> String {
    entries
        .iter()
        .map(|e| format!("{}:{}:{}: warning: {}\n", e.path, e.line, e.col, e.message))
        .collect()
}

/// Prints entries in plain text format.
pub fn print_plain(entries: &[ReportEntry], files_checked: usize) {
    print!("{}", format_plain(entries));
    if entries.is_empty() {
        println!("No issues found in {} file(s).", files_checked);
    } else {
        println!("{} issue(s) in {} file(s) checked.", entries.len(), files_checked);
    }
}

/// Prints entries in JSON format.
pub fn print_json(entries: &[ReportEntry], files_checked: usize) {
    let report = json!({
        "source": SOURCE,
        "files_checked": files_checked,
        "issues": entries,
    });
    match serde_json::to_string_pretty(&report) {
        Ok(json) => println!("{}", json),
        Err(e) => {
            tracing::warn!(error = %e, "JSON serialization failed");
            print!("{}", format_plain(entries));
        }
    }
}
