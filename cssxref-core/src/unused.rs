//! Unused-declaration scanner.
//!
//! A declaration is unused when its name is missing from the used set that
//! applies to the document: names referenced inside the stylesheet's own rule
//! bodies for style documents, or the usages resolved by the usage scanner for
//! markup documents.

use std::collections::HashSet;

use crate::diagnostic::{Diagnostic, DiagnosticKind};
use crate::selector::{Selector, SelectorKind};
use crate::tokenizer::rule_body_tokens;

/// One Unnecessary-tagged warning per declaration absent from its used set.
/// The range covers the name, not the marker.
pub fn find_unused(selectors: &[Selector], used_classes: &HashSet<String>, used_ids: &HashSet<String>) -> Vec<Diagnostic> {
    selectors
        .iter()
        .filter(|sel| {
            let used = match sel.kind {
                SelectorKind::Class => used_classes,
                SelectorKind::Id => used_ids,
            };
            !used.contains(&sel.name)
        })
        .map(|sel| {
            Diagnostic::warning(
                DiagnosticKind::UnusedSelector,
                sel.offset + 1,
                sel.raw_len,
                format!("Unused CSS {} '{}'", sel.kind.label(), sel),
            )
            .unnecessary()
        })
        .collect()
}

/// Class and id names referenced inside a stylesheet's rule bodies (nested
/// rules, `@media` blocks, `@extend`).
pub fn local_used_names(css: &str) -> (HashSet<String>, HashSet<String>) {
    let mut classes = HashSet::new();
    let mut ids = HashSet::new();
    for token in rule_body_tokens(css) {
        match token.kind {
            SelectorKind::Class => classes.insert(token.name),
            SelectorKind::Id => ids.insert(token.name),
        };
    }
    (classes, ids)
}
