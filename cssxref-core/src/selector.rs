//! Selector data model.

use std::collections::HashSet;
use std::fmt;

/// Whether a token was declared with `.` or `#`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SelectorKind {
    Class,
    Id,
}

impl SelectorKind {
    /// Kind for a leading marker byte.
    pub fn from_marker(marker: u8) -> Option<Self> {
        match marker {
            b'.' => Some(Self::Class),
            b'#' => Some(Self::Id),
            _ => None,
        }
    }

    pub fn marker(self) -> char {
        match self {
            Self::Class => '.',
            Self::Id => '#',
        }
    }

    /// Human label used in diagnostic messages.
    pub fn label(self) -> &'static str {
        match self {
            Self::Class => "class",
            Self::Id => "id",
        }
    }
}

/// A `.class` or `#id` token found in a selector prelude.
///
/// `offset` points at the marker. `line`/`col` are 0-based positions of that
/// offset. `name` is unescaped; `raw_len` is the byte length of the name as
/// written in the source, so highlighted ranges cover the real text.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Selector {
    pub offset: usize,
    pub line: u32,
    pub col: u32,
    pub kind: SelectorKind,
    pub name: String,
    pub raw_len: usize,
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.kind.marker(), self.name)
    }
}

/// Class and id names declared across a style map.
#[derive(Debug, Clone, Default)]
pub struct KnownSelectors {
    pub classes: HashSet<String>,
    pub ids: HashSet<String>,
}

impl KnownSelectors {
    pub fn extend<'a>(&mut self, selectors: impl IntoIterator<Item = &'a Selector>) {
        for sel in selectors {
            match sel.kind {
                SelectorKind::Class => self.classes.insert(sel.name.clone()),
                SelectorKind::Id => self.ids.insert(sel.name.clone()),
            };
        }
    }

    pub fn contains(&self, kind: SelectorKind, name: &str) -> bool {
        match kind {
            SelectorKind::Class => self.classes.contains(name),
            SelectorKind::Id => self.ids.contains(name),
        }
    }
}

/// Whether `name` has the shape of a plain CSS identifier
/// (`-?[A-Za-z_][A-Za-z0-9_-]*`).
pub fn is_css_identifier(name: &str) -> bool {
    let body = name.strip_prefix('-').unwrap_or(name);
    let mut bytes = body.bytes();
    match bytes.next() {
        Some(b) if b.is_ascii_alphabetic() || b == b'_' => {}
        _ => return false,
    }
    bytes.all(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'-')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identifier_shape() {
        assert!(is_css_identifier("btn"));
        assert!(is_css_identifier("col-md-6"));
        assert!(is_css_identifier("_private"));
        assert!(is_css_identifier("-webkit-thing"));
        assert!(!is_css_identifier(""));
        assert!(!is_css_identifier("-"));
        assert!(!is_css_identifier("6col"));
        assert!(!is_css_identifier("a:b"));
        assert!(!is_css_identifier("{{x}}"));
    }

    #[test]
    fn test_known_selectors() {
        let sel = |kind, name: &str| Selector {
            offset: 0,
            line: 0,
            col: 0,
            kind,
            name: name.to_string(),
            raw_len: name.len(),
        };
        let decls = [sel(SelectorKind::Class, "a"), sel(SelectorKind::Id, "main")];
        let mut known = KnownSelectors::default();
        known.extend(decls.iter());

        assert!(known.contains(SelectorKind::Class, "a"));
        assert!(known.contains(SelectorKind::Id, "main"));
        assert!(!known.contains(SelectorKind::Id, "a"));
        assert_eq!(decls[0].to_string(), ".a");
        assert_eq!(decls[1].to_string(), "#main");
    }
}
