//! Streaming selector tokenizer.
//!
//! Not a CSS parser: a single pass over the text finds rule preludes (the text
//! before each `{`), splits them on top-level commas and pulls out `.class` and
//! `#id` tokens. Malformed input never fails; unterminated strings, comments
//! and blocks simply run to the end of the text.
//!
//! All passes share one nesting tracker, [`mask_non_code`], which blanks out
//! comments and string literals while preserving byte offsets. Bracket depth is
//! then tracked over the masked text, so the tokenizer, the comma splitter and
//! the body extractor agree on what counts as code.

use std::ops::Range;

use crate::position::LineIndex;
use crate::selector::{Selector, SelectorKind};

/// Replacement for bytes of a preprocessor interpolation (`#{...}`, `@{...}`,
/// `${...}`). It is not a name boundary, so a token touching an interpolation
/// absorbs it and is then discarded as dynamic.
pub(crate) const DYNAMIC: char = '\u{1}';

#[derive(Clone, Copy, PartialEq, Eq)]
enum LexState {
    Code,
    BlockComment,
    LineComment,
    Str(u8),
    Interpolation(usize),
}

/// Returns `text` with comments and string literals replaced by spaces and
/// interpolations replaced by [`DYNAMIC`]. Byte offsets are unchanged.
///
/// `//` starts a line comment only outside parentheses, so `url(http://x)`
/// stays intact.
pub fn mask_non_code(text: &str) -> String {
    let bytes = text.as_bytes();
    let mut out = String::with_capacity(text.len());
    let mut state = LexState::Code;
    let mut parens = 0usize;
    let mut chars = text.char_indices();

    let blank = |out: &mut String, c: char, fill: char| {
        for _ in 0..c.len_utf8() {
            out.push(fill);
        }
    };

    while let Some((i, c)) = chars.next() {
        let next = bytes.get(i + 1).copied();
        match state {
            LexState::Code => match c {
                '\\' => {
                    out.push(c);
                    if let Some((_, escaped)) = chars.next() {
                        out.push(escaped);
                    }
                }
                '/' if next == Some(b'*') => {
                    state = LexState::BlockComment;
                    out.push(' ');
                    chars.next();
                    out.push(' ');
                }
                '/' if next == Some(b'/') && parens == 0 => {
                    state = LexState::LineComment;
                    out.push(' ');
                }
                '\'' | '"' | '`' => {
                    state = LexState::Str(c as u8);
                    out.push(' ');
                }
                '#' | '@' | '$' if next == Some(b'{') => {
                    state = LexState::Interpolation(0);
                    out.push(DYNAMIC);
                }
                '(' => {
                    parens += 1;
                    out.push(c);
                }
                ')' => {
                    parens = parens.saturating_sub(1);
                    out.push(c);
                }
                _ => out.push(c),
            },
            LexState::BlockComment => {
                if c == '*' && next == Some(b'/') {
                    state = LexState::Code;
                    out.push(' ');
                    chars.next();
                    out.push(' ');
                } else if c == '\n' {
                    out.push('\n');
                } else {
                    blank(&mut out, c, ' ');
                }
            }
            LexState::LineComment => {
                if c == '\n' {
                    state = LexState::Code;
                    out.push('\n');
                } else {
                    blank(&mut out, c, ' ');
                }
            }
            LexState::Str(quote) => {
                if c == '\\' {
                    out.push(' ');
                    if let Some((_, escaped)) = chars.next() {
                        blank(&mut out, escaped, ' ');
                    }
                } else {
                    if c as u32 == quote as u32 {
                        state = LexState::Code;
                    }
                    blank(&mut out, c, ' ');
                }
            }
            LexState::Interpolation(depth) => {
                match c {
                    '{' => state = LexState::Interpolation(depth + 1),
                    '}' if depth <= 1 => state = LexState::Code,
                    '}' => state = LexState::Interpolation(depth - 1),
                    _ => {}
                }
                blank(&mut out, c, DYNAMIC);
            }
        }
    }

    out
}

/// A `.name` / `#name` token found by [`scan_selector_tokens`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectorToken {
    /// Offset of the marker within the scanned text.
    pub offset: usize,
    pub kind: SelectorKind,
    /// Unescaped name.
    pub name: String,
    /// Byte length of the name as written (after the marker).
    pub raw_len: usize,
}

#[inline]
fn is_name_boundary(b: u8) -> bool {
    b.is_ascii_whitespace()
        || matches!(
            b,
            b'.' | b'#'
                | b':'
                | b','
                | b'['
                | b']'
                | b'('
                | b')'
                | b'>'
                | b'+'
                | b'~'
                | b'='
                | b'*'
                | b'^'
                | b'$'
                | b'|'
                | b'{'
                | b'}'
                | b';'
                | b'\''
                | b'"'
                | b'`'
                | b'!'
                | b'/'
                | b'&'
                | b'<'
                | b'@'
        )
}

/// Lazy iterator over selector tokens of a flat selector string.
///
/// Attribute selector contents (`[...]`) and quoted strings are skipped; a
/// backslash escapes the next character both outside and inside names.
pub struct SelectorTokens<'a> {
    text: &'a str,
    pos: usize,
}

impl<'a> SelectorTokens<'a> {
    fn skip_quoted(&mut self, quote: u8) {
        let bytes = self.text.as_bytes();
        self.pos += 1;
        while self.pos < bytes.len() {
            match bytes[self.pos] {
                b'\\' => self.pos += 2,
                b if b == quote => {
                    self.pos += 1;
                    return;
                }
                _ => self.pos += 1,
            }
        }
    }

    fn skip_attribute(&mut self) {
        let bytes = self.text.as_bytes();
        let mut depth = 0usize;
        while self.pos < bytes.len() {
            match bytes[self.pos] {
                b'[' => {
                    depth += 1;
                    self.pos += 1;
                }
                b']' => {
                    self.pos += 1;
                    depth = depth.saturating_sub(1);
                    if depth == 0 {
                        return;
                    }
                }
                b'\\' => self.pos += 2,
                q @ (b'\'' | b'"') => self.skip_quoted(q),
                _ => self.pos += 1,
            }
        }
    }

    /// Reads a name starting at `start`; returns (name, raw byte length).
    fn read_name(&self, start: usize) -> (String, usize) {
        let mut name = String::new();
        let mut chars = self.text[start..].char_indices();
        let mut end = self.text.len() - start;

        while let Some((i, c)) = chars.next() {
            if c == '\\' {
                match chars.next() {
                    Some((_, escaped)) => name.push(escaped),
                    None => {
                        end = i + 1;
                        break;
                    }
                }
                continue;
            }
            if c.is_ascii() && is_name_boundary(c as u8) {
                end = i;
                break;
            }
            name.push(c);
        }

        (name, end)
    }
}

impl Iterator for SelectorTokens<'_> {
    type Item = SelectorToken;

    fn next(&mut self) -> Option<SelectorToken> {
        let bytes = self.text.as_bytes();
        while self.pos < bytes.len() {
            let b = bytes[self.pos];
            match b {
                b'\\' => {
                    // Skip the escaped character, whatever its width.
                    let width = self.text[self.pos + 1..]
                        .chars()
                        .next()
                        .map_or(0, char::len_utf8);
                    self.pos += 1 + width;
                }
                b'[' => self.skip_attribute(),
                b'\'' | b'"' => self.skip_quoted(b),
                b'.' | b'#' => {
                    let marker = self.pos;
                    let (name, raw_len) = self.read_name(marker + 1);
                    self.pos = marker + 1 + raw_len;

                    let starts_with_digit = bytes
                        .get(marker + 1)
                        .is_some_and(|first| first.is_ascii_digit());
                    if name.is_empty() || starts_with_digit || name.contains(DYNAMIC) {
                        if raw_len == 0 {
                            self.pos = marker + 1;
                        }
                        continue;
                    }

                    let kind = SelectorKind::from_marker(b)?;
                    return Some(SelectorToken {
                        offset: marker,
                        kind,
                        name,
                        raw_len,
                    });
                }
                _ => self.pos += 1,
            }
        }
        None
    }
}

/// Scans a flat selector string for `.name` / `#name` tokens.
pub fn scan_selector_tokens(text: &str) -> SelectorTokens<'_> {
    SelectorTokens { text, pos: 0 }
}

/// One comma-separated branch of a selector list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Branch<'a> {
    /// Offset of the branch within the split text.
    pub offset: usize,
    pub text: &'a str,
}

/// Splits a selector list on commas that are not nested inside `()`, `[]`,
/// `{}` or string literals.
pub fn split_top_level_commas(prelude: &str) -> Vec<Branch<'_>> {
    let masked = mask_non_code(prelude);
    let mut branches = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;

    for (i, b) in masked.bytes().enumerate() {
        match b {
            b'(' | b'[' | b'{' => depth += 1,
            b')' | b']' | b'}' => depth = depth.saturating_sub(1),
            b',' if depth == 0 => {
                branches.push(Branch {
                    offset: start,
                    text: &prelude[start..i],
                });
                start = i + 1;
            }
            _ => {}
        }
    }
    branches.push(Branch {
        offset: start,
        text: &prelude[start..],
    });

    branches
}

/// Parses a stylesheet and returns every class/id selector it declares.
pub fn parse_selectors(css: &str) -> Vec<Selector> {
    let index = LineIndex::new(css);
    parse_selectors_at(css, 0, &index)
}

/// Parses `css` that sits at `base` inside a larger document described by
/// `index` (an embedded `<style>` block). Offsets and positions are remapped
/// into the outer document.
pub fn parse_selectors_at(css: &str, base: usize, index: &LineIndex) -> Vec<Selector> {
    let masked = mask_non_code(css);
    let mut selectors = Vec::new();
    let mut prelude_start = 0;

    for (i, b) in masked.bytes().enumerate() {
        match b {
            b'{' => {
                let raw = &masked[prelude_start..i];
                let trimmed = raw.trim_start();
                if !trimmed.is_empty() && !trimmed.starts_with('@') {
                    let prelude_offset = prelude_start + (raw.len() - trimmed.len());
                    extract_prelude(trimmed.trim_end(), base + prelude_offset, index, &mut selectors);
                }
                prelude_start = i + 1;
            }
            b'}' | b';' => prelude_start = i + 1,
            _ => {}
        }
    }

    selectors
}

fn extract_prelude(prelude: &str, prelude_offset: usize, index: &LineIndex, out: &mut Vec<Selector>) {
    for branch in split_top_level_commas(prelude) {
        for token in scan_selector_tokens(branch.text) {
            let offset = prelude_offset + branch.offset + token.offset;
            let pos = index.offset_to_line_col(offset).unwrap_or_default();
            out.push(Selector {
                offset,
                line: pos.line,
                col: pos.col,
                kind: token.kind,
                name: token.name,
                raw_len: token.raw_len,
            });
        }
    }
}

/// Byte ranges of the text inside top-level `{ ... }` bodies, nested blocks
/// included. An unterminated body runs to the end of the text.
pub fn extract_rule_bodies(css: &str) -> Vec<Range<usize>> {
    let masked = mask_non_code(css);
    body_ranges(&masked)
}

fn body_ranges(masked: &str) -> Vec<Range<usize>> {
    let mut bodies = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;

    for (i, b) in masked.bytes().enumerate() {
        match b {
            b'{' => {
                if depth == 0 {
                    start = i + 1;
                }
                depth += 1;
            }
            b'}' if depth > 0 => {
                depth -= 1;
                if depth == 0 {
                    bodies.push(start..i);
                }
            }
            _ => {}
        }
    }
    if depth > 0 {
        bodies.push(start..masked.len());
    }

    bodies
}

/// Selector tokens referenced inside rule bodies (nested rules, `@extend`),
/// with offsets relative to `css`. Comments and strings are ignored.
pub fn rule_body_tokens(css: &str) -> Vec<SelectorToken> {
    let masked = mask_non_code(css);
    body_ranges(&masked)
        .into_iter()
        .flat_map(|range| {
            let base = range.start;
            scan_selector_tokens(&masked[range])
                .map(move |token| SelectorToken {
                    offset: base + token.offset,
                    ..token
                })
                .collect::<Vec<_>>()
        })
        .collect()
}
