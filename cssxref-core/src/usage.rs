//! Usage scanner: finds class and id references in markup and script text.
//!
//! Every pattern family is a scan function returning a lazy iterator of
//! [`Candidate`]s over the full text. Iterators are stateless, so re-scanning
//! always yields the same candidates. Families:
//!
//! - class attributes (`class`, `className`, `:class`, `v-bind:class`, JSX
//!   `className={...}`)
//! - id attributes
//! - `classList.add/remove/toggle/contains/replace(...)`
//! - `querySelector`, `querySelectorAll`, `closest`, `matches`
//! - `getElementById(...)`
//! - markup injected through `innerHTML`/`outerHTML` and `insertAdjacentHTML`
//!
//! Candidate offsets always index the original text, never an unquoted or
//! trimmed copy.

use std::collections::HashSet;
use std::ops::Range;
use std::sync::OnceLock;

use regex::Regex;

use crate::config::XrefConfig;
use crate::diagnostic::{Diagnostic, DiagnosticKind};
use crate::selector::{is_css_identifier, KnownSelectors, SelectorKind};
use crate::tokenizer::{scan_selector_tokens, split_top_level_commas, DYNAMIC};

/// Where a candidate reference was found.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UsageSource {
    ClassAttribute,
    IdAttribute,
    ClassList,
    QuerySelector,
    ElementById,
}

/// A class or id name referenced by the text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    /// Offset of the name in the scanned text.
    pub offset: usize,
    /// Byte length of the name as written.
    pub len: usize,
    pub kind: SelectorKind,
    pub name: String,
    pub source: UsageSource,
}

impl Candidate {
    fn shifted(mut self, by: usize) -> Self {
        self.offset += by;
        self
    }
}

/// Knobs for [`scan_usages`].
#[derive(Debug, Clone, Copy)]
pub struct UsageOptions {
    /// Emit diagnostics for unresolved references at all.
    pub report_undefined: bool,
    /// Diagnose `id="..."` attributes naming an unknown id.
    pub report_unknown_id_attributes: bool,
}

impl Default for UsageOptions {
    fn default() -> Self {
        Self {
            report_undefined: true,
            report_unknown_id_attributes: false,
        }
    }
}

impl From<&XrefConfig> for UsageOptions {
    fn from(cfg: &XrefConfig) -> Self {
        Self {
            report_undefined: cfg.check_undefined,
            report_unknown_id_attributes: cfg.report_unknown_id_attributes,
        }
    }
}

/// Resolved usages and diagnostics for unresolved ones.
#[derive(Debug, Clone, Default)]
pub struct UsageResult {
    pub diagnostics: Vec<Diagnostic>,
    pub used_classes: HashSet<String>,
    pub used_ids: HashSet<String>,
}

/// Resolves every reference in `text` against `known`.
pub fn scan_usages(text: &str, known: &KnownSelectors, options: &UsageOptions) -> UsageResult {
    let mut result = UsageResult::default();
    let mut seen = HashSet::new();

    for candidate in candidates(text) {
        if !seen.insert((candidate.offset, candidate.kind)) {
            continue;
        }

        if known.contains(candidate.kind, &candidate.name) {
            match candidate.kind {
                SelectorKind::Class => result.used_classes.insert(candidate.name),
                SelectorKind::Id => result.used_ids.insert(candidate.name),
            };
            continue;
        }

        if !options.report_undefined
            || (candidate.source == UsageSource::IdAttribute && !options.report_unknown_id_attributes)
            || !is_css_identifier(&candidate.name)
        {
            continue;
        }

        let kind = match candidate.kind {
            SelectorKind::Class => DiagnosticKind::UndefinedClass,
            SelectorKind::Id => DiagnosticKind::UndefinedId,
        };
        result.diagnostics.push(Diagnostic::warning(
            kind,
            candidate.offset,
            candidate.len,
            format!("CSS {} '{}' not found", candidate.kind.label(), candidate.name),
        ));
    }

    result
}

/// Every candidate from every pattern family, duplicates included.
pub fn candidates(text: &str) -> impl Iterator<Item = Candidate> + '_ {
    class_attribute_usages(text)
        .chain(id_attribute_usages(text))
        .chain(class_list_usages(text))
        .chain(query_selector_usages(text))
        .chain(element_by_id_usages(text))
        .chain(embedded_markup_usages(text))
}

macro_rules! static_regex {
    ($name:ident, $pattern:expr) => {
        fn $name() -> &'static Regex {
            static RE: OnceLock<Regex> = OnceLock::new();
            RE.get_or_init(|| Regex::new($pattern).expect(concat!(stringify!($name), " is valid")))
        }
    };
}

static_regex!(class_attr_re, r"(?i)(?:^|[^\w\-:$])((?:v-bind)?:)?(class|classname)\s*\+?=\s*");
static_regex!(id_attr_re, r"(?i)(?:^|[^\w\-:$])((?:v-bind)?:)?(id)\s*=\s*");
static_regex!(class_list_re, r"\bclassList\s*\.\s*(?:add|remove|toggle|contains|replace)\s*\(");
static_regex!(query_re, r"\b(?:querySelector(?:All)?|closest|matches)\s*\(");
static_regex!(by_id_re, r"\bgetElementById\s*\(");
static_regex!(inner_html_re, r"\b(?:innerHTML|outerHTML)\s*\+?=\s*");
static_regex!(insert_html_re, r"\binsertAdjacentHTML\s*\(");

// ---------------------------------------------------------------------------
// Pattern families
// ---------------------------------------------------------------------------

/// `class="..."`, `className={...}`, `:class="..."` and friends.
pub fn class_attribute_usages(text: &str) -> impl Iterator<Item = Candidate> + '_ {
    class_attr_re().captures_iter(text).flat_map(move |caps| {
        let mut out = Vec::new();
        let (Some(whole), Some(name)) = (caps.get(0), caps.get(2)) else {
            return out;
        };
        let Some(value) = attribute_value(text, name.start(), whole.end()) else {
            return out;
        };
        let body = &text[value.start..value.end];
        if value.bound || caps.get(1).is_some() {
            bound_class_list(body, value.start, &mut out);
        } else {
            static_class_list(body, value.start, &mut out);
        }
        out
    })
}

/// `id="..."` attributes.
pub fn id_attribute_usages(text: &str) -> impl Iterator<Item = Candidate> + '_ {
    id_attr_re().captures_iter(text).flat_map(move |caps| {
        let mut out = Vec::new();
        let (Some(whole), Some(name)) = (caps.get(0), caps.get(2)) else {
            return out;
        };
        // In script only `el.id = ...` names an element id; `const id = ...` is a variable.
        if !in_markup_tag(text, name.start()) && !text[..name.start()].trim_end().ends_with('.') {
            return out;
        }
        let Some(value) = attribute_value(text, name.start(), whole.end()) else {
            return out;
        };
        let body = &text[value.start..value.end];
        if value.bound || caps.get(1).is_some() {
            for lit in literals_in(body) {
                push_single(body, lit.start..lit.end, value.start, SelectorKind::Id, UsageSource::IdAttribute, &mut out);
            }
        } else {
            push_single(text, value.start..value.end, 0, SelectorKind::Id, UsageSource::IdAttribute, &mut out);
        }
        out
    })
}

/// String arguments of `classList` methods.
pub fn class_list_usages(text: &str) -> impl Iterator<Item = Candidate> + '_ {
    class_list_re().find_iter(text).flat_map(move |m| {
        let mut out = Vec::new();
        for arg_start in call_args(text, m.end() - 1) {
            if let Some(lit) = read_literal(text, arg_start) {
                push_single(text, lit.start..lit.end, 0, SelectorKind::Class, UsageSource::ClassList, &mut out);
            }
        }
        out
    })
}

/// Selector strings passed to `querySelector` and friends, re-tokenized.
pub fn query_selector_usages(text: &str) -> impl Iterator<Item = Candidate> + '_ {
    query_re().find_iter(text).flat_map(move |m| {
        let Some(lit) = call_args(text, m.end() - 1)
            .first()
            .and_then(|&start| read_literal(text, start))
        else {
            return Vec::new();
        };

        let content = &text[lit.start..lit.end];
        let masked = if lit.quote == b'`' {
            mask_placeholders(content)
        } else {
            content.to_string()
        };

        scan_selector_tokens(&masked)
            .map(|token| Candidate {
                offset: lit.start + token.offset + 1,
                len: token.raw_len,
                kind: token.kind,
                name: token.name,
                source: UsageSource::QuerySelector,
            })
            .collect::<Vec<_>>()
    })
}

/// The string argument of `getElementById`.
pub fn element_by_id_usages(text: &str) -> impl Iterator<Item = Candidate> + '_ {
    by_id_re().find_iter(text).flat_map(move |m| {
        let mut out = Vec::new();
        if let Some(lit) = call_args(text, m.end() - 1)
            .first()
            .and_then(|&start| read_literal(text, start))
        {
            push_single(text, lit.start..lit.end, 0, SelectorKind::Id, UsageSource::ElementById, &mut out);
        }
        out
    })
}

/// A markup fragment embedded in script, with its offset in the outer text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Fragment<'a> {
    pub start: usize,
    pub text: &'a str,
}

/// Markup assigned to `innerHTML`/`outerHTML` or passed to
/// `insertAdjacentHTML`.
pub fn embedded_markup(text: &str) -> impl Iterator<Item = Fragment<'_>> + '_ {
    let assigned = inner_html_re()
        .find_iter(text)
        .filter_map(move |m| read_literal(text, m.end()));
    let inserted = insert_html_re().find_iter(text).filter_map(move |m| {
        call_args(text, m.end() - 1)
            .get(1)
            .and_then(|&start| read_literal(text, start))
    });

    assigned.chain(inserted).map(move |lit| Fragment {
        start: lit.start,
        text: &text[lit.start..lit.end],
    })
}

/// Class and id attributes inside [`embedded_markup`] fragments.
pub fn embedded_markup_usages(text: &str) -> impl Iterator<Item = Candidate> + '_ {
    embedded_markup(text).flat_map(|fragment| {
        class_attribute_usages(fragment.text)
            .chain(id_attribute_usages(fragment.text))
            .map(move |c| c.shifted(fragment.start))
    })
}

// ---------------------------------------------------------------------------
// Value readers
// ---------------------------------------------------------------------------

/// Content range of a quoted literal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Literal {
    start: usize,
    end: usize,
    quote: u8,
}

/// Reads the quoted literal opening at `at`. Unterminated literals run to the
/// end of the text; `${...}` inside template literals is skipped whole.
fn read_literal(text: &str, at: usize) -> Option<Literal> {
    let bytes = text.as_bytes();
    let quote = *bytes.get(at)?;
    if !matches!(quote, b'\'' | b'"' | b'`') {
        return None;
    }

    let mut i = at + 1;
    while i < bytes.len() {
        match bytes[i] {
            b'\\' => i += 2,
            b'$' if quote == b'`' && bytes.get(i + 1) == Some(&b'{') => i = matching_close(text, i + 1) + 1,
            b if b == quote => {
                return Some(Literal {
                    start: at + 1,
                    end: i,
                    quote,
                })
            }
            _ => i += 1,
        }
    }

    Some(Literal {
        start: at + 1,
        end: bytes.len(),
        quote,
    })
}

/// Index of the bracket closing the one at `open`, or the text length.
fn matching_close(text: &str, open: usize) -> usize {
    let bytes = text.as_bytes();
    let mut depth = 0usize;
    let mut i = open;

    while i < bytes.len() {
        match bytes[i] {
            b'(' | b'[' | b'{' => depth += 1,
            b')' | b']' | b'}' => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    return i;
                }
            }
            b'\'' | b'"' | b'`' => {
                if let Some(lit) = read_literal(text, i) {
                    i = lit.end;
                }
            }
            _ => {}
        }
        i += 1;
    }

    bytes.len()
}

/// Every quoted literal in `text`, in order.
fn literals_in(text: &str) -> Vec<Literal> {
    let bytes = text.as_bytes();
    let mut out = Vec::new();
    let mut i = 0;
    while i < bytes.len() {
        if let Some(lit) = read_literal(text, i) {
            out.push(lit);
            i = lit.end + 1;
        } else {
            i += 1;
        }
    }
    out
}

/// Absolute offsets of the (left-trimmed) arguments of the call whose `(` is
/// at `open`.
fn call_args(text: &str, open: usize) -> Vec<usize> {
    let close = matching_close(text, open);
    let args = &text[open + 1..close.max(open + 1)];
    split_top_level_commas(args)
        .into_iter()
        .filter_map(|branch| {
            let trimmed = branch.text.trim_start();
            (!trimmed.is_empty()).then(|| open + 1 + branch.offset + (branch.text.len() - trimmed.len()))
        })
        .collect()
}

#[derive(Debug, Clone, Copy)]
struct AttrValue {
    start: usize,
    end: usize,
    /// A JS expression rather than a literal class list.
    bound: bool,
}

/// The value assigned at `at` to the attribute or property named at
/// `name_start`. Inside a markup tag this is the attribute value; in script it
/// is the right-hand expression, read for its string literals.
fn attribute_value(text: &str, name_start: usize, at: usize) -> Option<AttrValue> {
    if in_markup_tag(text, name_start) {
        return read_attr_value(text, at);
    }
    if matches!(text.as_bytes().get(at), None | Some(b'=' | b'>')) {
        return None;
    }
    Some(AttrValue {
        start: at,
        end: expression_end(text, at),
        bound: true,
    })
}

/// True when `pos` lies between a tag's `<name` and its closing `>`.
fn in_markup_tag(text: &str, pos: usize) -> bool {
    let bytes = text.as_bytes();
    let Some(open) = text[..pos]
        .match_indices('<')
        .map(|(i, _)| i)
        .rev()
        .find(|&i| bytes.get(i + 1).is_some_and(u8::is_ascii_alphabetic))
    else {
        return false;
    };

    let mut i = open + 1;
    while i < pos {
        match bytes[i] {
            b'>' => return false,
            quote @ (b'"' | b'\'') => {
                i = text[i + 1..]
                    .find(quote as char)
                    .map_or(bytes.len(), |p| i + p + 2);
            }
            b'{' => i = matching_close(text, i) + 1,
            _ => i += 1,
        }
    }
    true
}

/// End of the script expression starting at `at`: the first top-level `;`,
/// `,` or line break, or an unbalanced closing bracket.
fn expression_end(text: &str, at: usize) -> usize {
    let bytes = text.as_bytes();
    let mut i = at;
    while i < bytes.len() {
        match bytes[i] {
            b';' | b',' | b'\n' | b')' | b']' | b'}' => return i,
            b'(' | b'[' | b'{' => i = matching_close(text, i) + 1,
            b'\'' | b'"' | b'`' => i = read_literal(text, i).map_or(bytes.len(), |lit| lit.end + 1),
            _ => i += 1,
        }
    }
    bytes.len()
}

/// Reads an attribute value starting at `at`: quoted, backslash-quoted (markup
/// inside a script string), a JSX `{...}` expression, or unquoted.
fn read_attr_value(text: &str, at: usize) -> Option<AttrValue> {
    let bytes = text.as_bytes();
    match *bytes.get(at)? {
        b'\\' => {
            let quote = *bytes.get(at + 1)?;
            let close = match quote {
                b'"' => "\\\"",
                b'\'' => "\\'",
                _ => return None,
            };
            let start = at + 2;
            let end = text[start..].find(close).map_or(text.len(), |p| start + p);
            Some(AttrValue { start, end, bound: false })
        }
        quote @ (b'"' | b'\'') => {
            let start = at + 1;
            let end = text[start..]
                .find(quote as char)
                .map_or(text.len(), |p| start + p);
            Some(AttrValue { start, end, bound: false })
        }
        b'{' => Some(AttrValue {
            start: at + 1,
            end: matching_close(text, at),
            bound: true,
        }),
        b'=' | b'`' | b'>' => None,
        _ => {
            let end = text[at..]
                .find(|c: char| c.is_whitespace() || c == '>')
                .map_or(text.len(), |p| at + p);
            Some(AttrValue { start: at, end, bound: false })
        }
    }
}

// ---------------------------------------------------------------------------
// Class lists
// ---------------------------------------------------------------------------

const PLACEHOLDERS: &[(&str, &str)] = &[("{{", "}}"), ("{%", "%}"), ("<%", "%>"), ("<?", "?>")];

/// Template placeholder spans (`${...}`, `{{...}}`, `{%...%}`, `<%...%>`,
/// `<?...?>`) in `value`. Unterminated spans run to the end.
fn placeholder_spans(value: &str) -> Vec<Range<usize>> {
    let mut spans = Vec::new();
    let mut i = 0;

    while i < value.len() {
        let rest = &value[i..];
        if rest.starts_with("${") {
            let end = (matching_close(value, i + 1) + 1).min(value.len());
            spans.push(i..end);
            i = end;
        } else if let Some((_, close)) = PLACEHOLDERS.iter().find(|(open, _)| rest.starts_with(open)) {
            let end = rest[2..]
                .find(close)
                .map_or(value.len(), |p| i + 2 + p + close.len());
            spans.push(i..end);
            i = end;
        } else {
            i += rest.chars().next().map_or(1, char::len_utf8);
        }
    }

    spans
}

/// Replaces `${...}` spans with [`DYNAMIC`] bytes, keeping offsets.
fn mask_placeholders(content: &str) -> String {
    let spans = placeholder_spans(content);
    content
        .char_indices()
        .flat_map(|(i, c)| {
            let dynamic = spans.iter().any(|s| s.contains(&i));
            let (ch, n) = if dynamic { (DYNAMIC, c.len_utf8()) } else { (c, 1) };
            std::iter::repeat(ch).take(n)
        })
        .collect()
}

/// Whitespace separated class names; tokens touching a placeholder are
/// dynamic and skipped, string literals inside placeholders are class lists.
fn static_class_list(value: &str, base: usize, out: &mut Vec<Candidate>) {
    let spans = placeholder_spans(value);
    let bytes = value.as_bytes();
    let mut i = 0;

    while i < bytes.len() {
        if bytes[i].is_ascii_whitespace() {
            i += 1;
            continue;
        }
        let start = i;
        let mut dynamic = false;
        while i < bytes.len() && !bytes[i].is_ascii_whitespace() {
            match spans.iter().find(|s| s.start == i) {
                Some(span) => {
                    dynamic = true;
                    i = span.end;
                }
                None => i += 1,
            }
        }
        if !dynamic {
            push_single(value, start..i, base, SelectorKind::Class, UsageSource::ClassAttribute, out);
        }
    }

    for span in &spans {
        let inner = &value[span.clone()];
        for lit in literals_in(inner) {
            let from = span.start + lit.start;
            static_class_list(&value[from..span.start + lit.end], base + from, out);
        }
    }
}

/// Class lists inside the string literals of a bound expression.
fn bound_class_list(expr: &str, base: usize, out: &mut Vec<Candidate>) {
    for lit in literals_in(expr) {
        static_class_list(&expr[lit.start..lit.end], base + lit.start, out);
    }
}

/// Pushes the name in `text[range]` with surrounding whitespace and quotes
/// stripped. Names containing whitespace or placeholders are dynamic.
fn push_single(
    text: &str,
    range: Range<usize>,
    base: usize,
    kind: SelectorKind,
    source: UsageSource,
    out: &mut Vec<Candidate>,
) {
    let raw = &text[range.clone()];
    let name = raw.trim_matches(|c: char| c.is_whitespace() || matches!(c, '\'' | '"' | '`'));
    if name.is_empty() || name.contains(char::is_whitespace) || !placeholder_spans(name).is_empty() {
        return;
    }
    let lead = raw.len() - raw.trim_start_matches(|c: char| c.is_whitespace() || matches!(c, '\'' | '"' | '`')).len();
    out.push(Candidate {
        offset: base + range.start + lead,
        len: name.len(),
        kind,
        name: name.to_string(),
        source,
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    fn known(classes: &[&str], ids: &[&str]) -> KnownSelectors {
        KnownSelectors {
            classes: classes.iter().map(|s| s.to_string()).collect(),
            ids: ids.iter().map(|s| s.to_string()).collect(),
        }
    }

    fn names(iter: impl Iterator<Item = Candidate>) -> Vec<String> {
        iter.map(|c| c.name).collect()
    }

    #[test]
    fn test_resolution_scenario() {
        let text = r#"<div class="foo bar"></div>"#;
        let result = scan_usages(text, &known(&["foo"], &[]), &UsageOptions::default());

        assert_eq!(result.diagnostics.len(), 1);
        let diag = &result.diagnostics[0];
        assert_eq!(diag.message, "CSS class 'bar' not found");
        assert_eq!(diag.kind, DiagnosticKind::UndefinedClass);
        assert_eq!(&text[diag.offset..diag.end()], "bar");
        assert!(result.used_classes.contains("foo"));
    }

    #[test]
    fn test_placeholders_are_dynamic() {
        let text = r#"<li class="btn {{ active ? 'on' : 'off' }} x-{{y}} <?= $z ?>"></li>"#;
        let got = names(class_attribute_usages(text));
        assert_eq!(got, vec!["btn", "on", "off"]);

        let result = scan_usages(text, &known(&["btn", "on"], &[]), &UsageOptions::default());
        assert_eq!(result.diagnostics.len(), 1);
        assert_eq!(&text[result.diagnostics[0].offset..result.diagnostics[0].end()], "off");
    }

    #[test]
    fn test_framework_bindings() {
        let jsx = r#"<a className={cx('nav', isOpen && "open")} />"#;
        assert_eq!(names(class_attribute_usages(jsx)), vec!["nav", "open"]);

        let vue = r#"<p :class="{ 'is-active': on }" v-bind:class="['a b']"></p>"#;
        assert_eq!(names(class_attribute_usages(vue)), vec!["is-active", "a", "b"]);

        let tpl = "<p class=\"item ${cls} ${ok ? 'done' : ''}\"></p>";
        assert_eq!(names(class_attribute_usages(tpl)), vec!["item", "done"]);
    }

    #[test]
    fn test_comparison_is_not_assignment() {
        assert!(class_attribute_usages(r#"if (el.className == "x") {}"#).next().is_none());
        assert_eq!(names(class_attribute_usages(r#"el.className = "x""#)), vec!["x"]);
    }

    #[test]
    fn test_script_assignments_read_string_literals() {
        let js = "const className = isOpen ? 'open' : 'closed';\nel.className = cls\n";
        let result = scan_usages(js, &known(&["open", "closed"], &[]), &UsageOptions::default());
        assert!(result.diagnostics.is_empty());
        assert!(result.used_classes.contains("open"));
        assert!(result.used_classes.contains("closed"));

        let concat = "el.className = 'card ' + (active ? 'is-active' : '');";
        assert_eq!(names(class_attribute_usages(concat)), vec!["card", "is-active"]);

        assert_eq!(names(class_attribute_usages("<p class=plain></p>")), vec!["plain"]);
    }

    #[test]
    fn test_id_variables_are_not_usages() {
        let k = known(&[], &["hero"]);
        assert!(scan_usages("const id = 'hero';", &k, &UsageOptions::default()).used_ids.is_empty());
        assert!(scan_usages("let id = x; id = 'hero';", &k, &UsageOptions::default()).used_ids.is_empty());

        let prop = scan_usages("banner.id = 'hero';", &k, &UsageOptions::default());
        assert!(prop.used_ids.contains("hero"));
    }

    #[test]
    fn test_id_attributes_resolve_only() {
        let text = r#"<main id="app"></main><p id="ghost"></p>"#;
        let k = known(&[], &["app"]);

        let quiet = scan_usages(text, &k, &UsageOptions::default());
        assert!(quiet.diagnostics.is_empty());
        assert!(quiet.used_ids.contains("app"));

        let loud = scan_usages(
            text,
            &k,
            &UsageOptions {
                report_unknown_id_attributes: true,
                ..UsageOptions::default()
            },
        );
        assert_eq!(loud.diagnostics.len(), 1);
        assert_eq!(loud.diagnostics[0].message, "CSS id 'ghost' not found");
    }

    #[test]
    fn test_dom_api_calls() {
        let js = r#"
el.classList.add('a', "b");
el.classList.toggle('c', flag);
el.classList.replace('d', 'e');
document.querySelector('#main .item > a[href=".x"]');
document.querySelectorAll(`.row-${i} .cell`);
document.getElementById("app");
"#;
        let got = names(candidates(js));
        assert_eq!(got, vec!["a", "b", "c", "d", "e", "main", "item", "cell", "app"]);

        let app = candidates(js).find(|c| c.name == "app").unwrap();
        assert_eq!(app.kind, SelectorKind::Id);
        assert_eq!(&js[app.offset..app.offset + app.len], "app");
        let item = candidates(js).find(|c| c.name == "item").unwrap();
        assert_eq!(&js[item.offset..item.offset + item.len], "item");
    }

    #[test]
    fn test_embedded_markup_deduplicated() {
        let js = r#"el.innerHTML = '<span class=\"badge\" id=\"b1\"></span>';"#;
        let fragments: Vec<_> = embedded_markup(js).collect();
        assert_eq!(fragments.len(), 1);
        assert!(fragments[0].text.starts_with("<span"));

        let result = scan_usages(js, &known(&[], &[]), &UsageOptions::default());
        assert_eq!(result.diagnostics.len(), 1);
        assert_eq!(&js[result.diagnostics[0].offset..result.diagnostics[0].end()], "badge");
    }

    #[test]
    fn test_insert_adjacent_html() {
        let js = r#"list.insertAdjacentHTML('beforeend', `<li class="entry ${x}">`);"#;
        let got: Vec<_> = embedded_markup_usages(js).collect();
        assert_eq!(got.len(), 1);
        assert_eq!(got[0].name, "entry");
        assert_eq!(&js[got[0].offset..got[0].offset + 5], "entry");
    }

    #[test]
    fn test_escaped_declarations_and_shapes() {
        let text = r#"<div class="sm:flex a:b 9col"></div>"#;
        let result = scan_usages(text, &known(&["sm:flex"], &[]), &UsageOptions::default());
        assert!(result.used_classes.contains("sm:flex"));
        assert!(result.diagnostics.is_empty());
    }

    #[test]
    fn test_undefined_checks_disabled_keep_used_sets() {
        let text = r#"<div class="foo bar"></div>"#;
        let options = UsageOptions {
            report_undefined: false,
            ..UsageOptions::default()
        };
        let result = scan_usages(text, &known(&["foo"], &[]), &options);
        assert!(result.diagnostics.is_empty());
        assert!(result.used_classes.contains("foo"));
    }

    #[test]
    fn test_scans_are_restartable() {
        let text = r#"<b class="x y"></b><script>el.classList.add('z')</script>"#;
        assert_eq!(candidates(text).count(), candidates(text).count());
        assert_eq!(candidates(text).count(), 3);
    }
}
