//! Markup helpers: embedded `<style>` blocks and stylesheet `<link>` tags.
//!
//! Regex based and tolerant of invalid HTML, like the rest of the scanners.

use std::sync::OnceLock;

use regex::Regex;

/// Inner text of one `<style>` element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StyleBlock<'a> {
    /// Offset of the first byte after the opening tag.
    pub start: usize,
    pub text: &'a str,
}

fn style_block_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?is)<style\b[^>]*>(.*?)(?:</style\s*>|\z)").expect("style block regex is valid")
    })
}

fn link_tag_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?is)<link\b[^>]*>").expect("link tag regex is valid"))
}

fn tag_attr_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"(?is)\b([a-z][a-z0-9_:-]*)\s*=\s*(?:"([^"]*)"|'([^']*)'|([^\s"'=<>`]+))"#)
            .expect("attribute regex is valid")
    })
}

/// Every `<style>...</style>` body; an unclosed block runs to the end.
pub fn extract_style_blocks(html: &str) -> Vec<StyleBlock<'_>> {
    style_block_re()
        .captures_iter(html)
        .filter_map(|caps| caps.get(1))
        .map(|m| StyleBlock {
            start: m.start(),
            text: m.as_str(),
        })
        .collect()
}

/// `href` values of `<link rel="stylesheet">` tags, in document order.
pub fn find_stylesheet_links(html: &str) -> Vec<String> {
    let mut links = Vec::new();

    for tag in link_tag_re().find_iter(html) {
        let mut is_stylesheet = false;
        let mut href = None;

        for caps in tag_attr_re().captures_iter(tag.as_str()) {
            let (Some(name), Some(value)) = (
                caps.get(1),
                caps.get(2).or_else(|| caps.get(3)).or_else(|| caps.get(4)),
            ) else {
                continue;
            };
            match name.as_str().to_ascii_lowercase().as_str() {
                "rel" => {
                    is_stylesheet = value
                        .as_str()
                        .split_whitespace()
                        .any(|r| r.eq_ignore_ascii_case("stylesheet"));
                }
                "href" => href = Some(value.as_str().trim().to_string()),
                _ => {}
            }
        }

        if let (true, Some(href)) = (is_stylesheet, href) {
            if !href.is_empty() {
                links.push(href);
            }
        }
    }

    links
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_style_blocks() {
        let html = "<head><style>.a{}</style><STYLE media=\"print\">\n.b{}\n</STYLE></head>";
        let blocks = extract_style_blocks(html);
        assert_eq!(blocks.len(), 2);
        assert_eq!(blocks[0].text, ".a{}");
        assert_eq!(&html[blocks[0].start..blocks[0].start + 4], ".a{}");
        assert_eq!(blocks[1].text, "\n.b{}\n");
    }

    #[test]
    fn test_unclosed_style_block() {
        let blocks = extract_style_blocks("<style>.a{}");
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].text, ".a{}");
    }

    #[test]
    fn test_stylesheet_links() {
        let html = r#"
<link rel="stylesheet" href="css/site.css">
<link href='https://cdn.example.com/x.css' rel='preload stylesheet'>
<link rel="icon" href="favicon.ico">
<link rel=stylesheet href=/root.css>
"#;
        assert_eq!(
            find_stylesheet_links(html),
            vec!["css/site.css", "https://cdn.example.com/x.css", "/root.css"]
        );
    }
}
