//! HTML helpers: escaping, plain-text projection, and rendering of generated
//! prose into sanitized section HTML.

use pulldown_cmark::{html, Options, Parser};
use regex::Regex;
use std::sync::OnceLock;

// ============================================================================
// Escaping
// ============================================================================

/// Escape a string for use as a text node. Quotes are left alone so formatted
/// citations keep their quotation marks verbatim.
pub fn escape_text(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

fn decode_entities(s: &str) -> String {
    s.replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&#x27;", "'")
        .replace("&amp;", "&")
}

// ============================================================================
// Plain-Text Projection
// ============================================================================

fn block_break_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)<br\s*/?>|</(?:p|div|li|h[1-6]|tr|td|th|blockquote)>|<hr[^>]*>")
            .unwrap()
    })
}

fn tag_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"<[^>]*>").unwrap())
}

/// Text a reader would see: tags removed, line-breaking elements turned into
/// newlines, common entities decoded.
pub fn plain_text(html: &str) -> String {
    let broken = block_break_re().replace_all(html, "\n");
    let stripped = tag_re().replace_all(&broken, "");
    let decoded = decode_entities(&stripped);
    decoded.trim_end().to_string()
}

// ============================================================================
// Generated Content
// ============================================================================

fn looks_like_html(text: &str) -> bool {
    let lower = text.trim_start().to_lowercase();
    ["<p", "<div", "<h1", "<h2", "<h3", "<ul", "<ol", "<table"]
        .iter()
        .any(|t| lower.starts_with(t))
}

/// Turn model output into section HTML. Prose is rendered paragraph by
/// paragraph; HTML is passed through. Either way the result is sanitized.
pub fn render_generated(text: &str) -> String {
    let text = text.trim();
    if text.is_empty() {
        return String::new();
    }

    let raw = if looks_like_html(text) {
        text.to_string()
    } else {
        let parser = Parser::new_ext(text, Options::ENABLE_TABLES);
        let mut out = String::new();
        html::push_html(&mut out, parser);
        out
    };

    ammonia::clean(&raw).trim().to_string()
}

/// Wrap each blank-line separated paragraph of plain text in `<p>`.
pub fn paragraphs_to_html(text: &str) -> String {
    text.split("\n\n")
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(|p| format!("<p>{}</p>", escape_text(p).replace('\n', "<br>")))
        .collect::<Vec<_>>()
        .join("")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_text_keeps_quotes() {
        assert_eq!(escape_text(r#"A & B "C" <d>"#), r#"A &amp; B "C" &lt;d&gt;"#);
    }

    #[test]
    fn test_plain_text_strips_tags_and_breaks_blocks() {
        let html = "<p>one <b>two</b></p><p>three&nbsp;four</p>";
        assert_eq!(plain_text(html), "one two\nthree four");
    }

    #[test]
    fn test_plain_text_br_and_entities() {
        assert_eq!(plain_text("a<br>b &amp; c"), "a\nb & c");
        assert_eq!(plain_text(""), "");
    }

    #[test]
    fn test_render_generated_paragraphs() {
        let html = render_generated("First paragraph.\n\nSecond paragraph.");
        assert!(html.starts_with("<p>First paragraph.</p>"));
        assert!(html.ends_with("<p>Second paragraph.</p>"));
    }

    #[test]
    fn test_render_generated_sanitizes_html() {
        let html = render_generated("<p>Safe</p><script>alert(1)</script>");
        assert!(html.contains("<p>Safe</p>"));
        assert!(!html.contains("script"));
    }

    #[test]
    fn test_paragraphs_to_html() {
        assert_eq!(
            paragraphs_to_html("Intro line\nsecond\n\n  Next <part>  "),
            "<p>Intro line<br>second</p><p>Next &lt;part&gt;</p>"
        );
        assert_eq!(paragraphs_to_html("   "), "");
    }
}
