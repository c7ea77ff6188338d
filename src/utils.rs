//! Rendering of model output as Telegram HTML, plus small text helpers.

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref RE_FENCE: Regex = Regex::new(r"```(\w+)?\n?([\s\S]*?)```").expect("valid regex");
    static ref RE_BOLD: Regex = Regex::new(r"\*\*(.+?)\*\*").expect("valid regex");
    static ref RE_INLINE_CODE: Regex = Regex::new(r"`([^`\n]+)`").expect("valid regex");
    static ref RE_BULLET: Regex = Regex::new(r"(?m)^\* ").expect("valid regex");
    static ref RE_MULTI_NEWLINE: Regex = Regex::new(r"\n{3,}").expect("valid regex");
}

fn format_plain(text: &str) -> String {
    let mut out = html_escape::encode_text(text).to_string();
    out = RE_BULLET.replace_all(&out, "• ").to_string();
    out = RE_BOLD.replace_all(&out, "<b>$1</b>").to_string();
    out = RE_INLINE_CODE
        .replace_all(&out, "<code>$1</code>")
        .to_string();
    out
}

/// Convert markdown-ish model output to Telegram HTML.
///
/// Fenced code blocks become `<pre><code>`, the rest is entity-escaped and
/// then gets bold, inline code and bullet markers rewritten.
#[must_use]
pub fn format_text(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut last_end = 0;

    for caps in RE_FENCE.captures_iter(text) {
        let Some(whole) = caps.get(0) else { continue };
        out.push_str(&format_plain(&text[last_end..whole.start()]));

        let lang = caps.get(1).map_or("", |m| m.as_str());
        let code = caps.get(2).map_or("", |m| m.as_str()).trim_end();
        out.push_str(&format!(
            "<pre><code class=\"{}\">{}</code></pre>",
            lang,
            html_escape::encode_text(code)
        ));
        last_end = whole.end();
    }
    out.push_str(&format_plain(&text[last_end..]));

    RE_MULTI_NEWLINE
        .replace_all(&out, "\n\n")
        .trim()
        .to_string()
}

/// Truncate to at most `max_chars` characters without splitting a
/// multi-byte character.
#[must_use]
pub fn truncate_str(s: impl AsRef<str>, max_chars: usize) -> String {
    let s = s.as_ref();
    match s.char_indices().nth(max_chars) {
        Some((pos, _)) => s[..pos].to_string(),
        None => s.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escapes_angle_brackets() {
        assert_eq!(format_text("a < b > c"), "a &lt; b &gt; c");
    }

    #[test]
    fn renders_bold_and_inline_code() {
        assert_eq!(
            format_text("use **cargo** and `rustc`"),
            "use <b>cargo</b> and <code>rustc</code>"
        );
    }

    #[test]
    fn renders_code_fences_with_language() {
        let formatted = format_text("before\n```rust\nlet x = 1;\n```\nafter");
        assert!(formatted.contains("<pre><code class=\"rust\">let x = 1;</code></pre>"));
        assert!(formatted.starts_with("before"));
        assert!(formatted.ends_with("after"));
    }

    #[test]
    fn escapes_html_inside_code_fences() {
        let formatted = format_text("```\nVec<String>\n```");
        assert!(formatted.contains("Vec&lt;String&gt;"));
    }

    #[test]
    fn rewrites_bullets_and_collapses_newlines() {
        let formatted = format_text("* one\n\n\n\n* two");
        assert_eq!(formatted, "• one\n\n• two");
    }

    #[test]
    fn truncate_str_is_utf8_safe() {
        let s = "Привет, мир!";
        assert_eq!(truncate_str(s, 6), "Привет");
        assert_eq!(truncate_str(s, 50), "Привет, мир!");
    }
}
