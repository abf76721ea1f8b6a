//! Markdown to plain text conversion for note summaries.

use once_cell::sync::Lazy;
use regex::Regex;

use conspectium_core::defaults;

static CODE_FENCE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)```.*?```").expect("valid code fence regex"));
static INLINE_CODE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"`([^`]*)`").expect("valid inline code regex"));
static IMAGE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"!\[[^\]]*\]\([^)]+\)").expect("valid image regex"));
static LINK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\[([^\]]+)\]\([^)]+\)").expect("valid link regex"));
static HEADING: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^[ \t]*#+[ \t]*").expect("valid heading regex"));
static BLOCKQUOTE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^[ \t]*(?:>[ \t]?)+").expect("valid blockquote regex"));
static EMPHASIS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[*_~`]").expect("valid emphasis regex"));
static BULLET: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^[ \t]*[-+][ \t]+").expect("valid bullet regex"));
static ORDERED: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^[ \t]*\d+[.)][ \t]+").expect("valid ordered list regex"));
static WHITESPACE_RUN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s{2,}").expect("valid whitespace regex"));

/// Strip Markdown syntax and truncate to the default summary length.
pub fn strip_markdown(text: &str) -> String {
    strip_markdown_with_limit(text, defaults::SUMMARY_MAX_LENGTH)
}

/// Strip Markdown syntax (code fences, inline code, images, links, headings,
/// blockquotes, emphasis, list markers) and collapse whitespace.
///
/// When the result is longer than `max_length` characters it is cut at the
/// last word boundary and suffixed with `…`. A `max_length` of zero disables
/// truncation.
pub fn strip_markdown_with_limit(text: &str, max_length: usize) -> String {
    if text.trim().is_empty() {
        return String::new();
    }

    let cleaned = CODE_FENCE.replace_all(text, "");
    let cleaned = INLINE_CODE.replace_all(&cleaned, "$1");
    let cleaned = IMAGE.replace_all(&cleaned, "");
    let cleaned = LINK.replace_all(&cleaned, "$1");
    let cleaned = HEADING.replace_all(&cleaned, "");
    let cleaned = BLOCKQUOTE.replace_all(&cleaned, "");
    let cleaned = EMPHASIS.replace_all(&cleaned, "");
    let cleaned = BULLET.replace_all(&cleaned, "");
    let cleaned = ORDERED.replace_all(&cleaned, "");
    let cleaned = WHITESPACE_RUN.replace_all(&cleaned, " ");
    let cleaned = cleaned.trim();

    if max_length == 0 || cleaned.chars().count() <= max_length {
        return cleaned.to_string();
    }

    let head: String = cleaned.chars().take(max_length).collect();
    let truncated = match head.rfind(' ') {
        Some(idx) => head[..idx].trim_end(),
        None => head.trim_end(),
    };
    format!("{truncated}…")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strips_headings_lists_emphasis_and_quotes() {
        let plain = strip_markdown("# T\n\n- **A** one\n- B *two*\n> C");
        assert!(plain.contains('T'));
        assert!(plain.contains("A one"));
        assert!(plain.contains("B two"));
        assert!(plain.contains('C'));
        assert!(!plain.contains('#'));
        assert!(!plain.contains('*'));
        assert!(!plain.contains('>'));
    }

    #[test]
    fn test_links_keep_text_images_dropped() {
        let plain = strip_markdown("См. [документацию](https://example.com) ![схема](img.png)");
        assert_eq!(plain, "См. документацию");
    }

    #[test]
    fn test_code_fences_removed_inline_code_unwrapped() {
        let plain = strip_markdown("Before\n```rust\nfn main() {}\n```\nuse `cargo` here");
        assert!(!plain.contains("fn main"));
        assert!(plain.contains("use cargo here"));
    }

    #[test]
    fn test_ordered_list_markers_removed() {
        let plain = strip_markdown("1. First\n2) Second");
        assert_eq!(plain, "First\nSecond");
    }

    #[test]
    fn test_truncates_at_word_boundary_with_ellipsis() {
        let plain = strip_markdown_with_limit("alpha beta gamma delta", 13);
        assert_eq!(plain, "alpha beta…");
    }

    #[test]
    fn test_truncation_counts_characters_not_bytes() {
        let text = "слово ".repeat(100);
        let plain = strip_markdown_with_limit(&text, 20);
        assert!(plain.ends_with('…'));
        assert!(plain.chars().count() <= 21);
    }

    #[test]
    fn test_zero_limit_disables_truncation() {
        let text = "word ".repeat(200);
        assert!(!strip_markdown_with_limit(&text, 0).ends_with('…'));
    }

    #[test]
    fn test_blank_input() {
        assert_eq!(strip_markdown("  \n "), "");
    }
}
