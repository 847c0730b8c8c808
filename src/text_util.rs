/// Maximum number of characters in a result preview before truncation.
pub const DEFAULT_PREVIEW_CHARS: usize = 240;

const ELLIPSIS: &str = "...";

/// Split text into lowercase tokens.
///
/// A token is a maximal run of ASCII letters, digits, or underscores.
/// Everything else separates tokens and is discarded.
///
/// # Examples
///
/// ```
/// use arxiv_brain::text_util::tokenize;
///
/// assert_eq!(tokenize("Hello, World! v2.0"), vec!["hello", "world", "v2", "0"]);
/// assert!(tokenize("").is_empty());
/// ```
pub fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
        .filter(|token| !token.is_empty())
        .map(str::to_ascii_lowercase)
        .collect()
}

/// Collapse whitespace runs to single spaces and cap the result at `limit`
/// characters, ending truncated previews with `...`.
pub fn format_preview(text: &str, limit: usize) -> String {
    let compact = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if compact.chars().count() <= limit {
        return compact;
    }

    let keep = limit.saturating_sub(ELLIPSIS.len());
    let mut preview: String = compact.chars().take(keep).collect();
    preview.push_str(ELLIPSIS);
    preview
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokenize_splits_on_punctuation() {
        assert_eq!(
            tokenize("Hello, World! v2.0"),
            vec!["hello", "world", "v2", "0"]
        );
    }

    #[test]
    fn tokenize_keeps_underscores() {
        assert_eq!(tokenize("def load_model():"), vec!["def", "load_model"]);
    }

    #[test]
    fn tokenize_drops_non_ascii() {
        assert_eq!(tokenize("café naïve"), vec!["caf", "na", "ve"]);
    }

    #[test]
    fn tokenize_punctuation_only() {
        assert!(tokenize("?!... --- ***").is_empty());
    }

    #[test]
    fn preview_collapses_whitespace() {
        assert_eq!(
            format_preview("line one\n\n  line\ttwo  ", 240),
            "line one line two"
        );
    }

    #[test]
    fn preview_short_text_untouched() {
        assert_eq!(format_preview("short", 10), "short");
    }

    #[test]
    fn preview_exact_limit_untouched() {
        let text = "a".repeat(20);
        assert_eq!(format_preview(&text, 20), text);
    }

    #[test]
    fn preview_truncates_with_ellipsis() {
        let text = "word ".repeat(100);
        let preview = format_preview(&text, DEFAULT_PREVIEW_CHARS);
        assert_eq!(preview.chars().count(), DEFAULT_PREVIEW_CHARS);
        assert!(preview.ends_with("..."));
    }

    #[test]
    fn preview_counts_chars_not_bytes() {
        let text = "é".repeat(30);
        let preview = format_preview(&text, 10);
        assert_eq!(preview, format!("{}...", "é".repeat(7)));
    }
}
