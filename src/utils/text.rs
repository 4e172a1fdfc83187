//! Character-aware text helpers.
//!
//! Replies and transcripts are mostly CJK, so every limit here counts `char`s,
//! never bytes.

/// Truncate `text` to at most `max_chars` characters, appending `...` when cut.
///
/// The ellipsis counts toward the limit, so the result never exceeds `max_chars`.
pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    if max_chars <= 3 {
        return text.chars().take(max_chars).collect();
    }
    let mut out: String = text.chars().take(max_chars - 3).collect();
    out.push_str("...");
    out
}

/// Whether the text contains anything a synthesizer can pronounce
pub fn is_speakable(text: &str) -> bool {
    text.chars().any(char::is_alphanumeric)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_short_text_unchanged() {
        assert_eq!(truncate_chars("hello", 10), "hello");
        assert_eq!(truncate_chars("你好", 2), "你好");
    }

    #[test]
    fn test_truncate_counts_chars_not_bytes() {
        let text = "今天天气不错我们出去走走吧";
        let cut = truncate_chars(text, 8);
        assert_eq!(cut.chars().count(), 8);
        assert_eq!(cut, "今天天气不...");
    }

    #[test]
    fn test_truncate_tiny_limit() {
        assert_eq!(truncate_chars("abcdef", 2), "ab");
        assert_eq!(truncate_chars("abcdef", 0), "");
    }

    #[test]
    fn test_is_speakable() {
        assert!(is_speakable("你好，"));
        assert!(is_speakable("ok."));
        assert!(!is_speakable("。"));
        assert!(!is_speakable("... \n"));
        assert!(!is_speakable(""));
    }
}
