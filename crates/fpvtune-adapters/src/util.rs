/// Cut `text` to at most `max_bytes`, backing off to the previous char boundary.
pub fn clamp_input(text: &str, max_bytes: usize) -> &str {
    if text.len() <= max_bytes {
        return text;
    }
    let mut end = max_bytes;
    while end > 0 && !text.is_char_boundary(end) {
        end -= 1;
    }
    &text[..end]
}

/// Shorten `s` to `max` chars for a table column, marking the cut with `...`.
pub fn truncate(s: &str, max: usize) -> String {
    if max == 0 {
        return String::new();
    }

    let char_count = s.chars().count();
    if char_count <= max {
        return s.to_string();
    }

    if max <= 3 {
        return s.chars().take(max).collect();
    }

    let truncated: String = s.chars().take(max - 3).collect();
    format!("{}...", truncated)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clamp_input_respects_char_boundaries() {
        let text = "P值提高";
        // 'P' is one byte, each CJK char three.
        assert_eq!(clamp_input(text, 3), "P");
        assert_eq!(clamp_input(text, 4), "P值");
        assert_eq!(clamp_input(text, 100), text);
        assert_eq!(clamp_input(text, 0), "");
    }

    #[test]
    fn test_truncate_replay_error_detail() {
        let detail = "Failed to read capture 'captures/7in_racing.md' for case '7in-racing'";
        assert_eq!(truncate(detail, 24), "Failed to read captur...");
        assert_eq!(truncate(detail, 200), detail);
    }

    #[test]
    fn test_truncate_counts_chars_not_bytes() {
        let detail = "横滚轴P值过高";
        assert_eq!(truncate(detail, 6), "横滚轴...");
        assert_eq!(truncate(detail, 3), "横滚轴");
        assert_eq!(truncate(detail, 0), "");
    }
}
