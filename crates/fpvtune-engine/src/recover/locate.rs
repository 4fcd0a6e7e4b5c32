use regex::Regex;
use std::borrow::Cow;
use std::sync::OnceLock;

/// The first `{...}` span found in a response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JsonCandidate<'a> {
    pub text: &'a str,
    /// No matching `}` before end of input.
    pub truncated: bool,
}

fn think_block_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?is)\A<think(?:ing)?>.*?</think(?:ing)?>")
            .expect("think block regex should compile")
    })
}

/// Remove `<think>...</think>` reasoning blocks some models prepend to their answer.
///
/// A block quoted inside a JSON string literal is content and stays.
pub fn strip_side_channel(text: &str) -> Cow<'_, str> {
    if !text.contains('<') {
        return Cow::Borrowed(text);
    }

    let mut out = String::with_capacity(text.len());
    let mut kept_from = 0;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escape_next = false;

    for (idx, c) in text.char_indices() {
        if idx < kept_from {
            continue;
        }

        if in_string {
            if escape_next {
                escape_next = false;
            } else if c == '\\' {
                escape_next = true;
            } else if c == '"' {
                in_string = false;
            }
            continue;
        }

        match c {
            '<' => {
                if let Some(block) = think_block_re().find(&text[idx..]) {
                    out.push_str(&text[kept_from..idx]);
                    kept_from = idx + block.end();
                }
            }
            // Quotes only open strings inside an object; prose quotes are ignored.
            '"' if depth > 0 => in_string = true,
            '{' => depth += 1,
            '}' => depth = depth.saturating_sub(1),
            _ => {}
        }
    }

    if kept_from == 0 {
        return Cow::Borrowed(text);
    }
    out.push_str(&text[kept_from..]);
    Cow::Owned(out)
}

/// Find the first balanced JSON object. Braces inside string literals are ignored
/// and a backslash inside a string escapes the next character.
///
/// When the object never closes, the candidate runs to the end of the input and is
/// flagged as truncated.
pub fn locate_json_object(text: &str) -> Option<JsonCandidate<'_>> {
    let start = text.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escape_next = false;

    for (offset, c) in text[start..].char_indices() {
        if escape_next {
            escape_next = false;
            continue;
        }

        if in_string {
            match c {
                '\\' => escape_next = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }

        match c {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    let end = start + offset + c.len_utf8();
                    return Some(JsonCandidate {
                        text: &text[start..end],
                        truncated: false,
                    });
                }
            }
            _ => {}
        }
    }

    Some(JsonCandidate {
        text: &text[start..],
        truncated: true,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_locates_object_inside_prose() {
        let text = "Here is the tune:\n{\"pid\": {\"roll\": {\"p\": 52}}}\nFly safe!";
        let candidate = locate_json_object(text).unwrap();
        assert_eq!(candidate.text, "{\"pid\": {\"roll\": {\"p\": 52}}}");
        assert!(!candidate.truncated);
    }

    #[test]
    fn test_ignores_braces_inside_strings() {
        let text = r#"{"summary": "use {braces} and \"quotes\" }", "n": 1} trailing }"#;
        let candidate = locate_json_object(text).unwrap();
        assert_eq!(
            candidate.text,
            r#"{"summary": "use {braces} and \"quotes\" }", "n": 1}"#
        );
    }

    #[test]
    fn test_escaped_backslash_before_quote_closes_string() {
        let text = r#"{"path": "C:\\", "n": {"x": 1}}"#;
        let candidate = locate_json_object(text).unwrap();
        assert_eq!(candidate.text, text);
        assert!(!candidate.truncated);
    }

    #[test]
    fn test_unclosed_object_is_truncated() {
        let text = "prefix {\"pid\":{\"roll\":{\"p\":52";
        let candidate = locate_json_object(text).unwrap();
        assert_eq!(candidate.text, "{\"pid\":{\"roll\":{\"p\":52");
        assert!(candidate.truncated);
    }

    #[test]
    fn test_no_brace_yields_none() {
        assert!(locate_json_object("Roll: P=52, I=80").is_none());
        assert!(locate_json_object("").is_none());
    }

    #[test]
    fn test_strip_side_channel_removes_reasoning() {
        let text = "<think>maybe {\"p\": 1}</think>{\"p\": 2}";
        assert_eq!(strip_side_channel(text), "{\"p\": 2}");
    }

    #[test]
    fn test_strip_side_channel_keeps_quoted_tags() {
        let text = r#"{"summary": "model said <think>hmm</think> then stopped"}"#;
        assert_eq!(strip_side_channel(text), text);

        let text = r#"<thinking>"{"</thinking>{"notes": ["<think>x</think>"], "n": {"m": 1}} <think>tail</think>"#;
        assert_eq!(
            strip_side_channel(text),
            r#"{"notes": ["<think>x</think>"], "n": {"m": 1}} "#
        );
    }
}
