//! Lookup and coercion helpers over loosely-typed JSON values.

use regex::Regex;
use serde_json::{Map, Value};
use std::sync::OnceLock;

/// Lowercase a key and fold spaces and dashes to underscores so `Issues Found`,
/// `issues-found` and `issues_found` compare equal.
pub fn normalize_key(key: &str) -> String {
    key.trim()
        .chars()
        .map(|c| match c {
            ' ' | '-' => '_',
            other => other.to_ascii_lowercase(),
        })
        .collect()
}

/// First field whose normalized key is in `names`, trying names in order.
pub fn get_field<'a>(obj: &'a Map<String, Value>, names: &[&str]) -> Option<&'a Value> {
    names.iter().find_map(|name| {
        obj.iter()
            .find(|(key, _)| normalize_key(key) == *name)
            .map(|(_, value)| value)
    })
}

pub fn get_object<'a>(
    obj: &'a Map<String, Value>,
    names: &[&str],
) -> Option<&'a Map<String, Value>> {
    names.iter().find_map(|name| {
        obj.iter()
            .find(|(key, value)| normalize_key(key) == *name && value.is_object())
            .and_then(|(_, value)| value.as_object())
    })
}

fn numeric_text_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)^\+?(\d+(?:\.\d+)?)\s*(?:hz|%)?$").expect("numeric text regex should compile")
    })
}

fn arrow_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"→|->|=>|➜").expect("arrow regex should compile"))
}

/// Parse a number written as text: `52`, `+52`, `250 Hz`, or `45 -> 52` (the value
/// after the arrow wins).
pub fn parse_number_text(text: &str) -> Option<f64> {
    let text = arrow_re().split(text).last().unwrap_or(text).trim();
    let caps = numeric_text_re().captures(text)?;
    caps.get(1)?.as_str().parse::<f64>().ok()
}

/// Numbers and numeric strings. Booleans, nulls and containers are not numbers.
pub fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64().filter(|v| v.is_finite()),
        Value::String(s) => parse_number_text(s),
        _ => None,
    }
}

/// A narrative entry: a plain string, or a `{title, description}` pair joined with `": "`.
pub fn as_entry_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => {
            let trimmed = s.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        }
        Value::Object(obj) => {
            let title = get_field(obj, &["title", "name", "issue", "标题", "问题"])
                .and_then(Value::as_str)
                .map(str::trim)
                .filter(|s| !s.is_empty());
            let body = get_field(
                obj,
                &["description", "detail", "details", "text", "reason", "描述", "说明"],
            )
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty());
            match (title, body) {
                (Some(title), Some(body)) => Some(format!("{}: {}", title, body)),
                (Some(only), None) | (None, Some(only)) => Some(only.to_string()),
                (None, None) => None,
            }
        }
        _ => None,
    }
}

/// Entries of a narrative list field. A lone string counts as a one-entry list.
pub fn as_entry_list(value: &Value) -> Vec<String> {
    match value {
        Value::Array(items) => items.iter().filter_map(as_entry_text).collect(),
        other => as_entry_text(other).into_iter().collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_get_field_ignores_case_and_separators() {
        let obj = json!({"Issues Found": ["a"], "summary": "s"});
        let obj = obj.as_object().unwrap();
        assert_eq!(get_field(obj, &["issues_found"]), Some(&json!(["a"])));
        assert!(get_field(obj, &["issues"]).is_none());
    }

    #[test]
    fn test_as_number_accepts_numeric_strings_only() {
        assert_eq!(as_number(&json!(52)), Some(52.0));
        assert_eq!(as_number(&json!("+52")), Some(52.0));
        assert_eq!(as_number(&json!("250 Hz")), Some(250.0));
        assert_eq!(as_number(&json!("45 -> 52")), Some(52.0));
        assert_eq!(as_number(&json!(true)), None);
        assert_eq!(as_number(&json!("high")), None);
        assert_eq!(as_number(&json!(null)), None);
    }

    #[test]
    fn test_entry_text_joins_title_and_description() {
        let entry = json!({"title": "Prop wash", "description": "Raise D slightly"});
        assert_eq!(
            as_entry_text(&entry).as_deref(),
            Some("Prop wash: Raise D slightly")
        );
        assert_eq!(as_entry_list(&json!("single")), vec!["single".to_string()]);
    }
}
