//! The response shapes the normalizer recognizes.

use super::fields::{get_field, normalize_key};
use fpvtune_core::{parse_gain_key, Axis};
use serde_json::{Map, Value};

/// Keys that hold the per-axis gains object, in normalized form.
pub const PID_CONTAINERS: &[&str] = &[
    "pid",
    "pids",
    "pid_values",
    "pidvalues",
    "pid_settings",
    "pidsettings",
    "pid_gains",
    "optimized_pid",
    "optimized_pids",
    "recommended_pid",
    "recommended_pids",
    "new_pid",
    "pid参数",
    "pid设置",
];

/// Keys models wrap the whole payload in.
pub const WRAPPERS: &[&str] = &[
    "result",
    "results",
    "data",
    "response",
    "output",
    "tuning",
    "recommendation",
    "recommendations",
    "recommended",
    "recommended_settings",
    "optimized",
    "optimized_settings",
    "profile",
    "settings",
    "结果",
    "推荐",
];

const CLI_FIELDS: &[&str] = &["cli_commands", "cli", "cli_command", "commands", "cli命令"];

/// Deepest wrapper nesting that is unwrapped.
const MAX_WRAP_DEPTH: usize = 2;

#[derive(Debug, Clone, PartialEq)]
pub enum ResponseShape<'a> {
    /// `{"roll": {"p": .., "i": ..}, ...}`, under a PID container or at the level itself.
    Canonical(&'a Map<String, Value>),
    /// `{"p_roll": 52, "i_roll": 80, ...}`
    FlatPrefixed(&'a Map<String, Value>),
    /// `{"set p_roll": 52, ...}`
    SetPrefixed(&'a Map<String, Value>),
    /// One of the above under wrapper keys.
    Wrapped {
        path: Vec<&'a str>,
        inner: Box<ResponseShape<'a>>,
    },
    /// A string field of CLI statements.
    CliField(&'a str),
    Unrecognized,
}

impl ResponseShape<'_> {
    pub fn label(&self) -> &'static str {
        match self {
            ResponseShape::Canonical(_) => "canonical",
            ResponseShape::FlatPrefixed(_) => "flat-prefixed",
            ResponseShape::SetPrefixed(_) => "set-prefixed",
            ResponseShape::Wrapped { .. } => "wrapped",
            ResponseShape::CliField(_) => "cli-field",
            ResponseShape::Unrecognized => "unrecognized",
        }
    }
}

/// Classify a parsed response. The first matching shape wins.
pub fn classify(root: &Value) -> ResponseShape<'_> {
    let Some(obj) = root.as_object() else {
        return ResponseShape::Unrecognized;
    };

    if let Some(shape) = classify_level(obj) {
        return shape;
    }
    if let Some(shape) = classify_wrapped(obj, Vec::new()) {
        return shape;
    }
    if let Some(text) = find_cli_field(obj, 0) {
        return ResponseShape::CliField(text);
    }
    ResponseShape::Unrecognized
}

fn classify_level(obj: &Map<String, Value>) -> Option<ResponseShape<'_>> {
    for name in PID_CONTAINERS {
        let Some(container) = get_field(obj, &[name]).and_then(Value::as_object) else {
            continue;
        };
        if has_axis_objects(container) {
            return Some(ResponseShape::Canonical(container));
        }
        if has_flat_keys(container) {
            return Some(ResponseShape::FlatPrefixed(container));
        }
        if has_set_keys(container) {
            return Some(ResponseShape::SetPrefixed(container));
        }
    }

    if has_axis_objects(obj) {
        return Some(ResponseShape::Canonical(obj));
    }
    if has_flat_keys(obj) {
        return Some(ResponseShape::FlatPrefixed(obj));
    }
    if let Some(child) = object_children(obj).find(|(_, child)| has_flat_keys(child)) {
        return Some(ResponseShape::FlatPrefixed(child.1));
    }
    if has_set_keys(obj) {
        return Some(ResponseShape::SetPrefixed(obj));
    }
    object_children(obj)
        .find(|(_, child)| has_set_keys(child))
        .map(|(_, child)| ResponseShape::SetPrefixed(child))
}

fn classify_wrapped<'a>(
    obj: &'a Map<String, Value>,
    path: Vec<&'a str>,
) -> Option<ResponseShape<'a>> {
    if path.len() >= MAX_WRAP_DEPTH {
        return None;
    }
    for (key, child) in wrapper_children(obj) {
        let mut child_path = path.clone();
        child_path.push(key);
        if let Some(inner) = classify_level(child) {
            return Some(ResponseShape::Wrapped {
                path: child_path,
                inner: Box::new(inner),
            });
        }
        if let Some(shape) = classify_wrapped(child, child_path) {
            return Some(shape);
        }
    }
    None
}

/// Object children under wrapper keys. An object with a single object-valued entry is
/// treated as keyed by a profile identifier and unwrapped too.
pub fn wrapper_children(obj: &Map<String, Value>) -> Vec<(&str, &Map<String, Value>)> {
    let mut children: Vec<(&str, &Map<String, Value>)> = WRAPPERS
        .iter()
        .filter_map(|name| {
            obj.iter()
                .find(|(key, value)| normalize_key(key) == *name && value.is_object())
                .and_then(|(key, value)| Some((key.as_str(), value.as_object()?)))
        })
        .collect();

    if children.is_empty() && obj.len() == 1 {
        if let Some((key, Value::Object(inner))) = obj.iter().next() {
            children.push((key.as_str(), inner));
        }
    }
    children
}

fn find_cli_field(obj: &Map<String, Value>, depth: usize) -> Option<&str> {
    if let Some(text) = get_field(obj, CLI_FIELDS).and_then(cli_text) {
        return Some(text);
    }
    if depth >= MAX_WRAP_DEPTH {
        return None;
    }
    wrapper_children(obj)
        .into_iter()
        .find_map(|(_, child)| find_cli_field(child, depth + 1))
}

fn cli_text(value: &Value) -> Option<&str> {
    value
        .as_str()
        .filter(|text| text.to_ascii_lowercase().contains("set "))
}

fn object_children(
    obj: &Map<String, Value>,
) -> impl Iterator<Item = (&String, &Map<String, Value>)> {
    obj.iter()
        .filter_map(|(key, value)| value.as_object().map(|child| (key, child)))
}

/// At least one axis key whose value is an object.
pub fn has_axis_objects(obj: &Map<String, Value>) -> bool {
    obj.iter()
        .any(|(key, value)| value.is_object() && Axis::from_name(key).is_some())
}

fn has_flat_keys(obj: &Map<String, Value>) -> bool {
    obj.keys().any(|key| parse_gain_key(key).is_some())
}

/// Strip a leading `set ` from a key, if present.
pub fn strip_set_prefix(key: &str) -> Option<&str> {
    let trimmed = key.trim();
    let head = trimmed.get(..4)?;
    head.eq_ignore_ascii_case("set ")
        .then(|| trimmed[4..].trim())
}

fn has_set_keys(obj: &Map<String, Value>) -> bool {
    obj.keys().any(|key| {
        strip_set_prefix(key)
            .and_then(parse_gain_key)
            .is_some()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_classify_canonical_under_container() {
        let value = json!({"pid_values": {"roll": {"p": 1}}, "analysis": {}});
        assert_eq!(classify(&value).label(), "canonical");
    }

    #[test]
    fn test_classify_flat_in_child() {
        let value = json!({"new_settings": {"p_roll": 52, "i_roll": 80}});
        assert!(matches!(classify(&value), ResponseShape::FlatPrefixed(_)));
    }

    #[test]
    fn test_classify_set_prefixed() {
        let value = json!({"set p_roll": 52, "set i_roll": 80});
        assert_eq!(classify(&value).label(), "set-prefixed");
    }

    #[test]
    fn test_classify_two_level_wrapper() {
        let value = json!({"result": {"data": {"pid": {"pitch": {"p": 50}}}}});
        match classify(&value) {
            ResponseShape::Wrapped { path, inner } => {
                assert_eq!(path, vec!["result", "data"]);
                assert_eq!(inner.label(), "canonical");
            }
            other => panic!("unexpected shape {:?}", other),
        }
    }

    #[test]
    fn test_classify_profile_id_wrapper() {
        let value = json!({"profile_3": {"p_roll": 40}});
        assert_eq!(classify(&value).label(), "flat-prefixed");
        let value = json!({"profile_3": {"pid": {"roll": {"p": 40}}}});
        assert_eq!(classify(&value).label(), "wrapped");
    }

    #[test]
    fn test_classify_three_level_wrapper_is_not_unwrapped() {
        let value = json!({"result": {"data": {"output": {"pid": {"roll": {"p": 50}}}}}});
        assert_eq!(classify(&value).label(), "unrecognized");
    }

    #[test]
    fn test_classify_cli_field() {
        let value = json!({"summary": "ok", "cli_commands": "set p_roll = 52\nsave"});
        assert_eq!(
            classify(&value),
            ResponseShape::CliField("set p_roll = 52\nsave")
        );
    }

    #[test]
    fn test_classify_non_object_is_unrecognized() {
        assert_eq!(classify(&json!([1, 2])).label(), "unrecognized");
    }
}
