//! Depth-capped breadth-first search for parameter-shaped objects anywhere in a
//! parsed response.

use super::fields::as_number;
use fpvtune_core::{Axis, FilterKey, Gain, SettingKey};
use serde_json::{Map, Value};
use std::collections::VecDeque;

/// The shallowest object matching `signature`, visiting at most `max_depth` levels
/// below the root.
fn breadth_first<'a>(
    root: &'a Value,
    max_depth: usize,
    signature: impl Fn(&Map<String, Value>) -> bool,
) -> Option<&'a Map<String, Value>> {
    let mut queue: VecDeque<(&'a Value, usize)> = VecDeque::new();
    queue.push_back((root, 0));

    while let Some((value, depth)) = queue.pop_front() {
        if let Value::Object(obj) = value {
            if signature(obj) {
                return Some(obj);
            }
        }
        if depth >= max_depth {
            continue;
        }
        match value {
            Value::Object(obj) => queue.extend(obj.values().map(|child| (child, depth + 1))),
            Value::Array(items) => queue.extend(items.iter().map(|child| (child, depth + 1))),
            _ => {}
        }
    }
    None
}

/// All three axes present, each an object with a numeric `p`.
fn is_pid_object(obj: &Map<String, Value>) -> bool {
    Axis::ALL.iter().all(|axis| {
        obj.iter().any(|(key, value)| {
            Axis::from_name(key) == Some(*axis)
                && value.as_object().is_some_and(|gains| {
                    gains.iter().any(|(gain_key, gain_value)| {
                        Gain::from_name(gain_key) == Some(Gain::P) && as_number(gain_value).is_some()
                    })
                })
        })
    })
}

/// At least one filter key distinctive enough to identify a filter group.
fn is_filter_object(obj: &Map<String, Value>) -> bool {
    obj.keys().any(|key| {
        FilterKey::from_name(key).is_some_and(|filter| filter.is_distinguishing())
    })
}

pub fn find_pid_object(root: &Value, max_depth: usize) -> Option<&Map<String, Value>> {
    breadth_first(root, max_depth, is_pid_object)
}

pub fn find_filter_object(root: &Value, max_depth: usize) -> Option<&Map<String, Value>> {
    breadth_first(root, max_depth, is_filter_object)
}
