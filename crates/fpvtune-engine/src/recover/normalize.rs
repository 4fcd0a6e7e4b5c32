//! Map recognized response shapes onto the canonical schema.

use super::fallback;
use super::fields::{as_entry_list, as_entry_text, as_number, get_field, get_object};
use super::narrative::{NarrativeDraft, Note, NoteKind};
use super::shapes::{classify, strip_set_prefix, wrapper_children, ResponseShape};
use fpvtune_core::{
    parse_gain_key, Axis, FilterMap, Gain, MiscMap, PartialParameterSet, SettingKey, SettingMap,
};
use serde_json::{Map, Value};

const FILTER_CONTAINERS: &[&str] = &[
    "filters",
    "filter_settings",
    "filter",
    "filter_config",
    "filtering",
    "滤波器",
    "滤波设置",
    "滤波",
];

const MISC_CONTAINERS: &[&str] = &[
    "other",
    "others",
    "misc",
    "advanced",
    "other_settings",
    "advanced_settings",
    "misc_settings",
    "其他",
    "其他设置",
    "高级设置",
];

const ANALYSIS_CONTAINERS: &[&str] = &["analysis", "analysis_result", "分析", "分析结果", "诊断"];
const SUMMARY_KEYS: &[&str] = &["summary", "overview", "总结", "摘要", "分析摘要", "概述"];
const ISSUE_KEYS: &[&str] = &[
    "issues",
    "issues_found",
    "problems",
    "identified_issues",
    "发现的问题",
    "问题",
    "问题发现",
    "主要问题",
];
const RECOMMENDATION_KEYS: &[&str] = &[
    "recommendations",
    "suggestions",
    "建议",
    "优化建议",
    "改进建议",
];
const NOTE_KEYS: &[&str] = &[
    "notes",
    "additional_notes",
    "comments",
    "tips",
    "备注",
    "注意事项",
];

/// Fields of a per-gain object that carry the value to apply.
const TARGET_VALUE_KEYS: &[&str] = &["recommended", "new", "suggested", "after", "to", "value"];

/// Everything the normalizer could read from one parsed response.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Normalized {
    pub shape: &'static str,
    pub gains: PartialParameterSet,
    pub filters: FilterMap,
    pub misc: MiscMap,
    pub narrative: NarrativeDraft,
    /// CLI statements found in a `cli_commands` style field.
    pub statements: Vec<String>,
}

pub fn normalize(root: &Value) -> Normalized {
    let shape = classify(root);
    let mut out = Normalized {
        shape: shape.label(),
        ..Default::default()
    };
    read_shape(&shape, &mut out);

    let levels = levels(root);
    read_setting_groups(&levels, &mut out);
    out.narrative = read_narrative(&levels);
    out
}

fn read_shape(shape: &ResponseShape<'_>, out: &mut Normalized) {
    match shape {
        ResponseShape::Canonical(container) => out.gains = read_axis_objects(container),
        ResponseShape::FlatPrefixed(map) => read_flat_keys(map, false, out),
        ResponseShape::SetPrefixed(map) => read_flat_keys(map, true, out),
        ResponseShape::Wrapped { inner, .. } => read_shape(inner, out),
        ResponseShape::CliField(text) => {
            let scanned = fallback::scan_cli_text(text);
            out.gains = scanned.gains;
            out.filters = scanned.filters;
            out.misc = scanned.misc;
            out.statements = scanned.statements;
        }
        ResponseShape::Unrecognized => {}
    }
}

/// Read `{"roll": {"p": .., "i": .., "d": .., "f": ..}, ...}`.
pub fn read_axis_objects(container: &Map<String, Value>) -> PartialParameterSet {
    let mut gains = PartialParameterSet::default();
    for (key, value) in container {
        let (Some(axis), Some(fields)) = (Axis::from_name(key), value.as_object()) else {
            continue;
        };
        let target = gains.axis_mut(axis);
        for (gain_key, gain_value) in fields {
            let Some(gain) = Gain::from_name(gain_key) else {
                continue;
            };
            if let Some(number) = gain_number(gain_value) {
                target.set(gain, number);
            }
        }
    }
    gains
}

/// A gain is a number, a numeric string, or an object such as
/// `{"current": 45, "recommended": 52}`.
fn gain_number(value: &Value) -> Option<f64> {
    match value {
        Value::Object(obj) => get_field(obj, TARGET_VALUE_KEYS).and_then(as_number),
        other => as_number(other),
    }
}

fn read_flat_keys(map: &Map<String, Value>, set_prefixed: bool, out: &mut Normalized) {
    for (raw_key, value) in map {
        let key = if set_prefixed {
            match strip_set_prefix(raw_key) {
                Some(key) => key,
                None => continue,
            }
        } else {
            raw_key.as_str()
        };
        let Some(number) = as_number(value) else {
            continue;
        };
        if let Some((gain, axis)) = parse_gain_key(key) {
            out.gains.axis_mut(axis).set(gain, number);
        } else if !out.filters.set_by_name(key, number) {
            out.misc.set_by_name(key, number);
        }
    }
}

/// The root plus objects reachable through wrapper keys, shallowest first.
fn levels(root: &Value) -> Vec<&Map<String, Value>> {
    let Some(obj) = root.as_object() else {
        return Vec::new();
    };
    let mut levels = vec![obj];
    let mut frontier = vec![obj];
    for _ in 0..2 {
        let next: Vec<&Map<String, Value>> = frontier
            .iter()
            .flat_map(|level| wrapper_children(*level))
            .map(|(_, child)| child)
            .collect();
        levels.extend(next.iter().copied());
        frontier = next;
    }
    levels
}

/// Known setting keys of one object; everything else is ignored.
pub fn read_settings<K: SettingKey>(obj: &Map<String, Value>) -> SettingMap<K> {
    let mut found = SettingMap::new();
    read_known_keys(obj, &mut found);
    found
}

fn read_known_keys<K: SettingKey>(obj: &Map<String, Value>, into: &mut SettingMap<K>) {
    for (key, value) in obj {
        if let Some(number) = as_number(value) {
            into.set_by_name(key, number);
        }
    }
}

fn read_group<K: SettingKey>(
    levels: &[&Map<String, Value>],
    containers: &[&str],
) -> SettingMap<K> {
    let mut found = SettingMap::new();
    for level in levels {
        if let Some(container) = get_object(level, containers) {
            read_known_keys(container, &mut found);
        }
    }
    if !found.is_unset() {
        return found;
    }

    // No explicit container: look for known keys on each level and its direct children.
    for level in levels {
        read_known_keys(level, &mut found);
        for child in level.values().filter_map(Value::as_object) {
            read_known_keys(child, &mut found);
        }
    }
    found
}

fn read_setting_groups(levels: &[&Map<String, Value>], out: &mut Normalized) {
    let filters: FilterMap = read_group(levels, FILTER_CONTAINERS);
    let misc: MiscMap = read_group(levels, MISC_CONTAINERS);
    out.filters.fill_missing(&filters);
    out.misc.fill_missing(&misc);
}

fn read_narrative(levels: &[&Map<String, Value>]) -> NarrativeDraft {
    let mut candidates: Vec<&Map<String, Value>> = Vec::new();
    for level in levels {
        if let Some(analysis) = get_object(level, ANALYSIS_CONTAINERS) {
            candidates.push(analysis);
        }
        candidates.push(level);
    }

    let mut draft = NarrativeDraft::default();
    for candidate in candidates {
        if draft.summary.is_none() {
            draft.summary = get_field(candidate, SUMMARY_KEYS).and_then(as_entry_text);
        }
        if draft.issues.is_empty() {
            draft.issues = list_field(candidate, ISSUE_KEYS);
        }
        if draft.recommendations.is_empty() {
            draft.recommendations = list_field(candidate, RECOMMENDATION_KEYS);
        }
        draft.notes.extend(
            list_field(candidate, NOTE_KEYS)
                .into_iter()
                .map(|text| Note::new(NoteKind::Recommendation, text)),
        );
    }
    draft
}

fn list_field(obj: &Map<String, Value>, names: &[&str]) -> Vec<String> {
    get_field(obj, names)
        .map(as_entry_list)
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use fpvtune_core::{FilterKey, MiscKey};
    use serde_json::json;

    #[test]
    fn test_canonical_with_feedforward_alias_and_numeric_strings() {
        let value = json!({
            "pid": {
                "roll": {"P": 52, "i": "80", "d": 45, "ff": 130},
                "pitch": {"p": 55, "i": 84, "d": 48, "feedforward": 135},
                "yaw": {"p": 45, "i": 80, "d": 0, "f": true}
            }
        });
        let normalized = normalize(&value);
        assert_eq!(normalized.shape, "canonical");
        assert_eq!(normalized.gains.roll.p, Some(52.0));
        assert_eq!(normalized.gains.roll.i, Some(80.0));
        assert_eq!(normalized.gains.roll.f, Some(130.0));
        assert_eq!(normalized.gains.pitch.f, Some(135.0));
        assert_eq!(normalized.gains.yaw.f, None);
    }

    #[test]
    fn test_gain_objects_use_recommended_value() {
        let value = json!({"pid": {"roll": {"p": {"current": 45, "recommended": 50}}}});
        assert_eq!(normalize(&value).gains.roll.p, Some(50.0));
    }

    #[test]
    fn test_set_prefixed_map_fills_all_groups() {
        let value = json!({
            "set p_roll": 52,
            "set gyro_lowpass_hz": 200,
            "set tpa_rate": 65,
            "set dshot_bidir": 1
        });
        let normalized = normalize(&value);
        assert_eq!(normalized.gains.roll.p, Some(52.0));
        assert_eq!(normalized.filters.get(FilterKey::GyroLpf1StaticHz), 200);
        assert_eq!(normalized.misc.get(MiscKey::TpaRate), 65);
    }

    #[test]
    fn test_filter_container_beats_sibling_scan() {
        let value = json!({
            "pid": {"roll": {"p": 40}},
            "filters": {"dterm_lpf1_static_hz": 90},
            "extra": {"gyro_lpf1_static_hz": 300}
        });
        let normalized = normalize(&value);
        assert_eq!(normalized.filters.get(FilterKey::DtermLpf1StaticHz), 90);
        assert_eq!(normalized.filters.get(FilterKey::GyroLpf1StaticHz), 0);
    }

    #[test]
    fn test_sibling_scan_finds_settings_without_container() {
        let value = json!({
            "pid": {"roll": {"p": 40}, "d_min_roll": 30},
            "gyro": {"gyro_lpf1_static_hz": 250, "enabled": true}
        });
        let normalized = normalize(&value);
        assert_eq!(normalized.filters.get(FilterKey::GyroLpf1StaticHz), 250);
        assert_eq!(normalized.misc.get(MiscKey::DMinRoll), 30);
    }

    #[test]
    fn test_bilingual_narrative_keys() {
        let value = json!({
            "分析": {
                "总结": "整体调参良好",
                "发现的问题": [{"title": "桨洗", "description": "降落时抖动"}],
                "建议": ["提高D值"]
            },
            "备注": ["Check your props"]
        });
        let narrative = normalize(&value).narrative;
        assert_eq!(narrative.summary.as_deref(), Some("整体调参良好"));
        assert_eq!(narrative.issues, vec!["桨洗: 降落时抖动".to_string()]);
        assert_eq!(narrative.recommendations, vec!["提高D值".to_string()]);
        assert_eq!(
            narrative.notes,
            vec![Note::new(NoteKind::Recommendation, "Check your props")]
        );
    }

    #[test]
    fn test_english_narrative_with_spaced_key() {
        let value = json!({
            "analysis": {"summary": "Solid", "issues found": ["Bounce back"]},
            "recommendations": ["Lower I"]
        });
        let narrative = normalize(&value).narrative;
        assert_eq!(narrative.issues, vec!["Bounce back".to_string()]);
        assert_eq!(narrative.recommendations, vec!["Lower I".to_string()]);
    }

    #[test]
    fn test_cli_field_is_scanned() {
        let value = json!({
            "summary": "ok",
            "cli_commands": "set p_roll = 52\nset i_roll = 80\nsave"
        });
        let normalized = normalize(&value);
        assert_eq!(normalized.shape, "cli-field");
        assert_eq!(normalized.gains.roll.i, Some(80.0));
        assert_eq!(
            normalized.statements,
            vec!["set p_roll = 52".to_string(), "set i_roll = 80".to_string()]
        );
    }

    #[test]
    fn test_canonical_round_trip() {
        let set = fpvtune_core::ParameterSet {
            roll: fpvtune_core::AxisGains::new(52, 80, 45, 130),
            pitch: fpvtune_core::AxisGains::new(55, 84, 48, 135),
            yaw: fpvtune_core::AxisGains::new(45, 80, 0, 120),
        };
        let normalized = normalize(&set.to_canonical_json());
        assert_eq!(normalized.gains, PartialParameterSet::from(set));
    }
}
