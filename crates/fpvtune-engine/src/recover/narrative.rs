//! Narrative collection and finalization.

use fpvtune_core::{AnalysisNarrative, Locale};
use regex::Regex;
use std::sync::OnceLock;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoteKind {
    Issue,
    Recommendation,
}

/// An auxiliary sentence picked up outside the primary narrative fields. Notes are
/// subject to the locale filter before they join the narrative.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Note {
    pub kind: NoteKind,
    pub text: String,
}

impl Note {
    pub fn new(kind: NoteKind, text: impl Into<String>) -> Self {
        Self {
            kind,
            text: text.into(),
        }
    }
}

/// Narrative as extracted, before caps, dedup and fallbacks.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NarrativeDraft {
    pub summary: Option<String>,
    pub issues: Vec<String>,
    pub recommendations: Vec<String>,
    pub notes: Vec<Note>,
}

fn list_marker_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^(?:[-*•+]\s+|\d{1,2}[.)、]\s*|[（(]\d{1,2}[)）]\s*)")
            .expect("list marker regex should compile")
    })
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn clean_entry(text: &str) -> String {
    let collapsed = collapse_whitespace(text);
    let stripped = list_marker_re().replace(&collapsed, "");
    stripped
        .trim()
        .trim_matches(|c: char| c == '*' || c == '`')
        .trim()
        .to_string()
}

/// Comparison key: lowercase letters and digits only, so punctuation and spacing
/// differences do not defeat dedup.
fn similarity_key(text: &str) -> String {
    text.chars()
        .filter(|c| c.is_alphanumeric())
        .flat_map(char::to_lowercase)
        .collect()
}

const PREFIX_CHARS: usize = 32;

fn is_near_duplicate(a: &str, b: &str) -> bool {
    if a.is_empty() || b.is_empty() {
        return a == b;
    }
    if a.starts_with(b) || b.starts_with(a) {
        return true;
    }
    let a_prefix: String = a.chars().take(PREFIX_CHARS).collect();
    let b_prefix: String = b.chars().take(PREFIX_CHARS).collect();
    a_prefix.chars().count() == PREFIX_CHARS && a_prefix == b_prefix
}

fn dedupe_and_cap(entries: impl IntoIterator<Item = String>, limit: usize) -> Vec<String> {
    let mut kept: Vec<String> = Vec::new();
    let mut keys: Vec<String> = Vec::new();
    for entry in entries {
        let cleaned = clean_entry(&entry);
        if cleaned.is_empty() {
            continue;
        }
        let key = similarity_key(&cleaned);
        if keys.iter().any(|seen| is_near_duplicate(seen, &key)) {
            continue;
        }
        keys.push(key);
        kept.push(cleaned);
        if kept.len() == limit {
            break;
        }
    }
    kept
}

struct Fallbacks {
    summary: &'static str,
    issue: &'static str,
    recommendation: &'static str,
    defaults: &'static str,
}

fn fallbacks(locale: Locale) -> Fallbacks {
    match locale {
        Locale::En => Fallbacks {
            summary: "Analysis complete. Review the recommended settings before flying.",
            issue: "No specific issues were identified in the flight log.",
            recommendation: "Apply the settings below and test-fly in a safe, open area.",
            defaults: "The analysis could not be turned into valid tuning values, so safe \
                       baseline values for your frame size and flying style were used instead.",
        },
        Locale::Zh => Fallbacks {
            summary: "分析完成。飞行前请检查推荐的参数设置。",
            issue: "飞行日志中未发现明显问题。",
            recommendation: "应用以下参数，并在安全开阔的场地试飞。",
            defaults: "无法从分析结果中提取有效的调参数值，已根据机架尺寸和飞行风格使用安全的基础参数。",
        },
    }
}

/// Produce the final narrative: notes folded into their lists, near-duplicates
/// removed, lists capped at `limit`, and localized entries wherever a field is empty.
/// When `defaulted` is set the first issue explains that baseline values were used.
pub fn finalize(
    draft: NarrativeDraft,
    locale: Locale,
    limit: usize,
    defaulted: bool,
) -> AnalysisNarrative {
    let text = fallbacks(locale);
    let limit = limit.max(1);

    let mut issue_notes = Vec::new();
    let mut recommendation_notes = Vec::new();
    for note in draft.notes {
        match note.kind {
            NoteKind::Issue => issue_notes.push(note.text),
            NoteKind::Recommendation => recommendation_notes.push(note.text),
        }
    }

    let defaults_notice = defaulted.then(|| text.defaults.to_string());
    let mut issues = dedupe_and_cap(
        defaults_notice
            .into_iter()
            .chain(draft.issues)
            .chain(issue_notes),
        limit,
    );
    let mut recommendations = dedupe_and_cap(
        draft.recommendations.into_iter().chain(recommendation_notes),
        limit,
    );

    let summary = draft
        .summary
        .map(|s| collapse_whitespace(&s))
        .filter(|s| !s.is_empty())
        .or_else(|| issues.first().cloned())
        .unwrap_or_else(|| text.summary.to_string());

    if issues.is_empty() {
        issues.push(text.issue.to_string());
    }
    if recommendations.is_empty() {
        recommendations.push(text.recommendation.to_string());
    }

    AnalysisNarrative {
        summary,
        issues,
        recommendations,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_finalize_fills_empty_fields_in_requested_language() {
        let narrative = finalize(NarrativeDraft::default(), Locale::Zh, 5, false);
        assert_eq!(narrative.summary, "分析完成。飞行前请检查推荐的参数设置。");
        assert_eq!(narrative.issues.len(), 1);
        assert_eq!(narrative.recommendations.len(), 1);
    }

    #[test]
    fn test_summary_falls_back_to_first_issue() {
        let draft = NarrativeDraft {
            issues: strings(&["- Prop wash on throttle chops"]),
            ..Default::default()
        };
        let narrative = finalize(draft, Locale::En, 5, false);
        assert_eq!(narrative.summary, "Prop wash on throttle chops");
    }

    #[test]
    fn test_lists_are_deduplicated_and_capped() {
        let draft = NarrativeDraft {
            summary: Some("  Good   tune ".to_string()),
            issues: strings(&[
                "Oscillation on roll",
                "oscillation on roll.",
                "Oscillation on roll at high throttle",
                "Yaw drift",
                "Motor heat",
                "Noise above 300 Hz",
                "Slow I-term",
                "Bounce-back on flips",
            ]),
            ..Default::default()
        };
        let narrative = finalize(draft, Locale::En, 5, false);
        assert_eq!(narrative.summary, "Good tune");
        assert_eq!(
            narrative.issues,
            strings(&[
                "Oscillation on roll",
                "Yaw drift",
                "Motor heat",
                "Noise above 300 Hz",
                "Slow I-term",
            ])
        );
    }

    #[test]
    fn test_notes_join_their_lists_after_primary_entries() {
        let draft = NarrativeDraft {
            recommendations: strings(&["Raise D on pitch"]),
            notes: vec![
                Note::new(NoteKind::Recommendation, "Check prop balance"),
                Note::new(NoteKind::Issue, "Frame resonance near 180 Hz"),
            ],
            ..Default::default()
        };
        let narrative = finalize(draft, Locale::En, 5, false);
        assert_eq!(
            narrative.recommendations,
            strings(&["Raise D on pitch", "Check prop balance"])
        );
        assert_eq!(narrative.issues, strings(&["Frame resonance near 180 Hz"]));
    }

    #[test]
    fn test_defaulted_narrative_leads_with_notice() {
        let draft = NarrativeDraft {
            issues: strings(&["Roll oscillation"]),
            ..Default::default()
        };
        let narrative = finalize(draft, Locale::En, 5, true);
        assert!(narrative.issues[0].starts_with("The analysis could not be turned"));
        assert_eq!(narrative.issues[1], "Roll oscillation");
        assert_eq!(narrative.summary, narrative.issues[0]);
    }
}
