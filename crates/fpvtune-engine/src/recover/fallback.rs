//! Pattern-based extraction for responses that carry no usable JSON.
//!
//! A [`FallbackBuilder`] is threaded through a fixed sequence of passes. Each pass
//! returns the builder with whatever it recognized added; later passes only fill
//! gains earlier passes left empty, and the sequence stops once every axis has P,
//! I and D. Every accepted value is also recorded as a CLI statement so the caller
//! can show the assignments the way the response wrote them.

use super::fields::parse_number_text;
use super::narrative::{Note, NoteKind};
use fpvtune_core::{
    gain_key, parse_gain_key, Axis, FilterMap, Gain, MiscMap, PartialParameterSet,
};
use pulldown_cmark::{CodeBlockKind, Event, Parser, Tag, TagEnd};
use regex::Regex;
use std::sync::OnceLock;
use tracing::debug;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct FallbackBuilder {
    pub gains: PartialParameterSet,
    pub filters: FilterMap,
    pub misc: MiscMap,
    /// Accepted assignments, verbatim for `set` lines and reconstructed otherwise.
    pub statements: Vec<String>,
    pub notes: Vec<Note>,
}

impl FallbackBuilder {
    pub fn is_complete(&self) -> bool {
        self.gains.is_complete()
    }

    pub fn found_anything(&self) -> bool {
        self.gains.has_any() || !self.filters.is_unset() || !self.misc.is_unset()
    }

    pub fn transcript(&self) -> Option<String> {
        transcript(&self.statements)
    }

    fn with_gain(mut self, gain: Gain, axis: Axis, value: f64, statement: Option<&str>) -> Self {
        if self.gains.axis_mut(axis).set_if_missing(gain, value) {
            let statement = statement
                .map(str::to_string)
                .unwrap_or_else(|| reconstruct(&gain_key(gain, axis), value));
            self.statements.push(statement);
        }
        self
    }

    /// Route a named setting to the gain, filter or misc group. Unknown names are ignored.
    fn with_setting(mut self, name: &str, value: f64, statement: Option<&str>) -> Self {
        let name = name.trim().to_ascii_lowercase();
        if let Some((gain, axis)) = parse_gain_key(&name) {
            return self.with_gain(gain, axis, value, statement);
        }

        let mut candidate_filters = FilterMap::new();
        let mut candidate_misc = MiscMap::new();
        let accepted = if candidate_filters.set_by_name(&name, value) {
            let before = self.filters.clone();
            self.filters.fill_missing(&candidate_filters);
            self.filters != before
        } else if candidate_misc.set_by_name(&name, value) {
            let before = self.misc.clone();
            self.misc.fill_missing(&candidate_misc);
            self.misc != before
        } else {
            false
        };

        if accepted {
            let statement = statement
                .map(str::to_string)
                .unwrap_or_else(|| reconstruct(&name, value));
            self.statements.push(statement);
        }
        self
    }
}

/// Statements followed by a single `save`. Any `save` among them is dropped.
pub fn transcript(statements: &[String]) -> Option<String> {
    let body: Vec<&str> = statements
        .iter()
        .map(|statement| statement.trim())
        .filter(|statement| !statement.is_empty() && !statement.eq_ignore_ascii_case("save"))
        .collect();
    if body.is_empty() {
        return None;
    }
    Some(format!("{}\nsave\n", body.join("\n")))
}

fn reconstruct(key: &str, value: f64) -> String {
    if value.fract() == 0.0 {
        format!("set {} = {}", key, value as u64)
    } else {
        format!("set {} = {}", key, value)
    }
}

/// The response text plus its fenced code blocks.
struct Document<'a> {
    text: &'a str,
    fences: Vec<String>,
}

impl<'a> Document<'a> {
    fn parse(text: &'a str) -> Self {
        let mut fences = Vec::new();
        let mut current: Option<String> = None;
        for event in Parser::new(text) {
            match event {
                Event::Start(Tag::CodeBlock(CodeBlockKind::Fenced(_))) => {
                    current = Some(String::new());
                }
                Event::Text(chunk) => {
                    if let Some(buffer) = current.as_mut() {
                        buffer.push_str(&chunk);
                    }
                }
                Event::End(TagEnd::CodeBlock) => {
                    if let Some(buffer) = current.take() {
                        fences.push(buffer);
                    }
                }
                _ => {}
            }
        }
        Self { text, fences }
    }
}

type Pass = fn(FallbackBuilder, &Document<'_>) -> FallbackBuilder;

const GAIN_PASSES: [(&str, Pass); 4] = [
    ("set-statements", set_statement_pass),
    ("axis-lines", axis_line_pass),
    ("arrows-and-tables", arrow_and_table_pass),
    ("bulleted-axis-lines", bullet_pass),
];

/// Run every pass over free text.
pub fn extract(text: &str) -> FallbackBuilder {
    let document = Document::parse(text);
    let mut builder = FallbackBuilder::default();
    for (name, pass) in GAIN_PASSES {
        if builder.is_complete() {
            break;
        }
        builder = pass(builder, &document);
        debug!(pass = name, complete = builder.is_complete(), "fallback pass finished");
    }
    collect_section_notes(builder, &document)
}

/// Scan a block of CLI text (a `cli_commands` field) for `set` statements.
pub fn scan_cli_text(text: &str) -> FallbackBuilder {
    scan_set_lines(FallbackBuilder::default(), text)
}

// ---- regexes ---------------------------------------------------------------

const CJK_AXIS_NAMES: &str = r"横滚轴?|滚转|俯仰轴?|偏航轴?";
const AXIS_NAMES: &str = r"roll|pitch|yaw|横滚轴?|滚转|俯仰轴?|偏航轴?";
const NUMBER: &str = r"\d+(?:\.\d+)?";
const ARROW: &str = r"(?:→|->|=>|➜|⟶)";

fn set_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)^\s*(?:[-*>]\s*)?`*\s*(set\s+([a-z][a-z0-9_]*)\s*=\s*\+?(\d+(?:\.\d+)?))")
            .expect("set statement regex should compile")
    })
}

fn bullet_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^\s*(?:[-*•+]|\d{1,2}[.)])\s+").expect("bullet regex should compile")
    })
}

fn axis_head_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        let pattern = format!(
            r"(?i)^\s*(?:#{{1,6}}\s*)?(?:\*\*|__)?(?:(roll|pitch|yaw)(?:\s*axis)?\b|({CJK_AXIS_NAMES}))(?:\*\*|__)?\s*([:：=\-–—|])?\s*(.*)$"
        );
        Regex::new(&pattern).expect("axis line regex should compile")
    })
}

fn gain_pair_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        let pattern = format!(
            r"(?i)(?:^|[^a-z0-9_])(ff|p|i|d|f)(?:\*\*)?\s*(?:[:：=]\s*|\s+)({NUMBER})(?:\s*{ARROW}\s*({NUMBER}))?"
        );
        Regex::new(&pattern).expect("gain pair regex should compile")
    })
}

fn positional_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        let pattern = format!(
            r"^\s*({NUMBER})\s*[/,|]\s*({NUMBER})\s*[/,|]\s*({NUMBER})(?:\s*[/,|]\s*({NUMBER}))?"
        );
        Regex::new(&pattern).expect("positional gains regex should compile")
    })
}

fn axis_arrow_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        let pattern = format!(
            r"(?i)({AXIS_NAMES})(?:\s*axis)?\s*(?:\*\*)?\s*(ff|p|i|d|f)(?:\*\*)?\s*[:：]?\s*({NUMBER})\s*{ARROW}\s*({NUMBER})"
        );
        Regex::new(&pattern).expect("axis arrow regex should compile")
    })
}

fn key_arrow_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        let pattern = format!(
            r"(?i)\b([a-z][a-z0-9]*_[a-z0-9_]+)`?\s*[:：=]?\s*({NUMBER})\s*{ARROW}\s*({NUMBER})"
        );
        Regex::new(&pattern).expect("key arrow regex should compile")
    })
}

fn parse_f64(text: &str) -> Option<f64> {
    text.parse::<f64>().ok()
}

// ---- pass (a): set statements ----------------------------------------------

fn scan_set_lines(builder: FallbackBuilder, text: &str) -> FallbackBuilder {
    text.lines().fold(builder, |builder, line| {
        let Some(caps) = set_re().captures(line) else {
            return builder;
        };
        let (Some(statement), Some(name), Some(value)) = (
            caps.get(1),
            caps.get(2),
            caps.get(3).and_then(|m| parse_f64(m.as_str())),
        ) else {
            return builder;
        };
        builder.with_setting(name.as_str(), value, Some(statement.as_str()))
    })
}

/// Fenced blocks first. Raw lines are scanned only when no fence produced a statement.
fn set_statement_pass(builder: FallbackBuilder, document: &Document<'_>) -> FallbackBuilder {
    let before = builder.statements.len();
    let builder = document
        .fences
        .iter()
        .fold(builder, |builder, block| scan_set_lines(builder, block));
    if builder.statements.len() > before {
        return builder;
    }
    scan_set_lines(builder, document.text)
}

// ---- pass (b) and (d): axis lines --------------------------------------------

/// Gains labelled on an axis line: `P=52, I=80, D=45, F=130`. With an arrow the
/// value after it wins.
fn labelled_gains(rest: &str) -> Vec<(Gain, f64)> {
    gain_pair_re()
        .captures_iter(rest)
        .filter_map(|caps| {
            let gain = Gain::from_name(caps.get(1)?.as_str())?;
            let value = caps
                .get(3)
                .or_else(|| caps.get(2))
                .and_then(|m| parse_f64(m.as_str()))?;
            Some((gain, value))
        })
        .collect()
}

fn positional_gains(rest: &str) -> Vec<(Gain, f64)> {
    let cleaned = rest.trim_start_matches(['*', '_', ' ']);
    let Some(caps) = positional_re().captures(cleaned) else {
        return Vec::new();
    };
    Gain::ALL
        .iter()
        .enumerate()
        .filter_map(|(idx, gain)| Some((*gain, parse_f64(caps.get(idx + 1)?.as_str())?)))
        .collect()
}

/// An axis name at the start of a line and the text after it.
struct AxisLine<'a> {
    axis: Axis,
    rest: &'a str,
    /// A `:`, `=`, dash or pipe follows the axis name.
    separated: bool,
}

fn axis_line(line: &str) -> Option<AxisLine<'_>> {
    let caps = axis_head_re().captures(line)?;
    let name = caps.get(1).or_else(|| caps.get(2))?;
    Some(AxisLine {
        axis: Axis::from_name(name.as_str())?,
        rest: caps.get(4)?.as_str(),
        separated: caps.get(3).is_some(),
    })
}

/// Labelled gains from an axis line. Without a separator after the axis name the
/// line must label at least two gains, so prose such as "Roll oscillation, D 45 is
/// too low" is not read as a setting.
fn axis_line_gains(line: &AxisLine<'_>) -> Vec<(Gain, f64)> {
    let gains = labelled_gains(line.rest);
    if line.separated || gains.len() >= 2 {
        gains
    } else {
        Vec::new()
    }
}

fn apply_gains(builder: FallbackBuilder, axis: Axis, gains: Vec<(Gain, f64)>) -> FallbackBuilder {
    gains
        .into_iter()
        .fold(builder, |builder, (gain, value)| {
            builder.with_gain(gain, axis, value, None)
        })
}

fn axis_line_pass(builder: FallbackBuilder, document: &Document<'_>) -> FallbackBuilder {
    document
        .text
        .lines()
        .filter(|line| !bullet_re().is_match(line))
        .filter_map(axis_line)
        .fold(builder, |builder, line| {
            let gains = axis_line_gains(&line);
            apply_gains(builder, line.axis, gains)
        })
}

fn bullet_pass(builder: FallbackBuilder, document: &Document<'_>) -> FallbackBuilder {
    document
        .text
        .lines()
        .filter_map(|line| {
            let marker = bullet_re().find(line)?;
            axis_line(&line[marker.end()..])
        })
        .fold(builder, |builder, line| {
            let mut gains = axis_line_gains(&line);
            if gains.is_empty() && line.separated {
                gains = positional_gains(line.rest);
            }
            apply_gains(builder, line.axis, gains)
        })
}

// ---- pass (c): arrows and tables ---------------------------------------------

/// `Roll P: 52 → 55`, keeping the value after the arrow.
fn axis_arrow(line: &str) -> Option<(Axis, Gain, f64)> {
    let caps = axis_arrow_re().captures(line)?;
    let axis = Axis::from_name(caps.get(1)?.as_str())?;
    let gain = Gain::from_name(caps.get(2)?.as_str())?;
    let after = parse_f64(caps.get(4)?.as_str())?;
    Some((axis, gain, after))
}

fn arrow_and_table_pass(builder: FallbackBuilder, document: &Document<'_>) -> FallbackBuilder {
    let builder = document.text.lines().fold(builder, |builder, line| {
        if let Some((axis, gain, after)) = axis_arrow(line) {
            return builder.with_gain(gain, axis, after, None);
        }
        key_arrow_re()
            .captures_iter(line)
            .fold(builder, |builder, caps| {
                match (caps.get(1), caps.get(3).and_then(|m| parse_f64(m.as_str()))) {
                    (Some(name), Some(after)) => builder.with_setting(name.as_str(), after, None),
                    _ => builder,
                }
            })
    });
    table_pass(builder, document.text)
}

enum TableLayout {
    /// One row per axis, gains as columns.
    AxisRows(Vec<(usize, Gain)>),
    /// One row per gain, axes as columns.
    GainRows(Vec<(usize, Axis)>),
}

fn table_cells(line: &str) -> Option<Vec<String>> {
    let trimmed = line.trim();
    if !trimmed.starts_with('|') {
        return None;
    }
    let inner = trimmed.trim_start_matches('|').trim_end_matches('|');
    Some(
        inner
            .split('|')
            .map(|cell| {
                cell.trim()
                    .trim_matches(|c: char| c == '*' || c == '`' || c == '_')
                    .trim()
                    .to_string()
            })
            .collect(),
    )
}

fn header_layout(cells: &[String]) -> Option<TableLayout> {
    let gain_columns: Vec<(usize, Gain)> = cells
        .iter()
        .enumerate()
        .filter_map(|(idx, cell)| Some((idx, Gain::from_name(cell)?)))
        .collect();
    if gain_columns.len() >= 2 {
        return Some(TableLayout::AxisRows(gain_columns));
    }
    let axis_columns: Vec<(usize, Axis)> = cells
        .iter()
        .enumerate()
        .filter_map(|(idx, cell)| Some((idx, Axis::from_name(cell)?)))
        .collect();
    (axis_columns.len() >= 2).then_some(TableLayout::GainRows(axis_columns))
}

fn table_pass(builder: FallbackBuilder, text: &str) -> FallbackBuilder {
    let mut builder = builder;
    let mut layout: Option<TableLayout> = None;

    for line in text.lines() {
        let Some(cells) = table_cells(line) else {
            layout = None;
            continue;
        };
        if cells
            .iter()
            .all(|cell| cell.chars().all(|c| matches!(c, '-' | ':' | ' ')))
        {
            continue;
        }
        if let Some(header) = header_layout(&cells) {
            layout = Some(header);
            continue;
        }
        let Some(first) = cells.first() else {
            continue;
        };
        builder = match &layout {
            Some(TableLayout::AxisRows(columns)) => match Axis::from_name(first) {
                Some(axis) => columns.iter().fold(builder, |builder, (idx, gain)| {
                    match cells.get(*idx).and_then(|cell| parse_number_text(cell)) {
                        Some(value) => builder.with_gain(*gain, axis, value, None),
                        None => builder,
                    }
                }),
                None => builder,
            },
            Some(TableLayout::GainRows(columns)) => match Gain::from_name(first) {
                Some(gain) => columns.iter().fold(builder, |builder, (idx, axis)| {
                    match cells.get(*idx).and_then(|cell| parse_number_text(cell)) {
                        Some(value) => builder.with_gain(gain, *axis, value, None),
                        None => builder,
                    }
                }),
                None => builder,
            },
            None => builder,
        };
    }
    builder
}

// ---- auxiliary notes ---------------------------------------------------------

fn section_kind(heading: &str) -> Option<NoteKind> {
    let lower = heading.to_lowercase();
    const ISSUE_WORDS: [&str; 5] = ["issue", "problem", "finding", "问题", "发现"];
    const RECOMMENDATION_WORDS: [&str; 7] =
        ["recommend", "suggest", "tip", "advice", "next step", "建议", "注意"];
    if ISSUE_WORDS.iter().any(|word| lower.contains(word)) {
        Some(NoteKind::Issue)
    } else if RECOMMENDATION_WORDS.iter().any(|word| lower.contains(word)) {
        Some(NoteKind::Recommendation)
    } else {
        None
    }
}

/// Heading text for `## Issues`, `**Issues**` or a short `Issues:` line.
fn heading_text(line: &str) -> Option<&str> {
    let trimmed = line.trim();
    if let Some(rest) = trimmed.strip_prefix('#') {
        return Some(rest.trim_start_matches('#').trim());
    }
    if trimmed.len() > 4 && trimmed.starts_with("**") && trimmed.ends_with("**") {
        return Some(trimmed.trim_matches('*').trim());
    }
    let without_colon = trimmed
        .strip_suffix(':')
        .or_else(|| trimmed.strip_suffix('：'))?;
    (without_colon.chars().count() <= 40 && !bullet_re().is_match(trimmed))
        .then(|| without_colon.trim_matches('*').trim())
}

fn carries_values(line: &str) -> bool {
    if line.trim_start().starts_with('|')
        || set_re().is_match(line)
        || axis_arrow_re().is_match(line)
        || key_arrow_re().is_match(line)
    {
        return true;
    }
    let unbulleted = bullet_re().replace(line, "");
    axis_line(&unbulleted).is_some_and(|line| {
        !axis_line_gains(&line).is_empty()
            || (line.separated && !positional_gains(line.rest).is_empty())
    })
}

/// Sentences under headings that name issues or recommendations.
fn collect_section_notes(mut builder: FallbackBuilder, document: &Document<'_>) -> FallbackBuilder {
    let mut section: Option<NoteKind> = None;
    let mut in_fence = false;

    for line in document.text.lines() {
        let trimmed = line.trim();
        if trimmed.starts_with("```") || trimmed.starts_with("~~~") {
            in_fence = !in_fence;
            continue;
        }
        if in_fence || trimmed.is_empty() {
            continue;
        }
        if let Some(heading) = heading_text(trimmed) {
            section = section_kind(heading);
            continue;
        }
        let Some(kind) = section else {
            continue;
        };
        if carries_values(trimmed) {
            continue;
        }
        builder.notes.push(Note::new(kind, trimmed));
    }
    builder
}
