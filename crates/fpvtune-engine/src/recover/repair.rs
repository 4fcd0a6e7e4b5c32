//! Lenient JSON repair for model output.
//!
//! Each pass fixes one artifact models are known to produce. Passes are cumulative
//! and applied in a fixed order; the text is re-parsed after every pass and the
//! first success wins. Every pass is a no-op on valid JSON.

use super::locate::strip_side_channel;
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RepairPass {
    SideChannel,
    SignedNumbers,
    TrailingCommas,
    OpenString,
    IncompleteMember,
    Closers,
}

impl RepairPass {
    pub const ORDER: [RepairPass; 6] = [
        RepairPass::SideChannel,
        RepairPass::SignedNumbers,
        RepairPass::TrailingCommas,
        RepairPass::OpenString,
        RepairPass::IncompleteMember,
        RepairPass::Closers,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            RepairPass::SideChannel => "side-channel",
            RepairPass::SignedNumbers => "signed-numbers",
            RepairPass::TrailingCommas => "trailing-commas",
            RepairPass::OpenString => "open-string",
            RepairPass::IncompleteMember => "incomplete-member",
            RepairPass::Closers => "closers",
        }
    }

    fn apply(&self, text: &str) -> String {
        match self {
            RepairPass::SideChannel => escape_string_controls(&strip_side_channel(text)),
            RepairPass::SignedNumbers => strip_plus_signs(text),
            RepairPass::TrailingCommas => strip_trailing_commas(text),
            RepairPass::OpenString => close_open_string(text),
            RepairPass::IncompleteMember => drop_incomplete_member(text),
            RepairPass::Closers => append_closers(text),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ParseOutcome {
    Strict(Value),
    Repaired { value: Value, pass: RepairPass },
    Failed,
}

/// Parse strictly, then retry after each repair pass.
pub fn parse_lenient(candidate: &str) -> ParseOutcome {
    if let Ok(value) = serde_json::from_str::<Value>(candidate) {
        return ParseOutcome::Strict(value);
    }

    let mut text = candidate.to_string();
    for pass in RepairPass::ORDER {
        text = pass.apply(&text);
        if let Ok(value) = serde_json::from_str::<Value>(&text) {
            return ParseOutcome::Repaired { value, pass };
        }
    }
    ParseOutcome::Failed
}

/// Apply every pass in order without parsing in between.
pub fn repair_text(text: &str) -> String {
    RepairPass::ORDER
        .iter()
        .fold(text.to_string(), |acc, pass| pass.apply(&acc))
}

/// Tracks whether a char stream is inside a JSON string literal.
#[derive(Default)]
struct StringState {
    in_string: bool,
    escape_next: bool,
}

impl StringState {
    /// Feed one char. Returns true when the char is structural, i.e. outside any string
    /// and not a quote.
    fn step(&mut self, c: char) -> bool {
        if self.in_string {
            if self.escape_next {
                self.escape_next = false;
            } else if c == '\\' {
                self.escape_next = true;
            } else if c == '"' {
                self.in_string = false;
            }
            return false;
        }
        if c == '"' {
            self.in_string = true;
            return false;
        }
        true
    }
}

fn escape_string_controls(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut state = StringState::default();
    for c in text.chars() {
        if state.in_string && !state.escape_next {
            match c {
                '\n' => {
                    out.push_str("\\n");
                    continue;
                }
                '\r' => {
                    out.push_str("\\r");
                    continue;
                }
                '\t' => {
                    out.push_str("\\t");
                    continue;
                }
                _ => {}
            }
        }
        state.step(c);
        out.push(c);
    }
    out
}

fn strip_plus_signs(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut state = StringState::default();
    let mut last_significant: Option<char> = None;
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        let structural = state.step(c);
        if structural
            && c == '+'
            && matches!(last_significant, Some(':' | ',' | '['))
            && chars
                .peek()
                .is_some_and(|next| next.is_ascii_digit() || *next == '.')
        {
            continue;
        }
        if !c.is_whitespace() {
            last_significant = Some(c);
        }
        out.push(c);
    }
    out
}

fn strip_trailing_commas(text: &str) -> String {
    let chars: Vec<char> = text.chars().collect();
    let mut out = String::with_capacity(text.len());
    let mut state = StringState::default();

    for (idx, &c) in chars.iter().enumerate() {
        let structural = state.step(c);
        if structural && c == ',' {
            let next = chars[idx + 1..].iter().copied().find(|ch| !ch.is_whitespace());
            if matches!(next, Some('}' | ']')) {
                continue;
            }
        }
        out.push(c);
    }
    out
}

fn close_open_string(text: &str) -> String {
    let mut state = StringState::default();
    for c in text.chars() {
        state.step(c);
    }
    if !state.in_string {
        return text.to_string();
    }

    let mut out = text.to_string();
    if state.escape_next {
        out.pop();
    }
    out.push('"');
    out
}

/// Drop a trailing member that cannot be complete: a dangling comma, a key with no
/// value, or a partial literal such as `tru` or `1.`.
fn drop_incomplete_member(text: &str) -> String {
    let trimmed = text.trim_end();
    let mut state = StringState::default();
    let mut stack: Vec<char> = Vec::new();
    let mut last_structural: Option<(usize, char)> = None;

    for (idx, c) in trimmed.char_indices() {
        if !state.step(c) {
            continue;
        }
        match c {
            '{' | '[' => {
                stack.push(c);
                last_structural = Some((idx, c));
            }
            '}' | ']' => {
                stack.pop();
                last_structural = Some((idx, c));
            }
            ',' => last_structural = Some((idx, c)),
            _ => {}
        }
    }

    let (Some(&container), Some((pos, marker))) = (stack.last(), last_structural) else {
        return trimmed.to_string();
    };
    let tail = trimmed[pos + marker.len_utf8()..].trim();

    match marker {
        '}' | ']' => trimmed[..pos + 1].to_string(),
        ',' if tail.is_empty() => trimmed[..pos].to_string(),
        _ if tail.is_empty() || member_is_complete(tail, container) => trimmed.to_string(),
        ',' => trimmed[..pos].to_string(),
        _ => trimmed[..pos + marker.len_utf8()].to_string(),
    }
}

fn member_is_complete(tail: &str, container: char) -> bool {
    let value = if container == '{' {
        let mut state = StringState::default();
        let split = tail
            .char_indices()
            .find(|(_, c)| state.step(*c) && *c == ':')
            .map(|(idx, _)| idx);
        let Some(split) = split else {
            return false;
        };
        let key = tail[..split].trim();
        if !matches!(serde_json::from_str::<Value>(key), Ok(Value::String(_))) {
            return false;
        }
        tail[split + 1..].trim()
    } else {
        tail
    };
    !value.is_empty() && serde_json::from_str::<Value>(value).is_ok()
}

fn append_closers(text: &str) -> String {
    let mut state = StringState::default();
    let mut stack: Vec<char> = Vec::new();
    for c in text.chars() {
        if !state.step(c) {
            continue;
        }
        match c {
            '{' => stack.push('}'),
            '[' => stack.push(']'),
            '}' | ']' => {
                stack.pop();
            }
            _ => {}
        }
    }

    let mut out = text.trim_end().to_string();
    while let Some(closer) = stack.pop() {
        out.push(closer);
    }
    out
}
