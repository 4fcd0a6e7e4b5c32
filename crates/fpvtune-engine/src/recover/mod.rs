//! The recovery pipeline.
//!
//! locate -> repair -> normalize -> structural search -> text fallback -> locale
//! filter -> validate -> serialize. Every stage is a pure function; conditions that
//! would be errors elsewhere are recorded as [`ExtractionIssue`]s and the pipeline
//! moves on to the next strategy.

pub mod cli;
pub mod fallback;
mod fields;
pub mod locale;
pub mod locate;
pub mod narrative;
pub mod normalize;
pub mod repair;
pub mod search;
pub mod shapes;
pub mod validate;


pub use locale::detect_script;
pub use repair::{parse_lenient, repair_text, ParseOutcome};

use fpvtune_core::{
    DefaultsScope, ExtractionIssue, ExtractionResult, FilterMap, MiscMap, PartialParameterSet,
    Provenance, RawResponse, TuningHints, TuningPolicy,
};
use narrative::NarrativeDraft;
use serde_json::Value;
use tracing::debug;

/// What the JSON stages recovered.
#[derive(Default)]
struct Recovered {
    gains: PartialParameterSet,
    filters: FilterMap,
    misc: MiscMap,
    narrative: NarrativeDraft,
    statements: Vec<String>,
    provenance: Option<Provenance>,
    parsed: bool,
}

fn recover_json(text: &str, policy: &TuningPolicy, issues: &mut Vec<ExtractionIssue>) -> Recovered {
    let mut recovered = Recovered::default();
    let Some(candidate) = locate::locate_json_object(text) else {
        debug!("no JSON object in response");
        return recovered;
    };
    if candidate.truncated {
        issues.push(ExtractionIssue::Truncated);
    }

    let (value, provenance): (Value, Provenance) = match repair::parse_lenient(candidate.text) {
        ParseOutcome::Strict(value) => (value, Provenance::Json),
        ParseOutcome::Repaired { value, pass } => {
            debug!(pass = pass.label(), "JSON repaired");
            issues.push(ExtractionIssue::Repaired {
                pass: pass.label().to_string(),
            });
            (value, Provenance::RepairedJson)
        }
        ParseOutcome::Failed => {
            debug!(len = candidate.text.len(), "JSON candidate could not be repaired");
            return recovered;
        }
    };
    recovered.parsed = true;

    let normalized = normalize::normalize(&value);
    debug!(shape = normalized.shape, "response normalized");
    recovered.gains = normalized.gains;
    recovered.filters = normalized.filters;
    recovered.misc = normalized.misc;
    recovered.narrative = normalized.narrative;
    recovered.statements = normalized.statements;

    if recovered.gains.has_any() {
        recovered.provenance = Some(provenance);
    } else if let Some(found) = search::find_pid_object(&value, policy.search_depth) {
        debug!("PID object found by structural search");
        recovered.gains = normalize::read_axis_objects(found);
        recovered.provenance = Some(Provenance::StructuralSearch);
    }

    if recovered.filters.is_unset() {
        if let Some(found) = search::find_filter_object(&value, policy.search_depth) {
            recovered.filters = normalize::read_settings(found);
        }
    }
    recovered
}

/// Turn one raw response into a validated result. Never fails: the worst case is a
/// synthesized default set with `provenance = defaults`.
pub fn recover(
    response: &RawResponse,
    hints: &TuningHints,
    policy: &TuningPolicy,
) -> ExtractionResult {
    let text = locate::strip_side_channel(&response.text);
    let mut issues = Vec::new();
    let mut recovered = recover_json(&text, policy, &mut issues);

    if !recovered.gains.has_any() {
        let found = fallback::extract(&text);
        debug!(
            gains = found.gains.has_any(),
            statements = found.statements.len(),
            "text fallback finished"
        );
        if !recovered.parsed && !found.found_anything() {
            issues.push(ExtractionIssue::Unparseable);
        }
        if found.gains.has_any() {
            recovered.gains = found.gains;
            recovered.provenance = Some(Provenance::MarkdownFallback);
        }
        recovered.filters.fill_missing(&found.filters);
        recovered.misc.fill_missing(&found.misc);
        recovered.statements.extend(found.statements);
        recovered.narrative.notes.extend(found.notes);
    }

    let notes = std::mem::take(&mut recovered.narrative.notes);
    let (kept, dropped) = locale::filter_notes(notes, response.locale);
    recovered.narrative.notes = kept;
    if dropped > 0 {
        debug!(dropped, locale = response.locale.code(), "dropped notes in other language");
        issues.push(ExtractionIssue::LanguageMismatch { dropped });
    }

    let resolution = validate::resolve(&recovered.gains, hints, policy);
    issues.extend(resolution.issues);
    let provenance = if resolution.defaulted {
        Provenance::Defaults
    } else {
        recovered.provenance.unwrap_or(Provenance::Defaults)
    };

    let mut filters = recovered.filters;
    if filters.is_unset() {
        filters = validate::synthesize_filters(hints, policy);
        issues.push(ExtractionIssue::DefaultsSynthesized {
            scope: DefaultsScope::Filters,
        });
    }
    let misc = recovered.misc;

    let narrative = narrative::finalize(
        recovered.narrative,
        response.locale,
        policy.narrative_limit,
        resolution.defaulted,
    );
    let cli = cli::serialize(&resolution.parameters, &filters, &misc);
    debug!(%provenance, issues = issues.len(), "extraction finished");

    ExtractionResult {
        parameters: resolution.parameters,
        filters,
        misc,
        narrative,
        cli,
        provenance,
        issues,
        recovered_cli: fallback::transcript(&recovered.statements),
    }
}
