//! Engine contract: what goes in, what comes out, and what can go wrong along the way.

use crate::axis::Axis;
use crate::hints::{Locale, TuningHints};
use crate::narrative::AnalysisNarrative;
use crate::params::{FilterMap, MiscMap, ParameterSet};
use serde::{Deserialize, Serialize};

/// Untrusted text returned by the text-generation service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawResponse {
    pub text: String,
    pub locale: Locale,
}

impl RawResponse {
    pub fn new(text: impl Into<String>, locale: Locale) -> Self {
        Self {
            text: text.into(),
            locale,
        }
    }
}

/// Which strategy produced the parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Provenance {
    Json,
    RepairedJson,
    StructuralSearch,
    MarkdownFallback,
    /// Nothing usable was recovered; the result is a safe baseline.
    Defaults,
}

impl Provenance {
    pub fn label(&self) -> &'static str {
        match self {
            Provenance::Json => "json",
            Provenance::RepairedJson => "repaired-json",
            Provenance::StructuralSearch => "structural-search",
            Provenance::MarkdownFallback => "markdown-fallback",
            Provenance::Defaults => "defaults",
        }
    }
}

impl std::fmt::Display for Provenance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// What part of the result was replaced by synthesized defaults.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DefaultsScope {
    ParameterSet,
    Yaw,
    Feedforward,
    Filters,
}

/// A condition the engine absorbed instead of failing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ExtractionIssue {
    /// Neither JSON nor any known text pattern was found.
    Unparseable,
    /// A JSON object was started but never closed.
    Truncated,
    /// Strict parsing failed; the named repair pass made it parse.
    Repaired { pass: String },
    OutOfRange { axis: Axis, reason: String },
    /// Auxiliary sentences dropped for being in the other language.
    LanguageMismatch { dropped: usize },
    DefaultsSynthesized { scope: DefaultsScope },
}

impl std::fmt::Display for ExtractionIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExtractionIssue::Unparseable => write!(f, "no recognizable structure in response"),
            ExtractionIssue::Truncated => write!(f, "response JSON was truncated"),
            ExtractionIssue::Repaired { pass } => write!(f, "JSON repaired ({})", pass),
            ExtractionIssue::OutOfRange { axis, reason } => {
                write!(f, "{} gains rejected: {}", axis.label(), reason)
            }
            ExtractionIssue::LanguageMismatch { dropped } => {
                write!(f, "dropped {} sentence(s) in the wrong language", dropped)
            }
            ExtractionIssue::DefaultsSynthesized { scope } => {
                write!(f, "defaults synthesized for {:?}", scope)
            }
        }
    }
}

/// Canonical output of one extraction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractionResult {
    pub parameters: ParameterSet,
    pub filters: FilterMap,
    pub misc: MiscMap,
    pub narrative: AnalysisNarrative,
    /// Deterministic CLI text; always ends with a single `save`.
    pub cli: String,
    pub provenance: Provenance,
    #[serde(default)]
    pub issues: Vec<ExtractionIssue>,
    /// Assignment statements as the response wrote them, when it wrote any.
    #[serde(default)]
    pub recovered_cli: Option<String>,
}

impl ExtractionResult {
    pub fn is_fallback(&self) -> bool {
        self.provenance == Provenance::Defaults
    }
}

/// The seam collaborators call. Implementations must be total: every input yields a result.
pub trait ResponseExtractor {
    fn extract(&self, response: &RawResponse, hints: &TuningHints) -> ExtractionResult;
}
