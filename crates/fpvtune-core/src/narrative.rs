use serde::{Deserialize, Serialize};

/// Human-readable part of a tuning report.
///
/// Finalized narratives always carry a non-empty summary and between one and
/// `narrative_limit` issues and recommendations.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AnalysisNarrative {
    pub summary: String,
    pub issues: Vec<String>,
    pub recommendations: Vec<String>,
}
