//! Recovery engine for fpvtune.
//!
//! Turns free-form tuning reports into validated Betaflight parameters. See
//! [`recover::recover`] for the pipeline itself.

use fpvtune_core::{ExtractionResult, RawResponse, ResponseExtractor, TuningHints, TuningPolicy};

pub mod recover;

/// The default [`ResponseExtractor`]: the recovery pipeline bound to a policy.
#[derive(Debug, Default, Clone)]
pub struct TuneEngine {
    policy: TuningPolicy,
}

impl TuneEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_policy(mut policy: TuningPolicy) -> Self {
        policy.sanitize();
        Self { policy }
    }

    pub fn policy(&self) -> &TuningPolicy {
        &self.policy
    }
}

impl ResponseExtractor for TuneEngine {
    fn extract(&self, response: &RawResponse, hints: &TuningHints) -> ExtractionResult {
        recover::recover(response, hints, &self.policy)
    }
}
