//! Range validation and default synthesis.

use fpvtune_core::{
    Axis, AxisGains, DefaultsScope, ExtractionIssue, FilterKey, FilterMap, Gain, GainWindow,
    ParameterSet, PartialAxis, PartialParameterSet, SettingKey, TuningHints, TuningPolicy,
    GAIN_CEILING,
};
use tracing::warn;

/// Baseline gains scaled for the frame size and biased for the flying style.
pub fn synthesize_parameters(hints: &TuningHints, policy: &TuningPolicy) -> ParameterSet {
    let frame = policy.frame_gain_scale.for_frame(hints.frame_size);
    let bias = policy.style_bias.for_style(hints.flying_style);
    let mut set = ParameterSet::default();
    for axis in Axis::ALL {
        let base = policy.baseline_gains.axis(axis);
        let scaled = |gain: Gain| -> u32 {
            let value = (base.get(gain) as f64 * frame * bias.get(gain)).round();
            value.clamp(0.0, GAIN_CEILING as f64) as u32
        };
        *set.axis_mut(axis) = AxisGains::new(
            scaled(Gain::P),
            scaled(Gain::I),
            scaled(Gain::D),
            scaled(Gain::F),
        );
    }
    set
}

/// Baseline filters with cutoff frequencies scaled for the frame size. Counts, Q
/// and harmonics are not frequencies and stay as they are.
pub fn synthesize_filters(hints: &TuningHints, policy: &TuningPolicy) -> FilterMap {
    let scale = policy.frame_filter_scale.for_frame(hints.frame_size);
    let mut filters = FilterMap::new();
    for key in FilterKey::ALL {
        let base = policy.baseline_filters.get(*key);
        let value = if key.is_frequency() {
            (base as f64 * scale).round() as u32
        } else {
            base
        };
        filters.set(*key, value);
    }
    filters
}

/// The outcome of validating extracted gains.
#[derive(Debug, Clone, PartialEq)]
pub struct Resolution {
    pub parameters: ParameterSet,
    /// Set when the whole parameter set was replaced by defaults.
    pub defaulted: bool,
    pub issues: Vec<ExtractionIssue>,
}

fn rounded(value: f64) -> u32 {
    value.round().clamp(0.0, u32::MAX as f64) as u32
}

/// Why an axis cannot be used as extracted, if it cannot.
fn axis_problem(axis: &PartialAxis, p_window: Option<&GainWindow>) -> Option<String> {
    let missing: Vec<&str> = [Gain::P, Gain::I, Gain::D]
        .into_iter()
        .filter(|gain| axis.get(*gain).is_none())
        .map(|gain| gain.key())
        .collect();
    if !missing.is_empty() {
        return Some(format!("missing {}", missing.join(", ")));
    }

    for gain in Gain::ALL {
        if let Some(value) = axis.get(gain) {
            if rounded(value) > GAIN_CEILING {
                return Some(format!(
                    "{} = {} exceeds {}",
                    gain.key(),
                    value,
                    GAIN_CEILING
                ));
            }
        }
    }

    if let (Some(window), Some(p)) = (p_window, axis.p) {
        if !window.contains(p) {
            return Some(format!(
                "p = {} outside plausible range {}-{}",
                p, window.min, window.max
            ));
        }
    }
    None
}

/// Convert a usable axis, taking F from `default` when it was not supplied.
fn to_gains(axis: &PartialAxis, default: AxisGains) -> AxisGains {
    let get = |gain: Gain| axis.get(gain).map(rounded).unwrap_or(default.get(gain));
    AxisGains::new(get(Gain::P), get(Gain::I), get(Gain::D), get(Gain::F))
}

/// Validate extracted gains and fill in what cannot be trusted.
///
/// Roll and pitch are judged together: if either is incomplete, above the gain
/// ceiling, or has P outside the plausibility window, the entire set is replaced by
/// synthesized defaults. A bad yaw on its own only replaces yaw.
pub fn resolve(
    gains: &PartialParameterSet,
    hints: &TuningHints,
    policy: &TuningPolicy,
) -> Resolution {
    let defaults = synthesize_parameters(hints, policy);
    let mut issues = Vec::new();
    let window = Some(&policy.p_window);

    let primary_problems: Vec<(Axis, String)> = [Axis::Roll, Axis::Pitch]
        .into_iter()
        .filter_map(|axis| axis_problem(gains.axis(axis), window).map(|reason| (axis, reason)))
        .collect();

    if !primary_problems.is_empty() {
        if gains.has_any() {
            for (axis, reason) in primary_problems {
                warn!(axis = axis.key(), %reason, "rejecting extracted gains");
                issues.push(ExtractionIssue::OutOfRange { axis, reason });
            }
        }
        warn!(
            frame = hints.frame_size.label(),
            style = hints.flying_style.label(),
            "synthesizing default parameter set"
        );
        issues.push(ExtractionIssue::DefaultsSynthesized {
            scope: DefaultsScope::ParameterSet,
        });
        return Resolution {
            parameters: defaults,
            defaulted: true,
            issues,
        };
    }

    let mut parameters = ParameterSet::default();
    let mut filled_feedforward = false;
    for axis in [Axis::Roll, Axis::Pitch] {
        let partial = gains.axis(axis);
        filled_feedforward |= partial.f.is_none();
        *parameters.axis_mut(axis) = to_gains(partial, *defaults.axis(axis));
    }

    match axis_problem(&gains.yaw, None) {
        Some(reason) => {
            warn!(%reason, "replacing yaw gains with defaults");
            issues.push(ExtractionIssue::OutOfRange {
                axis: Axis::Yaw,
                reason,
            });
            issues.push(ExtractionIssue::DefaultsSynthesized {
                scope: DefaultsScope::Yaw,
            });
            parameters.yaw = defaults.yaw;
        }
        None => {
            filled_feedforward |= gains.yaw.f.is_none();
            parameters.yaw = to_gains(&gains.yaw, defaults.yaw);
        }
    }

    if filled_feedforward {
        issues.push(ExtractionIssue::DefaultsSynthesized {
            scope: DefaultsScope::Feedforward,
        });
    }

    Resolution {
        parameters,
        defaulted: false,
        issues,
    }
}
