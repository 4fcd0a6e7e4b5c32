//! Tunable policy data for validation and default synthesis.
//!
//! The plausibility window and the frame/style multipliers are empirical. They live
//! here as plain data so deployments can override them from a policy file.

use crate::axis::{Axis, Gain};
use crate::hints::{FlyingStyle, FrameSize};
use crate::params::{AxisGains, FilterKey, GAIN_CEILING};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GainWindow {
    pub min: f64,
    pub max: f64,
}

impl GainWindow {
    pub fn contains(&self, value: f64) -> bool {
        value >= self.min && value <= self.max
    }
}

impl Default for GainWindow {
    fn default() -> Self {
        Self {
            min: 20.0,
            max: 150.0,
        }
    }
}

/// One multiplier per frame size class.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FrameScale {
    pub micro: f64,
    pub five: f64,
    pub seven: f64,
    pub ten_plus: f64,
}

impl FrameScale {
    pub fn for_frame(&self, frame: FrameSize) -> f64 {
        match frame {
            FrameSize::Micro => self.micro,
            FrameSize::Five => self.five,
            FrameSize::Seven => self.seven,
            FrameSize::TenPlus => self.ten_plus,
        }
    }

    fn gain_default() -> Self {
        Self {
            micro: 0.7,
            five: 1.0,
            seven: 1.15,
            ten_plus: 1.3,
        }
    }

    fn filter_default() -> Self {
        Self {
            micro: 1.3,
            five: 1.0,
            seven: 0.8,
            ten_plus: 0.65,
        }
    }

    fn sanitize(&mut self, fallback: FrameScale) {
        for (value, default) in [
            (&mut self.micro, fallback.micro),
            (&mut self.five, fallback.five),
            (&mut self.seven, fallback.seven),
            (&mut self.ten_plus, fallback.ten_plus),
        ] {
            if !value.is_finite() || *value <= 0.0 {
                *value = default;
            }
        }
    }
}

/// Per-gain multipliers applied for a flying style.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GainBias {
    pub p: f64,
    pub i: f64,
    pub d: f64,
    pub f: f64,
}

impl GainBias {
    pub const NEUTRAL: GainBias = GainBias::new(1.0, 1.0, 1.0, 1.0);

    pub const fn new(p: f64, i: f64, d: f64, f: f64) -> Self {
        Self { p, i, d, f }
    }

    pub fn get(&self, gain: Gain) -> f64 {
        match gain {
            Gain::P => self.p,
            Gain::I => self.i,
            Gain::D => self.d,
            Gain::F => self.f,
        }
    }

    fn sanitize(&mut self) {
        for value in [&mut self.p, &mut self.i, &mut self.d, &mut self.f] {
            if !value.is_finite() || *value <= 0.0 {
                *value = 1.0;
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StyleBias {
    pub freestyle: GainBias,
    /// Sharper stick response: more P and F, less D
    pub racing: GainBias,
    /// Smoother footage: the opposite of racing
    pub cinematic: GainBias,
    /// Mild flattening for efficiency
    pub long_range: GainBias,
}

impl StyleBias {
    pub fn for_style(&self, style: FlyingStyle) -> GainBias {
        match style {
            FlyingStyle::Freestyle => self.freestyle,
            FlyingStyle::Racing => self.racing,
            FlyingStyle::Cinematic => self.cinematic,
            FlyingStyle::LongRange => self.long_range,
        }
    }
}

impl Default for StyleBias {
    fn default() -> Self {
        Self {
            freestyle: GainBias::NEUTRAL,
            racing: GainBias::new(1.10, 1.0, 0.90, 1.20),
            cinematic: GainBias::new(0.90, 1.0, 1.10, 0.80),
            long_range: GainBias::new(0.95, 0.95, 0.95, 0.90),
        }
    }
}

/// Baseline gains the synthesizer scales (Betaflight 4.4 stock values).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BaselineGains {
    pub roll: AxisGains,
    pub pitch: AxisGains,
    pub yaw: AxisGains,
}

impl BaselineGains {
    pub fn axis(&self, axis: Axis) -> AxisGains {
        match axis {
            Axis::Roll => self.roll,
            Axis::Pitch => self.pitch,
            Axis::Yaw => self.yaw,
        }
    }
}

impl Default for BaselineGains {
    fn default() -> Self {
        Self {
            roll: AxisGains::new(45, 80, 40, 120),
            pitch: AxisGains::new(47, 84, 46, 125),
            yaw: AxisGains::new(45, 80, 0, 120),
        }
    }
}

/// Baseline filter settings (Betaflight 4.4 stock values, 5 inch).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BaselineFilters {
    pub gyro_lpf1_static_hz: u32,
    pub gyro_lpf2_static_hz: u32,
    pub gyro_lpf1_dyn_min_hz: u32,
    pub gyro_lpf1_dyn_max_hz: u32,
    pub dterm_lpf1_static_hz: u32,
    pub dterm_lpf2_static_hz: u32,
    pub dterm_lpf1_dyn_min_hz: u32,
    pub dterm_lpf1_dyn_max_hz: u32,
    pub dyn_notch_count: u32,
    pub dyn_notch_q: u32,
    pub dyn_notch_min_hz: u32,
    pub dyn_notch_max_hz: u32,
    pub rpm_filter_harmonics: u32,
    pub rpm_filter_min_hz: u32,
}

impl BaselineFilters {
    pub fn get(&self, key: FilterKey) -> u32 {
        match key {
            FilterKey::GyroLpf1StaticHz => self.gyro_lpf1_static_hz,
            FilterKey::GyroLpf2StaticHz => self.gyro_lpf2_static_hz,
            FilterKey::GyroLpf1DynMinHz => self.gyro_lpf1_dyn_min_hz,
            FilterKey::GyroLpf1DynMaxHz => self.gyro_lpf1_dyn_max_hz,
            FilterKey::DtermLpf1StaticHz => self.dterm_lpf1_static_hz,
            FilterKey::DtermLpf2StaticHz => self.dterm_lpf2_static_hz,
            FilterKey::DtermLpf1DynMinHz => self.dterm_lpf1_dyn_min_hz,
            FilterKey::DtermLpf1DynMaxHz => self.dterm_lpf1_dyn_max_hz,
            FilterKey::DynNotchCount => self.dyn_notch_count,
            FilterKey::DynNotchQ => self.dyn_notch_q,
            FilterKey::DynNotchMinHz => self.dyn_notch_min_hz,
            FilterKey::DynNotchMaxHz => self.dyn_notch_max_hz,
            FilterKey::RpmFilterHarmonics => self.rpm_filter_harmonics,
            FilterKey::RpmFilterMinHz => self.rpm_filter_min_hz,
        }
    }
}

impl Default for BaselineFilters {
    fn default() -> Self {
        Self {
            gyro_lpf1_static_hz: 250,
            gyro_lpf2_static_hz: 500,
            gyro_lpf1_dyn_min_hz: 250,
            gyro_lpf1_dyn_max_hz: 500,
            dterm_lpf1_static_hz: 75,
            dterm_lpf2_static_hz: 150,
            dterm_lpf1_dyn_min_hz: 75,
            dterm_lpf1_dyn_max_hz: 150,
            dyn_notch_count: 3,
            dyn_notch_q: 300,
            dyn_notch_min_hz: 100,
            dyn_notch_max_hz: 600,
            rpm_filter_harmonics: 3,
            rpm_filter_min_hz: 100,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TuningPolicy {
    /// Plausible range for roll and pitch P.
    pub p_window: GainWindow,
    pub frame_gain_scale: FrameScale,
    pub frame_filter_scale: FrameScale,
    pub style_bias: StyleBias,
    pub baseline_gains: BaselineGains,
    pub baseline_filters: BaselineFilters,
    /// Depth cap for the structural search.
    pub search_depth: usize,
    /// Cap for the issues and recommendations lists.
    pub narrative_limit: usize,
    /// Largest response the caller should hand to the engine.
    pub max_input_bytes: usize,
}

impl Default for TuningPolicy {
    fn default() -> Self {
        Self {
            p_window: GainWindow::default(),
            frame_gain_scale: FrameScale::gain_default(),
            frame_filter_scale: FrameScale::filter_default(),
            style_bias: StyleBias::default(),
            baseline_gains: BaselineGains::default(),
            baseline_filters: BaselineFilters::default(),
            search_depth: 5,
            narrative_limit: 5,
            max_input_bytes: 512 * 1024,
        }
    }
}

impl TuningPolicy {
    /// Repair values a hand-edited policy file can get wrong.
    pub fn sanitize(&mut self) {
        let defaults = TuningPolicy::default();
        let window = &mut self.p_window;
        if !window.min.is_finite() || !window.max.is_finite() {
            *window = defaults.p_window;
        } else if window.min > window.max {
            std::mem::swap(&mut window.min, &mut window.max);
        }
        window.min = window.min.max(0.0);
        window.max = window.max.min(GAIN_CEILING as f64);

        self.frame_gain_scale.sanitize(defaults.frame_gain_scale);
        self.frame_filter_scale
            .sanitize(defaults.frame_filter_scale);
        for bias in [
            &mut self.style_bias.freestyle,
            &mut self.style_bias.racing,
            &mut self.style_bias.cinematic,
            &mut self.style_bias.long_range,
        ] {
            bias.sanitize();
        }

        self.search_depth = self.search_depth.clamp(1, 8);
        self.narrative_limit = self.narrative_limit.clamp(1, 10);
        if self.max_input_bytes == 0 {
            self.max_input_bytes = defaults.max_input_bytes;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_window_bounds_are_inclusive() {
        let window = GainWindow::default();
        assert!(window.contains(20.0));
        assert!(window.contains(150.0));
        assert!(!window.contains(19.5));
        assert!(!window.contains(9999.0));
    }

    #[test]
    fn test_sanitize_swaps_inverted_window() {
        let mut policy = TuningPolicy::default();
        policy.p_window = GainWindow {
            min: 160.0,
            max: 30.0,
        };
        policy.sanitize();
        assert_eq!(policy.p_window.min, 30.0);
        assert_eq!(policy.p_window.max, 160.0);
    }

    #[test]
    fn test_sanitize_restores_non_positive_multipliers() {
        let mut policy = TuningPolicy::default();
        policy.frame_gain_scale.micro = 0.0;
        policy.style_bias.racing.d = -1.0;
        policy.search_depth = 0;
        policy.sanitize();
        assert_eq!(policy.frame_gain_scale.micro, 0.7);
        assert_eq!(policy.style_bias.racing.d, 1.0);
        assert_eq!(policy.search_depth, 1);
    }

    #[test]
    fn test_frame_scales_order_by_size() {
        let policy = TuningPolicy::default();
        let gains = policy.frame_gain_scale;
        assert!(gains.micro < gains.five && gains.five < gains.ten_plus);
        let filters = policy.frame_filter_scale;
        assert!(filters.micro > filters.five && filters.five > filters.ten_plus);
    }
}
