//! Typed tuning parameters: per-axis gains plus the filter and misc setting groups.

use crate::axis::{Axis, Gain};
use serde::de::{Deserialize, Deserializer};
use serde::ser::{Serialize, SerializeMap, Serializer};
use std::collections::{BTreeMap, HashMap};

/// Hard ceiling for any single gain.
pub const GAIN_CEILING: u32 = 300;

/// Validated gains for one axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
pub struct AxisGains {
    pub p: u32,
    pub i: u32,
    pub d: u32,
    pub f: u32,
}

impl AxisGains {
    pub const fn new(p: u32, i: u32, d: u32, f: u32) -> Self {
        Self { p, i, d, f }
    }

    pub fn get(&self, gain: Gain) -> u32 {
        match gain {
            Gain::P => self.p,
            Gain::I => self.i,
            Gain::D => self.d,
            Gain::F => self.f,
        }
    }

    pub fn in_range(&self) -> bool {
        Gain::ALL.iter().all(|g| self.get(*g) <= GAIN_CEILING)
    }
}

/// Gains for all three axes. Once validated every value is within `[0, GAIN_CEILING]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
pub struct ParameterSet {
    pub roll: AxisGains,
    pub pitch: AxisGains,
    pub yaw: AxisGains,
}

impl ParameterSet {
    pub fn axis(&self, axis: Axis) -> &AxisGains {
        match axis {
            Axis::Roll => &self.roll,
            Axis::Pitch => &self.pitch,
            Axis::Yaw => &self.yaw,
        }
    }

    pub fn axis_mut(&mut self, axis: Axis) -> &mut AxisGains {
        match axis {
            Axis::Roll => &mut self.roll,
            Axis::Pitch => &mut self.pitch,
            Axis::Yaw => &mut self.yaw,
        }
    }

    /// The nested-axis JSON shape responses are asked to produce: `{"pid": {"roll": {...}}}`.
    pub fn to_canonical_json(&self) -> serde_json::Value {
        serde_json::json!({ "pid": self })
    }
}

/// Gains for one axis as extracted, before validation. `None` means "not supplied".
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PartialAxis {
    pub p: Option<f64>,
    pub i: Option<f64>,
    pub d: Option<f64>,
    pub f: Option<f64>,
}

impl PartialAxis {
    pub fn get(&self, gain: Gain) -> Option<f64> {
        match gain {
            Gain::P => self.p,
            Gain::I => self.i,
            Gain::D => self.d,
            Gain::F => self.f,
        }
    }

    fn slot(&mut self, gain: Gain) -> &mut Option<f64> {
        match gain {
            Gain::P => &mut self.p,
            Gain::I => &mut self.i,
            Gain::D => &mut self.d,
            Gain::F => &mut self.f,
        }
    }

    /// Record a value. Negative or non-finite numbers are not a value and are ignored.
    pub fn set(&mut self, gain: Gain, value: f64) -> bool {
        if !value.is_finite() || value < 0.0 {
            return false;
        }
        *self.slot(gain) = Some(value);
        true
    }

    /// Record a value only when the gain has not been supplied yet.
    pub fn set_if_missing(&mut self, gain: Gain, value: f64) -> bool {
        if self.get(gain).is_some() {
            return false;
        }
        self.set(gain, value)
    }

    /// P, I and D were all supplied. F is optional.
    pub fn is_complete(&self) -> bool {
        self.p.is_some() && self.i.is_some() && self.d.is_some()
    }

    pub fn is_empty(&self) -> bool {
        Gain::ALL.iter().all(|g| self.get(*g).is_none())
    }

    pub fn fill_missing(&mut self, other: &PartialAxis) {
        for gain in Gain::ALL {
            if let Some(value) = other.get(gain) {
                self.set_if_missing(gain, value);
            }
        }
    }
}

impl From<AxisGains> for PartialAxis {
    fn from(gains: AxisGains) -> Self {
        Self {
            p: Some(gains.p as f64),
            i: Some(gains.i as f64),
            d: Some(gains.d as f64),
            f: Some(gains.f as f64),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PartialParameterSet {
    pub roll: PartialAxis,
    pub pitch: PartialAxis,
    pub yaw: PartialAxis,
}

impl PartialParameterSet {
    pub fn axis(&self, axis: Axis) -> &PartialAxis {
        match axis {
            Axis::Roll => &self.roll,
            Axis::Pitch => &self.pitch,
            Axis::Yaw => &self.yaw,
        }
    }

    pub fn axis_mut(&mut self, axis: Axis) -> &mut PartialAxis {
        match axis {
            Axis::Roll => &mut self.roll,
            Axis::Pitch => &mut self.pitch,
            Axis::Yaw => &mut self.yaw,
        }
    }

    pub fn has_any(&self) -> bool {
        Axis::ALL.iter().any(|a| !self.axis(*a).is_empty())
    }

    pub fn is_complete(&self) -> bool {
        Axis::ALL.iter().all(|a| self.axis(*a).is_complete())
    }

    pub fn fill_missing(&mut self, other: &PartialParameterSet) {
        for axis in Axis::ALL {
            let source = *other.axis(axis);
            self.axis_mut(axis).fill_missing(&source);
        }
    }
}

impl From<ParameterSet> for PartialParameterSet {
    fn from(set: ParameterSet) -> Self {
        Self {
            roll: set.roll.into(),
            pitch: set.pitch.into(),
            yaw: set.yaw.into(),
        }
    }
}

/// A closed set of named settings. `ALL` fixes the emission order.
pub trait SettingKey: Copy + Ord + 'static {
    const ALL: &'static [Self];

    /// Canonical Betaflight CLI name.
    fn name(&self) -> &'static str;

    /// Older or alternative spellings accepted on input.
    fn aliases(&self) -> &'static [&'static str] {
        &[]
    }

    fn from_name(name: &str) -> Option<Self> {
        let wanted = name.trim().to_ascii_lowercase();
        Self::ALL
            .iter()
            .copied()
            .find(|key| key.name() == wanted || key.aliases().contains(&wanted.as_str()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum FilterKey {
    GyroLpf1StaticHz,
    GyroLpf2StaticHz,
    GyroLpf1DynMinHz,
    GyroLpf1DynMaxHz,
    DtermLpf1StaticHz,
    DtermLpf2StaticHz,
    DtermLpf1DynMinHz,
    DtermLpf1DynMaxHz,
    DynNotchCount,
    DynNotchQ,
    DynNotchMinHz,
    DynNotchMaxHz,
    RpmFilterHarmonics,
    RpmFilterMinHz,
}

impl FilterKey {
    /// Keys whose value is a cutoff frequency and therefore scales with frame size.
    pub fn is_frequency(&self) -> bool {
        self.name().ends_with("_hz")
    }

    /// Keys distinctive enough to identify a filter container on their own.
    pub fn is_distinguishing(&self) -> bool {
        matches!(
            self,
            FilterKey::GyroLpf1StaticHz
                | FilterKey::DtermLpf1StaticHz
                | FilterKey::DynNotchCount
                | FilterKey::DynNotchMinHz
                | FilterKey::RpmFilterHarmonics
        )
    }
}

impl SettingKey for FilterKey {
    const ALL: &'static [Self] = &[
        FilterKey::GyroLpf1StaticHz,
        FilterKey::GyroLpf2StaticHz,
        FilterKey::GyroLpf1DynMinHz,
        FilterKey::GyroLpf1DynMaxHz,
        FilterKey::DtermLpf1StaticHz,
        FilterKey::DtermLpf2StaticHz,
        FilterKey::DtermLpf1DynMinHz,
        FilterKey::DtermLpf1DynMaxHz,
        FilterKey::DynNotchCount,
        FilterKey::DynNotchQ,
        FilterKey::DynNotchMinHz,
        FilterKey::DynNotchMaxHz,
        FilterKey::RpmFilterHarmonics,
        FilterKey::RpmFilterMinHz,
    ];

    fn name(&self) -> &'static str {
        match self {
            FilterKey::GyroLpf1StaticHz => "gyro_lpf1_static_hz",
            FilterKey::GyroLpf2StaticHz => "gyro_lpf2_static_hz",
            FilterKey::GyroLpf1DynMinHz => "gyro_lpf1_dyn_min_hz",
            FilterKey::GyroLpf1DynMaxHz => "gyro_lpf1_dyn_max_hz",
            FilterKey::DtermLpf1StaticHz => "dterm_lpf1_static_hz",
            FilterKey::DtermLpf2StaticHz => "dterm_lpf2_static_hz",
            FilterKey::DtermLpf1DynMinHz => "dterm_lpf1_dyn_min_hz",
            FilterKey::DtermLpf1DynMaxHz => "dterm_lpf1_dyn_max_hz",
            FilterKey::DynNotchCount => "dyn_notch_count",
            FilterKey::DynNotchQ => "dyn_notch_q",
            FilterKey::DynNotchMinHz => "dyn_notch_min_hz",
            FilterKey::DynNotchMaxHz => "dyn_notch_max_hz",
            FilterKey::RpmFilterHarmonics => "rpm_filter_harmonics",
            FilterKey::RpmFilterMinHz => "rpm_filter_min_hz",
        }
    }

    fn aliases(&self) -> &'static [&'static str] {
        match self {
            FilterKey::GyroLpf1StaticHz => &["gyro_lowpass_hz"],
            FilterKey::GyroLpf2StaticHz => &["gyro_lowpass2_hz"],
            FilterKey::DtermLpf1StaticHz => &["dterm_lowpass_hz"],
            FilterKey::DtermLpf2StaticHz => &["dterm_lowpass2_hz"],
            _ => &[],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum MiscKey {
    DMaxGain,
    DMaxAdvance,
    DMinRoll,
    DMinPitch,
    FeedforwardBoost,
    FeedforwardSmoothFactor,
    FeedforwardJitterFactor,
    FeedforwardMaxRateLimit,
    TpaRate,
    TpaBreakpoint,
    ItermRelaxCutoff,
    ThrottleBoost,
    MotorOutputLimit,
    AntiGravityGain,
}

impl SettingKey for MiscKey {
    const ALL: &'static [Self] = &[
        MiscKey::DMaxGain,
        MiscKey::DMaxAdvance,
        MiscKey::DMinRoll,
        MiscKey::DMinPitch,
        MiscKey::FeedforwardBoost,
        MiscKey::FeedforwardSmoothFactor,
        MiscKey::FeedforwardJitterFactor,
        MiscKey::FeedforwardMaxRateLimit,
        MiscKey::TpaRate,
        MiscKey::TpaBreakpoint,
        MiscKey::ItermRelaxCutoff,
        MiscKey::ThrottleBoost,
        MiscKey::MotorOutputLimit,
        MiscKey::AntiGravityGain,
    ];

    fn name(&self) -> &'static str {
        match self {
            MiscKey::DMaxGain => "d_max_gain",
            MiscKey::DMaxAdvance => "d_max_advance",
            MiscKey::DMinRoll => "d_min_roll",
            MiscKey::DMinPitch => "d_min_pitch",
            MiscKey::FeedforwardBoost => "feedforward_boost",
            MiscKey::FeedforwardSmoothFactor => "feedforward_smooth_factor",
            MiscKey::FeedforwardJitterFactor => "feedforward_jitter_factor",
            MiscKey::FeedforwardMaxRateLimit => "feedforward_max_rate_limit",
            MiscKey::TpaRate => "tpa_rate",
            MiscKey::TpaBreakpoint => "tpa_breakpoint",
            MiscKey::ItermRelaxCutoff => "iterm_relax_cutoff",
            MiscKey::ThrottleBoost => "throttle_boost",
            MiscKey::MotorOutputLimit => "motor_output_limit",
            MiscKey::AntiGravityGain => "anti_gravity_gain",
        }
    }
}

/// Ordered map over a fixed key set. Absent keys read as `0`, which means "not set".
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SettingMap<K: SettingKey> {
    values: BTreeMap<K, u32>,
}

pub type FilterMap = SettingMap<FilterKey>;
pub type MiscMap = SettingMap<MiscKey>;

impl<K: SettingKey> Default for SettingMap<K> {
    fn default() -> Self {
        Self {
            values: BTreeMap::new(),
        }
    }
}

impl<K: SettingKey> SettingMap<K> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: K) -> u32 {
        self.values.get(&key).copied().unwrap_or(0)
    }

    pub fn set(&mut self, key: K, value: u32) {
        self.values.insert(key, value);
    }

    /// Store a raw extracted number under a name. Unknown names, negative and
    /// non-finite values are dropped. Returns whether the value was kept.
    pub fn set_by_name(&mut self, name: &str, value: f64) -> bool {
        let Some(key) = K::from_name(name) else {
            return false;
        };
        if !value.is_finite() || value < 0.0 || value > u32::MAX as f64 {
            return false;
        }
        self.set(key, value.round() as u32);
        true
    }

    /// Set entries in key order, skipping zeros.
    pub fn iter_set(&self) -> impl Iterator<Item = (K, u32)> + '_ {
        K::ALL
            .iter()
            .map(|key| (*key, self.get(*key)))
            .filter(|(_, value)| *value != 0)
    }

    /// True when no key holds a non-zero value.
    pub fn is_unset(&self) -> bool {
        self.iter_set().next().is_none()
    }

    /// Copy over entries this map does not set yet.
    pub fn fill_missing(&mut self, other: &SettingMap<K>) {
        for (key, value) in other.iter_set() {
            if self.get(key) == 0 {
                self.set(key, value);
            }
        }
    }
}

impl<K: SettingKey> Serialize for SettingMap<K> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(K::ALL.len()))?;
        for key in K::ALL {
            map.serialize_entry(key.name(), &self.get(*key))?;
        }
        map.end()
    }
}

impl<'de, K: SettingKey> Deserialize<'de> for SettingMap<K> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = HashMap::<String, f64>::deserialize(deserializer)?;
        let mut map = SettingMap::new();
        for (name, value) in raw {
            map.set_by_name(&name, value);
        }
        Ok(map)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_axis_ignores_invalid_values() {
        let mut axis = PartialAxis::default();
        assert!(!axis.set(Gain::P, -3.0));
        assert!(!axis.set(Gain::P, f64::NAN));
        assert!(axis.p.is_none());
        assert!(axis.set(Gain::P, 0.0));
        assert_eq!(axis.p, Some(0.0));
    }

    #[test]
    fn test_partial_axis_completeness_does_not_need_f() {
        let mut axis = PartialAxis::default();
        axis.set(Gain::P, 45.0);
        axis.set(Gain::I, 80.0);
        assert!(!axis.is_complete());
        axis.set(Gain::D, 40.0);
        assert!(axis.is_complete());
    }

    #[test]
    fn test_fill_missing_keeps_existing_values() {
        let mut first = PartialParameterSet::default();
        first.roll.set(Gain::P, 50.0);
        let mut second = PartialParameterSet::default();
        second.roll.set(Gain::P, 60.0);
        second.roll.set(Gain::I, 85.0);
        first.fill_missing(&second);
        assert_eq!(first.roll.p, Some(50.0));
        assert_eq!(first.roll.i, Some(85.0));
    }

    #[test]
    fn test_filter_key_accepts_legacy_alias() {
        assert_eq!(
            FilterKey::from_name("gyro_lowpass_hz"),
            Some(FilterKey::GyroLpf1StaticHz)
        );
        assert_eq!(
            FilterKey::from_name("DTERM_LPF1_STATIC_HZ"),
            Some(FilterKey::DtermLpf1StaticHz)
        );
        assert_eq!(FilterKey::from_name("dshot_bidir"), None);
    }

    #[test]
    fn test_setting_map_drops_unknown_and_negative() {
        let mut map = MiscMap::new();
        assert!(!map.set_by_name("dshot_bidir", 1.0));
        assert!(!map.set_by_name("throttle_boost", -5.0));
        assert!(map.set_by_name("throttle_boost", 5.4));
        assert_eq!(map.get(MiscKey::ThrottleBoost), 5);
        assert_eq!(map.get(MiscKey::TpaRate), 0);
    }

    #[test]
    fn test_iter_set_follows_declaration_order() {
        let mut map = FilterMap::new();
        map.set(FilterKey::RpmFilterHarmonics, 3);
        map.set(FilterKey::GyroLpf1StaticHz, 250);
        map.set(FilterKey::DynNotchQ, 0);
        let keys: Vec<_> = map.iter_set().map(|(k, _)| k).collect();
        assert_eq!(
            keys,
            vec![FilterKey::GyroLpf1StaticHz, FilterKey::RpmFilterHarmonics]
        );
    }

    #[test]
    fn test_setting_map_serializes_every_key() {
        let mut map = FilterMap::new();
        map.set(FilterKey::DynNotchCount, 2);
        let json = serde_json::to_value(&map).unwrap();
        let obj = json.as_object().unwrap();
        assert_eq!(obj.len(), FilterKey::ALL.len());
        assert_eq!(obj["dyn_notch_count"], 2);
        assert_eq!(obj["gyro_lpf1_static_hz"], 0);
    }
}
