//! Control axes and the four gains tuned on each of them.

use serde::{Deserialize, Serialize};

/// A control axis. Declaration order is the order used everywhere output is emitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Axis {
    Roll,
    Pitch,
    Yaw,
}

impl Axis {
    pub const ALL: [Axis; 3] = [Axis::Roll, Axis::Pitch, Axis::Yaw];

    /// Lowercase name as used in Betaflight CLI keys (`p_roll`).
    pub fn key(&self) -> &'static str {
        match self {
            Axis::Roll => "roll",
            Axis::Pitch => "pitch",
            Axis::Yaw => "yaw",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Axis::Roll => "Roll",
            Axis::Pitch => "Pitch",
            Axis::Yaw => "Yaw",
        }
    }

    /// Recognize an axis name in English (any case) or Chinese.
    pub fn from_name(name: &str) -> Option<Axis> {
        let trimmed = name.trim().trim_matches(|c: char| c == '*' || c == '_' || c == '`');
        match trimmed.to_ascii_lowercase().as_str() {
            "roll" | "横滚" | "横滚轴" | "滚转" => Some(Axis::Roll),
            "pitch" | "俯仰" | "俯仰轴" => Some(Axis::Pitch),
            "yaw" | "偏航" | "偏航轴" => Some(Axis::Yaw),
            _ => None,
        }
    }
}

/// One of the four per-axis gains.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Gain {
    P,
    I,
    D,
    F,
}

impl Gain {
    pub const ALL: [Gain; 4] = [Gain::P, Gain::I, Gain::D, Gain::F];

    pub fn key(&self) -> &'static str {
        match self {
            Gain::P => "p",
            Gain::I => "i",
            Gain::D => "d",
            Gain::F => "f",
        }
    }

    /// Accepts `p`/`i`/`d`/`f` plus the feedforward spellings `ff` and `feedforward`.
    pub fn from_name(name: &str) -> Option<Gain> {
        match name.trim().to_ascii_lowercase().as_str() {
            "p" => Some(Gain::P),
            "i" => Some(Gain::I),
            "d" => Some(Gain::D),
            "f" | "ff" | "feedforward" | "feed_forward" => Some(Gain::F),
            _ => None,
        }
    }
}

/// Parse a Betaflight gain key such as `p_roll` or `ff_yaw`.
pub fn parse_gain_key(key: &str) -> Option<(Gain, Axis)> {
    let (gain, axis) = key.trim().split_once('_')?;
    Some((Gain::from_name(gain)?, Axis::from_name(axis)?))
}

/// The canonical CLI key for a gain on an axis (`p_roll`).
pub fn gain_key(gain: Gain, axis: Axis) -> String {
    format!("{}_{}", gain.key(), axis.key())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_axis_from_name_accepts_both_languages() {
        assert_eq!(Axis::from_name("Roll"), Some(Axis::Roll));
        assert_eq!(Axis::from_name("**PITCH**"), Some(Axis::Pitch));
        assert_eq!(Axis::from_name("偏航"), Some(Axis::Yaw));
        assert_eq!(Axis::from_name("throttle"), None);
    }

    #[test]
    fn test_parse_gain_key() {
        assert_eq!(parse_gain_key("p_roll"), Some((Gain::P, Axis::Roll)));
        assert_eq!(parse_gain_key("FF_yaw"), Some((Gain::F, Axis::Yaw)));
        assert_eq!(parse_gain_key("d_min_roll"), None);
        assert_eq!(parse_gain_key("gyro_lpf1_static_hz"), None);
    }
}
