//! Domain model and contracts for fpvtune.

pub mod axis;
pub mod hints;
pub mod narrative;
pub mod params;
pub mod policy;
pub mod protocol;

pub use axis::{gain_key, parse_gain_key, Axis, Gain};
pub use hints::{FlyingStyle, FrameSize, Locale, TuningHints};
pub use narrative::AnalysisNarrative;
pub use params::{
    AxisGains, FilterKey, FilterMap, MiscKey, MiscMap, ParameterSet, PartialAxis,
    PartialParameterSet, SettingKey, SettingMap, GAIN_CEILING,
};
pub use policy::{GainWindow, TuningPolicy};
pub use protocol::*;
