//! Request-side inputs: report locale and the two free-text tuning hints.

use serde::{Deserialize, Serialize};

/// Language of the requested report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Locale {
    #[default]
    En,
    Zh,
}

impl Locale {
    /// Anything that is not a Chinese locale tag resolves to English.
    pub fn parse(tag: &str) -> Locale {
        let lower = tag.trim().to_ascii_lowercase();
        if lower == "zh" || lower.starts_with("zh-") || lower.starts_with("zh_") || lower == "中文"
        {
            Locale::Zh
        } else {
            Locale::En
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            Locale::En => "en",
            Locale::Zh => "zh",
        }
    }
}

/// Frame size class of the aircraft.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FrameSize {
    /// 2-3 inch micros and toothpicks
    Micro,
    #[default]
    Five,
    Seven,
    /// 10 inch and up (X-class, cinelifters)
    TenPlus,
}

impl FrameSize {
    /// Parse the form ids (`inch5`), bare sizes (`5`, `7"`, `3 inch`) and localized labels (`5寸`).
    /// Unrecognized text yields `None`.
    pub fn parse(text: &str) -> Option<FrameSize> {
        let lower = text.trim().to_ascii_lowercase();
        match lower.as_str() {
            "inch2_3" | "micro" | "toothpick" | "whoop" => return Some(FrameSize::Micro),
            "inch5" | "standard" => return Some(FrameSize::Five),
            "inch7" | "long_range" => return Some(FrameSize::Seven),
            "inch10plus" | "x-class" | "xclass" | "cinelifter" => {
                return Some(FrameSize::TenPlus)
            }
            _ => {}
        }

        let digits: String = lower
            .chars()
            .skip_while(|c| !c.is_ascii_digit())
            .take_while(|c| c.is_ascii_digit() || *c == '.')
            .collect();
        let inches = digits.parse::<f64>().ok()?;
        Some(if inches < 4.0 {
            FrameSize::Micro
        } else if inches < 6.0 {
            FrameSize::Five
        } else if inches < 9.0 {
            FrameSize::Seven
        } else {
            FrameSize::TenPlus
        })
    }

    pub fn label(&self) -> &'static str {
        match self {
            FrameSize::Micro => "2-3 inch",
            FrameSize::Five => "5 inch",
            FrameSize::Seven => "7 inch",
            FrameSize::TenPlus => "10+ inch",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlyingStyle {
    #[default]
    Freestyle,
    Racing,
    Cinematic,
    LongRange,
}

impl FlyingStyle {
    pub fn parse(text: &str) -> Option<FlyingStyle> {
        let lower = text.trim().to_ascii_lowercase();
        let compact: String = lower
            .chars()
            .filter(|c| !c.is_whitespace() && *c != '-' && *c != '_')
            .collect();
        match compact.as_str() {
            "freestyle" | "自由飞行" | "花飞" => Some(FlyingStyle::Freestyle),
            "racing" | "race" | "竞速" => Some(FlyingStyle::Racing),
            "cinematic" | "cine" | "cinewhoop" | "航拍" => Some(FlyingStyle::Cinematic),
            "longrange" | "lr" | "远航" => Some(FlyingStyle::LongRange),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            FlyingStyle::Freestyle => "Freestyle",
            FlyingStyle::Racing => "Racing",
            FlyingStyle::Cinematic => "Cinematic",
            FlyingStyle::LongRange => "Long Range",
        }
    }
}

/// Inputs used only when defaults have to be synthesized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TuningHints {
    pub frame_size: FrameSize,
    pub flying_style: FlyingStyle,
}

impl TuningHints {
    pub fn new(frame_size: FrameSize, flying_style: FlyingStyle) -> Self {
        Self {
            frame_size,
            flying_style,
        }
    }

    /// Build hints from the free-text form fields; unknown text falls back to 5 inch freestyle.
    pub fn from_text(frame_size: Option<&str>, flying_style: Option<&str>) -> Self {
        Self {
            frame_size: frame_size.and_then(FrameSize::parse).unwrap_or_default(),
            flying_style: flying_style.and_then(FlyingStyle::parse).unwrap_or_default(),
        }
    }
}
