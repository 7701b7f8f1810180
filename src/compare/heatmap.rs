use serde::Serialize;

use super::range::MetricRange;

#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Intensity {
    Level1,
    Level2,
    Level3,
    Level4,
    Level5,
}

impl Intensity {
    pub const LOWEST: Self = Self::Level1;
    pub const HIGHEST: Self = Self::Level5;
    pub const FLAT: Self = Self::Level2;
    pub const ALL: [Self; 5] = [
        Self::Level1,
        Self::Level2,
        Self::Level3,
        Self::Level4,
        Self::Level5,
    ];

    pub fn level(self) -> u8 {
        match self {
            Self::Level1 => 1,
            Self::Level2 => 2,
            Self::Level3 => 3,
            Self::Level4 => 4,
            Self::Level5 => 5,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Level1 => "very-low",
            Self::Level2 => "low",
            Self::Level3 => "medium",
            Self::Level4 => "high",
            Self::Level5 => "very-high",
        }
    }

    pub fn glyph(self) -> char {
        match self {
            Self::Level1 => '·',
            Self::Level2 => '░',
            Self::Level3 => '▒',
            Self::Level4 => '▓',
            Self::Level5 => '█',
        }
    }
}

pub fn bucket(value: f64, range: &MetricRange) -> Intensity {
    if range.is_flat() {
        return Intensity::FLAT;
    }

    let position = normalized_position(value, range);
    if position.is_nan() {
        return Intensity::LOWEST;
    }

    if position < 0.2 {
        Intensity::Level1
    } else if position < 0.4 {
        Intensity::Level2
    } else if position < 0.6 {
        Intensity::Level3
    } else if position < 0.8 {
        Intensity::Level4
    } else {
        Intensity::Level5
    }
}

fn normalized_position(value: f64, range: &MetricRange) -> f64 {
    let span = range.max - range.min;
    if span.is_finite() {
        return (value - range.min) / span;
    }
    (value / 2.0 - range.min / 2.0) / (range.max / 2.0 - range.min / 2.0)
}
