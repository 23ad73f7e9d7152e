use serde::Serialize;
use std::fmt;

use super::thresholds::*;

/// Coarse energy classification derived from RMS loudness.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum EnergyLevel {
    Low,
    Medium,
    High,
    #[serde(rename = "Very High")]
    VeryHigh,
}

impl EnergyLevel {
    pub fn from_loudness(loudness_db: f32) -> Self {
        if loudness_db > ENERGY_VERY_HIGH_ABOVE_DB {
            EnergyLevel::VeryHigh
        } else if loudness_db > ENERGY_HIGH_ABOVE_DB {
            EnergyLevel::High
        } else if loudness_db < ENERGY_LOW_BELOW_DB {
            EnergyLevel::Low
        } else {
            EnergyLevel::Medium
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum Character {
    #[serde(rename = "Bass Heavy")]
    BassHeavy,
    Balanced,
    #[serde(rename = "Bright/Airy")]
    BrightAiry,
    #[serde(rename = "Mid-Forward")]
    MidForward,
}

impl Character {
    pub fn from_percentages(low: u8, mid: u8, high: u8) -> Self {
        if low > CHARACTER_BASS_ABOVE_PCT {
            Character::BassHeavy
        } else if high > CHARACTER_BRIGHT_ABOVE_PCT {
            Character::BrightAiry
        } else if mid > CHARACTER_MID_ABOVE_PCT {
            Character::MidForward
        } else {
            Character::Balanced
        }
    }
}

/// Five-point brightness scale, darkest first.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub enum Brightness {
    #[serde(rename = "Very Dark/Deep")]
    VeryDark,
    #[serde(rename = "Warm/Mellow")]
    Warm,
    #[serde(rename = "Neutral/Balanced")]
    Neutral,
    #[serde(rename = "Bright/Crisp")]
    Bright,
    #[serde(rename = "Very Bright/Harsh")]
    VeryBright,
}

impl Brightness {
    pub fn from_zcr(zcr: f64) -> Self {
        if zcr < ZCR_VERY_DARK_BELOW {
            Brightness::VeryDark
        } else if zcr < ZCR_WARM_BELOW {
            Brightness::Warm
        } else if zcr < ZCR_NEUTRAL_BELOW {
            Brightness::Neutral
        } else if zcr < ZCR_BRIGHT_BELOW {
            Brightness::Bright
        } else {
            Brightness::VeryBright
        }
    }
}

/// Which path produced the tempo/key fields.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum AnalysisMethod {
    AdvancedLibrary,
    #[serde(rename = "NativeDSP")]
    NativeDsp,
}

/// Low/mid/high energy split in whole percent; the three always sum to 100.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct SpectralBalance {
    pub low: u8,
    pub mid: u8,
    pub high: u8,
    pub character: Character,
}

impl SpectralBalance {
    pub fn from_triple((low, mid, high): (u8, u8, u8)) -> Self {
        Self {
            low,
            mid,
            high,
            character: Character::from_percentages(low, mid, high),
        }
    }
}

/// Stereo image of the centre window.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct StereoImage {
    pub correlation: f32,
    pub width: f32,
}

impl StereoImage {
    pub const MONO: StereoImage = StereoImage {
        correlation: 1.0,
        width: 0.0,
    };
}

/// Everything the native stages compute for one buffer.
#[derive(Clone, Debug, PartialEq)]
pub struct NativeMeasurements {
    pub loudness_db: f32,
    pub true_peak_db: f32,
    pub stereo: StereoImage,
    pub balance: SpectralBalance,
    pub brightness: Brightness,
    /// 0.0 when undetermined.
    pub bpm: f32,
}

/// Per-file analysis result.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FeatureReport {
    pub bpm: f32,
    pub key: String,
    pub mode: String,
    pub energy_level: EnergyLevel,
    pub duration_seconds: f64,
    pub sample_rate: u32,
    pub channels: usize,
    pub loudness_db: f32,
    pub true_peak_db: f32,
    pub stereo_correlation: f32,
    pub stereo_width: f32,
    pub spectral_balance: SpectralBalance,
    pub brightness: Brightness,
    pub method: AnalysisMethod,
}

impl FeatureReport {
    pub fn has_tempo(&self) -> bool {
        self.bpm > 0.0
    }

    /// A positive true peak means the decoded signal exceeds full scale.
    pub fn is_clipping(&self) -> bool {
        self.true_peak_db > 0.0
    }
}

impl fmt::Display for EnergyLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            EnergyLevel::Low => "Low",
            EnergyLevel::Medium => "Medium",
            EnergyLevel::High => "High",
            EnergyLevel::VeryHigh => "Very High",
        })
    }
}

impl fmt::Display for Character {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Character::BassHeavy => "Bass Heavy",
            Character::Balanced => "Balanced",
            Character::BrightAiry => "Bright/Airy",
            Character::MidForward => "Mid-Forward",
        })
    }
}

impl fmt::Display for Brightness {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Brightness::VeryDark => "Very Dark/Deep",
            Brightness::Warm => "Warm/Mellow",
            Brightness::Neutral => "Neutral/Balanced",
            Brightness::Bright => "Bright/Crisp",
            Brightness::VeryBright => "Very Bright/Harsh",
        })
    }
}

impl fmt::Display for AnalysisMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            AnalysisMethod::AdvancedLibrary => "AdvancedLibrary",
            AnalysisMethod::NativeDsp => "NativeDSP",
        })
    }
}
