//! Fixed tuning constants for the native analysis stages.
//!
//! These are design constants, not runtime settings.

/// Reported in place of `-inf` dBFS for silent input.
pub const SILENCE_FLOOR_DB: f32 = -100.0;

/// Loudness is measured over at most this much of channel 0.
pub const LOUDNESS_WINDOW_SECS: u32 = 60;

// Energy level buckets (dBFS of RMS loudness).
pub const ENERGY_VERY_HIGH_ABOVE_DB: f32 = -8.0;
pub const ENERGY_HIGH_ABOVE_DB: f32 = -12.0;
pub const ENERGY_LOW_BELOW_DB: f32 = -20.0;

/// Half-width of the centred stereo analysis window.
pub const STEREO_HALF_WINDOW_SECS: u32 = 15;
pub const STEREO_DECIMATION: usize = 10;

/// Length of the spectral balance window, starting at the buffer midpoint.
pub const SPECTRAL_WINDOW_SECS: u32 = 5;
pub const SPECTRAL_LOW_ENERGY_FLOOR: f64 = 0.001;
pub const SPECTRAL_RATIO_DEEP_BELOW: f64 = 0.05;
pub const SPECTRAL_RATIO_BALANCED_BELOW: f64 = 0.15;

/// (low, mid, high) percentage triples for the three ratio buckets.
pub const BALANCE_DEEP: (u8, u8, u8) = (70, 20, 10);
pub const BALANCE_EVEN: (u8, u8, u8) = (40, 40, 20);
pub const BALANCE_BRIGHT: (u8, u8, u8) = (20, 30, 50);

// Character rule, checked in this order.
pub const CHARACTER_BASS_ABOVE_PCT: u8 = 50;
pub const CHARACTER_BRIGHT_ABOVE_PCT: u8 = 40;
pub const CHARACTER_MID_ABOVE_PCT: u8 = 50;

/// Band edges for the FFT spectral mode.
pub const BAND_LOW_MID_HZ: f32 = 250.0;
pub const BAND_MID_HIGH_HZ: f32 = 4000.0;

/// Brightness is measured over at most this much of channel 0.
pub const BRIGHTNESS_WINDOW_SECS: u32 = 10;
// Zero-crossing-rate bands, upper bounds (exclusive).
pub const ZCR_VERY_DARK_BELOW: f64 = 0.02;
pub const ZCR_WARM_BELOW: f64 = 0.04;
pub const ZCR_NEUTRAL_BELOW: f64 = 0.08;
pub const ZCR_BRIGHT_BELOW: f64 = 0.15;

pub const TEMPO_RMS_DECIMATION: usize = 10;
pub const TEMPO_MIN_THRESHOLD: f64 = 0.15;
pub const TEMPO_RMS_FACTOR: f64 = 1.4;
/// Minimum gap between detected peaks; caps native detection at 200 BPM.
pub const TEMPO_MIN_PEAK_GAP_SECS: f64 = 0.3;
pub const TEMPO_MIN_PEAKS: usize = 10;
pub const TEMPO_INTERVAL_QUANTUM: usize = 500;
pub const TEMPO_FOLD_MIN_BPM: f64 = 70.0;
pub const TEMPO_FOLD_MAX_BPM: f64 = 170.0;

/// Round to a fixed number of decimal places.
pub fn round_to(value: f64, decimals: i32) -> f64 {
    let scale = 10f64.powi(decimals);
    (value * scale).round() / scale
}

/// Amplitude to dBFS, with silence mapped to the floor.
pub fn amplitude_to_db(amplitude: f64) -> f64 {
    if amplitude > 0.0 {
        20.0 * amplitude.log10()
    } else {
        SILENCE_FLOOR_DB as f64
    }
}
