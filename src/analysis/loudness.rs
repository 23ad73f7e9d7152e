use crate::audio::decode::AudioBuffer;

use super::thresholds::{amplitude_to_db, round_to, LOUDNESS_WINDOW_SECS};

/// RMS level of the first minute of channel 0, in dBFS, one decimal.
pub fn loudness_db(audio: &AudioBuffer) -> f32 {
    let samples = audio.channel(0);
    let len = samples.len().min(audio.sample_rate() as usize * LOUDNESS_WINDOW_SECS as usize);
    if len == 0 {
        return amplitude_to_db(0.0) as f32;
    }

    let sum: f64 = samples[..len].iter().map(|&s| (s as f64) * (s as f64)).sum();
    let rms = (sum / len as f64).sqrt();
    let loudness = round_to(amplitude_to_db(rms), 1) as f32;
    log::debug!("Loudness: rms={:.5} over {} frames ({:.1} dB)", rms, len, loudness);
    loudness
}

/// Highest absolute sample over every channel, in dBFS, two decimals.
pub fn true_peak_db(audio: &AudioBuffer) -> f32 {
    let peak = audio
        .channels()
        .iter()
        .flat_map(|ch| ch.iter())
        .map(|s| s.abs())
        .fold(0.0f32, f32::max);
    let peak_db = round_to(amplitude_to_db(peak as f64), 2) as f32;
    log::debug!("True peak: {:.5} ({:.2} dB)", peak, peak_db);
    peak_db
}
