use rustfft::{num_complex::Complex, FftPlanner};
use serde::Deserialize;

use crate::audio::decode::AudioBuffer;

use super::features::{Brightness, SpectralBalance};
use super::thresholds::*;

const FFT_SIZE: usize = 2048;
const HOP_SIZE: usize = 1024;

/// How the low/mid/high split is estimated.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum SpectralMode {
    /// Amplitude vs. first-difference energy, bucketed into fixed triples.
    #[default]
    Heuristic,
    /// Short-time FFT band power.
    Fft,
}

pub fn spectral_balance(audio: &AudioBuffer, mode: SpectralMode) -> SpectralBalance {
    let (window, prev) = balance_window(audio);
    let balance = match mode {
        SpectralMode::Heuristic => heuristic_balance(window, prev),
        SpectralMode::Fft => fft_balance(window, audio.sample_rate())
            .unwrap_or_else(|| heuristic_balance(window, prev)),
    };
    log::debug!(
        "Spectral balance ({:?}): low={} mid={} high={} ({})",
        mode,
        balance.low,
        balance.mid,
        balance.high,
        balance.character
    );
    balance
}

/// Five seconds of channel 0 starting at the midpoint, clipped to the buffer,
/// plus the sample just before it.
fn balance_window(audio: &AudioBuffer) -> (&[f32], f32) {
    let samples = audio.channel(0);
    let len = (audio.sample_rate() as usize * SPECTRAL_WINDOW_SECS as usize).min(samples.len());
    let start = samples.len() / 2;
    let end = (start + len).min(samples.len());
    let prev = if start > 0 { samples[start - 1] } else { 0.0 };
    (&samples[start..end], prev)
}

fn heuristic_balance(window: &[f32], prev: f32) -> SpectralBalance {
    if window.is_empty() {
        return SpectralBalance::from_triple(BALANCE_EVEN);
    }

    let mut low_energy = 0.0f64;
    let mut high_energy = 0.0f64;
    let mut prev = prev as f64;
    for &s in window {
        let s = s as f64;
        low_energy += s.abs();
        high_energy += (s - prev).abs();
        prev = s;
    }
    low_energy /= window.len() as f64;
    high_energy /= window.len() as f64;

    let ratio = high_energy / low_energy.max(SPECTRAL_LOW_ENERGY_FLOOR);
    let triple = if ratio < SPECTRAL_RATIO_DEEP_BELOW {
        BALANCE_DEEP
    } else if ratio < SPECTRAL_RATIO_BALANCED_BELOW {
        BALANCE_EVEN
    } else {
        BALANCE_BRIGHT
    };
    SpectralBalance::from_triple(triple)
}

/// Band power from a Hann-windowed STFT. `None` for a silent or too-short window.
fn fft_balance(window: &[f32], sample_rate: u32) -> Option<SpectralBalance> {
    if window.len() < FFT_SIZE {
        return None;
    }

    let mut planner = FftPlanner::<f32>::new();
    let fft = planner.plan_fft_forward(FFT_SIZE);
    let hann = hann_window(FFT_SIZE);
    let freq_resolution = sample_rate as f32 / FFT_SIZE as f32;

    let mut bands = [0.0f64; 3];
    let mut buffer = vec![Complex::new(0.0f32, 0.0); FFT_SIZE];
    let mut pos = 0;
    while pos + FFT_SIZE <= window.len() {
        for (slot, (&s, &w)) in buffer
            .iter_mut()
            .zip(window[pos..pos + FFT_SIZE].iter().zip(hann.iter()))
        {
            *slot = Complex::new(s * w, 0.0);
        }
        fft.process(&mut buffer);

        // Skip DC.
        for (bin, c) in buffer[1..FFT_SIZE / 2].iter().enumerate() {
            let freq = (bin + 1) as f32 * freq_resolution;
            let power = c.norm_sqr() as f64;
            let band = if freq < BAND_LOW_MID_HZ {
                0
            } else if freq < BAND_MID_HIGH_HZ {
                1
            } else {
                2
            };
            bands[band] += power;
        }
        pos += HOP_SIZE;
    }

    let total: f64 = bands.iter().sum();
    if total <= 1e-12 {
        return None;
    }
    let [low, mid, high] = apportion_percent(bands, total);
    Some(SpectralBalance::from_triple((low, mid, high)))
}

/// Whole percentages by largest remainder, so the parts always add to 100.
fn apportion_percent(parts: [f64; 3], total: f64) -> [u8; 3] {
    let exact: Vec<f64> = parts.iter().map(|p| p / total * 100.0).collect();
    let mut whole: [u8; 3] = [0; 3];
    for (w, e) in whole.iter_mut().zip(exact.iter()) {
        *w = e.floor() as u8;
    }
    let assigned: u32 = whole.iter().map(|&w| w as u32).sum();
    let mut order: Vec<usize> = (0..3).collect();
    order.sort_by(|&a, &b| {
        let ra = exact[a] - exact[a].floor();
        let rb = exact[b] - exact[b].floor();
        rb.total_cmp(&ra).then(a.cmp(&b))
    });
    for &i in order.iter().take(100u32.saturating_sub(assigned) as usize) {
        whole[i] += 1;
    }
    whole
}

/// Zero-crossing rate of the first ten seconds of channel 0, mapped to a label.
pub fn brightness(audio: &AudioBuffer) -> Brightness {
    let zcr = zero_crossing_rate(audio);
    let label = Brightness::from_zcr(zcr);
    log::debug!("Brightness: zcr={:.4} ({})", zcr, label);
    label
}

pub fn zero_crossing_rate(audio: &AudioBuffer) -> f64 {
    let samples = audio.channel(0);
    let len = samples
        .len()
        .min(audio.sample_rate() as usize * BRIGHTNESS_WINDOW_SECS as usize);
    if len == 0 {
        return 0.0;
    }
    let crossings = samples[..len]
        .windows(2)
        .filter(|w| (w[0] < 0.0) != (w[1] < 0.0))
        .count();
    crossings as f64 / len as f64
}

/// Symmetric Hann window of `size` points.
pub(crate) fn hann_window(size: usize) -> Vec<f32> {
    (0..size)
        .map(|i| {
            0.5 * (1.0 - (2.0 * std::f32::consts::PI * i as f32 / (size - 1) as f32).cos())
        })
        .collect()
}
