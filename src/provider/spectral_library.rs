//! Built-in FFT-based signal library.
//!
//! Tempo comes from spectral-flux onsets and the median inter-onset interval.
//! Key comes from a long-term chroma vector matched against rotated
//! Krumhansl-Kessler profiles.

use std::sync::Arc;

use rustfft::{num_complex::Complex, Fft, FftPlanner};
use serde::Deserialize;

use super::{KeyEstimate, SignalLibrary, TempoEstimate};
use crate::analysis::spectral::hann_window;
use crate::error::LibraryError;

const ONSET_FFT_SIZE: usize = 1024;
const ONSET_HOP_SIZE: usize = 512;
/// Local-mean window for onset thresholding, in frames either side.
const ONSET_MEAN_WINDOW: usize = 20;
const ONSET_MIN_GAP_SECS: f32 = 0.1;
/// Inter-onset intervals outside 60..200 BPM are ignored.
const MIN_BEAT_INTERVAL_SECS: f32 = 0.3;
const MAX_BEAT_INTERVAL_SECS: f32 = 1.0;

const CHROMA_MIN_HZ: f32 = 80.0;
const CHROMA_MAX_HZ: f32 = 4000.0;
const A4_HZ: f32 = 440.0;

const MAJOR_PROFILE: [f32; 12] = [
    6.35, 2.23, 3.48, 2.33, 4.38, 4.09, 2.52, 5.19, 2.39, 3.66, 2.29, 2.88,
];
const MINOR_PROFILE: [f32; 12] = [
    6.33, 2.68, 3.52, 5.38, 2.60, 3.53, 2.54, 4.75, 3.98, 2.69, 3.34, 3.17,
];
const NOTE_NAMES: [&str; 12] = [
    "C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B",
];

#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
pub struct LibrarySettings {
    /// Frame size for key analysis; power of two, at least 512.
    #[serde(default = "default_fft_size")]
    pub fft_size: usize,
    #[serde(default = "default_hop_size")]
    pub hop_size: usize,
}

impl Default for LibrarySettings {
    fn default() -> Self {
        Self {
            fft_size: default_fft_size(),
            hop_size: default_hop_size(),
        }
    }
}

fn default_fft_size() -> usize { 4096 }
fn default_hop_size() -> usize { 2048 }

pub struct SpectralLibrary {
    settings: LibrarySettings,
    key_fft: Arc<dyn Fft<f32>>,
    key_window: Vec<f32>,
    onset_fft: Arc<dyn Fft<f32>>,
    onset_window: Vec<f32>,
}

impl SpectralLibrary {
    pub fn new(settings: LibrarySettings) -> Result<Self, LibraryError> {
        if settings.fft_size < 512 || !settings.fft_size.is_power_of_two() {
            return Err(LibraryError::Init(format!(
                "fft_size must be a power of two >= 512, got {}",
                settings.fft_size
            )));
        }
        if settings.hop_size == 0 || settings.hop_size > settings.fft_size {
            return Err(LibraryError::Init(format!(
                "hop_size must be in 1..={}, got {}",
                settings.fft_size, settings.hop_size
            )));
        }

        let mut planner = FftPlanner::<f32>::new();
        let key_fft = planner.plan_fft_forward(settings.fft_size);
        let onset_fft = planner.plan_fft_forward(ONSET_FFT_SIZE);

        Ok(Self {
            key_window: hann_window(settings.fft_size),
            onset_window: hann_window(ONSET_FFT_SIZE),
            settings,
            key_fft,
            onset_fft,
        })
    }

    /// Onset strength per frame: positive spectral flux, scaled to a peak of 1.
    fn onset_strength(&self, samples: &[f32]) -> Vec<f32> {
        let mut prev = vec![0.0f32; ONSET_FFT_SIZE / 2];
        let mut flux = Vec::new();
        for_each_frame(
            samples,
            self.onset_fft.as_ref(),
            &self.onset_window,
            ONSET_HOP_SIZE,
            |magnitudes| {
                let value: f32 = magnitudes
                    .iter()
                    .zip(prev.iter())
                    .map(|(cur, prev)| (cur - prev).max(0.0))
                    .sum();
                flux.push(value);
                prev.copy_from_slice(magnitudes);
            },
        );

        let peak = flux.iter().copied().fold(0.0f32, f32::max);
        if peak > 0.0 {
            for v in flux.iter_mut() {
                *v /= peak;
            }
        }
        flux
    }

    fn chroma(&self, samples: &[f32], sample_rate: u32) -> [f32; 12] {
        let freq_resolution = sample_rate as f32 / self.settings.fft_size as f32;
        let mut chroma = [0.0f32; 12];
        for_each_frame(
            samples,
            self.key_fft.as_ref(),
            &self.key_window,
            self.settings.hop_size,
            |magnitudes| {
                for (bin, &mag) in magnitudes.iter().enumerate().skip(1) {
                    let freq = bin as f32 * freq_resolution;
                    if !(CHROMA_MIN_HZ..CHROMA_MAX_HZ).contains(&freq) {
                        continue;
                    }
                    chroma[pitch_class(freq)] += mag * mag;
                }
            },
        );
        chroma
    }
}

impl SignalLibrary for SpectralLibrary {
    fn name(&self) -> &'static str {
        "spectral"
    }

    fn key_extract(
        &mut self,
        samples: &[f32],
        sample_rate: u32,
    ) -> Result<KeyEstimate, LibraryError> {
        if samples.len() < self.settings.fft_size {
            return Err(LibraryError::NoEstimate("too few samples for key analysis".into()));
        }
        let chroma = self.chroma(samples, sample_rate);
        if chroma.iter().sum::<f32>() <= 1e-9 {
            return Err(LibraryError::NoEstimate("no tonal energy".into()));
        }

        let mut best: Option<(f32, usize, &str)> = None;
        for tonic in 0..12 {
            for (profile, scale) in [(&MAJOR_PROFILE, "major"), (&MINOR_PROFILE, "minor")] {
                let score = rotated_correlation(&chroma, profile, tonic);
                if best.map_or(true, |(s, _, _)| score > s) {
                    best = Some((score, tonic, scale));
                }
            }
        }

        let (score, tonic, scale) =
            best.ok_or_else(|| LibraryError::NoEstimate("no key candidates".into()))?;
        if !score.is_finite() {
            return Err(LibraryError::NoEstimate("flat chroma".into()));
        }
        log::debug!("Key: {} {} (r={:.3})", NOTE_NAMES[tonic], scale, score);

        Ok(KeyEstimate {
            key: NOTE_NAMES[tonic].to_string(),
            scale: scale.to_string(),
        })
    }

    fn tempo_extract(
        &mut self,
        samples: &[f32],
        sample_rate: u32,
    ) -> Result<TempoEstimate, LibraryError> {
        let flux = self.onset_strength(samples);
        let frame_secs = ONSET_HOP_SIZE as f32 / sample_rate as f32;
        let onsets = detect_onsets(&flux, frame_secs);

        let mut intervals: Vec<f32> = onsets
            .windows(2)
            .map(|w| w[1] - w[0])
            .filter(|&i| (MIN_BEAT_INTERVAL_SECS..=MAX_BEAT_INTERVAL_SECS).contains(&i))
            .collect();
        if intervals.len() < 2 {
            return Err(LibraryError::NoEstimate(format!(
                "{} onsets, {} usable intervals",
                onsets.len(),
                intervals.len()
            )));
        }

        intervals.sort_by(|a, b| a.total_cmp(b));
        let median = intervals[intervals.len() / 2];
        Ok(TempoEstimate { bpm: 60.0 / median })
    }
}

/// Onset times (seconds) at local maxima above an adaptive threshold.
fn detect_onsets(flux: &[f32], frame_secs: f32) -> Vec<f32> {
    let mut onsets: Vec<f32> = Vec::new();

    for i in 0..flux.len() {
        let start = i.saturating_sub(ONSET_MEAN_WINDOW);
        let end = (i + ONSET_MEAN_WINDOW + 1).min(flux.len());
        let local_mean = flux[start..end].iter().sum::<f32>() / (end - start) as f32;
        let threshold = local_mean * 1.5 + 0.01;

        if flux[i] <= threshold {
            continue;
        }

        let is_peak = (i == 0 || flux[i] >= flux[i - 1])
            && (i == flux.len() - 1 || flux[i] >= flux[i + 1]);
        let time = i as f32 * frame_secs;
        let far_enough = onsets
            .last()
            .map_or(true, |&last| time - last > ONSET_MIN_GAP_SECS);

        if is_peak && far_enough {
            onsets.push(time);
        }
    }

    onsets
}

/// Pearson correlation of `chroma` against `profile` rooted at `tonic`.
fn rotated_correlation(chroma: &[f32; 12], profile: &[f32; 12], tonic: usize) -> f32 {
    let rotated: Vec<f32> = (0..12).map(|i| chroma[(i + tonic) % 12]).collect();
    let mean_c = rotated.iter().sum::<f32>() / 12.0;
    let mean_p = profile.iter().sum::<f32>() / 12.0;

    let mut num = 0.0f32;
    let mut var_c = 0.0f32;
    let mut var_p = 0.0f32;
    for (c, p) in rotated.iter().zip(profile.iter()) {
        let dc = c - mean_c;
        let dp = p - mean_p;
        num += dc * dp;
        var_c += dc * dc;
        var_p += dp * dp;
    }
    num / (var_c * var_p).sqrt()
}

fn pitch_class(freq: f32) -> usize {
    let midi = 69.0 + 12.0 * (freq / A4_HZ).log2();
    (midi.round() as i32).rem_euclid(12) as usize
}

/// Run `f` on the magnitude spectrum (first half) of each full frame.
fn for_each_frame<F>(samples: &[f32], fft: &dyn Fft<f32>, window: &[f32], hop: usize, mut f: F)
where
    F: FnMut(&[f32]),
{
    let size = window.len();
    let mut buffer = vec![Complex::new(0.0f32, 0.0); size];
    let mut magnitudes = vec![0.0f32; size / 2];
    let mut pos = 0;
    while pos + size <= samples.len() {
        for (slot, (&s, &w)) in buffer.iter_mut().zip(samples[pos..pos + size].iter().zip(window)) {
            *slot = Complex::new(s * w, 0.0);
        }
        fft.process(&mut buffer);
        for (m, c) in magnitudes.iter_mut().zip(buffer.iter()) {
            *m = c.norm();
        }
        f(&magnitudes);
        pos += hop;
    }
}
