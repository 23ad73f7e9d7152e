//! Native tempo estimation: threshold peak picking over the middle third of
//! channel 0, then the most common inter-peak interval.
//!
//! The result is always folded into 70..=170 BPM. Material whose real tempo
//! lies outside that range lands in the wrong octave (a 35 BPM drone reads as
//! 70, a 340 BPM break as 170); the unfolded value is not kept.

use std::collections::BTreeMap;

use crate::audio::decode::AudioBuffer;

use super::thresholds::*;

/// Estimated BPM, or 0.0 when there are too few peaks to decide.
pub fn estimate_bpm(audio: &AudioBuffer) -> f32 {
    let samples = audio.channel(0);
    let sample_rate = audio.sample_rate();

    let start = samples.len() / 3;
    let end = samples.len() * 2 / 3;
    if end <= start {
        return 0.0;
    }
    let region = &samples[start..end];

    let threshold = detection_threshold(region);
    let peaks = pick_peaks(region, threshold, sample_rate);
    log::debug!(
        "Native tempo: threshold={:.3}, peaks={} in frames {}..{}",
        threshold,
        peaks.len(),
        start,
        end
    );

    if peaks.len() < TEMPO_MIN_PEAKS {
        return 0.0;
    }

    let interval = match dominant_interval(&peaks) {
        Some(i) if i > 0 => i,
        _ => return 0.0,
    };

    let raw = 60.0 / (interval as f64 / sample_rate as f64);
    let folded = fold_octave(raw);
    log::debug!(
        "Native tempo: interval={} samples, raw={:.1} BPM, folded={:.1} BPM",
        interval,
        raw,
        folded
    );
    folded.round() as f32
}

/// `max(0.15, 1.4 * rms)` with the RMS taken from every 10th sample.
fn detection_threshold(region: &[f32]) -> f64 {
    let (sum_sq, count) = region
        .iter()
        .step_by(TEMPO_RMS_DECIMATION)
        .fold((0.0f64, 0usize), |(sum, n), &s| (sum + (s as f64) * (s as f64), n + 1));
    let rms = if count == 0 {
        0.0
    } else {
        (sum_sq / count as f64).sqrt()
    };
    TEMPO_MIN_THRESHOLD.max(rms * TEMPO_RMS_FACTOR)
}

/// Offsets of samples above `threshold`, each at least the minimum gap after the previous one.
fn pick_peaks(region: &[f32], threshold: f64, sample_rate: u32) -> Vec<usize> {
    let min_gap = (sample_rate as f64 * TEMPO_MIN_PEAK_GAP_SECS).ceil() as usize;
    let mut peaks = Vec::new();
    let mut last: Option<usize> = None;

    for (i, &s) in region.iter().enumerate() {
        if (s.abs() as f64) <= threshold {
            continue;
        }
        if last.map_or(true, |l| i - l >= min_gap) {
            peaks.push(i);
            last = Some(i);
        }
    }
    peaks
}

/// Most frequent interval after snapping to 500-sample buckets; ties go to the shorter interval.
fn dominant_interval(peaks: &[usize]) -> Option<usize> {
    let mut histogram: BTreeMap<usize, usize> = BTreeMap::new();
    for w in peaks.windows(2) {
        let interval = w[1] - w[0];
        let bucket = ((interval as f64 / TEMPO_INTERVAL_QUANTUM as f64).round() as usize)
            * TEMPO_INTERVAL_QUANTUM;
        *histogram.entry(bucket).or_insert(0) += 1;
    }

    let mut best: Option<(usize, usize)> = None;
    for (&bucket, &count) in &histogram {
        if best.map_or(true, |(_, c)| count > c) {
            best = Some((bucket, count));
        }
    }
    best.map(|(bucket, _)| bucket)
}

/// Double or halve until the tempo sits in 70..=170.
pub fn fold_octave(mut bpm: f64) -> f64 {
    if !bpm.is_finite() || bpm <= 0.0 {
        return 0.0;
    }
    while bpm < TEMPO_FOLD_MIN_BPM {
        bpm *= 2.0;
    }
    while bpm > TEMPO_FOLD_MAX_BPM {
        bpm /= 2.0;
    }
    bpm
}
