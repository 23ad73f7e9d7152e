use crate::audio::decode::AudioBuffer;

use super::features::StereoImage;
use super::thresholds::{round_to, STEREO_DECIMATION, STEREO_HALF_WINDOW_SECS};

/// Pearson correlation and side/mid width of channels 0 and 1 over the
/// centre 30 seconds. Mono input returns `StereoImage::MONO`.
pub fn stereo_image(audio: &AudioBuffer) -> StereoImage {
    if audio.channel_count() < 2 {
        return StereoImage::MONO;
    }

    let left = audio.channel(0);
    let right = audio.channel(1);
    let len = audio.frame_count();

    let half_window = audio.sample_rate() as usize * STEREO_HALF_WINDOW_SECS as usize;
    let mid = len / 2;
    let start = mid.saturating_sub(half_window);
    let end = (mid + half_window).min(len);

    let mut sum_lr = 0.0f64;
    let mut sum_ll = 0.0f64;
    let mut sum_rr = 0.0f64;
    let mut sum_diff_sq = 0.0f64;
    let mut sum_sum_sq = 0.0f64;

    for i in (start..end).step_by(STEREO_DECIMATION) {
        let l = left[i] as f64;
        let r = right[i] as f64;

        sum_lr += l * r;
        sum_ll += l * l;
        sum_rr += r * r;

        let diff = l - r;
        let sum = l + r;
        sum_diff_sq += diff * diff;
        sum_sum_sq += sum * sum;
    }

    let denominator = (sum_ll * sum_rr).sqrt();
    let correlation = if denominator == 0.0 {
        0.0
    } else {
        sum_lr / denominator
    };

    // Pure side content (L == -R) has no mid energy at all: widest possible.
    let width = if sum_sum_sq > 0.0 {
        sum_diff_sq / sum_sum_sq
    } else if sum_diff_sq > 0.0 {
        1.0
    } else {
        0.0
    };

    let image = StereoImage {
        correlation: round_to(correlation.clamp(-1.0, 1.0), 2) as f32,
        width: round_to(width.clamp(0.0, 1.0), 2) as f32,
    };
    log::debug!(
        "Stereo: correlation={:.2}, width={:.2} (frames {}..{})",
        image.correlation,
        image.width,
        start,
        end
    );
    image
}
