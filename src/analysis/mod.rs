pub mod features;
pub mod loudness;
pub mod spectral;
pub mod stereo;
pub mod tempo;
pub mod thresholds;

use crate::audio::decode::AudioBuffer;
use features::NativeMeasurements;
use spectral::SpectralMode;

/// Run the four independent native stages over one buffer.
///
/// With `parallel` set the stages are forked onto the rayon pool; the result
/// is identical either way.
pub fn measure(audio: &AudioBuffer, mode: SpectralMode, parallel: bool) -> NativeMeasurements {
    let ((loudness_db, true_peak_db), (stereo, (balance, brightness)), bpm) = if parallel {
        let ((levels, stereo), (spectrum, bpm)) = rayon::join(
            || {
                rayon::join(
                    || (loudness::loudness_db(audio), loudness::true_peak_db(audio)),
                    || stereo::stereo_image(audio),
                )
            },
            || {
                rayon::join(
                    || (spectral::spectral_balance(audio, mode), spectral::brightness(audio)),
                    || tempo::estimate_bpm(audio),
                )
            },
        );
        (levels, (stereo, spectrum), bpm)
    } else {
        (
            (loudness::loudness_db(audio), loudness::true_peak_db(audio)),
            (
                stereo::stereo_image(audio),
                (spectral::spectral_balance(audio, mode), spectral::brightness(audio)),
            ),
            tempo::estimate_bpm(audio),
        )
    };

    log::debug!(
        "Native: loudness={:.1} dB, peak={:.2} dB, bpm={:.0}",
        loudness_db,
        true_peak_db,
        bpm
    );

    NativeMeasurements {
        loudness_db,
        true_peak_db,
        stereo,
        balance,
        brightness,
        bpm,
    }
}
