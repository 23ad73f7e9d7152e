use std::path::Path;
use std::sync::Arc;

use crate::analysis;
use crate::analysis::features::{AnalysisMethod, EnergyLevel, FeatureReport, NativeMeasurements};
use crate::analysis::spectral::SpectralMode;
use crate::audio::decode::{self, AudioBuffer};
use crate::error::DecodeError;
use crate::provider::CapabilityProvider;

pub const UNKNOWN_KEY: &str = "Unknown";

#[derive(Clone, Copy, Debug)]
pub struct AnalyzerOptions {
    pub spectral_mode: SpectralMode,
    /// Run the native stages concurrently on the rayon pool.
    pub parallel_stages: bool,
}

impl Default for AnalyzerOptions {
    fn default() -> Self {
        Self {
            spectral_mode: SpectralMode::Heuristic,
            parallel_stages: true,
        }
    }
}

/// Turns decoded audio into a `FeatureReport`.
///
/// Holds no per-file state, so one `Analyzer` can serve many files on many
/// threads at once.
#[derive(Clone)]
pub struct Analyzer {
    provider: Arc<dyn CapabilityProvider>,
    options: AnalyzerOptions,
}

impl Analyzer {
    pub fn new(provider: Arc<dyn CapabilityProvider>, options: AnalyzerOptions) -> Self {
        Self { provider, options }
    }

    pub fn provider_name(&self) -> &'static str {
        self.provider.name()
    }

    /// Decode and analyse a file. `Ok(None)` means the file decoded but no
    /// tempo could be determined by either path.
    pub fn analyze_file(&self, path: &Path) -> Result<Option<FeatureReport>, DecodeError> {
        let audio = decode::decode_file(path)?;
        Ok(self.analyze_buffer(&audio))
    }

    pub fn analyze_bytes(
        &self,
        bytes: Vec<u8>,
        extension: Option<&str>,
    ) -> Result<Option<FeatureReport>, DecodeError> {
        let audio = decode::decode_bytes(bytes, extension)?;
        Ok(self.analyze_buffer(&audio))
    }

    pub fn analyze_buffer(&self, audio: &AudioBuffer) -> Option<FeatureReport> {
        let native = analysis::measure(
            audio,
            self.options.spectral_mode,
            self.options.parallel_stages,
        );

        if let Some(advanced) = self.provider.advanced(audio) {
            return Some(build_report(
                audio,
                &native,
                advanced.bpm,
                advanced.key,
                advanced.mode,
                AnalysisMethod::AdvancedLibrary,
            ));
        }

        if native.bpm > 0.0 {
            return Some(build_report(
                audio,
                &native,
                native.bpm,
                UNKNOWN_KEY.to_string(),
                String::new(),
                AnalysisMethod::NativeDsp,
            ));
        }

        log::info!(
            "No tempo from {} or native DSP; no report for this file",
            self.provider.name()
        );
        None
    }
}

fn build_report(
    audio: &AudioBuffer,
    native: &NativeMeasurements,
    bpm: f32,
    key: String,
    mode: String,
    method: AnalysisMethod,
) -> FeatureReport {
    FeatureReport {
        bpm,
        key,
        mode,
        energy_level: EnergyLevel::from_loudness(native.loudness_db),
        duration_seconds: audio.duration_seconds(),
        sample_rate: audio.sample_rate(),
        channels: audio.channel_count(),
        loudness_db: native.loudness_db,
        true_peak_db: native.true_peak_db,
        stereo_correlation: native.stereo.correlation,
        stereo_width: native.stereo.width,
        spectral_balance: native.balance,
        brightness: native.brightness,
        method,
    }
}
