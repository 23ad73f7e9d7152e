//! End-to-end tests: write WAV files with hound (plus a FLAC fixture), decode
//! them, analyse them.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use trackprobe::analysis::{loudness, measure, spectral, stereo, tempo};
use trackprobe::provider::{KeyEstimate, TempoEstimate};
use trackprobe::{
    decode_bytes, decode_file, AdvancedProvider, AnalysisMethod, Analyzer, AnalyzerOptions,
    AudioBuffer, CapabilityProvider, DecodeError, LibraryError, LibrarySettings,
    NativeOnlyProvider, SignalLibrary, SpectralMode,
};

const SR: u32 = 44100;

fn write_wav_i16(path: &Path, channels: &[Vec<f32>], sample_rate: u32) {
    let spec = hound::WavSpec {
        channels: channels.len() as u16,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(path, spec).unwrap();
    for i in 0..channels[0].len() {
        for ch in channels {
            let v = (ch[i].clamp(-1.0, 1.0) * i16::MAX as f32) as i16;
            writer.write_sample(v).unwrap();
        }
    }
    writer.finalize().unwrap();
}

fn write_wav_f32(path: &Path, channels: &[Vec<f32>], sample_rate: u32) {
    let spec = hound::WavSpec {
        channels: channels.len() as u16,
        sample_rate,
        bits_per_sample: 32,
        sample_format: hound::SampleFormat::Float,
    };
    let mut writer = hound::WavWriter::create(path, spec).unwrap();
    for i in 0..channels[0].len() {
        for ch in channels {
            writer.write_sample(ch[i]).unwrap();
        }
    }
    writer.finalize().unwrap();
}

fn sine_sweep(secs: f64, sr: u32, amplitude: f64, from_hz: f64, to_hz: f64) -> Vec<f32> {
    let n = (secs * sr as f64) as usize;
    let k = (to_hz - from_hz) / secs;
    (0..n)
        .map(|i| {
            let t = i as f64 / sr as f64;
            let phase = 2.0 * std::f64::consts::PI * (from_hz * t + 0.5 * k * t * t);
            (amplitude * phase.sin()) as f32
        })
        .collect()
}

fn tone(secs: f64, sr: u32, amplitude: f64, hz: f64) -> Vec<f32> {
    sine_sweep(secs, sr, amplitude, hz, hz)
}

/// Clicks every 0.5 s with a short decay over a silent background.
fn click_track(secs: f64, sr: u32) -> Vec<f32> {
    let len = (secs * sr as f64) as usize;
    let period = sr as usize / 2;
    (0..len)
        .map(|i| {
            let k = i % period;
            if k < 32 {
                0.9 * (-(k as f32) / 6.0).exp()
            } else {
                0.0
            }
        })
        .collect()
}

fn temp_wav(dir: &tempfile::TempDir, name: &str) -> PathBuf {
    dir.path().join(name)
}

fn native_analyzer() -> Analyzer {
    Analyzer::new(Arc::new(NativeOnlyProvider), AnalyzerOptions::default())
}

struct ScriptedLibrary {
    fail: bool,
}

impl SignalLibrary for ScriptedLibrary {
    fn name(&self) -> &'static str {
        "scripted"
    }

    fn key_extract(&mut self, _samples: &[f32], _sr: u32) -> Result<KeyEstimate, LibraryError> {
        if self.fail {
            Err(LibraryError::Call("scripted failure".into()))
        } else {
            Ok(KeyEstimate {
                key: "G".into(),
                scale: "major".into(),
            })
        }
    }

    fn tempo_extract(&mut self, _samples: &[f32], _sr: u32) -> Result<TempoEstimate, LibraryError> {
        if self.fail {
            Err(LibraryError::Call("scripted failure".into()))
        } else {
            Ok(TempoEstimate { bpm: 121.04 })
        }
    }
}

fn scripted(fail: bool) -> Arc<dyn CapabilityProvider> {
    Arc::new(AdvancedProvider::new(move || {
        Ok(Box::new(ScriptedLibrary { fail }) as Box<dyn SignalLibrary>)
    }))
}

#[test]
fn decodes_pcm16_stereo_wav() {
    let dir = tempfile::tempdir().unwrap();
    let path = temp_wav(&dir, "stereo.wav");
    let left = tone(1.0, SR, 0.5, 440.0);
    let right = tone(1.0, SR, 0.25, 440.0);
    write_wav_i16(&path, &[left, right], SR);

    let buf = decode_file(&path).unwrap();
    assert_eq!(buf.channel_count(), 2);
    assert_eq!(buf.sample_rate(), SR);
    assert_eq!(buf.frame_count(), SR as usize);
    assert!((buf.duration_seconds() - 1.0).abs() < 1e-9);

    let peak_l = buf.channel(0).iter().fold(0.0f32, |m, s| m.max(s.abs()));
    let peak_r = buf.channel(1).iter().fold(0.0f32, |m, s| m.max(s.abs()));
    assert!((peak_l - 0.5).abs() < 0.01);
    assert!((peak_r - 0.25).abs() < 0.01);
}

#[test]
fn decodes_float_wav_from_bytes() {
    let dir = tempfile::tempdir().unwrap();
    let path = temp_wav(&dir, "float.wav");
    write_wav_f32(&path, &[tone(0.5, 22050, 0.8, 100.0)], 22050);

    let bytes = std::fs::read(&path).unwrap();
    let buf = decode_bytes(bytes, Some("wav")).unwrap();
    assert_eq!(buf.channel_count(), 1);
    assert_eq!(buf.sample_rate(), 22050);
    assert_eq!(buf.frame_count(), 11025);
}

#[test]
fn corrupt_and_empty_inputs_are_decode_errors() {
    assert!(matches!(decode_bytes(Vec::new(), None), Err(DecodeError::Empty)));
    assert!(decode_bytes(b"definitely not audio at all".to_vec(), Some("wav")).is_err());

    let dir = tempfile::tempdir().unwrap();
    let missing = temp_wav(&dir, "missing.wav");
    assert!(matches!(decode_file(&missing), Err(DecodeError::Io(_))));
}

#[test]
fn zero_length_wav_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let path = temp_wav(&dir, "empty.wav");
    write_wav_i16(&path, &[Vec::new()], SR);
    assert!(decode_file(&path).is_err());
}

#[test]
fn every_stage_is_deterministic() {
    let l = click_track(12.0, SR)
        .iter()
        .zip(tone(12.0, SR, 0.1, 330.0))
        .map(|(a, b)| a + b)
        .collect::<Vec<f32>>();
    let r: Vec<f32> = l.iter().rev().copied().collect();
    let buf = AudioBuffer::new(vec![l, r], SR).unwrap();

    for _ in 0..3 {
        assert_eq!(loudness::loudness_db(&buf).to_bits(), loudness::loudness_db(&buf).to_bits());
        assert_eq!(loudness::true_peak_db(&buf).to_bits(), loudness::true_peak_db(&buf).to_bits());
        assert_eq!(stereo::stereo_image(&buf), stereo::stereo_image(&buf));
        assert_eq!(
            spectral::spectral_balance(&buf, SpectralMode::Heuristic),
            spectral::spectral_balance(&buf, SpectralMode::Heuristic)
        );
        assert_eq!(spectral::brightness(&buf), spectral::brightness(&buf));
        assert_eq!(tempo::estimate_bpm(&buf).to_bits(), tempo::estimate_bpm(&buf).to_bits());
    }
}

#[test]
fn mono_input_reports_mono_image() {
    let buf = AudioBuffer::mono(tone(3.0, SR, 0.3, 200.0), SR).unwrap();
    let image = stereo::stereo_image(&buf);
    assert_eq!(image.correlation, 1.0);
    assert_eq!(image.width, 0.0);
}

#[test]
fn scaling_down_lowers_loudness_and_peak() {
    let base = sine_sweep(5.0, SR, 0.9, 100.0, 3000.0);
    let mut prev: Option<(f32, f32)> = None;
    for k in [1.0f32, 0.5, 0.25, 0.1, 0.01] {
        let scaled: Vec<f32> = base.iter().map(|s| s * k).collect();
        let buf = AudioBuffer::mono(scaled, SR).unwrap();
        let levels = (loudness::loudness_db(&buf), loudness::true_peak_db(&buf));
        if let Some((l, p)) = prev {
            assert!(levels.0 < l, "loudness {} !< {}", levels.0, l);
            assert!(levels.1 < p, "peak {} !< {}", levels.1, p);
        }
        prev = Some(levels);
    }
}

#[test]
fn silence_uses_floor_values() {
    let buf = AudioBuffer::new(vec![vec![0.0; SR as usize * 4]; 2], SR).unwrap();
    let native = measure(&buf, SpectralMode::Heuristic, true);
    assert_eq!(native.true_peak_db, -100.0);
    assert_eq!(native.loudness_db, -100.0);
    assert!(native.loudness_db.is_finite());
    assert_eq!(native.bpm, 0.0);
    assert_eq!(native.stereo.correlation, 0.0);
    assert_eq!(native.stereo.width, 0.0);
}

#[test]
fn native_tempo_stays_in_fold_range() {
    for bpm in [45.0f64, 60.0, 88.0, 120.0, 150.0, 190.0] {
        let sr = 22050u32;
        let secs = 60.0;
        let period = 60.0 / bpm * sr as f64;
        let len = (secs * sr as f64) as usize;
        let mut samples = vec![0.0f32; len];
        let mut t = 0.0;
        while (t as usize) < len {
            samples[t as usize] = 0.95;
            t += period;
        }
        let buf = AudioBuffer::mono(samples, sr).unwrap();
        let estimate = tempo::estimate_bpm(&buf);
        assert!(
            estimate == 0.0 || (70.0..=170.0).contains(&estimate),
            "{} BPM clicks -> {}",
            bpm,
            estimate
        );
    }
}

#[test]
fn spectral_balance_always_sums_to_100() {
    let inputs = [
        tone(12.0, SR, 0.5, 50.0),
        tone(12.0, SR, 0.5, 900.0),
        tone(12.0, SR, 0.5, 7000.0),
        sine_sweep(12.0, SR, 0.5, 20.0, 15000.0),
        vec![0.0; SR as usize * 12],
    ];
    for samples in inputs {
        let buf = AudioBuffer::mono(samples, SR).unwrap();
        for mode in [SpectralMode::Heuristic, SpectralMode::Fft] {
            let b = spectral::spectral_balance(&buf, mode);
            assert_eq!(b.low as u32 + b.mid as u32 + b.high as u32, 100, "{:?}", b);
        }
    }
}

#[test]
fn provenance_follows_library_availability() {
    let audio = AudioBuffer::mono(click_track(20.0, SR), SR).unwrap();

    let report = Analyzer::new(scripted(false), AnalyzerOptions::default())
        .analyze_buffer(&audio)
        .unwrap();
    assert_eq!(report.method, AnalysisMethod::AdvancedLibrary);
    assert_ne!(report.key, "Unknown");
    assert_eq!(report.bpm, 121.0);

    let report = Analyzer::new(scripted(true), AnalyzerOptions::default())
        .analyze_buffer(&audio)
        .unwrap();
    assert_eq!(report.method, AnalysisMethod::NativeDsp);
    assert_eq!(report.key, "Unknown");
    assert_eq!(report.mode, "");
}

#[test]
fn unavailable_library_falls_back_to_native() {
    let audio = AudioBuffer::mono(click_track(20.0, SR), SR).unwrap();
    let provider = Arc::new(AdvancedProvider::spectral(LibrarySettings {
        fft_size: 1000,
        ..LibrarySettings::default()
    }));
    assert!(!provider.is_available());

    let report = Analyzer::new(provider, AnalyzerOptions::default())
        .analyze_buffer(&audio)
        .unwrap();
    assert_eq!(report.method, AnalysisMethod::NativeDsp);
    assert!((report.bpm - 120.0).abs() <= 1.0);
}

#[test]
fn built_in_library_handles_click_track() {
    let audio = AudioBuffer::mono(click_track(20.0, SR), SR).unwrap();
    let provider = Arc::new(AdvancedProvider::spectral(LibrarySettings::default()));
    let report = Analyzer::new(provider, AnalyzerOptions::default())
        .analyze_buffer(&audio)
        .unwrap();
    assert_eq!(report.method, AnalysisMethod::AdvancedLibrary);
    assert!((report.bpm - 120.0).abs() < 3.0, "got {}", report.bpm);
}

#[test]
fn sine_sweep_scenario() {
    let dir = tempfile::tempdir().unwrap();
    let path = temp_wav(&dir, "sweep.wav");
    write_wav_i16(&path, &[sine_sweep(30.0, SR, 0.5, 100.0, 2000.0)], SR);

    let audio = decode_file(&path).unwrap();
    let native = measure(&audio, SpectralMode::Heuristic, true);
    assert!((native.true_peak_db + 6.02).abs() < 0.02, "peak {}", native.true_peak_db);
    assert_eq!(native.stereo.correlation, 1.0);
    assert_eq!(native.stereo.width, 0.0);
    // Crest peaks of the 0.5 sweep clear the 0.495 threshold about every
    // 13000 samples in the middle ten seconds: 203.5 BPM, folded to 102.
    assert_eq!(native.bpm, 102.0);

    let report = native_analyzer().analyze_buffer(&audio).unwrap();
    assert_eq!(report.bpm, 102.0);
    assert_eq!(report.method, AnalysisMethod::NativeDsp);
}

fn fixture(name: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("tests").join("fixtures").join(name)
}

fn assert_flac_tone(buf: &AudioBuffer) {
    assert_eq!(buf.channel_count(), 2);
    assert_eq!(buf.sample_rate(), 8000);
    assert!((buf.duration_seconds() - 1.0).abs() < 0.01, "{}", buf.duration_seconds());

    let peak_l = buf.channel(0).iter().fold(0.0f32, |m, s| m.max(s.abs()));
    let peak_r = buf.channel(1).iter().fold(0.0f32, |m, s| m.max(s.abs()));
    assert!((peak_l - 0.5).abs() < 0.01, "left peak {}", peak_l);
    assert!((peak_r - 0.25).abs() < 0.01, "right peak {}", peak_r);
}

/// 1 s of 440 Hz (left, 0.5) and 660 Hz (right, 0.25) at 8 kHz, 16-bit FLAC.
const FLAC_TONE: &str = "tone_stereo_8k.flac";

#[test]
fn decodes_flac_file() {
    let buf = decode_file(&fixture(FLAC_TONE)).unwrap();
    assert_flac_tone(&buf);
}

#[test]
fn decodes_flac_bytes_with_and_without_hint() {
    let bytes = std::fs::read(fixture(FLAC_TONE)).unwrap();
    let hinted = decode_bytes(bytes.clone(), Some("flac")).unwrap();
    assert_flac_tone(&hinted);

    let sniffed = decode_bytes(bytes, None).unwrap();
    assert_eq!(sniffed.channels(), hinted.channels());
}

#[test]
fn out_of_phase_scenario() {
    let dir = tempfile::tempdir().unwrap();
    let path = temp_wav(&dir, "phase.wav");
    let left = sine_sweep(40.0, SR, 0.6, 80.0, 1200.0);
    let right: Vec<f32> = left.iter().map(|s| -s).collect();
    write_wav_i16(&path, &[left, right], SR);

    let audio = decode_file(&path).unwrap();
    let image = stereo::stereo_image(&audio);
    assert!((image.correlation + 1.0).abs() < 0.011, "correlation {}", image.correlation);
    assert!(image.width > 0.99);
}

#[test]
fn click_track_scenario() {
    let dir = tempfile::tempdir().unwrap();
    let path = temp_wav(&dir, "clicks.wav");
    write_wav_i16(&path, &[click_track(20.0, SR)], SR);

    let report = native_analyzer().analyze_file(&path).unwrap().unwrap();
    assert_eq!(report.method, AnalysisMethod::NativeDsp);
    assert!((report.bpm - 120.0).abs() <= 1.0, "bpm {}", report.bpm);
    assert_eq!(report.stereo_correlation, 1.0);
}

#[test]
fn silent_file_gives_no_native_report() {
    let dir = tempfile::tempdir().unwrap();
    let path = temp_wav(&dir, "silence.wav");
    write_wav_i16(&path, &[vec![0.0; SR as usize * 5]], SR);
    assert!(native_analyzer().analyze_file(&path).unwrap().is_none());
}

#[test]
fn report_serializes_with_labels() {
    let audio = AudioBuffer::mono(click_track(20.0, SR), SR).unwrap();
    let report = native_analyzer().analyze_buffer(&audio).unwrap();
    let json = serde_json::to_value(&report).unwrap();
    assert_eq!(json["method"], "NativeDSP");
    assert_eq!(json["key"], "Unknown");
    assert!(json["spectralBalance"]["character"].is_string());
    assert!(json["energyLevel"].is_string());
    assert!(json["truePeakDb"].is_number());
}

#[test]
fn analyzer_is_shareable_across_threads() {
    let analyzer = Arc::new(native_analyzer());
    let handles: Vec<_> = (0..4)
        .map(|i| {
            let analyzer = analyzer.clone();
            std::thread::spawn(move || {
                let mut samples = click_track(20.0, SR);
                for s in samples.iter_mut() {
                    *s *= 1.0 - i as f32 * 0.02;
                }
                let audio = AudioBuffer::mono(samples, SR).unwrap();
                analyzer.analyze_buffer(&audio).map(|r| r.bpm)
            })
        })
        .collect();
    for h in handles {
        let bpm = h.join().unwrap().unwrap();
        assert!((bpm - 120.0).abs() <= 1.0);
    }
}
