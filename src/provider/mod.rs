//! Capability providers: where tempo and key come from when something better
//! than the native estimator is available.
//!
//! The orchestrator holds one `Arc<dyn CapabilityProvider>`. `NativeOnlyProvider`
//! never offers anything; `AdvancedProvider` wraps a lazily initialised
//! `SignalLibrary` and hides every library failure behind `None`.

pub mod spectral_library;

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex, OnceLock};

use crate::analysis::thresholds::round_to;
use crate::audio::decode::AudioBuffer;
use crate::error::LibraryError;

pub use spectral_library::{LibrarySettings, SpectralLibrary};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct KeyEstimate {
    /// Tonic name, e.g. "F#".
    pub key: String,
    /// "major" or "minor".
    pub scale: String,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TempoEstimate {
    pub bpm: f32,
}

/// An embedded signal-processing library. Calls take `&mut self`, so
/// implementations need not be reentrant; `AdvancedProvider` never runs two
/// calls on the same instance at once.
pub trait SignalLibrary: Send {
    fn name(&self) -> &'static str;

    fn key_extract(
        &mut self,
        samples: &[f32],
        sample_rate: u32,
    ) -> Result<KeyEstimate, LibraryError>;

    fn tempo_extract(
        &mut self,
        samples: &[f32],
        sample_rate: u32,
    ) -> Result<TempoEstimate, LibraryError>;
}

/// Tempo and key from an advanced provider, tempo already rounded to 0.1 BPM.
#[derive(Clone, Debug, PartialEq)]
pub struct AdvancedFeatures {
    pub bpm: f32,
    pub key: String,
    pub mode: String,
}

pub trait CapabilityProvider: Send + Sync {
    fn name(&self) -> &'static str;

    /// `None` means "use the native results".
    fn advanced(&self, audio: &AudioBuffer) -> Option<AdvancedFeatures>;
}

pub struct NativeOnlyProvider;

impl CapabilityProvider for NativeOnlyProvider {
    fn name(&self) -> &'static str {
        "native-only"
    }

    fn advanced(&self, _audio: &AudioBuffer) -> Option<AdvancedFeatures> {
        None
    }
}

type LibraryInit = Box<dyn Fn() -> Result<Box<dyn SignalLibrary>, LibraryError> + Send + Sync>;

/// Provider backed by a `SignalLibrary` that is built on first use.
///
/// Initialisation runs at most once. If it fails, the provider stays
/// unavailable for its whole lifetime. Calls into the library are serialised,
/// and an error or panic inside a call only affects that call.
pub struct AdvancedProvider {
    init: LibraryInit,
    library: OnceLock<Option<Mutex<Box<dyn SignalLibrary>>>>,
}

impl AdvancedProvider {
    pub fn new<F>(init: F) -> Self
    where
        F: Fn() -> Result<Box<dyn SignalLibrary>, LibraryError> + Send + Sync + 'static,
    {
        Self {
            init: Box::new(init),
            library: OnceLock::new(),
        }
    }

    /// Provider over the built-in `SpectralLibrary`.
    pub fn spectral(settings: LibrarySettings) -> Self {
        Self::new(move || {
            SpectralLibrary::new(settings.clone())
                .map(|lib| Box::new(lib) as Box<dyn SignalLibrary>)
        })
    }

    /// Forces initialisation if it has not happened yet.
    pub fn is_available(&self) -> bool {
        self.library().is_some()
    }

    fn library(&self) -> Option<&Mutex<Box<dyn SignalLibrary>>> {
        self.library
            .get_or_init(|| match (self.init)() {
                Ok(lib) => {
                    log::info!("Advanced analysis library ready: {}", lib.name());
                    Some(Mutex::new(lib))
                }
                Err(e) => {
                    log::warn!("Advanced analysis library unavailable, using native DSP: {}", e);
                    None
                }
            })
            .as_ref()
    }
}

impl CapabilityProvider for AdvancedProvider {
    fn name(&self) -> &'static str {
        "advanced"
    }

    fn advanced(&self, audio: &AudioBuffer) -> Option<AdvancedFeatures> {
        let library = self.library()?;
        let mut lib = match library.lock() {
            Ok(guard) => guard,
            Err(_) => {
                log::warn!("Advanced analysis library lock poisoned, using native DSP");
                return None;
            }
        };

        let outcome = panic::catch_unwind(AssertUnwindSafe(|| extract(&mut **lib, audio)));
        let result = match outcome {
            Ok(result) => result,
            Err(payload) => {
                log::warn!(
                    "{} panicked, using native DSP for this file: {}",
                    lib.name(),
                    panic_message(&*payload)
                );
                return None;
            }
        };

        match result {
            Ok(features) => {
                log::debug!(
                    "{}: bpm={:.1}, key={} {}",
                    lib.name(),
                    features.bpm,
                    features.key,
                    features.mode
                );
                Some(features)
            }
            Err(e) => {
                log::debug!("{} failed for this file, using native DSP: {}", lib.name(), e);
                None
            }
        }
    }
}

fn extract(
    lib: &mut dyn SignalLibrary,
    audio: &AudioBuffer,
) -> Result<AdvancedFeatures, LibraryError> {
    let samples = audio.channel(0);
    let sample_rate = audio.sample_rate();

    let key = lib.key_extract(samples, sample_rate)?;
    let tempo = lib.tempo_extract(samples, sample_rate)?;
    if !tempo.bpm.is_finite() || tempo.bpm <= 0.0 {
        return Err(LibraryError::NoEstimate(format!("tempo {}", tempo.bpm)));
    }

    Ok(AdvancedFeatures {
        bpm: round_to(tempo.bpm as f64, 1) as f32,
        key: key.key,
        mode: key.scale,
    })
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        msg
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.as_str()
    } else {
        "non-string panic payload"
    }
}

static SHARED_ADVANCED: OnceLock<Arc<AdvancedProvider>> = OnceLock::new();

/// Process-wide advanced provider. `settings` only matter on the first call.
pub fn shared_advanced(settings: &LibrarySettings) -> Arc<AdvancedProvider> {
    SHARED_ADVANCED
        .get_or_init(|| Arc::new(AdvancedProvider::spectral(settings.clone())))
        .clone()
}

/// Pick the provider for this process.
pub fn select(advanced_enabled: bool, settings: &LibrarySettings) -> Arc<dyn CapabilityProvider> {
    if advanced_enabled {
        shared_advanced(settings) as Arc<dyn CapabilityProvider>
    } else {
        Arc::new(NativeOnlyProvider) as Arc<dyn CapabilityProvider>
    }
}


#[cfg(test)]
mod tests {
    use super::mock::*;
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn buffer() -> AudioBuffer {
        AudioBuffer::mono(vec![0.1; 1000], 8000).unwrap()
    }

    #[test]
    fn native_only_never_offers() {
        assert!(NativeOnlyProvider.advanced(&buffer()).is_none());
    }

    #[test]
    fn available_library_is_used_and_rounded() {
        let provider = available();
        let features = provider.advanced(&buffer()).unwrap();
        assert_eq!(features.bpm, 128.0);
        assert_eq!(features.key, "D");
        assert_eq!(features.mode, "minor");
    }

    #[test]
    fn call_failure_is_swallowed() {
        let provider = failing();
        assert!(provider.is_available());
        assert!(provider.advanced(&buffer()).is_none());
    }

    #[test]
    fn failed_init_is_not_retried() {
        let counter = Arc::new(AtomicUsize::new(0));
        let provider = counting_broken_init(counter.clone());
        assert!(provider.advanced(&buffer()).is_none());
        assert!(provider.advanced(&buffer()).is_none());
        assert!(!provider.is_available());
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn init_happens_once_across_threads() {
        let counter = Arc::new(AtomicUsize::new(0));
        let c = counter.clone();
        let provider = Arc::new(AdvancedProvider::new(move || {
            c.fetch_add(1, Ordering::SeqCst);
            Ok(Box::new(FixedLibrary { fail_calls: false }) as Box<dyn SignalLibrary>)
        }));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let p = provider.clone();
                std::thread::spawn(move || p.advanced(&buffer()).is_some())
            })
            .collect();
        for h in handles {
            assert!(h.join().unwrap());
        }
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn non_finite_tempo_is_rejected() {
        struct NanTempo;
        impl SignalLibrary for NanTempo {
            fn name(&self) -> &'static str {
                "nan"
            }
            fn key_extract(&mut self, _: &[f32], _: u32) -> Result<KeyEstimate, LibraryError> {
                Ok(KeyEstimate {
                    key: "C".into(),
                    scale: "major".into(),
                })
            }
            fn tempo_extract(&mut self, _: &[f32], _: u32) -> Result<TempoEstimate, LibraryError> {
                Ok(TempoEstimate { bpm: f32::NAN })
            }
        }
        let provider = AdvancedProvider::new(|| Ok(Box::new(NanTempo) as Box<dyn SignalLibrary>));
        assert!(provider.advanced(&buffer()).is_none());
    }

    #[test]
    fn panic_in_library_is_contained() {
        let provider = panicking(1);
        assert!(provider.advanced(&buffer()).is_none());

        // The instance is still usable and the lock is not poisoned.
        let features = provider.advanced(&buffer()).unwrap();
        assert_eq!(features.key, "D");
        assert_eq!(features.bpm, 128.0);
    }

    #[test]
    fn calls_never_overlap() {
        struct Tracked {
            active: Arc<AtomicUsize>,
            max_seen: Arc<AtomicUsize>,
        }
        impl SignalLibrary for Tracked {
            fn name(&self) -> &'static str {
                "tracked"
            }
            fn key_extract(&mut self, _: &[f32], _: u32) -> Result<KeyEstimate, LibraryError> {
                let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
                self.max_seen.fetch_max(now, Ordering::SeqCst);
                std::thread::sleep(std::time::Duration::from_millis(5));
                self.active.fetch_sub(1, Ordering::SeqCst);
                Ok(KeyEstimate {
                    key: "A".into(),
                    scale: "minor".into(),
                })
            }
            fn tempo_extract(&mut self, _: &[f32], _: u32) -> Result<TempoEstimate, LibraryError> {
                Ok(TempoEstimate { bpm: 100.0 })
            }
        }

        let active = Arc::new(AtomicUsize::new(0));
        let max_seen = Arc::new(AtomicUsize::new(0));
        let (a, m) = (active.clone(), max_seen.clone());
        let provider = Arc::new(AdvancedProvider::new(move || {
            Ok(Box::new(Tracked {
                active: a.clone(),
                max_seen: m.clone(),
            }) as Box<dyn SignalLibrary>)
        }));

        let handles: Vec<_> = (0..6)
            .map(|_| {
                let p = provider.clone();
                std::thread::spawn(move || p.advanced(&buffer()).is_some())
            })
            .collect();
        for h in handles {
            assert!(h.join().unwrap());
        }
        assert_eq!(max_seen.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn shared_provider_is_a_singleton() {
        let a = shared_advanced(&LibrarySettings::default());
        let b = shared_advanced(&LibrarySettings {
            fft_size: 8192,
            ..LibrarySettings::default()
        });
        assert!(Arc::ptr_eq(&a, &b));
    }
}
