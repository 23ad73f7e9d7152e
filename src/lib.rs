//! Acoustic feature extraction: tempo, loudness, true peak, stereo image,
//! spectral balance and brightness computed directly from decoded audio.
//!
//! ```no_run
//! use std::sync::Arc;
//! use trackprobe::{Analyzer, AnalyzerOptions, NativeOnlyProvider};
//!
//! let analyzer = Analyzer::new(Arc::new(NativeOnlyProvider), AnalyzerOptions::default());
//! match analyzer.analyze_file("song.mp3".as_ref()) {
//!     Ok(Some(report)) => println!("{} BPM via {}", report.bpm, report.method),
//!     Ok(None) => println!("no tempo found"),
//!     Err(e) => eprintln!("decode failed: {}", e),
//! }
//! ```

pub mod analysis;
pub mod audio;
pub mod cli;
pub mod config;
pub mod error;
pub mod orchestrator;
pub mod provider;

pub use analysis::features::{
    AnalysisMethod, Brightness, Character, EnergyLevel, FeatureReport, SpectralBalance,
};
pub use analysis::spectral::SpectralMode;
pub use audio::decode::{decode_bytes, decode_file, AudioBuffer};
pub use error::{DecodeError, LibraryError};
pub use orchestrator::{Analyzer, AnalyzerOptions};
pub use provider::{
    AdvancedProvider, CapabilityProvider, LibrarySettings, NativeOnlyProvider, SignalLibrary,
};
