use clap::Parser;
use std::path::PathBuf;

use crate::analysis::spectral::SpectralMode;

#[derive(Parser, Debug)]
#[command(name = "trackprobe", about = "Acoustic feature extraction for audio files")]
pub struct Cli {
    /// Input audio files (WAV, MP3, FLAC, OGG, AAC)
    #[arg(required = true)]
    pub inputs: Vec<PathBuf>,

    /// Config file (defaults to trackprobe.toml or the user config dir)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Skip the advanced library and report native DSP results only
    #[arg(long)]
    pub native_only: bool,

    /// Spectral balance estimator
    #[arg(long, value_enum)]
    pub spectral: Option<SpectralMode>,

    /// Run the analysis stages of each file one after another
    #[arg(long)]
    pub sequential_stages: bool,

    /// Worker threads for batch analysis (0 = one per core)
    #[arg(short, long, default_value_t = 0)]
    pub jobs: usize,

    /// Pretty-print JSON output
    #[arg(long)]
    pub pretty: bool,
}
