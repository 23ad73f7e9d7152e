use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::analysis::spectral::SpectralMode;
use crate::orchestrator::AnalyzerOptions;
use crate::provider::LibrarySettings;

#[derive(Debug, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub analysis: AnalysisConfig,
    #[serde(default)]
    pub advanced: AdvancedConfig,
}

#[derive(Debug, Deserialize)]
pub struct AnalysisConfig {
    #[serde(default)]
    pub spectral: SpectralMode,
    #[serde(default = "default_parallel")]
    pub parallel: bool,
}

#[derive(Debug, Deserialize)]
pub struct AdvancedConfig {
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(flatten)]
    pub library: LibrarySettings,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            spectral: SpectralMode::default(),
            parallel: default_parallel(),
        }
    }
}

impl Default for AdvancedConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            library: LibrarySettings::default(),
        }
    }
}

fn default_parallel() -> bool { true }
fn default_enabled() -> bool { true }

impl Config {
    pub fn analyzer_options(&self) -> AnalyzerOptions {
        AnalyzerOptions {
            spectral_mode: self.analysis.spectral,
            parallel_stages: self.analysis.parallel,
        }
    }
}

pub fn load_config(path: &Path) -> Option<Config> {
    let content = std::fs::read_to_string(path).ok()?;
    match toml::from_str(&content) {
        Ok(config) => Some(config),
        Err(e) => {
            log::debug!("Invalid config {}: {}", path.display(), e);
            None
        }
    }
}

/// `./trackprobe.toml`, then `~/.config/trackprobe/config.toml`, then the
/// platform config directory.
pub fn find_config() -> Option<PathBuf> {
    let local = PathBuf::from("trackprobe.toml");
    if local.exists() {
        return Some(local);
    }
    if let Some(home) = dirs::home_dir() {
        let xdg = home.join(".config").join("trackprobe").join("config.toml");
        if xdg.exists() {
            return Some(xdg);
        }
    }
    if let Some(config_dir) = dirs::config_dir() {
        let platform = config_dir.join("trackprobe").join("config.toml");
        if platform.exists() {
            return Some(platform);
        }
    }
    None
}
