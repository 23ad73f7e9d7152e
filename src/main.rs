use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use rayon::prelude::*;
use serde::Serialize;
use std::io::Write;

use trackprobe::cli::Cli;
use trackprobe::config::{self, Config};
use trackprobe::{provider, Analyzer, FeatureReport};

#[derive(Serialize)]
struct FileResult<'a> {
    path: String,
    report: Option<&'a FeatureReport>,
    error: Option<String>,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    let cli = Cli::parse();

    // Explicit --config path, or auto-detect trackprobe.toml / global config
    let config_path = cli.config.clone().or_else(config::find_config);
    let mut cfg = match config_path {
        Some(ref path) => match config::load_config(path) {
            Some(cfg) => {
                log::info!("Loaded config from {}", path.display());
                cfg
            }
            None => {
                log::warn!("Failed to load config from {}", path.display());
                Config::default()
            }
        },
        None => Config::default(),
    };

    // CLI flags win over the config file
    if let Some(mode) = cli.spectral {
        cfg.analysis.spectral = mode;
    }
    if cli.sequential_stages {
        cfg.analysis.parallel = false;
    }
    if cli.native_only {
        cfg.advanced.enabled = false;
    }

    if cli.jobs > 0 {
        rayon::ThreadPoolBuilder::new()
            .num_threads(cli.jobs)
            .build_global()
            .context("Failed to configure worker pool")?;
    }

    let provider = provider::select(cfg.advanced.enabled, &cfg.advanced.library);
    let analyzer = Analyzer::new(provider, cfg.analyzer_options());

    log::info!("trackprobe - acoustic feature extraction");
    log::info!("Inputs: {}", cli.inputs.len());
    log::info!(
        "Provider: {}, spectral: {:?}, parallel stages: {}",
        analyzer.provider_name(),
        cfg.analysis.spectral,
        cfg.analysis.parallel
    );

    let pb = if cli.inputs.len() > 1 {
        let pb = ProgressBar::new(cli.inputs.len() as u64);
        pb.set_style(
            ProgressStyle::default_bar()
                .template(
                    "[{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} files ({eta} remaining)",
                )
                .context("Invalid progress bar template")?
                .progress_chars("=>-"),
        );
        pb
    } else {
        ProgressBar::hidden()
    };

    let results: Vec<_> = cli
        .inputs
        .par_iter()
        .map(|path| {
            log::info!("Analyzing {}", path.display());
            let result = analyzer.analyze_file(path);
            pb.inc(1);
            (path, result)
        })
        .collect();

    pb.finish_and_clear();

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    let mut failures = 0usize;

    for (path, result) in &results {
        let entry = match result {
            Ok(report) => FileResult {
                path: path.display().to_string(),
                report: report.as_ref(),
                error: None,
            },
            Err(e) => {
                failures += 1;
                log::error!("{}: {}", path.display(), e);
                FileResult {
                    path: path.display().to_string(),
                    report: None,
                    error: Some(e.to_string()),
                }
            }
        };
        let line = if cli.pretty {
            serde_json::to_string_pretty(&entry)?
        } else {
            serde_json::to_string(&entry)?
        };
        writeln!(out, "{}", line).context("Failed to write output")?;
    }

    if failures > 0 {
        anyhow::bail!("{} of {} inputs failed to decode", failures, results.len());
    }

    log::info!("Done: {} file(s) analyzed", results.len());
    Ok(())
}
