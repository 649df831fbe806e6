//! CLI entry point for feedsync.

use std::io::{self, IsTerminal};
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::Ordering;

use anyhow::{Context, Result};
use clap::Parser;
use feedsync_core::{Catalog, ConfigError, Database, Pipeline, PipelineConfig};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

mod cli;
mod progress;

use cli::Args;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse CLI arguments first (before tracing, so --help works without logs)
    let args = Args::parse();

    // Priority: RUST_LOG env var > quiet flag > verbose flag > default (info)
    let default_level = if args.quiet {
        "error"
    } else {
        match args.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    };

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();

    debug!(?args, "CLI arguments parsed");

    let (config_path, explicit) = args.config_path();
    let mut config = load_config(&config_path, explicit)?;
    args.apply_to(&mut config);
    config.validate().context("invalid configuration")?;

    if !config.any_phase_enabled() {
        info!("No phase enabled. Set getUrl, fillUrl or download in the config, or pass --discover, --resolve or --download.");
        return Ok(());
    }

    info!(store = %config.store.path.display(), "feedsync starting");
    let db = Database::new(&config.store.path)
        .await
        .with_context(|| format!("cannot open catalog {}", config.store.path.display()))?;
    let catalog = Catalog::new(db.clone());
    let pipeline = Pipeline::from_config(&config, Arc::new(catalog))?;

    let cancel = CancellationToken::new();
    let signal_cancel = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received, stopping after the current item");
            signal_cancel.cancel();
        }
    });

    let show_progress = config.download && !args.quiet && io::stderr().is_terminal();
    let (progress_handle, progress_stop) =
        progress::spawn_progress_ui(show_progress, pipeline.telemetry());

    let outcome = pipeline.run(&config, &cancel).await;

    progress_stop.store(true, Ordering::SeqCst);
    if let Some(handle) = progress_handle {
        let _ = handle.await;
    }
    db.close().await;

    let report = outcome?;
    if let Some(stats) = report.download {
        info!(
            completed = stats.completed,
            failed = stats.failed,
            total = stats.total(),
            "Download complete"
        );
    }
    Ok(())
}

/// Loads the configuration file.
///
/// A missing default file means "all defaults"; a missing file that was
/// named with `--config` is an error.
fn load_config(path: &Path, explicit: bool) -> Result<PipelineConfig> {
    match PipelineConfig::load(path) {
        Ok(config) => Ok(config),
        Err(ConfigError::Read { source, .. })
            if !explicit && source.kind() == io::ErrorKind::NotFound =>
        {
            debug!(path = %path.display(), "no config file, using defaults");
            Ok(PipelineConfig::default())
        }
        Err(error) => Err(error.into()),
    }
}
