//! pixelbox - Main Entry Point
//!
//! `pixelbox start` runs the bridge until SIGINT or SIGTERM.
//! `pixelbox check` validates a configuration and prints its patch table.

use anyhow::Context;
use clap::{Parser, Subcommand};
use pixelbox::{
    app::PixelBoxApp,
    config::{AppConfig, DEFAULT_CONFIG_FILE},
    fixture::PatchTable,
    logging::{Logging, MAIN_LOG},
    output::driver_for,
    render::ShutdownOutcome,
};
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Debug, Parser)]
#[command(name = "pixelbox", version, about = "sACN to addressable LED bridge")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Receive sACN and drive the configured outputs
    Start {
        #[arg(short, long, default_value = DEFAULT_CONFIG_FILE)]
        config: PathBuf,
    },
    /// Validate a configuration and print its patch table as JSON
    Check {
        #[arg(short, long, default_value = DEFAULT_CONFIG_FILE)]
        config: PathBuf,
    },
    /// Write an example configuration
    Sample {
        #[arg(default_value = DEFAULT_CONFIG_FILE)]
        path: PathBuf,
    },
}

fn main() -> anyhow::Result<()> {
    match Cli::parse().command {
        Command::Start { config } => start(&config),
        Command::Check { config } => check(&config),
        Command::Sample { path } => {
            if path.exists() {
                anyhow::bail!("{} already exists", path.display());
            }
            AppConfig::sample().save(&path)?;
            println!("Wrote {}", path.display());
            Ok(())
        }
    }
}

fn start(path: &Path) -> anyhow::Result<()> {
    let config = AppConfig::load(path)
        .with_context(|| format!("Cannot start with {}", path.display()))?;

    let logging = Logging::init(&config.logging, MAIN_LOG)?;
    let _log = logging.install();
    info!("Starting pixelbox {}", env!("CARGO_PKG_VERSION"));
    if let Some(file) = logging.log_file() {
        info!("Logging to {:?}", file);
    }

    let mut app = PixelBoxApp::start(config, &logging, driver_for)?;
    if let Some(addr) = app.local_addr() {
        info!("Listening for sACN on {}", addr);
    }

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    runtime.block_on(wait_for_shutdown())?;

    info!("Shutting down...");
    if let Some(ShutdownOutcome::Graceful(report)) = app.stop() {
        info!("Render worker: {}", report.stats);
    }
    Ok(())
}

fn check(path: &Path) -> anyhow::Result<()> {
    let config = AppConfig::load(path)?;
    let table = PatchTable::from_config(&config)?;
    println!("{}", serde_json::to_string_pretty(&table.infos())?);
    Ok(())
}

#[cfg(unix)]
async fn wait_for_shutdown() -> std::io::Result<()> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut terminate = signal(SignalKind::terminate())?;
    tokio::select! {
        result = tokio::signal::ctrl_c() => result?,
        _ = terminate.recv() => {}
    }
    Ok(())
}

#[cfg(not(unix))]
async fn wait_for_shutdown() -> std::io::Result<()> {
    tokio::signal::ctrl_c().await
}
