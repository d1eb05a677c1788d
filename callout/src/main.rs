/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

use std::path::PathBuf;
use std::process;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{error, info, warn};

use callout::config::ConfigManager;
use callout::monitor::GlobalClock;
use callout::publish::TracingSink;
use callout::{ClockZone, Scheduler, SystemClock};

// ── CLI argument definition ───────────────────────────────────────────────────

/// calloutd – runs the callout scheduler with the clock publisher attached.
///
/// Example:
///   calloutd --config calloutd.yaml --utc --run-for 180
#[derive(Debug, Parser)]
#[command(
    name = "calloutd",
    about = "Callout scheduler host – publishes clock values on minute boundaries",
    long_about = None,
)]
struct Cli {
    /// Path to the YAML configuration file.
    #[arg(short = 'c', long = "config")]
    config: Option<PathBuf>,

    /// Break time into fields in UTC instead of the local time zone.
    #[arg(long = "utc", default_value_t = false)]
    utc: bool,

    /// Exit after this many seconds instead of waiting for Ctrl-C.
    #[arg(short = 't', long = "run-for")]
    run_for: Option<u64>,
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() {
    // Level is controlled by the RUST_LOG env-var (e.g. RUST_LOG=trace).
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    info!(
        config  = ?cli.config,
        utc     = cli.utc,
        run_for = ?cli.run_for,
        "calloutd starting up"
    );

    if let Err(e) = run(cli).await {
        error!("calloutd failed: {:#}", e);
        process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    // ── Load configuration ────────────────────────────────────────────────────
    let mut config = ConfigManager::new();
    match &cli.config {
        Some(path) => config.load_from_file(path)?,
        None => warn!("No configuration file provided, using defaults"),
    }
    if cli.utc {
        config.clock_mut().zone = ClockZone::Utc;
    }

    // ── Start the scheduler and pollers ───────────────────────────────────────
    let scheduler = Scheduler::start(config.dispatcher(), Arc::new(SystemClock))
        .context("Failed to start callout scheduler")?;

    let clock = if config.clock().enabled {
        Some(GlobalClock::start(
            &scheduler,
            Arc::new(TracingSink),
            config.clock(),
        ))
    } else {
        info!("Clock publisher disabled");
        None
    };

    // ── Wait for exit condition ───────────────────────────────────────────────
    match cli.run_for {
        Some(secs) => {
            tokio::select! {
                _ = tokio::time::sleep(Duration::from_secs(secs)) => {
                    info!(secs, "Run time elapsed");
                }
                res = tokio::signal::ctrl_c() => {
                    res.context("Failed to listen for Ctrl-C")?;
                    info!("Interrupted");
                }
            }
        }
        None => {
            tokio::signal::ctrl_c()
                .await
                .context("Failed to listen for Ctrl-C")?;
            info!("Interrupted");
        }
    }

    // ── Shutdown ──────────────────────────────────────────────────────────────
    drop(clock);
    tokio::task::spawn_blocking(move || scheduler.shutdown())
        .await
        .context("Shutdown task failed")?
        .context("Callout scheduler did not stop cleanly")?;

    info!("calloutd stopped");
    Ok(())
}
