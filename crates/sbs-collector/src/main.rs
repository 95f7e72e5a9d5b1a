// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! SBS-1 collector CLI
//!
//! Reads a dump1090 BaseStation feed (port 30003) and writes aircraft
//! records to InfluxDB in batches.
//!
//! # Usage
//!
//! ```bash
//! # Run against a local dump1090
//! INFLUX_URL=http://localhost:8181 INFLUXDB_TOKEN=xxx INFLUXDB_DATABASE=adsb sbs-collector
//!
//! # Dry run: print line protocol instead of writing
//! OUTPUT_DB_TYPE=stdout DUMP1090_HOST=piaware.local sbs-collector
//!
//! # Show the effective configuration
//! sbs-collector check-config
//!
//! # Decode a single line
//! sbs-collector decode "MSG,3,1,1,ABCDEF,1,2024/01/01,00:00:00,2024/01/01,00:00:01,,35000"
//! ```

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use sbs_collector::sink::ConfiguredSink;
use sbs_collector::{decoder, Config, Pipeline};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "sbs-collector")]
#[command(about = "SBS-1 aircraft feed collector for time-series databases", long_about = None)]
#[command(version)]
struct Args {
    /// Log level or tracing filter directive (trace, debug, info, warn, error)
    #[arg(long, global = true, env = "LOG_LEVEL", default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Load and validate the environment configuration
    CheckConfig,

    /// Decode one SBS-1 line and print the record as JSON
    Decode {
        /// Raw feed line
        line: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let filter = EnvFilter::try_new(&args.log_level).unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    match args.command {
        Some(Commands::CheckConfig) => cmd_check_config(),
        Some(Commands::Decode { line }) => cmd_decode(&line),
        None => run().await,
    }
}

async fn run() -> Result<()> {
    let config = Config::from_env().context("Failed to load configuration")?;
    let sink = ConfiguredSink::from_config(&config.sink).context("Failed to initialize sink")?;
    tracing::info!("Initialized {} writer", config.sink.kind);

    let mut handle = Pipeline::new(config.pipeline_config(), sink).start();
    tracing::info!("Data collection started. Press Ctrl+C to stop.");

    tokio::select! {
        _ = shutdown_signal() => tracing::info!("Received shutdown signal"),
        _ = handle.source_stopped() => tracing::warn!("Source reader stopped, shutting down"),
    }

    let report = handle.shutdown().await;
    if !report.drain.is_drained() {
        tracing::warn!("Shutdown incomplete: {:?} did not drain", report.drain.pending);
    }
    if report.faults.errors > 0 {
        tracing::warn!("{} errors reported during the run", report.faults.errors);
    }
    report.source_result.context("Collector stopped")?;

    tracing::info!("Shutdown complete.");
    Ok(())
}

fn cmd_check_config() -> Result<()> {
    let config = Config::from_env().context("Invalid configuration")?;
    println!("{}", config);
    println!();
    println!("Configuration OK");
    Ok(())
}

fn cmd_decode(line: &str) -> Result<()> {
    match decoder::decode(line)? {
        Some(decoded) => {
            println!("{}", serde_json::to_string_pretty(&decoded.record)?);
            for warning in &decoded.warnings {
                eprintln!("warning: {}", warning);
            }
            Ok(())
        }
        None => bail!("not a transmission (MSG) line; nothing decoded"),
    }
}

/// Resolves on Ctrl+C, or SIGTERM on unix.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
