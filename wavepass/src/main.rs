//! WavePass operator console.
//!
//! Reads commands from stdin until `exit`, end of input or Ctrl+C, then
//! shuts every worker down and prints the final pool status.
//!
//! # Usage
//!
//! ```bash
//! # First run writes config.json from the environment and defaults
//! cargo run --bin wavepass
//!
//! # Use another config file
//! WAVEPASS_CONFIG=/tmp/wavepass.json cargo run --bin wavepass
//! ```

use anyhow::Context;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};
use wavepass::console::render_status;
use wavepass::telemetry;
use wavepass::{Config, Console, Reply, WavePassApp};

const FOLLOW_POLL: Duration = Duration::from_millis(500);

/// Where the config came from, logged once tracing is up
enum Source {
    File,
    Environment,
}

fn config_path() -> PathBuf {
    std::env::var("WAVEPASS_CONFIG").map_or_else(|_| PathBuf::from("config.json"), PathBuf::from)
}

fn load_config(path: &Path) -> anyhow::Result<(Config, Source)> {
    if path.exists() {
        Ok((Config::load(path)?, Source::File))
    } else {
        let config = Config::from_env();
        config
            .save(path)
            .with_context(|| format!("writing initial configuration to {}", path.display()))?;
        Ok((config, Source::Environment))
    }
}

fn prompt(console: &Console) {
    print!("{}", console.prompt());
    let _ = std::io::stdout().flush();
}

/// Print activity as it is recorded until the operator presses Enter.
///
/// Returns `false` if input ended or Ctrl+C arrived instead.
async fn follow(
    console: &mut Console,
    lines: &mut Lines<BufReader<Stdin>>,
) -> anyhow::Result<bool> {
    let mut ticks = tokio::time::interval(FOLLOW_POLL);
    loop {
        tokio::select! {
            line = lines.next_line() => return Ok(line?.is_some()),
            _ = tokio::signal::ctrl_c() => {
                println!();
                tracing::info!("Interrupted");
                return Ok(false);
            }
            _ = ticks.tick() => {
                for line in console.follow_activity() {
                    println!("{line}");
                }
            }
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    let path = config_path();
    let (config, source) = load_config(&path)?;
    config.validate()?;
    telemetry::init_tracing(&config.logging.log_level);

    tracing::info!("Starting WavePass...");
    match source {
        Source::File => tracing::info!(path = %path.display(), "Configuration loaded from file"),
        Source::Environment => {
            tracing::info!(path = %path.display(), "Configuration created from environment");
        }
    }
    tracing::info!(
        total_tickets = config.tickets.total_tickets,
        max_capacity = config.tickets.max_capacity,
        price = %config.tickets.ticket_price,
        "Configuration validated"
    );

    let metrics = match telemetry::install_metrics() {
        Ok(handle) => Some(handle),
        Err(error) => {
            tracing::warn!(%error, "Metrics recorder not installed");
            None
        }
    };

    let app = Arc::new(WavePassApp::new(config)?);
    let mut console = Console::new(Arc::clone(&app), metrics).with_config_path(path);

    println!("Welcome to WavePass. Type 'help' for commands.");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        prompt(&console);
        let line = tokio::select! {
            line = lines.next_line() => line?,
            _ = tokio::signal::ctrl_c() => {
                println!();
                tracing::info!("Interrupted");
                None
            }
        };
        let Some(line) = line else { break };

        match console.handle_line(&line) {
            Reply::Continue(text) => {
                if !text.is_empty() {
                    println!("{text}");
                }
            }
            Reply::Follow(text) => {
                println!("{text}");
                if !follow(&mut console, &mut lines).await? {
                    break;
                }
            }
            Reply::Exit(text) => {
                println!("{text}");
                break;
            }
        }
    }

    tracing::info!("Shutting down gracefully...");
    let (report, status) = app.shutdown().await;
    if report.aborted > 0 {
        tracing::warn!(aborted = report.aborted, "Some workers were aborted");
    }
    println!("{}", render_status(&status));
    Ok(())
}
