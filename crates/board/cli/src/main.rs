//! Board CLI - drive the governance engine from the terminal
//!
//! - `board show-config` prints the effective configuration
//! - `board run <script.json>` replays a script of proposals, approvals,
//!   revocations and board replacements, printing every outcome and event

use anyhow::Context;
use board_runtime::BoardConfig;
use clap::{Parser, Subcommand};
use std::io::Write;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod recorder;
mod script;

use script::{Replay, Script};

/// Board CLI application
#[derive(Parser)]
#[command(name = "board")]
#[command(about = "Board of Directors - quorum-gated action governance", long_about = None)]
#[command(version)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, env = "BOARD_CONFIG")]
    config: Option<String>,

    /// Log level (overrides logging.level)
    #[arg(long, env = "BOARD_LOG_LEVEL")]
    log_level: Option<String>,

    /// Enable JSON logging
    #[arg(long)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Available commands
#[derive(Subcommand)]
enum Commands {
    /// Print the effective configuration as JSON
    ShowConfig,

    /// Replay a JSON script against a fresh engine
    Run {
        /// Script file
        script: PathBuf,
    },
}

fn init_tracing(config: &BoardConfig, cli: &Cli) {
    let level = cli
        .log_level
        .clone()
        .unwrap_or_else(|| config.logging.level.clone());
    let env_filter =
        tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| level.into());

    // Logs go to stderr so stdout stays machine-readable
    if cli.json || config.logging.json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr),
            )
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = BoardConfig::load(cli.config.as_deref()).context("loading configuration")?;
    init_tracing(&config, &cli);

    let stdout = std::io::stdout();
    let mut out = stdout.lock();

    match &cli.command {
        Commands::ShowConfig => {
            writeln!(out, "{}", serde_json::to_string_pretty(&config)?)?;
        }
        Commands::Run { script } => {
            let script = Script::from_path(script)?;
            let mut replay = Replay::new(&config, &script)?;
            let summary = replay.run(&script.steps, &mut out)?;
            writeln!(
                out,
                "{}",
                serde_json::to_string(&serde_json::json!({ "summary": summary }))?
            )?;
        }
    }

    Ok(())
}
