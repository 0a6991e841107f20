use anyhow::{bail, Context, Result};
use chrono::Utc;
use clap::Parser;
use entity_progress_core::{CardConfig, ProgressCard, ProgressError, StateSnapshot};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::time;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "entity-progress")]
#[command(about = "Render an entity progress card from a state snapshot")]
#[command(version)]
struct Args {
    /// Card config file (RON). Defaults to ~/.config/entity-progress/config.ron
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Entity state snapshot (JSON object keyed by entity id), re-read every tick
    #[arg(short, long)]
    states: Option<PathBuf>,

    /// Entity to display, overriding the config file
    #[arg(short, long)]
    entity: Option<String>,

    /// Update interval in milliseconds
    #[arg(short, long, default_value = "5000")]
    interval: u64,

    /// One-shot mode (don't loop)
    #[arg(short, long)]
    once: bool,

    /// Validate the config against the snapshot and exit
    #[arg(long)]
    check: bool,

    /// Generate example config file and exit
    #[arg(long)]
    example_config: bool,

    /// Increase log verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing(args.verbose);

    if args.example_config {
        let Some(config_path) = CardConfig::default_config_path() else {
            bail!("Could not determine config directory");
        };
        CardConfig::save_example_config_to_file(&config_path)?;
        println!("Generated example config at: {}", config_path.display());
        println!("\nYou can now edit this file to point the card at your entities.");
        return Ok(());
    }

    let mut config = match &args.config {
        Some(path) => CardConfig::load_from_file(path)
            .with_context(|| format!("loading config from {}", path.display()))?,
        None => CardConfig::load().context("loading config")?,
    };
    if let Some(entity) = args.entity {
        config.entity = Some(entity);
    }

    if config.target().is_none() {
        return Err(ProgressError::config(
            "entity",
            "no entity configured; pass --entity or set it in the config file",
        )
        .into());
    }

    let Some(states_path) = args.states else {
        bail!("--states is required to render a card");
    };
    let card = ProgressCard::new(config);

    if args.check {
        let source = load_states(&states_path)?;
        let messages = card.config().validate(&source);
        if messages.is_empty() {
            println!("Card configuration is valid");
            return Ok(());
        }
        for message in &messages {
            println!("{message}");
        }
        if messages.iter().any(|m| m.is_blocking()) {
            std::process::exit(1);
        }
        return Ok(());
    }

    let base_period = Duration::from_millis(args.interval.max(1));

    if args.once {
        let output = card.refresh(&load_states(&states_path)?, Utc::now())?;
        println!("{}", serde_json::to_string(&output)?);
        return Ok(());
    }

    let mut period = base_period;
    let mut interval = time::interval(period);

    loop {
        interval.tick().await;

        let next = match load_states(&states_path) {
            Ok(source) => match card.refresh(&source, Utc::now()) {
                Ok(output) => {
                    println!("{}", serde_json::to_string(&output)?);
                    io::stdout().flush()?;
                    output
                        .refresh_interval
                        .map_or(base_period, |wanted| wanted.min(base_period))
                }
                Err(e) => {
                    // Don't exit on refresh errors, just continue trying
                    if e.is_recoverable() {
                        tracing::warn!(category = e.category(), error = %e, "refresh failed");
                    } else {
                        tracing::error!(category = e.category(), error = %e, "refresh failed");
                    }
                    base_period
                }
            },
            Err(e) => {
                tracing::warn!(error = %e, "could not read states");
                base_period
            }
        };

        if next != period {
            tracing::debug!(period_ms = next.as_millis() as u64, "changing refresh period");
            period = next;
            interval = time::interval_at(time::Instant::now() + period, period);
        }
    }
}

fn load_states(path: &Path) -> Result<StateSnapshot> {
    StateSnapshot::load_from_file(path)
        .with_context(|| format!("reading states from {}", path.display()))
}

fn init_tracing(verbosity: u8) {
    let filter = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}
