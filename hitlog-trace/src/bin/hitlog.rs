use std::fs::File;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::filter::EnvFilter;

use hitlog_core::config::{parse_offset, Config};
use hitlog_core::engine::HitLogger;
use hitlog_core::error::ConfigError;
use hitlog_trace::replay::replay;

/// Replays a recorded run and writes per-address instruction hit counts.
///
/// The output is a raw byte map of the tracked module, one saturating
/// counter per address offset, meant to be overlaid onto a disassembly of
/// the same image.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Recorded run trace to replay.
    #[arg(short, long)]
    input: PathBuf,

    /// Destination for the hit-count artifact.
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Record hits only for images whose name contains this substring
    /// (case sensitive). Defaults to the main executable.
    #[arg(short, long)]
    module: Option<String>,

    /// Module-relative hex offset at which logging starts.
    #[arg(short, long)]
    start: Option<String>,

    /// Module-relative hex offset at which logging stops.
    #[arg(short = 'e', long)]
    stop: Option<String>,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_env("HITLOG_LOG"))
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let mut config = Config::new(args.output.ok_or(ConfigError::MissingOutput)?);
    config.module = args.module;
    config.start_offset = args.start.as_deref().map(parse_offset).transpose()?;
    config.stop_offset = args.stop.as_deref().map(parse_offset).transpose()?;

    let logger = HitLogger::new(config).context("failed to set up the run")?;
    let input = File::open(&args.input)
        .with_context(|| format!("failed to open trace {}", args.input.display()))?;

    let stats = replay(input, &logger)
        .with_context(|| format!("failed to replay {}", args.input.display()))?;

    eprintln!(
        "replayed {} executions of {} instructions across {} images",
        stats.executed, stats.discovered, stats.images
    );
    Ok(())
}
