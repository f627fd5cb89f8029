//! SwingLab CLI — run, checkpoint inspection and synthetic data commands.
//!
//! Commands:
//! - `run`: process every token of a bar file into per-token JSONL rows,
//!   resuming each token from its last persisted row
//! - `checkpoint`: print the resume state stored for one token
//! - `synth`: write a seeded synthetic bar file

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::atomic::AtomicBool;
use swinglab_core::Checkpoint;
use swinglab_runner::synthetic::{generate, SyntheticSpec};
use swinglab_runner::{
    run_tokens, write_csv, BarSource, CsvSource, JsonlSink, RowSink, RunConfig, TokenOutcome,
};
use tracing::info;

#[derive(Parser)]
#[command(
    name = "swinglab",
    about = "SwingLab CLI — incremental fractal and swing detection over OHLC streams"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Process a bar file into per-token JSONL row files.
    Run {
        /// Path to a TOML run config. Defaults apply when omitted.
        #[arg(long)]
        config: Option<PathBuf>,

        /// CSV bar file (token,symbol,timestamp,open,high,low,close,volume,category).
        #[arg(long)]
        bars: PathBuf,

        /// Directory holding one `{token}.jsonl` per token.
        #[arg(long, default_value = "rows")]
        out: PathBuf,

        /// Only process these tokens (repeatable). Defaults to every token in the file.
        #[arg(long)]
        token: Vec<String>,
    },
    /// Print the checkpoint a token would resume from.
    Checkpoint {
        /// Row directory written by `run`.
        #[arg(long, default_value = "rows")]
        out: PathBuf,

        #[arg(long)]
        token: String,
    },
    /// Write a deterministic synthetic bar file.
    Synth {
        /// Number of tokens.
        #[arg(long, default_value_t = 4)]
        tokens: usize,

        /// Bars per token.
        #[arg(long, default_value_t = 5000)]
        bars: usize,

        /// Output CSV path.
        #[arg(long, default_value = "bars.csv")]
        out: PathBuf,

        /// Master seed.
        #[arg(long, default_value_t = 42)]
        seed: u64,

        /// Minutes between bars.
        #[arg(long, default_value_t = 60)]
        step_minutes: i64,
    },
}

fn init_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::filter::EnvFilter::builder()
                .with_default_directive(tracing_subscriber::filter::LevelFilter::INFO.into())
                .from_env_lossy(),
        )
        .with_writer(std::io::stderr)
        .init()
}

fn main() -> Result<()> {
    init_logging();
    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            config,
            bars,
            out,
            token,
        } => run_cmd(config.as_deref(), &bars, &out, token),
        Commands::Checkpoint { out, token } => checkpoint_cmd(&out, &token),
        Commands::Synth {
            tokens,
            bars,
            out,
            seed,
            step_minutes,
        } => synth_cmd(tokens, bars, &out, seed, step_minutes),
    }
}

fn run_cmd(
    config_path: Option<&Path>,
    bars: &Path,
    out: &Path,
    only: Vec<String>,
) -> Result<()> {
    let config = match config_path {
        Some(path) => RunConfig::from_file(path)?,
        None => RunConfig::default(),
    };
    info!(fingerprint = %config.fingerprint(), "engine parameters");

    let source = CsvSource::open(bars)?;
    let sink = JsonlSink::new(out)?;

    let known = source.tokens();
    let tokens = if only.is_empty() {
        known
    } else {
        for token in &only {
            if !known.contains(token) {
                bail!("token '{token}' not found in {}", bars.display());
            }
        }
        only
    };
    if tokens.is_empty() {
        bail!("no tokens in {}", bars.display());
    }

    let cancel = AtomicBool::new(false);
    let outcomes = run_tokens(&tokens, &source, &sink, &config, &cancel)?;
    print_summary(&outcomes);

    let failed: Vec<&TokenOutcome> = outcomes.iter().filter(|o| o.result.is_err()).collect();
    if !failed.is_empty() {
        for outcome in &failed {
            if let Err(e) = &outcome.result {
                eprintln!("Error for {}: {e}", outcome.token);
            }
        }
        bail!("{} of {} tokens failed", failed.len(), outcomes.len());
    }
    println!("Rows written to: {}", sink.dir().display());
    Ok(())
}

fn print_summary(outcomes: &[TokenOutcome]) {
    println!(
        "{:<12} {:>10} {:>8} {:>8} {:>8} {:>8}  {:<16}",
        "token", "resumed", "rows", "failed", "skipped", "last_n", "digest"
    );
    for outcome in outcomes {
        match &outcome.result {
            Ok(r) => println!(
                "{:<12} {:>10} {:>8} {:>8} {:>8} {:>8}  {:<16}",
                r.token,
                r.resumed_from.map_or("-".to_string(), |n| n.to_string()),
                r.rows_emitted,
                r.rows_failed,
                r.bars_skipped,
                r.last_n.map_or("-".to_string(), |n| n.to_string()),
                &r.digest[..16.min(r.digest.len())],
            ),
            Err(_) => println!("{:<12} {:>10}", outcome.token, "FAILED"),
        }
    }
}

fn checkpoint_cmd(out: &Path, token: &str) -> Result<()> {
    let sink = JsonlSink::new(out)?;
    let Some(row) = sink.last_row(token)? else {
        bail!("no rows for token '{token}' in {}", out.display());
    };
    let checkpoint = Checkpoint::from_row(&row)?;
    println!("{}", serde_json::to_string_pretty(&checkpoint)?);
    println!(
        "next n: {}  fetch from offset: {}",
        checkpoint.next_n(),
        checkpoint.lookback_offset
    );
    Ok(())
}

fn synth_cmd(tokens: usize, bars: usize, out: &Path, seed: u64, step_minutes: i64) -> Result<()> {
    if tokens == 0 || bars == 0 {
        bail!("--tokens and --bars must be at least 1");
    }
    if step_minutes <= 0 {
        bail!("--step-minutes must be positive");
    }
    let spec = SyntheticSpec {
        seed,
        tokens,
        bars_per_token: bars,
        step_minutes,
        ..SyntheticSpec::default()
    };
    let generated = generate(&spec);
    write_csv(out, &generated)?;
    println!(
        "Wrote {} bars for {tokens} tokens to {}",
        generated.len(),
        out.display()
    );
    Ok(())
}
