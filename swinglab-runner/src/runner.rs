//! Token runner — source → engine → sink, one token per worker.
//!
//! Two entry points:
//! - `run_token()`: processes one token to the end of its stream, resuming
//!   from the sink's last row when there is one.
//! - `run_tokens()`: fans `run_token()` out over a private rayon pool sized
//!   by `max_concurrency`. Tokens share no state, so results do not depend
//!   on the thread count.
//!
//! Cancellation is checked between chunks only. Every row of a processed
//! chunk is handed to the sink before the flag is read again, so a cancelled
//! token always resumes from a complete row.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use rayon::prelude::*;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, warn};

use swinglab_core::state::CheckpointError;
use swinglab_core::{Checkpoint, EngineError, RawBar, TokenEngine};

use crate::config::{ConfigError, RunConfig};
use crate::sink::{RowSink, SinkError};
use crate::source::{BarSource, SourceError};

/// Errors that abort a token's run.
#[derive(Debug, Error)]
pub enum RunError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
    #[error("engine error: {0}")]
    Engine(#[from] EngineError),
    #[error("source error: {0}")]
    Source(#[from] SourceError),
    #[error("sink error: {0}")]
    Sink(#[from] SinkError),
    #[error("checkpoint error: {0}")]
    Checkpoint(#[from] CheckpointError),
    #[error("row encoding error: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("failed to build worker pool: {0}")]
    Pool(#[from] rayon::ThreadPoolBuildError),
}

/// Summary of one token's run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TokenReport {
    pub token: String,
    /// `n` of the checkpoint row the run resumed from.
    pub resumed_from: Option<u64>,
    pub rows_emitted: usize,
    /// Rows the sink rejected; the run carries on past them.
    pub rows_failed: usize,
    /// Malformed bars dropped at intake.
    pub bars_skipped: usize,
    /// Bars outside the configured categories.
    pub bars_filtered: usize,
    /// Bars that only refilled the window after a resume.
    pub bars_replayed: usize,
    /// Highest `n` processed so far, emitted or replayed.
    pub last_n: Option<u64>,
    /// BLAKE3 over the JSON of every emitted row, in order.
    pub digest: String,
    pub cancelled: bool,
}

/// Result of one token within a multi-token run.
#[derive(Debug)]
pub struct TokenOutcome {
    pub token: String,
    pub result: Result<TokenReport, RunError>,
}

fn start_engine(
    token: &str,
    sink: &dyn RowSink,
    config: &RunConfig,
) -> Result<(TokenEngine, u64, Option<u64>), RunError> {
    match sink.last_row(token)? {
        Some(row) => {
            let checkpoint = Checkpoint::from_row(&row)?;
            let offset = checkpoint.lookback_offset;
            let last_n = checkpoint.last_n;
            info!(
                token,
                last_n,
                n_lookback = checkpoint.n_lookback,
                offset,
                "resuming from checkpoint"
            );
            let engine = TokenEngine::resume(checkpoint, &config.engine, &config.window)?;
            Ok((engine, offset, Some(last_n)))
        }
        None => {
            debug!(token, "no checkpoint, cold start");
            let engine = TokenEngine::cold(token, &config.engine, &config.window)?;
            Ok((engine, 0, None))
        }
    }
}

/// Process `token` from its checkpoint (or bar 0) to the end of its stream.
pub fn run_token(
    token: &str,
    source: &dyn BarSource,
    sink: &dyn RowSink,
    config: &RunConfig,
    cancel: &AtomicBool,
) -> Result<TokenReport, RunError> {
    let started = Instant::now();
    let (mut engine, mut offset, resumed_from) = start_engine(token, sink, config)?;
    let chunk_size = config.window.chunk_size;
    let mut digest = blake3::Hasher::new();
    let mut report = TokenReport {
        token: token.to_string(),
        resumed_from,
        last_n: resumed_from,
        ..TokenReport::default()
    };

    loop {
        if cancel.load(Ordering::Relaxed) {
            info!(token, offset, "run cancelled");
            report.cancelled = true;
            break;
        }

        let fetched = source.fetch(token, offset, chunk_size)?;
        if fetched.is_empty() {
            break;
        }
        let fetched_len = fetched.len();

        let mut chunk: Vec<(u64, RawBar)> = Vec::with_capacity(fetched_len);
        for (i, bar) in fetched.into_iter().enumerate() {
            let bar_offset = offset + i as u64;
            if config.accepts_category(bar.category.as_deref()) {
                chunk.push((bar_offset, bar));
            } else {
                debug!(
                    token,
                    offset = bar_offset,
                    category = ?bar.category,
                    "bar filtered by category"
                );
                report.bars_filtered += 1;
            }
        }

        let output = engine.process_chunk(chunk)?;
        report.bars_skipped += output.skipped;
        report.bars_replayed += output.replayed;

        for row in &output.rows {
            digest.update(&serde_json::to_vec(row)?);
        }
        let upserted = sink.upsert_batch(&output.rows);
        report.rows_emitted += upserted.written;
        report.rows_failed += upserted.failed.len();
        for (n, error) in &upserted.failed {
            warn!(token, n, %error, "failed to persist row");
        }

        report.last_n = engine.next_n().checked_sub(1);
        offset += fetched_len as u64;
        if fetched_len < chunk_size {
            break;
        }
    }

    report.digest = digest.finalize().to_hex().to_string();
    info!(
        token,
        rows = report.rows_emitted,
        failed = report.rows_failed,
        skipped = report.bars_skipped,
        filtered = report.bars_filtered,
        last_n = ?report.last_n,
        elapsed_ms = started.elapsed().as_millis() as u64,
        "token done"
    );
    Ok(report)
}

/// Run every token in `tokens` on a pool of `max_concurrency` threads.
///
/// A failing token is reported in its outcome and never stops the others.
pub fn run_tokens(
    tokens: &[String],
    source: &dyn BarSource,
    sink: &dyn RowSink,
    config: &RunConfig,
    cancel: &AtomicBool,
) -> Result<Vec<TokenOutcome>, RunError> {
    config.validate()?;
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(config.max_concurrency)
        .thread_name(|i| format!("swinglab-worker-{i}"))
        .build()?;

    info!(
        tokens = tokens.len(),
        threads = config.max_concurrency,
        source = source.name(),
        sink = sink.name(),
        "starting run"
    );

    let outcomes: Vec<TokenOutcome> = pool.install(|| {
        tokens
            .par_iter()
            .map(|token| {
                let result = run_token(token, source, sink, config, cancel);
                if let Err(error) = &result {
                    warn!(token = %token, %error, "token run failed");
                }
                TokenOutcome {
                    token: token.clone(),
                    result,
                }
            })
            .collect()
    });

    let failed = outcomes.iter().filter(|o| o.result.is_err()).count();
    info!(tokens = outcomes.len(), failed, "run finished");
    Ok(outcomes)
}
