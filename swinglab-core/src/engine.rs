//! Per-token engine: buffer, batch indicators and detectors in one place.
//!
//! A `TokenEngine` consumes chunks of raw bars in source order and emits one
//! row per new bar. Within a chunk the work runs in two phases: ATR and
//! length-mode Donchian are computed over the fresh bars first, then the
//! bar loop runs anchor/fractal → swing → trailing stop → pivots → swing
//! Donchian → `n_lookback`, and assembles the row.
//!
//! On resume the first chunk starts at the checkpoint's `lookback_offset`.
//! Bars up to the checkpoint's `last_n` only refill the window.

use crate::buffer::{BufferError, WindowedBuffer};
use crate::config::{ConfigError, DonchianSource, EngineConfig, WindowConfig};
use crate::detect::{fractal, swing, ActiveFractals, FractalOutcome, SwingOutcome};
use crate::domain::row::{or_sentinel, OutputRow, SCHEMA_VERSION};
use crate::domain::{Bar, RawBar};
use crate::indicators::{trailing_stop, Atr, Donchian, DonchianBands};
use crate::state::{Checkpoint, TokenState};
use thiserror::Error;
use tracing::{debug, warn};

/// Errors that abort a token's run.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("invalid engine configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("lookback window unavailable: {0}")]
    LookbackUnavailable(#[from] BufferError),

    #[error("resume expected source offset {expected}, got {found}")]
    ResumeGap { expected: u64, found: u64 },

    #[error("n_lookback {lookback} at bar {n} precedes the buffered window (head {base})")]
    InvalidLookback { n: u64, lookback: u64, base: u64 },
}

/// Result of feeding one chunk.
#[derive(Debug, Clone, Default)]
pub struct ChunkOutput {
    pub rows: Vec<OutputRow>,
    /// Malformed bars dropped at intake.
    pub skipped: usize,
    /// Bars that only refilled the window after a resume.
    pub replayed: usize,
}

/// Integrity checks pending while a resumed window is refilled.
#[derive(Debug, Clone, Copy)]
struct ResumeGuard {
    first_offset: Option<u64>,
    last_n: u64,
    last_source_offset: u64,
}

#[derive(Debug)]
pub struct TokenEngine {
    token: String,
    config: EngineConfig,
    window: WindowConfig,
    atr: Atr,
    donchian: Donchian,
    buffer: WindowedBuffer,
    state: TokenState,
    next_n: u64,
    n_lookback: u64,
    resume: Option<ResumeGuard>,
}

impl TokenEngine {
    /// Fresh stream starting at `n = 0`.
    pub fn cold(
        token: impl Into<String>,
        config: &EngineConfig,
        window: &WindowConfig,
    ) -> Result<Self, EngineError> {
        config.validate()?;
        window.validate()?;
        Ok(Self {
            token: token.into(),
            config: config.clone(),
            window: window.clone(),
            atr: Atr::new(config.atr_length),
            donchian: Donchian::new(config.dc_length),
            buffer: WindowedBuffer::new(window.trim_threshold, window.trim_size),
            state: TokenState::cold(),
            next_n: 0,
            n_lookback: 0,
            resume: None,
        })
    }

    /// Continue a stream from its last persisted row.
    ///
    /// The caller must feed bars starting at `checkpoint.lookback_offset`.
    pub fn resume(
        checkpoint: Checkpoint,
        config: &EngineConfig,
        window: &WindowConfig,
    ) -> Result<Self, EngineError> {
        config.validate()?;
        window.validate()?;
        Ok(Self {
            token: checkpoint.token.clone(),
            config: config.clone(),
            window: window.clone(),
            atr: Atr::new(config.atr_length),
            donchian: Donchian::new(config.dc_length),
            buffer: WindowedBuffer::starting_at(
                checkpoint.n_lookback,
                window.trim_threshold,
                window.trim_size,
            ),
            next_n: checkpoint.next_n(),
            n_lookback: checkpoint.n_lookback,
            resume: Some(ResumeGuard {
                first_offset: Some(checkpoint.lookback_offset),
                last_n: checkpoint.last_n,
                last_source_offset: checkpoint.last_source_offset,
            }),
            state: checkpoint.state,
        })
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    pub fn state(&self) -> &TokenState {
        &self.state
    }

    pub fn buffer(&self) -> &WindowedBuffer {
        &self.buffer
    }

    /// Next bar index that will produce a row.
    pub fn next_n(&self) -> u64 {
        self.next_n
    }

    /// `n_lookback` of the last emitted row.
    pub fn n_lookback(&self) -> u64 {
        self.n_lookback
    }

    /// Feed one chunk of `(source_offset, bar)` pairs in source order.
    pub fn process_chunk(
        &mut self,
        bars: Vec<(u64, RawBar)>,
    ) -> Result<ChunkOutput, EngineError> {
        let mut output = ChunkOutput::default();

        let dropped = self.buffer.trim_before_append(self.n_lookback);
        if dropped > 0 {
            debug!(token = %self.token, dropped, base = self.buffer.base(), "trimmed bar window");
        }

        let first_new = self.buffer.next_index();
        for (offset, raw) in bars {
            self.check_resume_offset(offset)?;
            let bar = match Bar::try_from(raw) {
                Ok(bar) => bar,
                Err(error) => {
                    warn!(token = %self.token, offset, %error, "skipping malformed bar");
                    output.skipped += 1;
                    continue;
                }
            };
            let n = self.buffer.push(bar, offset);
            if n < self.next_n {
                self.check_replayed_tail(n, offset)?;
                output.replayed += 1;
            }
        }

        let end = self.buffer.next_index();
        let from = first_new.max(self.next_n);
        if end <= from {
            return Ok(output);
        }
        let to = end - 1;

        let atr = self.atr.compute_range(&self.buffer, from, to, self.state.atr)?;
        let bands = match self.config.dc_source {
            DonchianSource::Length => self.donchian.compute_range(&self.buffer, from, to)?,
            DonchianSource::Swing => Vec::new(),
        };

        output.rows.reserve((end - from) as usize);
        for (i, n) in (from..=to).enumerate() {
            let row = self.step(n, atr[i], bands.get(i).copied())?;
            output.rows.push(row);
        }
        self.next_n = end;
        self.resume = None;
        Ok(output)
    }

    fn check_resume_offset(&mut self, offset: u64) -> Result<(), EngineError> {
        let Some(guard) = self.resume.as_mut() else {
            return Ok(());
        };
        match guard.first_offset.take() {
            Some(expected) if offset != expected => Err(EngineError::ResumeGap {
                expected,
                found: offset,
            }),
            _ => Ok(()),
        }
    }

    /// The replayed copy of the checkpoint bar must come from the same
    /// source position as the original.
    fn check_replayed_tail(&self, n: u64, offset: u64) -> Result<(), EngineError> {
        match self.resume {
            Some(guard) if n == guard.last_n && offset != guard.last_source_offset => {
                Err(EngineError::ResumeGap {
                    expected: guard.last_source_offset,
                    found: offset,
                })
            }
            _ => Ok(()),
        }
    }

    fn step(
        &mut self,
        n: u64,
        atr: Option<f64>,
        length_bands: Option<DonchianBands>,
    ) -> Result<OutputRow, EngineError> {
        let floor = self.window.history_floor(n);
        let prior = ActiveFractals::capture(&self.state);
        let fractal = fractal::step(&mut self.state, &self.buffer, n, floor)?;
        let swing = swing::step(&mut self.state, &self.buffer, n, prior, floor)?;
        if fractal.new_fh || fractal.new_fl {
            debug!(
                token = %self.token,
                n,
                fh = self.state.fh.top(),
                fl = self.state.fl.top(),
                direction = ?self.state.direction,
                "fractal confirmed"
            );
        }

        let bar = self.buffer.bar(n)?;
        let prev_close = match n {
            0 => None,
            _ => Some(self.buffer.bar(n - 1)?.close),
        };
        self.state.atr = atr;
        self.state.trailing_stop = trailing_stop(
            atr,
            self.config.atr_multiplier,
            bar.close,
            prev_close,
            self.state.trailing_stop,
        );

        for pivot in self.state.pivots_mut() {
            if pivot.update(bar.timestamp, bar.high, bar.low, bar.close) {
                debug!(token = %self.token, n, period = ?pivot.period, "pivot period closed");
            }
        }

        let bands = match length_bands {
            Some(bands) => bands,
            None => {
                let s = &self.state;
                self.donchian.swing_bands(&self.buffer, n, &s.sh, &s.sl, floor)?
            }
        };

        let lookback = self.lookback_at(n);
        if lookback < self.buffer.base() {
            return Err(EngineError::InvalidLookback {
                n,
                lookback,
                base: self.buffer.base(),
            });
        }
        self.n_lookback = lookback;

        self.assemble_row(n, bands, fractal, swing)
    }

    /// Oldest bar any step at `n + 1` reads.
    ///
    /// Detector references never reach behind the history floor, so seeded
    /// or long-lived stacks cannot hold the window open. The indicator terms
    /// are fixed distances behind `n`.
    fn lookback_at(&self, n: u64) -> u64 {
        let s = &self.state;
        let floor = self.window.history_floor(n);
        let swing_from = match self.config.dc_source {
            DonchianSource::Length => n,
            DonchianSource::Swing => self.donchian.swing_boundary(&s.sh, &s.sl, floor),
        };
        let detectors = [
            s.sh.nth_or_last(1),
            s.sl.nth_or_last(1),
            s.high_1st.top(),
            s.low_1st.top(),
            s.anchors.min_pos().unwrap_or(n),
            swing_from,
        ]
        .into_iter()
        .min()
        .unwrap_or(n)
        .max(floor);

        let mut lookback = detectors.min(n.saturating_sub(self.atr.lookback()));
        if self.config.dc_source == DonchianSource::Length {
            lookback = lookback.min(n.saturating_sub(self.donchian.lookback()));
        }
        lookback.min(n)
    }

    fn assemble_row(
        &self,
        n: u64,
        bands: DonchianBands,
        fractal: FractalOutcome,
        swing: SwingOutcome,
    ) -> Result<OutputRow, EngineError> {
        let s = &self.state;
        let entry = self.buffer.entry(n)?;
        let bar = &entry.bar;
        Ok(OutputRow {
            schema_version: SCHEMA_VERSION,
            token: self.token.clone(),
            symbol: bar.symbol.clone(),
            timestamp: bar.timestamp,
            n,
            n_lookback: self.n_lookback,
            source_offset: entry.source_offset,
            lookback_offset: self.buffer.source_offset(self.n_lookback)?,
            open: bar.open,
            high: bar.high,
            low: bar.low,
            close: bar.close,
            volume: bar.volume,
            atr: or_sentinel(s.atr),
            trailing_stop: or_sentinel(s.trailing_stop),
            dc_upper: or_sentinel(bands.upper),
            dc_lower: or_sentinel(bands.lower),
            dc_mid: or_sentinel(bands.mid()),
            direction: s.direction,
            need_break_fractal_up: s.need_break_fractal_up,
            fh_array: s.fh.clone(),
            fl_array: s.fl.clone(),
            sh_array: s.sh.clone(),
            sl_array: s.sl.clone(),
            high_1st_array: s.high_1st.clone(),
            low_1st_array: s.low_1st.clone(),
            anchors: s.anchors.clone(),
            fh_price: s.fh_price,
            fl_price: s.fl_price,
            sh_price: s.sh_price,
            sl_price: s.sl_price,
            lowest_from_1st_low: fractal.lowest_from_1st_low,
            highest_from_1st_high: fractal.highest_from_1st_high,
            new_fh: fractal.new_fh,
            new_fl: fractal.new_fl,
            new_sh: swing.new_sh,
            new_sl: swing.new_sl,
            anomaly_corrected: fractal.anomaly_corrected,
            pivot_daily: s.pivot_daily.snapshot(),
            pivot_weekly: s.pivot_weekly.snapshot(),
            pivot_monthly: s.pivot_monthly.snapshot(),
        })
    }
}
