//! Checkpoint — strongly typed resume record rebuilt from the last row.
//!
//! Resume contract:
//! - state continues at `last_n + 1`
//! - bars are re-fetched from `lookback_offset` (the source position of
//!   `n_lookback`), replayed into the buffer as history, then processed
//!   from `last_n + 1` onwards

use super::TokenState;
use crate::domain::row::{defined, OutputRow, SCHEMA_VERSION};
use crate::indicators::pivot::{PivotPeriod, PivotState};
use crate::stack::STACK_CAPACITY;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CheckpointError {
    #[error("row schema version {found} is not supported (expected {SCHEMA_VERSION})")]
    SchemaVersion { found: u32 },

    #[error("row {n} has n_lookback {n_lookback} beyond the bar itself")]
    LookbackAfterBar { n: u64, n_lookback: u64 },

    #[error("row {n} has lookback_offset {lookback_offset} beyond source_offset {source_offset}")]
    OffsetOrder {
        n: u64,
        lookback_offset: u64,
        source_offset: u64,
    },

    #[error("row {n} stack `{name}` holds {len} entries (capacity {STACK_CAPACITY})")]
    StackBound { n: u64, name: &'static str, len: usize },

    #[error("malformed row: {0}")]
    Parse(#[from] serde_json::Error),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Checkpoint {
    pub token: String,
    pub symbol: String,
    pub last_n: u64,
    pub n_lookback: u64,
    pub lookback_offset: u64,
    pub last_source_offset: u64,
    pub state: TokenState,
}

impl Checkpoint {
    /// Rebuild the resume record from the last persisted row.
    pub fn from_row(row: &OutputRow) -> Result<Self, CheckpointError> {
        if row.schema_version != SCHEMA_VERSION {
            return Err(CheckpointError::SchemaVersion {
                found: row.schema_version,
            });
        }
        if row.n_lookback > row.n {
            return Err(CheckpointError::LookbackAfterBar {
                n: row.n,
                n_lookback: row.n_lookback,
            });
        }
        if row.lookback_offset > row.source_offset {
            return Err(CheckpointError::OffsetOrder {
                n: row.n,
                lookback_offset: row.lookback_offset,
                source_offset: row.source_offset,
            });
        }
        let stacks = [
            ("fh_array", row.fh_array.len()),
            ("fl_array", row.fl_array.len()),
            ("sh_array", row.sh_array.len()),
            ("sl_array", row.sl_array.len()),
            ("high_1st_array", row.high_1st_array.len()),
            ("low_1st_array", row.low_1st_array.len()),
            ("anchor_array", row.anchors.len()),
        ];
        if let Some((name, len)) = stacks.into_iter().find(|(_, len)| *len > STACK_CAPACITY) {
            return Err(CheckpointError::StackBound { n: row.n, name, len });
        }

        let state = TokenState {
            direction: row.direction,
            need_break_fractal_up: row.need_break_fractal_up,
            fh: row.fh_array.clone(),
            fl: row.fl_array.clone(),
            sh: row.sh_array.clone(),
            sl: row.sl_array.clone(),
            anchors: row.anchors.clone(),
            high_1st: row.high_1st_array.clone(),
            low_1st: row.low_1st_array.clone(),
            fh_price: row.fh_price,
            fl_price: row.fl_price,
            sh_price: row.sh_price,
            sl_price: row.sl_price,
            atr: defined(row.atr),
            trailing_stop: defined(row.trailing_stop),
            pivot_daily: PivotState::from_snapshot(PivotPeriod::Daily, &row.pivot_daily),
            pivot_weekly: PivotState::from_snapshot(PivotPeriod::Weekly, &row.pivot_weekly),
            pivot_monthly: PivotState::from_snapshot(PivotPeriod::Monthly, &row.pivot_monthly),
        };

        Ok(Self {
            token: row.token.clone(),
            symbol: row.symbol.clone(),
            last_n: row.n,
            n_lookback: row.n_lookback,
            lookback_offset: row.lookback_offset,
            last_source_offset: row.source_offset,
            state,
        })
    }

    /// Parse a persisted JSON row and rebuild the checkpoint.
    pub fn from_json(line: &str) -> Result<Self, CheckpointError> {
        let row: OutputRow = serde_json::from_str(line)?;
        Self::from_row(&row)
    }

    /// First bar index the resumed stream processes.
    pub fn next_n(&self) -> u64 {
        self.last_n + 1
    }
}
