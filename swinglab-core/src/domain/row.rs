//! Output row — one fully computed record per bar, keyed by `(token, n)`.
//!
//! A row doubles as the checkpoint record: it carries every piece of mutable
//! detector state, so the last persisted row is enough to resume a stream.

use crate::indicators::pivot::PivotSnapshot;
use crate::stack::{AnchorStack, IndexStack};
use crate::state::Direction;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// Current schema version of persisted rows.
pub const SCHEMA_VERSION: u32 = 1;

/// Value of an undefined numeric field.
pub const SENTINEL: f64 = -1.0;

/// Encode an optional indicator value with the `-1` sentinel.
pub fn or_sentinel(value: Option<f64>) -> f64 {
    value.unwrap_or(SENTINEL)
}

/// Decode a sentinel-encoded value.
pub fn defined(value: f64) -> Option<f64> {
    (value != SENTINEL).then_some(value)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputRow {
    pub schema_version: u32,
    pub token: String,
    pub symbol: String,
    pub timestamp: NaiveDateTime,
    pub n: u64,
    /// Oldest bar index the stream still needs.
    pub n_lookback: u64,
    /// Position of bar `n` in the Bar Source stream.
    pub source_offset: u64,
    /// Position of bar `n_lookback` in the Bar Source stream.
    pub lookback_offset: u64,

    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,

    pub atr: f64,
    pub trailing_stop: f64,
    pub dc_upper: f64,
    pub dc_lower: f64,
    pub dc_mid: f64,

    pub direction: Direction,
    pub need_break_fractal_up: bool,
    pub fh_array: IndexStack,
    pub fl_array: IndexStack,
    pub sh_array: IndexStack,
    pub sl_array: IndexStack,
    pub high_1st_array: IndexStack,
    pub low_1st_array: IndexStack,
    pub anchors: AnchorStack,

    pub fh_price: f64,
    pub fl_price: f64,
    pub sh_price: f64,
    pub sl_price: f64,
    pub lowest_from_1st_low: i64,
    pub highest_from_1st_high: i64,

    pub new_fh: bool,
    pub new_fl: bool,
    pub new_sh: bool,
    pub new_sl: bool,
    pub anomaly_corrected: bool,

    pub pivot_daily: PivotSnapshot,
    pub pivot_weekly: PivotSnapshot,
    pub pivot_monthly: PivotSnapshot,
}

impl OutputRow {
    /// Upsert key.
    pub fn key(&self) -> (&str, u64) {
        (&self.token, self.n)
    }
}
