//! Shared helpers for swinglab-core integration tests.

#![allow(dead_code)]

use chrono::{Duration, NaiveDate, NaiveDateTime};
use swinglab_core::{EngineConfig, OutputRow, RawBar, TokenEngine, WindowConfig};

/// Bar `i` of a series sampled every six hours from 2024-01-01.
pub fn ts(i: usize) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 1, 1)
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap()
        + Duration::hours(6 * i as i64)
}

pub fn raw(token: &str, i: usize, (open, high, low, close): (f64, f64, f64, f64)) -> RawBar {
    RawBar {
        token: token.to_string(),
        symbol: format!("{token}/USD"),
        timestamp: ts(i),
        open: Some(open),
        high: Some(high),
        low: Some(low),
        close: Some(close),
        volume: Some(10.0 + i as f64),
        category: None,
    }
}

/// Random-walk style OHLC from per-bar `(drift, upper_wick, lower_wick)`.
pub fn walk(steps: &[(f64, f64, f64)]) -> Vec<(f64, f64, f64, f64)> {
    let mut close = 1000.0;
    steps
        .iter()
        .map(|&(drift, up, down)| {
            let open = close;
            close = open + drift;
            (open, open.max(close) + up, open.min(close) - down, close)
        })
        .collect()
}

/// Feed `ohlc[from..]` (source offset == index) in chunks of `chunk`.
pub fn feed(
    engine: &mut TokenEngine,
    ohlc: &[(f64, f64, f64, f64)],
    from: usize,
    chunk: usize,
) -> Vec<OutputRow> {
    let token = engine.token().to_string();
    let mut rows = Vec::new();
    let indexed: Vec<(u64, RawBar)> = ohlc
        .iter()
        .enumerate()
        .skip(from)
        .map(|(i, &bar)| (i as u64, raw(&token, i, bar)))
        .collect();
    for part in indexed.chunks(chunk) {
        let out = engine.process_chunk(part.to_vec()).unwrap();
        rows.extend(out.rows);
    }
    rows
}

pub fn cold_rows(
    ohlc: &[(f64, f64, f64, f64)],
    config: &EngineConfig,
    window: &WindowConfig,
) -> Vec<OutputRow> {
    let mut engine = TokenEngine::cold("TOK", config, window).unwrap();
    feed(&mut engine, ohlc, 0, window.chunk_size)
}

pub fn small_window() -> WindowConfig {
    WindowConfig {
        chunk_size: 7,
        trim_threshold: 30,
        trim_size: 15,
    }
}
