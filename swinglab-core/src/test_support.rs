//! Shared fixtures for unit tests.

use crate::buffer::WindowedBuffer;
use crate::domain::{Bar, RawBar};
use chrono::{Duration, NaiveDate, NaiveDateTime};

/// Default epsilon for floating-point assertions.
pub const DEFAULT_EPSILON: f64 = 1e-10;

/// Assert two f64 values are approximately equal (within epsilon).
pub fn assert_approx(actual: f64, expected: f64, epsilon: f64) {
    assert!(
        (actual - expected).abs() < epsilon,
        "assert_approx failed: actual={actual}, expected={expected}, diff={}, epsilon={epsilon}",
        (actual - expected).abs()
    );
}

/// Hourly timestamps starting 2024-01-02 09:00.
pub fn hour(i: usize) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 1, 2)
        .unwrap()
        .and_hms_opt(9, 0, 0)
        .unwrap()
        + Duration::hours(i as i64)
}

pub fn bar_ohlc(i: usize, (open, high, low, close): (f64, f64, f64, f64)) -> Bar {
    Bar {
        token: "TEST".to_string(),
        symbol: "TEST".to_string(),
        timestamp: hour(i),
        open,
        high,
        low,
        close,
        volume: 1000.0,
    }
}

/// Buffer from `(open, high, low, close)` rows, source offsets = indices.
pub fn buffer_from_ohlc(rows: &[(f64, f64, f64, f64)]) -> WindowedBuffer {
    let mut buffer = WindowedBuffer::default();
    for (i, &ohlc) in rows.iter().enumerate() {
        buffer.push(bar_ohlc(i, ohlc), i as u64);
    }
    buffer
}

/// Bars from `(high, low)` pairs; open and close sit at the midpoint.
pub fn bars_from_hl(rows: &[(f64, f64)]) -> Vec<Bar> {
    rows.iter()
        .enumerate()
        .map(|(i, &(high, low))| {
            let mid = (high + low) / 2.0;
            bar_ohlc(i, (mid, high, low, mid))
        })
        .collect()
}

/// Raw chunk with consecutive source offsets starting at `first_offset`.
pub fn raw_chunk(
    token: &str,
    rows: &[(f64, f64, f64, f64)],
    first_offset: u64,
) -> Vec<(u64, RawBar)> {
    rows.iter()
        .enumerate()
        .map(|(i, &(open, high, low, close))| {
            let offset = first_offset + i as u64;
            let raw = RawBar {
                token: token.to_string(),
                symbol: token.to_string(),
                timestamp: hour(offset as usize),
                open: Some(open),
                high: Some(high),
                low: Some(low),
                close: Some(close),
                volume: Some(1000.0),
                category: None,
            };
            (offset, raw)
        })
        .collect()
}

/// 25 bars: a steady decline into a low at bar 10, then a steady rally.
pub fn swing_low_at_ten() -> Vec<(f64, f64, f64, f64)> {
    let decline = (0..=10).map(|i| {
        let d = 2.0 * i as f64;
        (118.0 - d, 120.0 - d, 115.0 - d, 117.0 - d)
    });
    let rally = (1..=14).map(|k| {
        let k = k as f64;
        (96.0 + 2.0 * k, 100.0 + 3.0 * k, 95.0 + 2.0 * k, 99.0 + 3.0 * k)
    });
    decline.chain(rally).collect()
}
