//! Average True Range (ATR).
//!
//! True Range: max(high-low, |high-prev_close|, |low-prev_close|)
//! ATR uses Wilder smoothing: ATR[n] = (ATR[n-1]*(length-1) + TR[n]) / length.
//! Undefined for n <= length; the first value (n = length+1) is the mean of
//! the `length` true ranges ending at n.
//!
//! The pass runs over a range of freshly appended bars and is seeded with
//! the last ATR carried in token state, so a resumed stream performs exactly
//! the same arithmetic as an uninterrupted one.

use crate::buffer::{BufferError, WindowedBuffer};
use crate::domain::Bar;

/// True range of `bar` against the previous close.
pub fn true_range(bar: &Bar, prev_close: f64) -> f64 {
    (bar.high - bar.low)
        .max((bar.high - prev_close).abs())
        .max((bar.low - prev_close).abs())
}

#[derive(Debug, Clone)]
pub struct Atr {
    length: usize,
}

impl Atr {
    pub fn new(length: usize) -> Self {
        assert!(length >= 1, "ATR length must be >= 1");
        Self { length }
    }

    /// Bars behind `n` the next computation reads.
    pub fn lookback(&self) -> u64 {
        self.length as u64 + 1
    }

    /// True range at global index `n >= 1`.
    fn tr_at(&self, buffer: &WindowedBuffer, n: u64) -> Result<f64, BufferError> {
        let prev_close = buffer.bar(n - 1)?.close;
        Ok(true_range(buffer.bar(n)?, prev_close))
    }

    /// ATR at `n` given the ATR at `n - 1`.
    pub fn next(
        &self,
        buffer: &WindowedBuffer,
        n: u64,
        prev: Option<f64>,
    ) -> Result<Option<f64>, BufferError> {
        let length = self.length as u64;
        if n <= length {
            return Ok(None);
        }
        match prev {
            Some(prev) if n > length + 1 => {
                let tr = self.tr_at(buffer, n)?;
                Ok(Some((prev * (length - 1) as f64 + tr) / length as f64))
            }
            _ => {
                let mut sum = 0.0;
                for k in (n + 1 - length)..=n {
                    sum += self.tr_at(buffer, k)?;
                }
                Ok(Some(sum / length as f64))
            }
        }
    }

    /// ATR for every bar in `[from, to]`, seeded with the ATR at `from - 1`.
    pub fn compute_range(
        &self,
        buffer: &WindowedBuffer,
        from: u64,
        to: u64,
        seed: Option<f64>,
    ) -> Result<Vec<Option<f64>>, BufferError> {
        let mut out = Vec::with_capacity((to + 1).saturating_sub(from) as usize);
        let mut prev = seed;
        for n in from..=to {
            let value = self.next(buffer, n, prev)?;
            out.push(value);
            prev = value;
        }
        Ok(out)
    }
}
