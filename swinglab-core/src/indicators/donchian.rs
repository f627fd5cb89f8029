//! Donchian Channel — highest high / lowest low over a window.
//!
//! Length mode: the trailing `length` bars, defined from n = length-1.
//! Swing mode: back to the `length`-th most recent swing high (upper) or
//! swing low (lower); always defined.

use crate::buffer::{BufferError, WindowedBuffer};
use crate::stack::IndexStack;

/// Channel bands at one bar. `None` while undefined.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct DonchianBands {
    pub upper: Option<f64>,
    pub lower: Option<f64>,
}

impl DonchianBands {
    pub fn mid(&self) -> Option<f64> {
        match (self.upper, self.lower) {
            (Some(u), Some(l)) => Some((u + l) / 2.0),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Donchian {
    length: usize,
}

impl Donchian {
    pub fn new(length: usize) -> Self {
        assert!(length >= 1, "Donchian length must be >= 1");
        Self { length }
    }

    /// Bars behind `n` the next length-mode computation reads.
    pub fn lookback(&self) -> u64 {
        self.length as u64 + 1
    }

    /// Length-mode bands at `n`.
    pub fn length_bands(
        &self,
        buffer: &WindowedBuffer,
        n: u64,
    ) -> Result<DonchianBands, BufferError> {
        let length = self.length as u64;
        if n + 1 < length {
            return Ok(DonchianBands::default());
        }
        self.bands_between(buffer, n + 1 - length, n, n + 1 - length, n)
    }

    /// Length-mode bands for every bar in `[from, to]`.
    pub fn compute_range(
        &self,
        buffer: &WindowedBuffer,
        from: u64,
        to: u64,
    ) -> Result<Vec<DonchianBands>, BufferError> {
        (from..=to).map(|n| self.length_bands(buffer, n)).collect()
    }

    /// Swing-mode bands at `n`. Neither band reaches behind `floor`.
    pub fn swing_bands(
        &self,
        buffer: &WindowedBuffer,
        n: u64,
        sh: &IndexStack,
        sl: &IndexStack,
        floor: u64,
    ) -> Result<DonchianBands, BufferError> {
        let upper_from = sh.nth_or_last(self.length - 1).max(floor).min(n);
        let lower_from = sl.nth_or_last(self.length - 1).max(floor).min(n);
        self.bands_between(buffer, upper_from, n, lower_from, n)
    }

    /// Oldest bar a swing-mode computation reads.
    pub fn swing_boundary(&self, sh: &IndexStack, sl: &IndexStack, floor: u64) -> u64 {
        sh.nth_or_last(self.length - 1)
            .min(sl.nth_or_last(self.length - 1))
            .max(floor)
    }

    fn bands_between(
        &self,
        buffer: &WindowedBuffer,
        upper_from: u64,
        upper_to: u64,
        lower_from: u64,
        lower_to: u64,
    ) -> Result<DonchianBands, BufferError> {
        let hi = buffer.argmax_high(upper_from, upper_to)?;
        let lo = buffer.argmin_low(lower_from, lower_to)?;
        Ok(DonchianBands {
            upper: Some(buffer.bar(hi)?.high),
            lower: Some(buffer.bar(lo)?.low),
        })
    }
}
