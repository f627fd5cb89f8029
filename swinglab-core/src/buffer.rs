//! Windowed bar buffer with stable global indices.
//!
//! Bars live in a flat arena; `base` is the global index of the first arena
//! slot. Trimming advances `base` and drops a prefix, nothing is renumbered.

use crate::domain::Bar;
use thiserror::Error;

/// Default arena size at which a trim is attempted.
pub const DEFAULT_TRIM_THRESHOLD: usize = 2000;
/// Default number of rows dropped by one trim.
pub const DEFAULT_TRIM_SIZE: usize = 1000;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BufferError {
    #[error("bar {n} is outside the buffered window [{base}, {end})")]
    Unavailable { n: u64, base: u64, end: u64 },
}

/// A buffered bar plus its position in the Bar Source stream.
#[derive(Debug, Clone, PartialEq)]
pub struct BufferedBar {
    pub bar: Bar,
    pub source_offset: u64,
}

#[derive(Debug, Clone)]
pub struct WindowedBuffer {
    bars: Vec<BufferedBar>,
    base: u64,
    trim_threshold: usize,
    trim_size: usize,
}

impl Default for WindowedBuffer {
    fn default() -> Self {
        Self::new(DEFAULT_TRIM_THRESHOLD, DEFAULT_TRIM_SIZE)
    }
}

impl WindowedBuffer {
    pub fn new(trim_threshold: usize, trim_size: usize) -> Self {
        Self::starting_at(0, trim_threshold, trim_size)
    }

    /// Empty window whose first pushed bar receives global index `base`.
    pub fn starting_at(base: u64, trim_threshold: usize, trim_size: usize) -> Self {
        Self {
            bars: Vec::new(),
            base,
            trim_threshold,
            trim_size,
        }
    }

    /// Global index of the oldest buffered bar.
    pub fn base(&self) -> u64 {
        self.base
    }

    /// Global index the next pushed bar receives.
    pub fn next_index(&self) -> u64 {
        self.base + self.bars.len() as u64
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    /// Drop old rows ahead of a chunk append.
    ///
    /// Only acts once the arena reached the threshold. Drops at least
    /// `trim_size` rows, and more when the arena overshot, so that no more
    /// than `trim_threshold - trim_size` remain; never drops a bar at or
    /// after `keep_from`. Returns the number of rows dropped.
    pub fn trim_before_append(&mut self, keep_from: u64) -> usize {
        if self.bars.len() < self.trim_threshold {
            return 0;
        }
        let surviving = self.trim_threshold.saturating_sub(self.trim_size);
        let wanted = self.trim_size.max(self.bars.len().saturating_sub(surviving));
        let droppable = keep_from.saturating_sub(self.base) as usize;
        let drop = wanted.min(droppable).min(self.bars.len());
        if drop > 0 {
            self.bars.drain(..drop);
            self.base += drop as u64;
        }
        drop
    }

    /// Append one bar and return its global index.
    pub fn push(&mut self, bar: Bar, source_offset: u64) -> u64 {
        let n = self.next_index();
        self.bars.push(BufferedBar { bar, source_offset });
        n
    }

    pub fn entry(&self, n: u64) -> Result<&BufferedBar, BufferError> {
        if n < self.base || n >= self.next_index() {
            return Err(BufferError::Unavailable {
                n,
                base: self.base,
                end: self.next_index(),
            });
        }
        Ok(&self.bars[(n - self.base) as usize])
    }

    pub fn bar(&self, n: u64) -> Result<&Bar, BufferError> {
        self.entry(n).map(|e| &e.bar)
    }

    pub fn source_offset(&self, n: u64) -> Result<u64, BufferError> {
        self.entry(n).map(|e| e.source_offset)
    }

    /// Clamp a range start to the window head.
    pub fn clamp(&self, from: u64) -> u64 {
        from.max(self.base)
    }

    /// Index of the lowest low in `[from, to]`; earliest bar wins ties.
    pub fn argmin_low(&self, from: u64, to: u64) -> Result<u64, BufferError> {
        self.arg_extreme(from, to, |bar| bar.low, |a, b| a < b)
    }

    /// Index of the highest high in `[from, to]`; earliest bar wins ties.
    pub fn argmax_high(&self, from: u64, to: u64) -> Result<u64, BufferError> {
        self.arg_extreme(from, to, |bar| bar.high, |a, b| a > b)
    }

    fn arg_extreme(
        &self,
        from: u64,
        to: u64,
        value: impl Fn(&Bar) -> f64,
        better: impl Fn(f64, f64) -> bool,
    ) -> Result<u64, BufferError> {
        let start = self.clamp(from).min(to);
        let mut best_n = start;
        let mut best = value(self.bar(start)?);
        for n in (start + 1)..=to {
            let v = value(self.bar(n)?);
            if better(v, best) {
                best = v;
                best_n = n;
            }
        }
        Ok(best_n)
    }
}
