//! SwingLab Core — incremental fractal/swing detection over OHLC streams.
//!
//! This crate contains everything that runs inside one token's worker:
//! - Domain types (raw and validated bars, output rows)
//! - Bounded index stacks and their versioned text encoding
//! - Windowed bar buffer with stable global indices
//! - Indicators: ATR, Donchian, ATR trailing stop, floor pivots
//! - Anchor/fractal state machine and swing alternator
//! - Token state, checkpoint reconstruction and the per-token engine

pub mod buffer;
pub mod config;
pub mod detect;
pub mod domain;
pub mod engine;
pub mod indicators;
pub mod stack;
pub mod state;

#[cfg(test)]
pub(crate) mod test_support;

pub use config::{DonchianSource, EngineConfig, WindowConfig};
pub use domain::{Bar, OutputRow, RawBar};
pub use engine::{ChunkOutput, EngineError, TokenEngine};
pub use state::{Checkpoint, TokenState};
