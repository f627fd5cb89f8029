//! Engine parameters.

use crate::buffer::{DEFAULT_TRIM_SIZE, DEFAULT_TRIM_THRESHOLD};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Largest chunk a Bar Source is asked for.
pub const MAX_CHUNK_SIZE: usize = 1000;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("atr_length must be >= 1")]
    AtrLength,

    #[error("atr_multiplier must be finite and positive, got {0}")]
    AtrMultiplier(f64),

    #[error("dc_length must be >= 1")]
    DcLength,

    #[error("chunk_size must be in 1..={MAX_CHUNK_SIZE}, got {0}")]
    ChunkSize(usize),

    #[error("trim_size ({trim_size}) must be in 1..trim_threshold ({trim_threshold})")]
    Trim {
        trim_threshold: usize,
        trim_size: usize,
    },
}

/// Where the Donchian window boundary comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DonchianSource {
    /// Trailing `dc_length` bars.
    #[default]
    Length,
    /// Back to the `dc_length`-th most recent swing point.
    Swing,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub atr_length: usize,
    pub atr_multiplier: f64,
    pub dc_length: usize,
    pub dc_source: DonchianSource,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            atr_length: 14,
            atr_multiplier: 3.0,
            dc_length: 20,
            dc_source: DonchianSource::Length,
        }
    }
}

impl EngineConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.atr_length == 0 {
            return Err(ConfigError::AtrLength);
        }
        if !self.atr_multiplier.is_finite() || self.atr_multiplier <= 0.0 {
            return Err(ConfigError::AtrMultiplier(self.atr_multiplier));
        }
        if self.dc_length == 0 {
            return Err(ConfigError::DcLength);
        }
        Ok(())
    }
}

/// Chunking and trimming policy of the windowed buffer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WindowConfig {
    pub chunk_size: usize,
    pub trim_threshold: usize,
    pub trim_size: usize,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            chunk_size: MAX_CHUNK_SIZE,
            trim_threshold: DEFAULT_TRIM_THRESHOLD,
            trim_size: DEFAULT_TRIM_SIZE,
        }
    }
}

impl WindowConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.chunk_size == 0 || self.chunk_size > MAX_CHUNK_SIZE {
            return Err(ConfigError::ChunkSize(self.chunk_size));
        }
        if self.trim_size == 0 || self.trim_size >= self.trim_threshold {
            return Err(ConfigError::Trim {
                trim_threshold: self.trim_threshold,
                trim_size: self.trim_size,
            });
        }
        Ok(())
    }

    /// Bars detectors may look back over: the part of the window that
    /// survives a trim.
    pub fn history(&self) -> u64 {
        self.trim_threshold.saturating_sub(self.trim_size).max(1) as u64
    }

    /// Oldest bar any detector range or reference may reach at bar `n`.
    pub fn history_floor(&self, n: u64) -> u64 {
        (n + 1).saturating_sub(self.history())
    }
}
