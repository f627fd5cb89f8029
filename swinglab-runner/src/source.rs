//! Bar Sources — ordered per-token bar streams addressed by offset.
//!
//! A source offset is the position of a bar in its token's stream,
//! counting every row the source holds (including rows later filtered
//! or rejected). Offsets are what checkpoints store, so a source must
//! return the same bar for the same offset on every call.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use swinglab_core::RawBar;
use thiserror::Error;
use tracing::{info, warn};

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("failed to open bar file {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Ordered bar stream per token.
pub trait BarSource: Send + Sync {
    fn name(&self) -> &str;

    /// Tokens known to this source, in a stable order.
    fn tokens(&self) -> Vec<String>;

    /// Up to `limit` bars of `token` starting at `offset`, in stream order.
    /// An empty result means the stream is exhausted.
    fn fetch(&self, token: &str, offset: u64, limit: usize) -> Result<Vec<RawBar>, SourceError>;
}

/// In-memory source holding every token's bars.
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    streams: BTreeMap<String, Vec<RawBar>>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Group bars by token, keeping their relative order.
    pub fn from_bars(bars: impl IntoIterator<Item = RawBar>) -> Self {
        let mut source = Self::new();
        for bar in bars {
            source.push(bar);
        }
        source
    }

    pub fn push(&mut self, bar: RawBar) {
        self.streams.entry(bar.token.clone()).or_default().push(bar);
    }

    pub fn len(&self, token: &str) -> usize {
        self.streams.get(token).map_or(0, Vec::len)
    }

    pub fn bars(&self, token: &str) -> &[RawBar] {
        self.streams.get(token).map_or(&[], Vec::as_slice)
    }
}

impl BarSource for MemorySource {
    fn name(&self) -> &str {
        "memory"
    }

    fn tokens(&self) -> Vec<String> {
        self.streams.keys().cloned().collect()
    }

    fn fetch(&self, token: &str, offset: u64, limit: usize) -> Result<Vec<RawBar>, SourceError> {
        let bars = self.bars(token);
        let start = (offset as usize).min(bars.len());
        let end = start.saturating_add(limit).min(bars.len());
        Ok(bars[start..end].to_vec())
    }
}

/// Bars loaded from one CSV file.
///
/// Columns: `token,symbol,timestamp,open,high,low,close,volume,category`.
/// Empty price cells load as missing values; the engine rejects those bars
/// later. Lines that cannot be decoded at all are skipped here.
#[derive(Debug, Clone)]
pub struct CsvSource {
    path: PathBuf,
    inner: MemorySource,
}

impl CsvSource {
    pub fn open(path: &Path) -> Result<Self, SourceError> {
        let mut reader = csv::Reader::from_path(path).map_err(|source| SourceError::Open {
            path: path.to_path_buf(),
            source,
        })?;
        let mut inner = MemorySource::new();
        let mut undecodable = 0usize;
        for (line, record) in reader.deserialize::<RawBar>().enumerate() {
            match record {
                Ok(bar) => inner.push(bar),
                Err(error) => {
                    undecodable += 1;
                    warn!(
                        path = %path.display(),
                        line = line + 2,
                        %error,
                        "skipping undecodable csv row"
                    );
                }
            }
        }
        info!(
            path = %path.display(),
            tokens = inner.streams.len(),
            undecodable,
            "loaded bar file"
        );
        Ok(Self {
            path: path.to_path_buf(),
            inner,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl BarSource for CsvSource {
    fn name(&self) -> &str {
        "csv"
    }

    fn tokens(&self) -> Vec<String> {
        self.inner.tokens()
    }

    fn fetch(&self, token: &str, offset: u64, limit: usize) -> Result<Vec<RawBar>, SourceError> {
        self.inner.fetch(token, offset, limit)
    }
}

/// Write bars in the layout [`CsvSource`] reads.
pub fn write_csv(path: &Path, bars: &[RawBar]) -> Result<(), SourceError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let mut writer = csv::Writer::from_path(path)?;
    for bar in bars {
        writer.serialize(bar)?;
    }
    writer.flush()?;
    Ok(())
}
