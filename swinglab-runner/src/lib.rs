//! SwingLab Runner — feeds token streams through the core engine.
//!
//! This crate builds on `swinglab-core` to provide:
//! - Bar Sources: in-memory, CSV file, seeded synthetic walk
//! - Row Sinks: in-memory and per-token JSON lines, both upserting by `(token, n)`
//! - TOML run configuration with a category filter
//! - Resumable per-token runs and a parallel multi-token runner

pub mod config;
pub mod runner;
pub mod sink;
pub mod source;
pub mod synthetic;

pub use config::{ConfigError, RunConfig};
pub use runner::{run_token, run_tokens, RunError, TokenOutcome, TokenReport};
pub use sink::{JsonlSink, MemorySink, RowSink, SinkError, UpsertReport};
pub use source::{write_csv, BarSource, CsvSource, MemorySource, SourceError};
pub use synthetic::{SyntheticSource, SyntheticSpec};
