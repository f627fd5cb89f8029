//! Row Sinks — idempotent upsert of output rows keyed by `(token, n)`.
//!
//! The last row a sink holds for a token is that token's checkpoint, so
//! `last_row` must return the row with the highest `n`.

use std::collections::{BTreeMap, HashMap};
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use serde::Deserialize;
use swinglab_core::OutputRow;
use thiserror::Error;
use tracing::warn;

#[derive(Debug, Error)]
pub enum SinkError {
    #[error("io error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("sink lock poisoned")]
    Poisoned,
}

/// Outcome of a batch upsert.
#[derive(Debug, Default)]
pub struct UpsertReport {
    pub written: usize,
    pub failed: Vec<(u64, SinkError)>,
}

pub trait RowSink: Send + Sync {
    fn name(&self) -> &str;

    /// Insert or overwrite the row stored under `(row.token, row.n)`.
    fn upsert(&self, row: &OutputRow) -> Result<(), SinkError>;

    /// Upsert each row; a failing row does not stop the rest.
    fn upsert_batch(&self, rows: &[OutputRow]) -> UpsertReport {
        let mut report = UpsertReport::default();
        for row in rows {
            match self.upsert(row) {
                Ok(()) => report.written += 1,
                Err(e) => report.failed.push((row.n, e)),
            }
        }
        report
    }

    /// Row with the highest `n` for `token`.
    fn last_row(&self, token: &str) -> Result<Option<OutputRow>, SinkError>;
}

fn lock<T>(mutex: &Mutex<T>) -> Result<MutexGuard<'_, T>, SinkError> {
    mutex.lock().map_err(|_| SinkError::Poisoned)
}

// ── In-memory ────────────────────────────────────────────────────────

#[derive(Debug, Default)]
pub struct MemorySink {
    rows: Mutex<BTreeMap<(String, u64), OutputRow>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// All rows of `token` ordered by `n`.
    pub fn rows(&self, token: &str) -> Result<Vec<OutputRow>, SinkError> {
        let rows = lock(&self.rows)?;
        Ok(rows
            .range((token.to_string(), 0)..=(token.to_string(), u64::MAX))
            .map(|(_, row)| row.clone())
            .collect())
    }

    pub fn len(&self) -> Result<usize, SinkError> {
        Ok(lock(&self.rows)?.len())
    }

    pub fn is_empty(&self) -> Result<bool, SinkError> {
        Ok(lock(&self.rows)?.is_empty())
    }

    /// Drop every row of `token` above `n`. Used to simulate a crash.
    pub fn truncate_after(&self, token: &str, n: u64) -> Result<(), SinkError> {
        let mut rows = lock(&self.rows)?;
        rows.retain(|(t, k), _| t != token || *k <= n);
        Ok(())
    }
}

impl RowSink for MemorySink {
    fn name(&self) -> &str {
        "memory"
    }

    fn upsert(&self, row: &OutputRow) -> Result<(), SinkError> {
        lock(&self.rows)?.insert((row.token.clone(), row.n), row.clone());
        Ok(())
    }

    fn last_row(&self, token: &str) -> Result<Option<OutputRow>, SinkError> {
        let rows = lock(&self.rows)?;
        Ok(rows
            .range((token.to_string(), 0)..=(token.to_string(), u64::MAX))
            .next_back()
            .map(|(_, row)| row.clone()))
    }
}

// ── JSON lines ───────────────────────────────────────────────────────

/// Key fields of a persisted line, parsed without decoding the whole row.
#[derive(Deserialize)]
struct RowKey {
    n: u64,
}

/// Per-token file state. `last_n` is `None` until the file is first read.
#[derive(Debug, Default)]
struct TokenFile {
    loaded: bool,
    last_n: Option<u64>,
}

/// One `{token}.jsonl` file per token under a directory, ordered by `n`.
///
/// Rows beyond the last persisted `n` are appended. Re-emitting an `n`
/// already on disk rewrites the file with that line replaced, so the file
/// never holds two lines for the same `n`.
#[derive(Debug)]
pub struct JsonlSink {
    dir: PathBuf,
    files: Mutex<HashMap<String, Arc<Mutex<TokenFile>>>>,
}

impl JsonlSink {
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self, SinkError> {
        let dir = dir.into();
        fs::create_dir_all(&dir).map_err(|source| SinkError::Io {
            path: dir.clone(),
            source,
        })?;
        Ok(Self {
            dir,
            files: Mutex::new(HashMap::new()),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, token: &str) -> PathBuf {
        self.dir.join(format!("{token}.jsonl"))
    }

    /// Every row of `token` in file order.
    pub fn rows(&self, token: &str) -> Result<Vec<OutputRow>, SinkError> {
        let path = self.path_for(token);
        read_lines(&path)?
            .iter()
            .map(|line| serde_json::from_str(line).map_err(SinkError::from))
            .collect()
    }

    fn token_file(&self, token: &str) -> Result<Arc<Mutex<TokenFile>>, SinkError> {
        let mut files = lock(&self.files)?;
        Ok(Arc::clone(files.entry(token.to_string()).or_default()))
    }

    fn ensure_loaded(&self, token: &str, file: &mut TokenFile) -> Result<(), SinkError> {
        if !file.loaded {
            file.last_n = read_lines(&self.path_for(token))?
                .iter()
                .filter_map(|line| serde_json::from_str::<RowKey>(line).ok())
                .map(|key| key.n)
                .max();
            file.loaded = true;
        }
        Ok(())
    }

    fn append(&self, path: &Path, lines: &[String]) -> Result<(), SinkError> {
        let io = |source| SinkError::Io {
            path: path.to_path_buf(),
            source,
        };
        let handle = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(io)?;
        let mut writer = BufWriter::new(handle);
        for line in lines {
            writeln!(writer, "{line}").map_err(io)?;
        }
        writer.flush().map_err(io)
    }

    /// Replace or insert the line for `n`, keeping the file sorted by `n`.
    fn rewrite(&self, path: &Path, n: u64, line: String) -> Result<(), SinkError> {
        let mut keyed: BTreeMap<u64, String> = BTreeMap::new();
        for existing in read_lines(path)? {
            match serde_json::from_str::<RowKey>(&existing) {
                Ok(key) => {
                    keyed.insert(key.n, existing);
                }
                Err(error) => {
                    warn!(
                        path = %path.display(),
                        %error,
                        "dropping undecodable line during rewrite"
                    );
                }
            }
        }
        keyed.insert(n, line);

        let io = |source| SinkError::Io {
            path: path.to_path_buf(),
            source,
        };
        let tmp = path.with_extension("jsonl.tmp");
        {
            let mut writer = BufWriter::new(File::create(&tmp).map_err(io)?);
            for line in keyed.values() {
                writeln!(writer, "{line}").map_err(io)?;
            }
            writer.flush().map_err(io)?;
        }
        fs::rename(&tmp, path).map_err(io)
    }
}

impl RowSink for JsonlSink {
    fn name(&self) -> &str {
        "jsonl"
    }

    fn upsert(&self, row: &OutputRow) -> Result<(), SinkError> {
        let line = serde_json::to_string(row)?;
        let handle = self.token_file(&row.token)?;
        let mut file = lock(&handle)?;
        self.ensure_loaded(&row.token, &mut file)?;

        let path = self.path_for(&row.token);
        match file.last_n {
            Some(last) if row.n <= last => self.rewrite(&path, row.n, line)?,
            _ => {
                self.append(&path, &[line])?;
                file.last_n = Some(row.n);
            }
        }
        Ok(())
    }

    fn upsert_batch(&self, rows: &[OutputRow]) -> UpsertReport {
        let mut report = UpsertReport::default();
        let mut start = 0;
        // Ascending runs of one token past its last `n` go out in one append.
        while start < rows.len() {
            let token = &rows[start].token;
            let mut end = start + 1;
            while end < rows.len() && rows[end].token == *token && rows[end].n > rows[end - 1].n {
                end += 1;
            }
            self.upsert_run(&rows[start..end], &mut report);
            start = end;
        }
        report
    }

    fn last_row(&self, token: &str) -> Result<Option<OutputRow>, SinkError> {
        let lines = read_lines(&self.path_for(token))?;
        let mut best: Option<(u64, &str)> = None;
        for line in lines.iter().rev() {
            match serde_json::from_str::<RowKey>(line) {
                Ok(key) if best.map_or(true, |(n, _)| key.n > n) => best = Some((key.n, line)),
                Ok(_) => {}
                Err(error) => {
                    warn!(token, %error, "skipping undecodable row line");
                }
            }
        }
        match best {
            Some((_, line)) => Ok(Some(serde_json::from_str(line)?)),
            None => Ok(None),
        }
    }
}

impl JsonlSink {
    fn upsert_run(&self, run: &[OutputRow], report: &mut UpsertReport) {
        match self.append_run(run) {
            Ok(true) => report.written += run.len(),
            // Overlaps persisted rows, or the append failed: row by row.
            Ok(false) | Err(_) => {
                for row in run {
                    match self.upsert(row) {
                        Ok(()) => report.written += 1,
                        Err(e) => report.failed.push((row.n, e)),
                    }
                }
            }
        }
    }

    /// Append `run` in one write if it lies entirely past the last `n`.
    fn append_run(&self, run: &[OutputRow]) -> Result<bool, SinkError> {
        let Some(first) = run.first() else {
            return Ok(true);
        };
        let handle = self.token_file(&first.token)?;
        let mut file = lock(&handle)?;
        self.ensure_loaded(&first.token, &mut file)?;
        if file.last_n.is_some_and(|last| first.n <= last) {
            return Ok(false);
        }
        let lines = run
            .iter()
            .map(serde_json::to_string)
            .collect::<Result<Vec<_>, _>>()?;
        if let Err(e) = self.append(&self.path_for(&first.token), &lines) {
            // Part of the run may be on disk; re-read before the next write.
            file.loaded = false;
            return Err(e);
        }
        file.last_n = run.last().map(|row| row.n);
        Ok(true)
    }
}

/// Non-empty lines of `path`; a missing file reads as empty.
fn read_lines(path: &Path) -> Result<Vec<String>, SinkError> {
    let io = |source| SinkError::Io {
        path: path.to_path_buf(),
        source,
    };
    let file = match File::open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(io(e)),
    };
    let mut lines = Vec::new();
    for line in BufReader::new(file).lines() {
        let line = line.map_err(io)?;
        if !line.trim().is_empty() {
            lines.push(line);
        }
    }
    Ok(lines)
}
