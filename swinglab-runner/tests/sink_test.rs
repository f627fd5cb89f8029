//! Row sink upsert semantics.

use swinglab_core::{EngineConfig, OutputRow, TokenEngine, WindowConfig};
use swinglab_runner::synthetic::{token_bars, SyntheticSpec};
use swinglab_runner::{JsonlSink, MemorySink, RowSink};

fn rows(token: &str, count: usize) -> Vec<OutputRow> {
    let spec = SyntheticSpec {
        bars_per_token: count,
        ..SyntheticSpec::default()
    };
    let chunk = token_bars(&spec, token)
        .into_iter()
        .enumerate()
        .map(|(i, bar)| (i as u64, bar))
        .collect();
    let mut engine =
        TokenEngine::cold(token, &EngineConfig::default(), &WindowConfig::default()).unwrap();
    engine.process_chunk(chunk).unwrap().rows
}

fn line_count(sink: &JsonlSink, token: &str) -> usize {
    std::fs::read_to_string(sink.path_for(token))
        .unwrap()
        .lines()
        .count()
}

#[test]
fn memory_sink_overwrites_by_key() {
    let sink = MemorySink::new();
    let mut batch = rows("AAA", 5);
    assert_eq!(sink.upsert_batch(&batch).written, 5);

    batch[2].close = 1.25;
    sink.upsert(&batch[2]).unwrap();
    let stored = sink.rows("AAA").unwrap();
    assert_eq!(stored.len(), 5);
    assert_eq!(stored[2].close, 1.25);
    assert_eq!(sink.last_row("AAA").unwrap().unwrap().n, 4);
    assert!(sink.last_row("BBB").unwrap().is_none());
}

#[test]
fn memory_sink_keeps_tokens_apart() {
    let sink = MemorySink::new();
    sink.upsert_batch(&rows("AAA", 3));
    sink.upsert_batch(&rows("AB", 6));
    assert_eq!(sink.rows("AAA").unwrap().len(), 3);
    assert_eq!(sink.last_row("AAA").unwrap().unwrap().n, 2);
    assert_eq!(sink.last_row("AB").unwrap().unwrap().n, 5);
}

#[test]
fn jsonl_appends_then_replaces_without_duplicates() {
    let dir = tempfile::tempdir().unwrap();
    let sink = JsonlSink::new(dir.path().join("rows")).unwrap();
    let mut batch = rows("AAA", 8);

    let report = sink.upsert_batch(&batch[..6]);
    assert_eq!(report.written, 6);
    assert!(report.failed.is_empty());
    assert_eq!(line_count(&sink, "AAA"), 6);

    // Overlapping batch: 4 and 5 already on disk, 6 and 7 new.
    batch[4].volume = 7.0;
    let report = sink.upsert_batch(&batch[4..]);
    assert_eq!(report.written, 4);
    assert_eq!(line_count(&sink, "AAA"), 8);

    let stored = sink.rows("AAA").unwrap();
    let ns: Vec<u64> = stored.iter().map(|r| r.n).collect();
    assert_eq!(ns, (0..8).collect::<Vec<_>>());
    assert_eq!(stored[4].volume, 7.0);
    assert_eq!(stored[7], batch[7]);
}

#[test]
fn jsonl_last_row_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let batch = rows("AAA", 12);
    {
        let sink = JsonlSink::new(dir.path()).unwrap();
        sink.upsert_batch(&batch);
    }
    let sink = JsonlSink::new(dir.path()).unwrap();
    assert_eq!(sink.last_row("AAA").unwrap().unwrap(), batch[11]);

    // A re-emitted older row after reopening must not duplicate.
    sink.upsert(&batch[3]).unwrap();
    assert_eq!(line_count(&sink, "AAA"), 12);
    assert_eq!(sink.last_row("AAA").unwrap().unwrap().n, 11);
}

#[test]
fn jsonl_last_row_skips_torn_tail() {
    let dir = tempfile::tempdir().unwrap();
    let sink = JsonlSink::new(dir.path()).unwrap();
    let batch = rows("AAA", 4);
    sink.upsert_batch(&batch);

    let path = sink.path_for("AAA");
    let mut content = std::fs::read_to_string(&path).unwrap();
    content.push_str("{\"schema_version\":1,\"token\":\"AAA\",\"n\":");
    std::fs::write(&path, content).unwrap();

    assert_eq!(sink.last_row("AAA").unwrap().unwrap(), batch[3]);
}

#[test]
fn jsonl_missing_token_has_no_rows() {
    let dir = tempfile::tempdir().unwrap();
    let sink = JsonlSink::new(dir.path()).unwrap();
    assert!(sink.last_row("ZZZ").unwrap().is_none());
    assert!(sink.rows("ZZZ").unwrap().is_empty());
}
