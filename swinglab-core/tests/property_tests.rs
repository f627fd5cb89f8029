//! Property tests for engine invariants.
//!
//! Uses proptest to verify, over random OHLC walks:
//! 1. Stack bounds: no persisted stack ever exceeds 100 entries
//! 2. Lookback: `n_lookback <= n` and never moves backwards
//! 3. Passivity: direction changes only on bars that create a fractal
//! 4. ATR sentinel: ATR is `-1` exactly while `n <= atr_length`
//! 5. Pivots: levels are sentinel before the first boundary, classical after
//! 6. Resumability: a resumed run reproduces the cold run's rows exactly

mod common;

use common::{cold_rows, feed, small_window, walk};
use proptest::prelude::*;
use swinglab_core::indicators::PivotSnapshot;
use swinglab_core::stack::STACK_CAPACITY;
use swinglab_core::{Checkpoint, DonchianSource, EngineConfig, OutputRow, TokenEngine};

// ── Strategies (proptest) ────────────────────────────────────────────

fn arb_steps(len: std::ops::Range<usize>) -> impl Strategy<Value = Vec<(f64, f64, f64)>> {
    prop::collection::vec((-3.0..3.0_f64, 0.0..1.5_f64, 0.0..1.5_f64), len)
}

fn arb_config() -> impl Strategy<Value = EngineConfig> {
    (1usize..20, 0.5..4.0_f64, 1usize..25, any::<bool>()).prop_map(
        |(atr_length, atr_multiplier, dc_length, swing)| EngineConfig {
            atr_length,
            atr_multiplier,
            dc_length,
            dc_source: if swing {
                DonchianSource::Swing
            } else {
                DonchianSource::Length
            },
        },
    )
}

fn assert_classical(snap: &PivotSnapshot) -> Result<(), TestCaseError> {
    const EPS: f64 = 1e-9;
    let l = &snap.levels;
    if snap.periods_closed == 0 {
        for v in [l.pivot, l.r1, l.r2, l.r3, l.r4, l.r5, l.s1, l.s2, l.s3, l.s4, l.s5] {
            prop_assert_eq!(v, -1.0);
        }
        return Ok(());
    }
    let range = l.high - l.low;
    prop_assert!((l.r1 - (2.0 * l.pivot - l.low)).abs() < EPS);
    prop_assert!((l.s1 - (2.0 * l.pivot - l.high)).abs() < EPS);
    prop_assert!((l.r2 - (l.pivot + range)).abs() < EPS);
    prop_assert!((l.s2 - (l.pivot - range)).abs() < EPS);
    prop_assert!((l.r3 - (l.r1 + range)).abs() < EPS);
    prop_assert!((l.s3 - (l.s1 - range)).abs() < EPS);
    prop_assert!((l.r4 - (l.r3 + (l.r2 - l.r1))).abs() < EPS);
    prop_assert!((l.s4 - (l.s3 - (l.s1 - l.s2))).abs() < EPS);
    prop_assert!((l.r5 - (l.r4 + (l.r3 - l.r2))).abs() < EPS);
    prop_assert!((l.s5 - (l.s4 - (l.s2 - l.s3))).abs() < EPS);
    Ok(())
}

fn stack_lengths(row: &OutputRow) -> [usize; 7] {
    [
        row.fh_array.len(),
        row.fl_array.len(),
        row.sh_array.len(),
        row.sl_array.len(),
        row.high_1st_array.len(),
        row.low_1st_array.len(),
        row.anchors.len(),
    ]
}

// ── 1–5. Per-row invariants ──────────────────────────────────────────

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn row_invariants_hold(steps in arb_steps(1..400), config in arb_config()) {
        let rows = cold_rows(&walk(&steps), &config, &small_window());
        prop_assert_eq!(rows.len(), steps.len());

        let mut prev: Option<&OutputRow> = None;
        for row in &rows {
            for len in stack_lengths(row) {
                prop_assert!(len <= STACK_CAPACITY);
            }
            prop_assert!(row.n_lookback <= row.n);
            prop_assert_eq!(row.atr == -1.0, row.n <= config.atr_length as u64);
            prop_assert!(row.new_fh as u8 + row.new_fl as u8 <= 1);

            if let Some(p) = prev {
                prop_assert!(row.n_lookback >= p.n_lookback);
                let flipped = row.direction != p.direction;
                prop_assert_eq!(flipped, row.new_fh || row.new_fl);
            }

            assert_classical(&row.pivot_daily)?;
            assert_classical(&row.pivot_weekly)?;
            assert_classical(&row.pivot_monthly)?;
            prev = Some(row);
        }
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(8))]

    /// Long walks outgrow the capacity; the bound holds throughout.
    #[test]
    fn stacks_stay_bounded_on_long_walks(steps in arb_steps(2500..3000)) {
        let config = EngineConfig {
            atr_length: 2,
            dc_length: 3,
            ..EngineConfig::default()
        };
        let rows = cold_rows(&walk(&steps), &config, &swinglab_core::WindowConfig::default());
        for row in &rows {
            for len in stack_lengths(row) {
                prop_assert!(len <= STACK_CAPACITY);
            }
        }
    }
}

// ── 6. Resumability ──────────────────────────────────────────────────

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    #[test]
    fn resumed_run_is_byte_identical(
        steps in arb_steps(2..300),
        config in arb_config(),
        split_frac in 0.0..1.0_f64,
    ) {
        let ohlc = walk(&steps);
        let window = small_window();
        let split = 1 + ((ohlc.len() - 1) as f64 * split_frac) as usize;

        let cold: Vec<String> = cold_rows(&ohlc, &config, &window)
            .iter()
            .map(|r| serde_json::to_string(r).unwrap())
            .collect();

        let mut head = TokenEngine::cold("TOK", &config, &window).unwrap();
        let first = feed(&mut head, &ohlc[..split], 0, window.chunk_size);
        let checkpoint =
            Checkpoint::from_json(&serde_json::to_string(first.last().unwrap()).unwrap()).unwrap();
        let from = checkpoint.lookback_offset as usize;
        let mut tail = TokenEngine::resume(checkpoint, &config, &window).unwrap();
        let second = feed(&mut tail, &ohlc, from, window.chunk_size);

        prop_assert_eq!(first.len() + second.len(), cold.len());
        for (row, expected) in first.iter().chain(&second).zip(&cold) {
            prop_assert_eq!(&serde_json::to_string(row).unwrap(), expected);
        }
    }
}
