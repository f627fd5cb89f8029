//! Classical floor pivots per calendar period.
//!
//! The running high/low of the in-progress period feed
//! `pivot_cur = (close + high_cur + low_cur) / 3` on every bar. When a bar's
//! calendar key differs from the previous bar's, the finished period is
//! frozen and its five resistance and five support levels derived.

use crate::domain::row::SENTINEL;
use chrono::{Datelike, NaiveDateTime};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PivotPeriod {
    Daily,
    Weekly,
    Monthly,
}

impl PivotPeriod {
    /// Calendar key of `ts` at this granularity.
    pub fn key(self, ts: NaiveDateTime) -> String {
        match self {
            PivotPeriod::Daily => ts.date().format("%Y-%m-%d").to_string(),
            PivotPeriod::Weekly => {
                let week = ts.iso_week();
                format!("{}-W{:02}", week.year(), week.week())
            }
            PivotPeriod::Monthly => format!("{:04}-{:02}", ts.year(), ts.month()),
        }
    }
}

/// Frozen levels of the last completed period.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PivotLevels {
    pub high: f64,
    pub low: f64,
    pub pivot: f64,
    pub r1: f64,
    pub r2: f64,
    pub r3: f64,
    pub r4: f64,
    pub r5: f64,
    pub s1: f64,
    pub s2: f64,
    pub s3: f64,
    pub s4: f64,
    pub s5: f64,
}

impl PivotLevels {
    pub fn classical(high: f64, low: f64, pivot: f64) -> Self {
        let range = high - low;
        let r1 = 2.0 * pivot - low;
        let s1 = 2.0 * pivot - high;
        let r2 = pivot + range;
        let s2 = pivot - range;
        let r3 = r1 + range;
        let s3 = s1 - range;
        let r4 = r3 + (r2 - r1);
        let s4 = s3 - (s1 - s2);
        let r5 = r4 + (r3 - r2);
        let s5 = s4 - (s2 - s3);
        Self {
            high,
            low,
            pivot,
            r1,
            r2,
            r3,
            r4,
            r5,
            s1,
            s2,
            s3,
            s4,
            s5,
        }
    }

    fn undefined() -> Self {
        Self {
            high: SENTINEL,
            low: SENTINEL,
            pivot: SENTINEL,
            r1: SENTINEL,
            r2: SENTINEL,
            r3: SENTINEL,
            r4: SENTINEL,
            r5: SENTINEL,
            s1: SENTINEL,
            s2: SENTINEL,
            s3: SENTINEL,
            s4: SENTINEL,
            s5: SENTINEL,
        }
    }
}

/// Running state of the in-progress period.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeriodAccumulator {
    pub key: String,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub pivot: f64,
}

/// Persisted view of one pivot calculator, flat with `-1` sentinels.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PivotSnapshot {
    pub key: String,
    pub high_cur: f64,
    pub low_cur: f64,
    pub close_cur: f64,
    pub pivot_cur: f64,
    /// Completed periods seen so far; the levels below are `-1` while zero.
    pub periods_closed: u64,
    #[serde(flatten)]
    pub levels: PivotLevels,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PivotState {
    pub period: PivotPeriod,
    pub cur: Option<PeriodAccumulator>,
    pub levels: Option<PivotLevels>,
    pub periods_closed: u64,
}

impl PivotState {
    pub fn new(period: PivotPeriod) -> Self {
        Self {
            period,
            cur: None,
            levels: None,
            periods_closed: 0,
        }
    }

    /// Fold one bar in. Returns true when a period boundary was crossed.
    pub fn update(&mut self, timestamp: NaiveDateTime, high: f64, low: f64, close: f64) -> bool {
        let key = self.period.key(timestamp);
        let mut crossed = false;
        match self.cur.as_mut() {
            Some(cur) if cur.key == key => {
                cur.high = cur.high.max(high);
                cur.low = cur.low.min(low);
                cur.close = close;
                cur.pivot = (close + cur.high + cur.low) / 3.0;
            }
            prior => {
                if let Some(done) = prior {
                    self.levels = Some(PivotLevels::classical(done.high, done.low, done.pivot));
                    self.periods_closed += 1;
                    crossed = true;
                }
                self.cur = Some(PeriodAccumulator {
                    key,
                    high,
                    low,
                    close,
                    pivot: (close + high + low) / 3.0,
                });
            }
        }
        crossed
    }

    /// Row view; valid once at least one bar was folded in.
    pub fn snapshot(&self) -> PivotSnapshot {
        let (key, high_cur, low_cur, close_cur, pivot_cur) = match &self.cur {
            Some(c) => (c.key.clone(), c.high, c.low, c.close, c.pivot),
            None => (String::new(), SENTINEL, SENTINEL, SENTINEL, SENTINEL),
        };
        PivotSnapshot {
            key,
            high_cur,
            low_cur,
            close_cur,
            pivot_cur,
            periods_closed: self.periods_closed,
            levels: self.levels.unwrap_or_else(PivotLevels::undefined),
        }
    }

    /// Inverse of [`PivotState::snapshot`].
    pub fn from_snapshot(period: PivotPeriod, snap: &PivotSnapshot) -> Self {
        let cur = (!snap.key.is_empty()).then(|| PeriodAccumulator {
            key: snap.key.clone(),
            high: snap.high_cur,
            low: snap.low_cur,
            close: snap.close_cur,
            pivot: snap.pivot_cur,
        });
        let levels = (snap.periods_closed > 0).then_some(snap.levels);
        Self {
            period,
            cur,
            levels,
            periods_closed: snap.periods_closed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{assert_approx, DEFAULT_EPSILON};
    use chrono::NaiveDate;

    fn at(y: i32, m: u32, d: u32, h: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(h, 0, 0)
            .unwrap()
    }

    #[test]
    fn keys_per_granularity() {
        let ts = at(2024, 12, 30, 10);
        assert_eq!(PivotPeriod::Daily.key(ts), "2024-12-30");
        // ISO week 1 of 2025 starts on Monday 2024-12-30.
        assert_eq!(PivotPeriod::Weekly.key(ts), "2025-W01");
        assert_eq!(PivotPeriod::Monthly.key(ts), "2024-12");
    }

    #[test]
    fn sentinel_until_first_boundary() {
        let mut p = PivotState::new(PivotPeriod::Daily);
        assert!(!p.update(at(2024, 1, 2, 9), 105.0, 95.0, 100.0));
        assert!(!p.update(at(2024, 1, 2, 10), 110.0, 97.0, 108.0));
        let snap = p.snapshot();
        assert_eq!(snap.levels.pivot, SENTINEL);
        assert_eq!(snap.levels.r5, SENTINEL);
        assert_approx(snap.pivot_cur, (108.0 + 110.0 + 95.0) / 3.0, DEFAULT_EPSILON);
    }

    #[test]
    fn boundary_freezes_previous_period() {
        let mut p = PivotState::new(PivotPeriod::Daily);
        p.update(at(2024, 1, 2, 9), 105.0, 95.0, 100.0);
        p.update(at(2024, 1, 2, 10), 110.0, 97.0, 108.0);
        assert!(p.update(at(2024, 1, 3, 9), 109.0, 104.0, 106.0));

        let l = p.levels.unwrap();
        let (h, lo) = (110.0, 95.0);
        let piv = (108.0 + h + lo) / 3.0;
        assert_approx(l.pivot, piv, DEFAULT_EPSILON);
        assert_approx(l.r1, 2.0 * piv - lo, DEFAULT_EPSILON);
        assert_approx(l.s1, 2.0 * piv - h, DEFAULT_EPSILON);
        assert_approx(l.r2, piv + (h - lo), DEFAULT_EPSILON);
        assert_approx(l.s2, piv - (h - lo), DEFAULT_EPSILON);
        assert_approx(l.r3, l.r1 + (h - lo), DEFAULT_EPSILON);
        assert_approx(l.s3, l.s1 - (h - lo), DEFAULT_EPSILON);
        assert_approx(l.r4, l.r3 + (l.r2 - l.r1), DEFAULT_EPSILON);
        assert_approx(l.s4, l.s3 - (l.s1 - l.s2), DEFAULT_EPSILON);
        assert_approx(l.r5, l.r4 + (l.r3 - l.r2), DEFAULT_EPSILON);
        assert_approx(l.s5, l.s4 - (l.s2 - l.s3), DEFAULT_EPSILON);

        // New period restarts the running extremes.
        let cur = p.cur.as_ref().unwrap();
        assert_eq!(cur.high, 109.0);
        assert_eq!(cur.low, 104.0);
        assert_eq!(p.periods_closed, 1);
    }

    #[test]
    fn monthly_ignores_intra_month_days() {
        let mut p = PivotState::new(PivotPeriod::Monthly);
        p.update(at(2024, 1, 2, 9), 105.0, 95.0, 100.0);
        assert!(!p.update(at(2024, 1, 31, 9), 106.0, 96.0, 101.0));
        assert!(p.update(at(2024, 2, 1, 9), 106.0, 96.0, 101.0));
    }

    #[test]
    fn snapshot_roundtrip() {
        let mut p = PivotState::new(PivotPeriod::Weekly);
        p.update(at(2024, 1, 2, 9), 105.0, 95.0, 100.0);
        p.update(at(2024, 1, 9, 9), 109.0, 104.0, 106.0);
        let back = PivotState::from_snapshot(PivotPeriod::Weekly, &p.snapshot());
        assert_eq!(back, p);
    }
}
