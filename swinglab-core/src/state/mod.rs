//! Mutable per-token detector state.
//!
//! One `TokenState` is owned by the worker processing a token and is passed
//! explicitly through every detector step. It is rebuilt from the last
//! persisted row on resume (see [`checkpoint`]).

pub mod checkpoint;

pub use checkpoint::{Checkpoint, CheckpointError};

use crate::indicators::pivot::{PivotPeriod, PivotState};
use crate::stack::{AnchorStack, IndexStack};
use serde::{Deserialize, Serialize};

/// Which fractal the engine is currently trying to create.
///
/// `Up` counts upward breakouts and creates Fractal Lows; `Down` counts
/// downward breakouts and creates Fractal Highs. Persisted as 1 / 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum Direction {
    #[default]
    Up,
    Down,
}

impl Direction {
    pub fn flipped(self) -> Self {
        match self {
            Direction::Up => Direction::Down,
            Direction::Down => Direction::Up,
        }
    }
}

impl From<Direction> for u8 {
    fn from(d: Direction) -> Self {
        match d {
            Direction::Up => 1,
            Direction::Down => 0,
        }
    }
}

impl TryFrom<u8> for Direction {
    type Error = String;

    fn try_from(v: u8) -> Result<Self, Self::Error> {
        match v {
            1 => Ok(Direction::Up),
            0 => Ok(Direction::Down),
            other => Err(format!("direction must be 0 or 1, got {other}")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenState {
    pub direction: Direction,
    pub need_break_fractal_up: bool,
    pub fh: IndexStack,
    pub fl: IndexStack,
    pub sh: IndexStack,
    pub sl: IndexStack,
    pub anchors: AnchorStack,
    pub high_1st: IndexStack,
    pub low_1st: IndexStack,
    /// Prices at the active entries, 0.0 while a stack is at its seed.
    /// Point comparisons use these so an old extremum never pins the window.
    pub fh_price: f64,
    pub fl_price: f64,
    pub sh_price: f64,
    pub sl_price: f64,
    pub atr: Option<f64>,
    pub trailing_stop: Option<f64>,
    pub pivot_daily: PivotState,
    pub pivot_weekly: PivotState,
    pub pivot_monthly: PivotState,
}

impl Default for TokenState {
    fn default() -> Self {
        Self::cold()
    }
}

impl TokenState {
    /// Cold-start state: every extremum stack `[0]`, direction UP, waiting
    /// for a fractal-high break.
    pub fn cold() -> Self {
        Self {
            direction: Direction::Up,
            need_break_fractal_up: true,
            fh: IndexStack::seeded(),
            fl: IndexStack::seeded(),
            sh: IndexStack::seeded(),
            sl: IndexStack::seeded(),
            anchors: AnchorStack::default(),
            high_1st: IndexStack::seeded(),
            low_1st: IndexStack::seeded(),
            fh_price: 0.0,
            fl_price: 0.0,
            sh_price: 0.0,
            sl_price: 0.0,
            atr: None,
            trailing_stop: None,
            pivot_daily: PivotState::new(PivotPeriod::Daily),
            pivot_weekly: PivotState::new(PivotPeriod::Weekly),
            pivot_monthly: PivotState::new(PivotPeriod::Monthly),
        }
    }

    pub fn pivots_mut(&mut self) -> [&mut PivotState; 3] {
        [
            &mut self.pivot_daily,
            &mut self.pivot_weekly,
            &mut self.pivot_monthly,
        ]
    }
}
