//! Per-bar detectors: anchor/fractal state machine and swing alternator.
//!
//! Both mutate `TokenState` in place and read bars through the windowed
//! buffer. Ranges start no earlier than the history floor handed in by the
//! engine; comparisons against an active extremum use the price kept in
//! state rather than re-reading its bar.

pub mod fractal;
pub mod swing;

pub use fractal::FractalOutcome;
pub use swing::SwingOutcome;

use crate::domain::Bar;
use crate::state::{Direction, TokenState};

/// True when `bar` breaks `reference` in `direction`.
///
/// Up: higher high and higher close. Down: lower low and lower close.
/// Equal values never break.
pub fn breaks(direction: Direction, bar: &Bar, reference: &Bar) -> bool {
    match direction {
        Direction::Up => bar.high > reference.high && bar.close > reference.close,
        Direction::Down => bar.low < reference.low && bar.close < reference.close,
    }
}

/// Active fractal prices as they stood before the current bar's fractal
/// step. `None` while the stack is still at its seed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ActiveFractals {
    pub fh: Option<f64>,
    pub fl: Option<f64>,
}

impl ActiveFractals {
    pub fn capture(state: &TokenState) -> Self {
        Self {
            fh: (!state.fh.is_sentinel()).then_some(state.fh_price),
            fl: (!state.fl.is_sentinel()).then_some(state.fl_price),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::bar_ohlc;

    #[test]
    fn breaks_requires_both_conditions() {
        let reference = bar_ohlc(0, (10.0, 12.0, 9.0, 11.0));
        let higher = bar_ohlc(1, (11.0, 13.0, 10.0, 12.0));
        let high_only = bar_ohlc(1, (11.0, 13.0, 10.0, 10.5));
        let equal_high = bar_ohlc(1, (11.0, 12.0, 10.0, 11.5));

        assert!(breaks(Direction::Up, &higher, &reference));
        assert!(!breaks(Direction::Up, &high_only, &reference));
        assert!(!breaks(Direction::Up, &equal_high, &reference));
        assert!(!breaks(Direction::Down, &higher, &reference));
        assert!(breaks(Direction::Down, &reference, &higher));
    }

    #[test]
    fn capture_hides_seeded_stacks() {
        let mut state = TokenState::cold();
        assert_eq!(
            ActiveFractals::capture(&state),
            ActiveFractals { fh: None, fl: None }
        );
        state.fh.push(4);
        state.fh_price = 12.5;
        assert_eq!(ActiveFractals::capture(&state).fh, Some(12.5));
        assert_eq!(ActiveFractals::capture(&state).fl, None);
    }
}
