//! Anchor/fractal state machine.
//!
//! In `Up` the detector collects anchors on bars that do not continue an up
//! move and counts upward breakouts against them. The second breakout of
//! any anchor confirms a Fractal Low at the lowest low since the last
//! low-side checkpoint, resets the anchors and flips to `Down`. `Down`
//! mirrors everything and confirms Fractal Highs.
//!
//! At most one fractal is created per bar. When no fractal is created, a
//! new extreme beyond the opposite fractal drags that fractal forward.

use super::breaks;
use crate::buffer::{BufferError, WindowedBuffer};
use crate::stack::Anchor;
use crate::state::{Direction, TokenState};
use tracing::debug;

/// What the fractal step did at one bar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FractalOutcome {
    pub new_fh: bool,
    pub new_fl: bool,
    /// The opposite fractal was recomputed after an inversion.
    pub anomaly_corrected: bool,
    /// Offset from `n` of the lowest low since `low_1st` (always <= 0).
    pub lowest_from_1st_low: i64,
    /// Offset from `n` of the highest high since `high_1st` (always <= 0).
    pub highest_from_1st_high: i64,
}

/// Advance the anchor/fractal state by bar `n`.
///
/// No range or anchor reaches behind `floor`; anchors older than it are
/// dropped before the bar is examined.
pub fn step(
    state: &mut TokenState,
    buffer: &WindowedBuffer,
    n: u64,
    floor: u64,
) -> Result<FractalOutcome, BufferError> {
    let direction = state.direction;
    let bar = buffer.bar(n)?;

    state.anchors.drop_before(floor);
    if n > 0
        && !state.anchors.contains_pos(n)
        && !breaks(direction, bar, buffer.bar(n - 1)?)
    {
        state.anchors.push(Anchor::fresh(n));
    }

    let lowest = buffer.argmin_low(state.low_1st.top().max(floor), n)?;
    let highest = buffer.argmax_high(state.high_1st.top().max(floor), n)?;
    let mut outcome = FractalOutcome {
        lowest_from_1st_low: lowest as i64 - n as i64,
        highest_from_1st_high: highest as i64 - n as i64,
        ..FractalOutcome::default()
    };

    let mut confirmed_by = None;
    for anchor in state.anchors.iter_mut() {
        if !breaks(direction, bar, buffer.bar(anchor.pos)?) {
            continue;
        }
        anchor.counter += 1;
        if anchor.counter == 1 {
            anchor.first_break = Some(n);
        } else {
            confirmed_by = Some(anchor.first_break.unwrap_or(n));
            break;
        }
    }

    match (confirmed_by, direction) {
        (Some(first_break), Direction::Up) => {
            let prior_high_1st = state.high_1st.top();
            state.fl.push(lowest);
            state.fl_price = buffer.bar(lowest)?.low;
            state.high_1st.push(first_break);
            if !state.fh.is_sentinel() && lowest < state.fh.top() {
                let from = prior_high_1st.min(lowest).max(floor);
                let corrected = buffer.argmax_high(from, lowest)?;
                debug!(
                    n,
                    fl = lowest,
                    fh = state.fh.top(),
                    corrected,
                    "fractal high moved behind new fractal low"
                );
                state.fh.replace_top(corrected);
                state.fh_price = buffer.bar(corrected)?.high;
                outcome.anomaly_corrected = true;
            }
            outcome.new_fl = true;
        }
        (Some(first_break), Direction::Down) => {
            let prior_low_1st = state.low_1st.top();
            state.fh.push(highest);
            state.fh_price = buffer.bar(highest)?.high;
            state.low_1st.push(first_break);
            if !state.fl.is_sentinel() && highest < state.fl.top() {
                let from = prior_low_1st.min(highest).max(floor);
                let corrected = buffer.argmin_low(from, highest)?;
                debug!(
                    n,
                    fh = highest,
                    fl = state.fl.top(),
                    corrected,
                    "fractal low moved behind new fractal high"
                );
                state.fl.replace_top(corrected);
                state.fl_price = buffer.bar(corrected)?.low;
                outcome.anomaly_corrected = true;
            }
            outcome.new_fh = true;
        }
        (None, Direction::Up) => {
            if !state.fh.is_sentinel() && bar.high > state.fh_price {
                state.fh.replace_top(n);
                state.fh_price = bar.high;
            }
        }
        (None, Direction::Down) => {
            if !state.fl.is_sentinel() && bar.low < state.fl_price {
                state.fl.replace_top(n);
                state.fl_price = bar.low;
            }
        }
    }

    if confirmed_by.is_some() {
        state.anchors.reset_to(n);
        state.direction = direction.flipped();
    }

    Ok(outcome)
}
