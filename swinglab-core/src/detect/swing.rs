//! Swing alternator.
//!
//! While waiting for an upside break, a close above the active Fractal
//! High confirms a Swing Low at the lowest low since the last Swing High.
//! Then the detector waits for a close below the active Fractal Low, which
//! confirms a Swing High at the highest high since the last Swing Low.

use super::ActiveFractals;
use crate::buffer::{BufferError, WindowedBuffer};
use crate::state::TokenState;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SwingOutcome {
    pub new_sh: bool,
    pub new_sl: bool,
}

/// Advance the swing alternator by bar `n` against `prior`, the fractals
/// as they stood before this bar's fractal step. Searches start no earlier
/// than `floor`.
pub fn step(
    state: &mut TokenState,
    buffer: &WindowedBuffer,
    n: u64,
    prior: ActiveFractals,
    floor: u64,
) -> Result<SwingOutcome, BufferError> {
    let close = buffer.bar(n)?.close;
    let mut outcome = SwingOutcome::default();

    if state.need_break_fractal_up {
        if let Some(fh) = prior.fh {
            if close > fh {
                let sl = buffer.argmin_low(state.sh.top().max(floor), n)?;
                state.sl.push(sl);
                state.sl_price = buffer.bar(sl)?.low;
                state.need_break_fractal_up = false;
                outcome.new_sl = true;
            }
        }
    } else if let Some(fl) = prior.fl {
        if close < fl {
            let sh = buffer.argmax_high(state.sl.top().max(floor), n)?;
            state.sh.push(sh);
            state.sh_price = buffer.bar(sh)?.high;
            state.need_break_fractal_up = true;
            outcome.new_sh = true;
        }
    }

    Ok(outcome)
}
