//! ATR trailing stop recurrence.
//!
//! stop = ATR * multiplier. With `prev` the previous stop (or the current
//! close when undefined):
//! - close and previous close above prev → max(prev, close - stop)
//! - close and previous close below prev → min(prev, close + stop)
//! - only close above prev → close - stop
//! - otherwise → close + stop

/// Next trailing stop. `None` whenever ATR is undefined.
pub fn trailing_stop(
    atr: Option<f64>,
    multiplier: f64,
    close: f64,
    prev_close: Option<f64>,
    prev_stop: Option<f64>,
) -> Option<f64> {
    let stop = atr? * multiplier;
    let prev = prev_stop.unwrap_or(close);
    let prev_close = prev_close.unwrap_or(close);

    let value = if close > prev && prev_close > prev {
        prev.max(close - stop)
    } else if close < prev && prev_close < prev {
        prev.min(close + stop)
    } else if close > prev {
        close - stop
    } else {
        close + stop
    };
    Some(value)
}
