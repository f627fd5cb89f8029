//! Bar — the fundamental market data unit.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Bar as delivered by a Bar Source, before validation.
///
/// Price fields are optional because upstream rows can arrive with holes.
/// `category` lets a deployment drop instrument classes it does not own.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawBar {
    pub token: String,
    pub symbol: String,
    pub timestamp: NaiveDateTime,
    pub open: Option<f64>,
    pub high: Option<f64>,
    pub low: Option<f64>,
    pub close: Option<f64>,
    #[serde(default)]
    pub volume: Option<f64>,
    #[serde(default)]
    pub category: Option<String>,
}

/// Reasons a raw bar is rejected at intake.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum BarError {
    #[error("bar at {timestamp} is missing `{field}`")]
    MissingField {
        timestamp: NaiveDateTime,
        field: &'static str,
    },

    #[error("bar at {timestamp} has non-finite `{field}`")]
    NonFinite {
        timestamp: NaiveDateTime,
        field: &'static str,
    },

    #[error("bar at {timestamp} has high {high} below low {low}")]
    InvertedRange {
        timestamp: NaiveDateTime,
        high: f64,
        low: f64,
    },
}

/// Validated OHLCV bar for a single token.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    pub token: String,
    pub symbol: String,
    pub timestamp: NaiveDateTime,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

fn required(
    value: Option<f64>,
    field: &'static str,
    timestamp: NaiveDateTime,
) -> Result<f64, BarError> {
    let v = value.ok_or(BarError::MissingField { timestamp, field })?;
    if !v.is_finite() {
        return Err(BarError::NonFinite { timestamp, field });
    }
    Ok(v)
}

impl TryFrom<RawBar> for Bar {
    type Error = BarError;

    fn try_from(raw: RawBar) -> Result<Self, Self::Error> {
        let ts = raw.timestamp;
        let open = required(raw.open, "open", ts)?;
        let high = required(raw.high, "high", ts)?;
        let low = required(raw.low, "low", ts)?;
        let close = required(raw.close, "close", ts)?;
        if high < low {
            return Err(BarError::InvertedRange {
                timestamp: ts,
                high,
                low,
            });
        }
        // Volume is informational only; a hole becomes zero.
        let volume = match raw.volume {
            Some(v) if v.is_finite() => v,
            _ => 0.0,
        };
        Ok(Bar {
            token: raw.token,
            symbol: raw.symbol,
            timestamp: ts,
            open,
            high,
            low,
            close,
            volume,
        })
    }
}
