//! Indicators computed alongside the detectors.
//!
//! ATR and length-mode Donchian run as a batch pass over each appended
//! chunk; the trailing stop and the pivots fold bar by bar because they
//! carry their own recurrence state in `TokenState`.

pub mod atr;
pub mod donchian;
pub mod pivot;
pub mod trailing_stop;

pub use atr::Atr;
pub use donchian::{Donchian, DonchianBands};
pub use pivot::{PivotLevels, PivotPeriod, PivotSnapshot, PivotState};
pub use trailing_stop::trailing_stop;
