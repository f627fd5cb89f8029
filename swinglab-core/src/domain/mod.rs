//! Domain types for swinglab

pub mod bar;
pub mod row;

pub use bar::{Bar, BarError, RawBar};
pub use row::{OutputRow, SCHEMA_VERSION, SENTINEL};
