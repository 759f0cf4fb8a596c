//! Data sources: synthetic dilution series.

pub mod sample;

pub use sample::*;
