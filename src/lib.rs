//! `neutcurve` library crate.
//!
//! Fits four-parameter logistic neutralization curves to dilution-series
//! data. The binary (`neutcurve`) is a thin wrapper around this library so that:
//!
//! - core logic is testable without spawning processes
//! - the curve model and fitter can be used directly from other Rust code

pub mod app;
pub mod cli;
pub mod data;
pub mod domain;
pub mod error;
pub mod fit;
pub mod io;
pub mod math;
pub mod models;
pub mod plot;
pub mod report;
