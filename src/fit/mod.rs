//! Curve fitting orchestration.
//!
//! Responsibilities:
//!
//! - derive deterministic initial guesses from the data
//! - fit one observation set by Levenberg–Marquardt
//! - fit a batch of independent samples (parallel)

pub mod batch;
pub mod fitter;
pub mod guess;

pub use batch::*;
pub use fitter::*;
pub use guess::*;
