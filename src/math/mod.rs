//! Mathematical utilities: Levenberg–Marquardt, linear least squares, grids.

pub mod grid;
pub mod lm;
pub mod ols;

pub use grid::*;
pub use lm::*;
pub use ols::*;
