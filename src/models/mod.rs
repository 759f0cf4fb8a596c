//! Four-parameter logistic neutralization curve.
//!
//! The model itself is a small set of pure functions (`model`) so that the
//! fitting code can stay generic; `curve` wraps them in a stateful object.

pub mod curve;
pub mod model;

pub use curve::*;
pub use model::{evaluate, ic50_bound, inhibitory_concentration};
