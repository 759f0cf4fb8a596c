//! Domain types used throughout the pipeline.
//!
//! This module defines:
//!
//! - observations and named samples (`Observation`, `Sample`)
//! - curve parameters and fit flags (`CurveParams`, `FitFlags`)
//! - fit outputs (`FitResult`, `FitQuality`, `CurveFile`, etc.)

pub mod types;

pub use types::*;
