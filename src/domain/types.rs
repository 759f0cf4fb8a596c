//! Shared domain types.
//!
//! These types are intentionally kept lightweight and serializable so they can be:
//!
//! - used in-memory during fitting
//! - exported to JSON/CSV
//! - reloaded later for plotting or comparisons

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::CurveError;

/// One `(concentration, response)` measurement.
///
/// `response` is the fraction surviving (or fraction infectivity) at the
/// given antibody concentration.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    pub concentration: f64,
    pub response: f64,
}

impl Observation {
    pub fn new(concentration: f64, response: f64) -> Self {
        Self {
            concentration,
            response,
        }
    }
}

/// Build an observation set from parallel slices.
///
/// Extra trailing values on the longer slice are ignored.
pub fn observations_from(concentrations: &[f64], responses: &[f64]) -> Vec<Observation> {
    concentrations
        .iter()
        .zip(responses.iter())
        .map(|(&c, &y)| Observation::new(c, y))
        .collect()
}

/// The four parameters of the logistic curve
/// `f(c) = bottom + (top - bottom) / (1 + (c / ic50)^slope)`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CurveParams {
    pub ic50: f64,
    pub slope: f64,
    pub top: f64,
    pub bottom: f64,
}

impl CurveParams {
    pub fn is_finite(&self) -> bool {
        self.ic50.is_finite() && self.slope.is_finite() && self.top.is_finite() && self.bottom.is_finite()
    }

    /// Check the invariants every evaluable curve must satisfy.
    pub fn validate(&self) -> Result<(), CurveError> {
        if !self.is_finite() {
            return Err(CurveError::invalid(format!(
                "curve parameters must be finite (ic50={}, slope={}, top={}, bottom={})",
                self.ic50, self.slope, self.top, self.bottom
            )));
        }
        if self.ic50 <= 0.0 {
            return Err(CurveError::invalid(format!("ic50 must be > 0, got {}", self.ic50)));
        }
        Ok(())
    }
}

impl Default for CurveParams {
    /// A unit curve: fraction surviving falls from 1 to 0 around `c = 1`.
    fn default() -> Self {
        Self {
            ic50: 1.0,
            slope: 1.0,
            top: 1.0,
            bottom: 0.0,
        }
    }
}

/// Which asymptotes are held at their current values during a fit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct FitFlags {
    pub fix_top: bool,
    pub fix_bottom: bool,
}

impl FitFlags {
    pub fn free() -> Self {
        Self::default()
    }

    pub fn fixed_asymptotes() -> Self {
        Self {
            fix_top: true,
            fix_bottom: true,
        }
    }

    /// Number of parameters the optimizer estimates.
    pub fn free_param_count(self) -> usize {
        2 + usize::from(!self.fix_top) + usize::from(!self.fix_bottom)
    }
}

/// Fit quality diagnostics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FitQuality {
    /// Sum of squared residuals at the minimum.
    pub sse: f64,
    pub rmse: f64,
    pub n: usize,
    pub n_free: usize,
    pub iterations: usize,
}

/// Output of a single successful fit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FitResult {
    pub params: CurveParams,
    pub flags: FitFlags,
    pub quality: FitQuality,
}

/// Where a fitted IC50 lies relative to the measured concentration window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Ic50Bound {
    /// Inside `[c_min, c_max]`.
    Interpolated,
    /// Above `c_max`; the reported value is only a lower bound.
    Lower,
    /// Below `c_min`; the reported value is only an upper bound.
    Upper,
}

impl Ic50Bound {
    /// Prefix used when printing an IC50 (`>`, `<`, or nothing).
    pub fn prefix(self) -> &'static str {
        match self {
            Ic50Bound::Interpolated => "",
            Ic50Bound::Lower => ">",
            Ic50Bound::Upper => "<",
        }
    }
}

/// A named observation set (one column of a plate-reader table).
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    pub name: String,
    pub observations: Vec<Observation>,
}

impl Sample {
    /// Smallest and largest concentration, if any.
    pub fn concentration_range(&self) -> Option<(f64, f64)> {
        let mut lo = f64::INFINITY;
        let mut hi = f64::NEG_INFINITY;
        for o in &self.observations {
            lo = lo.min(o.concentration);
            hi = hi.max(o.concentration);
        }
        (lo.is_finite() && hi.is_finite()).then_some((lo, hi))
    }
}

/// Per-observation fitted value and residual (observed - fitted).
#[derive(Debug, Clone, PartialEq)]
pub struct ObservationResidual {
    pub observation: Observation,
    pub fitted: f64,
    pub residual: f64,
}

/// A full run’s configuration as understood by the pipeline.
///
/// This is derived from CLI flags (plus defaults).
#[derive(Debug, Clone, Serialize)]
pub struct FitConfig {
    pub csv_path: PathBuf,
    pub flags: FitFlags,
    /// Value `top` is held at when `flags.fix_top` is set.
    pub top: f64,
    /// Value `bottom` is held at when `flags.fix_bottom` is set.
    pub bottom: f64,

    pub max_iter: usize,

    pub plot: bool,
    pub plot_width: usize,
    pub plot_height: usize,

    pub export_results: Option<PathBuf>,
    pub export_curve: Option<PathBuf>,
}

/// A saved curve file (JSON).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CurveFile {
    pub tool: String,
    pub created: DateTime<Utc>,
    pub sample: Option<String>,
    pub params: CurveParams,
    pub flags: FitFlags,
    pub fit_quality: FitQuality,
    pub grid: CurveGrid,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CurveGrid {
    pub concentration: Vec<f64>,
    pub response: Vec<f64>,
}
