//! Four-parameter logistic model evaluation.
//!
//! The fitter relies on three primitive operations:
//! - evaluate `f(c)` for given parameters (residuals, plots, exports)
//! - the partial derivatives of `f` (analytic Jacobian for the optimizer)
//! - the inverse `c(f)` (IC50/IC90 reporting)
//!
//! Numerical notes:
//! - `(c/ic50)^slope` is formed as `exp(slope * (ln c - ln ic50))` so that
//!   concentrations spanning many decades never overflow an intermediate ratio.
//! - `1 / (1 + e^x)` is evaluated in the branch that keeps the exponent
//!   non-positive.

use crate::domain::{CurveParams, Ic50Bound};
use crate::error::CurveError;

/// Evaluate `f(c) = bottom + (top - bottom) / (1 + (c / ic50)^slope)`.
///
/// `c = 0` returns the analytic limit. Fails when `ic50 <= 0`, any parameter
/// is non-finite, or `c` is negative/NaN.
pub fn evaluate(c: f64, ic50: f64, slope: f64, top: f64, bottom: f64) -> Result<f64, CurveError> {
    let params = CurveParams {
        ic50,
        slope,
        top,
        bottom,
    };
    params.validate()?;
    if c.is_nan() || c < 0.0 {
        return Err(CurveError::invalid(format!("concentration must be >= 0, got {c}")));
    }
    Ok(predict(c, &params))
}

/// Evaluate the curve with parameters that are already known to be valid.
pub(crate) fn predict(c: f64, params: &CurveParams) -> f64 {
    let g = if c == 0.0 {
        if params.slope > 0.0 {
            1.0
        } else if params.slope < 0.0 {
            0.0
        } else {
            0.5
        }
    } else {
        logistic_weight(params.slope * (c.ln() - params.ic50.ln()))
    };
    params.bottom + (params.top - params.bottom) * g
}

/// `1 / (1 + e^x)` without overflow.
pub(crate) fn logistic_weight(x: f64) -> f64 {
    if x <= 0.0 {
        1.0 / (1.0 + x.exp())
    } else {
        let e = (-x).exp();
        e / (1.0 + e)
    }
}

/// Partial derivatives of `f` at `ln c`, in the optimizer's coordinates.
///
/// Returned order is `(d/d ln(ic50), d/d slope, d/d top, d/d bottom)`.
pub(crate) fn partials(log_c: f64, log_ic50: f64, slope: f64, top: f64, bottom: f64) -> [f64; 4] {
    let dl = log_c - log_ic50;
    let g = logistic_weight(slope * dl);
    let spread = top - bottom;
    let dg = g * (1.0 - g);
    [spread * slope * dg, -spread * dl * dg, g, 1.0 - g]
}

/// Concentration at which the curve has fallen a `fraction` of the way from
/// `top` to `bottom`. `fraction = 0.5` returns `ic50`.
pub fn inhibitory_concentration(params: &CurveParams, fraction: f64) -> Result<f64, CurveError> {
    params.validate()?;
    if !(fraction > 0.0 && fraction < 1.0) {
        return Err(CurveError::invalid(format!(
            "fraction must be in (0, 1), got {fraction}"
        )));
    }
    if params.slope == 0.0 {
        return Err(CurveError::invalid("a flat curve (slope = 0) has no inhibitory concentration"));
    }
    let odds = fraction / (1.0 - fraction);
    let c = (params.ic50.ln() + odds.ln() / params.slope).exp();
    if !(c.is_finite() && c > 0.0) {
        return Err(CurveError::invalid(format!(
            "inhibitory concentration at {fraction} is out of floating-point range"
        )));
    }
    Ok(c)
}

/// Classify a fitted IC50 against the measured concentration window.
pub fn ic50_bound(ic50: f64, c_min: f64, c_max: f64) -> Ic50Bound {
    if ic50 > c_max {
        Ic50Bound::Lower
    } else if ic50 < c_min {
        Ic50Bound::Upper
    } else {
        Ic50Bound::Interpolated
    }
}
