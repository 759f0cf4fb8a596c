//! Reporting utilities: residuals and formatted terminal output.

pub mod format;

pub use format::*;

use crate::domain::{CurveParams, Observation, ObservationResidual};
use crate::error::CurveError;
use crate::models::model::predict;

/// Compute fitted values and residuals (observed - fitted) for each observation.
pub fn compute_residuals(
    observations: &[Observation],
    params: &CurveParams,
) -> Result<Vec<ObservationResidual>, CurveError> {
    params.validate()?;
    let mut out = Vec::with_capacity(observations.len());
    for o in observations {
        let fitted = predict(o.concentration, params);
        if !fitted.is_finite() {
            return Err(CurveError::convergence(
                "non-finite model prediction during residual computation",
            ));
        }
        out.push(ObservationResidual {
            observation: *o,
            fitted,
            residual: o.response - fitted,
        });
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::observations_from;

    #[test]
    fn compute_residuals_basic() {
        let params = CurveParams {
            ic50: 1.0,
            slope: 1.0,
            top: 1.0,
            bottom: 0.0,
        };
        let obs = observations_from(&[1.0, 1.0], &[0.5, 0.6]);
        let residuals = compute_residuals(&obs, &params).unwrap();
        assert_eq!(residuals.len(), 2);
        assert!(residuals[0].residual.abs() < 1e-12);
        assert!((residuals[1].residual - 0.1).abs() < 1e-12);
    }
}
