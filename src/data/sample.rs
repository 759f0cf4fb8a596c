//! Synthetic dilution-series data.
//!
//! Used by `neutcurve simulate` and by tests that need observations with a
//! known underlying curve. Generation is fully determined by the seed.

use rand::prelude::*;
use rand::rngs::StdRng;
use rand_distr::Normal;

use crate::domain::{CurveParams, Observation};
use crate::error::CurveError;
use crate::models::model::predict;

/// Serial dilution: `start, start/factor, start/factor², ...` (`n` values).
pub fn dilution_series(start: f64, factor: f64, n: usize) -> Result<Vec<f64>, CurveError> {
    if !(start.is_finite() && start > 0.0) {
        return Err(CurveError::invalid(format!("starting concentration must be > 0, got {start}")));
    }
    if !(factor.is_finite() && factor > 1.0) {
        return Err(CurveError::invalid(format!("dilution factor must be > 1, got {factor}")));
    }
    if n == 0 {
        return Err(CurveError::invalid("dilution series needs at least one step"));
    }
    Ok((0..n).map(|i| start / factor.powi(i as i32)).collect())
}

/// Noisy observations of `params` at each concentration.
///
/// Each concentration gets `replicates` observations with additive Gaussian
/// noise of standard deviation `noise_sd`. Output is grouped by
/// concentration in the order given.
pub fn generate_sample(
    params: &CurveParams,
    concentrations: &[f64],
    replicates: usize,
    noise_sd: f64,
    seed: u64,
) -> Result<Vec<Observation>, CurveError> {
    params.validate()?;
    if replicates == 0 {
        return Err(CurveError::invalid("replicates must be > 0"));
    }
    if !(noise_sd.is_finite() && noise_sd >= 0.0) {
        return Err(CurveError::invalid(format!("noise sd must be >= 0, got {noise_sd}")));
    }
    if let Some(&c) = concentrations.iter().find(|c| !(c.is_finite() && **c > 0.0)) {
        return Err(CurveError::invalid(format!("concentration must be > 0, got {c}")));
    }

    let mut rng = StdRng::seed_from_u64(seed);
    let normal = Normal::new(0.0, noise_sd)
        .map_err(|e| CurveError::invalid(format!("noise distribution error: {e}")))?;

    let mut out = Vec::with_capacity(concentrations.len() * replicates);
    for &c in concentrations {
        let y = predict(c, params);
        for _ in 0..replicates {
            out.push(Observation::new(c, y + normal.sample(&mut rng)));
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dilution_series_divides_by_factor() {
        let cs = dilution_series(10.0, 3.0, 4).unwrap();
        assert_eq!(cs.len(), 4);
        assert_eq!(cs[0], 10.0);
        assert!((cs[3] - 10.0 / 27.0).abs() < 1e-12);
        assert!(dilution_series(10.0, 1.0, 4).is_err());
        assert!(dilution_series(-1.0, 3.0, 4).is_err());
    }

    #[test]
    fn same_seed_same_sample() {
        let p = CurveParams::default();
        let cs = [0.1, 1.0, 10.0];
        let a = generate_sample(&p, &cs, 3, 0.05, 42).unwrap();
        let b = generate_sample(&p, &cs, 3, 0.05, 42).unwrap();
        let c = generate_sample(&p, &cs, 3, 0.05, 43).unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.len(), 9);
    }

    #[test]
    fn zero_noise_matches_model() {
        let p = CurveParams {
            ic50: 0.2,
            slope: 2.0,
            top: 1.0,
            bottom: 0.0,
        };
        let obs = generate_sample(&p, &[0.2], 2, 0.0, 1).unwrap();
        for o in obs {
            assert!((o.response - 0.5).abs() < 1e-12);
        }
    }
}
