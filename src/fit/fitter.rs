//! Four-parameter logistic fit for a single observation set.
//!
//! Given:
//! - concentrations `c_i > 0`
//! - observed responses `y_i`
//! - which asymptotes are held fixed, and the values they are held at
//!
//! we minimize `Σ (f(c_i) - y_i)²` over the free parameters with
//! Levenberg–Marquardt. `ic50` is optimized as `ln(ic50)`, so every iterate
//! is a valid (positive) IC50.

use nalgebra::{DMatrix, DVector};
use tracing::debug;

use crate::domain::{CurveParams, FitFlags, FitQuality, FitResult, Observation};
use crate::error::CurveError;
use crate::fit::guess::{distinct_concentrations, initial_guess};
use crate::math::{LeastSquaresProblem, LmSettings, LmSolution, levenberg_marquardt};
use crate::models::model::{partials, predict};

/// Optimizer settings for a fit.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FitOptions {
    pub max_iter: usize,
    pub sse_rel_tol: f64,
    pub step_tol: f64,
    pub grad_tol: f64,
}

impl Default for FitOptions {
    fn default() -> Self {
        let lm = LmSettings::default();
        Self {
            max_iter: lm.max_iter,
            sse_rel_tol: lm.sse_rel_tol,
            step_tol: lm.step_tol,
            grad_tol: lm.grad_tol,
        }
    }
}

impl FitOptions {
    fn lm_settings(&self) -> LmSettings {
        LmSettings {
            max_iter: self.max_iter,
            sse_rel_tol: self.sse_rel_tol,
            step_tol: self.step_tol,
            grad_tol: self.grad_tol,
            ..LmSettings::default()
        }
    }
}

/// Fit a logistic curve to `observations`.
///
/// `current` supplies the values for asymptotes that `flags` holds fixed;
/// its `ic50`/`slope` are ignored (they are always re-estimated from the
/// data-driven initial guess). The caller's slice is never reordered.
pub fn fit_curve(
    observations: &[Observation],
    flags: FitFlags,
    current: &CurveParams,
    opts: &FitOptions,
) -> Result<FitResult, CurveError> {
    let sorted = prepare_observations(observations)?;

    let n_free = flags.free_param_count();
    let n_distinct = distinct_concentrations(&sorted);
    if n_distinct < n_free {
        return Err(CurveError::invalid(format!(
            "{n_distinct} distinct concentration(s) cannot identify {n_free} free parameters"
        )));
    }
    // With both asymptotes free a flat response fits exactly at `top == bottom`,
    // leaving ic50 and slope undetermined.
    if !flags.fix_top && !flags.fix_bottom && sorted.iter().all(|o| o.response == sorted[0].response) {
        return Err(CurveError::invalid(format!(
            "all responses equal {}; ic50 and slope are not identified with free asymptotes",
            sorted[0].response
        )));
    }

    let layout = ParamLayout {
        fixed_top: flags.fix_top.then_some(current.top),
        fixed_bottom: flags.fix_bottom.then_some(current.bottom),
    };
    if layout.fixed_top.is_some_and(|v| !v.is_finite()) || layout.fixed_bottom.is_some_and(|v| !v.is_finite()) {
        return Err(CurveError::invalid("fixed asymptote values must be finite"));
    }

    let mut guess = initial_guess(&sorted);
    if let Some(top) = layout.fixed_top {
        guess.top = top;
    }
    if let Some(bottom) = layout.fixed_bottom {
        guess.bottom = bottom;
    }
    debug!(?guess, ?flags, n = sorted.len(), "initial guess");

    let objective = Objective::new(&sorted, layout);
    let solution = levenberg_marquardt(&objective, layout.pack(&guess), &opts.lm_settings())?;

    let params = checked_params(&layout, &solution)?;

    let n = sorted.len();
    let quality = FitQuality {
        sse: solution.sse,
        rmse: (solution.sse / n as f64).sqrt(),
        n,
        n_free,
        iterations: solution.iterations,
    };
    debug!(?params, sse = quality.sse, iterations = quality.iterations, "fit converged");

    Ok(FitResult {
        params,
        flags,
        quality,
    })
}

/// Map the optimizer's solution back to curve parameters, rejecting any
/// that are not finite (e.g. `ln(ic50)` past the `exp` range).
fn checked_params(layout: &ParamLayout, solution: &LmSolution) -> Result<CurveParams, CurveError> {
    let params = layout.unpack(&solution.params);
    if !params.is_finite() || params.ic50 <= 0.0 || !solution.sse.is_finite() {
        return Err(CurveError::convergence(format!(
            "optimizer returned non-finite parameters (ic50={}, slope={}, top={}, bottom={}, sse={})",
            params.ic50, params.slope, params.top, params.bottom, solution.sse
        )));
    }
    Ok(params)
}

/// Validate and sort a private copy of the observations.
fn prepare_observations(observations: &[Observation]) -> Result<Vec<Observation>, CurveError> {
    if observations.is_empty() {
        return Err(CurveError::invalid("no observations to fit"));
    }
    for (i, o) in observations.iter().enumerate() {
        if !(o.concentration.is_finite() && o.concentration > 0.0) {
            return Err(CurveError::invalid(format!(
                "observation {i}: concentration must be finite and > 0, got {}",
                o.concentration
            )));
        }
        if !o.response.is_finite() {
            return Err(CurveError::invalid(format!(
                "observation {i}: response must be finite, got {}",
                o.response
            )));
        }
    }

    let mut sorted = observations.to_vec();
    sorted.sort_by(|a, b| a.concentration.total_cmp(&b.concentration));
    Ok(sorted)
}

/// Mapping between `CurveParams` and the optimizer's free-parameter vector.
///
/// Vector order is `[ln(ic50), slope, top?, bottom?]`, where `top`/`bottom`
/// are present only when not fixed.
#[derive(Debug, Clone, Copy)]
struct ParamLayout {
    fixed_top: Option<f64>,
    fixed_bottom: Option<f64>,
}

impl ParamLayout {
    fn len(&self) -> usize {
        2 + usize::from(self.fixed_top.is_none()) + usize::from(self.fixed_bottom.is_none())
    }

    fn pack(&self, p: &CurveParams) -> DVector<f64> {
        let mut v = Vec::with_capacity(4);
        v.push(p.ic50.ln());
        v.push(p.slope);
        if self.fixed_top.is_none() {
            v.push(p.top);
        }
        if self.fixed_bottom.is_none() {
            v.push(p.bottom);
        }
        DVector::from_vec(v)
    }

    fn unpack(&self, v: &DVector<f64>) -> CurveParams {
        let mut idx = 2;
        let mut next = || {
            let x = v[idx];
            idx += 1;
            x
        };
        let top = match self.fixed_top {
            Some(t) => t,
            None => next(),
        };
        let bottom = match self.fixed_bottom {
            Some(b) => b,
            None => next(),
        };
        CurveParams {
            ic50: v[0].exp(),
            slope: v[1],
            top,
            bottom,
        }
    }
}

/// Residuals `f(c_i) - y_i` over the free parameters.
struct Objective {
    concentrations: Vec<f64>,
    log_c: Vec<f64>,
    y: Vec<f64>,
    layout: ParamLayout,
}

impl Objective {
    fn new(sorted: &[Observation], layout: ParamLayout) -> Self {
        Self {
            concentrations: sorted.iter().map(|o| o.concentration).collect(),
            log_c: sorted.iter().map(|o| o.concentration.ln()).collect(),
            y: sorted.iter().map(|o| o.response).collect(),
            layout,
        }
    }
}

impl LeastSquaresProblem for Objective {
    fn n_params(&self) -> usize {
        self.layout.len()
    }

    fn n_residuals(&self) -> usize {
        self.y.len()
    }

    fn residuals(&self, p: &DVector<f64>, out: &mut DVector<f64>) {
        let params = self.layout.unpack(p);
        for i in 0..self.y.len() {
            out[i] = predict(self.concentrations[i], &params) - self.y[i];
        }
    }

    fn jacobian(&self, p: &DVector<f64>, out: &mut DMatrix<f64>) {
        let params = self.layout.unpack(p);
        let log_ic50 = p[0];
        for i in 0..self.y.len() {
            let d = partials(self.log_c[i], log_ic50, params.slope, params.top, params.bottom);
            out[(i, 0)] = d[0];
            out[(i, 1)] = d[1];
            let mut col = 2;
            if self.layout.fixed_top.is_none() {
                out[(i, col)] = d[2];
                col += 1;
            }
            if self.layout.fixed_bottom.is_none() {
                out[(i, col)] = d[3];
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::sample::generate_sample;
    use crate::domain::observations_from;

    const CS: [f64; 9] = [0.001, 0.003, 0.01, 0.03, 0.1, 0.3, 1.0, 3.0, 10.0];

    fn synthetic(params: &CurveParams, cs: &[f64]) -> Vec<Observation> {
        cs.iter().map(|&c| Observation::new(c, predict(c, params))).collect()
    }

    fn rel_err(a: f64, b: f64) -> f64 {
        (a - b).abs() / b.abs()
    }

    #[test]
    fn recovers_steep_curve_with_all_parameters_free() {
        let truth = CurveParams {
            ic50: 0.03,
            slope: 5.0,
            top: 1.0,
            bottom: 0.0,
        };
        let obs = synthetic(&truth, &CS);
        let fit = fit_curve(&obs, FitFlags::free(), &CurveParams::default(), &FitOptions::default()).unwrap();
        assert!(rel_err(fit.params.ic50, 0.03) < 0.01, "ic50={}", fit.params.ic50);
        assert!(rel_err(fit.params.slope, 5.0) < 0.01, "slope={}", fit.params.slope);
        assert!((fit.params.top - 1.0).abs() < 0.01);
        assert!(fit.params.bottom.abs() < 0.01);
        assert!(fit.quality.sse < 1e-10);
        assert_eq!(fit.quality.n_free, 4);
    }

    #[test]
    fn recovers_partial_asymptotes() {
        let truth = CurveParams {
            ic50: 0.2,
            slope: 1.3,
            top: 0.92,
            bottom: 0.07,
        };
        let cs: Vec<f64> = (0..12).map(|i| 1e-3 * 3f64.powi(i)).collect();
        let obs = synthetic(&truth, &cs);
        let fit = fit_curve(&obs, FitFlags::free(), &CurveParams::default(), &FitOptions::default()).unwrap();
        assert!(rel_err(fit.params.ic50, truth.ic50) < 0.01);
        assert!(rel_err(fit.params.slope, truth.slope) < 0.01);
        assert!(rel_err(fit.params.top, truth.top) < 0.01);
        assert!(rel_err(fit.params.bottom, truth.bottom) < 0.01);
    }

    #[test]
    fn recovers_increasing_curve() {
        let truth = CurveParams {
            ic50: 0.5,
            slope: -1.5,
            top: 1.0,
            bottom: 0.0,
        };
        let cs: Vec<f64> = (0..10).map(|i| 0.01 * 2.5f64.powi(i)).collect();
        let obs = synthetic(&truth, &cs);
        let fit = fit_curve(&obs, FitFlags::fixed_asymptotes(), &CurveParams::default(), &FitOptions::default())
            .unwrap();
        assert!(rel_err(fit.params.ic50, 0.5) < 0.01, "ic50={}", fit.params.ic50);
        assert!(rel_err(fit.params.slope, -1.5) < 0.01, "slope={}", fit.params.slope);
    }

    #[test]
    fn fixed_asymptotes_are_not_re_estimated() {
        let truth = CurveParams {
            ic50: 0.03,
            slope: 2.0,
            top: 1.0,
            bottom: 0.0,
        };
        let obs = generate_sample(&truth, &CS, 3, 0.02, 7).unwrap();
        let current = CurveParams {
            top: 1.0,
            bottom: 0.0,
            ..CurveParams::default()
        };
        let fit = fit_curve(&obs, FitFlags::fixed_asymptotes(), &current, &FitOptions::default()).unwrap();
        assert_eq!(fit.params.top, 1.0);
        assert_eq!(fit.params.bottom, 0.0);
        assert_eq!(fit.quality.n_free, 2);
        assert!(rel_err(fit.params.ic50, 0.03) < 0.1);
    }

    #[test]
    fn noisy_replicates_fit_within_tolerance() {
        let truth = CurveParams {
            ic50: 0.1,
            slope: 1.5,
            top: 1.0,
            bottom: 0.0,
        };
        let cs: Vec<f64> = (0..10).map(|i| 1e-3 * 3f64.powi(i)).collect();
        let obs = generate_sample(&truth, &cs, 3, 1e-4, 11).unwrap();
        let fit = fit_curve(&obs, FitFlags::free(), &CurveParams::default(), &FitOptions::default()).unwrap();
        assert!(rel_err(fit.params.ic50, 0.1) < 0.01, "ic50={}", fit.params.ic50);
        assert!(rel_err(fit.params.slope, 1.5) < 0.01, "slope={}", fit.params.slope);
        assert_eq!(fit.quality.n, 30);
    }

    #[test]
    fn input_order_does_not_matter_and_is_not_mutated() {
        let truth = CurveParams {
            ic50: 0.03,
            slope: 5.0,
            top: 1.0,
            bottom: 0.0,
        };
        let mut obs = synthetic(&truth, &CS);
        obs.reverse();
        let snapshot = obs.clone();
        let fit = fit_curve(&obs, FitFlags::free(), &CurveParams::default(), &FitOptions::default()).unwrap();
        assert_eq!(obs, snapshot);
        assert!(rel_err(fit.params.ic50, 0.03) < 0.01);
    }

    #[test]
    fn two_concentrations_are_underdetermined() {
        let obs = observations_from(&[0.1, 0.1, 1.0, 1.0], &[0.9, 0.95, 0.1, 0.05]);
        let err = fit_curve(&obs, FitFlags::free(), &CurveParams::default(), &FitOptions::default()).unwrap_err();
        assert!(matches!(err, CurveError::InvalidParameter(_)), "{err}");

        // With both asymptotes fixed only two parameters remain.
        let fit = fit_curve(
            &obs,
            FitFlags::fixed_asymptotes(),
            &CurveParams::default(),
            &FitOptions::default(),
        );
        assert!(fit.is_ok());
    }

    #[test]
    fn rejects_non_positive_concentrations() {
        let obs = observations_from(&[0.0, 0.1, 1.0, 10.0], &[1.0, 0.9, 0.1, 0.0]);
        let err = fit_curve(&obs, FitFlags::free(), &CurveParams::default(), &FitOptions::default()).unwrap_err();
        assert!(matches!(err, CurveError::InvalidParameter(_)));

        let err = fit_curve(&[], FitFlags::free(), &CurveParams::default(), &FitOptions::default()).unwrap_err();
        assert!(matches!(err, CurveError::InvalidParameter(_)));
    }

    #[test]
    fn iteration_cap_surfaces_convergence_error() {
        let truth = CurveParams {
            ic50: 0.03,
            slope: 5.0,
            top: 1.0,
            bottom: 0.0,
        };
        let obs = synthetic(&truth, &CS);
        let opts = FitOptions {
            max_iter: 1,
            ..FitOptions::default()
        };
        let err = fit_curve(&obs, FitFlags::free(), &CurveParams::default(), &opts).unwrap_err();
        assert!(matches!(err, CurveError::Convergence(_)), "{err}");
    }

    #[test]
    fn noisy_replicates_of_steep_curve_converge_with_defaults() {
        let truth = CurveParams {
            ic50: 0.03,
            slope: 5.0,
            top: 1.0,
            bottom: 0.0,
        };
        // These seeds take 230-290 iterations with every parameter free.
        for seed in [6, 34, 123] {
            let obs = generate_sample(&truth, &CS, 3, 0.03, seed).unwrap();
            let fit = fit_curve(&obs, FitFlags::free(), &CurveParams::default(), &FitOptions::default())
                .unwrap_or_else(|e| panic!("seed {seed}: {e}"));
            assert!(rel_err(fit.params.ic50, 0.03) < 0.2, "seed {seed}: ic50={}", fit.params.ic50);
            assert!(fit.quality.iterations <= FitOptions::default().max_iter);
        }

        let obs = generate_sample(&truth, &CS, 3, 0.03, 34).unwrap();
        let fit = fit_curve(&obs, FitFlags::fixed_asymptotes(), &truth, &FitOptions::default()).unwrap();
        assert!(rel_err(fit.params.ic50, 0.03) < 0.2, "ic50={}", fit.params.ic50);
    }

    #[test]
    fn constant_responses_with_free_asymptotes_are_rejected() {
        let obs = observations_from(&[0.01, 0.1, 1.0, 10.0], &[0.5; 4]);
        let err = fit_curve(&obs, FitFlags::free(), &CurveParams::default(), &FitOptions::default()).unwrap_err();
        assert!(matches!(err, CurveError::InvalidParameter(_)), "{err}");
    }

    #[test]
    fn overflowing_residuals_are_a_convergence_failure() {
        let obs = observations_from(&[0.01, 0.1, 1.0, 10.0], &[1e200, -1e200, 1e200, -1e200]);
        let err = fit_curve(
            &obs,
            FitFlags::fixed_asymptotes(),
            &CurveParams::default(),
            &FitOptions::default(),
        )
        .unwrap_err();
        assert!(matches!(err, CurveError::Convergence(_)), "{err}");
    }

    #[test]
    fn ic50_beyond_exp_range_is_a_convergence_failure() {
        let layout = ParamLayout {
            fixed_top: Some(1.0),
            fixed_bottom: Some(0.0),
        };
        let solution = LmSolution {
            params: DVector::from_row_slice(&[800.0, 1.0]),
            sse: 0.1,
            iterations: 12,
        };
        assert!(layout.unpack(&solution.params).ic50.is_infinite());
        let err = checked_params(&layout, &solution).unwrap_err();
        assert!(matches!(err, CurveError::Convergence(_)), "{err}");

        let nan_sse = LmSolution {
            params: DVector::from_row_slice(&[0.0, 1.0]),
            sse: f64::NAN,
            iterations: 1,
        };
        assert!(checked_params(&layout, &nan_sse).is_err());
    }

    #[test]
    fn layout_round_trips_free_and_fixed_subsets() {
        let p = CurveParams {
            ic50: 0.4,
            slope: -2.0,
            top: 0.8,
            bottom: 0.1,
        };
        for &(ft, fb) in &[(false, false), (true, false), (false, true), (true, true)] {
            let layout = ParamLayout {
                fixed_top: ft.then_some(p.top),
                fixed_bottom: fb.then_some(p.bottom),
            };
            let v = layout.pack(&p);
            assert_eq!(v.len(), layout.len());
            let back = layout.unpack(&v);
            assert!(rel_err(back.ic50, p.ic50) < 1e-12);
            assert_eq!((back.slope, back.top, back.bottom), (p.slope, p.top, p.bottom));
        }
    }
}
