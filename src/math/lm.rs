//! Levenberg–Marquardt nonlinear least squares.
//!
//! Minimizes `Σ r_i(p)²` for a problem that can report its residual vector
//! and Jacobian. Each iteration solves the Marquardt-scaled system
//!
//! ```text
//! (JᵀJ + λ diag(JᵀJ)) δ = -Jᵀ r
//! ```
//!
//! and accepts the step only when it lowers the SSE; otherwise `λ` grows and
//! the step is retried. The loop is deterministic (no RNG, fixed λ schedule).
//!
//! Stopping rules, checked in this order each iteration:
//! - SSE at the floating-point floor
//! - scaled gradient: `max_j |J_jᵀ r| / (‖J_j‖ ‖r‖) <= grad_tol` (MINPACK's `gtol`)
//! - accepted step improves SSE by less than `sse_rel_tol`, or is tiny

use nalgebra::{DMatrix, DVector};
use tracing::trace;

use crate::error::CurveError;
use crate::math::ols::solve_least_squares;

/// A residual-producing model with an analytic Jacobian.
pub trait LeastSquaresProblem {
    fn n_params(&self) -> usize;

    fn n_residuals(&self) -> usize;

    /// Write `r(p)` into `out` (length `n_residuals`).
    fn residuals(&self, p: &DVector<f64>, out: &mut DVector<f64>);

    /// Write `∂r/∂p` into `out` (`n_residuals × n_params`).
    fn jacobian(&self, p: &DVector<f64>, out: &mut DMatrix<f64>);
}

/// Stopping rules for [`levenberg_marquardt`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LmSettings {
    /// Maximum number of accepted-or-rejected outer iterations.
    pub max_iter: usize,
    /// Stop when an accepted step improves SSE by less than this fraction.
    pub sse_rel_tol: f64,
    /// Stop when `|δ| <= step_tol * (|p| + step_tol)`.
    pub step_tol: f64,
    /// Stop when every Jacobian column is this close to orthogonal to `r`.
    pub grad_tol: f64,
    pub lambda_init: f64,
}

impl Default for LmSettings {
    fn default() -> Self {
        Self {
            // Steep, noisy curves creep along a narrow valley for a few hundred steps.
            max_iter: 1000,
            sse_rel_tol: 1e-12,
            step_tol: 1e-10,
            grad_tol: 1e-10,
            lambda_init: 1e-3,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LmSolution {
    pub params: DVector<f64>,
    pub sse: f64,
    pub iterations: usize,
}

const LAMBDA_MIN: f64 = 1e-15;
const LAMBDA_MAX: f64 = 1e16;
const LAMBDA_UP: f64 = 10.0;
const LAMBDA_DOWN: f64 = 10.0;

/// Minimize the problem starting from `init`.
///
/// Returns `CurveError::Convergence` when the iteration cap is reached, or
/// when the residuals are non-finite at the starting point.
pub fn levenberg_marquardt<P: LeastSquaresProblem>(
    problem: &P,
    init: DVector<f64>,
    settings: &LmSettings,
) -> Result<LmSolution, CurveError> {
    let n = problem.n_residuals();
    let k = problem.n_params();
    if init.len() != k {
        return Err(CurveError::invalid(format!(
            "initial parameter vector has length {}, expected {k}",
            init.len()
        )));
    }

    let mut p = init;
    let mut r = DVector::<f64>::zeros(n);
    let mut r_trial = DVector::<f64>::zeros(n);
    let mut jac = DMatrix::<f64>::zeros(n, k);

    problem.residuals(&p, &mut r);
    let mut sse = r.norm_squared();
    if !sse.is_finite() {
        return Err(CurveError::convergence("residuals are not finite at the initial guess"));
    }

    // Below this SSE the fit is exact to floating-point precision.
    let sse_floor = (n as f64) * f64::EPSILON * f64::EPSILON;
    let mut lambda = settings.lambda_init;

    for iter in 1..=settings.max_iter {
        if sse <= sse_floor {
            return Ok(LmSolution {
                params: p,
                sse,
                iterations: iter - 1,
            });
        }

        problem.jacobian(&p, &mut jac);
        let jtj = jac.transpose() * &jac;
        let rhs = -(jac.transpose() * &r);
        if jtj.iter().any(|v| !v.is_finite()) || rhs.iter().any(|v| !v.is_finite()) {
            return Err(CurveError::convergence(format!(
                "non-finite Jacobian at iteration {iter}"
            )));
        }

        let gradient_cosine = scaled_gradient(&jac, &rhs, sse.sqrt());
        if gradient_cosine <= settings.grad_tol {
            trace!(iter, sse, gradient_cosine, "gradient below tolerance");
            return Ok(LmSolution {
                params: p,
                sse,
                iterations: iter - 1,
            });
        }

        let diag_max = (0..k).map(|i| jtj[(i, i)]).fold(0.0_f64, f64::max);
        let diag_floor = (diag_max * 1e-12).max(f64::MIN_POSITIVE);

        // Inner loop: raise λ until a step lowers the SSE.
        let mut accepted = None;
        while lambda <= LAMBDA_MAX {
            let mut a = jtj.clone();
            for i in 0..k {
                a[(i, i)] += lambda * jtj[(i, i)].max(diag_floor);
            }

            if let Some(delta) = solve_least_squares(&a, &rhs) {
                let p_trial = &p + &delta;
                problem.residuals(&p_trial, &mut r_trial);
                let sse_trial = r_trial.norm_squared();
                if sse_trial.is_finite() && sse_trial < sse {
                    accepted = Some((p_trial, delta, sse_trial));
                    break;
                }
            }
            lambda *= LAMBDA_UP;
        }

        let Some((p_new, delta, sse_new)) = accepted else {
            // No descent direction at any damping: we are at a stationary point.
            trace!(iter, sse, "no improving step; stopping at stationary point");
            return Ok(LmSolution {
                params: p,
                sse,
                iterations: iter,
            });
        };

        let improvement = sse - sse_new;
        let step_small = delta.norm() <= settings.step_tol * (p.norm() + settings.step_tol);
        trace!(iter, sse = sse_new, lambda, "accepted step");

        p = p_new;
        std::mem::swap(&mut r, &mut r_trial);
        sse = sse_new;
        lambda = (lambda / LAMBDA_DOWN).max(LAMBDA_MIN);

        if improvement <= settings.sse_rel_tol * sse || step_small {
            return Ok(LmSolution {
                params: p,
                sse,
                iterations: iter,
            });
        }
    }

    Err(CurveError::convergence(format!(
        "no convergence after {} iterations (sse={sse:.3e})",
        settings.max_iter
    )))
}

/// Largest cosine between a Jacobian column and the residual vector.
///
/// `jtr` is `-Jᵀr`; only magnitudes matter. Zero columns are skipped.
fn scaled_gradient(jac: &DMatrix<f64>, jtr: &DVector<f64>, r_norm: f64) -> f64 {
    if r_norm == 0.0 {
        return 0.0;
    }
    jac.column_iter()
        .zip(jtr.iter())
        .filter_map(|(col, g)| {
            let norm = col.norm();
            (norm > 0.0).then(|| g.abs() / (norm * r_norm))
        })
        .fold(0.0, f64::max)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// `y = a * exp(b * x)`.
    struct ExpDecay {
        x: Vec<f64>,
        y: Vec<f64>,
    }

    impl LeastSquaresProblem for ExpDecay {
        fn n_params(&self) -> usize {
            2
        }

        fn n_residuals(&self) -> usize {
            self.x.len()
        }

        fn residuals(&self, p: &DVector<f64>, out: &mut DVector<f64>) {
            for i in 0..self.x.len() {
                out[i] = p[0] * (p[1] * self.x[i]).exp() - self.y[i];
            }
        }

        fn jacobian(&self, p: &DVector<f64>, out: &mut DMatrix<f64>) {
            for i in 0..self.x.len() {
                let e = (p[1] * self.x[i]).exp();
                out[(i, 0)] = e;
                out[(i, 1)] = p[0] * self.x[i] * e;
            }
        }
    }

    fn exp_problem() -> ExpDecay {
        let x: Vec<f64> = (0..10).map(|i| i as f64 * 0.5).collect();
        let y = x.iter().map(|&xi| 3.0 * (-0.7 * xi).exp()).collect();
        ExpDecay { x, y }
    }

    #[test]
    fn recovers_exponential_parameters() {
        let problem = exp_problem();
        let sol = levenberg_marquardt(
            &problem,
            DVector::from_row_slice(&[1.0, -0.1]),
            &LmSettings::default(),
        )
        .unwrap();
        assert!((sol.params[0] - 3.0).abs() < 1e-6, "a={}", sol.params[0]);
        assert!((sol.params[1] + 0.7).abs() < 1e-6, "b={}", sol.params[1]);
        assert!(sol.sse < 1e-12);
    }

    #[test]
    fn iteration_cap_reports_convergence_error() {
        let problem = exp_problem();
        let settings = LmSettings {
            max_iter: 1,
            ..LmSettings::default()
        };
        let err = levenberg_marquardt(&problem, DVector::from_row_slice(&[1.0, -0.1]), &settings).unwrap_err();
        assert!(matches!(err, CurveError::Convergence(_)));
    }

    /// Residuals of `p[0] - 1`, with a Jacobian that may be poisoned.
    struct Shift {
        residual_nan: bool,
        jacobian_nan: bool,
    }

    impl LeastSquaresProblem for Shift {
        fn n_params(&self) -> usize {
            1
        }

        fn n_residuals(&self) -> usize {
            3
        }

        fn residuals(&self, p: &DVector<f64>, out: &mut DVector<f64>) {
            for i in 0..3 {
                out[i] = if self.residual_nan { f64::NAN } else { p[0] - 1.0 };
            }
        }

        fn jacobian(&self, _p: &DVector<f64>, out: &mut DMatrix<f64>) {
            for i in 0..3 {
                out[(i, 0)] = if self.jacobian_nan { f64::NAN } else { 1.0 };
            }
        }
    }

    #[test]
    fn nan_jacobian_is_a_convergence_failure() {
        let problem = Shift {
            residual_nan: false,
            jacobian_nan: true,
        };
        let err = levenberg_marquardt(&problem, DVector::from_row_slice(&[5.0]), &LmSettings::default())
            .unwrap_err();
        assert!(matches!(err, CurveError::Convergence(ref m) if m.contains("Jacobian")), "{err}");
    }

    #[test]
    fn nan_residuals_at_start_are_a_convergence_failure() {
        let problem = Shift {
            residual_nan: true,
            jacobian_nan: false,
        };
        let err = levenberg_marquardt(&problem, DVector::from_row_slice(&[5.0]), &LmSettings::default())
            .unwrap_err();
        assert!(matches!(err, CurveError::Convergence(_)), "{err}");
    }

    #[test]
    fn scaled_gradient_is_cosine_of_column_and_residual() {
        let jac = DMatrix::from_row_slice(3, 2, &[1.0, 0.0, 0.0, 2.0, 0.0, 0.0]);
        let r = DVector::from_row_slice(&[3.0, 0.0, 4.0]);
        let g = -(jac.transpose() * &r);
        // Column 0 is (1, 0, 0): cos = 3 / 5. Column 1 is orthogonal to r.
        assert!((scaled_gradient(&jac, &g, r.norm()) - 0.6).abs() < 1e-12);
        assert_eq!(scaled_gradient(&jac, &g, 0.0), 0.0);
    }

    #[test]
    fn wrong_initial_length_is_invalid() {
        let problem = exp_problem();
        let err = levenberg_marquardt(&problem, DVector::from_row_slice(&[1.0]), &LmSettings::default())
            .unwrap_err();
        assert!(matches!(err, CurveError::InvalidParameter(_)));
    }
}
