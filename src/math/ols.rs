//! Linear least squares solver.
//!
//! Each Levenberg–Marquardt iteration solves a small damped normal system
//!
//! ```text
//! (JᵀJ + λ D) δ = -Jᵀ r
//! ```
//!
//! with at most four unknowns. We solve it with SVD so that a nearly
//! rank-deficient system (e.g. a flat response where slope and IC50 are not
//! identified) still yields a bounded minimum-norm step instead of a panic.

use nalgebra::{DMatrix, DVector};

/// Solve a least squares problem using SVD.
///
/// Returns `None` if the system is too ill-conditioned to solve robustly.
pub fn solve_least_squares(x: &DMatrix<f64>, y: &DVector<f64>) -> Option<DVector<f64>> {
    let svd = x.clone().svd(true, true);

    // Try progressively looser tolerances if strict solve fails.
    for &tol in &[1e-14, 1e-10, 1e-6] {
        if let Ok(beta) = svd.solve(y, tol) {
            if beta.iter().all(|v| v.is_finite()) {
                return Some(beta);
            }
        }
    }

    None
}
