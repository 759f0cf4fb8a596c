//! Deterministic initial guesses for the logistic fit.
//!
//! All heuristics assume observations sorted by ascending concentration.
//! Replicates at the same concentration are collapsed to their mean before
//! looking at curve direction or interpolating the midpoint.

use crate::domain::{CurveParams, Observation};

/// Initial `(ic50, slope, top, bottom)` for a sorted observation set.
///
/// - `slope`: `1.0` when response falls with concentration, else `-1.0`
/// - `top` / `bottom`: max / min observed response
/// - `ic50`: where the mean profile crosses `(top + bottom) / 2`
pub fn initial_guess(sorted: &[Observation]) -> CurveParams {
    let profile = mean_profile(sorted);

    let mut top = f64::NEG_INFINITY;
    let mut bottom = f64::INFINITY;
    for o in sorted {
        top = top.max(o.response);
        bottom = bottom.min(o.response);
    }

    let slope = match (profile.first(), profile.last()) {
        (Some(first), Some(last)) if first.1 > last.1 => 1.0,
        _ => -1.0,
    };

    let ic50 = midpoint_concentration(&profile, (top + bottom) / 2.0);

    CurveParams {
        ic50,
        slope,
        top,
        bottom,
    }
}

/// Number of distinct concentrations in a sorted observation set.
pub fn distinct_concentrations(sorted: &[Observation]) -> usize {
    let mut count = 0usize;
    let mut prev = None;
    for o in sorted {
        if prev != Some(o.concentration) {
            count += 1;
            prev = Some(o.concentration);
        }
    }
    count
}

/// `(concentration, mean response)` for each distinct concentration.
fn mean_profile(sorted: &[Observation]) -> Vec<(f64, f64)> {
    let mut out: Vec<(f64, f64)> = Vec::new();
    let mut sum = 0.0;
    let mut count = 0usize;
    for (i, o) in sorted.iter().enumerate() {
        sum += o.response;
        count += 1;
        let last_of_group = sorted
            .get(i + 1)
            .map(|next| next.concentration != o.concentration)
            .unwrap_or(true);
        if last_of_group {
            out.push((o.concentration, sum / count as f64));
            sum = 0.0;
            count = 0;
        }
    }
    out
}

/// Concentration at which the profile crosses `mid`.
///
/// Uses the first pair of neighbors bracketing `mid`, interpolated linearly
/// in `ln(concentration)`. Without a bracketing pair, falls back to the
/// sample with response nearest `mid`.
fn midpoint_concentration(profile: &[(f64, f64)], mid: f64) -> f64 {
    for w in profile.windows(2) {
        let (c0, y0) = w[0];
        let (c1, y1) = w[1];
        if y0 == mid {
            return c0;
        }
        if (y0 - mid) * (y1 - mid) < 0.0 {
            let u = (mid - y0) / (y1 - y0);
            let (l0, l1) = (c0.ln(), c1.ln());
            return (l0 + u * (l1 - l0)).exp();
        }
    }

    let mut best = None::<(f64, f64)>;
    for &(c, y) in profile {
        let d = (y - mid).abs();
        if best.map(|(_, bd)| d < bd).unwrap_or(true) {
            best = Some((c, d));
        }
    }
    best.map(|(c, _)| c).unwrap_or(1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::observations_from;

    #[test]
    fn decreasing_curve_gets_positive_slope() {
        let obs = observations_from(&[0.01, 0.1, 1.0, 10.0], &[1.0, 0.8, 0.3, 0.0]);
        let g = initial_guess(&obs);
        assert_eq!(g.slope, 1.0);
        assert_eq!(g.top, 1.0);
        assert_eq!(g.bottom, 0.0);
    }

    #[test]
    fn increasing_curve_gets_negative_slope() {
        let obs = observations_from(&[0.01, 0.1, 1.0, 10.0], &[0.0, 0.2, 0.7, 1.0]);
        assert_eq!(initial_guess(&obs).slope, -1.0);
    }

    #[test]
    fn ic50_is_interpolated_between_bracketing_points() {
        // Midpoint 0.5 lies halfway (in response) between c=0.1 and c=1.0,
        // so the log-interpolated guess is their geometric mean.
        let obs = observations_from(&[0.01, 0.1, 1.0, 10.0], &[1.0, 0.75, 0.25, 0.0]);
        let g = initial_guess(&obs);
        let expected = (0.1_f64 * 1.0).sqrt();
        assert!((g.ic50 - expected).abs() < 1e-12, "ic50 guess {}", g.ic50);
    }

    #[test]
    fn exact_midpoint_sample_is_used_directly() {
        let obs = observations_from(&[0.01, 0.1, 1.0], &[1.0, 0.5, 0.0]);
        assert_eq!(initial_guess(&obs).ic50, 0.1);
    }

    #[test]
    fn replicates_are_averaged() {
        let obs = observations_from(
            &[0.01, 0.01, 1.0, 1.0, 100.0, 100.0],
            &[1.0, 0.9, 0.6, 0.4, 0.0, 0.1],
        );
        assert_eq!(distinct_concentrations(&obs), 3);
        let g = initial_guess(&obs);
        assert_eq!(g.ic50, 1.0);
        assert_eq!(g.slope, 1.0);
    }

    #[test]
    fn non_bracketing_profile_falls_back_to_nearest() {
        // Only one sample: no pair to interpolate between.
        let obs = observations_from(&[0.3], &[0.4]);
        assert_eq!(initial_guess(&obs).ic50, 0.3);
    }
}
