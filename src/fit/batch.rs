//! Fit many samples at once.
//!
//! Samples are independent, so each one is fit on its own rayon task with
//! its own copy of the observations. A failure is recorded for that sample
//! and never aborts the rest of the batch.

use rayon::prelude::*;
use tracing::{info, warn};

use crate::domain::{CurveParams, FitFlags, FitResult, Ic50Bound, Sample};
use crate::error::CurveError;
use crate::fit::fitter::{FitOptions, fit_curve};
use crate::models::ic50_bound;

/// Outcome of fitting one named sample.
#[derive(Debug, Clone)]
pub struct SampleFit {
    pub name: String,
    /// Measured concentration window, if the sample had any observations.
    pub concentration_range: Option<(f64, f64)>,
    pub outcome: Result<FitResult, CurveError>,
}

impl SampleFit {
    /// Where the fitted IC50 sits relative to the measured window.
    pub fn ic50_bound(&self) -> Option<Ic50Bound> {
        let fit = self.outcome.as_ref().ok()?;
        let (lo, hi) = self.concentration_range?;
        Some(ic50_bound(fit.params.ic50, lo, hi))
    }
}

/// Fit every sample; results are returned in input order.
///
/// `anchor` supplies the values fixed asymptotes are held at.
pub fn fit_samples(samples: &[Sample], flags: FitFlags, anchor: &CurveParams, opts: &FitOptions) -> Vec<SampleFit> {
    let fits: Vec<SampleFit> = samples
        .par_iter()
        .map(|sample| {
            let outcome = fit_curve(&sample.observations, flags, anchor, opts);
            if let Err(err) = &outcome {
                warn!(sample = %sample.name, %err, "fit failed");
            }
            SampleFit {
                name: sample.name.clone(),
                concentration_range: sample.concentration_range(),
                outcome,
            }
        })
        .collect();

    let ok = fits.iter().filter(|f| f.outcome.is_ok()).count();
    info!(samples = fits.len(), ok, failed = fits.len() - ok, "batch fit finished");
    fits
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::sample::{dilution_series, generate_sample};
    use crate::domain::observations_from;

    #[test]
    fn batch_preserves_order_and_isolates_failures() {
        let cs = dilution_series(10.0, 3.0, 10).unwrap();
        let mk = |name: &str, ic50: f64| Sample {
            name: name.to_string(),
            observations: generate_sample(
                &CurveParams {
                    ic50,
                    slope: 1.2,
                    top: 1.0,
                    bottom: 0.0,
                },
                &cs,
                2,
                0.0,
                1,
            )
            .unwrap(),
        };

        let samples = vec![
            mk("A-1", 0.05),
            Sample {
                name: "broken".to_string(),
                observations: observations_from(&[1.0, 2.0], &[0.5, 0.4]),
            },
            mk("B-1", 0.5),
        ];

        let fits = fit_samples(&samples, FitFlags::free(), &CurveParams::default(), &FitOptions::default());
        let names: Vec<&str> = fits.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, ["A-1", "broken", "B-1"]);

        let a = fits[0].outcome.as_ref().unwrap();
        assert!((a.params.ic50 - 0.05).abs() / 0.05 < 0.01);
        assert!(matches!(fits[1].outcome, Err(CurveError::InvalidParameter(_))));
        let b = fits[2].outcome.as_ref().unwrap();
        assert!((b.params.ic50 - 0.5).abs() / 0.5 < 0.01);
        assert_eq!(fits[2].ic50_bound(), Some(Ic50Bound::Interpolated));
        assert_eq!(fits[1].ic50_bound(), None);
    }
}
