//! `NeutralizationCurve`: a fitted (or hand-specified) logistic curve.
//!
//! The curve owns its four parameters. The only way to change them after
//! construction is [`NeutralizationCurve::fit`], which replaces all four at
//! once and only when the fit succeeds.

use serde::{Deserialize, Serialize};

use crate::domain::{CurveParams, FitFlags, FitResult, Ic50Bound, Observation};
use crate::error::CurveError;
use crate::fit::{FitOptions, fit_curve};
use crate::models::model::{ic50_bound, inhibitory_concentration, predict};

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(try_from = "CurveParams", into = "CurveParams")]
pub struct NeutralizationCurve {
    params: CurveParams,
}

impl NeutralizationCurve {
    pub fn new(ic50: f64, slope: f64, top: f64, bottom: f64) -> Result<Self, CurveError> {
        Self::from_params(CurveParams {
            ic50,
            slope,
            top,
            bottom,
        })
    }

    pub fn from_params(params: CurveParams) -> Result<Self, CurveError> {
        params.validate()?;
        Ok(Self { params })
    }

    pub fn params(&self) -> CurveParams {
        self.params
    }

    pub fn ic50(&self) -> f64 {
        self.params.ic50
    }

    pub fn slope(&self) -> f64 {
        self.params.slope
    }

    pub fn top(&self) -> f64 {
        self.params.top
    }

    pub fn bottom(&self) -> f64 {
        self.params.bottom
    }

    /// Fraction surviving at concentration `c`.
    pub fn fracsurvive(&self, c: f64) -> Result<f64, CurveError> {
        if c.is_nan() || c < 0.0 {
            return Err(CurveError::invalid(format!("concentration must be >= 0, got {c}")));
        }
        Ok(predict(c, &self.params))
    }

    /// Concentration giving the requested fraction neutralized (0.5 = IC50).
    pub fn ic(&self, fraction: f64) -> Result<f64, CurveError> {
        inhibitory_concentration(&self.params, fraction)
    }

    pub fn ic50_bound(&self, c_min: f64, c_max: f64) -> Ic50Bound {
        ic50_bound(self.params.ic50, c_min, c_max)
    }

    /// Re-fit to `observations` with default optimizer settings.
    ///
    /// Asymptotes flagged in `flags` are held at this curve's current values.
    pub fn fit(&mut self, observations: &[Observation], flags: FitFlags) -> Result<FitResult, CurveError> {
        self.fit_with(observations, flags, &FitOptions::default())
    }

    /// Re-fit with explicit optimizer settings. On error `self` is unchanged.
    pub fn fit_with(
        &mut self,
        observations: &[Observation],
        flags: FitFlags,
        opts: &FitOptions,
    ) -> Result<FitResult, CurveError> {
        let result = fit_curve(observations, flags, &self.params, opts)?;
        self.params = result.params;
        Ok(result)
    }
}

impl TryFrom<CurveParams> for NeutralizationCurve {
    type Error = CurveError;

    fn try_from(params: CurveParams) -> Result<Self, Self::Error> {
        Self::from_params(params)
    }
}

impl From<NeutralizationCurve> for CurveParams {
    fn from(curve: NeutralizationCurve) -> Self {
        curve.params
    }
}
