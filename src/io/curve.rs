//! Read/write curve JSON files.
//!
//! Curve JSON is the "portable" representation of a fitted curve:
//! - the four logistic parameters and which asymptotes were fixed
//! - fit quality (SSE, RMSE, iterations)
//! - a precomputed log-spaced grid for quick plotting
//!
//! The schema is defined by `domain::CurveFile`.

use std::fs::File;
use std::path::Path;

use chrono::Utc;

use crate::domain::{CurveFile, CurveGrid, FitResult};
use crate::error::AppError;
use crate::math::log_space;
use crate::models::model::predict;

/// Number of grid points in an exported curve.
const GRID_POINTS: usize = 101;

/// The exported grid extends this factor beyond the measured window on each side.
const GRID_PAD_FACTOR: f64 = 3.0;

/// Build the in-memory curve file for a fit over `[c_min, c_max]`.
pub fn build_curve_file(
    fit: &FitResult,
    sample: Option<&str>,
    concentration_range: (f64, f64),
) -> Result<CurveFile, AppError> {
    let (c_min, c_max) = concentration_range;
    let concentration = log_space(c_min / GRID_PAD_FACTOR, c_max * GRID_PAD_FACTOR, GRID_POINTS)?;
    let response = concentration.iter().map(|&c| predict(c, &fit.params)).collect();

    Ok(CurveFile {
        tool: "neutcurve".to_string(),
        created: Utc::now(),
        sample: sample.map(str::to_string),
        params: fit.params,
        flags: fit.flags,
        fit_quality: fit.quality.clone(),
        grid: CurveGrid {
            concentration,
            response,
        },
    })
}

/// Write a curve JSON file.
pub fn write_curve_json(
    path: &Path,
    fit: &FitResult,
    sample: Option<&str>,
    concentration_range: (f64, f64),
) -> Result<(), AppError> {
    let curve = build_curve_file(fit, sample, concentration_range)?;
    let file = File::create(path)
        .map_err(|e| AppError::new(2, format!("Failed to create curve JSON '{}': {e}", path.display())))?;

    serde_json::to_writer_pretty(file, &curve)
        .map_err(|e| AppError::new(2, format!("Failed to write curve JSON: {e}")))?;

    Ok(())
}

/// Read a curve JSON file.
pub fn read_curve_json(path: &Path) -> Result<CurveFile, AppError> {
    let file = File::open(path)
        .map_err(|e| AppError::new(2, format!("Failed to open curve JSON '{}': {e}", path.display())))?;
    let curve: CurveFile =
        serde_json::from_reader(file).map_err(|e| AppError::new(2, format!("Invalid curve JSON: {e}")))?;
    curve
        .params
        .validate()
        .map_err(|e| AppError::new(2, format!("Invalid curve JSON: {e}")))?;
    if curve.grid.concentration.len() != curve.grid.response.len() {
        return Err(AppError::new(2, "Invalid curve JSON: grid columns differ in length"));
    }
    Ok(curve)
}
