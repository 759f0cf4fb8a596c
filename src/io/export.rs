//! Export per-sample fit results to CSV.
//!
//! The export is meant to be easy to consume in spreadsheets or notebooks.
//! Failed fits keep their row, with empty numeric fields and the error text.

use std::path::Path;

use crate::error::AppError;
use crate::fit::SampleFit;
use crate::models::inhibitory_concentration;

const HEADER: [&str; 15] = [
    "sample",
    "ic50",
    "ic50_bound",
    "ic90",
    "slope",
    "top",
    "bottom",
    "sse",
    "rmse",
    "n",
    "iterations",
    "fix_top",
    "fix_bottom",
    "status",
    "error",
];

/// Write one row per sample.
pub fn write_fits_csv(path: &Path, fits: &[SampleFit]) -> Result<(), AppError> {
    let mut writer = csv::Writer::from_path(path)
        .map_err(|e| AppError::new(2, format!("Failed to create export CSV '{}': {e}", path.display())))?;

    writer
        .write_record(HEADER)
        .map_err(|e| AppError::new(2, format!("Failed to write export CSV header: {e}")))?;

    for fit in fits {
        writer
            .write_record(fit_record(fit))
            .map_err(|e| AppError::new(2, format!("Failed to write export CSV row: {e}")))?;
    }

    writer
        .flush()
        .map_err(|e| AppError::new(2, format!("Failed to flush export CSV '{}': {e}", path.display())))?;
    Ok(())
}

fn fit_record(fit: &SampleFit) -> Vec<String> {
    match &fit.outcome {
        Ok(result) => {
            let p = &result.params;
            let bound = fit
                .ic50_bound()
                .map(|b| format!("{b:?}").to_lowercase())
                .unwrap_or_default();
            let ic90 = inhibitory_concentration(p, 0.9)
                .map(|c| format!("{c:.6e}"))
                .unwrap_or_default();
            vec![
                fit.name.clone(),
                format!("{:.6e}", p.ic50),
                bound,
                ic90,
                format!("{:.6}", p.slope),
                format!("{:.6}", p.top),
                format!("{:.6}", p.bottom),
                format!("{:.6e}", result.quality.sse),
                format!("{:.6e}", result.quality.rmse),
                result.quality.n.to_string(),
                result.quality.iterations.to_string(),
                result.flags.fix_top.to_string(),
                result.flags.fix_bottom.to_string(),
                "ok".to_string(),
                String::new(),
            ]
        }
        Err(err) => {
            let mut row = vec![String::new(); HEADER.len()];
            row[0] = fit.name.clone();
            row[HEADER.len() - 2] = "failed".to_string();
            row[HEADER.len() - 1] = err.to_string();
            row
        }
    }
}
