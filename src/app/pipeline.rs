//! Shared "fit pipeline" logic used by the CLI subcommands.
//!
//! Keeping this in one place avoids duplicating the core workflow:
//! CSV ingest -> batch fit -> (report / plot / export)
//!
//! The command handlers can then focus on presentation.

use std::path::{Path, PathBuf};

use crate::data::sample::generate_sample;
use crate::domain::{CurveParams, FitConfig};
use crate::error::{AppError, CurveError};
use crate::fit::{FitOptions, SampleFit, fit_samples};
use crate::io::ingest::{IngestedData, WideRow, WideTable, load_samples};

/// All computed outputs of a single `neutcurve fit` run.
#[derive(Debug, Clone)]
pub struct RunOutput {
    pub ingest: IngestedData,
    pub fits: Vec<SampleFit>,
}

/// Execute the fitting pipeline and return the computed outputs.
pub fn run_fit(config: &FitConfig) -> Result<RunOutput, AppError> {
    if config.max_iter == 0 {
        return Err(AppError::new(2, "--max-iter must be > 0."));
    }
    if !(config.top.is_finite() && config.bottom.is_finite()) {
        return Err(AppError::new(2, "--top and --bottom must be finite."));
    }

    let ingest = load_samples(&config.csv_path)?;

    let anchor = CurveParams {
        top: config.top,
        bottom: config.bottom,
        ..CurveParams::default()
    };
    let opts = FitOptions {
        max_iter: config.max_iter,
        ..FitOptions::default()
    };
    let fits = fit_samples(&ingest.samples, config.flags, &anchor, &opts);

    Ok(RunOutput { ingest, fits })
}

/// Build a synthetic plate: one `<name>-<r>` column per replicate.
pub fn simulate_plate(
    params: &CurveParams,
    concentrations: &[f64],
    replicates: usize,
    noise_sd: f64,
    seed: u64,
    name: &str,
) -> Result<WideTable, CurveError> {
    let observations = generate_sample(params, concentrations, replicates, noise_sd, seed)?;

    let columns = (1..=replicates).map(|r| format!("{name}-{r}")).collect();
    let mut rows: Vec<WideRow> = observations
        .chunks(replicates)
        .map(|group| WideRow {
            concentration: group[0].concentration,
            values: group.iter().map(|o| Some(o.response)).collect(),
        })
        .collect();
    rows.sort_by(|a, b| a.concentration.total_cmp(&b.concentration));

    Ok(WideTable { columns, rows })
}

/// Where to write the curve JSON for `sample`.
///
/// With a single sample the requested path is used as-is; otherwise the
/// sample name is appended to the file stem (`curve.json` -> `curve_WT-1.json`).
pub fn curve_export_path(base: &Path, sample: &str, multiple: bool) -> PathBuf {
    if !multiple {
        return base.to_path_buf();
    }
    let stem = base.file_stem().and_then(|s| s.to_str()).unwrap_or("curve");
    let ext = base.extension().and_then(|s| s.to_str()).unwrap_or("json");
    let safe: String = sample
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') { c } else { '_' })
        .collect();
    base.with_file_name(format!("{stem}_{safe}.{ext}"))
}
