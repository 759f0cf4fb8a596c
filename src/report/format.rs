//! Formatted terminal output.
//!
//! We keep formatting code in one place so:
//! - the math/fitting code stays clean and testable
//! - output changes are localized (important for snapshot tests)

use crate::domain::{FitConfig, ObservationResidual};
use crate::fit::SampleFit;
use crate::io::ingest::IngestedData;
use crate::models::inhibitory_concentration;

/// Format the run summary (input, fixed asymptotes, per-batch counts).
pub fn format_run_summary(ingest: &IngestedData, fits: &[SampleFit], config: &FitConfig) -> String {
    let mut out = String::new();

    out.push_str("=== neutcurve - 4-parameter logistic fits ===\n");
    out.push_str(&format!("Input: {}\n", config.csv_path.display()));
    out.push_str(&format!(
        "Rows: read={} | observations used={} | problems={}\n",
        ingest.rows_read,
        ingest.observations_used,
        ingest.row_errors.len()
    ));
    out.push_str(&format!(
        "Top: {} | Bottom: {}\n",
        fixed_label(config.flags.fix_top, config.top),
        fixed_label(config.flags.fix_bottom, config.bottom),
    ));

    let ok = fits.iter().filter(|f| f.outcome.is_ok()).count();
    out.push_str(&format!("Samples: {} fit, {} failed\n", ok, fits.len() - ok));

    for err in ingest.row_errors.iter().take(5) {
        let col = err.column.as_deref().map(|c| format!(" [{c}]")).unwrap_or_default();
        out.push_str(&format!("  line {}{col}: {}\n", err.line, err.message));
    }
    if ingest.row_errors.len() > 5 {
        out.push_str(&format!("  ... {} more\n", ingest.row_errors.len() - 5));
    }
    out.push('\n');

    out
}

/// Format the per-sample fit table.
pub fn format_fit_table(fits: &[SampleFit]) -> String {
    let mut out = String::new();
    out.push_str(
        format!(
            "{:<20} {:>12} {:>12} {:>9} {:>8} {:>8} {:>10} {:>5}\n",
            "sample", "ic50", "ic90", "slope", "top", "bottom", "rmse", "iter"
        )
        .trim_end(),
    );
    out.push('\n');

    out.push_str(
        format!(
            "{:-<20} {:-<12} {:-<12} {:-<9} {:-<8} {:-<8} {:-<10} {:-<5}\n",
            "", "", "", "", "", "", "", ""
        )
        .trim_end(),
    );
    out.push('\n');

    for fit in fits {
        let line = match &fit.outcome {
            Ok(result) => {
                let p = &result.params;
                let prefix = fit.ic50_bound().map(|b| b.prefix()).unwrap_or("");
                let ic90 = inhibitory_concentration(p, 0.9)
                    .map(fmt_conc)
                    .unwrap_or_else(|_| "-".to_string());
                format!(
                    "{:<20} {:>12} {:>12} {:>9.3} {:>8.3} {:>8.3} {:>10.2e} {:>5}",
                    truncate(&fit.name, 20),
                    format!("{prefix}{}", fmt_conc(p.ic50)),
                    ic90,
                    p.slope,
                    p.top,
                    p.bottom,
                    result.quality.rmse,
                    result.quality.iterations,
                )
            }
            Err(err) => format!("{:<20} FAILED: {err}", truncate(&fit.name, 20)),
        };
        out.push_str(line.trim_end());
        out.push('\n');
    }

    out
}

/// Format the `top_n` observations with the largest absolute residual.
pub fn format_residual_table(residuals: &[ObservationResidual], top_n: usize) -> String {
    let mut rows = residuals.to_vec();
    rows.sort_by(|a, b| b.residual.abs().total_cmp(&a.residual.abs()));
    rows.truncate(top_n);

    let mut out = String::new();
    out.push_str(&format!("Largest residuals ({} of {}):\n", rows.len(), residuals.len()));
    out.push_str(
        format!(
            "{:>12} {:>10} {:>10} {:>10}\n",
            "conc", "observed", "fitted", "residual"
        )
        .trim_end(),
    );
    out.push('\n');
    out.push_str(format!("{:-<12} {:-<10} {:-<10} {:-<10}\n", "", "", "", "").trim_end());
    out.push('\n');

    for r in &rows {
        out.push_str(
            format!(
                "{:>12} {:>10.4} {:>10.4} {:>10.4}",
                fmt_conc(r.observation.concentration),
                r.observation.response,
                r.fitted,
                r.residual,
            )
            .trim_end(),
        );
        out.push('\n');
    }

    out
}

fn fixed_label(fixed: bool, value: f64) -> String {
    if fixed {
        format!("fixed at {value}")
    } else {
        "free".to_string()
    }
}

fn fmt_conc(c: f64) -> String {
    if (1e-3..1e4).contains(&c) {
        format!("{c:.4}")
    } else {
        format!("{c:.3e}")
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let mut out = String::new();
    for (i, ch) in s.chars().enumerate() {
        if i + 1 >= max {
            break;
        }
        out.push(ch);
    }
    out.push('.');
    out
}
