//! CSV ingest and normalization.
//!
//! This module turns a wide plate-reader table into named samples that are
//! safe to fit. The expected layout is one `concentration` column plus one
//! column per sample/replicate:
//!
//! ```text
//! concentration,WT-1,WT-2,D222G-1
//! 10,0.01,0.02,0.05
//! 3.333,0.08,,0.11
//! ```
//!
//! Design goals:
//! - **Strict schema** for the concentration column (clear errors + exit code 2)
//! - **Cell-level validation** (skip bad cells, but report what happened)
//! - **Deterministic behavior** (columns and rows keep file order)
//! - **Separation of concerns**: no fitting logic here

use std::collections::HashSet;
use std::fs::File;
use std::path::Path;

use csv::StringRecord;
use tracing::{debug, info};

use crate::domain::{Observation, Sample};
use crate::error::AppError;

/// Accepted (normalized) names for the concentration column.
const CONCENTRATION_HEADERS: [&str; 3] = ["concentration", "conc", "concentrations"];

/// A wide table keyed by concentration.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct WideTable {
    /// Sample column names (excluding the concentration column).
    pub columns: Vec<String>,
    pub rows: Vec<WideRow>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct WideRow {
    pub concentration: f64,
    /// One entry per column; `None` for blank cells.
    pub values: Vec<Option<f64>>,
}

impl WideTable {
    /// One `Sample` per column, with blank cells dropped.
    pub fn to_samples(&self) -> Vec<Sample> {
        self.columns
            .iter()
            .enumerate()
            .map(|(j, name)| Sample {
                name: name.clone(),
                observations: self
                    .rows
                    .iter()
                    .filter_map(|row| {
                        row.values
                            .get(j)
                            .copied()
                            .flatten()
                            .map(|y| Observation::new(row.concentration, y))
                    })
                    .collect(),
            })
            .collect()
    }
}

/// A row- or cell-level error encountered during ingest.
#[derive(Debug, Clone, PartialEq)]
pub struct RowError {
    pub line: usize,
    pub column: Option<String>,
    pub message: String,
}

/// A parsed table plus the problems found while reading it.
#[derive(Debug, Clone)]
pub struct ParsedTable {
    pub table: WideTable,
    pub row_errors: Vec<RowError>,
    pub rows_read: usize,
}

/// Ingest output: named samples + row errors.
#[derive(Debug, Clone)]
pub struct IngestedData {
    pub samples: Vec<Sample>,
    pub row_errors: Vec<RowError>,
    pub rows_read: usize,
    pub observations_used: usize,
}

/// Load a wide plate-reader CSV as one sample per column.
pub fn load_samples(path: &Path) -> Result<IngestedData, AppError> {
    let parsed = read_wide_csv(path)?;
    let samples = parsed.table.to_samples();
    let observations_used: usize = samples.iter().map(|s| s.observations.len()).sum();
    if observations_used == 0 {
        return Err(AppError::new(
            3,
            format!("No valid observations in '{}'.", path.display()),
        ));
    }
    info!(
        path = %path.display(),
        samples = samples.len(),
        observations = observations_used,
        row_errors = parsed.row_errors.len(),
        "loaded samples"
    );
    Ok(IngestedData {
        samples,
        row_errors: parsed.row_errors,
        rows_read: parsed.rows_read,
        observations_used,
    })
}

/// Read a wide CSV with a concentration column.
pub fn read_wide_csv(path: &Path) -> Result<ParsedTable, AppError> {
    let file = File::open(path)
        .map_err(|e| AppError::new(2, format!("Failed to open CSV '{}': {e}", path.display())))?;

    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(file);

    let headers = reader
        .headers()
        .map_err(|e| AppError::new(2, format!("Failed to read CSV headers in '{}': {e}", path.display())))?
        .clone();

    let (conc_idx, columns) = resolve_columns(&headers)
        .map_err(|msg| AppError::new(2, format!("{msg} (in '{}')", path.display())))?;

    let mut rows = Vec::new();
    let mut row_errors = Vec::new();
    let mut rows_read = 0usize;

    for (idx, result) in reader.records().enumerate() {
        // +2 because:
        // - records() starts at line 1 after headers
        // - CSV is 1-based line numbers
        let line = idx + 2;
        rows_read += 1;

        let record = match result {
            Ok(r) => r,
            Err(e) => {
                row_errors.push(RowError {
                    line,
                    column: None,
                    message: format!("CSV parse error: {e}"),
                });
                continue;
            }
        };

        if record.iter().all(|cell| cell.is_empty()) {
            continue;
        }

        let conc_cell = record.get(conc_idx).unwrap_or("");
        let concentration = match parse_concentration(conc_cell) {
            Ok(c) => c,
            Err(message) => {
                row_errors.push(RowError {
                    line,
                    column: None,
                    message,
                });
                continue;
            }
        };

        let mut values = Vec::with_capacity(columns.len());
        for (col_name, col_idx) in &columns {
            match parse_cell(record.get(*col_idx).unwrap_or("")) {
                Ok(v) => values.push(v),
                Err(message) => {
                    row_errors.push(RowError {
                        line,
                        column: Some(col_name.clone()),
                        message,
                    });
                    values.push(None);
                }
            }
        }

        rows.push(WideRow { concentration, values });
    }

    debug!(path = %path.display(), rows = rows.len(), rows_read, "parsed wide CSV");

    Ok(ParsedTable {
        table: WideTable {
            columns: columns.into_iter().map(|(name, _)| name).collect(),
            rows,
        },
        row_errors,
        rows_read,
    })
}

/// Locate the concentration column and the sample columns (in file order).
fn resolve_columns(headers: &StringRecord) -> Result<(usize, Vec<(String, usize)>), String> {
    let mut conc_idx = None;
    let mut columns = Vec::new();
    let mut seen = HashSet::new();

    for (idx, raw) in headers.iter().enumerate() {
        let name = clean_header_name(raw);
        if conc_idx.is_none() && CONCENTRATION_HEADERS.contains(&name.to_ascii_lowercase().as_str()) {
            conc_idx = Some(idx);
            continue;
        }
        if name.is_empty() {
            return Err(format!("Empty column header at position {}", idx + 1));
        }
        if !seen.insert(name.clone()) {
            return Err(format!("Duplicate column header '{name}'"));
        }
        columns.push((name, idx));
    }

    let Some(conc_idx) = conc_idx else {
        return Err("Missing required column 'concentration'".to_string());
    };
    Ok((conc_idx, columns))
}

fn clean_header_name(name: &str) -> String {
    // Excel and other tools sometimes emit UTF-8 CSVs with a BOM prefix on the
    // first header. If we don't strip it, schema validation will incorrectly
    // report a missing concentration column.
    name.trim().trim_start_matches('\u{feff}').trim().to_string()
}

fn parse_concentration(cell: &str) -> Result<f64, String> {
    let c: f64 = cell
        .parse()
        .map_err(|_| format!("Invalid concentration '{cell}'"))?;
    if !(c.is_finite() && c > 0.0) {
        return Err(format!("Concentration must be finite and > 0, got '{cell}'"));
    }
    Ok(c)
}

fn parse_cell(cell: &str) -> Result<Option<f64>, String> {
    if cell.is_empty() || cell.eq_ignore_ascii_case("na") || cell.eq_ignore_ascii_case("nan") {
        return Ok(None);
    }
    let v: f64 = cell.parse().map_err(|_| format!("Invalid value '{cell}'"))?;
    if !v.is_finite() {
        return Err(format!("Non-finite value '{cell}'"));
    }
    Ok(Some(v))
}
