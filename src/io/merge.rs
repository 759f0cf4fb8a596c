//! Merge per-sample plate-reader CSVs into one wide table.
//!
//! Each input file is named `<prefix>_<sample>.csv` and holds a
//! `concentration` column plus one column per replicate (`1`, `2`, `3`, ...).
//! Replicate columns are renamed `<sample>-<replicate>` and all files are
//! outer-joined on concentration.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use tracing::info;

use crate::error::AppError;
use crate::io::ingest::{WideRow, WideTable, read_wide_csv};

/// Sample name from a plate-reader file name: the stem after the first `_`.
///
/// `FI6v3_WT.csv` -> `WT`, `FI6v3_D222G_HA2.csv` -> `D222G_HA2`. A stem
/// without `_` is used whole.
pub fn sample_name_from_path(path: &Path) -> Result<String, AppError> {
    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .ok_or_else(|| AppError::new(2, format!("Cannot derive a sample name from '{}'", path.display())))?;
    let name = stem.split_once('_').map(|(_, rest)| rest).unwrap_or(stem);
    if name.is_empty() {
        return Err(AppError::new(
            2,
            format!("Empty sample name in file name '{}'", path.display()),
        ));
    }
    Ok(name.to_string())
}

/// Merge replicate CSVs. Files are processed in sorted path order so the
/// output column order does not depend on how the paths were listed.
pub fn merge_replicate_csvs(paths: &[PathBuf]) -> Result<WideTable, AppError> {
    if paths.is_empty() {
        return Err(AppError::new(2, "No input CSV files to merge."));
    }
    let mut paths = paths.to_vec();
    paths.sort();

    let mut columns: Vec<String> = Vec::new();
    // concentration bits -> merged row
    let mut rows: HashMap<u64, WideRow> = HashMap::new();

    for path in &paths {
        let sample = sample_name_from_path(path)?;
        let parsed = read_wide_csv(path)?;
        if let Some(err) = parsed.row_errors.first() {
            return Err(AppError::new(
                2,
                format!(
                    "'{}' line {}: {} ({} problem(s) total)",
                    path.display(),
                    err.line,
                    err.message,
                    parsed.row_errors.len()
                ),
            ));
        }

        let offset = columns.len();
        for col in &parsed.table.columns {
            let name = format!("{sample}-{col}");
            if columns.contains(&name) {
                return Err(AppError::new(2, format!("Duplicate merged column '{name}'")));
            }
            columns.push(name);
        }
        let width = columns.len();

        let mut seen_in_file = HashMap::new();
        for row in parsed.table.rows {
            let key = row.concentration.to_bits();
            if seen_in_file.insert(key, ()).is_some() {
                return Err(AppError::new(
                    2,
                    format!(
                        "'{}': concentration {} appears more than once",
                        path.display(),
                        row.concentration
                    ),
                ));
            }
            let merged = rows.entry(key).or_insert_with(|| WideRow {
                concentration: row.concentration,
                values: Vec::new(),
            });
            merged.values.resize(offset, None);
            merged.values.extend(row.values);
            merged.values.resize(width, None);
        }
    }

    let width = columns.len();
    let mut rows: Vec<WideRow> = rows.into_values().collect();
    for row in &mut rows {
        row.values.resize(width, None);
    }
    rows.sort_by(|a, b| a.concentration.total_cmp(&b.concentration));

    info!(files = paths.len(), columns = width, rows = rows.len(), "merged plate-reader CSVs");
    Ok(WideTable { columns, rows })
}

/// Write a wide table as CSV (`concentration` first, blank for missing).
pub fn write_wide_csv(path: &Path, table: &WideTable) -> Result<(), AppError> {
    let mut writer = csv::Writer::from_path(path)
        .map_err(|e| AppError::new(2, format!("Failed to create CSV '{}': {e}", path.display())))?;

    let mut header = Vec::with_capacity(table.columns.len() + 1);
    header.push("concentration".to_string());
    header.extend(table.columns.iter().cloned());
    writer
        .write_record(&header)
        .map_err(|e| AppError::new(2, format!("Failed to write CSV header: {e}")))?;

    for row in &table.rows {
        let mut record = Vec::with_capacity(row.values.len() + 1);
        record.push(row.concentration.to_string());
        record.extend(row.values.iter().map(|v| v.map(|x| x.to_string()).unwrap_or_default()));
        writer
            .write_record(&record)
            .map_err(|e| AppError::new(2, format!("Failed to write CSV row: {e}")))?;
    }

    writer
        .flush()
        .map_err(|e| AppError::new(2, format!("Failed to flush CSV '{}': {e}", path.display())))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn sample_names_come_from_file_stem() {
        assert_eq!(sample_name_from_path(Path::new("data/FI6v3_WT.csv")).unwrap(), "WT");
        assert_eq!(
            sample_name_from_path(Path::new("FI6v3_D222G_HA2.csv")).unwrap(),
            "D222G_HA2"
        );
        assert_eq!(sample_name_from_path(Path::new("plain.csv")).unwrap(), "plain");
        assert!(sample_name_from_path(Path::new("FI6v3_.csv")).is_err());
    }

    #[test]
    fn merges_and_outer_joins_on_concentration() {
        let dir = tempfile::tempdir().unwrap();
        let b = dir.path().join("ab_mutB.csv");
        let a = dir.path().join("ab_WT.csv");
        fs::write(&a, "concentration,1,2\n1,0.5,0.6\n0.1,0.9,0.95\n").unwrap();
        fs::write(&b, "concentration,1\n10,0.01\n1,0.4\n").unwrap();

        let table = merge_replicate_csvs(&[b.clone(), a.clone()]).unwrap();
        assert_eq!(table.columns, ["WT-1", "WT-2", "mutB-1"]);
        let concs: Vec<f64> = table.rows.iter().map(|r| r.concentration).collect();
        assert_eq!(concs, [0.1, 1.0, 10.0]);
        assert_eq!(table.rows[0].values, [Some(0.9), Some(0.95), None]);
        assert_eq!(table.rows[1].values, [Some(0.5), Some(0.6), Some(0.4)]);
        assert_eq!(table.rows[2].values, [None, None, Some(0.01)]);

        let out = dir.path().join("merged.csv");
        write_wide_csv(&out, &table).unwrap();
        let text = fs::read_to_string(&out).unwrap();
        assert_eq!(
            text,
            "concentration,WT-1,WT-2,mutB-1\n0.1,0.9,0.95,\n1,0.5,0.6,0.4\n10,,,0.01\n"
        );

        let back = read_wide_csv(&out).unwrap();
        assert_eq!(back.table, table);
    }

    #[test]
    fn duplicate_concentration_in_one_file_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("ab_WT.csv");
        fs::write(&a, "concentration,1\n1,0.5\n1,0.6\n").unwrap();
        assert_eq!(merge_replicate_csvs(&[a]).unwrap_err().exit_code(), 2);
    }
}
