//! Interactive CSV picker.
//!
//! This is intentionally kept separate from clap parsing:
//! - clap handles structured flags/subcommands
//! - the picker provides the "run `neutcurve fit` and choose a plate" UX
//!
//! Only `*.csv` files whose header names a concentration column are offered,
//! so exports (fit tables) and unrelated CSVs stay out of the list.

use std::fs::{self, File};
use std::io::{self, BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use crate::error::AppError;

/// Default directory recursion depth for finding CSV files.
const DEFAULT_SEARCH_DEPTH: usize = 3;

/// Prompt the user to select a plate CSV from the current directory tree.
///
/// Behavior:
/// - list discovered plate CSVs
/// - accept either a number (from the list) or an explicit path
/// - `q` cancels
pub fn prompt_for_csv_path() -> Result<PathBuf, AppError> {
    let files = discover_plate_csvs(Path::new("."));
    if files.is_empty() {
        return Err(AppError::new(
            2,
            "No plate CSVs (with a 'concentration' column) found. Provide one with `neutcurve fit -f <file.csv>`.",
        ));
    }

    println!("Found {} plate CSV file(s):", files.len());
    for (idx, path) in files.iter().enumerate() {
        println!("{:>3}) {}", idx + 1, pretty_path(path));
    }

    loop {
        print!("Select a file by number (1-{}) or type a path (q to quit): ", files.len());
        io::stdout()
            .flush()
            .map_err(|e| AppError::new(2, format!("Failed to write prompt: {e}")))?;

        let mut input = String::new();
        let bytes = io::stdin()
            .read_line(&mut input)
            .map_err(|e| AppError::new(2, format!("Failed to read input: {e}")))?;

        if bytes == 0 {
            return Err(AppError::new(
                2,
                "No input received. Provide a CSV path with `neutcurve fit -f <file.csv>`.",
            ));
        }

        match resolve_choice(input.trim(), &files) {
            Choice::Path(path) => return Ok(path),
            Choice::Cancel => return Err(AppError::new(2, "Canceled.")),
            Choice::Retry(msg) => println!("{msg}"),
        }
    }
}

enum Choice {
    Path(PathBuf),
    Cancel,
    Retry(String),
}

fn resolve_choice(input: &str, files: &[PathBuf]) -> Choice {
    if input.eq_ignore_ascii_case("q") {
        return Choice::Cancel;
    }
    if let Ok(choice) = input.parse::<usize>() {
        if (1..=files.len()).contains(&choice) {
            return Choice::Path(files[choice - 1].clone());
        }
        return Choice::Retry(format!(
            "Invalid choice: {choice}. Enter a number between 1 and {}.",
            files.len()
        ));
    }
    match validate_csv_path(Path::new(input)) {
        Ok(path) => Choice::Path(path),
        Err(err) => Choice::Retry(err.to_string()),
    }
}

/// Validate the provided path points to a `.csv` file.
pub fn validate_csv_path(path: &Path) -> Result<PathBuf, AppError> {
    if !path.exists() {
        return Err(AppError::new(2, format!("CSV file not found: {}", path.display())));
    }
    if path.is_dir() {
        return Err(AppError::new(
            2,
            format!("Expected a file, got a directory: {}", path.display()),
        ));
    }
    if !has_csv_extension(path) {
        return Err(AppError::new(
            2,
            format!("Expected a .csv file (got: {}). Use -f to pass a CSV path.", path.display()),
        ));
    }
    Ok(path.to_path_buf())
}

/// Discover plate CSVs under `root` (deterministic order).
pub fn discover_plate_csvs(root: &Path) -> Vec<PathBuf> {
    let mut out = Vec::new();
    walk(root, 0, &mut out);
    out.retain(|p| looks_like_plate_csv(p));
    out.sort_by_key(|p| pretty_path(p));
    out
}

fn walk(dir: &Path, depth: usize, out: &mut Vec<PathBuf>) {
    if depth > DEFAULT_SEARCH_DEPTH {
        return;
    }
    let Ok(entries) = fs::read_dir(dir) else {
        return;
    };
    for entry in entries.flatten() {
        let path = entry.path();
        let Ok(file_type) = entry.file_type() else {
            continue;
        };
        if file_type.is_dir() {
            let name = path.file_name().and_then(|s| s.to_str()).unwrap_or("");
            if !matches!(name, ".git" | "target" | "node_modules") {
                walk(&path, depth + 1, out);
            }
        } else if file_type.is_file() && has_csv_extension(&path) {
            out.push(path);
        }
    }
}

fn has_csv_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("csv"))
}

/// True when the first line mentions a concentration column.
fn looks_like_plate_csv(path: &Path) -> bool {
    let Ok(file) = File::open(path) else {
        return false;
    };
    let mut first = String::new();
    if BufReader::new(file).read_line(&mut first).is_err() {
        return false;
    }
    first
        .split(',')
        .map(|h| h.trim().trim_start_matches('\u{feff}').to_ascii_lowercase())
        .any(|h| matches!(h.as_str(), "concentration" | "conc" | "concentrations"))
}

fn pretty_path(path: &Path) -> String {
    let stripped = path.strip_prefix("./").unwrap_or(path);
    stripped.display().to_string()
}
