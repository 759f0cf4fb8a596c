//! Command-line parsing for the neutralization curve fitter.
//!
//! The goal of this module is to keep **argument parsing** and **command dispatch**
//! separate from the modeling/math code.

use std::path::PathBuf;

use clap::{ArgAction, Parser, Subcommand};

pub mod picker;

/// Top-level CLI.
#[derive(Debug, Parser)]
#[command(name = "neutcurve", version, about = "Four-parameter logistic neutralization curve fitter")]
pub struct Cli {
    /// Increase log verbosity (-v info, -vv debug, -vvv trace). `RUST_LOG` wins if set.
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

/// CLI subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Fit every sample column of a wide CSV, print a table, and optionally plot/export.
    Fit(FitArgs),
    /// Merge per-sample replicate CSVs (`<prefix>_<sample>.csv`) into one wide CSV.
    Merge(MergeArgs),
    /// Write a synthetic dilution series for a known curve.
    Simulate(SimulateArgs),
    /// Plot a previously exported curve JSON.
    Plot(PlotArgs),
}

/// Options for fitting.
#[derive(Debug, Parser, Clone)]
pub struct FitArgs {
    /// Wide CSV with a `concentration` column and one column per sample.
    ///
    /// If omitted, you'll be prompted to pick a CSV from the current directory.
    #[arg(short = 'f', long = "file", value_name = "CSV")]
    pub csv: Option<PathBuf>,

    /// Hold the top asymptote fixed at `--top`.
    #[arg(long)]
    pub fix_top: bool,

    /// Value the top is held at with `--fix-top`.
    #[arg(long, default_value_t = 1.0, env = "NEUTCURVE_TOP")]
    pub top: f64,

    /// Hold the bottom asymptote fixed at `--bottom`.
    #[arg(long)]
    pub fix_bottom: bool,

    /// Value the bottom is held at with `--fix-bottom`.
    #[arg(long, default_value_t = 0.0, env = "NEUTCURVE_BOTTOM", allow_hyphen_values = true)]
    pub bottom: f64,

    /// Levenberg–Marquardt iteration cap per sample.
    #[arg(long, default_value_t = 1000, env = "NEUTCURVE_MAX_ITER")]
    pub max_iter: usize,

    /// Render an ASCII plot per sample.
    #[arg(long)]
    pub plot: bool,

    /// Plot width (columns).
    #[arg(long, default_value_t = 72, env = "NEUTCURVE_PLOT_WIDTH")]
    pub width: usize,

    /// Plot height (rows).
    #[arg(long, default_value_t = 18, env = "NEUTCURVE_PLOT_HEIGHT")]
    pub height: usize,

    /// Export per-sample fit parameters to CSV.
    #[arg(long)]
    pub export: Option<PathBuf>,

    /// Export each fitted curve to JSON. The sample name is appended to the
    /// file stem when more than one sample is fit.
    #[arg(long = "export-curve", value_name = "JSON")]
    pub export_curve: Option<PathBuf>,
}

/// Options for merging replicate CSVs.
#[derive(Debug, Parser)]
pub struct MergeArgs {
    /// Input CSV files, one per sample.
    #[arg(required = true, value_name = "CSV")]
    pub inputs: Vec<PathBuf>,

    /// Output wide CSV.
    #[arg(short, long, value_name = "CSV")]
    pub output: PathBuf,
}

/// Options for synthetic data generation.
#[derive(Debug, Parser)]
pub struct SimulateArgs {
    #[arg(long, default_value_t = 0.03)]
    pub ic50: f64,

    #[arg(long, default_value_t = 1.0, allow_hyphen_values = true)]
    pub slope: f64,

    #[arg(long, default_value_t = 1.0, allow_hyphen_values = true)]
    pub top: f64,

    #[arg(long, default_value_t = 0.0, allow_hyphen_values = true)]
    pub bottom: f64,

    /// Highest concentration of the dilution series.
    #[arg(long, default_value_t = 10.0)]
    pub start: f64,

    /// Fold dilution between steps.
    #[arg(long, default_value_t = 3.0)]
    pub factor: f64,

    /// Number of dilution steps.
    #[arg(long, default_value_t = 9)]
    pub steps: usize,

    /// Replicate columns to write.
    #[arg(long, default_value_t = 3)]
    pub replicates: usize,

    /// Standard deviation of additive Gaussian noise.
    #[arg(long, default_value_t = 0.02)]
    pub noise: f64,

    /// Random seed.
    #[arg(long, default_value_t = 42)]
    pub seed: u64,

    /// Sample name used for column headers (`<name>-<replicate>`).
    #[arg(long, default_value = "sim")]
    pub name: String,

    /// Output wide CSV.
    #[arg(short, long, value_name = "CSV")]
    pub output: PathBuf,
}

/// Options for plotting a saved curve.
#[derive(Debug, Parser)]
pub struct PlotArgs {
    /// Curve JSON file produced by `neutcurve fit --export-curve`.
    #[arg(long, value_name = "JSON")]
    pub curve: PathBuf,

    /// Plot width (columns).
    #[arg(long, default_value_t = 72, env = "NEUTCURVE_PLOT_WIDTH")]
    pub width: usize,

    /// Plot height (rows).
    #[arg(long, default_value_t = 18, env = "NEUTCURVE_PLOT_HEIGHT")]
    pub height: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_fit_with_fixed_asymptotes() {
        let cli = Cli::try_parse_from([
            "neutcurve",
            "fit",
            "-f",
            "plate.csv",
            "--fix-top",
            "--fix-bottom",
            "--bottom",
            "-0.05",
        ])
        .unwrap();
        let Command::Fit(args) = cli.command else {
            panic!("expected fit");
        };
        assert_eq!(args.csv.as_deref(), Some(std::path::Path::new("plate.csv")));
        assert!(args.fix_top && args.fix_bottom);
        assert_eq!(args.top, 1.0);
        assert_eq!(args.bottom, -0.05);
    }

    #[test]
    fn merge_requires_inputs() {
        assert!(Cli::try_parse_from(["neutcurve", "merge", "-o", "out.csv"]).is_err());
        let cli = Cli::try_parse_from(["neutcurve", "-v", "merge", "a_X.csv", "a_Y.csv", "-o", "out.csv"]).unwrap();
        assert_eq!(cli.verbose, 1);
        let Command::Merge(args) = cli.command else {
            panic!("expected merge");
        };
        assert_eq!(args.inputs.len(), 2);
    }
}
