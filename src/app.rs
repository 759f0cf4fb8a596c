//! Top-level application orchestration.
//!
//! `src/main.rs` is intentionally tiny; this module is the "real main" that:
//! - loads `.env` and sets up logging
//! - parses CLI arguments
//! - runs curve fitting over every sample in a plate CSV
//! - prints reports/plots
//! - writes optional exports

use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::cli::{Cli, Command, FitArgs, MergeArgs, PlotArgs, SimulateArgs};
use crate::data::sample::dilution_series;
use crate::domain::{CurveParams, FitConfig, FitFlags};
use crate::error::AppError;

pub mod pipeline;

/// Residual rows printed under each `--plot`.
const RESIDUAL_ROWS: usize = 5;

/// Entry point for the `neutcurve` binary.
pub fn run() -> Result<(), AppError> {
    // A missing `.env` is fine; clap falls back to flags and defaults.
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Command::Fit(args) => handle_fit(args),
        Command::Merge(args) => handle_merge(args),
        Command::Simulate(args) => handle_simulate(args),
        Command::Plot(args) => handle_plot(args),
    }
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    // Logs go to stderr so stdout stays clean for tables and plots.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

fn handle_fit(args: FitArgs) -> Result<(), AppError> {
    let config = fit_config_from_args(&args)?;
    let run = pipeline::run_fit(&config)?;

    println!(
        "{}",
        crate::report::format_run_summary(&run.ingest, &run.fits, &config)
    );
    println!("{}", crate::report::format_fit_table(&run.fits));

    if config.plot {
        for (sample, fit) in run.ingest.samples.iter().zip(run.fits.iter()) {
            let Ok(result) = &fit.outcome else {
                continue;
            };
            println!("{}:", sample.name);
            println!(
                "{}",
                crate::plot::render_ascii_plot(
                    &sample.observations,
                    &result.params,
                    config.plot_width,
                    config.plot_height,
                )
            );
            let residuals = crate::report::compute_residuals(&sample.observations, &result.params)?;
            println!("{}", crate::report::format_residual_table(&residuals, RESIDUAL_ROWS));
        }
    }

    // Optional exports.
    if let Some(path) = &config.export_results {
        crate::io::export::write_fits_csv(path, &run.fits)?;
        info!(path = %path.display(), "wrote fit table");
    }
    if let Some(base) = &config.export_curve {
        let multiple = run.fits.len() > 1;
        for fit in &run.fits {
            let (Ok(result), Some(range)) = (&fit.outcome, fit.concentration_range) else {
                continue;
            };
            let path = pipeline::curve_export_path(base, &fit.name, multiple);
            crate::io::curve::write_curve_json(&path, result, Some(&fit.name), range)?;
            info!(path = %path.display(), sample = %fit.name, "wrote curve JSON");
        }
    }

    // Partial failures are reported in the table; only a fully failed batch is an error.
    if !run.fits.iter().all(|f| f.outcome.is_err()) {
        return Ok(());
    }
    match run.fits.first().map(|f| &f.outcome) {
        Some(Err(first)) => {
            let code = AppError::from(first.clone()).exit_code();
            Err(AppError::new(
                code,
                format!("All {} sample(s) failed to fit; first error: {first}", run.fits.len()),
            ))
        }
        _ => Ok(()),
    }
}

fn handle_merge(args: MergeArgs) -> Result<(), AppError> {
    let table = crate::io::merge::merge_replicate_csvs(&args.inputs)?;
    crate::io::merge::write_wide_csv(&args.output, &table)?;
    println!(
        "Merged {} file(s) into {} ({} columns, {} concentrations).",
        args.inputs.len(),
        args.output.display(),
        table.columns.len(),
        table.rows.len()
    );
    Ok(())
}

fn handle_simulate(args: SimulateArgs) -> Result<(), AppError> {
    let params = CurveParams {
        ic50: args.ic50,
        slope: args.slope,
        top: args.top,
        bottom: args.bottom,
    };
    let concentrations = dilution_series(args.start, args.factor, args.steps)?;
    let table = pipeline::simulate_plate(
        &params,
        &concentrations,
        args.replicates,
        args.noise,
        args.seed,
        &args.name,
    )?;
    crate::io::merge::write_wide_csv(&args.output, &table)?;
    println!(
        "Wrote {} concentrations x {} replicates to {}.",
        table.rows.len(),
        table.columns.len(),
        args.output.display()
    );
    Ok(())
}

fn handle_plot(args: PlotArgs) -> Result<(), AppError> {
    let curve = crate::io::curve::read_curve_json(&args.curve)?;

    if let Some(sample) = &curve.sample {
        println!("{sample}:");
    }
    let plot = crate::plot::render_ascii_plot_from_curve_file(&curve, args.width, args.height);
    println!("{plot}");
    Ok(())
}

pub fn fit_config_from_args(args: &FitArgs) -> Result<FitConfig, AppError> {
    let csv_path = match &args.csv {
        Some(path) => crate::cli::picker::validate_csv_path(path)?,
        None => crate::cli::picker::prompt_for_csv_path()?,
    };

    Ok(FitConfig {
        csv_path,
        flags: FitFlags {
            fix_top: args.fix_top,
            fix_bottom: args.fix_bottom,
        },
        top: args.top,
        bottom: args.bottom,
        max_iter: args.max_iter,
        plot: args.plot,
        plot_width: args.width,
        plot_height: args.height,
        export_results: args.export.clone(),
        export_curve: args.export_curve.clone(),
    })
}
