//! Top-level application orchestration.
//!
//! `src/main.rs` is intentionally tiny; this module is the "real main" that:
//! - loads `.env` and initialises logging
//! - parses CLI arguments
//! - runs ingest + weighting (+ outcome model)
//! - prints reports
//! - writes optional exports

use std::collections::HashSet;

use clap::Parser;

use crate::cli::{Command, SimArgs, WeightArgs};
use crate::domain::{CovariateSpec, SimConfig, WeightConfig};
use crate::error::AppError;

pub mod pipeline;

/// Entry point for the `ipw` binary.
pub fn run() -> Result<(), AppError> {
    dotenvy::dotenv().ok();
    init_logging();

    let cli = crate::cli::Cli::parse();

    match cli.command {
        Command::Weights(args) => handle_weights(args),
        Command::Estimate(args) => handle_estimate(args),
        Command::Simulate(args) => handle_simulate(args),
    }
}

fn init_logging() {
    // A logger may already be installed when embedded.
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn"))
        .format_timestamp(None)
        .try_init();
}

fn handle_weights(args: WeightArgs) -> Result<(), AppError> {
    let config = weight_config_from_args(&args)?;
    let run = pipeline::run_weights(&config)?;

    println!("{}", crate::report::format_run_summary(&run.ingest, &config));
    print_weights(&run, args.top);

    if let Some(path) = &config.export_weights {
        crate::io::write_weights_csv(path, &run.ingest.table, &run.sets)?;
        println!("Wrote weights to {}", path.display());
    }
    if config.export_estimates.is_some() {
        log::warn!("--export-estimates is ignored by `ipw weights`; use `ipw estimate`.");
    }

    Ok(())
}

fn handle_estimate(args: WeightArgs) -> Result<(), AppError> {
    let config = weight_config_from_args(&args)?;
    let run = pipeline::run_estimates(&config)?;

    println!("{}", crate::report::format_run_summary(&run.weights.ingest, &config));
    print_weights(&run.weights, args.top);

    println!("{}", crate::report::format_estimates(&run.estimates));
    for (method, reason) in &run.skipped {
        println!("  (skipped {}) {reason}", method.display_name());
    }

    if let Some(path) = &config.export_weights {
        crate::io::write_weights_csv(path, &run.weights.ingest.table, &run.weights.sets)?;
        println!("Wrote weights to {}", path.display());
    }
    if let Some(path) = &config.export_estimates {
        crate::io::write_estimates_json(path, &pipeline::estimates_file(&config, &run))?;
        println!("Wrote estimates to {}", path.display());
    }

    Ok(())
}

fn handle_simulate(args: SimArgs) -> Result<(), AppError> {
    let config = SimConfig {
        n: args.n,
        seed: args.seed,
        effect_per_10: args.effect,
    };
    let table = crate::data::simulate_units(&config)?;
    crate::io::write_units_csv(
        &args.output,
        &table,
        crate::data::EXPOSURE_COLUMN,
        crate::data::OUTCOME_COLUMN,
    )?;

    print!("{}", crate::report::format_table_stats(&table));
    println!(
        "Wrote {} simulated units to {} (exposure={}, outcome={}, covariates=age_z,severity_z; categorical=sex)",
        table.len(),
        args.output.display(),
        crate::data::EXPOSURE_COLUMN,
        crate::data::OUTCOME_COLUMN,
    );
    Ok(())
}

fn print_weights(run: &pipeline::WeightRun, top: usize) {
    for (set, summary) in run.sets.iter().zip(&run.summaries) {
        println!("{}", crate::report::format_weight_summary(set, summary));
        if top > 0 {
            let ranked = crate::report::rank_extreme_weights(&run.ingest.table, set, top);
            println!("{}", crate::report::format_extreme_weights(&ranked));
        }
    }
}

/// Validate flags and build the pipeline configuration.
///
/// Covariates keep the order of `--covariates`, followed by any `--categorical`
/// column not already listed there.
pub fn weight_config_from_args(args: &WeightArgs) -> Result<WeightConfig, AppError> {
    if args.bins == 0 {
        return Err(AppError::input("--bins must be at least 1."));
    }
    if args.methods.is_empty() {
        return Err(AppError::input("At least one --method is required."));
    }
    if args.exposure.eq_ignore_ascii_case(&args.outcome) {
        return Err(AppError::input("Exposure and outcome must be different columns."));
    }

    let categorical: HashSet<String> = args.categorical.iter().map(|c| c.to_ascii_lowercase()).collect();
    let mut seen = HashSet::new();
    let mut covariates = Vec::new();
    for name in args.covariates.iter().chain(&args.categorical) {
        let name = name.trim();
        if name.is_empty() {
            continue;
        }
        let key = name.to_ascii_lowercase();
        if key == args.exposure.to_ascii_lowercase() || key == args.outcome.to_ascii_lowercase() {
            return Err(AppError::input(format!(
                "Column `{name}` cannot be both a covariate and the exposure/outcome."
            )));
        }
        if !seen.insert(key.clone()) {
            continue;
        }
        covariates.push(if categorical.contains(&key) {
            CovariateSpec::categorical(name)
        } else {
            CovariateSpec::continuous(name)
        });
    }

    let mut methods = Vec::new();
    for m in &args.methods {
        if !methods.contains(m) {
            methods.push(*m);
        }
    }

    Ok(WeightConfig {
        csv_path: args.input.clone(),
        id_column: args.id.clone(),
        exposure_column: args.exposure.clone(),
        outcome_column: args.outcome.clone(),
        covariates,
        methods,
        num_bins: args.bins,
        export_weights: args.export.clone(),
        export_estimates: args.export_estimates.clone(),
    })
}
