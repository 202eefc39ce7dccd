//! Command-line parsing for the stabilized-weights tool.
//!
//! The goal of this module is to keep **argument parsing** and **command dispatch**
//! separate from the weighting/estimation code.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::domain::{DEFAULT_NUM_BINS, WeightMethod};

/// Top-level CLI.
#[derive(Debug, Parser)]
#[command(name = "ipw", version, about = "Stabilized inverse-probability weights for a continuous exposure")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

/// CLI subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Compute stabilized weights, print diagnostics, and optionally export them.
    Weights(WeightArgs),
    /// Compute weights and fit the weighted outcome model for each method.
    Estimate(WeightArgs),
    /// Write a simulated data set with known confounding to CSV.
    Simulate(SimArgs),
}

/// Common options for weighting and estimation.
#[derive(Debug, Parser, Clone)]
pub struct WeightArgs {
    /// Analysis CSV with a header row.
    #[arg(short = 'i', long, value_name = "CSV")]
    pub input: PathBuf,

    /// Unit id column (row numbers are used when omitted).
    #[arg(long)]
    pub id: Option<String>,

    /// Continuous exposure column.
    #[arg(long)]
    pub exposure: String,

    /// Binary (0/1) outcome column.
    #[arg(long)]
    pub outcome: String,

    /// Continuous confounder columns (comma-separated).
    #[arg(long, value_delimiter = ',')]
    pub covariates: Vec<String>,

    /// Categorical confounder columns (comma-separated); dummy-coded.
    #[arg(long, value_delimiter = ',')]
    pub categorical: Vec<String>,

    /// Weighting method(s) to run.
    #[arg(
        long = "method",
        value_enum,
        value_delimiter = ',',
        default_values_t = [WeightMethod::Normal, WeightMethod::QuantileBin]
    )]
    pub methods: Vec<WeightMethod>,

    /// Number of exposure quantile bins for the quantile-bin method.
    #[arg(short = 'k', long, default_value_t = DEFAULT_NUM_BINS)]
    pub bins: usize,

    /// Show the N largest weights per method.
    #[arg(long, default_value_t = 10)]
    pub top: usize,

    /// Export per-unit weights to CSV.
    #[arg(long)]
    pub export: Option<PathBuf>,

    /// Export estimates and weight diagnostics to JSON.
    #[arg(long = "export-estimates")]
    pub export_estimates: Option<PathBuf>,
}

/// Options for the simulated data set.
#[derive(Debug, Parser, Clone)]
pub struct SimArgs {
    /// Number of units.
    #[arg(short = 'n', long, default_value_t = 1000)]
    pub n: usize,

    /// Random seed.
    #[arg(long, default_value_t = 42)]
    pub seed: u64,

    /// True log odds ratio per 10 units of exposure.
    #[arg(long, default_value_t = 0.3)]
    pub effect: f64,

    /// Output CSV path.
    #[arg(short = 'o', long, value_name = "CSV")]
    pub output: PathBuf,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn weights_defaults_run_both_methods() {
        let cli = Cli::parse_from([
            "ipw", "weights", "-i", "data.csv", "--exposure", "sbp", "--outcome", "death",
            "--covariates", "age,severity", "--categorical", "sex",
        ]);
        let Command::Weights(args) = cli.command else {
            panic!("expected weights");
        };
        assert_eq!(args.methods, vec![WeightMethod::Normal, WeightMethod::QuantileBin]);
        assert_eq!(args.covariates, vec!["age", "severity"]);
        assert_eq!(args.categorical, vec!["sex"]);
        assert_eq!(args.bins, DEFAULT_NUM_BINS);
    }

    #[test]
    fn method_flag_selects_one_policy() {
        let cli = Cli::parse_from([
            "ipw", "estimate", "-i", "d.csv", "--exposure", "a", "--outcome", "y", "--method",
            "quantile-bin", "-k", "5",
        ]);
        let Command::Estimate(args) = cli.command else {
            panic!("expected estimate");
        };
        assert_eq!(args.methods, vec![WeightMethod::QuantileBin]);
        assert_eq!(args.bins, 5);
        assert!(args.covariates.is_empty());
    }

    #[test]
    fn simulate_requires_output() {
        assert!(Cli::try_parse_from(["ipw", "simulate", "-n", "10"]).is_err());
        let cli = Cli::try_parse_from(["ipw", "simulate", "-o", "sim.csv", "--seed", "3"]).unwrap();
        let Command::Simulate(args) = cli.command else {
            panic!("expected simulate");
        };
        assert_eq!(args.seed, 3);
        assert_eq!(args.n, 1000);
    }
}
