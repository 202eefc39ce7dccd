//! Shared weighting/estimation pipeline used by the `weights` and `estimate`
//! commands.
//!
//! Keeping this in one place avoids duplicating the core workflow:
//! CSV ingest -> complete cases -> weights per method -> diagnostics -> outcome model
//!
//! The commands can then focus on presentation and exports.

use crate::domain::{Estimate, EstimateMethod, UnitTable, WeightConfig, WeightMethod, WeightSet};
use crate::error::AppError;
use crate::io::{EstimatesFile, IngestedData, load_units};
use crate::report::{WeightSummary, summarize_weights};

/// Weights and their diagnostics for one table.
#[derive(Debug, Clone)]
pub struct WeightRun {
    pub ingest: IngestedData,
    pub sets: Vec<WeightSet>,
    pub summaries: Vec<WeightSummary>,
}

/// All computed outputs of a single `ipw estimate` run.
#[derive(Debug, Clone)]
pub struct EstimateRun {
    pub weights: WeightRun,
    pub estimates: Vec<Estimate>,
    /// Methods whose outcome model could not be fitted, with the reason.
    pub skipped: Vec<(EstimateMethod, String)>,
}

/// Compute one weight set per requested method, in the requested order.
pub fn weigh_table(table: &UnitTable, methods: &[WeightMethod], num_bins: usize) -> Result<Vec<WeightSet>, AppError> {
    methods
        .iter()
        .map(|&method| crate::weights::compute_weights(table, method, num_bins))
        .collect()
}

/// Ingest the CSV and compute weights.
pub fn run_weights(config: &WeightConfig) -> Result<WeightRun, AppError> {
    let ingest = load_units(config)?;
    log::info!(
        "Ingested {} complete units from {} rows",
        ingest.rows_used,
        ingest.rows_read
    );

    let sets = weigh_table(&ingest.table, &config.methods, config.num_bins)?;
    let summaries = sets.iter().map(summarize_weights).collect();

    Ok(WeightRun {
        ingest,
        sets,
        summaries,
    })
}

/// Fit the weighted outcome model for every weight set.
///
/// A method whose weights cannot be fitted is skipped with its reason; the run
/// fails only when no method produced an estimate.
pub fn estimate_all(table: &UnitTable, sets: &[WeightSet]) -> Result<(Vec<Estimate>, Vec<(EstimateMethod, String)>), AppError> {
    let mut estimates = Vec::new();
    let mut skipped = Vec::new();
    let mut last_err = None;

    for set in sets {
        match crate::estimate::estimate_from_weights(table, set) {
            Ok(est) => estimates.push(est),
            Err(err) => {
                log::warn!("{}: outcome model skipped: {err}", set.method.display_name());
                skipped.push((EstimateMethod::from(set.method), err.message().to_string()));
                last_err = Some(err);
            }
        }
    }

    match (estimates.is_empty(), last_err) {
        (true, Some(err)) => Err(err),
        _ => Ok((estimates, skipped)),
    }
}

/// Ingest, weight, and estimate.
pub fn run_estimates(config: &WeightConfig) -> Result<EstimateRun, AppError> {
    let weights = run_weights(config)?;
    let (estimates, skipped) = estimate_all(&weights.ingest.table, &weights.sets)?;
    Ok(EstimateRun {
        weights,
        estimates,
        skipped,
    })
}

/// Assemble the JSON export for an estimate run.
pub fn estimates_file(config: &WeightConfig, run: &EstimateRun) -> EstimatesFile {
    EstimatesFile {
        tool: "ipw".to_string(),
        exposure: config.exposure_column.clone(),
        outcome: config.outcome_column.clone(),
        covariates: config.covariates.iter().map(|c| c.name.clone()).collect(),
        num_bins: config.num_bins,
        n_units: run.weights.ingest.table.len(),
        diagnostics: run
            .weights
            .sets
            .iter()
            .zip(&run.weights.summaries)
            .map(|(set, summary)| summary.diagnostics(set))
            .collect(),
        estimates: run.estimates.clone(),
    }
}
