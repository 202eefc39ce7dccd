//! Reporting utilities: weight diagnostics, extreme-weight rankings, and
//! formatted terminal output.

pub mod format;

pub use format::*;

use crate::domain::{UnitTable, WeightSet};
use crate::io::WeightDiagnostics;
use crate::math::{effective_sample_size, mean, sample_sd};

/// Distribution summary of one weight set, computed over finite weights.
#[derive(Debug, Clone)]
pub struct WeightSummary {
    pub n: usize,
    pub n_finite: usize,
    pub mean: f64,
    pub sd: f64,
    pub min: f64,
    pub max: f64,
    pub effective_sample_size: f64,
    pub violations: usize,
    /// Units per bin, quantile-bin weights only.
    pub bin_counts: Option<Vec<usize>>,
}

/// One row of the extreme-weight table.
#[derive(Debug, Clone)]
pub struct RankedWeight {
    pub id: String,
    pub exposure: f64,
    pub bin: Option<usize>,
    pub weight: f64,
}

pub fn summarize_weights(set: &WeightSet) -> WeightSummary {
    let finite: Vec<f64> = set.values().into_iter().filter(|v| v.is_finite()).collect();
    let (min, max) = finite
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| (lo.min(v), hi.max(v)));

    let bin_counts = set.bins.as_ref().map(|bins| {
        let k = bins.iter().copied().max().unwrap_or(0);
        let mut counts = vec![0usize; k];
        for &b in bins {
            counts[b - 1] += 1;
        }
        counts
    });

    WeightSummary {
        n: set.weights.len(),
        n_finite: finite.len(),
        mean: mean(&finite),
        sd: sample_sd(&finite),
        min,
        max,
        effective_sample_size: effective_sample_size(&finite),
        violations: set.violations.len(),
        bin_counts,
    }
}

impl WeightSummary {
    pub fn diagnostics(&self, set: &WeightSet) -> WeightDiagnostics {
        WeightDiagnostics {
            method: set.method,
            mean: self.mean,
            max: self.max,
            effective_sample_size: self.effective_sample_size,
            positivity_violations: self.violations,
        }
    }
}

/// Largest weights first; infinite weights (positivity violations) lead.
pub fn rank_extreme_weights(table: &UnitTable, set: &WeightSet, top_n: usize) -> Vec<RankedWeight> {
    let mut rows: Vec<RankedWeight> = table
        .units()
        .iter()
        .zip(&set.weights)
        .enumerate()
        .map(|(i, (unit, w))| RankedWeight {
            id: unit.id.clone(),
            exposure: unit.exposure,
            bin: set.bins.as_ref().map(|b| b[i]),
            weight: w.value,
        })
        .collect();
    rows.sort_by(|a, b| b.weight.partial_cmp(&a.weight).unwrap_or(std::cmp::Ordering::Equal));
    rows.truncate(top_n);
    rows
}
