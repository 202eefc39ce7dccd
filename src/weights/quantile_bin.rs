//! Stabilized weights from quantile-binned exposure.
//!
//! The exposure is cut at its empirical quantiles into `k` bins, a multinomial
//! model predicts the bin from `W`, and
//!
//! ```text
//! sw_i = (1 / k) / P̂(bin_i | W_i)
//! ```
//!
//! The numerator is the uniform prior over bins rather than the empirical bin
//! share, so it stays `1/k` even when ties at the cut points unbalance the bins.

use rayon::prelude::*;

use crate::domain::{StabilizedWeight, UnitTable, WeightMethod, WeightSet};
use crate::error::AppError;
use crate::math::{assign_bins, quantile_cut_points};
use crate::models::{DesignMatrix, MultinomialOptions, fit_multinomial};

/// Cut points and per-value bin assignment.
#[derive(Debug, Clone)]
pub struct QuantileBins {
    /// `k + 1` non-decreasing cut points.
    pub cuts: Vec<f64>,
    /// 1-based bin per value, in input order.
    pub bins: Vec<usize>,
}

impl QuantileBins {
    pub fn num_bins(&self) -> usize {
        self.cuts.len() - 1
    }

    /// Units per bin (index 0 is bin 1).
    pub fn counts(&self) -> Vec<usize> {
        let mut counts = vec![0; self.num_bins()];
        for &b in &self.bins {
            counts[b - 1] += 1;
        }
        counts
    }
}

/// Cut `values` at `k` equally spaced quantile levels and assign bins.
pub fn quantile_bins(values: &[f64], num_bins: usize) -> Result<QuantileBins, AppError> {
    let cuts = quantile_cut_points(values, num_bins)?;
    if cuts.windows(2).any(|w| w[0] == w[1]) {
        log::warn!("Exposure quantile cut points are not unique; some bins will be empty.");
    }
    let bins = assign_bins(values, &cuts);
    Ok(QuantileBins { cuts, bins })
}

/// Compute one quantile-bin stabilized weight per unit, in input order.
pub fn compute_quantile_bin_weights(table: &UnitTable, num_bins: usize) -> Result<WeightSet, AppError> {
    compute_quantile_bin_weights_with(table, num_bins, &MultinomialOptions::default())
}

/// [`compute_quantile_bin_weights`] with explicit classifier options.
pub fn compute_quantile_bin_weights_with(
    table: &UnitTable,
    num_bins: usize,
    opts: &MultinomialOptions,
) -> Result<WeightSet, AppError> {
    let n = table.len();
    if n < 2 {
        return Err(AppError::insufficient(format!(
            "Quantile-bin weights need at least 2 units (got {n})."
        )));
    }

    let binned = quantile_bins(&table.exposures(), num_bins)?;
    log::debug!("Exposure cut points: {:?}", binned.cuts);
    log::debug!("Units per bin: {:?}", binned.counts());

    let design = DesignMatrix::build(table, true)?;
    let model = fit_multinomial(&design, &binned.bins, opts)?;

    let numerator = 1.0 / num_bins as f64;
    let weights: Vec<StabilizedWeight> = (0..n)
        .into_par_iter()
        .map(|i| {
            let den = model.probability_of(&design.row(i), binned.bins[i]);
            StabilizedWeight::from_ratio(numerator, den)
        })
        .collect();

    Ok(WeightSet::new(WeightMethod::QuantileBin, weights, Some(binned.bins)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{CovariateSpec, CovariateValue, Unit};

    fn table(a: &[f64], sex: &[&str]) -> UnitTable {
        let units = a
            .iter()
            .zip(sex)
            .enumerate()
            .map(|(i, (&a, s))| Unit {
                id: format!("u{i}"),
                exposure: a,
                outcome: 0,
                covariates: vec![CovariateValue::Categorical(s.to_string())],
            })
            .collect();
        UnitTable::new(vec![CovariateSpec::categorical("sex")], units).unwrap()
    }

    #[test]
    fn two_bins_with_uninformative_covariate() {
        let t = table(&[1.0, 2.0, 3.0, 4.0], &["f", "f", "f", "f"]);
        let set = compute_quantile_bin_weights(&t, 2).unwrap();
        assert_eq!(set.bins.as_deref(), Some(&[1, 1, 2, 2][..]));
        for w in &set.weights {
            assert!((w.value - 1.0).abs() < 1e-12, "weight {}", w.value);
            assert!((w.numerator - 0.5).abs() < 1e-15);
        }
    }

    #[test]
    fn categorical_covariate_weights_are_inverse_cell_shares() {
        // Sex "m" sits mostly in the upper bin; stratum shares are exact MLEs
        // for a saturated single-factor model.
        let a = [1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0];
        let sex = ["f", "f", "f", "m", "f", "m", "m", "m"];
        let set = compute_quantile_bin_weights(&table(&a, &sex), 2).unwrap();
        let bins = set.bins.clone().unwrap();
        assert_eq!(bins, vec![1, 1, 1, 1, 2, 2, 2, 2]);
        // f: 3 in bin 1, 1 in bin 2; m: 1 in bin 1, 3 in bin 2.
        let expected = [
            0.5 / 0.75,
            0.5 / 0.75,
            0.5 / 0.75,
            0.5 / 0.25,
            0.5 / 0.25,
            0.5 / 0.75,
            0.5 / 0.75,
            0.5 / 0.75,
        ];
        for (w, e) in set.weights.iter().zip(expected) {
            assert!((w.value - e).abs() < 1e-6, "got {}, expected {e}", w.value);
        }
        let mean: f64 = set.values().iter().sum::<f64>() / 8.0;
        assert!((mean - 1.0).abs() < 0.35);
    }

    #[test]
    fn counts_cover_all_units() {
        let a: Vec<f64> = (0..50).map(|i| i as f64 * 1.3).collect();
        let b = quantile_bins(&a, 10).unwrap();
        let counts = b.counts();
        assert_eq!(counts.len(), 10);
        assert_eq!(counts.iter().sum::<usize>(), 50);
        assert!(counts.iter().all(|&c| c > 0));
    }

    #[test]
    fn separated_bins_fail_instead_of_defaulting() {
        let t = table(&[1.0, 2.0, 3.0, 4.0], &["f", "f", "m", "m"]);
        let err = compute_quantile_bin_weights(&t, 2).unwrap_err();
        assert_eq!(err.exit_code(), crate::error::EXIT_FIT);
    }
}
