//! Empirical quantiles and quantile-bin assignment.
//!
//! Quantiles use linear interpolation between order statistics (Hyndman & Fan
//! type 7): for probability `p` over `n` sorted values, `h = (n - 1) p` and
//! `q = x[⌊h⌋] + (h - ⌊h⌋) (x[⌊h⌋ + 1] - x[⌊h⌋])`.
//!
//! Bins are right-closed, `(c[j-1], c[j]]`, except the first bin which is
//! `[c[0], c[1]]` so the sample minimum lands in bin 1. A value equal to an
//! interior cut point therefore always belongs to the lower bin.

use crate::error::AppError;

/// Type-7 quantile of already-sorted values.
///
/// # Panics
/// Panics if `sorted` is empty. Callers validate sample size first.
pub fn quantile_sorted(sorted: &[f64], p: f64) -> f64 {
    let n = sorted.len();
    let h = (n as f64 - 1.0) * p.clamp(0.0, 1.0);
    let lo = h.floor() as usize;
    let hi = (lo + 1).min(n - 1);
    let frac = h - lo as f64;
    sorted[lo] + frac * (sorted[hi] - sorted[lo])
}

/// Cut points at probabilities `0, 1/k, …, 1` (length `num_bins + 1`).
pub fn quantile_cut_points(values: &[f64], num_bins: usize) -> Result<Vec<f64>, AppError> {
    if num_bins == 0 {
        return Err(AppError::input("Number of exposure bins must be >= 1."));
    }
    if values.is_empty() {
        return Err(AppError::insufficient("Cannot compute quantiles of an empty sample."));
    }
    if values.iter().any(|v| !v.is_finite()) {
        return Err(AppError::input("Exposure values must be finite to compute quantiles."));
    }

    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);

    let k = num_bins as f64;
    Ok((0..=num_bins)
        .map(|j| quantile_sorted(&sorted, j as f64 / k))
        .collect())
}

/// 1-based bin for `value` given cut points from [`quantile_cut_points`].
///
/// Values outside `[c[0], c[k]]` are clamped to the first/last bin.
pub fn bin_of(value: f64, cuts: &[f64]) -> usize {
    let k = cuts.len().saturating_sub(1).max(1);
    // Number of upper edges strictly below `value`.
    let above = cuts[1..].partition_point(|&edge| edge < value);
    (above + 1).clamp(1, k)
}

/// Assign every value to its 1-based bin.
pub fn assign_bins(values: &[f64], cuts: &[f64]) -> Vec<usize> {
    values.iter().map(|&v| bin_of(v, cuts)).collect()
}
