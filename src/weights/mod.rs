//! Stabilized inverse-probability weights for a continuous exposure.
//!
//! Responsibilities:
//!
//! - normal-density weights (`normal`)
//! - quantile-bin weights (`quantile_bin`)
//! - dispatch by [`WeightMethod`] and positivity reporting

pub mod normal;
pub mod quantile_bin;

pub use normal::*;
pub use quantile_bin::*;

use crate::domain::{UnitTable, WeightMethod, WeightSet};
use crate::error::AppError;

/// Compute weights with the given policy. `num_bins` only applies to
/// [`WeightMethod::QuantileBin`].
pub fn compute_weights(table: &UnitTable, method: WeightMethod, num_bins: usize) -> Result<WeightSet, AppError> {
    let set = match method {
        WeightMethod::Normal => compute_normal_weights(table)?,
        WeightMethod::QuantileBin => compute_quantile_bin_weights(table, num_bins)?,
    };

    if set.has_violations() {
        let ids: Vec<&str> = set
            .violations
            .iter()
            .take(10)
            .map(|&i| table.units()[i].id.as_str())
            .collect();
        log::warn!(
            "{}: {} positivity violation(s) (zero denominator); first ids: {}",
            method.display_name(),
            set.violations.len(),
            ids.join(", ")
        );
    }

    Ok(set)
}
