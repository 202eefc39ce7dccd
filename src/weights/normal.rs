//! Stabilized weights from a normal exposure density.
//!
//! ```text
//! sw_i = φ(A_i; μ̂, σ̂) / φ(A_i; μ̂(W_i), σ̂_W)
//! ```
//!
//! where `(μ̂, σ̂)` come from `A ~ 1` and `(μ̂(W), σ̂_W)` from `A ~ W`.

use rayon::prelude::*;

use crate::domain::{StabilizedWeight, UnitTable, WeightMethod, WeightSet};
use crate::error::AppError;
use crate::math::normal_pdf;
use crate::models::{DesignMatrix, fit_linear};

/// Compute one normal-density stabilized weight per unit, in input order.
///
/// A unit whose conditional density underflows to zero gets an infinite weight
/// and is listed in [`WeightSet::violations`].
pub fn compute_normal_weights(table: &UnitTable) -> Result<WeightSet, AppError> {
    let n = table.len();
    if n < 2 {
        return Err(AppError::insufficient(format!(
            "Normal-density weights need at least 2 units (got {n})."
        )));
    }

    let exposure = table.exposures();

    let numerator = fit_linear(&DesignMatrix::intercept_only(n), &exposure)?;
    let design = DesignMatrix::build(table, true)?;
    let denominator = fit_linear(&design, &exposure)?;

    log::info!(
        "Normal exposure models: marginal sd={:.4}, conditional sd={:.4} ({} predictors)",
        numerator.sigma,
        denominator.sigma,
        design.ncols().saturating_sub(1)
    );

    let weights: Vec<StabilizedWeight> = (0..n)
        .into_par_iter()
        .map(|i| {
            let a = exposure[i];
            let num = normal_pdf(a, numerator.fitted[i], numerator.sigma);
            let den = normal_pdf(a, denominator.fitted[i], denominator.sigma);
            StabilizedWeight::from_ratio(num, den)
        })
        .collect();

    Ok(WeightSet::new(WeightMethod::Normal, weights, None))
}
