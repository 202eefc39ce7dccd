//! Effect estimation on top of the weights.
//!
//! - `msm`: weighted logistic outcome regression (IPW estimates)
//! - `tmle`: inference for an injected TMLE shift estimator

pub mod msm;
pub mod tmle;

pub use msm::*;
pub use tmle::*;

use crate::domain::{Estimate, UnitTable, WeightSet};
use crate::error::AppError;

/// Fit the marginal structural model for one weight set.
pub fn estimate_from_weights(table: &UnitTable, weights: &WeightSet) -> Result<Estimate, AppError> {
    let fit = fit_weighted_logistic(&table.exposures(), &table.outcomes(), &weights.values())?;
    Ok(fit.to_estimate(weights.method.into()))
}
