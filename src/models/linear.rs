//! Ordinary least squares exposure model.
//!
//! Used for both halves of the normal-density weights:
//! - numerator: `A ~ 1` (marginal mean and sd)
//! - denominator: `A ~ W` (conditional mean and residual sd)
//!
//! The residual sd uses `n - p` degrees of freedom, matching the usual
//! regression estimator `σ̂ = sqrt(RSS / (n - p))`.

use nalgebra::DVector;

use crate::error::AppError;
use crate::math::{residual_sum_of_squares, solve_least_squares};
use crate::models::design::DesignMatrix;

#[derive(Debug, Clone)]
pub struct LinearFit {
    pub columns: Vec<String>,
    pub coefficients: Vec<f64>,
    /// Fitted conditional mean per row.
    pub fitted: Vec<f64>,
    /// Residual standard deviation.
    pub sigma: f64,
    /// Residual degrees of freedom (`n - p`).
    pub df: usize,
}

pub fn fit_linear(design: &DesignMatrix, y: &[f64]) -> Result<LinearFit, AppError> {
    let n = design.nrows();
    let p = design.ncols();
    if y.len() != n {
        return Err(AppError::input(format!(
            "Response has {} values but design has {n} rows.",
            y.len()
        )));
    }
    if n <= p {
        return Err(AppError::insufficient(format!(
            "Linear exposure model needs more units than parameters: n={n}, p={p}."
        )));
    }

    let yv = DVector::from_column_slice(y);
    let beta = solve_least_squares(&design.x, &yv)
        .ok_or_else(|| AppError::fit("Linear exposure model is too ill-conditioned to solve."))?;

    let df = n - p;
    let rss = residual_sum_of_squares(&design.x, &yv, &beta);
    let sigma = (rss / df as f64).sqrt();
    if !(sigma.is_finite() && sigma > 0.0) {
        return Err(AppError::fit(format!(
            "Linear exposure model has degenerate residual sd ({sigma}); exposure is perfectly determined by the predictors."
        )));
    }

    let fitted = (&design.x * &beta).iter().copied().collect();
    log::debug!("Linear exposure model: p={p}, df={df}, sigma={sigma:.6}");

    Ok(LinearFit {
        columns: design.columns.clone(),
        coefficients: beta.iter().copied().collect(),
        fitted,
        sigma,
        df,
    })
}
