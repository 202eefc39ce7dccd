//! Weighted outcome regression (marginal structural model).
//!
//! Fits `logit P(Y = 1) = b0 + b1 A` on the weighted pseudo-population and
//! reports `b1` (log odds ratio per unit of exposure). The standard error is
//! the HC0 sandwich
//!
//! ```text
//! V = B^-1 M B^-1,   B = Σ w_i μ_i (1 - μ_i) x_i x_iᵀ,   M = Σ w_i² (y_i - μ_i)² x_i x_iᵀ
//! ```
//!
//! Exposure is centred internally; the slope and its variance are unchanged.

use nalgebra::{Matrix2, Vector2};

use crate::domain::{Estimate, EstimateMethod};
use crate::error::AppError;
use crate::math::{expit, mean};

const MAX_ITER: usize = 50;
const TOL: f64 = 1e-10;
const MAX_ABS_COEF: f64 = 1e4;

#[derive(Debug, Clone)]
pub struct WeightedLogisticFit {
    /// Intercept on the original (uncentred) exposure scale.
    pub intercept: f64,
    pub slope: f64,
    pub slope_se: f64,
    pub iterations: usize,
    pub n: usize,
}

impl WeightedLogisticFit {
    pub fn to_estimate(&self, method: EstimateMethod) -> Estimate {
        Estimate::with_wald_interval(method, self.slope, self.slope_se, self.n)
    }
}

/// Weighted logistic regression of `outcome` on `exposure`.
///
/// Every weight must be finite and positive; positivity violations are
/// reported as an error rather than fitted through.
pub fn fit_weighted_logistic(
    exposure: &[f64],
    outcome: &[f64],
    weights: &[f64],
) -> Result<WeightedLogisticFit, AppError> {
    let n = exposure.len();
    if outcome.len() != n || weights.len() != n {
        return Err(AppError::input(format!(
            "Outcome model inputs differ in length: exposure={n}, outcome={}, weights={}.",
            outcome.len(),
            weights.len()
        )));
    }
    if n < 3 {
        return Err(AppError::insufficient(format!(
            "Outcome model needs at least 3 units (got {n})."
        )));
    }

    let bad_weights = weights.iter().filter(|w| !(w.is_finite() && **w > 0.0)).count();
    if bad_weights > 0 {
        return Err(AppError::fit(format!(
            "{bad_weights} unit(s) have zero, infinite, or undefined weights (positivity violation); refusing to fit the outcome model."
        )));
    }
    if outcome.iter().any(|&y| y != 0.0 && y != 1.0) {
        return Err(AppError::input("Outcome must be coded 0/1."));
    }
    let events: f64 = outcome.iter().sum();
    if events == 0.0 || events == n as f64 {
        return Err(AppError::insufficient(
            "Outcome has no variation (all 0 or all 1); the odds ratio is not estimable.",
        ));
    }

    let centre = mean(exposure);
    let x: Vec<f64> = exposure.iter().map(|a| a - centre).collect();

    let mut beta = Vector2::new(0.0_f64, 0.0);
    let mut dev = weighted_deviance(&x, outcome, weights, &beta);
    let mut converged_at = None;

    for iter in 1..=MAX_ITER {
        let mut grad = Vector2::<f64>::zeros();
        let mut info = Matrix2::<f64>::zeros();
        for i in 0..n {
            let xi = Vector2::new(1.0, x[i]);
            let mu = expit(beta.dot(&xi));
            grad += xi * (weights[i] * (outcome[i] - mu));
            info += xi * xi.transpose() * (weights[i] * mu * (1.0 - mu));
        }

        let step = info
            .cholesky()
            .map(|c| c.solve(&grad))
            .ok_or_else(|| AppError::fit(format!("Outcome model: singular information at iteration {iter}.")))?;

        let mut scale = 1.0;
        let mut trial = beta + step * scale;
        let mut trial_dev = weighted_deviance(&x, outcome, weights, &trial);
        let mut halvings = 0;
        while !(trial_dev.is_finite() && trial_dev <= dev) && halvings < 30 {
            scale *= 0.5;
            trial = beta + step * scale;
            trial_dev = weighted_deviance(&x, outcome, weights, &trial);
            halvings += 1;
        }

        let change = (dev - trial_dev).abs() / (trial_dev.abs() + 0.1);
        beta = trial;
        dev = trial_dev;

        if beta.iter().any(|b| !b.is_finite() || b.abs() > MAX_ABS_COEF) {
            return Err(AppError::fit(format!(
                "Outcome model diverged at iteration {iter}; check for separation."
            )));
        }
        if change < TOL {
            converged_at = Some(iter);
            break;
        }
    }

    let iterations = converged_at.ok_or_else(|| {
        AppError::fit(format!("Outcome model did not converge in {MAX_ITER} iterations."))
    })?;

    let mut bread = Matrix2::<f64>::zeros();
    let mut meat = Matrix2::<f64>::zeros();
    for i in 0..n {
        let xi = Vector2::new(1.0, x[i]);
        let mu = expit(beta.dot(&xi));
        let xx = xi * xi.transpose();
        bread += xx * (weights[i] * mu * (1.0 - mu));
        let score = weights[i] * (outcome[i] - mu);
        meat += xx * (score * score);
    }
    let bread_inv = bread
        .try_inverse()
        .ok_or_else(|| AppError::fit("Outcome model: singular bread matrix for the robust variance."))?;
    let vcov = bread_inv * meat * bread_inv;
    let slope_se = vcov[(1, 1)].max(0.0).sqrt();

    log::info!(
        "Outcome model converged in {iterations} iterations: slope={:.6}, robust se={slope_se:.6}",
        beta[1]
    );

    Ok(WeightedLogisticFit {
        intercept: beta[0] - beta[1] * centre,
        slope: beta[1],
        slope_se,
        iterations,
        n,
    })
}

fn weighted_deviance(x: &[f64], y: &[f64], w: &[f64], beta: &Vector2<f64>) -> f64 {
    let mut ll = 0.0;
    for i in 0..x.len() {
        let mu = expit(beta[0] + beta[1] * x[i]);
        let p = if y[i] == 1.0 { mu } else { 1.0 - mu };
        ll += w[i] * p.ln();
    }
    -2.0 * ll
}
