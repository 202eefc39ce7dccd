//! Multinomial logistic regression (reference-class softmax).
//!
//! For `K` observed classes and a design row `x`, the model is
//!
//! ```text
//! P(class = c_k | x) = exp(x^T β_k) / Σ_j exp(x^T β_j),   β_0 = 0
//! ```
//!
//! Fitting is Newton-Raphson on the log-likelihood with step halving:
//! - warm start: intercepts at the empirical log-odds against the reference
//!   class, slopes at zero (this is already the MLE of an intercept-only model)
//! - stop when the relative deviance change drops below `tol`
//! - fail (never fall back) when the information matrix is singular, the
//!   coefficients diverge, the deviance collapses to ~0, or the iteration cap
//!   is reached; these are the symptoms of (quasi-)complete separation

use nalgebra::{DMatrix, DVector};

use crate::error::AppError;
use crate::math::log_sum_exp;
use crate::models::design::DesignMatrix;

/// Deviance at which every unit is fitted with probability ~1 (complete separation).
const SEPARATION_DEVIANCE: f64 = 1e-6;

/// Fitted probabilities within this distance of 0 or 1 are reported.
const EXTREME_PROB: f64 = 1e-12;

#[derive(Debug, Clone)]
pub struct MultinomialOptions {
    pub max_iter: usize,
    /// Relative deviance change threshold.
    pub tol: f64,
    /// Any coefficient beyond this magnitude is treated as divergence.
    pub max_abs_coef: f64,
    pub max_halvings: usize,
}

impl Default for MultinomialOptions {
    fn default() -> Self {
        Self {
            max_iter: 100,
            tol: 1e-8,
            max_abs_coef: 1e4,
            max_halvings: 30,
        }
    }
}

#[derive(Debug, Clone)]
pub struct MultinomialFit {
    /// Modeled class labels, sorted; `classes[0]` is the reference.
    pub classes: Vec<usize>,
    pub columns: Vec<String>,
    /// `p x (K - 1)`; column `k - 1` holds `β_k`.
    pub coefficients: DMatrix<f64>,
    pub deviance: f64,
    pub iterations: usize,
}

impl MultinomialFit {
    /// Linear predictors for all `K` classes (reference fixed at 0).
    pub fn linear_predictors(&self, row: &[f64]) -> Vec<f64> {
        let mut eta = Vec::with_capacity(self.classes.len());
        eta.push(0.0);
        for k in 0..self.coefficients.ncols() {
            let col = self.coefficients.column(k);
            eta.push(row.iter().zip(col.iter()).map(|(x, b)| x * b).sum());
        }
        eta
    }

    /// Class probabilities in `classes` order.
    pub fn predict_proba(&self, row: &[f64]) -> Vec<f64> {
        softmax(&self.linear_predictors(row))
    }

    /// Predicted probability of `label`; `0.0` for a label that was never observed.
    pub fn probability_of(&self, row: &[f64], label: usize) -> f64 {
        match self.classes.binary_search(&label) {
            Ok(k) => self.predict_proba(row)[k],
            Err(_) => 0.0,
        }
    }
}

fn softmax(eta: &[f64]) -> Vec<f64> {
    let lse = log_sum_exp(eta);
    eta.iter().map(|e| (e - lse).exp()).collect()
}

pub fn fit_multinomial(
    design: &DesignMatrix,
    labels: &[usize],
    opts: &MultinomialOptions,
) -> Result<MultinomialFit, AppError> {
    let n = design.nrows();
    let p = design.ncols();
    if labels.len() != n {
        return Err(AppError::input(format!(
            "Got {} class labels for {n} design rows.",
            labels.len()
        )));
    }
    if n == 0 {
        return Err(AppError::insufficient("Cannot fit a multinomial model with no units."));
    }

    let mut classes: Vec<usize> = labels.to_vec();
    classes.sort_unstable();
    classes.dedup();
    let k = classes.len();

    let class_idx: Vec<usize> = labels
        .iter()
        .map(|l| classes.binary_search(l).unwrap_or(0))
        .collect();

    let mut counts = vec![0usize; k];
    for &c in &class_idx {
        counts[c] += 1;
    }

    let m = k - 1;
    let mut beta = DMatrix::<f64>::zeros(p, m);
    if m == 0 {
        return Ok(MultinomialFit {
            classes,
            columns: design.columns.clone(),
            coefficients: beta,
            deviance: 0.0,
            iterations: 0,
        });
    }

    if design.has_intercept() {
        for j in 0..m {
            beta[(0, j)] = (counts[j + 1] as f64 / counts[0] as f64).ln();
        }
    }

    let mut probs = class_probabilities(&design.x, &beta);
    let mut dev = deviance(&probs, &class_idx);

    for iter in 1..=opts.max_iter {
        let (grad, info) = score_and_information(&design.x, &probs, &class_idx, m);

        let step = info.cholesky().map(|c| c.solve(&grad)).ok_or_else(|| {
            AppError::fit(format!(
                "Multinomial exposure model: singular information matrix at iteration {iter} (possible separation)."
            ))
        })?;
        let step = DMatrix::from_column_slice(p, m, step.as_slice());

        let mut scale = 1.0;
        let mut trial = &beta + &step * scale;
        let mut trial_probs = class_probabilities(&design.x, &trial);
        let mut trial_dev = deviance(&trial_probs, &class_idx);
        let mut halvings = 0;
        while !(trial_dev.is_finite() && trial_dev <= dev) && halvings < opts.max_halvings {
            scale *= 0.5;
            trial = &beta + &step * scale;
            trial_probs = class_probabilities(&design.x, &trial);
            trial_dev = deviance(&trial_probs, &class_idx);
            halvings += 1;
        }
        if !trial_dev.is_finite() {
            return Err(AppError::fit(format!(
                "Multinomial exposure model: non-finite deviance at iteration {iter}."
            )));
        }

        let change = (dev - trial_dev).abs() / (trial_dev.abs() + 0.1);
        log::debug!(
            "Multinomial iter {iter}: deviance {dev:.8e} -> {trial_dev:.8e} (halvings={halvings})"
        );

        beta = trial;
        probs = trial_probs;
        dev = trial_dev;

        if beta.iter().any(|b| !b.is_finite() || b.abs() > opts.max_abs_coef) {
            return Err(AppError::fit(format!(
                "Multinomial exposure model diverged at iteration {iter} (coefficient magnitude > {}); check for perfect separation.",
                opts.max_abs_coef
            )));
        }

        if dev < SEPARATION_DEVIANCE {
            return Err(AppError::fit(format!(
                "Multinomial exposure model: deviance {dev:.3e} at iteration {iter}; classes are perfectly separated by the covariates."
            )));
        }

        if change < opts.tol {
            let extreme = probs
                .iter()
                .filter(|&&q| q < EXTREME_PROB || q > 1.0 - EXTREME_PROB)
                .count();
            if extreme > 0 {
                log::warn!(
                    "Multinomial exposure model: {extreme} fitted probabilities numerically 0 or 1"
                );
            }
            log::info!("Multinomial exposure model converged: K={k}, p={p}, iterations={iter}, deviance={dev:.4}");
            return Ok(MultinomialFit {
                classes,
                columns: design.columns.clone(),
                coefficients: beta,
                deviance: dev,
                iterations: iter,
            });
        }
    }

    Err(AppError::fit(format!(
        "Multinomial exposure model did not converge in {} iterations (last deviance {dev:.6e}); check for perfect separation.",
        opts.max_iter
    )))
}

/// `n x K` class probabilities.
fn class_probabilities(x: &DMatrix<f64>, beta: &DMatrix<f64>) -> DMatrix<f64> {
    let n = x.nrows();
    let m = beta.ncols();
    let eta = x * beta;
    let mut probs = DMatrix::<f64>::zeros(n, m + 1);
    let mut row = vec![0.0; m + 1];
    for i in 0..n {
        row[0] = 0.0;
        for j in 0..m {
            row[j + 1] = eta[(i, j)];
        }
        let lse = log_sum_exp(&row);
        for (j, e) in row.iter().enumerate() {
            probs[(i, j)] = (e - lse).exp();
        }
    }
    probs
}

fn deviance(probs: &DMatrix<f64>, class_idx: &[usize]) -> f64 {
    -2.0 * class_idx
        .iter()
        .enumerate()
        .map(|(i, &c)| probs[(i, c)].ln())
        .sum::<f64>()
}

/// Score vector and observed information, parameters stacked class by class.
fn score_and_information(
    x: &DMatrix<f64>,
    probs: &DMatrix<f64>,
    class_idx: &[usize],
    m: usize,
) -> (DVector<f64>, DMatrix<f64>) {
    let n = x.nrows();
    let p = x.ncols();
    let mut grad = DVector::<f64>::zeros(p * m);
    let mut info = DMatrix::<f64>::zeros(p * m, p * m);

    for a in 0..m {
        let ka = a + 1;
        let resid = DVector::from_fn(n, |i, _| {
            let y = if class_idx[i] == ka { 1.0 } else { 0.0 };
            y - probs[(i, ka)]
        });
        let g = x.transpose() * resid;
        grad.rows_mut(a * p, p).copy_from(&g);

        for b in a..m {
            let kb = b + 1;
            let mut scaled = x.clone();
            for i in 0..n {
                let pa = probs[(i, ka)];
                let w = if a == b { pa * (1.0 - pa) } else { -pa * probs[(i, kb)] };
                scaled.row_mut(i).scale_mut(w);
            }
            let block = x.transpose() * scaled;
            info.view_mut((a * p, b * p), (p, p)).copy_from(&block);
            if a != b {
                info.view_mut((b * p, a * p), (p, p)).copy_from(&block.transpose());
            }
        }
    }

    (grad, info)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn design_with_slope(w: &[f64]) -> DesignMatrix {
        let n = w.len();
        let mut x = DMatrix::<f64>::zeros(n, 2);
        for (i, v) in w.iter().enumerate() {
            x[(i, 0)] = 1.0;
            x[(i, 1)] = *v;
        }
        DesignMatrix {
            x,
            columns: vec!["(Intercept)".into(), "w".into()],
            dropped: vec![],
        }
    }

    #[test]
    fn intercept_only_matches_empirical_proportions() {
        let d = DesignMatrix::intercept_only(6);
        let labels = [1, 1, 1, 2, 2, 3];
        let fit = fit_multinomial(&d, &labels, &MultinomialOptions::default()).unwrap();
        let p = fit.predict_proba(&[1.0]);
        assert!((p[0] - 0.5).abs() < 1e-12);
        assert!((p[1] - 2.0 / 6.0).abs() < 1e-12);
        assert!((p[2] - 1.0 / 6.0).abs() < 1e-12);
        assert_eq!(fit.classes, vec![1, 2, 3]);
    }

    #[test]
    fn unobserved_label_has_zero_probability() {
        let d = DesignMatrix::intercept_only(4);
        let fit = fit_multinomial(&d, &[1, 1, 3, 3], &MultinomialOptions::default()).unwrap();
        assert_eq!(fit.probability_of(&[1.0], 2), 0.0);
        assert!((fit.probability_of(&[1.0], 3) - 0.5).abs() < 1e-12);
    }

    #[test]
    fn informative_covariate_shifts_probabilities() {
        // Overlapping but informative: higher w makes class 2 more likely.
        let w = [-2.0, -1.5, -1.0, -0.5, 0.0, 0.5, 0.0, 0.5, 1.0, 1.5, 2.0, -0.5];
        let labels = [1, 1, 1, 1, 1, 2, 2, 1, 2, 2, 2, 2];
        let d = design_with_slope(&w);
        let fit = fit_multinomial(&d, &labels, &MultinomialOptions::default()).unwrap();
        assert!(fit.coefficients[(1, 0)] > 0.0);
        let lo = fit.predict_proba(&[1.0, -2.0]);
        let hi = fit.predict_proba(&[1.0, 2.0]);
        assert!(hi[1] > lo[1]);
        assert!((lo.iter().sum::<f64>() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn perfect_separation_is_an_error() {
        let w = [-3.0, -2.0, -1.0, 1.0, 2.0, 3.0];
        let labels = [1, 1, 1, 2, 2, 2];
        let d = design_with_slope(&w);
        let err = fit_multinomial(&d, &labels, &MultinomialOptions::default()).unwrap_err();
        assert_eq!(err.exit_code(), crate::error::EXIT_FIT);
    }

    #[test]
    fn single_class_is_trivial() {
        let d = DesignMatrix::intercept_only(3);
        let fit = fit_multinomial(&d, &[4, 4, 4], &MultinomialOptions::default()).unwrap();
        assert_eq!(fit.predict_proba(&[1.0]), vec![1.0]);
    }
}
