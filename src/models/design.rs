//! Design matrix construction for exposure models.
//!
//! Encoding rules:
//! - optional intercept column first, named `(Intercept)`
//! - continuous covariates enter as-is
//! - categorical covariates are dummy-coded against their first level in sorted
//!   order, one column per remaining level, named `name=level`
//!
//! Columns that are linearly dependent on earlier columns (for example a
//! constant covariate next to the intercept, or a categorical with a single
//! observed level) are dropped before fitting. Dropping is decided by modified
//! Gram-Schmidt with a relative tolerance, so the kept matrix always has full
//! column rank and the downstream solvers never see aliased coefficients.

use std::collections::BTreeSet;

use nalgebra::{DMatrix, DVector};

use crate::domain::{CovariateKind, CovariateValue, UnitTable};
use crate::error::AppError;

pub const INTERCEPT: &str = "(Intercept)";

/// Relative residual norm below which a column counts as aliased.
const ALIAS_TOL: f64 = 1e-9;

#[derive(Debug, Clone)]
pub struct DesignMatrix {
    pub x: DMatrix<f64>,
    pub columns: Vec<String>,
    /// Encoded columns removed as linearly dependent.
    pub dropped: Vec<String>,
}

impl DesignMatrix {
    /// A single intercept column over `n` rows (covariate-free model).
    pub fn intercept_only(n: usize) -> Self {
        Self {
            x: DMatrix::from_element(n, 1, 1.0),
            columns: vec![INTERCEPT.to_string()],
            dropped: Vec::new(),
        }
    }

    /// Encode every covariate of `table`, then prune aliased columns.
    pub fn build(table: &UnitTable, intercept: bool) -> Result<Self, AppError> {
        let n = table.len();
        if n == 0 {
            return Err(AppError::insufficient("Cannot build a design matrix with no units."));
        }

        let mut raw: Vec<(String, Vec<f64>)> = Vec::new();
        if intercept {
            raw.push((INTERCEPT.to_string(), vec![1.0; n]));
        }

        for (j, spec) in table.schema().iter().enumerate() {
            match spec.kind {
                CovariateKind::Continuous => {
                    let col = table
                        .units()
                        .iter()
                        .map(|u| match &u.covariates[j] {
                            CovariateValue::Continuous(v) => *v,
                            CovariateValue::Categorical(_) => f64::NAN,
                        })
                        .collect();
                    raw.push((spec.name.clone(), col));
                }
                CovariateKind::Categorical => {
                    let levels: BTreeSet<&str> = table
                        .units()
                        .iter()
                        .filter_map(|u| match &u.covariates[j] {
                            CovariateValue::Categorical(s) => Some(s.as_str()),
                            CovariateValue::Continuous(_) => None,
                        })
                        .collect();
                    // First sorted level is the reference.
                    for level in levels.iter().skip(1) {
                        let col = table
                            .units()
                            .iter()
                            .map(|u| match &u.covariates[j] {
                                CovariateValue::Categorical(s) if s == level => 1.0,
                                _ => 0.0,
                            })
                            .collect();
                        raw.push((format!("{}={}", spec.name, level), col));
                    }
                }
            }
        }

        if raw.iter().any(|(_, col)| col.iter().any(|v: &f64| !v.is_finite())) {
            return Err(AppError::input("Design matrix contains non-finite values."));
        }

        let (kept, dropped) = prune_aliased(raw);
        if kept.is_empty() {
            return Err(AppError::fit("Design matrix has no estimable columns."));
        }
        if !dropped.is_empty() {
            log::info!("Dropped aliased design columns: {}", dropped.join(", "));
        }

        let p = kept.len();
        let mut x = DMatrix::<f64>::zeros(n, p);
        let mut columns = Vec::with_capacity(p);
        for (c, (name, col)) in kept.into_iter().enumerate() {
            for (i, v) in col.into_iter().enumerate() {
                x[(i, c)] = v;
            }
            columns.push(name);
        }

        Ok(Self { x, columns, dropped })
    }

    pub fn nrows(&self) -> usize {
        self.x.nrows()
    }

    pub fn ncols(&self) -> usize {
        self.x.ncols()
    }

    pub fn has_intercept(&self) -> bool {
        self.columns.first().is_some_and(|c| c == INTERCEPT)
    }

    pub fn row(&self, i: usize) -> Vec<f64> {
        self.x.row(i).iter().copied().collect()
    }
}

fn prune_aliased(raw: Vec<(String, Vec<f64>)>) -> (Vec<(String, Vec<f64>)>, Vec<String>) {
    let mut basis: Vec<DVector<f64>> = Vec::new();
    let mut kept = Vec::new();
    let mut dropped = Vec::new();

    for (name, col) in raw {
        let original = DVector::from_vec(col);
        let norm = original.norm();
        let mut v = original.clone();
        for q in &basis {
            let proj = q.dot(&v);
            v -= q * proj;
        }
        let resid = v.norm();
        if norm > 0.0 && resid > ALIAS_TOL * norm {
            basis.push(v / resid);
            kept.push((name, original.iter().copied().collect()));
        } else {
            dropped.push(name);
        }
    }

    (kept, dropped)
}
