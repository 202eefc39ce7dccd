//! Influence-curve based inference for an injected TMLE estimator.
//!
//! TMLE fitting (outcome learner, exposure density, targeting step) lives
//! outside this crate. An implementation of [`ShiftEstimator`] receives the
//! unit table and the role of each column and returns a point estimate plus
//! one influence-curve value per unit. Standard errors and intervals are
//! always computed here, from the influence curve:
//!
//! ```text
//! se = sd(IC) / sqrt(n)
//! ```

use crate::domain::{Estimate, EstimateMethod, UnitTable};
use crate::error::AppError;
use crate::math::sample_sd;

/// Which table columns play the `W`, `A`, `Y` nodes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeRoles {
    pub w: Vec<String>,
    pub a: String,
    pub y: String,
}

impl NodeRoles {
    /// Every schema covariate as `W`.
    pub fn from_table(table: &UnitTable, a: impl Into<String>, y: impl Into<String>) -> Self {
        Self {
            w: table.schema().iter().map(|s| s.name.clone()).collect(),
            a: a.into(),
            y: y.into(),
        }
    }
}

/// Raw output of an external estimator.
#[derive(Debug, Clone)]
pub struct InfluenceFit {
    pub point_estimate: f64,
    /// One value per unit, in table order.
    pub influence: Vec<f64>,
}

/// An opaque estimator of a shift-intervention parameter.
pub trait ShiftEstimator {
    fn estimate(&self, table: &UnitTable, roles: &NodeRoles) -> Result<InfluenceFit, AppError>;
}

/// Turn an influence-curve fit into an [`Estimate`] with a 95% Wald interval.
pub fn estimate_from_influence(method: EstimateMethod, fit: &InfluenceFit) -> Result<Estimate, AppError> {
    let n = fit.influence.len();
    if n < 2 {
        return Err(AppError::insufficient(format!(
            "Influence curve needs at least 2 values (got {n})."
        )));
    }
    if !fit.point_estimate.is_finite() || fit.influence.iter().any(|v| !v.is_finite()) {
        return Err(AppError::fit("Estimator returned non-finite estimate or influence values."));
    }
    let se = sample_sd(&fit.influence) / (n as f64).sqrt();
    Ok(Estimate::with_wald_interval(method, fit.point_estimate, se, n))
}

/// Run `estimator` on `table` and derive inference from its influence curve.
pub fn run_shift_estimator<E: ShiftEstimator + ?Sized>(
    estimator: &E,
    table: &UnitTable,
    roles: &NodeRoles,
) -> Result<Estimate, AppError> {
    let fit = estimator.estimate(table, roles)?;
    if fit.influence.len() != table.len() {
        return Err(AppError::fit(format!(
            "Estimator returned {} influence values for {} units.",
            fit.influence.len(),
            table.len()
        )));
    }
    estimate_from_influence(EstimateMethod::TmleShift, &fit)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{CovariateSpec, CovariateValue, Unit};

    /// Sample mean of `Y`; its influence curve is `Y - mean`.
    struct MeanOutcome;

    impl ShiftEstimator for MeanOutcome {
        fn estimate(&self, table: &UnitTable, _roles: &NodeRoles) -> Result<InfluenceFit, AppError> {
            let y = table.outcomes();
            let m = y.iter().sum::<f64>() / y.len() as f64;
            Ok(InfluenceFit {
                point_estimate: m,
                influence: y.iter().map(|v| v - m).collect(),
            })
        }
    }

    struct ShortInfluence;

    impl ShiftEstimator for ShortInfluence {
        fn estimate(&self, _table: &UnitTable, _roles: &NodeRoles) -> Result<InfluenceFit, AppError> {
            Ok(InfluenceFit {
                point_estimate: 0.0,
                influence: vec![0.1],
            })
        }
    }

    fn table() -> UnitTable {
        let units = [0u8, 1, 1, 0, 1]
            .iter()
            .enumerate()
            .map(|(i, &y)| Unit {
                id: format!("u{i}"),
                exposure: i as f64,
                outcome: y,
                covariates: vec![CovariateValue::Continuous(i as f64 * 0.5)],
            })
            .collect();
        UnitTable::new(vec![CovariateSpec::continuous("age")], units).unwrap()
    }

    #[test]
    fn se_is_sd_of_influence_over_root_n() {
        let t = table();
        let roles = NodeRoles::from_table(&t, "sbp", "death");
        assert_eq!(roles.w, vec!["age"]);
        let est = run_shift_estimator(&MeanOutcome, &t, &roles).unwrap();
        assert!((est.estimate - 0.6).abs() < 1e-12);
        let ic = [-0.6, 0.4, 0.4, -0.6, 0.4];
        let expected = sample_sd(&ic) / 5f64.sqrt();
        assert!((est.std_error - expected).abs() < 1e-12);
        assert_eq!(est.method, EstimateMethod::TmleShift);
        assert_eq!(est.n, 5);
    }

    #[test]
    fn influence_length_must_match_table() {
        let t = table();
        let roles = NodeRoles::from_table(&t, "sbp", "death");
        assert!(run_shift_estimator(&ShortInfluence, &t, &roles).is_err());
    }
}
