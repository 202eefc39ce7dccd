//! Shared domain types.
//!
//! These types are intentionally kept lightweight and serializable so they can be:
//!
//! - used in-memory during weighting and outcome fitting
//! - exported to CSV/JSON
//! - compared across methods in a single report

use std::path::PathBuf;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// Default number of exposure quantile bins.
pub const DEFAULT_NUM_BINS: usize = 10;

/// How a covariate column is encoded in the exposure models.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CovariateKind {
    /// Entered as a single numeric column.
    Continuous,
    /// Dummy-coded against its first level in sorted order.
    Categorical,
}

/// Name and encoding of one confounder column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CovariateSpec {
    pub name: String,
    pub kind: CovariateKind,
}

impl CovariateSpec {
    pub fn continuous(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: CovariateKind::Continuous,
        }
    }

    pub fn categorical(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: CovariateKind::Categorical,
        }
    }
}

/// One observed confounder value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum CovariateValue {
    Continuous(f64),
    Categorical(String),
}

impl CovariateValue {
    pub fn kind(&self) -> CovariateKind {
        match self {
            CovariateValue::Continuous(_) => CovariateKind::Continuous,
            CovariateValue::Categorical(_) => CovariateKind::Categorical,
        }
    }
}

/// A single observational record: exposure `A`, confounders `W`, outcome `Y`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Unit {
    pub id: String,
    /// Continuous exposure value `A`.
    pub exposure: f64,
    /// Binary outcome `Y` (0 or 1).
    pub outcome: u8,
    /// Confounders in schema order.
    pub covariates: Vec<CovariateValue>,
}

/// A complete-case table of units plus the covariate schema they follow.
///
/// Construct through [`UnitTable::new`], which checks every unit against the
/// schema so downstream fitting code can index covariates without rechecking.
#[derive(Debug, Clone)]
pub struct UnitTable {
    schema: Vec<CovariateSpec>,
    units: Vec<Unit>,
}

impl UnitTable {
    pub fn new(schema: Vec<CovariateSpec>, units: Vec<Unit>) -> Result<Self, AppError> {
        for unit in &units {
            if !unit.exposure.is_finite() {
                return Err(AppError::input(format!(
                    "Unit '{}' has a non-finite exposure.",
                    unit.id
                )));
            }
            if unit.outcome > 1 {
                return Err(AppError::input(format!(
                    "Unit '{}' has outcome {} (expected 0 or 1).",
                    unit.id, unit.outcome
                )));
            }
            if unit.covariates.len() != schema.len() {
                return Err(AppError::input(format!(
                    "Unit '{}' has {} covariates, schema expects {}.",
                    unit.id,
                    unit.covariates.len(),
                    schema.len()
                )));
            }
            for (spec, value) in schema.iter().zip(&unit.covariates) {
                if spec.kind != value.kind() {
                    return Err(AppError::input(format!(
                        "Unit '{}': covariate `{}` expected {:?}, got {:?}.",
                        unit.id,
                        spec.name,
                        spec.kind,
                        value.kind()
                    )));
                }
                if let CovariateValue::Continuous(v) = value {
                    if !v.is_finite() {
                        return Err(AppError::input(format!(
                            "Unit '{}': covariate `{}` is not finite.",
                            unit.id, spec.name
                        )));
                    }
                }
            }
        }
        Ok(Self { schema, units })
    }

    pub fn schema(&self) -> &[CovariateSpec] {
        &self.schema
    }

    pub fn units(&self) -> &[Unit] {
        &self.units
    }

    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    pub fn exposures(&self) -> Vec<f64> {
        self.units.iter().map(|u| u.exposure).collect()
    }

    pub fn outcomes(&self) -> Vec<f64> {
        self.units.iter().map(|u| u.outcome as f64).collect()
    }
}

/// Which density-ratio policy produced a set of weights.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum WeightMethod {
    /// Normal density of `A` given `W` (linear model) vs marginal normal density.
    Normal,
    /// Multinomial probability of the unit's exposure quantile bin vs `1/k`.
    QuantileBin,
}

impl WeightMethod {
    pub fn display_name(self) -> &'static str {
        match self {
            WeightMethod::Normal => "IPW (normal density)",
            WeightMethod::QuantileBin => "IPW (quantile bins)",
        }
    }
}

/// Which estimator produced an [`Estimate`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EstimateMethod {
    IpwNormal,
    IpwQuantileBin,
    TmleShift,
}

impl EstimateMethod {
    pub fn display_name(self) -> &'static str {
        match self {
            EstimateMethod::IpwNormal => "IPW normal",
            EstimateMethod::IpwQuantileBin => "IPW quantile-bin",
            EstimateMethod::TmleShift => "TMLE shift",
        }
    }
}

impl From<WeightMethod> for EstimateMethod {
    fn from(value: WeightMethod) -> Self {
        match value {
            WeightMethod::Normal => EstimateMethod::IpwNormal,
            WeightMethod::QuantileBin => EstimateMethod::IpwQuantileBin,
        }
    }
}

/// Per-unit stabilized weight together with the two terms of its ratio.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StabilizedWeight {
    /// Marginal density (normal method) or `1/k` (bin method).
    pub numerator: f64,
    /// Conditional density or predicted probability of the unit's own bin.
    pub denominator: f64,
    /// `numerator / denominator`; `f64::INFINITY` when the denominator is zero.
    pub value: f64,
}

impl StabilizedWeight {
    pub fn from_ratio(numerator: f64, denominator: f64) -> Self {
        let value = if denominator > 0.0 {
            numerator / denominator
        } else {
            f64::INFINITY
        };
        Self {
            numerator,
            denominator,
            value,
        }
    }

    /// True when the weight cannot be used in a weighted outcome model.
    pub fn is_positivity_violation(&self) -> bool {
        !(self.value.is_finite() && self.value > 0.0)
    }
}

/// All weights of one method for one table, in input order.
#[derive(Debug, Clone)]
pub struct WeightSet {
    pub method: WeightMethod,
    pub weights: Vec<StabilizedWeight>,
    /// Exposure bin (1-based) per unit; only for [`WeightMethod::QuantileBin`].
    pub bins: Option<Vec<usize>>,
    /// Indices of units whose weight is zero, infinite, or NaN.
    pub violations: Vec<usize>,
}

impl WeightSet {
    pub fn new(method: WeightMethod, weights: Vec<StabilizedWeight>, bins: Option<Vec<usize>>) -> Self {
        let violations = weights
            .iter()
            .enumerate()
            .filter(|(_, w)| w.is_positivity_violation())
            .map(|(i, _)| i)
            .collect();
        Self {
            method,
            weights,
            bins,
            violations,
        }
    }

    pub fn values(&self) -> Vec<f64> {
        self.weights.iter().map(|w| w.value).collect()
    }

    pub fn has_violations(&self) -> bool {
        !self.violations.is_empty()
    }
}

/// A scalar causal-effect estimate (log odds ratio) with its uncertainty.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Estimate {
    pub method: EstimateMethod,
    pub estimate: f64,
    pub std_error: f64,
    pub ci_lower: f64,
    pub ci_upper: f64,
    pub n: usize,
}

impl Estimate {
    /// Two-sided 95% normal quantile.
    pub const Z_95: f64 = 1.959_963_984_540_054;

    pub fn with_wald_interval(method: EstimateMethod, estimate: f64, std_error: f64, n: usize) -> Self {
        Self {
            method,
            estimate,
            std_error,
            ci_lower: estimate - Self::Z_95 * std_error,
            ci_upper: estimate + Self::Z_95 * std_error,
            n,
        }
    }

    pub fn odds_ratio(&self) -> f64 {
        self.estimate.exp()
    }
}

/// A full run's configuration as understood by the pipeline.
///
/// This is derived from CLI flags (plus defaults).
#[derive(Debug, Clone)]
pub struct WeightConfig {
    pub csv_path: PathBuf,
    pub id_column: Option<String>,
    pub exposure_column: String,
    pub outcome_column: String,
    pub covariates: Vec<CovariateSpec>,
    pub methods: Vec<WeightMethod>,
    pub num_bins: usize,
    pub export_weights: Option<PathBuf>,
    pub export_estimates: Option<PathBuf>,
}

/// Parameters of the simulated data-generating process.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimConfig {
    pub n: usize,
    pub seed: u64,
    /// True log odds ratio per 10 units of exposure.
    pub effect_per_10: f64,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            n: 1000,
            seed: 42,
            effect_per_10: 0.3,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit(id: &str, a: f64, w: Vec<CovariateValue>) -> Unit {
        Unit {
            id: id.to_string(),
            exposure: a,
            outcome: 0,
            covariates: w,
        }
    }

    #[test]
    fn table_rejects_schema_mismatch() {
        let schema = vec![CovariateSpec::continuous("age")];
        let units = vec![unit("u1", 1.0, vec![CovariateValue::Categorical("x".into())])];
        let err = UnitTable::new(schema, units).unwrap_err();
        assert_eq!(err.exit_code(), crate::error::EXIT_INPUT);
    }

    #[test]
    fn table_rejects_non_binary_outcome() {
        let mut u = unit("u1", 1.0, vec![]);
        u.outcome = 2;
        assert!(UnitTable::new(vec![], vec![u]).is_err());
    }

    #[test]
    fn zero_denominator_is_flagged() {
        let w = StabilizedWeight::from_ratio(0.3, 0.0);
        assert!(w.value.is_infinite());
        assert!(w.is_positivity_violation());

        let set = WeightSet::new(
            WeightMethod::Normal,
            vec![StabilizedWeight::from_ratio(1.0, 2.0), w],
            None,
        );
        assert_eq!(set.violations, vec![1]);
    }

    #[test]
    fn wald_interval_is_symmetric() {
        let e = Estimate::with_wald_interval(EstimateMethod::IpwNormal, 0.5, 0.1, 100);
        assert!(((e.ci_upper - e.estimate) - (e.estimate - e.ci_lower)).abs() < 1e-12);
        assert!((e.odds_ratio() - 0.5f64.exp()).abs() < 1e-12);
    }
}
