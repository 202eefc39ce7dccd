//! Simulated exposure/outcome data with known confounding.
//!
//! Data-generating process (all draws from one seeded `StdRng`):
//!
//! ```text
//! W1 ~ N(0, 1)                     (e.g. standardized age)
//! W2 ∈ {female, male}, P(male) = ½
//! W3 ~ N(0, 1)                     (e.g. standardized severity score)
//! A  = 120 + 8 W1 + 5 [male] - 4 W3 + N(0, 12²)
//! Y  ~ Bernoulli(expit(-2 + β (A - 120)/10 + 0.6 W1 + 0.4 [male] + 0.3 W3))
//! ```
//!
//! `β` is `SimConfig::effect_per_10`, the true conditional log odds ratio per
//! 10 units of exposure.

use rand::prelude::*;
use rand::rngs::StdRng;
use rand_distr::{Bernoulli, Normal};

use crate::domain::{CovariateSpec, CovariateValue, SimConfig, Unit, UnitTable};
use crate::error::AppError;
use crate::math::expit;

pub const EXPOSURE_COLUMN: &str = "sbp";
pub const OUTCOME_COLUMN: &str = "death";

const EXPOSURE_MEAN: f64 = 120.0;
const EXPOSURE_NOISE_SD: f64 = 12.0;

/// Covariate schema of simulated tables.
pub fn sim_schema() -> Vec<CovariateSpec> {
    vec![
        CovariateSpec::continuous("age_z"),
        CovariateSpec::categorical("sex"),
        CovariateSpec::continuous("severity_z"),
    ]
}

pub fn simulate_units(config: &SimConfig) -> Result<UnitTable, AppError> {
    if config.n == 0 {
        return Err(AppError::input("Simulated sample size must be > 0."));
    }
    if !config.effect_per_10.is_finite() {
        return Err(AppError::input("Simulated effect must be finite."));
    }

    let mut rng = StdRng::seed_from_u64(config.seed);
    let std_normal = Normal::new(0.0, 1.0)
        .map_err(|e| AppError::input(format!("Covariate distribution error: {e}")))?;
    let noise = Normal::new(0.0, EXPOSURE_NOISE_SD)
        .map_err(|e| AppError::input(format!("Exposure noise distribution error: {e}")))?;
    let male_dist = Bernoulli::new(0.5)
        .map_err(|e| AppError::input(format!("Sex distribution error: {e}")))?;

    let mut units = Vec::with_capacity(config.n);
    for i in 0..config.n {
        let w1: f64 = std_normal.sample(&mut rng);
        let male = male_dist.sample(&mut rng);
        let w3: f64 = std_normal.sample(&mut rng);
        let m = if male { 1.0 } else { 0.0 };

        let a = EXPOSURE_MEAN + 8.0 * w1 + 5.0 * m - 4.0 * w3 + noise.sample(&mut rng);

        let eta = -2.0
            + config.effect_per_10 * (a - EXPOSURE_MEAN) / 10.0
            + 0.6 * w1
            + 0.4 * m
            + 0.3 * w3;
        let roll: f64 = rng.r#gen();
        let y = u8::from(roll < expit(eta));

        units.push(Unit {
            id: format!("sim-{:05}", i + 1),
            exposure: a,
            outcome: y,
            covariates: vec![
                CovariateValue::Continuous(w1),
                CovariateValue::Categorical(if male { "male" } else { "female" }.to_string()),
                CovariateValue::Continuous(w3),
            ],
        });
    }

    log::info!(
        "Simulated {} units (seed={}, effect_per_10={})",
        config.n,
        config.seed,
        config.effect_per_10
    );
    UnitTable::new(sim_schema(), units)
}
