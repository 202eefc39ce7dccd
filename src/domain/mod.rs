//! Domain types used throughout the pipeline.
//!
//! This module defines:
//!
//! - units and their covariate schema (`Unit`, `UnitTable`, `CovariateSpec`)
//! - weight outputs (`StabilizedWeight`, `WeightSet`)
//! - effect estimates and run configuration (`Estimate`, `WeightConfig`, `SimConfig`)

pub mod types;

pub use types::*;
