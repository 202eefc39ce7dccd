//! Read/write estimate JSON files.
//!
//! The estimates file is the portable record of one `ipw estimate` run:
//! - the inputs that shaped the weights (exposure/outcome columns, bins)
//! - per-method weight diagnostics
//! - one estimate per method (log odds ratio per unit exposure)

use std::fs::File;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::domain::{Estimate, WeightMethod};
use crate::error::AppError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeightDiagnostics {
    pub method: WeightMethod,
    pub mean: f64,
    pub max: f64,
    pub effective_sample_size: f64,
    pub positivity_violations: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EstimatesFile {
    pub tool: String,
    pub exposure: String,
    pub outcome: String,
    pub covariates: Vec<String>,
    pub num_bins: usize,
    pub n_units: usize,
    pub diagnostics: Vec<WeightDiagnostics>,
    pub estimates: Vec<Estimate>,
}

/// Write an estimates JSON file.
pub fn write_estimates_json(path: &Path, file: &EstimatesFile) -> Result<(), AppError> {
    let out = File::create(path)
        .map_err(|e| AppError::input(format!("Failed to create estimates JSON '{}': {e}", path.display())))?;
    serde_json::to_writer_pretty(out, file)
        .map_err(|e| AppError::input(format!("Failed to write estimates JSON: {e}")))
}

/// Read an estimates JSON file.
pub fn read_estimates_json(path: &Path) -> Result<EstimatesFile, AppError> {
    let file = File::open(path)
        .map_err(|e| AppError::input(format!("Failed to open estimates JSON '{}': {e}", path.display())))?;
    serde_json::from_reader(file).map_err(|e| AppError::input(format!("Invalid estimates JSON: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::EstimateMethod;

    #[test]
    fn estimates_file_reads_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("est.json");
        let file = EstimatesFile {
            tool: "ipw".into(),
            exposure: "sbp".into(),
            outcome: "death".into(),
            covariates: vec!["age".into()],
            num_bins: 10,
            n_units: 3,
            diagnostics: vec![WeightDiagnostics {
                method: WeightMethod::QuantileBin,
                mean: 1.0,
                max: 2.5,
                effective_sample_size: 2.4,
                positivity_violations: 0,
            }],
            estimates: vec![Estimate::with_wald_interval(EstimateMethod::IpwQuantileBin, 0.03, 0.01, 3)],
        };
        write_estimates_json(&path, &file).unwrap();

        let raw = std::fs::read_to_string(&path).unwrap();
        assert!(raw.contains("\"quantile-bin\""));
        assert!(raw.contains("\"ipw-quantile-bin\""));

        let back = read_estimates_json(&path).unwrap();
        assert_eq!(back.estimates.len(), 1);
        assert_eq!(back.diagnostics[0].method, WeightMethod::QuantileBin);
        assert!((back.estimates[0].ci_upper - (0.03 + Estimate::Z_95 * 0.01)).abs() < 1e-12);
    }
}
