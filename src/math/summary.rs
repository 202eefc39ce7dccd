//! Small descriptive statistics used by reports and standard errors.

/// Arithmetic mean; `NaN` for an empty slice.
pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Sample standard deviation (`n - 1` denominator); `NaN` when `n < 2`.
pub fn sample_sd(values: &[f64]) -> f64 {
    let n = values.len();
    if n < 2 {
        return f64::NAN;
    }
    let m = mean(values);
    let ss: f64 = values.iter().map(|v| (v - m) * (v - m)).sum();
    (ss / (n as f64 - 1.0)).sqrt()
}

/// Kish effective sample size `(Σw)^2 / Σw^2`.
pub fn effective_sample_size(weights: &[f64]) -> f64 {
    let s: f64 = weights.iter().sum();
    let s2: f64 = weights.iter().map(|w| w * w).sum();
    if s2 > 0.0 { s * s / s2 } else { 0.0 }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sd_of_one_to_four() {
        let v = [1.0, 2.0, 3.0, 4.0];
        assert!((mean(&v) - 2.5).abs() < 1e-12);
        assert!((sample_sd(&v) - (5.0f64 / 3.0).sqrt()).abs() < 1e-12);
        assert!(sample_sd(&[1.0]).is_nan());
    }

    #[test]
    fn ess_of_equal_weights_is_n() {
        assert!((effective_sample_size(&[2.0; 7]) - 7.0).abs() < 1e-12);
        assert!(effective_sample_size(&[1.0, 0.0, 0.0]) < 1.0 + 1e-12);
    }
}
