//! Normal density and logistic link helpers.
//!
//! Numerical notes:
//! - `normal_pdf` is evaluated directly (not through `exp(log_pdf)`) so that a
//!   density far in the tail underflows to exactly `0.0`. Weighting code relies
//!   on that zero to flag positivity violations.
//! - `expit` branches on the sign of `x` to avoid overflow in `exp`.

use std::f64::consts::PI;

/// Density of `N(mean, sd^2)` at `x`.
///
/// Returns `NaN` for a non-positive or non-finite `sd`.
pub fn normal_pdf(x: f64, mean: f64, sd: f64) -> f64 {
    if !(sd.is_finite() && sd > 0.0) {
        return f64::NAN;
    }
    let z = (x - mean) / sd;
    (-0.5 * z * z).exp() / (sd * (2.0 * PI).sqrt())
}

/// Logistic function `1 / (1 + exp(-x))`.
pub fn expit(x: f64) -> f64 {
    if x >= 0.0 {
        1.0 / (1.0 + (-x).exp())
    } else {
        let e = x.exp();
        e / (1.0 + e)
    }
}

/// `ln(Σ exp(v_i))` without overflow.
pub fn log_sum_exp(values: &[f64]) -> f64 {
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    if !max.is_finite() {
        return max;
    }
    max + values.iter().map(|v| (v - max).exp()).sum::<f64>().ln()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standard_normal_peak() {
        let v = normal_pdf(0.0, 0.0, 1.0);
        assert!((v - 0.398_942_280_401_432_7).abs() < 1e-15);
    }

    #[test]
    fn far_tail_underflows_to_zero() {
        assert_eq!(normal_pdf(1e3, 0.0, 1.0), 0.0);
    }

    #[test]
    fn degenerate_sd_is_nan() {
        assert!(normal_pdf(0.0, 0.0, 0.0).is_nan());
    }

    #[test]
    fn expit_is_stable_at_extremes() {
        assert!((expit(0.0) - 0.5).abs() < 1e-15);
        assert!(expit(-800.0) >= 0.0);
        assert!((expit(800.0) - 1.0).abs() < 1e-15);
    }

    #[test]
    fn log_sum_exp_matches_direct_sum() {
        let v = [0.1, -2.0, 1.5];
        let direct = v.iter().map(|x: &f64| x.exp()).sum::<f64>().ln();
        assert!((log_sum_exp(&v) - direct).abs() < 1e-12);
        assert!(log_sum_exp(&[1000.0, 1000.0]).is_finite());
    }
}
