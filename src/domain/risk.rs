//! Periodized portfolio risk, expected return and Sharpe ratio.
//!
//! `periods` scales per-period statistics to the evaluation horizon. Weights
//! must be ordered like the covariance matrix they are applied to.

use nalgebra::{DMatrix, DVector};

/// `sqrt(wᵀ (Σ · periods) w)`
pub fn portfolio_risk(covariance: &DMatrix<f64>, periods: usize, weights: &DVector<f64>) -> f64 {
    debug_assert_eq!(covariance.nrows(), weights.len());
    (weights.dot(&(covariance * weights)) * periods as f64).sqrt()
}

/// `(μ · w) · periods`
pub fn expected_return(mean_returns: &DVector<f64>, periods: usize, weights: &DVector<f64>) -> f64 {
    debug_assert_eq!(mean_returns.len(), weights.len());
    mean_returns.dot(weights) * periods as f64
}

/// `(expected_return - rf) / portfolio_risk`
///
/// Zero risk is not special-cased: the result is ±∞, or NaN when the excess
/// return is also zero. Callers detect either with `f64::is_finite`.
pub fn sharpe(
    mean_returns: &DVector<f64>,
    covariance: &DMatrix<f64>,
    periods: usize,
    risk_free_rate: f64,
    weights: &DVector<f64>,
) -> f64 {
    (expected_return(mean_returns, periods, weights) - risk_free_rate)
        / portfolio_risk(covariance, periods, weights)
}

/// `1/n` for each of `n` instruments.
pub fn equal_weights(n: usize) -> DVector<f64> {
    DVector::from_element(n, 1.0 / n as f64)
}
