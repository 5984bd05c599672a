//! Gaussian distribution primitives.
//!
//! Thin wrappers over `statrs`'s error-function-based normal distribution,
//! exposed as free functions with explicit mean/standard-deviation
//! arguments. Every estimator in this crate is closed-form normal algebra,
//! so these three functions are the only distribution machinery needed.
//!
//! Accuracy: the underlying implementation is accurate well past 1e-8 near
//! the center and at the tail probabilities used for testing decisions
//! (0.025, 0.05, 0.1).

use statrs::distribution::{Continuous, ContinuousCDF, Normal};

fn standard_normal() -> Normal {
    Normal::new(0.0, 1.0).unwrap()
}

/// Gaussian cumulative distribution function.
pub fn cdf(x: f64, mean: f64, standard_deviation: f64) -> f64 {
    standard_normal().cdf((x - mean) / standard_deviation)
}

/// Gaussian probability density function.
pub fn pdf(x: f64, mean: f64, standard_deviation: f64) -> f64 {
    standard_normal().pdf((x - mean) / standard_deviation) / standard_deviation
}

/// Gaussian quantile function (inverse CDF).
///
/// `p` must lie strictly inside (0, 1); callers in this crate only pass
/// probabilities derived from a valid significance level.
pub fn quantile(p: f64, mean: f64, standard_deviation: f64) -> f64 {
    debug_assert!(p > 0.0 && p < 1.0, "quantile probability must be in (0, 1)");
    mean + standard_deviation * standard_normal().inverse_cdf(p)
}
