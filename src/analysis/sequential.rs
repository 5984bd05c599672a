//! Sequential (always-valid) testing corrections.
//!
//! Sequential experiments are peeked at continuously, so fixed-horizon
//! critical values understate the false-positive rate. The correction here
//! is the mixture sequential probability ratio test (mSPRT) confidence
//! sequence: at sample size n the interval halfwidth is
//!
//! ```text
//! sqrt(n * d(n)) * SE,   d(n) = 2 (n rho^2 + 1) ln(sqrt(n rho^2 + 1) / alpha) / (n rho)^2
//! ```
//!
//! where rho is a mixture-variance parameter tuned so the sequence is
//! tightest around a target sample size (the tuning parameter). Power
//! calculations absorb the widening into the variance: the naive variance
//! is rescaled by `(z_seq / z*)^2` with `z_seq = sqrt(n * d(n))`, after
//! which the ordinary fixed-horizon power algebra applies unchanged.

use crate::statistics::quantile;

/// Mixture parameter rho of the mSPRT confidence sequence.
///
/// `tuning_parameter` is the sample size at which the sequence is
/// tightest; must be positive.
pub fn sequential_rho(alpha: f64, tuning_parameter: f64) -> f64 {
    ((-2.0 * alpha.ln() + (-2.0 * alpha.ln() + 1.0).ln()) / tuning_parameter).sqrt()
}

/// Discriminant of the always-valid interval width at sample size `n`.
pub fn sequential_discriminant(n: f64, rho: f64, alpha: f64) -> f64 {
    let nr2 = n * rho * rho;
    2.0 * (nr2 + 1.0) * ((nr2 + 1.0).sqrt() / alpha).ln() / (n * rho).powi(2)
}

/// Rescale a naive variance so fixed-horizon power algebra accounts for
/// the sequential interval's extra width.
///
/// The multiplier is `(z_seq / z*)^2` where `z_seq = sqrt(n) *
/// sqrt(discriminant)` and `z*` is the two-sided fixed-horizon critical
/// value at `alpha`.
pub fn sequential_variance(variance: f64, n: f64, alpha: f64, tuning_parameter: f64) -> f64 {
    let rho = sequential_rho(alpha, tuning_parameter);
    let z_sequential = n.sqrt() * sequential_discriminant(n, rho, alpha).sqrt();
    let z_star = quantile(1.0 - 0.5 * alpha, 0.0, 1.0);
    variance * (z_sequential / z_star).powi(2)
}

/// Halfwidth of the always-valid confidence sequence for an estimate with
/// the given variance at sample size `n`.
pub fn sequential_halfwidth(variance: f64, n: f64, alpha: f64, tuning_parameter: f64) -> f64 {
    let rho = sequential_rho(alpha, tuning_parameter);
    (n * sequential_discriminant(n, rho, alpha) * variance).sqrt()
}
