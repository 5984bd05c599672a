//! Frequentist power estimation and MDE inversion.
//!
//! The estimand is the relative difference `(mean_B - mean_A) / mean_A`,
//! whose sampling variance comes from the delta method:
//!
//! ```text
//! Var = var_B / (mean_A^2 n_B) + var_A mean_B^2 / (mean_A^4 n_A)
//! ```
//!
//! Power at a hypothesized lift follows from the normal approximation to
//! the test statistic. The MDE is recovered algebraically: because the
//! standard error itself depends on the hypothesized treatment mean, the
//! power equation is a quadratic in the effect size, solved in closed form
//! rather than numerically.

use super::sequential::sequential_variance;
use super::MdeError;
use crate::statistics::{cdf, quantile};
use crate::types::MetricParams;

/// Delta-method variance of the difference estimator.
///
/// `relative` selects the relative-difference parameterization; otherwise
/// the plain absolute-difference variance `var_b/n_b + var_a/n_a`.
pub fn frequentist_variance(
    var_a: f64,
    mean_a: f64,
    n_a: f64,
    var_b: f64,
    mean_b: f64,
    n_b: f64,
    relative: bool,
) -> f64 {
    if relative {
        var_b / (mean_a.powi(2) * n_b) + var_a * mean_b.powi(2) / (mean_a.powi(4) * n_a)
    } else {
        var_b / n_b + var_a / n_a
    }
}

/// Power of the test at the metric's hypothesized lift.
///
/// `n` is the total sample size across all arms; each of `n_variations`
/// arms receives `n / n_variations` users. When `sequential_testing`
/// carries a positive tuning parameter, the variance is widened for the
/// always-valid confidence sequence before the power is read off.
pub fn power_est_frequentist(
    metric: &MetricParams,
    n: f64,
    n_variations: usize,
    alpha: f64,
    two_tailed: bool,
    sequential_testing: Option<f64>,
) -> f64 {
    let n_per_variation = n / n_variations as f64;
    let (mean_a, var_a) = metric.mean_variance();
    let (mean_b, var_b) = metric.treatment_mean_variance();

    let mut variance = frequentist_variance(
        var_a,
        mean_a,
        n_per_variation,
        var_b,
        mean_b,
        n_per_variation,
        true,
    );
    if let Some(tuning) = sequential_testing.filter(|t| *t > 0.0) {
        variance = sequential_variance(variance, 2.0 * n_per_variation, alpha, tuning);
    }
    let standard_error = variance.sqrt();

    let z_star = if two_tailed {
        quantile(1.0 - 0.5 * alpha, 0.0, 1.0)
    } else {
        quantile(1.0 - alpha, 0.0, 1.0)
    };
    let standardized_effect = metric.effect_size / standard_error;

    let mut power = 1.0 - cdf(z_star - standardized_effect, 0.0, 1.0);
    if two_tailed {
        power += cdf(-z_star - standardized_effect, 0.0, 1.0);
    }
    power
}

/// Solve for the relative effect size achieving `power` at sample size `n`.
///
/// Setting the standardized effect equal to `z = z*(alpha) - z(1 - power)`
/// and expanding the delta-method standard error gives the quadratic
///
/// ```text
/// (m^2 n_a - z^2 v) x^2 - 2 z^2 v x - 2 z^2 v = 0
/// ```
///
/// in the effect size `x`, with `m` the baseline mean, `v` the (possibly
/// sequential-adjusted) baseline variance, and `n_a` the per-arm sample
/// size. The MDE is the upper root.
pub fn find_mde_frequentist(
    metric: &MetricParams,
    power: f64,
    n: f64,
    n_variations: usize,
    alpha: f64,
    sequential_testing: Option<f64>,
) -> Result<f64, MdeError> {
    if power <= alpha {
        return Err(MdeError::PowerBelowAlpha { power, alpha });
    }

    let n_per_variation = n / n_variations as f64;
    let z = quantile(1.0 - 0.5 * alpha, 0.0, 1.0) - quantile(1.0 - power, 0.0, 1.0);
    let (mean, variance) = metric.mean_variance();

    let mut v = variance;
    if let Some(tuning) = sequential_testing.filter(|t| *t > 0.0) {
        v = sequential_variance(v, 2.0 * n_per_variation, alpha, tuning);
    }

    // Below this sample size the quadratic has no real positive root: no
    // finite effect is detectable.
    let required = v * z.powi(2) / mean.powi(2);
    if n_per_variation <= required {
        return Err(MdeError::InsufficientSampleSize {
            per_arm: n_per_variation,
            required,
        });
    }

    let a = mean.powi(2) * n_per_variation - z.powi(2) * v;
    let b = -2.0 * z.powi(2) * v;
    let c = -2.0 * z.powi(2) * v;
    Ok((-b + (b.powi(2) - 4.0 * a * c).sqrt()) / (2.0 * a))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{MetricKind, PriorSpecification};

    fn mean_metric(mean: f64, standard_deviation: f64, effect_size: f64) -> MetricParams {
        MetricParams {
            effect_size,
            prior: PriorSpecification::diffuse(),
            kind: MetricKind::Mean {
                mean,
                standard_deviation,
            },
        }
    }

    fn round5(x: f64) -> f64 {
        (x * 1e5).round() / 1e5
    }

    #[test]
    fn test_frequentist_variance_absolute() {
        let v = frequentist_variance(2.0, 7.0, 4.0, 0.5, 5.0, 15.0, false);
        assert_eq!(round5(v), 0.53333);
    }

    #[test]
    fn test_frequentist_variance_relative() {
        let v = frequentist_variance(2.0, 7.0, 4.0, 0.5, 5.0, 15.0, true);
        assert_eq!(round5(v), 0.00589);
    }

    #[test]
    fn test_power_regression_value() {
        let metric = mean_metric(10.0, 3909.9997749994377_f64.sqrt(), 0.05);
        let power = power_est_frequentist(&metric, 400_000.0, 3, 0.05, true, None);
        assert_eq!(round5(power), 0.52144);
    }

    #[test]
    fn test_power_monotone_in_n() {
        let metric = mean_metric(10.0, 30.0, 0.05);
        let mut previous = 0.0;
        for &n in &[1000.0, 10_000.0, 100_000.0, 1_000_000.0] {
            let power = power_est_frequentist(&metric, n, 2, 0.05, true, None);
            assert!(
                power >= previous,
                "power should not decrease with n, got {} after {}",
                power,
                previous
            );
            previous = power;
        }
    }

    #[test]
    fn test_power_monotone_in_effect_size() {
        let mut previous = 0.0;
        for &effect in &[0.01, 0.02, 0.05, 0.1, 0.2] {
            let metric = mean_metric(10.0, 30.0, effect);
            let power = power_est_frequentist(&metric, 50_000.0, 2, 0.05, true, None);
            assert!(
                power >= previous,
                "power should not decrease with |effect|, got {} after {}",
                power,
                previous
            );
            previous = power;
        }
    }

    #[test]
    fn test_mde_power_round_trip() {
        let metric = mean_metric(12.0, 40.0, 0.0);
        let mde = find_mde_frequentist(&metric, 0.8, 80_000.0, 2, 0.05, None)
            .expect("solvable at this sample size");
        let at_mde = power_est_frequentist(&metric.with_effect_size(mde), 80_000.0, 2, 0.05, true, None);
        assert!(
            (at_mde - 0.8).abs() < 1e-3,
            "power at the returned MDE should be 0.8, got {}",
            at_mde
        );
    }

    #[test]
    fn test_mde_round_trip_with_sequential() {
        let metric = mean_metric(12.0, 40.0, 0.0);
        let sequential = Some(5000.0);
        let mde = find_mde_frequentist(&metric, 0.8, 80_000.0, 2, 0.05, sequential)
            .expect("solvable at this sample size");
        let at_mde = power_est_frequentist(
            &metric.with_effect_size(mde),
            80_000.0,
            2,
            0.05,
            true,
            sequential,
        );
        assert!(
            (at_mde - 0.8).abs() < 1e-3,
            "sequential power at the returned MDE should be 0.8, got {}",
            at_mde
        );
    }

    #[test]
    fn test_sequential_mde_larger_than_fixed_horizon() {
        let metric = mean_metric(12.0, 40.0, 0.0);
        let fixed = find_mde_frequentist(&metric, 0.8, 80_000.0, 2, 0.05, None).unwrap();
        let sequential = find_mde_frequentist(&metric, 0.8, 80_000.0, 2, 0.05, Some(5000.0)).unwrap();
        assert!(
            sequential > fixed,
            "always-valid testing needs a larger detectable effect: {} vs {}",
            sequential,
            fixed
        );
    }

    #[test]
    fn test_mde_error_when_power_at_or_below_alpha() {
        let metric = mean_metric(10.0, 30.0, 0.0);
        assert!(matches!(
            find_mde_frequentist(&metric, 0.05, 10_000.0, 2, 0.05, None),
            Err(MdeError::PowerBelowAlpha { .. })
        ));
    }

    #[test]
    fn test_mde_error_when_sample_size_insufficient() {
        // Huge variance relative to the mean: no finite effect detectable.
        let metric = mean_metric(1.0, 1000.0, 0.0);
        assert!(matches!(
            find_mde_frequentist(&metric, 0.8, 100.0, 2, 0.05, None),
            Err(MdeError::InsufficientSampleSize { .. })
        ));
    }
}
