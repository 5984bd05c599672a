//! Bayesian power estimation and MDE search.
//!
//! ## Model
//!
//! The effect estimator tau-hat is normal around the true lift tau with
//! sampling variance s^2 from the delta method, and tau carries a normal
//! prior N(m0, p0^2) when the prior is proper (diffuse otherwise):
//!
//! ```text
//! tau-hat | tau ~ N(tau, s^2)
//! tau ~ N(m0, p0^2)            (proper prior only)
//! ```
//!
//! The posterior precision is `q = proper/p0^2 + 1/s^2`. A result is
//! called significant when the posterior credible interval excludes zero,
//! which happens exactly when tau-hat crosses a *cutpoint* on the data
//! scale; power is then the probability mass of tau-hat beyond the two
//! cutpoints under the hypothesized data-generating lift.
//!
//! With a diffuse prior the cutpoints collapse to `+/- z* s` and the
//! machinery reduces to the frequentist test, so power at zero effect is
//! exactly alpha.

use super::frequentist::frequentist_variance;
use super::MdeError;
use crate::constants::{MAX_RELATIVE_EFFECT, MDE_GRID_REFINE, MDE_GRID_STEP_COARSE};
use crate::statistics::{cdf, pdf, quantile};
use crate::types::MetricParams;

/// Sampling variance of the effect estimator at the metric's hypothesized
/// lift.
fn tau_hat_variance(metric: &MetricParams, n_per_variation: f64, relative: bool) -> f64 {
    let (mean_a, var_a) = metric.mean_variance();
    let (mean_b, var_b) = metric.treatment_mean_variance();
    frequentist_variance(
        var_a,
        mean_a,
        n_per_variation,
        var_b,
        mean_b,
        n_per_variation,
        relative,
    )
}

/// Decision boundary on the data-generating effect scale.
///
/// The posterior credible interval excludes zero from above exactly when
/// tau-hat exceeds the `upper` cutpoint, and from below when it falls
/// under the lower one:
///
/// ```text
/// c = s^2 (sign * z* sqrt(q) - proper * m0 / p0^2)
/// ```
pub fn cutpoint(
    metric: &MetricParams,
    alpha: f64,
    n_per_variation: f64,
    relative: bool,
    upper: bool,
) -> f64 {
    let prior = metric.prior.resolve();
    let s2 = tau_hat_variance(metric, n_per_variation, relative);
    let proper = if prior.proper { 1.0 } else { 0.0 };
    let prior_variance = prior.lift_standard_deviation.powi(2).max(1e-12);
    let posterior_precision = proper / prior_variance + 1.0 / s2;
    let z_star = quantile(1.0 - 0.5 * alpha, 0.0, 1.0);
    let sign = if upper { 1.0 } else { -1.0 };
    s2 * (sign * z_star * posterior_precision.sqrt() - proper * prior.lift_mean / prior_variance)
}

/// Power of the Bayesian decision rule at the metric's hypothesized lift.
///
/// Computed under the normal approximation to the posterior predictive of
/// the effect estimator: the mass beyond the upper cutpoint plus the mass
/// under the lower one.
pub fn power_est_bayesian(
    metric: &MetricParams,
    alpha: f64,
    n_per_variation: f64,
    relative: bool,
) -> f64 {
    let s2 = tau_hat_variance(metric, n_per_variation, relative);
    // Degenerate variance (e.g. a binomial rate probed past 100%) has no
    // detectable signal on this scale.
    if !s2.is_finite() || s2 <= 0.0 {
        return 0.0;
    }
    let s = s2.sqrt();
    let (mean_a, _) = metric.mean_variance();
    let effect = if relative {
        metric.effect_size
    } else {
        metric.effect_size * mean_a
    };
    let upper_cutpoint = cutpoint(metric, alpha, n_per_variation, relative, true);
    let lower_cutpoint = cutpoint(metric, alpha, n_per_variation, relative, false);
    1.0 - cdf(upper_cutpoint, effect, s) + cdf(lower_cutpoint, effect, s)
}

/// Search for the relative effect size achieving `power`.
///
/// Coarse-to-fine grid: a 1e-3 sweep over (0, 5.0] brackets the crossing,
/// then a 1e-5 pass inside the bracketing cell accepts the first value
/// whose power is within `pdf(0) * step` of the target (the tightest bound
/// on how much power can move across one step). Returns 0 immediately when
/// the target is already met at zero effect, and an error when not even a
/// 500% lift reaches it.
pub fn find_mde_bayesian(
    metric: &MetricParams,
    alpha: f64,
    power: f64,
    n_per_variation: f64,
    relative: bool,
) -> Result<f64, MdeError> {
    let at_zero = power_est_bayesian(&metric.with_effect_size(0.0), alpha, n_per_variation, relative);
    if at_zero >= power {
        return Ok(0.0);
    }

    let coarse = MDE_GRID_STEP_COARSE;
    let coarse_steps = (MAX_RELATIVE_EFFECT / coarse).round() as usize;
    let mut bracket = None;
    for i in 1..=coarse_steps {
        let effect = i as f64 * coarse;
        let p = power_est_bayesian(
            &metric.with_effect_size(effect),
            alpha,
            n_per_variation,
            relative,
        );
        if p >= power {
            bracket = Some(effect);
            break;
        }
    }
    let Some(upper) = bracket else {
        return Err(MdeError::EffectAboveSearchCeiling {
            ceiling: MAX_RELATIVE_EFFECT,
        });
    };

    let fine = coarse / MDE_GRID_REFINE;
    let tolerance = pdf(0.0, 0.0, 1.0) * fine;
    let lower = upper - coarse;
    for j in 1..=(MDE_GRID_REFINE as usize) {
        let effect = lower + j as f64 * fine;
        let p = power_est_bayesian(
            &metric.with_effect_size(effect),
            alpha,
            n_per_variation,
            relative,
        );
        if p >= power - tolerance {
            return Ok(effect);
        }
    }
    Ok(upper)
}
