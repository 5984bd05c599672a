//! Mid-experiment power projection.
//!
//! Once an experiment is running, the question changes from "how long
//! should this run" to "will it be adequately powered by the end, and if
//! not, how much longer does it need". The inputs are no longer
//! user-entered guesses but sufficient statistics computed by the external
//! stats service per (metric, variation) pair: the pairwise sample size
//! collected so far, the observed variance of the effect estimate, the
//! target MDE, prior settings, and a scaling factor describing how much
//! more data the planned horizon will bring.
//!
//! Failure is data here, never a panic: a pair with missing inputs
//! produces an error row and the batch continues. Only when too many
//! pairs fail (or the aggregate numbers fail their own validation) does
//! the engine withhold the experiment-level projection.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::analysis::sequential_halfwidth;
use crate::constants::{LOW_POWER_THRESHOLD, MAX_PAIR_FAILURE_FRACTION};
use crate::statistics::{cdf, quantile};

/// Sufficient statistics for one (metric, variation) pair, computed by
/// the external stats service.
///
/// Every projection input is optional: the upstream computation can fail
/// per pair, and presence is validated here rather than assumed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricPowerResponseFromStatsEngine {
    /// Error reported by the stats service for this pair, passed through.
    pub error_message: Option<String>,
    /// Pairwise (baseline + this variation) sample size collected during
    /// the first period.
    pub first_period_pairwise_sample_size: Option<f64>,
    /// The effect size the experimenter wants to be able to detect.
    #[serde(rename = "targetMDE")]
    pub target_mde: f64,
    /// Observed variance of the effect estimate.
    pub sigmahat_2_delta: Option<f64>,
    /// Whether the metric's prior is proper (informative).
    pub prior_proper: Option<bool>,
    /// Prior mean of the lift; required when the prior is proper.
    pub prior_lift_mean: Option<f64>,
    /// Prior variance of the lift; required when the prior is proper.
    pub prior_lift_variance: Option<f64>,
    /// Second-period sample size as a multiple of the first period's:
    /// how much more data the remaining runtime is expected to bring.
    pub scaling_factor: Option<f64>,
}

/// Per-variation map of metric id to the stats-service response.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MidExperimentVariation {
    /// Goal metrics for this (non-baseline) variation.
    pub metrics: BTreeMap<String, MetricPowerResponseFromStatsEngine>,
}

/// Mid-experiment projection request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MidExperimentPowerParams {
    /// Significance level before the multiple-comparison correction.
    pub alpha: f64,
    /// Whether the experiment runs under sequential (always-valid)
    /// testing.
    pub sequential: bool,
    /// Tuning parameter of the sequential confidence sequence.
    pub sequential_tuning_parameter: f64,
    /// Days left in the planned experiment window. The scaling factors in
    /// the per-pair responses already encode this horizon; it is carried
    /// for the reporting layer.
    pub days_remaining: f64,
    /// Experiment-wide sample size collected during the first period.
    pub first_period_sample_size: f64,
    /// Projected new users per day from here on.
    pub new_daily_users: f64,
    /// Number of goal metrics (for the multiple-comparison correction).
    pub num_goal_metrics: usize,
    /// Traffic split across all arms, control included; its length is the
    /// number of variations.
    pub variation_weights: Vec<f64>,
    /// One entry per non-baseline variation.
    pub variations: Vec<MidExperimentVariation>,
}

/// The per-(metric, variation) view handed to
/// [`calculate_single_metric_variation_power`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MidExperimentSingleVariationParams {
    /// Significance level before the multiple-comparison correction.
    pub alpha: f64,
    /// Whether sequential testing applies.
    pub sequential: bool,
    /// Tuning parameter of the sequential confidence sequence.
    pub sequential_tuning_parameter: f64,
    /// Total number of variations, control included.
    pub n_variations: usize,
    /// Number of goal metrics.
    pub num_goal_metrics: usize,
    /// Experiment-wide first-period sample size.
    pub first_period_sample_size: f64,
    /// Projected new users per day.
    pub new_daily_users: f64,
    /// The stats-service response for this pair.
    pub response: MetricPowerResponseFromStatsEngine,
}

/// Projection outcome for one (metric, variation) pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricVariationPowerResult {
    /// Metric id.
    pub metric_id: String,
    /// Variation index (1-based; 0 is the baseline).
    pub variation: usize,
    /// Why no power could be computed for this pair, when it could not.
    pub error_message: Option<String>,
    /// Projected power at experiment end.
    pub power: Option<f64>,
    /// The target MDE this power refers to.
    pub effect_size: Option<f64>,
    /// Additional days needed to reach adequate power; `+inf` when the
    /// projected daily traffic is zero or negative.
    pub additional_days_needed: Option<f64>,
    /// Whether this pair's projected power is below the low-power bar.
    pub is_low_powered: Option<bool>,
}

impl MetricVariationPowerResult {
    fn error(metric_id: &str, variation: usize, message: String) -> Self {
        Self {
            metric_id: metric_id.to_string(),
            variation,
            error_message: Some(message),
            power: None,
            effect_size: None,
            additional_days_needed: None,
            is_low_powered: None,
        }
    }
}

/// Experiment-level projection: either a trusted aggregate with the full
/// per-pair breakdown, or the breakdown alone when too many pairs failed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum MidExperimentPowerCalculationResult {
    /// Fewer than 20% of pairs failed and the aggregate passed its own
    /// validation.
    #[serde(rename_all = "camelCase")]
    Success {
        /// Overall projected power: the best variation's worst metric.
        power: f64,
        /// Additional days needed: the least any variation would need to
        /// be adequately powered on all its metrics. `+inf` when traffic
        /// has stopped.
        additional_days_needed: f64,
        /// Whether the overall power is below the low-power bar.
        is_low_powered: bool,
        /// Per-pair breakdown.
        metric_variation_power_results: Vec<MetricVariationPowerResult>,
    },
    /// Too many pairs failed to trust an aggregate; the breakdown is
    /// still available for display.
    #[serde(rename_all = "camelCase")]
    Error {
        /// Per-pair breakdown, including the failed pairs.
        metric_variation_power_results: Vec<MetricVariationPowerResult>,
    },
}

/// A result field that failed the post-computation validation.
#[derive(Debug, Clone, PartialEq)]
pub enum ResultValidationError {
    /// A power value was NaN, infinite, or outside [0, 1].
    InvalidPower {
        /// The offending value.
        value: f64,
    },
    /// An effect size was NaN or infinite.
    InvalidEffectSize {
        /// The offending value.
        value: f64,
    },
    /// A days-needed value was NaN or negative (`+inf` is the documented
    /// "traffic has stopped" sentinel and passes).
    InvalidDaysNeeded {
        /// The offending value.
        value: f64,
    },
}

impl fmt::Display for ResultValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResultValidationError::InvalidPower { value } => {
                write!(f, "power must be a finite value in [0, 1], got {}", value)
            }
            ResultValidationError::InvalidEffectSize { value } => {
                write!(f, "effect size must be finite, got {}", value)
            }
            ResultValidationError::InvalidDaysNeeded { value } => {
                write!(f, "days needed must be non-negative and not NaN, got {}", value)
            }
        }
    }
}

impl std::error::Error for ResultValidationError {}

fn check_power(value: f64) -> Result<(), ResultValidationError> {
    if !value.is_finite() || !(0.0..=1.0).contains(&value) {
        return Err(ResultValidationError::InvalidPower { value });
    }
    Ok(())
}

fn check_days(value: f64) -> Result<(), ResultValidationError> {
    if value.is_nan() || value < 0.0 {
        return Err(ResultValidationError::InvalidDaysNeeded { value });
    }
    Ok(())
}

impl MidExperimentPowerCalculationResult {
    /// Consume the result, returning the per-pair breakdown.
    pub fn into_results(self) -> Vec<MetricVariationPowerResult> {
        match self {
            MidExperimentPowerCalculationResult::Success {
                metric_variation_power_results,
                ..
            }
            | MidExperimentPowerCalculationResult::Error {
                metric_variation_power_results,
            } => metric_variation_power_results,
        }
    }

    /// Re-check the numeric fields before the result is trusted.
    ///
    /// Numeric instability has leaked `NaN` into persisted results
    /// before; the engine round-trips its own output through this check
    /// and downgrades a `Success` that fails it.
    pub fn validate(&self) -> Result<(), ResultValidationError> {
        let breakdown = match self {
            MidExperimentPowerCalculationResult::Success {
                power,
                additional_days_needed,
                metric_variation_power_results,
                ..
            } => {
                check_power(*power)?;
                check_days(*additional_days_needed)?;
                metric_variation_power_results
            }
            MidExperimentPowerCalculationResult::Error {
                metric_variation_power_results,
            } => metric_variation_power_results,
        };
        for result in breakdown {
            if let Some(power) = result.power {
                check_power(power)?;
            }
            if let Some(effect_size) = result.effect_size {
                if !effect_size.is_finite() {
                    return Err(ResultValidationError::InvalidEffectSize { value: effect_size });
                }
            }
            if let Some(days) = result.additional_days_needed {
                check_days(days)?;
            }
        }
        Ok(())
    }
}

/// Closed-form frequentist power: the chance the effect estimate lands
/// beyond the interval halfwidth when the true effect is `target_mde`.
fn mid_experiment_power_freq(halfwidth: f64, variance: f64, target_mde: f64) -> f64 {
    let s = variance.sqrt();
    1.0 - cdf(halfwidth, target_mde, s) + cdf(-halfwidth, target_mde, s)
}

/// Closed-form Bayesian power: the posterior credible interval excludes
/// zero when the effect estimate crosses a cutpoint blending the prior
/// with the projected data precision (the same algebra as
/// [`crate::analysis::bayesian::cutpoint`], on the stats-service scale).
fn mid_experiment_power_bayes(
    alpha: f64,
    variance: f64,
    prior_mean: f64,
    prior_variance: f64,
    target_mde: f64,
) -> f64 {
    let prior_variance = prior_variance.max(1e-12);
    let z_star = quantile(1.0 - 0.5 * alpha, 0.0, 1.0);
    let posterior_precision = 1.0 / prior_variance + 1.0 / variance;
    let offset = prior_mean / prior_variance;
    let upper_cutpoint = variance * (z_star * posterior_precision.sqrt() - offset);
    let lower_cutpoint = variance * (-z_star * posterior_precision.sqrt() - offset);
    let s = variance.sqrt();
    1.0 - cdf(upper_cutpoint, target_mde, s) + cdf(lower_cutpoint, target_mde, s)
}

/// Project power and additional runtime for a single (metric, variation)
/// pair.
///
/// Missing inputs yield an error row, never a panic; a non-finite power
/// (from degenerate upstream statistics) is treated the same way.
pub fn calculate_single_metric_variation_power(
    params: &MidExperimentSingleVariationParams,
    metric_id: &str,
    variation: usize,
) -> MetricVariationPowerResult {
    let response = &params.response;

    if let Some(message) = &response.error_message {
        return MetricVariationPowerResult::error(metric_id, variation, message.clone());
    }
    let Some(first_period_pairwise) = response.first_period_pairwise_sample_size else {
        return MetricVariationPowerResult::error(
            metric_id,
            variation,
            "missing firstPeriodPairwiseSampleSize".to_string(),
        );
    };
    let Some(sigmahat_2_delta) = response.sigmahat_2_delta else {
        return MetricVariationPowerResult::error(
            metric_id,
            variation,
            "missing sigmahat2Delta".to_string(),
        );
    };
    let Some(scaling_factor) = response.scaling_factor else {
        return MetricVariationPowerResult::error(
            metric_id,
            variation,
            "missing scalingFactor".to_string(),
        );
    };
    let Some(prior_proper) = response.prior_proper else {
        return MetricVariationPowerResult::error(
            metric_id,
            variation,
            "missing priorProper".to_string(),
        );
    };

    // Bonferroni across every (variation, goal metric) test.
    let num_tests = (params.n_variations.saturating_sub(1)) * params.num_goal_metrics;
    let alpha = params.alpha / num_tests.max(1) as f64;

    // By experiment end the pairwise sample will have grown by
    // scaling_factor times the first period, shrinking the variance of
    // the effect estimate proportionally.
    let total_pairwise = first_period_pairwise * (1.0 + scaling_factor);
    let adjusted_variance = sigmahat_2_delta * first_period_pairwise / total_pairwise;

    let power = if prior_proper {
        let Some(prior_lift_mean) = response.prior_lift_mean else {
            return MetricVariationPowerResult::error(
                metric_id,
                variation,
                "missing priorLiftMean for proper prior".to_string(),
            );
        };
        let Some(prior_lift_variance) = response.prior_lift_variance else {
            return MetricVariationPowerResult::error(
                metric_id,
                variation,
                "missing priorLiftVariance for proper prior".to_string(),
            );
        };
        mid_experiment_power_bayes(
            alpha,
            adjusted_variance,
            prior_lift_mean,
            prior_lift_variance,
            response.target_mde,
        )
    } else {
        let halfwidth = if params.sequential {
            sequential_halfwidth(
                adjusted_variance,
                total_pairwise,
                alpha,
                params.sequential_tuning_parameter,
            )
        } else {
            quantile(1.0 - 0.5 * alpha, 0.0, 1.0) * adjusted_variance.sqrt()
        };
        mid_experiment_power_freq(halfwidth, adjusted_variance, response.target_mde)
    };

    if !power.is_finite() {
        return MetricVariationPowerResult::error(
            metric_id,
            variation,
            "power calculation produced a non-finite value".to_string(),
        );
    }

    let additional_users_needed = (scaling_factor * params.first_period_sample_size).ceil();
    let additional_days_needed = if additional_users_needed <= 0.0 {
        0.0
    } else if params.new_daily_users <= 0.0 {
        f64::INFINITY
    } else {
        (additional_users_needed / params.new_daily_users).ceil()
    };

    MetricVariationPowerResult {
        metric_id: metric_id.to_string(),
        variation,
        error_message: None,
        power: Some(power),
        effect_size: Some(response.target_mde),
        additional_days_needed: Some(additional_days_needed),
        is_low_powered: Some(power < LOW_POWER_THRESHOLD),
    }
}

/// Project power and additional runtime across every (metric, variation)
/// pair and aggregate to an experiment-level figure.
///
/// Per variation the binding numbers are its worst metric (min power) and
/// its slowest metric (max days); across variations the report is
/// optimistic: the best variation's power and the least additional
/// runtime any variation would need. The aggregate is withheld when 20%
/// or more of the pairs failed.
pub fn calculate_mid_experiment_power(
    params: &MidExperimentPowerParams,
) -> MidExperimentPowerCalculationResult {
    let n_variations = params.variation_weights.len();
    let mut results: Vec<MetricVariationPowerResult> = Vec::new();

    for (index, variation) in params.variations.iter().enumerate() {
        let variation_number = index + 1;
        for (metric_id, response) in &variation.metrics {
            let single = MidExperimentSingleVariationParams {
                alpha: params.alpha,
                sequential: params.sequential,
                sequential_tuning_parameter: params.sequential_tuning_parameter,
                n_variations,
                num_goal_metrics: params.num_goal_metrics,
                first_period_sample_size: params.first_period_sample_size,
                new_daily_users: params.new_daily_users,
                response: response.clone(),
            };
            let result =
                calculate_single_metric_variation_power(&single, metric_id, variation_number);
            if let Some(message) = &result.error_message {
                tracing::warn!(
                    metric = metric_id.as_str(),
                    variation = variation_number,
                    "absorbed mid-experiment power failure: {}",
                    message
                );
            }
            results.push(result);
        }
    }

    let total_pairs = results.len();
    let failed_pairs = results.iter().filter(|r| r.error_message.is_some()).count();
    if total_pairs == 0
        || failed_pairs as f64 / total_pairs as f64 >= MAX_PAIR_FAILURE_FRACTION
    {
        return MidExperimentPowerCalculationResult::Error {
            metric_variation_power_results: results,
        };
    }

    // Per variation: worst metric power, slowest metric days.
    let mut variation_summaries: Vec<(f64, f64)> = Vec::new();
    for index in 0..params.variations.len() {
        let variation_number = index + 1;
        let ok_pairs: Vec<&MetricVariationPowerResult> = results
            .iter()
            .filter(|r| r.variation == variation_number && r.error_message.is_none())
            .collect();
        if ok_pairs.is_empty() {
            continue;
        }
        let min_power = ok_pairs
            .iter()
            .filter_map(|r| r.power)
            .fold(f64::INFINITY, f64::min);
        let max_days = ok_pairs
            .iter()
            .filter_map(|r| r.additional_days_needed)
            .fold(0.0_f64, f64::max);
        variation_summaries.push((min_power, max_days));
    }

    if variation_summaries.is_empty() {
        return MidExperimentPowerCalculationResult::Error {
            metric_variation_power_results: results,
        };
    }
    let power = variation_summaries
        .iter()
        .map(|(p, _)| *p)
        .fold(f64::NEG_INFINITY, f64::max);
    let additional_days_needed = variation_summaries
        .iter()
        .map(|(_, d)| *d)
        .fold(f64::INFINITY, f64::min);

    let success = MidExperimentPowerCalculationResult::Success {
        power,
        additional_days_needed,
        is_low_powered: power < LOW_POWER_THRESHOLD,
        metric_variation_power_results: results,
    };
    if let Err(error) = success.validate() {
        tracing::warn!("mid-experiment aggregate failed validation: {}", error);
        return MidExperimentPowerCalculationResult::Error {
            metric_variation_power_results: success.into_results(),
        };
    }
    success
}
