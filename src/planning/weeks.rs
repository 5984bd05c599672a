//! Weekly power-over-time planning engine.
//!
//! Before launch, an experimenter wants to know how long an experiment
//! must run: for each week of a planning horizon, at the cumulative sample
//! size that week would have, what power does each metric reach and what
//! effect could it detect? The engine answers both, and marks two
//! milestones per metric: the first week of adequate power (a fixed 80%
//! bar) and the first week crossing the user's own target power. The
//! worst metric's target-power week drives the overall recommendation.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::analysis::{
    find_mde_bayesian, find_mde_frequentist, power_est_bayesian, power_est_frequentist,
};
use crate::constants::ADEQUATE_POWER;
use crate::types::{MetricParams, StatsEngineSettings};

/// Pre-launch planning request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PowerCalculationParams {
    /// Metrics under study, keyed by metric id.
    pub metrics: BTreeMap<String, MetricParams>,
    /// Number of experiment arms, control included.
    pub n_variations: usize,
    /// Planning horizon in weeks.
    pub n_weeks: usize,
    /// Significance level.
    pub alpha: f64,
    /// Expected weekly exposure across all arms.
    pub users_per_week: f64,
    /// The user's target power for the threshold marker.
    pub target_power: f64,
    /// Inferential regime.
    pub stats_engine: StatsEngineSettings,
}

/// One metric's numbers for one week.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricWeekPower {
    /// MDE at the target power, absent when the week's sample size is too
    /// small for any finite effect to be detectable.
    pub effect_size: Option<f64>,
    /// Power at the metric's hypothesized lift.
    pub power: f64,
    /// Whether this is the first week crossing the target power.
    pub is_threshold: bool,
}

/// One planning week.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Week {
    /// Cumulative users by the end of this week.
    pub users: f64,
    /// Per-metric power and MDE, keyed by metric id.
    pub metrics: BTreeMap<String, MetricWeekPower>,
}

/// First week at which a metric is adequately powered.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SampleSizeAndRuntime {
    /// Week number (1-based).
    pub weeks: usize,
    /// Cumulative users at that week.
    pub users: f64,
}

/// Result of the weekly planning engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PowerCalculationResult {
    /// One entry per planning week, in order.
    pub weeks: Vec<Week>,
    /// Per metric, the first adequately-powered week, or `None` when the
    /// metric never reaches 80% within the horizon.
    pub sample_size_and_runtime: BTreeMap<String, Option<SampleSizeAndRuntime>>,
    /// First week by which *every* metric has crossed the target power
    /// (the max across metrics), or `None` when any metric never does.
    pub week_threshold: Option<usize>,
}

fn round2(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}

/// Compute power and MDE per metric per week over the planning horizon.
///
/// Week `w` uses the cumulative sample size `users_per_week * w`. MDE
/// failures for early weeks (sample size too small for the solver) are
/// absorbed into `effect_size: None`; this engine has no error path.
pub fn power_metric_weeks(params: &PowerCalculationParams) -> PowerCalculationResult {
    let mut weeks: Vec<Week> = (1..=params.n_weeks)
        .map(|w| Week {
            users: params.users_per_week * w as f64,
            metrics: BTreeMap::new(),
        })
        .collect();
    let mut sample_size_and_runtime = BTreeMap::new();
    let mut threshold_weeks: Vec<Option<usize>> = Vec::with_capacity(params.metrics.len());

    for (metric_id, metric) in &params.metrics {
        let mut first_adequate: Option<usize> = None;
        let mut first_threshold: Option<usize> = None;

        for w in 1..=params.n_weeks {
            let n = params.users_per_week * w as f64;
            let (power, mde) = match params.stats_engine {
                StatsEngineSettings::Frequentist { sequential_testing } => (
                    power_est_frequentist(
                        metric,
                        n,
                        params.n_variations,
                        params.alpha,
                        true,
                        sequential_testing,
                    ),
                    find_mde_frequentist(
                        metric,
                        params.target_power,
                        n,
                        params.n_variations,
                        params.alpha,
                        sequential_testing,
                    )
                    .ok(),
                ),
                StatsEngineSettings::Bayesian => {
                    let n_per_variation = n / params.n_variations as f64;
                    (
                        power_est_bayesian(metric, params.alpha, n_per_variation, true),
                        find_mde_bayesian(
                            metric,
                            params.alpha,
                            params.target_power,
                            n_per_variation,
                            true,
                        )
                        .ok(),
                    )
                }
            };

            let rounded = round2(power);
            if first_adequate.is_none() && rounded >= ADEQUATE_POWER {
                first_adequate = Some(w);
            }
            let is_threshold = first_threshold.is_none() && rounded >= params.target_power;
            if is_threshold {
                first_threshold = Some(w);
            }

            weeks[w - 1].metrics.insert(
                metric_id.clone(),
                MetricWeekPower {
                    effect_size: mde,
                    power,
                    is_threshold,
                },
            );
        }

        tracing::debug!(
            metric = metric_id.as_str(),
            adequate_week = ?first_adequate,
            threshold_week = ?first_threshold,
            "planned metric over {} weeks",
            params.n_weeks
        );

        sample_size_and_runtime.insert(
            metric_id.clone(),
            first_adequate.map(|w| SampleSizeAndRuntime {
                weeks: w,
                users: params.users_per_week * w as f64,
            }),
        );
        threshold_weeks.push(first_threshold);
    }

    // The slowest metric sets the recommended wait; if any metric never
    // crosses the target within the horizon there is no recommendation.
    let week_threshold = if threshold_weeks.is_empty() {
        None
    } else {
        threshold_weeks
            .iter()
            .copied()
            .collect::<Option<Vec<_>>>()
            .and_then(|v| v.into_iter().max())
    };

    PowerCalculationResult {
        weeks,
        sample_size_and_runtime,
        week_threshold,
    }
}
