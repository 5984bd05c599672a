//! # powerplan
//!
//! Statistical power and minimum-detectable-effect calculations for
//! online experiments.
//!
//! Given per-metric statistics (mean/variance or a conversion rate), a
//! false-positive rate, a variation count, and a traffic volume, this
//! crate answers the two questions every experimenter asks:
//!
//! - **Before launch**: how does power grow week over week, what effect
//!   is detectable each week, and how long must the experiment run?
//! - **Mid-experiment**: given the statistics collected so far, what
//!   power will the experiment have at its planned end, and how many more
//!   days (and users) would adequate power take?
//!
//! Three inferential regimes are supported: plain frequentist,
//! frequentist with sequential (always-valid) testing corrections, and
//! Bayesian with proper or diffuse priors.
//!
//! The crate is a pure numerical library: no I/O, no persistence, no
//! shared state. Every function is deterministic in its inputs, and every
//! failure mode is data (typed errors, per-pair error rows), never a
//! panic.
//!
//! ## Quick start
//!
//! ```
//! use powerplan::{
//!     power_metric_weeks, MetricKind, MetricParams, PowerCalculationParams,
//!     PriorSpecification, StatsEngineSettings,
//! };
//! use std::collections::BTreeMap;
//!
//! let mut metrics = BTreeMap::new();
//! metrics.insert(
//!     "revenue".to_string(),
//!     MetricParams {
//!         effect_size: 0.05,
//!         prior: PriorSpecification::diffuse(),
//!         kind: MetricKind::Mean { mean: 10.0, standard_deviation: 20.0 },
//!     },
//! );
//! let params = PowerCalculationParams {
//!     metrics,
//!     n_variations: 2,
//!     n_weeks: 8,
//!     alpha: 0.05,
//!     users_per_week: 10_000.0,
//!     target_power: 0.8,
//!     stats_engine: StatsEngineSettings::Frequentist { sequential_testing: None },
//! };
//! let result = power_metric_weeks(&params);
//! assert_eq!(result.weeks.len(), 8);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod analysis;
pub mod constants;
pub mod planning;
pub mod statistics;
pub mod traffic;
pub mod types;

// Re-exports for the public API
pub use analysis::{
    find_mde_bayesian, find_mde_frequentist, frequentist_variance, power_est_bayesian,
    power_est_frequentist, sequential_discriminant, sequential_halfwidth, sequential_rho,
    sequential_variance, MdeError,
};
pub use planning::midexperiment::ResultValidationError;
pub use planning::{
    calculate_mid_experiment_power, calculate_single_metric_variation_power, power_metric_weeks,
    MetricPowerResponseFromStatsEngine, MetricVariationPowerResult, MetricWeekPower,
    MidExperimentPowerCalculationResult, MidExperimentPowerParams,
    MidExperimentSingleVariationParams, MidExperimentVariation, PowerCalculationParams,
    PowerCalculationResult, SampleSizeAndRuntime, Week,
};
pub use traffic::{average_exposure_over_last_n_days, DailyTraffic, TrafficSnapshot};
pub use types::{
    MetricKind, MetricParams, ParamError, PriorParams, PriorSpecification, StatsEngineSettings,
};
