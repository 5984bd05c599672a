//! Metric and engine parameter types.
//!
//! These are the request-side types of the power engine: per-metric input
//! statistics (mean/variance or conversion rate), prior settings, and the
//! organization-level statistics-engine configuration. Everything here is
//! an immutable value constructed fresh per calculation call; the MDE
//! searches build modified copies via [`MetricParams::with_effect_size`]
//! rather than mutating caller-supplied data.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Distribution family of a metric, with its observed or hypothesized
/// sufficient statistics.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum MetricKind {
    /// Continuous metric summarized by mean and standard deviation.
    #[serde(rename_all = "camelCase")]
    Mean {
        /// Baseline (control) mean.
        mean: f64,
        /// Baseline standard deviation. Must be non-negative.
        standard_deviation: f64,
    },
    /// Conversion metric summarized by a rate in [0, 1].
    #[serde(rename_all = "camelCase")]
    Binomial {
        /// Baseline conversion rate.
        conversion_rate: f64,
    },
}

/// Prior settings carried by a metric, at both override and metric level.
///
/// The upstream metric editor lets a user either accept the metric-level
/// defaults or override them per experiment; `resolve` picks whichever
/// level applies.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PriorSpecification {
    /// When true, the `override_*` fields take effect instead of the
    /// metric-level defaults.
    pub override_metric_level_settings: bool,
    /// Override: whether the prior is proper (informative).
    pub override_proper: bool,
    /// Override: prior mean of the relative lift.
    pub override_prior_lift_mean: f64,
    /// Override: prior standard deviation of the relative lift.
    pub override_prior_lift_standard_deviation: f64,
    /// Metric-level default: whether the prior is proper.
    pub metric_proper: bool,
    /// Metric-level default: prior mean of the relative lift.
    pub metric_prior_lift_mean: f64,
    /// Metric-level default: prior standard deviation of the relative lift.
    pub metric_prior_lift_standard_deviation: f64,
}

impl PriorSpecification {
    /// A diffuse (improper) prior at both levels.
    pub fn diffuse() -> Self {
        Self {
            override_metric_level_settings: false,
            override_proper: false,
            override_prior_lift_mean: 0.0,
            override_prior_lift_standard_deviation: 1.0,
            metric_proper: false,
            metric_prior_lift_mean: 0.0,
            metric_prior_lift_standard_deviation: 1.0,
        }
    }

    /// Select the applicable prior: override-level when the override flag
    /// is set, metric-level otherwise.
    pub fn resolve(&self) -> PriorParams {
        if self.override_metric_level_settings {
            PriorParams {
                proper: self.override_proper,
                lift_mean: self.override_prior_lift_mean,
                lift_standard_deviation: self.override_prior_lift_standard_deviation,
            }
        } else {
            PriorParams {
                proper: self.metric_proper,
                lift_mean: self.metric_prior_lift_mean,
                lift_standard_deviation: self.metric_prior_lift_standard_deviation,
            }
        }
    }
}

impl Default for PriorSpecification {
    fn default() -> Self {
        Self::diffuse()
    }
}

/// The resolved prior actually used for inference.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PriorParams {
    /// Whether the prior is proper (informative, finite variance).
    pub proper: bool,
    /// Prior mean of the relative lift.
    pub lift_mean: f64,
    /// Prior standard deviation of the relative lift.
    pub lift_standard_deviation: f64,
}

/// Per-metric input to the power calculations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricParams {
    /// Hypothesized relative lift of the treatment over the baseline.
    pub effect_size: f64,
    /// Prior settings (used by the Bayesian estimator only).
    #[serde(flatten)]
    pub prior: PriorSpecification,
    /// Distribution family and baseline statistics.
    #[serde(flatten)]
    pub kind: MetricKind,
}

impl MetricParams {
    /// Baseline mean and variance.
    ///
    /// For binomial metrics the variance is the Bernoulli variance
    /// `p * (1 - p)`.
    pub fn mean_variance(&self) -> (f64, f64) {
        match self.kind {
            MetricKind::Mean {
                mean,
                standard_deviation,
            } => (mean, standard_deviation * standard_deviation),
            MetricKind::Binomial { conversion_rate } => {
                (conversion_rate, conversion_rate * (1.0 - conversion_rate))
            }
        }
    }

    /// Treatment mean and variance under the hypothesized lift.
    ///
    /// The treatment mean is `mean * (1 + effect_size)`. A mean metric
    /// keeps the baseline variance; a binomial metric recomputes the
    /// Bernoulli variance at the shifted rate.
    pub fn treatment_mean_variance(&self) -> (f64, f64) {
        let (mean, variance) = self.mean_variance();
        let treatment_mean = mean * (1.0 + self.effect_size);
        match self.kind {
            MetricKind::Mean { .. } => (treatment_mean, variance),
            MetricKind::Binomial { .. } => {
                (treatment_mean, treatment_mean * (1.0 - treatment_mean))
            }
        }
    }

    /// A copy of these parameters with a different hypothesized lift.
    ///
    /// The MDE searches probe many candidate effect sizes; each probe gets
    /// a fresh value so the caller's parameters are never aliased.
    pub fn with_effect_size(&self, effect_size: f64) -> Self {
        Self {
            effect_size,
            ..self.clone()
        }
    }

    /// Check the structural invariants of the baseline statistics.
    pub fn validate(&self) -> Result<(), ParamError> {
        match self.kind {
            MetricKind::Mean {
                standard_deviation, ..
            } => {
                if !standard_deviation.is_finite() || standard_deviation < 0.0 {
                    return Err(ParamError::NegativeStandardDeviation {
                        value: standard_deviation,
                    });
                }
            }
            MetricKind::Binomial { conversion_rate } => {
                if !conversion_rate.is_finite() || !(0.0..=1.0).contains(&conversion_rate) {
                    return Err(ParamError::ConversionRateOutOfRange {
                        value: conversion_rate,
                    });
                }
            }
        }
        if !self.effect_size.is_finite() {
            return Err(ParamError::NonFiniteEffectSize {
                value: self.effect_size,
            });
        }
        Ok(())
    }
}

/// Invalid metric parameters.
#[derive(Debug, Clone, PartialEq)]
pub enum ParamError {
    /// Standard deviation was negative or non-finite.
    NegativeStandardDeviation {
        /// The offending value.
        value: f64,
    },
    /// Conversion rate fell outside [0, 1] or was non-finite.
    ConversionRateOutOfRange {
        /// The offending value.
        value: f64,
    },
    /// Hypothesized effect size was NaN or infinite.
    NonFiniteEffectSize {
        /// The offending value.
        value: f64,
    },
}

impl fmt::Display for ParamError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamError::NegativeStandardDeviation { value } => {
                write!(f, "standard deviation must be non-negative, got {}", value)
            }
            ParamError::ConversionRateOutOfRange { value } => {
                write!(f, "conversion rate must be in [0, 1], got {}", value)
            }
            ParamError::NonFiniteEffectSize { value } => {
                write!(f, "effect size must be finite, got {}", value)
            }
        }
    }
}

impl std::error::Error for ParamError {}

/// Organization-level choice of inferential regime.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum StatsEngineSettings {
    /// Frequentist testing, optionally with a sequential (always-valid)
    /// correction. `None` means fixed-horizon testing.
    #[serde(rename_all = "camelCase")]
    Frequentist {
        /// Tuning parameter of the mixture-SPRT confidence sequence, or
        /// `None` to disable sequential testing.
        sequential_testing: Option<f64>,
    },
    /// Bayesian testing with the metric's prior settings.
    Bayesian,
}
