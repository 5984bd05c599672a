//! Default configuration constants used throughout the crate.

/// Significance level used when a request does not carry its own.
pub const DEFAULT_ALPHA: f64 = 0.05;

/// Power level that defines "adequately powered" for sample-size planning.
///
/// The first week whose power reaches this value (after rounding to two
/// decimals) becomes the metric's recommended runtime.
pub const ADEQUATE_POWER: f64 = 0.8;

/// Default tuning parameter for sequential (always-valid) testing.
///
/// Controls where the mixture-SPRT confidence sequence is tightest; the
/// upstream analytics layer passes its own value when the organization has
/// customized it.
pub const DEFAULT_SEQUENTIAL_TUNING_PARAMETER: f64 = 5000.0;

/// Coarse step for the Bayesian MDE grid search, in relative-effect units.
pub const MDE_GRID_STEP_COARSE: f64 = 1e-3;

/// Refinement factor applied to the coarse step for the fine pass.
pub const MDE_GRID_REFINE: f64 = 100.0;

/// Upper bound of the Bayesian MDE search: a 500% relative effect.
///
/// Effects beyond this are reported as an error rather than a number no
/// experimenter would act on.
pub const MAX_RELATIVE_EFFECT: f64 = 5.0;

/// Overall power below which a mid-experiment projection is flagged as
/// low-powered.
pub const LOW_POWER_THRESHOLD: f64 = 0.1;

/// Fraction of (metric, variation) pairs that may fail before the
/// mid-experiment aggregate is withheld entirely.
pub const MAX_PAIR_FAILURE_FRACTION: f64 = 0.2;
