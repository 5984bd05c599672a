//! Power and MDE estimators.
//!
//! This module implements the inferential core under three regimes:
//!
//! 1. **Frequentist** ([`frequentist`]): delta-method variance, power, and
//!    an algebraic MDE inversion
//! 2. **Sequential** ([`sequential`]): mixture-SPRT corrections that widen
//!    the frequentist machinery for always-valid testing
//! 3. **Bayesian** ([`bayesian`]): posterior-precision cutpoints, power,
//!    and a grid-search MDE

pub mod bayesian;
pub mod frequentist;
pub mod sequential;

pub use bayesian::{cutpoint, find_mde_bayesian, power_est_bayesian};
pub use frequentist::{find_mde_frequentist, frequentist_variance, power_est_frequentist};
pub use sequential::{
    sequential_discriminant, sequential_halfwidth, sequential_rho, sequential_variance,
};

use std::fmt;

/// An MDE solver could not produce a finite, positive effect size.
///
/// These are data conditions, not bugs: the planning engine absorbs them
/// (the affected week simply has no MDE) and the UI explains them to the
/// experimenter.
#[derive(Debug, Clone, PartialEq)]
pub enum MdeError {
    /// Target power does not exceed the false-positive rate, so the
    /// inversion is undefined.
    PowerBelowAlpha {
        /// Requested power.
        power: f64,
        /// Significance level.
        alpha: f64,
    },
    /// Per-arm sample size is too small for any finite effect to reach
    /// the target power.
    InsufficientSampleSize {
        /// Per-arm sample size supplied.
        per_arm: f64,
        /// Minimum per-arm sample size for a real positive root.
        required: f64,
    },
    /// No relative effect up to the search ceiling reaches the target
    /// power.
    EffectAboveSearchCeiling {
        /// The search ceiling as a relative effect (5.0 = 500%).
        ceiling: f64,
    },
}

impl fmt::Display for MdeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MdeError::PowerBelowAlpha { power, alpha } => {
                write!(
                    f,
                    "target power ({}) must exceed the significance level ({})",
                    power, alpha
                )
            }
            MdeError::InsufficientSampleSize { per_arm, required } => {
                write!(
                    f,
                    "per-arm sample size {:.0} is too small (need more than {:.0}); \
                     increase users or reduce the number of variations",
                    per_arm, required
                )
            }
            MdeError::EffectAboveSearchCeiling { ceiling } => {
                write!(
                    f,
                    "no effect below {:.0}% reaches the target power; collect more data",
                    ceiling * 100.0
                )
            }
        }
    }
}

impl std::error::Error for MdeError {}
